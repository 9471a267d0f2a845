use crate::config::Config;
use crate::errors;
use crate::index::IndexManager;
use crate::storage::pager;
use tracing::info;
use uuid::Uuid;

pub struct Session {
    pub id: Uuid,
    pub indexes: IndexManager,
}

impl Session {
    /// Opens a session, loading stored indexes unless the configuration is in memory.
    pub fn open(config: Config) -> Result<Self, errors::Error> {
        config.validate()?;
        let id = Uuid::new_v4();
        let persist = config.persist;
        let data_dir = config.data_dir.clone();

        let mut indexes = IndexManager::new(config);
        if persist {
            pager::ensure_store(&data_dir)?;
            indexes.open(&data_dir)?;
        }
        info!(session_id = %id, persist, indexes = indexes.len(), "Opened session.");
        Ok(Session { id, indexes })
    }

    /// Flushes all indexes to the data directory when persistence is on.
    pub fn close(&mut self) -> Result<(), errors::Error> {
        let config = self.indexes.config();
        if config.persist {
            self.indexes.flush(&config.data_dir)?;
        }
        info!(session_id = %self.id, "Closed session.");
        Ok(())
    }
}
