use crate::errors::Error;
use crate::storage::btree::{degree_for, MIN_DEGREE, PAGE_SIZE};
use crate::storage::{CharKey, ColumnType, Float};
use once_cell::sync::Lazy;
use std::path::PathBuf;

/// Where snapshots live unless told otherwise.
pub static DEFAULT_DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("data"))
        .join("minidex")
});

#[derive(Debug, Clone)]
pub struct Config {
    /// Page size the fan-out of new indexes is derived from.
    pub page_size: usize,
    /// Fixed fan-out for every new index, overriding `page_size`.
    pub degree: Option<usize>,
    pub data_dir: PathBuf,
    /// Load from and flush to `data_dir`.
    pub persist: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            degree: None,
            data_dir: DEFAULT_DATA_DIR.clone(),
            persist: true,
        }
    }
}

impl Config {
    pub fn in_memory() -> Self {
        Self {
            persist: false,
            ..Self::default()
        }
    }

    /// Checks that every index type can be built with a usable fan-out.
    ///
    /// # Errors
    /// Returns `Error::Config` for a degree below the minimum or a page too small
    /// to hold `MIN_DEGREE` keys of any index type.
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(degree) = self.degree {
            if degree < MIN_DEGREE {
                return Err(err!(
                    Config,
                    "Degree {} is below the minimum of {}.",
                    degree,
                    MIN_DEGREE
                ));
            }
            return Ok(());
        }
        for column in [ColumnType::INT, ColumnType::FLOAT, ColumnType::CHAR] {
            let degree = self.degree_for(column);
            if degree < MIN_DEGREE {
                return Err(err!(
                    Config,
                    "Page size {} gives {} indexes degree {}, the minimum is {}.",
                    self.page_size,
                    column,
                    degree,
                    MIN_DEGREE
                ));
            }
        }
        Ok(())
    }

    /// Fan-out of a new index with keys of type `column`.
    pub fn degree_for(&self, column: ColumnType) -> usize {
        self.degree.unwrap_or_else(|| match column {
            ColumnType::INT => degree_for::<i32>(self.page_size),
            ColumnType::FLOAT => degree_for::<Float>(self.page_size),
            ColumnType::CHAR => degree_for::<CharKey>(self.page_size),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        config.validate().unwrap();
        assert!(config.persist);
        assert!(config.data_dir.ends_with("minidex"));
        assert_eq!(config.degree_for(ColumnType::INT), 511);
        assert_eq!(config.degree_for(ColumnType::CHAR), 15);
        assert!(!Config::in_memory().persist);
    }

    #[test]
    fn test_degree_override() {
        let config = Config {
            degree: Some(4),
            ..Config::in_memory()
        };
        config.validate().unwrap();
        assert_eq!(config.degree_for(ColumnType::CHAR), 4);

        let config = Config {
            degree: Some(2),
            ..Config::in_memory()
        };
        assert_eq!(config.validate().unwrap_err().code(), 6000);
    }

    #[test]
    fn test_tiny_page_is_rejected() {
        let config = Config {
            page_size: 20,
            ..Config::in_memory()
        };
        assert_eq!(config.validate().unwrap_err().code(), 6000);
    }

    #[test]
    fn test_page_too_small_for_char_keys() {
        let config = Config {
            page_size: 700,
            ..Config::in_memory()
        };
        assert!(config.degree_for(ColumnType::INT) >= MIN_DEGREE);
        assert!(config.degree_for(ColumnType::CHAR) < MIN_DEGREE);
        assert_eq!(config.validate().unwrap_err().code(), 6000);

        let config = Config {
            page_size: 700,
            degree: Some(3),
            ..Config::in_memory()
        };
        config.validate().unwrap();
    }
}
