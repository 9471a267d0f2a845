//! Named indexes over the three key types.
//!
//! Callers hand keys over as tagged `ColumnValue`s; the manager checks the tag
//! against the declared type of the index and forwards to the typed tree.
use crate::config::Config;
use crate::errors::Error;
use crate::storage::pager;
use crate::storage::{BPlusTree, CharKey, ColumnType, ColumnValue, Float, IndexKey, Offset};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

pub enum TypedTree {
    Int(BPlusTree<i32>),
    Float(BPlusTree<Float>),
    Char(BPlusTree<CharKey>),
}

/// Runs `$body` against the typed tree, with `$k` bound to its key type.
macro_rules! dispatch {
    ($tree:expr, $t:ident, $k:ident => $body:expr) => {
        match $tree {
            TypedTree::Int($t) => {
                #[allow(dead_code)]
                type $k = i32;
                $body
            }
            TypedTree::Float($t) => {
                #[allow(dead_code)]
                type $k = Float;
                $body
            }
            TypedTree::Char($t) => {
                #[allow(dead_code)]
                type $k = CharKey;
                $body
            }
        }
    };
}

impl TypedTree {
    fn new(name: &str, column: ColumnType, degree: usize) -> Result<Self, Error> {
        Ok(match column {
            ColumnType::INT => TypedTree::Int(BPlusTree::new(name, degree)?),
            ColumnType::FLOAT => TypedTree::Float(BPlusTree::new(name, degree)?),
            ColumnType::CHAR => TypedTree::Char(BPlusTree::new(name, degree)?),
        })
    }

    fn load(dir: &Path, name: &str) -> Result<Option<Self>, Error> {
        Ok(match pager::stored_type(dir, name)? {
            Some(ColumnType::INT) => pager::load::<i32>(dir, name)?.map(TypedTree::Int),
            Some(ColumnType::FLOAT) => pager::load::<Float>(dir, name)?.map(TypedTree::Float),
            Some(ColumnType::CHAR) => pager::load::<CharKey>(dir, name)?.map(TypedTree::Char),
            None => None,
        })
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            TypedTree::Int(_) => ColumnType::INT,
            TypedTree::Float(_) => ColumnType::FLOAT,
            TypedTree::Char(_) => ColumnType::CHAR,
        }
    }
}

/// Summary of one index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    pub name: String,
    pub column: ColumnType,
    pub keys: usize,
    pub height: usize,
    pub nodes: usize,
    pub degree: usize,
}

pub struct IndexManager {
    config: Config,
    indexes: BTreeMap<String, TypedTree>,
}

impl IndexManager {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            indexes: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    fn get(&self, name: &str) -> Result<&TypedTree, Error> {
        self.indexes
            .get(name)
            .ok_or_else(|| err!(IndexNotExist, "Index '{}' doesn't exist.", name))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut TypedTree, Error> {
        self.indexes
            .get_mut(name)
            .ok_or_else(|| err!(IndexNotExist, "Index '{}' doesn't exist.", name))
    }

    pub fn column_type(&self, name: &str) -> Result<ColumnType, Error> {
        Ok(self.get(name)?.column_type())
    }

    /// Creates an empty index with keys of type `column`.
    pub fn create_index(&mut self, name: &str, column: ColumnType) -> Result<(), Error> {
        if self.indexes.contains_key(name) {
            return Err(err!(DuplicateIndex, "Index '{}' already exists.", name));
        }
        let degree = self.config.degree_for(column);
        let tree = TypedTree::new(name, column, degree)?;
        self.indexes.insert(name.to_string(), tree);
        info!(index = name, column = %column, degree, "Created index.");
        Ok(())
    }

    /// Removes the index and releases all of its nodes.
    pub fn drop_index(&mut self, name: &str) -> Result<(), Error> {
        let mut tree = self
            .indexes
            .remove(name)
            .ok_or_else(|| err!(IndexNotExist, "Index '{}' doesn't exist.", name))?;
        dispatch!(&mut tree, t, K => t.clear());
        info!(index = name, "Dropped index.");
        Ok(())
    }

    pub fn insert_index(
        &mut self,
        name: &str,
        key: &ColumnValue,
        offset: Offset,
    ) -> Result<(), Error> {
        dispatch!(self.get_mut(name)?, t, K => t.insert(K::from_value(key)?, offset))
    }

    /// Inserts `keys[i]` with `offsets[i]` for every `i`. Returns the number of entries inserted.
    ///
    /// The whole batch is checked before the tree is touched, so a rejected batch
    /// leaves the index unchanged.
    ///
    /// # Errors
    /// `Error::BatchSizeMismatch` if the slices differ in length, `Error::TypeMismatch`
    /// for a key of another type and `Error::DuplicateKey` for a key already stored
    /// or repeated within the batch.
    pub fn insert_batch(
        &mut self,
        name: &str,
        keys: &[ColumnValue],
        offsets: &[Offset],
    ) -> Result<usize, Error> {
        if keys.len() != offsets.len() {
            return Err(err!(
                BatchSizeMismatch,
                "{} keys and {} offsets given for index '{}'.",
                keys.len(),
                offsets.len(),
                name
            ));
        }
        dispatch!(self.get_mut(name)?, t, K => {
            let typed = keys.iter().map(K::from_value).collect::<Result<Vec<K>, Error>>()?;

            let mut sorted: Vec<&K> = typed.iter().collect();
            sorted.sort();
            if let Some(pair) = sorted.windows(2).find(|w| w[0] == w[1]) {
                return Err(err!(DuplicateKey, "Key {} is repeated in the batch.", pair[0]));
            }
            for key in &typed {
                if t.contains(key)? {
                    return Err(err!(
                        DuplicateKey,
                        "Key {} already exists in index '{}'.",
                        key,
                        name
                    ));
                }
            }

            let inserted = typed.len();
            for (key, offset) in typed.into_iter().zip(offsets.iter()) {
                t.insert(key, *offset)?;
            }
            debug!(index = name, inserted, "Inserted batch.");
            Ok(inserted)
        })
    }

    /// Removes `key` and returns its offset.
    pub fn delete_index(&mut self, name: &str, key: &ColumnValue) -> Result<Offset, Error> {
        dispatch!(self.get_mut(name)?, t, K => t.delete_by_key(&K::from_value(key)?))
    }

    pub fn search_equal(&self, name: &str, key: &ColumnValue) -> Result<Option<Offset>, Error> {
        dispatch!(self.get(name)?, t, K => t.search_by_key(&K::from_value(key)?))
    }

    pub fn search_between(
        &self,
        name: &str,
        begin: &ColumnValue,
        end: &ColumnValue,
    ) -> Result<Vec<Offset>, Error> {
        dispatch!(self.get(name)?, t, K => {
            t.search_between(&K::from_value(begin)?, &K::from_value(end)?)
        })
    }

    /// Offsets of all keys `<= end`.
    pub fn search_smaller(&self, name: &str, end: &ColumnValue) -> Result<Vec<Offset>, Error> {
        dispatch!(self.get(name)?, t, K => t.search_smaller(&K::from_value(end)?))
    }

    /// Offsets of all keys `>= begin`.
    pub fn search_greater(&self, name: &str, begin: &ColumnValue) -> Result<Vec<Offset>, Error> {
        dispatch!(self.get(name)?, t, K => t.search_greater(&K::from_value(begin)?))
    }

    /// All entries of the index in ascending key order.
    pub fn scan(&self, name: &str) -> Result<Vec<(ColumnValue, Offset)>, Error> {
        Ok(dispatch!(self.get(name)?, t, K => {
            t.iter().map(|(k, v)| (k.to_value(), v)).collect()
        }))
    }

    /// Validates the structure of the index.
    pub fn check(&self, name: &str) -> Result<(), Error> {
        dispatch!(self.get(name)?, t, K => t.validate())
    }

    /// The leaf level of the index, one rendered leaf per element.
    pub fn leaves(&self, name: &str) -> Result<Vec<String>, Error> {
        let rendered = dispatch!(self.get(name)?, t, K => t.to_string());
        Ok(rendered.lines().map(String::from).collect())
    }

    pub fn describe(&self) -> Vec<IndexInfo> {
        self.indexes
            .iter()
            .map(|(name, tree)| {
                let column = tree.column_type();
                dispatch!(tree, t, K => IndexInfo {
                    name: name.clone(),
                    column,
                    keys: t.len(),
                    height: t.height(),
                    nodes: t.node_count(),
                    degree: t.degree(),
                })
            })
            .collect()
    }

    /// Writes a snapshot of every index to `dir` and removes snapshots of dropped ones.
    ///
    /// Every index is attempted; the first failure is returned.
    pub fn flush(&self, dir: &Path) -> Result<(), Error> {
        info!(path = %dir.display(), indexes = self.indexes.len(), "Flushing indexes...");
        pager::ensure_store(dir)?;
        let page_size = self.config.page_size;

        let mut failure = None;
        for (name, tree) in &self.indexes {
            if let Err(e) = dispatch!(tree, t, K => pager::dump(t, dir, page_size)) {
                warn!(index = name.as_str(), "Failed to flush index. {}", e);
                failure.get_or_insert(e);
            }
        }
        for stored in pager::list_stores(dir)? {
            if !self.indexes.contains_key(&stored) {
                pager::remove(dir, &stored)?;
            }
        }

        match failure {
            Some(e) => Err(e),
            None => {
                info!(path = %dir.display(), "Flushed indexes.");
                Ok(())
            }
        }
    }

    /// Loads every snapshot in `dir`. Returns the number of indexes loaded.
    pub fn open(&mut self, dir: &Path) -> Result<usize, Error> {
        let mut loaded = 0;
        for name in pager::list_stores(dir)? {
            if self.indexes.contains_key(&name) {
                return Err(err!(DuplicateIndex, "Index '{}' is already open.", name));
            }
            if let Some(tree) = TypedTree::load(dir, &name)? {
                self.indexes.insert(name, tree);
                loaded += 1;
            }
        }
        info!(path = %dir.display(), loaded, "Opened indexes.");
        Ok(loaded)
    }
}
