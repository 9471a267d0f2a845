pub mod btree;
pub mod column;
pub mod cursor;
pub mod key;
pub mod node;
pub mod pager;

pub use btree::BPlusTree;
pub use column::{ColumnType, ColumnValue};
pub use key::{CharKey, Float, IndexKey};
pub use node::Offset;
