use super::btree::BPlusTree;
use super::key::IndexKey;
use super::node::{NodeId, Offset};

/// A position in the leaf level resolved by a root-to-leaf descent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub leaf: NodeId,
    /// Index of the key when `found`, otherwise the insertion point.
    pub index: usize,
    pub found: bool,
}

/// Walks the leaf chain from the leftmost leaf, yielding entries in key order.
pub struct LeafIter<'a, K: IndexKey> {
    tree: &'a BPlusTree<K>,
    leaf: Option<NodeId>,
    index: usize,
}

impl<'a, K: IndexKey> LeafIter<'a, K> {
    pub fn new(tree: &'a BPlusTree<K>) -> Self {
        Self {
            tree,
            leaf: tree.leaf_head(),
            index: 0,
        }
    }
}

impl<'a, K: IndexKey> Iterator for LeafIter<'a, K> {
    type Item = (&'a K, Offset);

    fn next(&mut self) -> Option<Self::Item> {
        let tree: &'a BPlusTree<K> = self.tree;
        loop {
            let node = tree.node(self.leaf?).ok()?;
            if self.index < node.key_num() {
                let item = (&node.keys[self.index], node.values[self.index]);
                self.index += 1;
                return Some(item);
            }
            self.leaf = node.next_leaf;
            self.index = 0;
        }
    }
}
