//! A unified B+ tree node, used both for routing (internal) and data (leaf) nodes.
//!
//! | **Property**            | **Internal Node**                  | **Leaf Node**              |
//! |-------------------------|------------------------------------|----------------------------|
//! | **Stores**              | Keys and ids of children           | Keys and row offsets       |
//! | **Number of keys**      | Up to `degree - 1` at rest         | Up to `degree - 1` at rest |
//! | **Number of children**  | Number of keys + 1                 | None                       |
//! | **Number of values**    | None                               | Number of keys             |
//! | **Key purpose**         | Used for routing                   | Paired with value          |
//!
//! A node reaches `degree` keys only transiently, right before it is split.
//!
//! Nodes never reach into each other. Everything that touches a second node
//! (re-parenting, linking siblings, attaching to the parent) is done by the tree.
use super::key::IndexKey;
use crate::errors::Error;
use std::fmt;

/// Stable address of a node inside the tree's arena.
pub type NodeId = u32;

/// Opaque row offset stored next to every leaf key.
pub type Offset = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// A leaf node containing key-value pairs.
    NodeLeaf,
    /// An internal node containing keys and child pointers.
    NodeInternal,
}

#[derive(Debug, Clone)]
pub struct Node<K> {
    pub node_type: NodeType,
    pub degree: usize,
    pub keys: Vec<K>,
    /// Row offsets, parallel to `keys`. Leaf only.
    pub values: Vec<Offset>,
    /// Child ids, `keys.len() + 1` of them. Internal only.
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    /// Next leaf in ascending key order. Leaf only.
    pub next_leaf: Option<NodeId>,
}

impl<K: IndexKey> Node<K> {
    pub fn new(degree: usize, node_type: NodeType) -> Self {
        let children = match node_type {
            NodeType::NodeLeaf => Vec::new(),
            NodeType::NodeInternal => Vec::with_capacity(degree + 2),
        };
        let values = match node_type {
            NodeType::NodeLeaf => Vec::with_capacity(degree + 1),
            NodeType::NodeInternal => Vec::new(),
        };
        Self {
            node_type,
            degree,
            keys: Vec::with_capacity(degree + 1),
            values,
            children,
            parent: None,
            next_leaf: None,
        }
    }

    pub fn leaf(degree: usize) -> Self {
        Self::new(degree, NodeType::NodeLeaf)
    }

    pub fn internal(degree: usize) -> Self {
        Self::new(degree, NodeType::NodeInternal)
    }

    pub fn is_leaf(&self) -> bool {
        self.node_type == NodeType::NodeLeaf
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn key_num(&self) -> usize {
        self.keys.len()
    }

    /// Minimum number of keys a non-root node has to keep.
    pub fn min_key_num(&self) -> usize {
        (self.degree - 1) / 2
    }

    pub fn first_key(&self) -> Option<&K> {
        self.keys.first()
    }

    /// Returns the child id at `index`.
    ///
    /// # Errors
    /// Returns `Error::InnerInvariant` if the node is a leaf or the slot is empty.
    pub fn child(&self, index: usize) -> Result<NodeId, Error> {
        self.children.get(index).copied().ok_or_else(|| {
            err!(
                InnerInvariant,
                "Child {} requested from a {} node with {} children",
                index,
                self.node_type,
                self.children.len()
            )
        })
    }

    /// Position of `child` among this node's children.
    pub fn child_position(&self, child: NodeId) -> Result<usize, Error> {
        self.children
            .iter()
            .position(|&c| c == child)
            .ok_or_else(|| err!(InnerInvariant, "Node {} is not a child of its parent", child))
    }

    /// Looks a key up in this node using binary search.
    ///
    /// Returns `Ok(index)` on an exact match. Otherwise returns `Err(position)`,
    /// the index of the first key greater than `key` (`key_num` when `key` is
    /// greater than every stored key), which doubles as the insertion point.
    pub fn find_by_key(&self, key: &K) -> Result<usize, usize> {
        if self.keys.is_empty() {
            return Err(0);
        }
        // Out-of-range keys skip the search.
        if self.keys[self.keys.len() - 1] < *key {
            return Err(self.keys.len());
        }
        if self.keys[0] > *key {
            return Err(0);
        }
        self.keys.binary_search(key)
    }

    /// Inserts a separator into an internal node.
    ///
    /// `right_child` lands in the child slot immediately after the separator.
    /// Returns the index the separator was stored at.
    pub fn insert_separator(&mut self, key: K, right_child: NodeId) -> Result<usize, Error> {
        if self.is_leaf() {
            return Err(err!(
                InnerInvariant,
                "Separator {} cannot be inserted into a leaf",
                key
            ));
        }
        match self.find_by_key(&key) {
            Ok(_) => Err(err!(DuplicateKey, "Separator {} already present", key)),
            Err(index) => {
                self.keys.insert(index, key);
                self.children.insert(index + 1, right_child);
                Ok(index)
            }
        }
    }

    /// Inserts a key-value pair into a leaf at its sorted position.
    pub fn insert_entry(&mut self, key: K, value: Offset) -> Result<usize, Error> {
        if !self.is_leaf() {
            return Err(err!(
                InnerInvariant,
                "Entry {} cannot be inserted into an internal node",
                key
            ));
        }
        match self.find_by_key(&key) {
            Ok(_) => Err(err!(DuplicateKey, "Key {} already exists", key)),
            Err(index) => {
                self.keys.insert(index, key);
                self.values.insert(index, value);
                Ok(index)
            }
        }
    }

    /// Splits a full node, returning the promoted key and the new right half.
    ///
    /// Leaf: the key at `min_key_num + 1` and everything after it move right and
    /// the promoted key stays as the first key of the right half. The right half
    /// inherits `next_leaf`; the caller must point this node at the new one.
    ///
    /// Internal: the key at `min_key_num` moves up and is kept by neither half.
    /// The caller must re-parent the children of the returned node.
    pub fn split_node(&mut self) -> Result<(K, Node<K>), Error> {
        if self.key_num() != self.degree {
            return Err(err!(
                InnerInvariant,
                "Split requested on a node with {} keys, degree is {}",
                self.key_num(),
                self.degree
            ));
        }
        let min = self.min_key_num();
        let mut right = Node::new(self.degree, self.node_type);
        right.parent = self.parent;

        let promoted = match self.node_type {
            NodeType::NodeLeaf => {
                right.keys = self.keys.split_off(min + 1);
                right.values = self.values.split_off(min + 1);
                right.next_leaf = self.next_leaf.take();
                right.keys[0].clone()
            }
            NodeType::NodeInternal => {
                right.keys = self.keys.split_off(min + 1);
                right.children = self.children.split_off(min + 1);
                self.keys.pop().ok_or_else(|| {
                    err!(InnerInvariant, "Internal split left no key to promote")
                })?
            }
        };
        Ok((promoted, right))
    }

    /// Removes the key at `index`.
    ///
    /// For leaves the paired value goes too; for internal nodes the child right
    /// of the key (`index + 1`) is detached. Returns the removed key.
    pub fn delete_key_start_by(&mut self, index: usize) -> Result<K, Error> {
        if index >= self.key_num() {
            return Err(err!(
                InnerInvariant,
                "Start index {} to delete is out of {} keys",
                index,
                self.key_num()
            ));
        }
        let key = self.keys.remove(index);
        match self.node_type {
            NodeType::NodeLeaf => {
                self.values.remove(index);
            }
            NodeType::NodeInternal => {
                self.children.remove(index + 1);
            }
        }
        Ok(key)
    }

    /// Collects values from `start_index` on while keys stay `<= terminate_key`.
    ///
    /// Returns `false` once a key greater than `terminate_key` was met in this
    /// node, `true` when the caller should continue with the next leaf.
    pub fn find_in_range(
        &self,
        start_index: usize,
        terminate_key: &K,
        out: &mut Vec<Offset>,
    ) -> bool {
        for i in start_index..self.key_num() {
            if self.keys[i] > *terminate_key {
                return false;
            }
            out.push(self.values[i]);
        }
        true
    }

    /// Collects every value from `start_index` to the end of this leaf.
    ///
    /// Always asks the caller to continue; the scan ends with the leaf chain.
    pub fn find_greater_than(&self, start_index: usize, out: &mut Vec<Offset>) -> bool {
        if start_index < self.values.len() {
            out.extend_from_slice(&self.values[start_index..]);
        }
        true
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::NodeLeaf => write!(f, "Leaf"),
            NodeType::NodeInternal => write!(f, "Internal"),
        }
    }
}

impl<K: IndexKey> fmt::Display for Node<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for key in &self.keys {
            write!(f, "->{}", key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_with(degree: usize, keys: &[i32]) -> Node<i32> {
        let mut node = Node::leaf(degree);
        for &k in keys {
            node.insert_entry(k, k as Offset * 10).unwrap();
        }
        node
    }

    #[test]
    fn test_find_by_key() {
        let node = leaf_with(5, &[10, 20, 30]);
        assert_eq!(node.find_by_key(&20), Ok(1));
        assert_eq!(node.find_by_key(&5), Err(0));
        assert_eq!(node.find_by_key(&25), Err(2));
        assert_eq!(node.find_by_key(&40), Err(3));
        assert_eq!(Node::<i32>::leaf(5).find_by_key(&1), Err(0));
    }

    #[test]
    fn test_insert_entry_keeps_order_and_rejects_duplicates() {
        let mut node = leaf_with(5, &[30, 10, 20]);
        assert_eq!(node.keys, vec![10, 20, 30]);
        assert_eq!(node.values, vec![100, 200, 300]);
        let err = node.insert_entry(20, 1).unwrap_err();
        assert_eq!(err.code(), 2000);
        assert_eq!(node.key_num(), 3);
    }

    #[test]
    fn test_insert_separator() {
        let mut node: Node<i32> = Node::internal(5);
        node.keys.push(20);
        node.children = vec![1, 2];
        assert_eq!(node.insert_separator(10, 3).unwrap(), 0);
        assert_eq!(node.keys, vec![10, 20]);
        assert_eq!(node.children, vec![1, 3, 2]);
        assert_eq!(node.insert_separator(30, 4).unwrap(), 2);
        assert_eq!(node.children, vec![1, 3, 2, 4]);
        assert_eq!(node.insert_separator(30, 5).unwrap_err().code(), 2000);
        assert_eq!(node.insert_entry(40, 1).unwrap_err().code(), 2002);
    }

    #[test]
    fn test_split_leaf() {
        let mut node = leaf_with(4, &[5, 10, 20, 30]);
        node.next_leaf = Some(9);
        let (promoted, right) = node.split_node().unwrap();
        assert_eq!(promoted, 20);
        assert_eq!(node.keys, vec![5, 10]);
        assert_eq!(right.keys, vec![20, 30]);
        assert_eq!(right.values, vec![200, 300]);
        assert_eq!(right.next_leaf, Some(9));
        assert_eq!(node.next_leaf, None);
    }

    #[test]
    fn test_split_internal() {
        let mut node: Node<i32> = Node::internal(5);
        node.keys = vec![10, 20, 30, 40, 50];
        node.children = vec![0, 1, 2, 3, 4, 5];
        let (promoted, right) = node.split_node().unwrap();
        assert_eq!(promoted, 30);
        assert_eq!(node.keys, vec![10, 20]);
        assert_eq!(node.children, vec![0, 1, 2]);
        assert_eq!(right.keys, vec![40, 50]);
        assert_eq!(right.children, vec![3, 4, 5]);
    }

    #[test]
    fn test_split_requires_full_node() {
        let mut node = leaf_with(4, &[1, 2]);
        assert_eq!(node.split_node().unwrap_err().code(), 2002);
    }

    #[test]
    fn test_delete_key_start_by() {
        let mut node = leaf_with(5, &[1, 2, 3]);
        assert_eq!(node.delete_key_start_by(1).unwrap(), 2);
        assert_eq!(node.values, vec![10, 30]);
        assert_eq!(node.delete_key_start_by(2).unwrap_err().code(), 2002);

        let mut internal: Node<i32> = Node::internal(5);
        internal.keys = vec![10, 20];
        internal.children = vec![7, 8, 9];
        internal.delete_key_start_by(0).unwrap();
        assert_eq!(internal.keys, vec![20]);
        assert_eq!(internal.children, vec![7, 9]);
    }

    #[test]
    fn test_range_collection() {
        let node = leaf_with(5, &[1, 2, 3, 4]);
        let mut out = Vec::new();
        assert!(!node.find_in_range(1, &3, &mut out));
        assert_eq!(out, vec![20, 30]);

        let mut out = Vec::new();
        assert!(node.find_in_range(0, &9, &mut out));
        assert_eq!(out.len(), 4);

        let mut out = Vec::new();
        assert!(node.find_greater_than(2, &mut out));
        assert_eq!(out, vec![30, 40]);
        assert!(node.find_greater_than(4, &mut out));
        assert_eq!(out.len(), 2);
    }
}
