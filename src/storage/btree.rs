//! The B+ tree is the lookup engine behind every index.
//!
//! Why is a tree a good data structure for an index?
//! - Searching for a particular value is fast (logarithmic time)
//! - Inserting / deleting a value you've already found is fast (constant-ish time to rebalance)
//! - Traversing a range of values is fast (unlike a hash map)
//!
//! Each node can have up to `degree` children worth of keys before it has to split, and every
//! node but the root keeps at least `min_key_num = (degree - 1) / 2` keys. All values live in
//! the leaves; internal nodes only route. Leaves are chained left to right, so a range scan is
//! one descent followed by a walk along the chain.
//!
//! Nodes live in an arena owned by the tree and refer to each other by `NodeId`. A node owns
//! its children through their ids; `parent` and `next_leaf` are plain ids with no ownership.
//!
//! | Operation         | Cost                               |
//! |-------------------|------------------------------------|
//! | **Lookup by key** | O(height)                          |
//! | **Insertion**     | O(height)                          |
//! | **Deletion**      | O(height)                          |
//! | **Range scan**    | O(height + leaves touched)         |
//!
use super::cursor::{Cursor, LeafIter};
use super::key::IndexKey;
use super::node::{Node, NodeId, Offset};
use crate::errors::Error;
use std::fmt;
use tracing::{debug, trace};

/// Page size 4 kilobytes because it's the same size as a page used in
/// the virtual memory systems of most computer architectures.
pub const PAGE_SIZE: usize = 4096;

/// Size of the occupancy field at the start of a page.
const LENGTH_FIELD_SIZE: usize = std::mem::size_of::<u32>();

/// Smallest degree for which splits and merges keep every node non-empty.
pub const MIN_DEGREE: usize = 3;

/// Computes the fan-out that fits a page of `page_size` bytes for keys of type `K`.
pub fn degree_for<K: IndexKey>(page_size: usize) -> usize {
    page_size.saturating_sub(LENGTH_FIELD_SIZE) / (K::width() + std::mem::size_of::<Offset>())
}

#[derive(Debug)]
pub struct BPlusTree<K: IndexKey> {
    name: String,
    nodes: Vec<Option<Node<K>>>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
    leaf_head: Option<NodeId>,
    key_num: usize,
    level: usize,
    node_num: usize,
    degree: usize,
    min_key_num: usize,
}

impl<K: IndexKey> BPlusTree<K> {
    /// Creates an empty tree with the given fan-out.
    ///
    /// The tree starts as a single empty leaf that is both root and leaf head.
    ///
    /// # Errors
    /// Returns `Error::Config` if `degree` is below `MIN_DEGREE`.
    pub fn new(name: &str, degree: usize) -> Result<Self, Error> {
        if degree < MIN_DEGREE {
            return Err(err!(
                Config,
                "Degree {} of index '{}' is below the minimum of {}",
                degree,
                name,
                MIN_DEGREE
            ));
        }
        let mut tree = Self {
            name: name.to_string(),
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            leaf_head: None,
            key_num: 0,
            level: 0,
            node_num: 0,
            degree,
            min_key_num: (degree - 1) / 2,
        };
        tree.initialize();
        Ok(tree)
    }

    /// Creates an empty tree whose fan-out is derived from a page size.
    pub fn with_page_size(name: &str, page_size: usize) -> Result<Self, Error> {
        Self::new(name, degree_for::<K>(page_size))
    }

    fn initialize(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.node_num = 0;
        let root = self.alloc(Node::leaf(self.degree));
        self.root = Some(root);
        self.leaf_head = Some(root);
        self.key_num = 0;
        self.level = 1;
    }

    /// Releases every node. The next insertion starts a fresh tree.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.root = None;
        self.leaf_head = None;
        self.key_num = 0;
        self.level = 0;
        self.node_num = 0;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of keys stored.
    pub fn len(&self) -> usize {
        self.key_num
    }

    pub fn is_empty(&self) -> bool {
        self.key_num == 0
    }

    /// Number of levels, 0 for a tree without a root.
    pub fn height(&self) -> usize {
        self.level
    }

    pub fn node_count(&self) -> usize {
        self.node_num
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn min_key_num(&self) -> usize {
        self.min_key_num
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn leaf_head(&self) -> Option<NodeId> {
        self.leaf_head
    }

    /// Iterates over all entries in ascending key order along the leaf chain.
    pub fn iter(&self) -> LeafIter<'_, K> {
        LeafIter::new(self)
    }

    /// Returns the node stored under `id`.
    ///
    /// # Errors
    /// Returns `Error::InnerInvariant` if the slot was never allocated or was released.
    pub fn node(&self, id: NodeId) -> Result<&Node<K>, Error> {
        self.nodes
            .get(id as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| err!(InnerInvariant, "Node {} is not allocated", id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node<K>, Error> {
        self.nodes
            .get_mut(id as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| err!(InnerInvariant, "Node {} is not allocated", id))
    }

    /// Stores a node in the arena, reusing a released slot when there is one.
    fn alloc(&mut self, node: Node<K>) -> NodeId {
        self.node_num += 1;
        match self.free.pop() {
            Some(id) => {
                self.nodes[id as usize] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                (self.nodes.len() - 1) as NodeId
            }
        }
    }

    fn release(&mut self, id: NodeId) -> Result<Node<K>, Error> {
        let node = self
            .nodes
            .get_mut(id as usize)
            .and_then(Option::take)
            .ok_or_else(|| err!(InnerInvariant, "Node {} released twice", id))?;
        self.free.push(id);
        self.node_num -= 1;
        Ok(node)
    }

    fn leftmost_leaf(&self, id: NodeId) -> Result<NodeId, Error> {
        let mut id = id;
        loop {
            let node = self.node(id)?;
            if node.is_leaf() {
                return Ok(id);
            }
            id = node.child(0)?;
        }
    }

    /// Descends from the root to the leaf position of `key`.
    ///
    /// Returns `None` when the tree has no root.
    pub fn find(&self, key: &K) -> Result<Option<Cursor>, Error> {
        let mut id = match self.root {
            Some(id) => id,
            None => return Ok(None),
        };
        loop {
            let node = self.node(id)?;
            match (node.find_by_key(key), node.is_leaf()) {
                (Ok(index), true) => {
                    return Ok(Some(Cursor {
                        leaf: id,
                        index,
                        found: true,
                    }))
                }
                (Err(index), true) => {
                    return Ok(Some(Cursor {
                        leaf: id,
                        index,
                        found: false,
                    }))
                }
                (Ok(index), false) => {
                    // A separator is the first entry of the leftmost leaf on its right.
                    let leaf = self.leftmost_leaf(node.child(index + 1)?)?;
                    if self.node(leaf)?.first_key() != Some(key) {
                        return Err(err!(
                            InnerInvariant,
                            "Separator {} has no matching leaf entry in index '{}'",
                            key,
                            self.name
                        ));
                    }
                    return Ok(Some(Cursor {
                        leaf,
                        index: 0,
                        found: true,
                    }));
                }
                (Err(index), false) => id = node.child(index)?,
            }
        }
    }

    /// Returns the offset stored with `key`, if any.
    pub fn search_by_key(&self, key: &K) -> Result<Option<Offset>, Error> {
        match self.find(key)? {
            Some(cursor) if cursor.found => Ok(Some(self.node(cursor.leaf)?.values[cursor.index])),
            _ => Ok(None),
        }
    }

    pub fn contains(&self, key: &K) -> Result<bool, Error> {
        Ok(self.search_by_key(key)?.is_some())
    }

    /// Inserts `key` with its row offset.
    ///
    /// # Errors
    /// Returns `Error::DuplicateKey` if the key is already stored. The tree is left unchanged.
    pub fn insert(&mut self, key: K, value: Offset) -> Result<(), Error> {
        if self.root.is_none() {
            self.initialize();
        }
        let cursor = self
            .find(&key)?
            .ok_or_else(|| err!(InnerInvariant, "Index '{}' has no root", self.name))?;
        if cursor.found {
            return Err(err!(
                DuplicateKey,
                "Key {} already exists in index '{}'",
                key,
                self.name
            ));
        }

        let degree = self.degree;
        let leaf = self.node_mut(cursor.leaf)?;
        leaf.insert_entry(key, value)?;
        let full = leaf.key_num() == degree;
        self.key_num += 1;

        if full {
            self.adjust_after_insert(cursor.leaf)?;
        }
        Ok(())
    }

    /// Splits `id` and every ancestor that overflows in turn.
    fn adjust_after_insert(&mut self, id: NodeId) -> Result<(), Error> {
        let mut id = id;
        loop {
            let (promoted, right) = self.node_mut(id)?.split_node()?;
            let is_leaf = right.is_leaf();
            let parent = right.parent;
            let transferred = right.children.clone();
            let right_id = self.alloc(right);

            for child in transferred {
                self.node_mut(child)?.parent = Some(right_id);
            }
            // The old leaf's sibling becomes the new leaf; the new leaf already
            // carries whatever used to follow the old one.
            if is_leaf {
                self.node_mut(id)?.next_leaf = Some(right_id);
            }
            trace!(
                index = %self.name,
                node = id,
                right = right_id,
                key = %promoted,
                "Split node."
            );

            match parent {
                None => {
                    let mut root = Node::internal(self.degree);
                    root.keys.push(promoted);
                    root.children = vec![id, right_id];
                    let root_id = self.alloc(root);
                    self.node_mut(id)?.parent = Some(root_id);
                    self.node_mut(right_id)?.parent = Some(root_id);
                    self.root = Some(root_id);
                    self.level += 1;
                    debug!(
                        index = %self.name,
                        root = root_id,
                        height = self.level,
                        "Created a new root."
                    );
                    return Ok(());
                }
                Some(parent) => {
                    let degree = self.degree;
                    let node = self.node_mut(parent)?;
                    node.insert_separator(promoted, right_id)?;
                    if node.key_num() < degree {
                        return Ok(());
                    }
                    id = parent;
                }
            }
        }
    }

    /// Removes `key` and returns the offset that was stored with it.
    ///
    /// # Errors
    /// Returns `Error::KeyNotExist` if the key is not stored. The tree is left unchanged.
    /// Returns `Error::InnerInvariant` if the tree has no root.
    pub fn delete_by_key(&mut self, key: &K) -> Result<Offset, Error> {
        if self.root.is_none() {
            return Err(err!(
                InnerInvariant,
                "Index '{}' to delete from has a null root",
                self.name
            ));
        }
        let cursor = match self.find(key)? {
            Some(cursor) if cursor.found => cursor,
            _ => {
                return Err(err!(
                    KeyNotExist,
                    "Key {} does not exist in index '{}'",
                    key,
                    self.name
                ))
            }
        };

        let leaf = self.node_mut(cursor.leaf)?;
        let value = leaf.values[cursor.index];
        leaf.delete_key_start_by(cursor.index)?;
        self.key_num -= 1;

        if cursor.index == 0 {
            self.update_separator(cursor.leaf)?;
        }
        self.adjust_after_delete(cursor.leaf)?;
        Ok(value)
    }

    /// Rewrites the ancestor separator that mirrors the first key of `leaf`.
    ///
    /// That separator sits in the lowest ancestor reached through a child other
    /// than the first one. The leaf head has no such ancestor. Empty leaves are
    /// skipped; underflow repair refreshes them once they hold keys again.
    fn update_separator(&mut self, leaf: NodeId) -> Result<(), Error> {
        let node = self.node(leaf)?;
        let first = match node.first_key() {
            Some(key) => key.clone(),
            None => return Ok(()),
        };
        let mut child = leaf;
        let mut parent = node.parent;
        while let Some(id) = parent {
            let node = self.node_mut(id)?;
            let position = node.child_position(child)?;
            if position > 0 {
                node.keys[position - 1] = first;
                return Ok(());
            }
            child = id;
            parent = node.parent;
        }
        Ok(())
    }

    /// Restores minimum occupancy from `id` upwards.
    fn adjust_after_delete(&mut self, id: NodeId) -> Result<(), Error> {
        let mut id = id;
        loop {
            let node = self.node(id)?;
            let parent = match node.parent {
                Some(parent) => parent,
                None => return self.adjust_root(id),
            };
            if node.key_num() >= self.min_key_num {
                return Ok(());
            }
            let is_leaf = node.is_leaf();

            // The last child leans on its left sibling; every other node leans right.
            let parent_node = self.node(parent)?;
            let position = parent_node.child_position(id)?;
            let lean_left = position > 0 && position == parent_node.key_num();
            let (left, right, separator) = if lean_left {
                (parent_node.child(position - 1)?, id, position - 1)
            } else {
                (id, parent_node.child(position + 1)?, position)
            };
            let sibling = if lean_left { left } else { right };

            if self.node(sibling)?.key_num() > self.min_key_num {
                if is_leaf {
                    self.redistribute_leaf(parent, left, right, separator, lean_left)?;
                } else {
                    self.redistribute_internal(parent, left, right, separator, lean_left)?;
                }
                return Ok(());
            }

            if is_leaf {
                self.merge_leaf(parent, left, right, separator)?;
            } else {
                self.merge_internal(parent, left, right, separator)?;
            }
            id = parent;
        }
    }

    fn adjust_root(&mut self, id: NodeId) -> Result<(), Error> {
        let node = self.node(id)?;
        if node.key_num() > 0 {
            return Ok(());
        }
        if node.is_leaf() {
            self.release(id)?;
            self.root = None;
            self.leaf_head = None;
            self.level = self.level.saturating_sub(1);
            debug!(index = %self.name, "Index became empty.");
        } else {
            let child = node.child(0)?;
            self.release(id)?;
            self.node_mut(child)?.parent = None;
            self.root = Some(child);
            self.level = self.level.saturating_sub(1);
            debug!(
                index = %self.name,
                root = child,
                height = self.level,
                "Collapsed the root."
            );
        }
        Ok(())
    }

    /// Moves one entry between adjacent leaves and fixes the separator between them.
    fn redistribute_leaf(
        &mut self,
        parent: NodeId,
        left: NodeId,
        right: NodeId,
        separator: usize,
        from_left: bool,
    ) -> Result<(), Error> {
        trace!(index = %self.name, left, right, from_left, "Redistributing leaves.");
        if from_left {
            let donor = self.node_mut(left)?;
            let key = donor.keys.pop();
            let value = donor.values.pop();
            let (key, value) = match (key, value) {
                (Some(key), Some(value)) => (key, value),
                _ => return Err(err!(InnerInvariant, "Leaf {} has nothing to lend", left)),
            };
            let receiver = self.node_mut(right)?;
            receiver.keys.insert(0, key.clone());
            receiver.values.insert(0, value);
            self.node_mut(parent)?.keys[separator] = key;
        } else {
            let donor = self.node_mut(right)?;
            let key = donor.keys.remove(0);
            let value = donor.values.remove(0);
            let new_first = donor
                .first_key()
                .cloned()
                .ok_or_else(|| err!(InnerInvariant, "Leaf {} drained by a loan", right))?;
            let receiver = self.node_mut(left)?;
            receiver.keys.push(key);
            receiver.values.push(value);
            self.node_mut(parent)?.keys[separator] = new_first;
            self.update_separator(left)?;
        }
        Ok(())
    }

    /// Rotates one key and its adjacent child through the parent separator.
    fn redistribute_internal(
        &mut self,
        parent: NodeId,
        left: NodeId,
        right: NodeId,
        separator: usize,
        from_left: bool,
    ) -> Result<(), Error> {
        trace!(index = %self.name, left, right, from_left, "Redistributing internal nodes.");
        if from_left {
            let donor = self.node_mut(left)?;
            let (key, child) = match (donor.keys.pop(), donor.children.pop()) {
                (Some(key), Some(child)) => (key, child),
                _ => return Err(err!(InnerInvariant, "Node {} has nothing to lend", left)),
            };
            let pulled = std::mem::replace(&mut self.node_mut(parent)?.keys[separator], key);
            let receiver = self.node_mut(right)?;
            receiver.keys.insert(0, pulled);
            receiver.children.insert(0, child);
            self.node_mut(child)?.parent = Some(right);
        } else {
            let donor = self.node_mut(right)?;
            if donor.keys.is_empty() || donor.children.is_empty() {
                return Err(err!(InnerInvariant, "Node {} has nothing to lend", right));
            }
            let key = donor.keys.remove(0);
            let child = donor.children.remove(0);
            let pulled = std::mem::replace(&mut self.node_mut(parent)?.keys[separator], key);
            let receiver = self.node_mut(left)?;
            receiver.keys.push(pulled);
            receiver.children.push(child);
            self.node_mut(child)?.parent = Some(left);
        }
        Ok(())
    }

    /// Folds the right leaf into the left one and unlinks it from the chain.
    fn merge_leaf(
        &mut self,
        parent: NodeId,
        left: NodeId,
        right: NodeId,
        separator: usize,
    ) -> Result<(), Error> {
        trace!(index = %self.name, left, right, "Merging leaves.");
        self.node_mut(parent)?.delete_key_start_by(separator)?;
        let absorbed = self.release(right)?;
        let receiver = self.node_mut(left)?;
        receiver.keys.extend(absorbed.keys);
        receiver.values.extend(absorbed.values);
        receiver.next_leaf = absorbed.next_leaf;
        self.update_separator(left)
    }

    /// Folds the right internal node into the left one, pulling the separator down.
    fn merge_internal(
        &mut self,
        parent: NodeId,
        left: NodeId,
        right: NodeId,
        separator: usize,
    ) -> Result<(), Error> {
        trace!(index = %self.name, left, right, "Merging internal nodes.");
        let pulled = self.node_mut(parent)?.delete_key_start_by(separator)?;
        let absorbed = self.release(right)?;
        for &child in &absorbed.children {
            self.node_mut(child)?.parent = Some(left);
        }
        let receiver = self.node_mut(left)?;
        receiver.keys.push(pulled);
        receiver.keys.extend(absorbed.keys);
        receiver.children.extend(absorbed.children);
        Ok(())
    }

    /// Walks the leaf chain from `leaf`, handing each node to `visit` until it asks to stop.
    fn walk<F>(
        &self,
        leaf: Option<NodeId>,
        start_index: usize,
        results: &mut Vec<Offset>,
        mut visit: F,
    ) -> Result<(), Error>
    where
        F: FnMut(&Node<K>, usize, &mut Vec<Offset>) -> bool,
    {
        let mut leaf = leaf;
        let mut index = start_index;
        while let Some(id) = leaf {
            let node = self.node(id)?;
            if !visit(node, index, results) {
                break;
            }
            leaf = node.next_leaf;
            index = 0;
        }
        Ok(())
    }

    /// Returns the offsets of all keys in `[min(begin, end), max(begin, end)]`.
    ///
    /// Results are sorted ascending and free of duplicates.
    pub fn search_between(&self, begin: &K, end: &K) -> Result<Vec<Offset>, Error> {
        let (low, high) = if begin <= end { (begin, end) } else { (end, begin) };
        let mut results = Vec::new();
        if let Some(cursor) = self.find(low)? {
            self.walk(Some(cursor.leaf), cursor.index, &mut results, |node, start, out| {
                node.find_in_range(start, high, out)
            })?;
        }
        Ok(sort_dedup(results))
    }

    /// Returns the offsets of all keys `>= begin`.
    pub fn search_greater(&self, begin: &K) -> Result<Vec<Offset>, Error> {
        let mut results = Vec::new();
        if let Some(cursor) = self.find(begin)? {
            self.walk(Some(cursor.leaf), cursor.index, &mut results, |node, start, out| {
                node.find_greater_than(start, out)
            })?;
        }
        Ok(sort_dedup(results))
    }

    /// Returns the offsets of all keys `<= end`, scanning from the smallest key.
    pub fn search_smaller(&self, end: &K) -> Result<Vec<Offset>, Error> {
        let mut results = Vec::new();
        self.walk(self.leaf_head, 0, &mut results, |node, start, out| {
            node.find_in_range(start, end, out)
        })?;
        Ok(sort_dedup(results))
    }

    /// Checks every structural invariant of the tree.
    ///
    /// # Errors
    /// Returns `Error::InnerInvariant` describing the first violation found.
    pub fn validate(&self) -> Result<(), Error> {
        let root = match self.root {
            Some(root) => root,
            None => {
                if self.key_num != 0 || self.leaf_head.is_some() || self.node_num != 0 {
                    return Err(err!(
                        InnerInvariant,
                        "Index '{}' has no root but still accounts for keys or nodes",
                        self.name
                    ));
                }
                return Ok(());
            }
        };
        if self.node(root)?.parent.is_some() {
            return Err(err!(InnerInvariant, "Root {} has a parent", root));
        }

        let mut leaves = Vec::new();
        let mut nodes = 0;
        self.validate_node(root, 1, None, None, &mut leaves, &mut nodes)?;
        if nodes != self.node_num {
            return Err(err!(
                InnerInvariant,
                "Index '{}' counts {} nodes, {} reachable",
                self.name,
                self.node_num,
                nodes
            ));
        }

        let mut chain = Vec::new();
        let mut leaf = self.leaf_head;
        while let Some(id) = leaf {
            chain.push(id);
            if chain.len() > leaves.len() {
                return Err(err!(InnerInvariant, "Leaf chain of '{}' is cyclic", self.name));
            }
            leaf = self.node(id)?.next_leaf;
        }
        if chain != leaves {
            return Err(err!(
                InnerInvariant,
                "Leaf chain of '{}' does not match the leaf level",
                self.name
            ));
        }

        let mut total = 0;
        let mut previous: Option<&K> = None;
        for (key, _) in self.iter() {
            if previous.map_or(false, |p| p >= key) {
                return Err(err!(InnerInvariant, "Leaf chain is out of order at {}", key));
            }
            previous = Some(key);
            total += 1;
        }
        if total != self.key_num {
            return Err(err!(
                InnerInvariant,
                "Index '{}' counts {} keys, leaf chain holds {}",
                self.name,
                self.key_num,
                total
            ));
        }
        Ok(())
    }

    fn validate_node<'a>(
        &'a self,
        id: NodeId,
        depth: usize,
        lower: Option<&'a K>,
        upper: Option<&'a K>,
        leaves: &mut Vec<NodeId>,
        nodes: &mut usize,
    ) -> Result<(), Error> {
        let node = self.node(id)?;
        *nodes += 1;

        if node.keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err(err!(InnerInvariant, "Keys of node {} are not increasing", id));
        }
        if node.key_num() >= self.degree {
            return Err(err!(InnerInvariant, "Node {} overflows with {} keys", id, node.key_num()));
        }
        if !node.is_root() && node.key_num() < self.min_key_num {
            return Err(err!(
                InnerInvariant,
                "Node {} underflows with {} keys",
                id,
                node.key_num()
            ));
        }
        let out_of_bounds = node.keys.iter().any(|k| {
            lower.map_or(false, |l| k < l) || upper.map_or(false, |u| k >= u)
        });
        if out_of_bounds {
            return Err(err!(InnerInvariant, "Node {} holds keys outside its range", id));
        }

        if node.is_leaf() {
            if depth != self.level {
                return Err(err!(
                    InnerInvariant,
                    "Leaf {} sits at depth {}, height is {}",
                    id,
                    depth,
                    self.level
                ));
            }
            if node.values.len() != node.key_num() {
                return Err(err!(InnerInvariant, "Leaf {} has unpaired values", id));
            }
            leaves.push(id);
            return Ok(());
        }

        if node.children.len() != node.key_num() + 1 {
            return Err(err!(
                InnerInvariant,
                "Node {} has {} keys and {} children",
                id,
                node.key_num(),
                node.children.len()
            ));
        }
        for (i, &child) in node.children.iter().enumerate() {
            if self.node(child)?.parent != Some(id) {
                return Err(err!(InnerInvariant, "Child {} does not point back to {}", child, id));
            }
            if i > 0 {
                let leaf = self.leftmost_leaf(child)?;
                if self.node(leaf)?.first_key() != Some(&node.keys[i - 1]) {
                    return Err(err!(
                        InnerInvariant,
                        "Separator {} of node {} is not the minimum of its right subtree",
                        node.keys[i - 1],
                        id
                    ));
                }
            }
            let child_lower = if i == 0 { lower } else { Some(&node.keys[i - 1]) };
            let child_upper = if i == node.key_num() { upper } else { Some(&node.keys[i]) };
            self.validate_node(child, depth + 1, child_lower, child_upper, leaves, nodes)?;
        }
        Ok(())
    }
}

fn sort_dedup(mut results: Vec<Offset>) -> Vec<Offset> {
    results.sort_unstable();
    results.dedup();
    results
}

/// Prints the leaf level, one leaf per line.
impl<K: IndexKey> fmt::Display for BPlusTree<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut leaf = self.leaf_head;
        while let Some(id) = leaf {
            let node = self.node(id).map_err(|_| fmt::Error)?;
            writeln!(f, "{}", node)?;
            leaf = node.next_leaf;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::key::{char_key, CharKey, Float};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeMap;

    fn tree_with(degree: usize, keys: &[i32]) -> BPlusTree<i32> {
        let mut tree = BPlusTree::new("test", degree).unwrap();
        for &k in keys {
            tree.insert(k, k as Offset).unwrap();
        }
        tree.validate().unwrap();
        tree
    }

    fn leaf_keys(tree: &BPlusTree<i32>) -> Vec<i32> {
        tree.iter().map(|(k, _)| *k).collect()
    }

    /// Keys of every leaf, left to right.
    fn leaf_groups(tree: &BPlusTree<i32>) -> Vec<Vec<i32>> {
        let mut groups = Vec::new();
        let mut leaf = tree.leaf_head();
        while let Some(id) = leaf {
            let node = tree.node(id).unwrap();
            groups.push(node.keys.clone());
            leaf = node.next_leaf;
        }
        groups
    }

    fn root_keys(tree: &BPlusTree<i32>) -> Vec<i32> {
        tree.node(tree.root().unwrap()).unwrap().keys.clone()
    }

    #[test]
    fn test_degree_for_page_size() {
        assert_eq!(degree_for::<i32>(PAGE_SIZE), 511);
        assert_eq!(degree_for::<Float>(PAGE_SIZE), 511);
        assert_eq!(degree_for::<CharKey>(PAGE_SIZE), 15);
        let tree = BPlusTree::<i32>::with_page_size("t", PAGE_SIZE).unwrap();
        assert_eq!(tree.degree(), 511);
        assert_eq!(tree.min_key_num(), 255);
    }

    #[test]
    fn test_new_rejects_small_degree() {
        let err = BPlusTree::<i32>::new("t", 2).unwrap_err();
        assert_eq!(err.code(), 6000);
        assert!(BPlusTree::<i32>::with_page_size("t", 16).is_err());
    }

    #[test]
    fn test_empty_tree() {
        let tree = BPlusTree::<i32>::new("t", 4).unwrap();
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.search_by_key(&1).unwrap(), None);
        assert!(tree.search_between(&0, &10).unwrap().is_empty());
        assert!(tree.search_greater(&0).unwrap().is_empty());
        assert!(tree.search_smaller(&0).unwrap().is_empty());
        tree.validate().unwrap();
    }

    #[test]
    fn test_split_scenario_degree_four() {
        let mut tree = tree_with(4, &[10, 20, 30]);
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.node_count(), 1);

        tree.insert(5, 5).unwrap();
        tree.validate().unwrap();
        assert_eq!(tree.height(), 2);
        assert_eq!(tree.node_count(), 3);

        let root = tree.node(tree.root().unwrap()).unwrap();
        assert_eq!(root.keys, vec![20]);
        let left = tree.node(root.children[0]).unwrap();
        let right = tree.node(root.children[1]).unwrap();
        assert_eq!(left.keys, vec![5, 10]);
        assert_eq!(right.keys, vec![20, 30]);
        assert_eq!(left.next_leaf, Some(root.children[1]));
        assert_eq!(tree.leaf_head(), Some(root.children[0]));

        assert_eq!(tree.search_by_key(&20).unwrap(), Some(20));
        assert_eq!(tree.search_between(&5, &30).unwrap(), vec![5, 10, 20, 30]);

        // The underflowing first leaf borrows from its right sibling.
        tree.delete_by_key(&5).unwrap();
        tree.delete_by_key(&10).unwrap();
        tree.validate().unwrap();
        assert_eq!(tree.height(), 2);
        let root = tree.node(tree.root().unwrap()).unwrap();
        assert_eq!(root.keys, vec![30]);

        // With nothing left to borrow the leaves merge and the root collapses.
        tree.delete_by_key(&20).unwrap();
        tree.validate().unwrap();
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(leaf_keys(&tree), vec![30]);
    }

    #[test]
    fn test_last_leaf_borrows_from_left_sibling() {
        let mut tree = tree_with(4, &[10, 20, 30, 5]);
        assert_eq!(leaf_groups(&tree), vec![vec![5, 10], vec![20, 30]]);

        tree.delete_by_key(&20).unwrap();
        tree.validate().unwrap();
        assert_eq!(root_keys(&tree), vec![30]);

        // The emptied leaf is the last child, so it takes from [5, 10].
        tree.delete_by_key(&30).unwrap();
        tree.validate().unwrap();
        assert_eq!(tree.height(), 2);
        assert_eq!(root_keys(&tree), vec![10]);
        assert_eq!(leaf_groups(&tree), vec![vec![5], vec![10]]);
        assert_eq!(tree.search_by_key(&10).unwrap(), Some(10));
    }

    #[test]
    fn test_last_leaf_merges_into_left_sibling() {
        let mut tree = tree_with(4, &[10, 20, 30, 40, 50, 60]);
        assert_eq!(root_keys(&tree), vec![30, 50]);
        assert_eq!(
            leaf_groups(&tree),
            vec![vec![10, 20], vec![30, 40], vec![50, 60]]
        );

        tree.delete_by_key(&60).unwrap();
        tree.delete_by_key(&50).unwrap();
        tree.validate().unwrap();
        assert_eq!(root_keys(&tree), vec![30, 40]);
        assert_eq!(leaf_groups(&tree), vec![vec![10, 20], vec![30], vec![40]]);

        tree.delete_by_key(&40).unwrap();
        tree.validate().unwrap();
        assert_eq!(root_keys(&tree), vec![30]);
        assert_eq!(leaf_groups(&tree), vec![vec![10, 20], vec![30]]);
    }

    #[test]
    fn test_last_internal_child_leans_left() {
        let keys: Vec<i32> = (1..=10).map(|k| k * 10).collect();
        let mut tree = tree_with(4, &keys);
        tree.insert(41, 41).unwrap();
        tree.insert(42, 42).unwrap();
        tree.validate().unwrap();
        assert_eq!(tree.height(), 3);
        assert_eq!(root_keys(&tree), vec![50]);
        let root = tree.node(tree.root().unwrap()).unwrap();
        assert_eq!(tree.node(root.children[0]).unwrap().keys, vec![30, 41]);
        assert_eq!(tree.node(root.children[1]).unwrap().keys, vec![70, 90]);

        for k in [100, 90, 80, 70, 60] {
            tree.delete_by_key(&k).unwrap();
            tree.validate().unwrap();
        }

        // The right internal node emptied and rotated a child in from the left.
        assert_eq!(tree.height(), 3);
        assert_eq!(root_keys(&tree), vec![41]);
        let root = tree.node(tree.root().unwrap()).unwrap();
        let left = tree.node(root.children[0]).unwrap();
        let right = tree.node(root.children[1]).unwrap();
        assert_eq!(left.keys, vec![30]);
        assert_eq!(right.keys, vec![50]);
        assert_eq!(tree.node(right.children[0]).unwrap().keys, vec![41, 42]);
        assert_eq!(
            leaf_groups(&tree),
            vec![vec![10, 20], vec![30, 40], vec![41, 42], vec![50]]
        );

        // Nothing left to lend: the right internal node folds into the left one.
        tree.delete_by_key(&50).unwrap();
        tree.delete_by_key(&42).unwrap();
        tree.validate().unwrap();
        assert_eq!(tree.height(), 2);
        assert_eq!(root_keys(&tree), vec![30, 41]);
        assert_eq!(leaf_groups(&tree), vec![vec![10, 20], vec![30, 40], vec![41]]);
    }

    #[test]
    fn test_duplicate_insert_leaves_tree_unchanged() {
        let mut tree = tree_with(4, &[1, 2, 3, 4, 5, 6]);
        let before = tree.to_string();
        let err = tree.insert(4, 99).unwrap_err();
        assert_eq!(err.code(), 2000);
        // Keys duplicated into internal separators are rejected too.
        let separator = tree.node(tree.root().unwrap()).unwrap().keys[0];
        assert_eq!(tree.insert(separator, 99).unwrap_err().code(), 2000);
        assert_eq!(tree.to_string(), before);
        assert_eq!(tree.len(), 6);
        assert_eq!(tree.search_by_key(&4).unwrap(), Some(4));
        tree.validate().unwrap();
    }

    #[test]
    fn test_delete_twice_fails() {
        let mut tree = tree_with(3, &[1, 2, 3, 4, 5]);
        assert_eq!(tree.delete_by_key(&3).unwrap(), 3);
        let err = tree.delete_by_key(&3).unwrap_err();
        assert_eq!(err.code(), 2001);
        assert_eq!(tree.len(), 4);
        tree.validate().unwrap();
    }

    #[test]
    fn test_tree_empties_and_restarts() {
        let mut tree = tree_with(3, &[7]);
        tree.delete_by_key(&7).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.root(), None);
        assert_eq!(tree.leaf_head(), None);
        tree.validate().unwrap();
        assert_eq!(tree.search_by_key(&7).unwrap(), None);
        assert!(tree.search_smaller(&100).unwrap().is_empty());
        assert_eq!(tree.delete_by_key(&7).unwrap_err().code(), 2002);

        tree.insert(8, 80).unwrap();
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.search_by_key(&8).unwrap(), Some(80));
        tree.validate().unwrap();
    }

    #[test]
    fn test_separator_follows_deleted_first_key() {
        let keys: Vec<i32> = (1..=40).collect();
        let mut tree = tree_with(3, &keys);
        assert!(tree.height() > 3);
        for k in (2..=40).step_by(3) {
            tree.delete_by_key(&k).unwrap();
            tree.validate().unwrap();
        }
        for k in (2..=40).step_by(3) {
            assert_eq!(tree.search_by_key(&k).unwrap(), None);
        }
        assert_eq!(tree.search_by_key(&39).unwrap(), Some(39));
    }

    #[test]
    fn test_descending_deletes_collapse_tree() {
        let keys: Vec<i32> = (0..100).collect();
        let mut tree = tree_with(5, &keys);
        for k in (0..100).rev() {
            tree.delete_by_key(&k).unwrap();
            tree.validate().unwrap();
        }
        assert!(tree.is_empty());
        assert_eq!(tree.node_count(), 0);
    }

    #[test]
    fn test_range_queries() {
        let keys: Vec<i32> = (0..50).map(|k| k * 2).collect();
        let tree = tree_with(4, &keys);

        assert_eq!(tree.search_between(&10, &16).unwrap(), vec![10, 12, 14, 16]);
        assert_eq!(tree.search_between(&11, &15).unwrap(), vec![12, 14]);
        assert_eq!(tree.search_between(&16, &10).unwrap(), vec![10, 12, 14, 16]);
        assert!(tree.search_between(&1000, &2000).unwrap().is_empty());

        assert_eq!(tree.search_greater(&94).unwrap(), vec![94, 96, 98]);
        assert_eq!(tree.search_greater(&95).unwrap(), vec![96, 98]);
        assert_eq!(tree.search_greater(&-5).unwrap().len(), 50);

        assert_eq!(tree.search_smaller(&4).unwrap(), vec![0, 2, 4]);
        assert_eq!(tree.search_smaller(&5).unwrap(), vec![0, 2, 4]);
        assert!(tree.search_smaller(&-1).unwrap().is_empty());
        assert_eq!(tree.search_smaller(&98).unwrap(), tree.search_between(&0, &98).unwrap());
    }

    #[test]
    fn test_search_between_dedups_shared_offsets() {
        let mut tree = BPlusTree::<i32>::new("t", 4).unwrap();
        for k in 0..20 {
            tree.insert(k, (k / 2) as Offset).unwrap();
        }
        assert_eq!(tree.search_between(&0, &5).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_float_and_char_keys() {
        let mut floats = BPlusTree::<Float>::new("f", 4).unwrap();
        for (i, v) in [3.5f32, -1.25, 0.0, 9.75, 2.0].iter().enumerate() {
            floats.insert(Float(*v), i as Offset).unwrap();
        }
        floats.validate().unwrap();
        assert_eq!(floats.search_by_key(&Float(9.75)).unwrap(), Some(3));
        assert_eq!(
            floats.search_between(&Float(-2.0), &Float(2.0)).unwrap(),
            vec![1, 2, 4]
        );

        let mut names = BPlusTree::<CharKey>::new("c", 3).unwrap();
        for (i, name) in ["mallory", "alice", "carol", "bob", "dave", "eve"].iter().enumerate() {
            names.insert(char_key(name), i as Offset).unwrap();
        }
        names.validate().unwrap();
        assert_eq!(names.search_by_key(&char_key("bob")).unwrap(), Some(3));
        assert_eq!(
            names.search_smaller(&char_key("c")).unwrap(),
            vec![1, 3]
        );
        names.delete_by_key(&char_key("alice")).unwrap();
        names.validate().unwrap();
        assert_eq!(names.search_by_key(&char_key("alice")).unwrap(), None);
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut tree = tree_with(4, &[1, 2, 3, 4, 5, 6, 7, 8]);
        tree.clear();
        assert_eq!(tree.node_count(), 0);
        assert_eq!(tree.height(), 0);
        tree.validate().unwrap();
        tree.insert(1, 1).unwrap();
        tree.validate().unwrap();
    }

    #[test]
    fn test_random_workload_matches_model() {
        for degree in [3, 4, 5, 8, 16] {
            let mut rng = StdRng::seed_from_u64(degree as u64);
            let mut tree = BPlusTree::<i32>::new("random", degree).unwrap();
            let mut model: BTreeMap<i32, Offset> = BTreeMap::new();

            for step in 0..3000u32 {
                let key = rng.gen_range(-300..300);
                if rng.gen_bool(0.6) {
                    let inserted = tree.insert(key, step);
                    if model.contains_key(&key) {
                        assert_eq!(inserted.unwrap_err().code(), 2000);
                    } else {
                        inserted.unwrap();
                        model.insert(key, step);
                    }
                } else {
                    let deleted = tree.delete_by_key(&key);
                    match model.remove(&key) {
                        Some(value) => assert_eq!(deleted.unwrap(), value),
                        None => assert_eq!(deleted.unwrap_err().code(), 2001),
                    }
                }
                if step % 50 == 0 {
                    tree.validate().unwrap();
                }
            }
            tree.validate().unwrap();
            assert_eq!(tree.len(), model.len());

            let chain: Vec<(i32, Offset)> = tree.iter().map(|(k, v)| (*k, v)).collect();
            let expected: Vec<(i32, Offset)> = model.iter().map(|(k, v)| (*k, *v)).collect();
            assert_eq!(chain, expected);

            for key in -310..310 {
                assert_eq!(tree.search_by_key(&key).unwrap(), model.get(&key).copied());
            }
            for _ in 0..100 {
                let a = rng.gen_range(-320..320);
                let b = rng.gen_range(-320..320);
                let (low, high) = if a <= b { (a, b) } else { (b, a) };
                let mut expected: Vec<Offset> = model.range(low..=high).map(|(_, v)| *v).collect();
                expected.sort_unstable();
                assert_eq!(tree.search_between(&a, &b).unwrap(), expected);
                assert_eq!(
                    tree.search_between(&a, &b).unwrap(),
                    tree.search_between(&b, &a).unwrap()
                );

                let mut greater: Vec<Offset> = model.range(a..).map(|(_, v)| *v).collect();
                greater.sort_unstable();
                assert_eq!(tree.search_greater(&a).unwrap(), greater);

                let mut smaller: Vec<Offset> = model.range(..=b).map(|(_, v)| *v).collect();
                smaller.sort_unstable();
                assert_eq!(tree.search_smaller(&b).unwrap(), smaller);
            }
        }
    }
}
