//! Adaptive Radix Tree keyed by raw bytes, indexing row-ids.
//!
//! Based on "The Adaptive Radix Tree: ARTful Indexing for Main-Memory
//! Databases" (ICDE 2013, Leis et al.), specialised for dictionary
//! encoding: a key maps to the chain of row-ids it was inserted with,
//! compressed prefixes live in a per-tree suffix arena, and
//! independently built trees sharing one row-id arena can be folded
//! together without re-inserting a single key.

mod debug;
mod node;

use std::sync::Arc;

pub use debug::NodeCounts;
pub use node::{FanoutKind, Node};

use crate::rowid::{RowIdArena, RowIdChain, LAST};

/// Observer for [`ArtIndex::traverse`].
pub trait Visitor {
    /// Called for every node in preorder, before the node's own prefix
    /// is appended to `prefix`. `depth` is the number of key bytes
    /// above the node.
    fn visit_node(&mut self, _node: &Node, _prefix: &[u8], _depth: u32) {}

    /// Called at every terminal node with the reconstructed key and
    /// its row-id chain, most recent first.
    fn visit_key(&mut self, key: &[u8], rows: RowIdChain<'_>);
}

/// Observer for [`ArtIndex::traverse_rows`]; no key reconstruction is
/// performed.
pub trait RowVisitor {
    /// Called at every terminal node with its row-id chain, most
    /// recent first.
    fn visit_rows(&mut self, rows: RowIdChain<'_>);
}

/// Dictionary-encoding index over byte-string keys.
///
/// Ingests `(key, row-id)` pairs, the same key possibly many times,
/// and supports ordered traversal of each unique key with its row-ids
/// plus structural merging of trees built against one shared
/// [`RowIdArena`]. Write- and scan-oriented: there is no point lookup
/// and no deletion.
pub struct ArtIndex {
    /// Always an F256 node with an empty prefix.
    root: Box<Node>,
    /// Compressed prefix storage; nodes reference `(pos, len)` ranges.
    suffixes: Vec<u8>,
    rows: Arc<RowIdArena>,
    /// Head of the chain of row-ids inserted with the empty key.
    null_head: u32,
    null_count: u32,
    /// Distinct non-empty keys; the empty key is accounted separately
    /// through `null_head`.
    unique_keys: usize,
    max_key_len: usize,
    total_key_bytes: usize,
}

impl ArtIndex {
    /// Create a tree with a fresh row-id arena of `capacity` cells.
    pub fn new(capacity: usize) -> Self {
        Self::new_sharing(Arc::new(RowIdArena::new(capacity)))
    }

    /// Create an empty tree over an existing row-id arena.
    pub fn new_sharing(rows: Arc<RowIdArena>) -> Self {
        Self {
            root: Box::new(Node::new256()),
            suffixes: Vec::new(),
            rows,
            null_head: LAST,
            null_count: 0,
            unique_keys: 0,
            max_key_len: 0,
            total_key_bytes: 0,
        }
    }

    /// Index `key` under `row_id`.
    ///
    /// `row_id` must be below [`arena_len`](Self::arena_len), and each
    /// row-id must be inserted at most once across all trees sharing
    /// the arena. Empty keys go through [`add_null`](Self::add_null).
    pub fn add_entry(&mut self, key: &[u8], row_id: u32) {
        debug_assert!(!key.is_empty(), "empty keys go through add_null");

        self.total_key_bytes += key.len();
        self.max_key_len = self.max_key_len.max(key.len());

        let Self {
            root,
            suffixes,
            rows,
            unique_keys,
            ..
        } = self;
        let mut node: &mut Node = root;
        let mut depth = 0usize;

        loop {
            // Longest match between the key tail and the node prefix.
            let prefix =
                &suffixes[node.prefix_pos as usize..(node.prefix_pos + node.prefix_len) as usize];
            let m = prefix
                .iter()
                .zip(&key[depth..])
                .take_while(|(a, b)| a == b)
                .count();

            if depth + m == key.len() && m == node.prefix_len as usize {
                // The key ends exactly at this node.
                chain_row(node, row_id, rows, unique_keys);
                return;
            }

            if m < node.prefix_len as usize {
                // The prefix disagrees with the key at byte `m`: splice
                // a branch node above and carve the shared part into it.
                let mut old = Box::new(std::mem::replace(node, Node::new4()));
                if m > 0 {
                    node.prefix_pos = old.prefix_pos;
                    node.prefix_len = m as u32;
                    old.prefix_pos += m as u32;
                    old.prefix_len -= m as u32;
                }
                let edge = suffixes[old.prefix_pos as usize];
                old.prefix_pos += 1;
                old.prefix_len -= 1;
                node.insert_child(edge, old);

                if depth + m < key.len() {
                    // The unmatched key tail branches off on its own leaf.
                    let leaf = new_leaf(&key[depth + m + 1..], suffixes);
                    let slot = node.insert_child(key[depth + m], Box::new(leaf));
                    chain_row(slot, row_id, rows, unique_keys);
                } else {
                    // The key ends at the split point.
                    chain_row(node, row_id, rows, unique_keys);
                }
                return;
            }

            // Prefix fully matched with key bytes left: descend.
            let edge = key[depth + m];
            match node.find_child(edge) {
                Some(slot) => {
                    node = { node }.child_mut(slot);
                    depth += m + 1;
                }
                None => {
                    let leaf = new_leaf(&key[depth + m + 1..], suffixes);
                    let slot = node.insert_child(edge, Box::new(leaf));
                    chain_row(slot, row_id, rows, unique_keys);
                    return;
                }
            }
        }
    }

    /// Insert a zero-length key under `row_id`.
    ///
    /// Kept off the tree entirely: the row-id is prepended onto the
    /// tree's null chain.
    pub fn add_null(&mut self, row_id: u32) {
        self.rows.set(row_id, self.null_head);
        self.null_head = row_id;
        self.null_count += 1;
    }

    /// Preorder walk over every node, reconstructing keys.
    pub fn traverse<V: Visitor>(&self, visitor: &mut V) {
        let mut key = Vec::with_capacity(self.max_key_len);
        self.traverse_node(&self.root, visitor, &mut key, 0);
    }

    fn traverse_node<V: Visitor>(&self, node: &Node, visitor: &mut V, key: &mut Vec<u8>, depth: u32) {
        visitor.visit_node(node, key, depth);

        key.extend_from_slice(self.prefix_of(node));
        let depth = depth + node.prefix_len;

        if node.terminal {
            visitor.visit_key(key, self.rows.chain(node.head_row));
        }

        for (byte, child) in node.children() {
            key.push(byte);
            self.traverse_node(child, visitor, key, depth + 1);
            key.truncate(depth as usize);
        }
    }

    /// Preorder walk over the terminal nodes only; emits each key's
    /// row-id chain without reconstructing the key.
    pub fn traverse_rows<V: RowVisitor>(&self, visitor: &mut V) {
        self.traverse_node_rows(&self.root, visitor);
    }

    fn traverse_node_rows<V: RowVisitor>(&self, node: &Node, visitor: &mut V) {
        if node.terminal {
            visitor.visit_rows(self.rows.chain(node.head_row));
        }
        for (_, child) in node.children() {
            self.traverse_node_rows(child, visitor);
        }
    }

    /// Return an empty tree sharing this tree's row-id arena, for
    /// independent building and a later [`join`](Self::join).
    pub fn split(&self) -> ArtIndex {
        Self::new_sharing(Arc::clone(&self.rows))
    }

    /// Fold `other` into `self`, consuming it.
    ///
    /// Both trees must share one row-id arena. `other`'s keys, its
    /// duplicate chains, and its null chain all end up in `self`
    /// without re-inserting any key; per key, `other`'s row-ids become
    /// the more recent run of the combined chain.
    pub fn join(&mut self, mut other: ArtIndex) {
        debug_assert!(
            Arc::ptr_eq(&self.rows, &other.rows),
            "joined trees must share a row-id arena"
        );

        // Drain the donor null chain first, oldest link first so the
        // prepends keep the donor's own most-recent-first order. Each
        // prepend overwrites the cell the cursor just came from, so
        // the link is cached before the write.
        let mut cursor = self.rows.reverse_chain(other.null_head);
        while cursor != LAST {
            let next = self.rows.get(cursor);
            self.add_null(cursor);
            cursor = next;
        }
        other.null_head = LAST;

        let ArtIndex {
            root: donor_root,
            suffixes: donor_suffixes,
            total_key_bytes: donor_total,
            max_key_len: donor_max,
            ..
        } = other;
        let mut ctx = MergeCtx {
            suffixes: &mut self.suffixes,
            donor_suffixes: &donor_suffixes,
            rows: &self.rows,
            unique_keys: &mut self.unique_keys,
        };
        merge(&mut self.root, donor_root, &mut ctx);

        self.total_key_bytes += donor_total;
        self.max_key_len = self.max_key_len.max(donor_max);
    }

    /// Destroy all nodes and counters and install a fresh root. The
    /// row-id arena keeps its size; its cells are left as-is because
    /// no chain head references them any more.
    pub fn reset(&mut self) {
        self.root = Box::new(Node::new256());
        self.suffixes = Vec::new();
        self.null_head = LAST;
        self.null_count = 0;
        self.unique_keys = 0;
        self.max_key_len = 0;
        self.total_key_bytes = 0;
    }

    /// Grow the row-id arena's capacity for at least `additional`
    /// further cells.
    pub fn reserve(&self, additional: usize) {
        self.rows.reserve(additional);
    }

    /// Resize the row-id arena to `new_len` cells.
    pub fn resize(&self, new_len: usize) {
        self.rows.resize(new_len);
    }

    /// Number of row-ids inserted with the empty key.
    pub fn null_count(&self) -> u32 {
        self.null_count
    }

    /// Number of distinct keys indexed, counting the empty key when
    /// any null was inserted.
    pub fn unique_key_count(&self) -> usize {
        self.unique_keys + usize::from(self.null_head != LAST)
    }

    /// Length of the longest key inserted so far.
    pub fn max_key_length(&self) -> usize {
        self.max_key_len
    }

    /// Sum of the byte lengths of every inserted key.
    pub fn total_key_bytes(&self) -> usize {
        self.total_key_bytes
    }

    /// Number of cells in the row-id arena.
    pub fn arena_len(&self) -> usize {
        self.rows.len()
    }

    /// The shared row-id arena handle.
    pub fn rows(&self) -> &Arc<RowIdArena> {
        &self.rows
    }

    /// Chain of row-ids inserted with the empty key, most recent first.
    pub fn null_rows(&self) -> RowIdChain<'_> {
        self.rows.chain(self.null_head)
    }

    fn prefix_of(&self, node: &Node) -> &[u8] {
        &self.suffixes[node.prefix_pos as usize..(node.prefix_pos + node.prefix_len) as usize]
    }
}

/// Fresh leaf-to-be holding `rest` as its compressed prefix.
fn new_leaf(rest: &[u8], suffixes: &mut Vec<u8>) -> Node {
    let mut leaf = Node::new4();
    leaf.prefix_len = rest.len() as u32;
    if !rest.is_empty() {
        leaf.prefix_pos = suffixes.len() as u32;
        suffixes.extend_from_slice(rest);
    }
    leaf
}

/// Prepend `row_id` onto the node's duplicate chain, marking the node
/// terminal on first use.
fn chain_row(node: &mut Node, row_id: u32, rows: &RowIdArena, unique_keys: &mut usize) {
    if !node.terminal {
        node.terminal = true;
        *unique_keys += 1;
    }
    rows.set(row_id, node.head_row);
    node.head_row = row_id;
}

struct MergeCtx<'a> {
    suffixes: &'a mut Vec<u8>,
    donor_suffixes: &'a [u8],
    rows: &'a RowIdArena,
    unique_keys: &'a mut usize,
}

/// Structural union of the donor subtree `right` into the recipient
/// node `left`. The same three prefix cases as the insertion walk,
/// except that both sides carry compressed prefixes.
fn merge(left: &mut Node, mut right: Box<Node>, ctx: &mut MergeCtx<'_>) {
    let left_prefix =
        &ctx.suffixes[left.prefix_pos as usize..(left.prefix_pos + left.prefix_len) as usize];
    let right_prefix = &ctx.donor_suffixes
        [right.prefix_pos as usize..(right.prefix_pos + right.prefix_len) as usize];
    let m = left_prefix
        .iter()
        .zip(right_prefix)
        .take_while(|(a, b)| a == b)
        .count();

    if m == left.prefix_len as usize && m == right.prefix_len as usize {
        // Prefixes agree entirely; the nodes coincide.
        merge_children(left, right, ctx);
        return;
    }

    if m < left.prefix_len as usize {
        // The left prefix diverges at `m`: splice a branch node above
        // the left node and carve the shared part into it.
        let mut old = Box::new(std::mem::replace(left, Node::new4()));
        if m > 0 {
            left.prefix_pos = old.prefix_pos;
            left.prefix_len = m as u32;
            old.prefix_pos += m as u32;
            old.prefix_len -= m as u32;
            right.prefix_pos += m as u32;
            right.prefix_len -= m as u32;
        }
        let edge = ctx.suffixes[old.prefix_pos as usize];
        old.prefix_pos += 1;
        old.prefix_len -= 1;
        left.insert_child(edge, old);

        if right.prefix_len > 0 {
            // The donor keeps prefix bytes past the split: rebase its
            // subtree into the recipient arena and hang it off its
            // leading byte.
            let edge = ctx.donor_suffixes[right.prefix_pos as usize];
            right.prefix_pos += 1;
            right.prefix_len -= 1;
            move_prefix(&mut right, ctx);
            left.insert_child(edge, right);
        } else {
            merge_children(left, right, ctx);
        }
        return;
    }

    // The left prefix is a strict prefix of the right prefix: strip it
    // from the donor and descend under the donor's next byte.
    debug_assert!(m < right.prefix_len as usize, "merge prefix cases exhausted");
    right.prefix_pos += m as u32;
    right.prefix_len -= m as u32;
    let edge = ctx.donor_suffixes[right.prefix_pos as usize];
    right.prefix_pos += 1;
    right.prefix_len -= 1;

    match left.find_child(edge) {
        Some(slot) => merge(left.child_mut(slot), right, ctx),
        None => {
            move_prefix(&mut right, ctx);
            left.insert_child(edge, right);
        }
    }
}

/// Merge every child of the donor node `right` into `left`, draining
/// the donor's duplicate chain first.
fn merge_children(left: &mut Node, mut right: Box<Node>, ctx: &mut MergeCtx<'_>) {
    if right.terminal {
        // Drain oldest link first so the prepends keep the donor's
        // most-recent-first order. Each prepend rewrites the cell the
        // cursor just left, so the link is cached before the write.
        let mut cursor = ctx.rows.reverse_chain(right.head_row);
        while cursor != LAST {
            let next = ctx.rows.get(cursor);
            chain_row(left, cursor, ctx.rows, ctx.unique_keys);
            cursor = next;
        }
    }

    for (byte, mut child) in right.take_children() {
        match left.find_child(byte) {
            Some(slot) => merge(left.child_mut(slot), child, ctx),
            None => {
                move_prefix(&mut child, ctx);
                left.insert_child(byte, child);
            }
        }
    }
}

/// Rebase a donor subtree's prefixes into the recipient suffix arena
/// and account its terminals. Row-id chains stay put: the arena is
/// shared.
fn move_prefix(node: &mut Node, ctx: &mut MergeCtx<'_>) {
    if node.prefix_len > 0 {
        let start = node.prefix_pos as usize;
        let new_pos = ctx.suffixes.len() as u32;
        ctx.suffixes
            .extend_from_slice(&ctx.donor_suffixes[start..start + node.prefix_len as usize]);
        node.prefix_pos = new_pos;
    }
    if node.terminal {
        *ctx.unique_keys += 1;
    }
    node.for_each_child_mut(|child| move_prefix(child, ctx));
}
