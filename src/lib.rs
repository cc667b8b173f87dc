//! # artdict
//!
//! Adaptive Radix Tree dictionary-encoding index for in-memory column
//! stores.
//!
//! Based on "The Adaptive Radix Tree: ARTful Indexing for Main-Memory
//! Databases" (ICDE 2013, Leis et al.)
//!
//! ## Features
//!
//! - **Adaptive node layouts**: 4, 16, 48, or 256 children per node,
//!   chosen by occupancy, with SSE2-accelerated 16-way search
//! - **Prefix compression**: edge labels live in a per-tree suffix
//!   arena, referenced by `(position, length)` pairs
//! - **Intrusive duplicate chains**: per-key row-id lists packed into
//!   one shared `u32` vector, prepend in O(1)
//! - **Structural merge**: trees built independently against a shared
//!   row-id arena fold together without re-inserting keys
//!
//! ## Example
//!
//! ```rust
//! use artdict::{ArtIndex, RowIdChain, Visitor};
//!
//! let mut index = ArtIndex::new(4);
//! index.add_entry(b"osaka", 0);
//! index.add_entry(b"tokyo", 1);
//! index.add_entry(b"osaka", 2);
//!
//! struct Collect(Vec<(Vec<u8>, Vec<u32>)>);
//! impl Visitor for Collect {
//!     fn visit_key(&mut self, key: &[u8], rows: RowIdChain<'_>) {
//!         self.0.push((key.to_vec(), rows.collect()));
//!     }
//! }
//!
//! let mut out = Collect(Vec::new());
//! index.traverse(&mut out);
//! assert_eq!(
//!     out.0,
//!     vec![
//!         (b"osaka".to_vec(), vec![2, 0]),
//!         (b"tokyo".to_vec(), vec![1]),
//!     ]
//! );
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod art;
pub mod rowid;

pub use art::{ArtIndex, FanoutKind, Node, NodeCounts, RowVisitor, Visitor};
pub use rowid::{RowIdArena, RowIdChain, LAST};

#[cfg(test)]
mod proptests;
