//! Debug utilities for tree troubleshooting.

use super::node::{Fanout, Node, F48_EMPTY};
use super::{ArtIndex, FanoutKind};
use crate::rowid::LAST;

/// Per-layout node tallies, gathered by [`ArtIndex::node_counts`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeCounts {
    /// Nodes with the F4 layout.
    pub f4: usize,
    /// Nodes with the F16 layout.
    pub f16: usize,
    /// Nodes with the F48 layout.
    pub f48: usize,
    /// Nodes with the F256 layout.
    pub f256: usize,
    /// Terminal nodes (keys end here).
    pub terminal: usize,
}

impl ArtIndex {
    /// Tally nodes per fanout layout.
    pub fn node_counts(&self) -> NodeCounts {
        fn count(node: &Node, counts: &mut NodeCounts) {
            match node.kind() {
                FanoutKind::F4 => counts.f4 += 1,
                FanoutKind::F16 => counts.f16 += 1,
                FanoutKind::F48 => counts.f48 += 1,
                FanoutKind::F256 => counts.f256 += 1,
            }
            if node.is_terminal() {
                counts.terminal += 1;
            }
            for (_, child) in node.children() {
                count(child, counts);
            }
        }

        let mut counts = NodeCounts::default();
        count(&self.root, &mut counts);
        counts
    }

    /// Print the tree structure.
    pub fn dump(&self) {
        println!("=== ArtIndex ===");
        println!(
            "unique_keys: {}  nulls: {}  suffix_bytes: {}  arena_cells: {}",
            self.unique_key_count(),
            self.null_count(),
            self.suffixes.len(),
            self.arena_len()
        );
        self.dump_node(&self.root, 0);
        println!("================");
    }

    fn dump_node(&self, node: &Node, indent: usize) {
        let pad = "  ".repeat(indent);
        let prefix = String::from_utf8_lossy(self.prefix_of(node)).into_owned();
        let terminal = if node.is_terminal() {
            format!("  terminal head={}", node.head_row())
        } else {
            String::new()
        };
        println!(
            "{pad}{:?} prefix={prefix:?} children={}{terminal}",
            node.kind(),
            node.children_count()
        );
        for (byte, child) in node.children() {
            println!("{pad}[{:?}] ->", byte as char);
            self.dump_node(child, indent + 1);
        }
    }

    /// Check structural invariants; returns human-readable findings,
    /// empty when the tree is sound.
    pub fn verify(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.root.kind() != FanoutKind::F256 {
            issues.push(format!("root is {:?}, expected F256", self.root.kind()));
        }
        if self.root.prefix_len() != 0 {
            issues.push(format!(
                "root carries a prefix of {} bytes",
                self.root.prefix_len()
            ));
        }
        self.verify_node(&self.root, &mut issues);
        issues
    }

    fn verify_node(&self, node: &Node, issues: &mut Vec<String>) {
        let count = node.children_count();
        let pos = node.prefix_pos as usize;
        let len = node.prefix_len as usize;
        if pos + len > self.suffixes.len() {
            issues.push(format!(
                "prefix range {}..{} outside suffix arena of {} bytes",
                pos,
                pos + len,
                self.suffixes.len()
            ));
        }

        if node.is_terminal() {
            if node.head_row() == LAST {
                issues.push("terminal node with no chain head".to_string());
            } else if node.head_row() as usize >= self.rows.len() {
                issues.push(format!(
                    "chain head {} outside arena of {} cells",
                    node.head_row(),
                    self.rows.len()
                ));
            }
        } else if node.head_row() != LAST {
            issues.push(format!(
                "non-terminal node holds chain head {}",
                node.head_row()
            ));
        }

        match &node.fanout {
            Fanout::F4 { keys, children } => {
                if count > 4 {
                    issues.push(format!("F4 claims {count} children"));
                }
                for pair in keys[..count.min(4)].windows(2) {
                    if pair[0] >= pair[1] {
                        issues.push(format!("F4 keys unsorted: {} then {}", pair[0], pair[1]));
                    }
                }
                for (i, child) in children.iter().enumerate() {
                    if child.is_some() != (i < count) {
                        issues.push(format!("F4 slot {i} occupancy disagrees with count {count}"));
                    }
                }
            }
            Fanout::F16(fan) => {
                if count > 16 {
                    issues.push(format!("F16 claims {count} children"));
                }
                // Flipped storage must still be monotone as signed bytes.
                for pair in fan.keys[..count.min(16)].windows(2) {
                    if pair[0] as i8 >= pair[1] as i8 {
                        issues.push(format!("F16 keys unsorted: {} then {}", pair[0], pair[1]));
                    }
                }
                for (i, child) in fan.children.iter().enumerate() {
                    if child.is_some() != (i < count) {
                        issues.push(format!("F16 slot {i} occupancy disagrees with count {count}"));
                    }
                }
            }
            Fanout::F48(fan) => {
                if count > 48 {
                    issues.push(format!("F48 claims {count} children"));
                }
                let mut seen = [false; 48];
                let mut mapped = 0usize;
                for byte in 0..256 {
                    let slot = fan.index[byte];
                    if slot == F48_EMPTY {
                        continue;
                    }
                    mapped += 1;
                    if slot as usize >= 48 {
                        issues.push(format!("F48 byte {byte} maps to slot {slot}"));
                        continue;
                    }
                    if seen[slot as usize] {
                        issues.push(format!("F48 slot {slot} mapped twice"));
                    }
                    seen[slot as usize] = true;
                    if fan.children[slot as usize].is_none() {
                        issues.push(format!("F48 byte {byte} maps to empty slot {slot}"));
                    }
                }
                if mapped != count {
                    issues.push(format!("F48 maps {mapped} bytes but claims {count}"));
                }
            }
            Fanout::F256(fan) => {
                let live = fan.children.iter().filter(|c| c.is_some()).count();
                if live != count {
                    issues.push(format!("F256 holds {live} children but claims {count}"));
                }
            }
        }

        for (_, child) in node.children() {
            self.verify_node(child, issues);
        }
    }
}
