//! An arena-backed binary search tree keyed by canonicalized field value,
//! where a search key matches a stored value whenever the stored value
//! *contains* the key as a substring.
//!
//! Grounded on the generic binary-tree and per-field index the catalogue
//! builds at load time: insertion always descends comparing the new value
//! against each node's stored value, and a multi-match query repeats the
//! same search rooted at the previous match's right child rather than doing
//! a plain in-order walk — so results come back in right-subtree order, not
//! insertion order.

use std::cmp::Ordering;

/// One node of the tree: a canonical field value plus the index of the book
/// it came from in the catalogue's book list. `left`/`right` are arena
/// indices, not owning pointers, so the whole tree can be dropped by
/// dropping the `Vec` that backs it.
struct ValueNode {
    value: String,
    book: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// Compares a search/insert key against a stored node value: they compare
/// equal whenever the stored value contains the key as a substring, and
/// fall back to lexicographic order otherwise. Not transitive, by design —
/// it only needs to behave consistently along the single root-to-node path
/// a lookup or insert actually walks.
fn compare(key: &str, node_value: &str) -> Ordering {
    if node_value.contains(key) {
        Ordering::Equal
    } else {
        key.cmp(node_value)
    }
}

/// Per-field binary search tree over book indices.
pub struct ValueTree {
    nodes: Vec<ValueNode>,
    root: Option<usize>,
}

impl ValueTree {
    pub fn new() -> Self {
        ValueTree {
            nodes: Vec::new(),
            root: None,
        }
    }

    /// Inserts `value` (already canonicalized) pointing at `book`. On a
    /// comparator tie (the existing value contains the new one), descends
    /// right, same as any other non-less-than comparison.
    pub fn insert(&mut self, value: String, book: usize) {
        let mut slot = self.root;
        let mut parent_slot: Option<(usize, bool)> = None; // (parent index, went_left)

        while let Some(idx) = slot {
            match compare(&value, &self.nodes[idx].value) {
                Ordering::Less => {
                    parent_slot = Some((idx, true));
                    slot = self.nodes[idx].left;
                }
                Ordering::Equal | Ordering::Greater => {
                    parent_slot = Some((idx, false));
                    slot = self.nodes[idx].right;
                }
            }
        }

        let new_idx = self.nodes.len();
        self.nodes.push(ValueNode {
            value,
            book,
            left: None,
            right: None,
        });

        match parent_slot {
            None => self.root = Some(new_idx),
            Some((parent, true)) => self.nodes[parent].left = Some(new_idx),
            Some((parent, false)) => self.nodes[parent].right = Some(new_idx),
        }
    }

    /// Finds the first node (searching from `root`) whose stored value
    /// contains `key`, returning its arena index.
    fn search_from(&self, mut slot: Option<usize>, key: &str) -> Option<usize> {
        while let Some(idx) = slot {
            match compare(key, &self.nodes[idx].value) {
                Ordering::Less => slot = self.nodes[idx].left,
                Ordering::Greater => slot = self.nodes[idx].right,
                Ordering::Equal => return Some(idx),
            }
        }
        None
    }

    /// Returns every book index whose indexed value for this field contains
    /// `key`, in the order the repeated right-subtree search visits them —
    /// not a plain in-order traversal.
    pub fn find_all(&self, key: &str) -> Vec<usize> {
        let mut out = Vec::new();
        let mut slot = self.search_from(self.root, key);
        while let Some(idx) = slot {
            out.push(self.nodes[idx].book);
            slot = self.search_from(self.nodes[idx].right, key);
        }
        out
    }
}

impl Default for ValueTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_exact_and_containing_values() {
        let mut tree = ValueTree::new();
        tree.insert("umbertoeco".to_string(), 0);
        tree.insert("italocalvino".to_string(), 1);
        tree.insert("danteAlighieri".to_lowercase(), 2);

        assert_eq!(tree.find_all("eco"), vec![0]);
        assert_eq!(tree.find_all("calvino"), vec![1]);
    }

    #[test]
    fn empty_tree_finds_nothing() {
        let tree = ValueTree::new();
        assert!(tree.find_all("anything").is_empty());
    }

    #[test]
    fn finds_multiple_matches_via_right_subtree_continuation() {
        let mut tree = ValueTree::new();
        tree.insert("umbertoeco".to_string(), 0);
        tree.insert("francoeco".to_string(), 1);
        tree.insert("marcoeco".to_string(), 2);

        let mut found = tree.find_all("eco");
        found.sort_unstable();
        assert_eq!(found, vec![0, 1, 2]);
    }
}
