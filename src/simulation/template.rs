use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::{HstratError, Result};
use crate::reconstruction::AlifeDataFrame;

/// A known phylogeny to grow columns down.
///
/// Nodes are identified by `usize`. Each node owns the edge from its parent,
/// spanning `get_stem_length` generations; a root's stem counts from the seed
/// column.
pub trait TemplatePhylogeny {
    /// Every node, each after its parent.
    fn iter_descending(&self) -> Box<dyn Iterator<Item = usize> + '_>;

    fn get_parent(&self, node: usize) -> Option<usize>;

    fn get_stem_length(&self, node: usize) -> u64;

    /// Nodes that receive an output column.
    fn iter_extant(&self) -> Box<dyn Iterator<Item = usize> + '_>;

    /// Path from the root down to `node`, inclusive.
    fn iter_lineage(&self, node: usize) -> Vec<usize> {
        let mut lineage = vec![node];
        let mut cur = node;
        while let Some(parent) = self.get_parent(cur) {
            lineage.push(parent);
            cur = parent;
        }
        lineage.reverse();
        lineage
    }
}

/// Arena-backed template tree. Node ids are insertion indices, so parents
/// always precede children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateTree {
    parent: Vec<Option<usize>>,
    stem_length: Vec<u64>,
    num_children: Vec<usize>,
}

impl TemplateTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn add_root(&mut self, stem_length: u64) -> usize {
        self.push(None, stem_length)
    }

    pub fn add_child(&mut self, parent: usize, stem_length: u64) -> Result<usize> {
        if parent >= self.len() {
            return Err(HstratError::IndexOutOfBounds {
                index: parent,
                len: self.len(),
            });
        }
        self.num_children[parent] += 1;
        Ok(self.push(Some(parent), stem_length))
    }

    fn push(&mut self, parent: Option<usize>, stem_length: u64) -> usize {
        self.parent.push(parent);
        self.stem_length.push(stem_length);
        self.num_children.push(0);
        self.len() - 1
    }

    pub fn is_leaf(&self, node: usize) -> bool {
        self.num_children.get(node) == Some(&0)
    }

    /// Generations from the seed column to the end of `node`'s stem.
    pub fn calc_depth(&self, node: usize) -> u64 {
        self.iter_lineage(node)
            .into_iter()
            .map(|n| self.stem_length[n])
            .sum()
    }

    /// Read `(id, ancestor_id, origin_time)` rows in alife standard form.
    ///
    /// A root names itself as ancestor and its stem is its origin time;
    /// every other stem is the origin-time difference to its ancestor.
    /// Ancestors must appear before descendants. Returned node ids follow
    /// row order.
    pub fn from_alife_rows(rows: &[(u64, u64, u64)]) -> Result<Self> {
        let mut tree = Self::new();
        let mut node_of: HashMap<u64, (usize, u64)> = HashMap::with_capacity(rows.len());
        for &(id, ancestor_id, origin_time) in rows {
            let node = if id == ancestor_id {
                tree.add_root(origin_time)
            } else {
                let &(parent, parent_time) = node_of.get(&ancestor_id).ok_or_else(|| {
                    HstratError::DeserializationError(format!(
                        "ancestor {ancestor_id} of node {id} not listed before it"
                    ))
                })?;
                let stem = origin_time.checked_sub(parent_time).ok_or_else(|| {
                    HstratError::DeserializationError(format!(
                        "node {id} originates before its ancestor {ancestor_id}"
                    ))
                })?;
                tree.add_child(parent, stem)?
            };
            if node_of.insert(id, (node, origin_time)).is_some() {
                return Err(HstratError::DeserializationError(format!(
                    "duplicate node id {id}"
                )));
            }
        }
        Ok(tree)
    }

    pub fn from_alife_dataframe(df: &AlifeDataFrame) -> Result<Self> {
        let rows: Vec<_> = (0..df.len())
            .map(|row| (df.id[row], df.ancestor_id[row], df.origin_time[row]))
            .collect();
        Self::from_alife_rows(&rows)
    }
}

impl TemplatePhylogeny for TemplateTree {
    fn iter_descending(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        Box::new(0..self.len())
    }

    fn get_parent(&self, node: usize) -> Option<usize> {
        self.parent.get(node).copied().flatten()
    }

    fn get_stem_length(&self, node: usize) -> u64 {
        self.stem_length.get(node).copied().unwrap_or(0)
    }

    /// Leaves in id order.
    fn iter_extant(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        Box::new((0..self.len()).filter(move |&n| self.is_leaf(n)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cherry() -> TemplateTree {
        let mut tree = TemplateTree::new();
        let root = tree.add_root(3);
        let inner = tree.add_child(root, 2).unwrap();
        tree.add_child(inner, 4).unwrap();
        tree.add_child(inner, 1).unwrap();
        tree.add_child(root, 10).unwrap();
        tree
    }

    #[test]
    fn builder_tracks_structure() {
        let tree = cherry();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.iter_extant().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(tree.iter_lineage(3), vec![0, 1, 3]);
        assert_eq!(tree.calc_depth(2), 9);
        assert_eq!(tree.calc_depth(3), 6);
        assert_eq!(tree.calc_depth(4), 13);
        assert_eq!(tree.get_parent(0), None);
    }

    #[test]
    fn add_child_rejects_unknown_parent() {
        let mut tree = TemplateTree::new();
        assert_eq!(
            tree.add_child(0, 1),
            Err(HstratError::IndexOutOfBounds { index: 0, len: 0 })
        );
    }

    #[test]
    fn alife_rows_convert_origin_times_to_stems() {
        let rows = [(7, 7, 3), (8, 7, 5), (9, 8, 9), (10, 8, 6), (11, 7, 13)];
        assert_eq!(TemplateTree::from_alife_rows(&rows).unwrap(), cherry());
    }

    #[test]
    fn alife_rows_reject_bad_order() {
        assert!(TemplateTree::from_alife_rows(&[(1, 0, 2), (0, 0, 0)]).is_err());
        assert!(TemplateTree::from_alife_rows(&[(0, 0, 5), (1, 0, 2)]).is_err());
        assert!(TemplateTree::from_alife_rows(&[(0, 0, 0), (0, 0, 0)]).is_err());
    }
}
