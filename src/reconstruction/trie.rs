use std::collections::HashMap;

use crate::differentia::Differentia;

const ROOT: u32 = 0;
const NO_NODE: u32 = u32::MAX;

/// How [`Searchtable::find_descendant`] locates a matching inner node
/// beneath the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// Look up `(rank, differentia)` in a global index and confirm ancestry.
    Indexed,
    /// Walk the subtree window directly. Reference implementation.
    Naive,
}

/// Arena-backed trie over `(rank, differentia)` pairs.
///
/// Node 0 is a virtual root that precedes every rank. Inner nodes stand for
/// retained strata; leaves stand for population members and carry a taxon
/// index. Children keep insertion order through sibling links.
#[derive(Debug, Clone)]
pub struct Searchtable {
    strategy: SearchStrategy,
    parent: Vec<u32>,
    rank: Vec<u64>,
    differentia: Vec<u64>,
    taxon: Vec<Option<u32>>,
    first_child: Vec<u32>,
    last_child: Vec<u32>,
    next_sibling: Vec<u32>,
    /// Inner nodes by `(rank, differentia)`, in creation order.
    index: HashMap<(u64, u64), Vec<u32>>,
    num_leaves: usize,
}

/// A node as emitted in preorder. `parent_row` refers to an earlier row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieRow {
    pub node: u32,
    pub parent_row: Option<usize>,
    pub rank: u64,
    pub taxon: Option<u32>,
}

impl Searchtable {
    pub fn new(strategy: SearchStrategy) -> Self {
        Self {
            strategy,
            parent: vec![NO_NODE],
            rank: vec![0],
            differentia: vec![0],
            taxon: vec![None],
            first_child: vec![NO_NODE],
            last_child: vec![NO_NODE],
            next_sibling: vec![NO_NODE],
            index: HashMap::new(),
            num_leaves: 0,
        }
    }

    pub fn strategy(&self) -> SearchStrategy {
        self.strategy
    }

    /// Number of nodes, virtual root included.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 1
    }

    pub fn num_leaves(&self) -> usize {
        self.num_leaves
    }

    pub fn num_inner_nodes(&self) -> usize {
        self.len() - 1 - self.num_leaves
    }

    pub fn is_leaf(&self, node: u32) -> bool {
        self.taxon[node as usize].is_some()
    }

    pub fn get_parent(&self, node: u32) -> Option<u32> {
        match self.parent[node as usize] {
            NO_NODE => None,
            parent => Some(parent),
        }
    }

    pub fn get_rank(&self, node: u32) -> u64 {
        self.rank[node as usize]
    }

    pub fn iter_children(&self, node: u32) -> impl Iterator<Item = u32> + '_ {
        let mut cur = self.first_child[node as usize];
        std::iter::from_fn(move || {
            (cur != NO_NODE).then(|| {
                let child = cur;
                cur = self.next_sibling[child as usize];
                child
            })
        })
    }

    pub fn num_root_children(&self) -> usize {
        self.iter_children(ROOT).count()
    }

    fn add_node(&mut self, parent: u32, rank: u64, differentia: u64, taxon: Option<u32>) -> u32 {
        let node = self.parent.len() as u32;
        self.parent.push(parent);
        self.rank.push(rank);
        self.differentia.push(differentia);
        self.taxon.push(taxon);
        self.first_child.push(NO_NODE);
        self.last_child.push(NO_NODE);
        self.next_sibling.push(NO_NODE);

        match self.last_child[parent as usize] {
            NO_NODE => self.first_child[parent as usize] = node,
            last => self.next_sibling[last as usize] = node,
        }
        self.last_child[parent as usize] = node;

        if taxon.is_some() {
            self.num_leaves += 1;
        } else if self.strategy == SearchStrategy::Indexed {
            self.index.entry((rank, differentia)).or_default().push(node);
        }
        node
    }

    fn is_match(&self, node: u32, rank: u64, differentia: u64) -> bool {
        !self.is_leaf(node)
            && self.rank[node as usize] == rank
            && self.differentia[node as usize] == differentia
    }

    /// Inner node with `(rank, differentia)` in the subtree below
    /// `ancestor`, reached only through nodes ranked below `rank`.
    ///
    /// A matching direct child wins; otherwise the earliest-created match.
    /// Both strategies give the same answer.
    pub fn find_descendant(&self, ancestor: u32, rank: u64, differentia: u64) -> Option<u32> {
        if let Some(child) = self
            .iter_children(ancestor)
            .find(|&child| self.is_match(child, rank, differentia))
        {
            return Some(child);
        }
        match self.strategy {
            SearchStrategy::Indexed => self.find_indexed(ancestor, rank, differentia),
            SearchStrategy::Naive => self.find_naive(ancestor, rank, differentia),
        }
    }

    fn find_indexed(&self, ancestor: u32, rank: u64, differentia: u64) -> Option<u32> {
        self.index
            .get(&(rank, differentia))?
            .iter()
            .copied()
            .find(|&candidate| self.is_descendant_of(candidate, ancestor))
    }

    fn find_naive(&self, ancestor: u32, rank: u64, differentia: u64) -> Option<u32> {
        let mut best: Option<u32> = None;
        let mut stack: Vec<u32> = self.iter_children(ancestor).collect();
        while let Some(node) = stack.pop() {
            if self.is_leaf(node) {
                continue;
            }
            let node_rank = self.rank[node as usize];
            if node_rank < rank {
                stack.extend(self.iter_children(node));
            } else if self.is_match(node, rank, differentia) {
                best = Some(best.map_or(node, |b| b.min(node)));
            }
        }
        best
    }

    fn is_descendant_of(&self, node: u32, ancestor: u32) -> bool {
        if ancestor == ROOT {
            return true;
        }
        let floor = self.rank[ancestor as usize];
        let mut cur = self.parent[node as usize];
        while cur != NO_NODE && cur != ROOT {
            if cur == ancestor {
                return true;
            }
            if self.rank[cur as usize] <= floor {
                return false;
            }
            cur = self.parent[cur as usize];
        }
        false
    }

    /// Thread one member's retained lineage (ascending ranks) through the
    /// trie, then hang a leaf for it at `leaf_rank`. Returns the leaf.
    pub fn insert<I>(&mut self, lineage: I, leaf_rank: u64, taxon: u32) -> u32
    where
        I: IntoIterator<Item = (u64, Differentia)>,
    {
        let mut current = ROOT;
        for (rank, differentia) in lineage {
            let value = differentia.value();
            current = match self.find_descendant(current, rank, value) {
                Some(existing) => existing,
                None => self.add_node(current, rank, value, None),
            };
        }
        self.add_node(current, leaf_rank, 0, Some(taxon))
    }

    /// Nodes below the virtual root in preorder, children in insertion
    /// order. Collapsing drops inner nodes with a single child, except
    /// those hanging directly from the virtual root.
    pub fn emit(&self, collapse_unifurcations: bool) -> Vec<TrieRow> {
        let mut rows = Vec::with_capacity(self.len() - 1);
        let mut stack: Vec<(u32, Option<usize>)> = Vec::new();
        let push_children = |stack: &mut Vec<(u32, Option<usize>)>, node: u32, row: Option<usize>| {
            let start = stack.len();
            stack.extend(self.iter_children(node).map(|child| (child, row)));
            stack[start..].reverse();
        };
        push_children(&mut stack, ROOT, None);

        while let Some((node, parent_row)) = stack.pop() {
            let collapsible = collapse_unifurcations
                && !self.is_leaf(node)
                && self.parent[node as usize] != ROOT
                && self.iter_children(node).nth(1).is_none()
                && self.first_child[node as usize] != NO_NODE;
            if collapsible {
                push_children(&mut stack, node, parent_row);
                continue;
            }
            rows.push(TrieRow {
                node,
                parent_row,
                rank: self.rank[node as usize],
                taxon: self.taxon[node as usize],
            });
            push_children(&mut stack, node, Some(rows.len() - 1));
        }
        rows
    }
}
