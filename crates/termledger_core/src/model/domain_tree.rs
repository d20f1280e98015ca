//! Customer sub-domain hierarchy.
//!
//! # Responsibility
//! - Hold the per-customer forest of named sub-domain units.
//! - Provide index-path addressed create, rename and delete operations.
//! - Render depth-cycling outline numbering for display.
//!
//! # Invariants
//! - The forest owns its nodes through `children` only; there are no parent
//!   references, so no node can be its own ancestor.
//! - Node ids are unique within one forest.
//! - A path that addresses no node makes the operation a no-op.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable domain node identifier.
pub type DomainNodeId = Uuid;

/// Child-index sequence from the forest root to one node.
pub type NodePath = Vec<usize>;

/// Numbering styles cycle with this period over depth.
const NUMBERING_CYCLE: usize = 5;
const ROMAN_MAX: usize = 3999;

/// Errors from hierarchy operations that indicate a malformed caller input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    /// A node-addressing operation received an empty path.
    EmptyPath,
    /// Two nodes of one forest share an id, e.g. in a tampered snapshot.
    DuplicateNodeId(DomainNodeId),
}

impl Display for HierarchyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "node path must not be empty"),
            Self::DuplicateNodeId(id) => write!(f, "domain node id {id} is not unique"),
        }
    }
}

impl Error for HierarchyError {}

/// One named sub-domain unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainNode {
    pub id: DomainNodeId,
    /// Raw domain-like name as typed by the user.
    pub name: String,
    #[serde(default)]
    pub children: Vec<DomainNode>,
}

impl DomainNode {
    /// Creates a leaf node with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Builder helper used by import paths and tests.
    pub fn with_children(mut self, children: Vec<DomainNode>) -> Self {
        self.children = children;
        self
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(DomainNode::subtree_len)
            .sum::<usize>()
    }
}

/// Ordered root-level list of domain nodes owned by one customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainForest {
    roots: Vec<DomainNode>,
}

impl DomainForest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_roots(roots: Vec<DomainNode>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[DomainNode] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total node count across all depths.
    pub fn len(&self) -> usize {
        self.roots.iter().map(DomainNode::subtree_len).sum()
    }

    /// Appends a root-level node and returns its path.
    pub fn add_root(&mut self, name: impl Into<String>) -> NodePath {
        self.roots.push(DomainNode::new(name.into().trim()));
        vec![self.roots.len() - 1]
    }

    /// Appends an empty-named child under the node at `path`.
    ///
    /// Returns the new child's path, or `None` when `path` addresses no node.
    pub fn add_child(&mut self, path: &[usize]) -> Result<Option<NodePath>, HierarchyError> {
        ensure_non_empty(path)?;
        let Some(parent) = self.node_mut(path) else {
            return Ok(None);
        };
        parent.children.push(DomainNode::new(""));
        let mut child_path = path.to_vec();
        child_path.push(parent.children.len() - 1);
        Ok(Some(child_path))
    }

    /// Inserts an empty-named node directly after `path` under the same parent.
    pub fn add_sibling(&mut self, path: &[usize]) -> Result<Option<NodePath>, HierarchyError> {
        let (last, parent_path) = path.split_last().ok_or(HierarchyError::EmptyPath)?;
        let Some(siblings) = self.siblings_mut(parent_path) else {
            return Ok(None);
        };
        if *last >= siblings.len() {
            return Ok(None);
        }
        siblings.insert(last + 1, DomainNode::new(""));
        let mut sibling_path = parent_path.to_vec();
        sibling_path.push(last + 1);
        Ok(Some(sibling_path))
    }

    /// Renames the node at `path` in place. Returns `false` when absent.
    pub fn rename(
        &mut self,
        path: &[usize],
        name: impl Into<String>,
    ) -> Result<bool, HierarchyError> {
        ensure_non_empty(path)?;
        match self.node_mut(path) {
            Some(node) => {
                node.name = name.into().trim().to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes the node at `path` together with its subtree.
    pub fn delete(&mut self, path: &[usize]) -> Result<Option<DomainNode>, HierarchyError> {
        let (last, parent_path) = path.split_last().ok_or(HierarchyError::EmptyPath)?;
        let Some(siblings) = self.siblings_mut(parent_path) else {
            return Ok(None);
        };
        if *last >= siblings.len() {
            return Ok(None);
        }
        Ok(Some(siblings.remove(*last)))
    }

    /// Resolves one node by path.
    pub fn node(&self, path: &[usize]) -> Option<&DomainNode> {
        let (first, rest) = path.split_first()?;
        let mut cursor = self.roots.get(*first)?;
        for index in rest {
            cursor = cursor.children.get(*index)?;
        }
        Some(cursor)
    }

    /// Finds one node by id.
    pub fn find(&self, id: DomainNodeId) -> Option<&DomainNode> {
        self.enumerate()
            .find(|entry| entry.node.id == id)
            .map(|entry| entry.node)
    }

    /// Returns the current path of the node with `id`.
    pub fn path_of(&self, id: DomainNodeId) -> Option<NodePath> {
        self.enumerate()
            .find(|entry| entry.node.id == id)
            .map(|entry| entry.path)
    }

    /// Re-checks id uniqueness, e.g. after loading a persisted snapshot.
    ///
    /// Reports the first duplicated id in pre-order.
    pub fn validate(&self) -> Result<(), HierarchyError> {
        let mut seen = HashSet::new();
        for entry in self.enumerate() {
            if !seen.insert(entry.node.id) {
                return Err(HierarchyError::DuplicateNodeId(entry.node.id));
            }
        }
        Ok(())
    }

    /// Pre-order walk over all nodes with numbering metadata.
    ///
    /// Each call starts a fresh walk.
    pub fn enumerate(&self) -> DomainWalk<'_> {
        let mut stack = Vec::with_capacity(self.roots.len());
        for (index, node) in self.roots.iter().enumerate().rev() {
            stack.push(WalkFrame {
                node,
                path: vec![index],
                numbering: vec![numbering_marker(0, index)],
            });
        }
        DomainWalk { stack }
    }

    fn node_mut(&mut self, path: &[usize]) -> Option<&mut DomainNode> {
        let (first, rest) = path.split_first()?;
        let mut cursor = self.roots.get_mut(*first)?;
        for index in rest {
            cursor = cursor.children.get_mut(*index)?;
        }
        Some(cursor)
    }

    fn siblings_mut(&mut self, parent_path: &[usize]) -> Option<&mut Vec<DomainNode>> {
        if parent_path.is_empty() {
            return Some(&mut self.roots);
        }
        self.node_mut(parent_path).map(|parent| &mut parent.children)
    }
}

fn ensure_non_empty(path: &[usize]) -> Result<(), HierarchyError> {
    if path.is_empty() {
        return Err(HierarchyError::EmptyPath);
    }
    Ok(())
}

/// One entry yielded by [`DomainForest::enumerate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEntry<'a> {
    pub node: &'a DomainNode,
    /// Child-index path addressing `node`.
    pub path: NodePath,
    /// Display markers from the root down to `node`, e.g. `["1.", "a."]`.
    pub numbering: Vec<String>,
    /// Zero for root-level nodes.
    pub depth: usize,
}

impl DomainEntry<'_> {
    /// Joined outline label, e.g. `"1.a.ii."`.
    pub fn outline(&self) -> String {
        self.numbering.concat()
    }

    /// This node's own marker.
    pub fn marker(&self) -> &str {
        self.numbering.last().map(String::as_str).unwrap_or_default()
    }
}

struct WalkFrame<'a> {
    node: &'a DomainNode,
    path: NodePath,
    numbering: Vec<String>,
}

/// Finite pre-order iterator over a domain forest.
pub struct DomainWalk<'a> {
    stack: Vec<WalkFrame<'a>>,
}

impl<'a> Iterator for DomainWalk<'a> {
    type Item = DomainEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.stack.pop()?;
        let depth = frame.path.len() - 1;
        for (index, child) in frame.node.children.iter().enumerate().rev() {
            let mut path = frame.path.clone();
            path.push(index);
            let mut numbering = frame.numbering.clone();
            numbering.push(numbering_marker(depth + 1, index));
            self.stack.push(WalkFrame {
                node: child,
                path,
                numbering,
            });
        }
        Some(DomainEntry {
            node: frame.node,
            path: frame.path,
            numbering: frame.numbering,
            depth,
        })
    }
}

/// Display marker for the `index`-th (zero-based) sibling at `depth`.
///
/// Depth cycles decimal, alphabetic, roman, decimal, roman.
pub fn numbering_marker(depth: usize, index: usize) -> String {
    let ordinal = index + 1;
    match depth % NUMBERING_CYCLE {
        0 | 3 => format!("{ordinal}."),
        1 => format!("{}.", alphabetic(ordinal)),
        2 | 4 => format!("{}.", roman(ordinal)),
        _ => format!("{ordinal}."),
    }
}

fn alphabetic(mut ordinal: usize) -> String {
    let mut letters = Vec::new();
    while ordinal > 0 {
        let rem = (ordinal - 1) % 26;
        letters.push(char::from(b'a' + rem as u8));
        ordinal = (ordinal - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn roman(ordinal: usize) -> String {
    if ordinal == 0 || ordinal > ROMAN_MAX {
        return ordinal.to_string();
    }
    const TABLE: &[(usize, &str)] = &[
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let mut remaining = ordinal;
    let mut out = String::new();
    for (value, glyph) in TABLE {
        while remaining >= *value {
            out.push_str(glyph);
            remaining -= value;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{numbering_marker, DomainForest, DomainNode, HierarchyError};

    fn sample() -> DomainForest {
        DomainForest::from_roots(vec![
            DomainNode::new("east.acme.com").with_children(vec![
                DomainNode::new("store1.east.acme.com"),
                DomainNode::new("store2.east.acme.com")
                    .with_children(vec![DomainNode::new("kiosk.store2.east.acme.com")]),
            ]),
            DomainNode::new("west.acme.com"),
        ])
    }

    #[test]
    fn markers_cycle_with_depth() {
        assert_eq!(numbering_marker(0, 0), "1.");
        assert_eq!(numbering_marker(1, 1), "b.");
        assert_eq!(numbering_marker(2, 3), "iv.");
        assert_eq!(numbering_marker(3, 0), "1.");
        assert_eq!(numbering_marker(4, 8), "ix.");
        assert_eq!(numbering_marker(5, 1), "2.");
        assert_eq!(numbering_marker(6, 0), "a.");
    }

    #[test]
    fn alphabetic_markers_continue_past_z() {
        assert_eq!(numbering_marker(1, 25), "z.");
        assert_eq!(numbering_marker(1, 26), "aa.");
        assert_eq!(numbering_marker(1, 27), "ab.");
    }

    #[test]
    fn enumerate_is_preorder_and_restartable() {
        let forest = sample();
        let outlines: Vec<(String, usize)> = forest
            .enumerate()
            .map(|entry| (entry.outline(), entry.depth))
            .collect();
        assert_eq!(
            outlines,
            vec![
                ("1.".to_string(), 0),
                ("1.a.".to_string(), 1),
                ("1.b.".to_string(), 1),
                ("1.b.i.".to_string(), 2),
                ("2.".to_string(), 0),
            ]
        );
        assert_eq!(forest.enumerate().count(), 5);
        assert_eq!(forest.len(), 5);
    }

    #[test]
    fn add_child_and_sibling_return_new_paths() {
        let mut forest = DomainForest::new();
        let root = forest.add_root("acme.com");
        assert_eq!(root, vec![0]);

        let child = forest.add_child(&root).unwrap().unwrap();
        assert_eq!(child, vec![0, 0]);
        let sibling = forest.add_sibling(&child).unwrap().unwrap();
        assert_eq!(sibling, vec![0, 1]);

        let inserted = forest.add_sibling(&[0, 0]).unwrap().unwrap();
        assert_eq!(inserted, vec![0, 1]);
        assert_eq!(forest.node(&[0]).unwrap().children.len(), 3);
    }

    #[test]
    fn missing_paths_are_noops() {
        let mut forest = sample();
        let before = forest.clone();

        assert_eq!(forest.add_child(&[9]).unwrap(), None);
        assert_eq!(forest.add_sibling(&[0, 7]).unwrap(), None);
        assert!(!forest.rename(&[0, 0, 4], "x").unwrap());
        assert_eq!(forest.delete(&[3]).unwrap(), None);
        assert_eq!(forest, before);
    }

    #[test]
    fn empty_paths_fail_fast() {
        let mut forest = sample();
        assert_eq!(forest.add_child(&[]), Err(HierarchyError::EmptyPath));
        assert_eq!(forest.add_sibling(&[]), Err(HierarchyError::EmptyPath));
        assert_eq!(forest.rename(&[], "x"), Err(HierarchyError::EmptyPath));
        assert_eq!(forest.delete(&[]), Err(HierarchyError::EmptyPath));
    }

    #[test]
    fn validate_rejects_duplicate_node_ids() {
        let forest = sample();
        assert_eq!(forest.validate(), Ok(()));

        let copy = forest.node(&[0, 1, 0]).unwrap().clone();
        let mut roots = forest.roots().to_vec();
        roots[1].children.push(copy.clone());
        let tampered = DomainForest::from_roots(roots);
        assert_eq!(
            tampered.validate(),
            Err(HierarchyError::DuplicateNodeId(copy.id))
        );

        let json = serde_json::to_value(vec![copy.clone(), copy.clone()]).unwrap();
        let decoded: DomainForest = serde_json::from_value(json).unwrap();
        assert!(decoded.validate().is_err());
    }

    #[test]
    fn delete_removes_whole_subtree() {
        let mut forest = sample();
        let removed = forest.delete(&[0, 1]).unwrap().unwrap();
        assert_eq!(removed.name, "store2.east.acme.com");
        assert_eq!(removed.subtree_len(), 2);
        assert_eq!(forest.len(), 3);
        assert!(forest
            .enumerate()
            .all(|entry| entry.node.name != "kiosk.store2.east.acme.com"));
    }

    #[test]
    fn rename_trims_and_lookup_by_id_tracks_path() {
        let mut forest = sample();
        let id = forest.node(&[1]).unwrap().id;
        assert!(forest.rename(&[1], "  north.acme.com ").unwrap());
        assert_eq!(forest.find(id).unwrap().name, "north.acme.com");

        forest.delete(&[0]).unwrap();
        assert_eq!(forest.path_of(id), Some(vec![0]));
    }
}
