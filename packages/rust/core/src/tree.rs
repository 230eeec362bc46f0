//! In-memory directory tree rebuilt from a [`Manifest`].
//!
//! Nodes live in an arena (`Vec<DirectoryNode>`) and refer to each other by
//! [`NodeId`]. Children are keyed by name in `BTreeMap`s, so every traversal
//! is alphabetical and independent of input order.

use std::collections::BTreeMap;

use crate::organizer::Manifest;

/// Index of a node in the arena.
pub type NodeId = usize;

/// One directory level.
#[derive(Debug, Clone, Default)]
pub struct DirectoryNode {
    /// Components from the root to this node.
    pub segments: Vec<String>,
    /// Sub-directories by name.
    pub dirs: BTreeMap<String, NodeId>,
    /// Files by name, pointing into `Manifest::entries`.
    pub files: BTreeMap<String, usize>,
}

impl DirectoryNode {
    /// Depth below the root (root = 0).
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Relative path with a trailing `/` (empty for the root).
    pub fn display_path(&self) -> String {
        if self.segments.is_empty() {
            String::new()
        } else {
            format!("{}/", self.segments.join("/"))
        }
    }
}

/// Arena-backed directory tree.
#[derive(Debug, Clone)]
pub struct DirectoryTree {
    nodes: Vec<DirectoryNode>,
}

impl DirectoryTree {
    /// The root node's id.
    pub const ROOT: NodeId = 0;

    /// Build the tree from manifest entry paths.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut tree = Self {
            nodes: vec![DirectoryNode::default()],
        };

        for (idx, entry) in manifest.entries.iter().enumerate() {
            let mut node = Self::ROOT;
            for segment in &entry.segments {
                node = tree.child(node, segment);
            }
            tree.nodes[node].files.insert(entry.filename.clone(), idx);
        }

        tree
    }

    /// Find or create the sub-directory `name` under `parent`.
    fn child(&mut self, parent: NodeId, name: &str) -> NodeId {
        if let Some(&id) = self.nodes[parent].dirs.get(name) {
            return id;
        }
        let mut segments = self.nodes[parent].segments.clone();
        segments.push(name.to_string());

        let id = self.nodes.len();
        self.nodes.push(DirectoryNode {
            segments,
            ..DirectoryNode::default()
        });
        self.nodes[parent].dirs.insert(name.to_string(), id);
        id
    }

    /// Node by id.
    pub fn node(&self, id: NodeId) -> &DirectoryNode {
        &self.nodes[id]
    }

    /// The root node.
    pub fn root(&self) -> &DirectoryNode {
        self.node(Self::ROOT)
    }

    /// Every node in depth-first pre-order, sub-directories alphabetical.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![Self::ROOT];
        while let Some(id) = stack.pop() {
            order.push(id);
            // Reverse so the alphabetically first child is popped first.
            stack.extend(self.nodes[id].dirs.values().rev().copied());
        }
        order
    }

    /// Number of directories below the root.
    pub fn dir_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Number of files in the whole tree.
    pub fn file_count(&self) -> usize {
        self.nodes.iter().map(|n| n.files.len()).sum()
    }
}
