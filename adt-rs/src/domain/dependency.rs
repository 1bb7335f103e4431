use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One node in a CDS dependency tree: the entity name, its type (DDLS view,
/// TABLE, ...), whether the server reports it inactive, and its children.
///
/// CDS graphs can be cyclic; the server expands them into a finite tree, so
/// a cycle shows up as a node whose name already occurs on the path from the
/// root. [`DependencyTree::find_cycles`] flags exactly those back edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyNode {
    pub name: String,
    pub node_type: String,
    #[serde(default)]
    pub inactive: bool,
    #[serde(default)]
    pub children: Vec<DependencyNode>,
}

impl DependencyNode {
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        DependencyNode {
            name: name.into(),
            node_type: node_type.into(),
            inactive: false,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<DependencyNode>) -> Self {
        self.children = children;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyTree {
    pub root: DependencyNode,
}

impl DependencyTree {
    pub fn new(root: DependencyNode) -> Self {
        DependencyTree { root }
    }

    /// All nodes in pre-order.
    pub fn flatten(&self) -> Vec<&DependencyNode> {
        let mut out = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            out.push(node);
            for child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Tree depth: a leaf has depth 1, otherwise 1 + max over children.
    pub fn depth(&self) -> usize {
        fn depth_of(node: &DependencyNode) -> usize {
            1 + node.children.iter().map(depth_of).max().unwrap_or(0)
        }
        depth_of(&self.root)
    }

    /// Node count per type, ordered by type name.
    pub fn count_by_type(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for node in self.flatten() {
            *counts.entry(node.node_type.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Leaf nodes whose type is a database table, the physical base of the
    /// view stack.
    pub fn table_leaves(&self) -> Vec<&DependencyNode> {
        self.flatten()
            .into_iter()
            .filter(|node| {
                node.children.is_empty()
                    && matches!(node.node_type.to_uppercase().as_str(), "TABLE" | "TABL")
            })
            .collect()
    }

    /// DFS back-edge detection: every edge (parent, child) where the child's
    /// name is already on the current root path is a cycle edge.
    pub fn find_cycles(&self) -> Vec<(String, String)> {
        let mut cycles = Vec::new();
        let mut path: Vec<&str> = Vec::new();
        fn visit<'a>(
            node: &'a DependencyNode,
            path: &mut Vec<&'a str>,
            cycles: &mut Vec<(String, String)>,
        ) {
            path.push(&node.name);
            for child in &node.children {
                if path.iter().any(|name| *name == child.name) {
                    cycles.push((node.name.clone(), child.name.clone()));
                } else {
                    visit(child, path, cycles);
                }
            }
            path.pop();
        }
        visit(&self.root, &mut path, &mut cycles);
        cycles
    }
}
