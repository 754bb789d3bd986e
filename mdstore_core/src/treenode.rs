//! Generic path-indexed tree used for dataset and file hierarchies.

use crate::error::{Error, Result};
use crate::path::MetadataPath;
use std::collections::BTreeMap;

/// A node that optionally holds a value and optionally has named children.
///
/// Children are kept sorted by name so that walks, and therefore backend
/// encodings, are deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode<V> {
    value: Option<V>,
    children: BTreeMap<String, TreeNode<V>>,
}

impl<V> Default for TreeNode<V> {
    fn default() -> Self {
        Self {
            value: None,
            children: BTreeMap::new(),
        }
    }
}

impl<V> TreeNode<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: V) -> Self {
        Self {
            value: Some(value),
            children: BTreeMap::new(),
        }
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn value_mut(&mut self) -> Option<&mut V> {
        self.value.as_mut()
    }

    pub fn child_nodes(&self) -> &BTreeMap<String, TreeNode<V>> {
        &self.children
    }

    pub fn is_leaf_node(&self) -> bool {
        self.children.is_empty()
    }

    /// Borrow the value and the children mutably at the same time.
    pub(crate) fn parts_mut(&mut self) -> (Option<&mut V>, &mut BTreeMap<String, TreeNode<V>>) {
        (self.value.as_mut(), &mut self.children)
    }

    pub fn get_node(&self, path: impl Into<MetadataPath>) -> Option<&TreeNode<V>> {
        let path = path.into();
        let mut current = self;
        for segment in path.segments() {
            current = current.children.get(segment)?;
        }
        Some(current)
    }

    pub fn get_node_mut(&mut self, path: impl Into<MetadataPath>) -> Option<&mut TreeNode<V>> {
        let path = path.into();
        let mut current = self;
        for segment in path.segments() {
            current = current.children.get_mut(segment)?;
        }
        Some(current)
    }

    /// Value stored at `path`, if any.
    pub fn get_value(&self, path: impl Into<MetadataPath>) -> Option<&V> {
        self.get_node(path)?.value()
    }

    pub fn get_value_mut(&mut self, path: impl Into<MetadataPath>) -> Option<&mut V> {
        self.get_node_mut(path)?.value_mut()
    }

    /// Place `node` at `path`, creating intermediate nodes as needed.
    ///
    /// The node's value and children are merged into whatever already exists
    /// at `path`; an existing value is never replaced.
    ///
    /// Parts of `node` that hold no value anywhere below them are dropped
    /// first, so adding a valueless node changes nothing and every node below
    /// the root leads to at least one value.
    ///
    /// Unless `allow_leaf_node_conversion` is set, a node below the root may
    /// hold a value or children but not both, and nothing may be added at or
    /// below a node that already holds a value. On conflict the tree is left
    /// unchanged.
    pub fn add_node_hierarchy(
        &mut self,
        path: impl Into<MetadataPath>,
        node: TreeNode<V>,
        allow_leaf_node_conversion: bool,
    ) -> Result<()> {
        let path = path.into();
        let Some(node) = node.into_pruned() else {
            return Ok(());
        };
        if !allow_leaf_node_conversion {
            self.check_insert(&path, &node)?;
        }

        let mut current = self;
        for segment in path.segments() {
            current = current.children.entry(segment.clone()).or_default();
        }
        current.merge(node);
        Ok(())
    }

    fn into_pruned(self) -> Option<Self> {
        let children: BTreeMap<_, _> = self
            .children
            .into_iter()
            .filter_map(|(name, child)| Some((name, child.into_pruned()?)))
            .collect();
        if self.value.is_none() && children.is_empty() {
            return None;
        }
        Some(Self {
            value: self.value,
            children,
        })
    }

    fn check_insert(&self, path: &MetadataPath, node: &TreeNode<V>) -> Result<()> {
        let mut existing = Some(self);
        for (depth, segment) in path.segments().iter().enumerate() {
            let Some(current) = existing else { break };
            if depth > 0 && current.value.is_some() {
                return Err(Error::structural_conflict(
                    path.segments()[..depth].join("/"),
                    format!("cannot add '{}' below a node that holds a value", path),
                ));
            }
            existing = current.children.get(segment);
        }
        Self::check_merge(existing, node, path)
    }

    fn check_merge(
        existing: Option<&TreeNode<V>>,
        node: &TreeNode<V>,
        path: &MetadataPath,
    ) -> Result<()> {
        let is_root = path.is_root();

        if !is_root && node.value.is_some() && !node.children.is_empty() {
            return Err(Error::structural_conflict(
                path.to_string(),
                "node holds a value and children",
            ));
        }

        if let Some(existing) = existing {
            if existing.value.is_some() && (!is_root || node.value.is_some()) {
                return Err(Error::structural_conflict(
                    path.to_string(),
                    "node already holds a value",
                ));
            }
            if !is_root && node.value.is_some() && !existing.children.is_empty() {
                return Err(Error::structural_conflict(
                    path.to_string(),
                    "node already has children",
                ));
            }
        }

        for (name, child) in &node.children {
            Self::check_merge(
                existing.and_then(|e| e.children.get(name)),
                child,
                &path.join(name),
            )?;
        }
        Ok(())
    }

    fn merge(&mut self, node: TreeNode<V>) {
        if self.value.is_none() {
            self.value = node.value;
        }
        for (name, child) in node.children {
            self.children.entry(name).or_default().merge(child);
        }
    }

    /// Depth-first iterator over `(path, value)` of every value-bearing
    /// node. The root's own value is reported under the empty path.
    pub fn get_paths_recursive(&self) -> PathsRecursive<'_, V> {
        PathsRecursive {
            stack: vec![(MetadataPath::root(), self)],
        }
    }

    /// Build a structurally identical tree by converting every value.
    pub fn try_map<U, E, F>(&self, mut f: F) -> std::result::Result<TreeNode<U>, E>
    where
        F: FnMut(&V) -> std::result::Result<U, E>,
    {
        self.try_map_with(&mut f)
    }

    fn try_map_with<U, E, F>(&self, f: &mut F) -> std::result::Result<TreeNode<U>, E>
    where
        F: FnMut(&V) -> std::result::Result<U, E>,
    {
        let value = match &self.value {
            Some(value) => Some(f(value)?),
            None => None,
        };

        let mut children = BTreeMap::new();
        for (name, child) in &self.children {
            children.insert(name.clone(), child.try_map_with(f)?);
        }

        Ok(TreeNode { value, children })
    }
}

/// Iterator returned by [`TreeNode::get_paths_recursive`].
pub struct PathsRecursive<'a, V> {
    stack: Vec<(MetadataPath, &'a TreeNode<V>)>,
}

impl<'a, V> Iterator for PathsRecursive<'a, V> {
    type Item = (MetadataPath, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((path, node)) = self.stack.pop() {
            for (name, child) in node.children.iter().rev() {
                self.stack.push((path.join(name), child));
            }
            if let Some(value) = &node.value {
                return Some((path, value));
            }
        }
        None
    }
}
