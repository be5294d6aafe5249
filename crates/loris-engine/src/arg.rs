//! Abstract reachability graph (ARG).
//!
//! An arena of nodes addressed by stable integer indices. Parent, child, and
//! covering relations are index sets rather than owning pointers, so subtree
//! removal is slot invalidation plus index-set cleanup. A node can have
//! several parents (merging makes the ARG a DAG, not a tree).

use std::collections::BTreeSet;

use loris_cfa::EdgeId;

use crate::composite::CompositeState;

/// Stable index of an ARG node in the arena.
pub type ArgId = usize;

/// One explored abstract state and its graph relations.
#[derive(Debug)]
pub struct ArgNode {
    pub id: ArgId,
    pub state: CompositeState,
    /// Incoming edges: (parent node, CFA edge taken).
    pub parents: Vec<(ArgId, EdgeId)>,
    /// Outgoing edges: (child node, CFA edge taken).
    pub children: Vec<(ArgId, EdgeId)>,
    /// Set when this node is subsumed by another node (relation only, no
    /// ownership; the covering node lives in the same arena).
    pub covered_by: Option<ArgId>,
    /// Nodes this node covers.
    pub covers: BTreeSet<ArgId>,
    /// Set when the state signals a property violation.
    pub is_target: bool,
}

/// Result of a subtree removal, for reached-set bookkeeping.
#[derive(Debug, Default)]
pub struct SubtreeRemoval {
    /// Nodes deleted from the arena.
    pub removed: Vec<ArgId>,
    /// Surviving nodes whose cover was removed; they must be re-explored.
    pub uncovered: Vec<ArgId>,
    /// Surviving parents that lost a child; they must be re-explored.
    pub stale_parents: Vec<ArgId>,
}

/// The ARG arena.
#[derive(Debug, Default)]
pub struct Arg {
    nodes: Vec<Option<ArgNode>>,
}

impl Arg {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node, optionally linked to a parent.
    pub fn add_node(
        &mut self,
        state: CompositeState,
        parent: Option<(ArgId, EdgeId)>,
        is_target: bool,
    ) -> ArgId {
        let id = self.nodes.len();
        self.nodes.push(Some(ArgNode {
            id,
            state,
            parents: Vec::new(),
            children: Vec::new(),
            covered_by: None,
            covers: BTreeSet::new(),
            is_target,
        }));
        if let Some((p, edge)) = parent {
            self.add_edge(p, id, edge);
        }
        id
    }

    /// Link `parent -> child` over the given CFA edge.
    pub fn add_edge(&mut self, parent: ArgId, child: ArgId, edge: EdgeId) {
        self.node_mut(parent).children.push((child, edge));
        self.node_mut(child).parents.push((parent, edge));
    }

    pub fn contains(&self, id: ArgId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.is_some())
    }

    pub fn get(&self, id: ArgId) -> Option<&ArgNode> {
        self.nodes.get(id).and_then(|n| n.as_ref())
    }

    /// Panics if the node was removed.
    pub fn node(&self, id: ArgId) -> &ArgNode {
        self.get(id).expect("ARG node was removed")
    }

    fn node_mut(&mut self, id: ArgId) -> &mut ArgNode {
        self.nodes
            .get_mut(id)
            .and_then(|n| n.as_mut())
            .expect("ARG node was removed")
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArgNode> {
        self.nodes.iter().filter_map(|n| n.as_ref())
    }

    /// Record that `covered` is subsumed by `coverer`.
    pub fn set_covered(&mut self, covered: ArgId, coverer: ArgId) {
        self.node_mut(covered).covered_by = Some(coverer);
        self.node_mut(coverer).covers.insert(covered);
    }

    /// Replace the reached node `old` by a merged version. The new node
    /// adopts the old node's parents, children, and coverage relations; the
    /// old slot is invalidated.
    pub fn replace_with_merged(&mut self, old: ArgId, state: CompositeState, is_target: bool) -> ArgId {
        let id = self.nodes.len();
        let old_node = self.nodes[old].take().expect("merged node was removed");
        self.nodes.push(Some(ArgNode {
            id,
            state,
            parents: old_node.parents.clone(),
            children: old_node.children.clone(),
            covered_by: None,
            covers: old_node.covers.clone(),
            is_target,
        }));
        for (p, e) in &old_node.parents {
            if let Some(pn) = self.nodes.get_mut(*p).and_then(|n| n.as_mut()) {
                for c in pn.children.iter_mut() {
                    if c.0 == old && c.1 == *e {
                        c.0 = id;
                    }
                }
            }
        }
        for (c, e) in &old_node.children {
            if let Some(cn) = self.nodes.get_mut(*c).and_then(|n| n.as_mut()) {
                for p in cn.parents.iter_mut() {
                    if p.0 == old && p.1 == *e {
                        p.0 = id;
                    }
                }
            }
        }
        for covered in &old_node.covers {
            if let Some(cn) = self.nodes.get_mut(*covered).and_then(|n| n.as_mut()) {
                cn.covered_by = Some(id);
            }
        }
        id
    }

    /// Remove the subtree below `root` (all child-reachable nodes, `root`
    /// excluded). Reports removed nodes, nodes whose cover went away, and
    /// surviving parents that lost a child (`root` excluded, since the
    /// caller re-queues it anyway).
    pub fn remove_children_subtrees(&mut self, root: ArgId) -> SubtreeRemoval {
        let seeds: Vec<ArgId> = self.node(root).children.iter().map(|(c, _)| *c).collect();
        self.remove_reachable(seeds, Some(root))
    }

    /// Remove `root` and every node below it. Unlike
    /// [`Arg::remove_children_subtrees`], `root`'s own surviving parents are
    /// reported stale: they lost a child and must re-explore its edge.
    pub fn remove_subtree(&mut self, root: ArgId) -> SubtreeRemoval {
        self.remove_reachable(vec![root], None)
    }

    fn remove_reachable(&mut self, seeds: Vec<ArgId>, spared_parent: Option<ArgId>) -> SubtreeRemoval {
        let mut result = SubtreeRemoval::default();
        let mut doomed: BTreeSet<ArgId> = BTreeSet::new();
        let mut stack: Vec<ArgId> = seeds;
        while let Some(id) = stack.pop() {
            if !self.contains(id) || !doomed.insert(id) {
                continue;
            }
            stack.extend(self.node(id).children.iter().map(|(c, _)| *c));
        }

        for &id in &doomed {
            let node = self.nodes[id].take().expect("doomed node exists");
            // Unlink from surviving parents.
            for (p, _) in &node.parents {
                if doomed.contains(p) || !self.contains(*p) {
                    continue;
                }
                self.node_mut(*p).children.retain(|(c, _)| *c != id);
                if spared_parent != Some(*p) {
                    result.stale_parents.push(*p);
                }
            }
            // Nodes covered by a removed node lose their cover.
            for covered in &node.covers {
                if doomed.contains(covered) || !self.contains(*covered) {
                    continue;
                }
                self.node_mut(*covered).covered_by = None;
                result.uncovered.push(*covered);
            }
            if let Some(coverer) = node.covered_by {
                if !doomed.contains(&coverer) && self.contains(coverer) {
                    self.node_mut(coverer).covers.remove(&id);
                }
            }
            result.removed.push(id);
        }
        result
    }

    /// The path from the ARG root to `target`, following first parents.
    ///
    /// Returns the node sequence (root first) and the CFA edges between
    /// them; `nodes.len() == edges.len() + 1`.
    pub fn path_from_root(&self, target: ArgId) -> (Vec<ArgId>, Vec<EdgeId>) {
        let mut nodes = vec![target];
        let mut edges = Vec::new();
        let mut current = target;
        while let Some(&(parent, edge)) = self.node(current).parents.first() {
            nodes.push(parent);
            edges.push(edge);
            current = parent;
        }
        nodes.reverse();
        edges.reverse();
        (nodes, edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::CompositeState;

    fn state(location: usize) -> CompositeState {
        CompositeState {
            location,
            slots: vec![Box::new(())],
        }
    }

    #[test]
    fn path_extraction_follows_first_parents_to_the_root() {
        let mut arg = Arg::new();
        let root = arg.add_node(state(0), None, false);
        let a = arg.add_node(state(1), Some((root, 10)), false);
        let b = arg.add_node(state(2), Some((a, 11)), true);

        let (nodes, edges) = arg.path_from_root(b);
        assert_eq!(nodes, vec![root, a, b]);
        assert_eq!(edges, vec![10, 11]);
    }

    #[test]
    fn subtree_removal_reports_uncovered_and_stale_parents() {
        let mut arg = Arg::new();
        let root = arg.add_node(state(0), None, false);
        let pivot = arg.add_node(state(1), Some((root, 0)), false);
        let child = arg.add_node(state(2), Some((pivot, 1)), false);
        let grandchild = arg.add_node(state(3), Some((child, 2)), false);
        // An unrelated node covered by the soon-to-be-removed child.
        let outside = arg.add_node(state(2), Some((root, 3)), false);
        arg.set_covered(outside, child);

        let removal = arg.remove_children_subtrees(pivot);
        let mut removed = removal.removed.clone();
        removed.sort_unstable();
        assert_eq!(removed, vec![child, grandchild]);
        assert_eq!(removal.uncovered, vec![outside]);
        assert!(arg.contains(pivot));
        assert!(!arg.contains(child));
        assert!(arg.node(pivot).children.is_empty());
        assert_eq!(arg.node(outside).covered_by, None);
    }

    #[test]
    fn whole_subtree_removal_dooms_the_root_and_reports_its_parents() {
        let mut arg = Arg::new();
        let root = arg.add_node(state(0), None, false);
        let pivot = arg.add_node(state(1), Some((root, 0)), false);
        let child = arg.add_node(state(2), Some((pivot, 1)), false);

        let removal = arg.remove_subtree(pivot);
        let mut removed = removal.removed.clone();
        removed.sort_unstable();
        assert_eq!(removed, vec![pivot, child]);
        assert_eq!(removal.stale_parents, vec![root]);
        assert!(arg.contains(root));
        assert!(!arg.contains(pivot));
        assert!(arg.node(root).children.is_empty());
    }

    #[test]
    fn merge_replacement_rewires_relations() {
        let mut arg = Arg::new();
        let root = arg.add_node(state(0), None, false);
        let old = arg.add_node(state(1), Some((root, 0)), false);
        let child = arg.add_node(state(2), Some((old, 1)), false);

        let merged = arg.replace_with_merged(old, state(1), false);
        assert!(!arg.contains(old));
        assert_eq!(arg.node(root).children, vec![(merged, 0)]);
        assert_eq!(arg.node(child).parents, vec![(merged, 1)]);
    }
}
