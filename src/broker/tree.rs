//! Topic tree: a trie over topic segments, with a memoizing resolver.
//!
//! Nodes live in an arena and are addressed by stable [`NodeId`] indices, so
//! resolved node sets stay valid for the life of the tree. Nodes are created
//! lazily the first time a topic path traverses a missing segment and are
//! never deleted; they may become empty of subscriptions but persist, which
//! is what makes the per-topic-string resolution cache sound.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use super::subscription::Subscription;
use super::topic::Topic;

/// Stable identifier of a node in the tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

const ROOT: NodeId = NodeId(0);

/// One node of the trie: a segment literal, its children by segment, and the
/// subscriptions registered exactly at this node.
struct Node {
    segment: String,
    children: HashMap<String, NodeId>,
    subscriptions: Vec<Subscription>,
}

impl Node {
    fn new(segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            children: HashMap::new(),
            subscriptions: Vec::new(),
        }
    }
}

/// Mutable trie over dot-separated topic segments plus the resolution cache.
///
/// Resolution walks (and creates) nodes under a coarse write lock; dispatch
/// gathers subscription snapshots under the read lock, so a trigger never
/// observes a subscription present in one node of a wildcard result set but
/// missing from another.
pub struct TopicTree {
    nodes: RwLock<Vec<Node>>,
    resolved: DashMap<String, Arc<[NodeId]>>,
}

impl Default for TopicTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicTree {
    /// Create a tree holding only the root node.
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(vec![Node::new("")]),
            resolved: DashMap::new(),
        }
    }

    /// Resolve a topic to the set of nodes it denotes, creating intermediate
    /// nodes on demand.
    ///
    /// A literal topic resolves to exactly one node. A wildcard topic
    /// resolves to all transitive descendants of its prefix node, prefix
    /// excluded. The result is memoized per exact input string; a later call
    /// with an identical string returns the cached set without re-walking.
    pub fn resolve(&self, topic: &Topic) -> Arc<[NodeId]> {
        if let Some(hit) = self.resolved.get(topic.raw()) {
            return Arc::clone(hit.value());
        }

        let mut nodes = self.nodes.write();
        let mut cursor = ROOT;
        for segment in topic.segments() {
            cursor = Self::child_or_insert(&mut nodes, cursor, segment);
        }

        let set: Arc<[NodeId]> = if topic.is_wildcard() {
            let mut descendants = Vec::new();
            Self::collect_descendants(&nodes, cursor, &mut descendants);
            descendants.into()
        } else {
            Arc::new([cursor])
        };
        drop(nodes);

        // Concurrent first resolutions of the same string may both insert;
        // the sets are identical, last write wins.
        self.resolved.insert(topic.raw().to_string(), Arc::clone(&set));
        set
    }

    fn child_or_insert(nodes: &mut Vec<Node>, parent: NodeId, segment: &str) -> NodeId {
        if let Some(&child) = nodes[parent.0].children.get(segment) {
            return child;
        }
        let child = NodeId(nodes.len());
        nodes.push(Node::new(segment));
        nodes[parent.0].children.insert(segment.to_string(), child);
        child
    }

    fn collect_descendants(nodes: &[Node], parent: NodeId, out: &mut Vec<NodeId>) {
        for &child in nodes[parent.0].children.values() {
            out.push(child);
            Self::collect_descendants(nodes, child, out);
        }
    }

    /// Append subscriptions at their nodes under a single lock acquisition,
    /// so dispatch snapshots see either none or all of the batch.
    pub(crate) fn insert_batch(&self, entries: Vec<(NodeId, Subscription)>) {
        let mut nodes = self.nodes.write();
        for (node, subscription) in entries {
            nodes[node.0].subscriptions.push(subscription);
        }
    }

    /// Remove every subscription owned by `owner` from the given nodes,
    /// under a single lock acquisition.
    pub(crate) fn remove_owned_batch(&self, targets: &[NodeId], owner: usize) {
        let mut nodes = self.nodes.write();
        for node in targets {
            nodes[node.0].subscriptions.retain(|s| s.owner() != owner);
        }
    }

    /// Clone out the union of subscriptions across a resolved node set.
    ///
    /// Taken as one consistent snapshot under the read lock; the caller sorts
    /// and invokes after the lock is released, so handlers may re-enter the
    /// tree.
    pub(crate) fn gather(&self, set: &[NodeId]) -> Vec<Subscription> {
        let nodes = self.nodes.read();
        let mut out = Vec::new();
        for id in set {
            out.extend(nodes[id.0].subscriptions.iter().cloned());
        }
        out
    }

    /// Number of nodes in the arena, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    /// Segment literal of a node.
    pub fn segment(&self, node: NodeId) -> String {
        self.nodes.read()[node.0].segment.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::subscription::Invoker;

    fn resolve(tree: &TopicTree, raw: &str) -> Arc<[NodeId]> {
        tree.resolve(&Topic::parse(raw).unwrap())
    }

    #[test]
    fn literal_resolution_returns_one_node() {
        let tree = TopicTree::new();
        let set = resolve(&tree, "a.b.c");
        assert_eq!(set.len(), 1);
        assert_eq!(tree.segment(set[0]), "c");
        // root + a + b + c
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn resolution_is_cached_and_creates_no_new_nodes() {
        let tree = TopicTree::new();
        let first = resolve(&tree, "a.b");
        let created = tree.node_count();

        let second = resolve(&tree, "a.b");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(tree.node_count(), created);
    }

    #[test]
    fn wildcard_resolves_to_all_descendants_excluding_prefix() {
        let tree = TopicTree::new();
        let b = resolve(&tree, "A.B")[0];
        let c = resolve(&tree, "A.C")[0];
        let d = resolve(&tree, "A.B.D")[0];
        let a = resolve(&tree, "A")[0];

        let mut set: Vec<NodeId> = resolve(&tree, "A.*").to_vec();
        set.sort();
        let mut expected = vec![b, c, d];
        expected.sort();
        assert_eq!(set, expected);
        assert!(!set.contains(&a));
    }

    #[test]
    fn bare_wildcard_covers_whole_tree() {
        let tree = TopicTree::new();
        resolve(&tree, "x.y");
        resolve(&tree, "z");
        let set = resolve(&tree, "*");
        // x, x.y, z
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn resolving_for_trigger_creates_the_path() {
        let tree = TopicTree::new();
        // Trigger-style resolution of a never-subscribed path must not fail
        // and must leave the nodes behind for later subscribers.
        let first = resolve(&tree, "not.yet.subscribed");
        let again = resolve(&tree, "not.yet.subscribed");
        assert_eq!(first[0], again[0]);
    }

    #[test]
    fn gather_unions_across_nodes() {
        let tree = TopicTree::new();
        let b = resolve(&tree, "a.b")[0];
        let c = resolve(&tree, "a.c")[0];
        tree.insert_batch(vec![
            (b, Subscription::new("a.b", Invoker::no_arg(|| {}))),
            (c, Subscription::new("a.c", Invoker::no_arg(|| {}))),
            (c, Subscription::new("a.c", Invoker::no_arg(|| {}))),
        ]);

        assert_eq!(tree.gather(&[b, c]).len(), 3);
        assert_eq!(tree.gather(&[b]).len(), 1);
    }

    #[test]
    fn removal_only_touches_that_owner() {
        let tree = TopicTree::new();
        let node = resolve(&tree, "a")[0];
        let mut mine = Subscription::new("a", Invoker::no_arg(|| {}));
        mine.stamp(1, 0);
        let mut theirs = Subscription::new("a", Invoker::no_arg(|| {}));
        theirs.stamp(2, 1);
        tree.insert_batch(vec![(node, mine), (node, theirs)]);

        tree.remove_owned_batch(&[node], 1);
        let left = tree.gather(&[node]);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].owner(), 2);
    }

    #[test]
    fn batch_removal_clears_an_owner_across_nodes() {
        let tree = TopicTree::new();
        let b = resolve(&tree, "a.b")[0];
        let c = resolve(&tree, "a.c")[0];
        let mut on_b = Subscription::new("a.b", Invoker::no_arg(|| {}));
        on_b.stamp(7, 0);
        let mut on_c = Subscription::new("a.c", Invoker::no_arg(|| {}));
        on_c.stamp(7, 1);
        tree.insert_batch(vec![(b, on_b), (c, on_c)]);

        tree.remove_owned_batch(&[b, c], 7);
        assert!(tree.gather(&[b, c]).is_empty());
    }
}
