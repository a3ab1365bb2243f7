use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::world_model::{
    error::{WorldModelError, graph_inconsistency},
    types::{EdgeAttrs, EdgeKey, NodeAttrs, NodeKey, NodeKind, TRANSITION_RELATION},
};

/// Directed multigraph of effective states and core variables.
///
/// Edges are keyed by `(subject, relation, object)`; adjacency is kept per subject so
/// successor and out-degree queries never scan the whole edge set.
#[derive(Debug, Clone, Default)]
pub struct StateGraph {
    nodes: BTreeMap<NodeKey, NodeAttrs>,
    outgoing: BTreeMap<NodeKey, BTreeMap<EdgeKey, EdgeAttrs>>,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts a node. Returns whether the graph changed.
    pub fn add_node(&mut self, key: &str, attrs: NodeAttrs) -> Result<bool, WorldModelError> {
        if key.trim().is_empty() {
            return Err(graph_inconsistency("node key cannot be empty"));
        }

        match self.nodes.get_mut(key) {
            Some(existing) if existing.kind() != attrs.kind() => Err(graph_inconsistency(format!(
                "node '{}' is registered as {:?} and cannot become {:?}",
                key,
                existing.kind(),
                attrs.kind()
            ))),
            Some(existing) if *existing == attrs => Ok(false),
            Some(existing) => {
                *existing = attrs;
                Ok(true)
            }
            None => {
                self.nodes.insert(key.to_string(), attrs);
                Ok(true)
            }
        }
    }

    /// Upserts an edge after checking endpoint registration and shape. Returns whether the
    /// graph changed.
    pub fn add_edge(&mut self, key: EdgeKey, attrs: EdgeAttrs) -> Result<bool, WorldModelError> {
        let subject_kind = self.require_kind(&key.subject, &key)?;
        let object_kind = self.require_kind(&key.object, &key)?;

        if subject_kind != NodeKind::State {
            return Err(graph_inconsistency(format!(
                "core variable '{}' cannot have outgoing edges",
                key.subject
            )));
        }
        if key.relation.trim().is_empty() {
            return Err(graph_inconsistency(format!(
                "edge '{}' -> '{}' has an empty relation",
                key.subject, key.object
            )));
        }

        if key.relation == TRANSITION_RELATION {
            if object_kind != NodeKind::State {
                return Err(graph_inconsistency(format!(
                    "transition '{}' -> '{}' must end in a state node",
                    key.subject, key.object
                )));
            }
            if attrs.action_name.as_deref().is_none_or(str::is_empty) {
                return Err(graph_inconsistency(format!(
                    "transition '{}' -> '{}' is missing its action name",
                    key.subject, key.object
                )));
            }
        } else if object_kind != NodeKind::CoreVariable {
            return Err(graph_inconsistency(format!(
                "relation '{}' from '{}' must point at a core variable, '{}' is a state",
                key.relation, key.subject, key.object
            )));
        }

        let edges = self.outgoing.entry(key.subject.clone()).or_default();
        match edges.get_mut(&key) {
            Some(existing) if *existing == attrs => Ok(false),
            Some(existing) => {
                *existing = attrs;
                Ok(true)
            }
            None => {
                edges.insert(key, attrs);
                Ok(true)
            }
        }
    }

    pub fn node(&self, key: &str) -> Option<&NodeAttrs> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(BTreeMap::len).sum()
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &NodeKey> {
        self.nodes
            .iter()
            .filter(move |(_, attrs)| attrs.kind() == kind)
            .map(|(key, _)| key)
    }

    pub fn out_degree(&self, key: &str) -> usize {
        self.outgoing.get(key).map_or(0, BTreeMap::len)
    }

    pub fn outgoing_edges(&self, key: &str) -> impl Iterator<Item = (&EdgeKey, &EdgeAttrs)> {
        self.outgoing.get(key).into_iter().flat_map(BTreeMap::iter)
    }

    pub fn successors(&self, key: &str) -> BTreeSet<&NodeKey> {
        self.outgoing_edges(key)
            .map(|(edge_key, _)| &edge_key.object)
            .collect()
    }

    /// Breadth-first shortest path from `from` to `to`, both ends included.
    pub fn shortest_path(&self, from: &str, to: &str) -> Option<Vec<NodeKey>> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }
        if from == to {
            return Some(vec![from.to_string()]);
        }

        let mut parents: BTreeMap<&str, &str> = BTreeMap::new();
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            for next in self.successors(current) {
                let next = next.as_str();
                if next == from || parents.contains_key(next) {
                    continue;
                }
                parents.insert(next, current);
                if next == to {
                    let mut path = vec![to.to_string()];
                    let mut cursor = to;
                    while let Some(&parent) = parents.get(cursor) {
                        path.push(parent.to_string());
                        cursor = parent;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }

        None
    }

    fn require_kind(&self, endpoint: &str, key: &EdgeKey) -> Result<NodeKind, WorldModelError> {
        self.nodes
            .get(endpoint)
            .map(NodeAttrs::kind)
            .ok_or_else(|| {
                graph_inconsistency(format!(
                    "edge '{}' -[{}]-> '{}' references unregistered node '{}'",
                    key.subject, key.relation, key.object, endpoint
                ))
            })
    }
}
