use std::collections::{BTreeMap, BTreeSet};

use crate::{
    action_space::ActionSignature,
    world_model::{
        cache::WorldCaches,
        error::{WorldModelError, arity_mismatch, unknown_node},
        graph::StateGraph,
        types::{Edge, EdgeAttrs, EdgeKey, NodeAttrs, NodeKey, NodeKind},
    },
};

/// Graph of effective states plus every cache the safety protocol consults.
///
/// One instance lives for one task session. It is seeded with the initial state and is never
/// persisted.
#[derive(Debug, Clone)]
pub struct WorldModel {
    graph: StateGraph,
    caches: WorldCaches,
    core_variables: Vec<NodeKey>,
}

impl WorldModel {
    pub fn new(initial_state: &str) -> Result<Self, WorldModelError> {
        let mut graph = StateGraph::new();
        graph.add_node(initial_state, NodeAttrs::State)?;
        Ok(Self {
            graph,
            caches: WorldCaches::default(),
            core_variables: Vec::new(),
        })
    }

    pub fn add_node(&mut self, key: &str, attrs: NodeAttrs) -> Result<(), WorldModelError> {
        let changed = self.graph.add_node(key, attrs)?;
        if changed {
            tracing::trace!(target: "world_model", node = key, "node_upserted");
        }
        Ok(())
    }

    pub fn add_edge(
        &mut self,
        subject: &str,
        relation: &str,
        object: &str,
        attrs: EdgeAttrs,
    ) -> Result<(), WorldModelError> {
        let key = EdgeKey {
            subject: subject.to_string(),
            relation: relation.to_string(),
            object: object.to_string(),
        };
        let changed = self.graph.add_edge(key, attrs)?;
        if changed {
            tracing::trace!(
                target: "world_model",
                subject = subject,
                relation = relation,
                object = object,
                "edge_upserted"
            );
        }
        Ok(())
    }

    /// Registers nodes first, then edges, so an edge may reference a node from the same batch.
    pub fn add_nodes_and_edges(
        &mut self,
        nodes: Vec<(NodeKey, NodeAttrs)>,
        edges: Vec<Edge>,
    ) -> Result<(), WorldModelError> {
        for (key, attrs) in nodes {
            self.add_node(&key, attrs)?;
        }
        for edge in edges {
            self.add_edge(
                &edge.subject,
                &edge.relation,
                &edge.object,
                EdgeAttrs {
                    action_name: edge.action_name,
                },
            )?;
        }
        Ok(())
    }

    pub fn set_variability(
        &mut self,
        core_variables: &[String],
        variabilities: &[String],
    ) -> Result<(), WorldModelError> {
        if core_variables.len() != variabilities.len() {
            return Err(arity_mismatch(format!(
                "{} core variables but {} variabilities",
                core_variables.len(),
                variabilities.len()
            )));
        }

        for (core_variable, variability) in core_variables.iter().zip(variabilities) {
            self.add_node(core_variable, NodeAttrs::core_variable(variability.clone()))?;
        }
        self.core_variables = core_variables.to_vec();
        Ok(())
    }

    pub fn variability(&self, core_variable: &str) -> Result<&str, WorldModelError> {
        match self.graph.node(core_variable) {
            Some(NodeAttrs::CoreVariable { variability }) => Ok(variability),
            Some(NodeAttrs::State) => Err(unknown_node(format!(
                "'{}' is a state, not a core variable",
                core_variable
            ))),
            None => Err(unknown_node(format!(
                "core variable '{}' was never registered",
                core_variable
            ))),
        }
    }

    pub fn core_variables(&self) -> &[NodeKey] {
        &self.core_variables
    }

    pub fn is_core_variable(&self, key: &str) -> bool {
        matches!(self.graph.node(key), Some(NodeAttrs::CoreVariable { .. }))
    }

    pub fn node(&self, key: &str) -> Option<&NodeAttrs> {
        self.graph.node(key)
    }

    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    pub fn caches(&self) -> &WorldCaches {
        &self.caches
    }

    pub fn query_cache(&self, state: &str, action: &ActionSignature) -> Option<bool> {
        self.caches.action_safety(state, action)
    }

    pub fn store_cache(&mut self, state: &str, action: ActionSignature, is_safe: bool) {
        self.caches.store_action_safety(state, action, is_safe);
    }

    pub fn query_effective_state_cache(&self, observation: &str) -> Option<&NodeKey> {
        self.caches.effective_state(observation)
    }

    pub fn store_effective_state_cache(&mut self, observation: &str, state: &str) {
        self.caches.store_effective_state(observation, state);
    }

    pub fn is_analyzed(&self, action: &str) -> bool {
        self.caches.is_analyzed(action)
    }

    pub fn mark_analyzed(&mut self, action: &str) {
        self.caches.mark_analyzed(action);
    }

    pub fn is_always_safe(&self, action: &str) -> bool {
        self.caches.is_always_safe(action)
    }

    pub fn add_always_safe_action(&mut self, action: &str) {
        self.caches.mark_always_safe(action);
    }

    pub fn param_range(&self, action: &str) -> Option<&str> {
        self.caches.param_range(action).flatten()
    }

    pub fn store_param_range(&mut self, action: &str, range: Option<String>) {
        self.caches.store_param_range(action, range);
    }

    /// The previous state, its state successors, and every state with no outgoing edges.
    pub fn candidate_effective_states(&self, previous: &str) -> BTreeSet<NodeKey> {
        let mut candidates = BTreeSet::from([previous.to_string()]);

        candidates.extend(
            self.graph
                .successors(previous)
                .into_iter()
                .filter(|key| matches!(self.graph.node(key), Some(NodeAttrs::State)))
                .cloned(),
        );
        candidates.extend(
            self.graph
                .nodes_of_kind(NodeKind::State)
                .filter(|key| self.graph.out_degree(key) == 0)
                .cloned(),
        );

        candidates
    }

    pub fn outgoing_neighbors_and_edges(
        &self,
        node: &str,
    ) -> (BTreeMap<NodeKey, NodeAttrs>, Vec<Edge>) {
        let mut neighbors = BTreeMap::new();
        let mut edges = Vec::new();

        for (key, attrs) in self.graph.outgoing_edges(node) {
            if let Some(neighbor) = self.graph.node(&key.object) {
                neighbors.insert(key.object.clone(), neighbor.clone());
            }
            edges.push(Edge::from_parts(key, attrs));
        }

        (neighbors, edges)
    }

    /// Shortest path from `from` to each reachable registered core variable.
    pub fn paths_to_core_variables(&self, from: &str) -> Vec<Vec<NodeKey>> {
        self.core_variables
            .iter()
            .filter_map(|core_variable| self.graph.shortest_path(from, core_variable))
            .collect()
    }
}
