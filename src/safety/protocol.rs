use std::collections::BTreeSet;

use crate::{
    action_space::{Action, ActionCall, ActionSchema},
    oracle::{ReasoningOracle, TransitionCandidate},
    safety::{
        error::SafetyResult,
        types::{TaskContext, UnsafeReason, Verdict},
    },
    world_model::{Edge, NodeAttrs, NodeKey, WorldModel},
};

/// One safety decision, run against a private copy of the session's world model and effective
/// state.
///
/// Nothing here touches the session. The caller adopts the draft with [`DecisionRun::into_parts`]
/// only once a verdict has been reached, so an error halfway through leaves no trace.
pub(crate) struct DecisionRun<'a> {
    oracle: &'a ReasoningOracle,
    context: &'a TaskContext,
    initial_state: &'a str,
    world: WorldModel,
    effective_state: NodeKey,
}

impl<'a> DecisionRun<'a> {
    pub(crate) fn new(
        oracle: &'a ReasoningOracle,
        context: &'a TaskContext,
        initial_state: &'a str,
        world: WorldModel,
        effective_state: NodeKey,
    ) -> Self {
        Self {
            oracle,
            context,
            initial_state,
            world,
            effective_state,
        }
    }

    pub(crate) fn into_parts(self) -> (WorldModel, NodeKey) {
        (self.world, self.effective_state)
    }

    pub(crate) async fn run(
        &mut self,
        observation: &str,
        action: &Action,
        schema: &ActionSchema,
    ) -> SafetyResult<Verdict> {
        let call = ActionCall::new(action, schema);

        let Some(param_range) = self.screen_action(action, schema).await? else {
            return Ok(Verdict::Safe);
        };

        if let Some(param_range) = param_range
            && !self
                .oracle
                .is_param_within_range(
                    &call,
                    &self.context.task,
                    self.initial_state,
                    &param_range,
                )
                .await?
        {
            tracing::info!(
                target: "safety",
                action = %action,
                param_range = %param_range,
                "param_out_of_range"
            );
            return Ok(Verdict::Unsafe(UnsafeReason::ParamOutOfRange));
        }

        let state = self.resolve_effective_state(observation).await?;

        let signature = action.signature();
        if self.world.query_cache(&state, &signature) == Some(true) {
            tracing::debug!(
                target: "safety",
                effective_state = %state,
                action = %action,
                "action_safety_cache_hit"
            );
            return Ok(Verdict::Safe);
        }

        let (_, edges) = self.world.outgoing_neighbors_and_edges(&state);
        let (core_edges, state_edges): (Vec<Edge>, Vec<Edge>) = edges
            .into_iter()
            .partition(|edge| self.world.is_core_variable(&edge.object));

        if let Some(core_variable) = self
            .violated_core_variable(&state, observation, &call, &core_edges)
            .await?
        {
            tracing::info!(
                target: "safety",
                effective_state = %state,
                action = %action,
                core_variable = %core_variable,
                "core_variable_violated"
            );
            return Ok(Verdict::Unsafe(UnsafeReason::CoreVariableViolated {
                core_variable,
            }));
        }

        self.advance(&state, &call, &state_edges).await?;

        self.world.store_cache(&state, signature, true);
        Ok(Verdict::Safe)
    }

    /// Steps that depend only on the action: the always-safe screen and the parameter range.
    ///
    /// `None` means the action is always safe. `Some(range)` carries the known range, if any.
    async fn screen_action(
        &mut self,
        action: &Action,
        schema: &ActionSchema,
    ) -> SafetyResult<Option<Option<String>>> {
        let name = action.name.as_str();

        if self.world.is_analyzed(name) {
            if self.world.is_always_safe(name) {
                return Ok(None);
            }
        } else {
            let always_safe = self
                .oracle
                .is_always_safe(
                    schema,
                    &self.context.task,
                    self.initial_state,
                    &self.context.core_variables,
                )
                .await?;
            self.world.mark_analyzed(name);
            if always_safe {
                tracing::info!(target: "safety", action = name, "action_always_safe");
                self.world.add_always_safe_action(name);
                return Ok(None);
            }
        }

        if !action.has_arguments() {
            return Ok(Some(None));
        }

        if let Some(known) = self.world.caches().param_range(name) {
            return Ok(Some(known.map(str::to_string)));
        }

        let range = self
            .oracle
            .usual_param_range(schema, &self.context.task, self.initial_state)
            .await?;
        tracing::debug!(
            target: "safety",
            action = name,
            param_range = range.as_deref().unwrap_or(""),
            "param_range_learned"
        );
        self.world.store_param_range(name, range.clone());
        Ok(Some(range))
    }

    pub(crate) async fn resolve_effective_state(
        &mut self,
        observation: &str,
    ) -> SafetyResult<NodeKey> {
        if let Some(state) = self.world.query_effective_state_cache(observation) {
            let state = state.clone();
            tracing::debug!(target: "safety", effective_state = %state, "effective_state_cache_hit");
            self.effective_state = state.clone();
            return Ok(state);
        }

        let candidates = self
            .world
            .candidate_effective_states(&self.effective_state)
            .into_iter()
            .collect::<Vec<_>>();
        let resolution = self
            .oracle
            .match_effective_state(
                &candidates,
                observation,
                &self.context.core_variables,
                &self.context.task,
            )
            .await?;

        let is_new = resolution.is_new();
        let state = resolution.into_key();
        if is_new {
            self.world.add_node(&state, NodeAttrs::State)?;
        }
        self.world.store_effective_state_cache(observation, &state);

        tracing::debug!(
            target: "safety",
            previous = %self.effective_state,
            effective_state = %state,
            candidates = candidates.len(),
            is_new = is_new,
            "effective_state_resolved"
        );
        self.effective_state = state.clone();
        Ok(state)
    }

    async fn violated_core_variable(
        &self,
        state: &str,
        observation: &str,
        call: &ActionCall,
        core_edges: &[Edge],
    ) -> SafetyResult<Option<NodeKey>> {
        let core_variables = core_edges
            .iter()
            .map(|edge| edge.object.as_str())
            .collect::<BTreeSet<_>>();

        for core_variable in core_variables {
            let actual = self
                .oracle
                .actual_variation(state, observation, call, core_variable)
                .await?;
            let expected = self.world.variability(core_variable)?;
            if self
                .oracle
                .is_variation_beyond_bounds(&actual, expected, core_variable)
                .await?
            {
                return Ok(Some(core_variable.to_string()));
            }
        }

        Ok(None)
    }

    /// Picks the next effective state among the state edges, growing the graph when the oracle
    /// names a new one.
    async fn advance(
        &mut self,
        state: &str,
        call: &ActionCall,
        state_edges: &[Edge],
    ) -> SafetyResult<()> {
        let candidates = state_edges
            .iter()
            .map(|edge| TransitionCandidate {
                next_state: edge.object.clone(),
                relation: edge.relation.clone(),
                action_name: edge.action_name.clone(),
            })
            .collect::<Vec<_>>();

        let resolution = self
            .oracle
            .next_effective_state(
                state,
                call,
                &candidates,
                &self.context.task,
                &self.context.core_variables,
            )
            .await?;

        let is_new = resolution.is_new();
        let next = resolution.into_key();
        if is_new {
            let relations = self
                .oracle
                .state_affects_core_variables(
                    &next,
                    &self.context.core_variables,
                    &self.context.task,
                )
                .await?;

            let mut edges = vec![Edge::transition(state, next.clone(), call.name.clone())];
            edges.extend(relations.into_iter().map(|relation| {
                Edge::relation(next.clone(), relation.relation, relation.core_variable)
            }));
            self.world
                .add_nodes_and_edges(vec![(next.clone(), NodeAttrs::State)], edges)?;
        }

        let nearest = self
            .world
            .paths_to_core_variables(&next)
            .iter()
            .map(|path| path.len().saturating_sub(1))
            .min();
        tracing::info!(
            target: "safety",
            from = %state,
            to = %next,
            action = %call.name,
            is_new = is_new,
            core_variable_distance = ?nearest,
            "effective_state_advanced"
        );

        self.effective_state = next;
        Ok(())
    }
}
