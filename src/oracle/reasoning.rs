use std::sync::Arc;

use crate::{
    action_space::{ActionCall, ActionSchema},
    oracle::{
        error::{OracleError, contract_violation},
        ports::OracleTransport,
        types::{
            OracleAnswer, OracleQuery, OracleQueryKind, StateChoice, StateResolution,
            TransitionCandidate,
        },
    },
    world_model::{CoreVariableRelation, NodeKey},
};

/// Typed view over an [`OracleTransport`].
///
/// Each method builds one query, sends it, and checks that the answer has the shape the query
/// promises. A mismatched shape is a contract violation, never a silent default.
#[derive(Clone)]
pub struct ReasoningOracle {
    transport: Arc<dyn OracleTransport>,
}

impl ReasoningOracle {
    pub fn new(transport: Arc<dyn OracleTransport>) -> Self {
        Self { transport }
    }

    pub async fn core_variable_variability(
        &self,
        core_variable: &str,
        task: &str,
    ) -> Result<String, OracleError> {
        let query = OracleQuery::CoreVariableVariability {
            core_variable: core_variable.to_string(),
            task: task.to_string(),
        };
        match self.ask(query).await? {
            OracleAnswer::Variability { variability } => Ok(variability.trim().to_string()),
            other => Err(unexpected(OracleQueryKind::CoreVariableVariability, &other)),
        }
    }

    /// One variability per core variable, in input order.
    pub async fn analyze_core_variability(
        &self,
        core_variables: &[String],
        task: &str,
    ) -> Result<Vec<String>, OracleError> {
        let mut variabilities = Vec::with_capacity(core_variables.len());
        for core_variable in core_variables {
            variabilities.push(self.core_variable_variability(core_variable, task).await?);
        }
        Ok(variabilities)
    }

    pub async fn is_always_safe(
        &self,
        action: &ActionSchema,
        task: &str,
        initial_state: &str,
        core_variables: &[String],
    ) -> Result<bool, OracleError> {
        let query = OracleQuery::IsAlwaysSafe {
            action: action.clone(),
            task: task.to_string(),
            initial_state: initial_state.to_string(),
            core_variables: core_variables.to_vec(),
        };
        self.ask_verdict(query).await
    }

    /// `None` when the oracle knows no typical range for the action's parameters.
    pub async fn usual_param_range(
        &self,
        action: &ActionSchema,
        task: &str,
        initial_state: &str,
    ) -> Result<Option<String>, OracleError> {
        let query = OracleQuery::UsualParamRange {
            action: action.clone(),
            task: task.to_string(),
            initial_state: initial_state.to_string(),
        };
        match self.ask(query).await? {
            OracleAnswer::ParamRange { param_range } => {
                Ok(param_range.filter(|range| !range.trim().is_empty()))
            }
            other => Err(unexpected(OracleQueryKind::UsualParamRange, &other)),
        }
    }

    pub async fn is_param_within_range(
        &self,
        action: &ActionCall,
        task: &str,
        initial_state: &str,
        param_range: &str,
    ) -> Result<bool, OracleError> {
        let query = OracleQuery::IsParamWithinRange {
            action: action.clone(),
            task: task.to_string(),
            initial_state: initial_state.to_string(),
            param_range: param_range.to_string(),
        };
        self.ask_verdict(query).await
    }

    pub async fn match_effective_state(
        &self,
        candidates: &[NodeKey],
        observation: &str,
        core_variables: &[String],
        task: &str,
    ) -> Result<StateResolution, OracleError> {
        let query = OracleQuery::MatchEffectiveState {
            candidates: candidates.to_vec(),
            observation: observation.to_string(),
            core_variables: core_variables.to_vec(),
            task: task.to_string(),
        };
        let choice = self
            .ask_state_choice(OracleQueryKind::MatchEffectiveState, query)
            .await?;
        resolve_choice(
            OracleQueryKind::MatchEffectiveState,
            choice,
            candidates.iter().cloned(),
        )
    }

    pub async fn next_effective_state(
        &self,
        current_state: &str,
        action: &ActionCall,
        candidates: &[TransitionCandidate],
        task: &str,
        core_variables: &[String],
    ) -> Result<StateResolution, OracleError> {
        let query = OracleQuery::NextEffectiveState {
            current_state: current_state.to_string(),
            action: action.clone(),
            candidates: candidates.to_vec(),
            task: task.to_string(),
            core_variables: core_variables.to_vec(),
        };
        let choice = self
            .ask_state_choice(OracleQueryKind::NextEffectiveState, query)
            .await?;
        resolve_choice(
            OracleQueryKind::NextEffectiveState,
            choice,
            candidates.iter().map(|candidate| candidate.next_state.clone()),
        )
    }

    /// Empty string when the action leaves the core variable unchanged.
    pub async fn actual_variation(
        &self,
        effective_state: &str,
        observation: &str,
        action: &ActionCall,
        core_variable: &str,
    ) -> Result<String, OracleError> {
        let query = OracleQuery::ActualVariation {
            effective_state: effective_state.to_string(),
            observation: observation.to_string(),
            action: action.clone(),
            core_variable: core_variable.to_string(),
        };
        match self.ask(query).await? {
            OracleAnswer::Variation { variation } => Ok(variation.trim().to_string()),
            other => Err(unexpected(OracleQueryKind::ActualVariation, &other)),
        }
    }

    /// No actual change is never out of bounds; any change against an empty bound always is.
    /// Only the remaining case reaches the transport.
    pub async fn is_variation_beyond_bounds(
        &self,
        actual_variation: &str,
        expected_variability: &str,
        core_variable: &str,
    ) -> Result<bool, OracleError> {
        if actual_variation.trim().is_empty() {
            return Ok(false);
        }
        if expected_variability.trim().is_empty() {
            return Ok(true);
        }

        let query = OracleQuery::IsVariationBeyondBounds {
            actual_variation: actual_variation.to_string(),
            expected_variability: expected_variability.to_string(),
            core_variable: core_variable.to_string(),
        };
        self.ask_verdict(query).await
    }

    pub async fn state_affects_core_variables(
        &self,
        state: &str,
        core_variables: &[String],
        task: &str,
    ) -> Result<Vec<CoreVariableRelation>, OracleError> {
        let query = OracleQuery::StateAffectsCoreVariables {
            state: state.to_string(),
            core_variables: core_variables.to_vec(),
            task: task.to_string(),
        };
        match self.ask(query).await? {
            OracleAnswer::Relations { relations } => {
                for relation in &relations {
                    if relation.core_variable.trim().is_empty()
                        || relation.relation.trim().is_empty()
                    {
                        return Err(contract_violation(
                            OracleQueryKind::StateAffectsCoreVariables,
                            format!(
                                "relation from '{}' is missing its core variable or label",
                                state
                            ),
                        ));
                    }
                }
                Ok(relations)
            }
            other => Err(unexpected(OracleQueryKind::StateAffectsCoreVariables, &other)),
        }
    }

    async fn ask(&self, query: OracleQuery) -> Result<OracleAnswer, OracleError> {
        let kind = query.kind();
        tracing::debug!(target: "oracle", query = %kind, "oracle_query_sent");
        self.transport.answer(query).await.map_err(|err| {
            tracing::warn!(target: "oracle", query = %kind, error = %err, "oracle_query_failed");
            match err.query {
                Some(_) => err,
                None => err.with_query(kind),
            }
        })
    }

    async fn ask_verdict(&self, query: OracleQuery) -> Result<bool, OracleError> {
        let kind = query.kind();
        match self.ask(query).await? {
            OracleAnswer::Verdict { value } => Ok(value),
            other => Err(unexpected(kind, &other)),
        }
    }

    async fn ask_state_choice(
        &self,
        kind: OracleQueryKind,
        query: OracleQuery,
    ) -> Result<StateChoice, OracleError> {
        match self.ask(query).await? {
            OracleAnswer::StateChoice(choice) => Ok(choice),
            other => Err(unexpected(kind, &other)),
        }
    }
}

fn resolve_choice(
    kind: OracleQueryKind,
    choice: StateChoice,
    mut candidates: impl ExactSizeIterator<Item = NodeKey>,
) -> Result<StateResolution, OracleError> {
    let len = candidates.len();
    if let Ok(index) = usize::try_from(choice.index)
        && index < len
        && let Some(existing) = candidates.nth(index)
    {
        return Ok(StateResolution::Existing(existing));
    }

    let name = choice.new_state.trim();
    if name.is_empty() {
        return Err(contract_violation(
            kind,
            format!(
                "no candidate selected (index {} of {}) and the new state name is blank",
                choice.index, len
            ),
        ));
    }
    Ok(StateResolution::New(name.to_string()))
}

fn unexpected(kind: OracleQueryKind, answer: &OracleAnswer) -> OracleError {
    contract_violation(
        kind,
        format!("expected a different answer shape, got '{}'", answer.shape()),
    )
}
