use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    action_space::{ActionCall, ActionSchema},
    oracle::{
        error::{OracleError, OracleErrorKind},
        ports::OracleTransport,
        types::{OracleAnswer, OracleQuery, OracleQueryKind, StateChoice, TransitionCandidate},
    },
    world_model::CoreVariableRelation,
};

pub type VariabilityHook = Arc<dyn Fn(&str) -> String + Send + Sync>;
pub type AlwaysSafeHook = Arc<dyn Fn(&ActionSchema) -> bool + Send + Sync>;
pub type ParamRangeHook = Arc<dyn Fn(&ActionSchema) -> Option<String> + Send + Sync>;
pub type WithinRangeHook = Arc<dyn Fn(&ActionCall, &str) -> bool + Send + Sync>;
pub type MatchStateHook = Arc<dyn Fn(&[String], &str) -> StateChoice + Send + Sync>;
pub type NextStateHook =
    Arc<dyn Fn(&str, &ActionCall, &[TransitionCandidate]) -> StateChoice + Send + Sync>;
pub type VariationHook = Arc<dyn Fn(&str, &ActionCall, &str) -> String + Send + Sync>;
pub type BoundsHook = Arc<dyn Fn(&str, &str, &str) -> bool + Send + Sync>;
pub type AffectsHook = Arc<dyn Fn(&str, &[String]) -> Vec<CoreVariableRelation> + Send + Sync>;

/// Scripted oracle for tests: one hook per query kind, call accounting, optional latency and
/// injected failures.
///
/// Defaults describe a harmless world: variables have no variability, nothing is always safe,
/// no parameter ranges, every observation names a new state after itself, every action leads to
/// `after_<action>`, and no variation is ever observed.
#[derive(Clone)]
pub struct ScriptedOracle {
    variability: VariabilityHook,
    always_safe: AlwaysSafeHook,
    param_range: ParamRangeHook,
    within_range: WithinRangeHook,
    match_state: MatchStateHook,
    next_state: NextStateHook,
    variation: VariationHook,
    bounds: BoundsHook,
    affects: AffectsHook,
    latency: Option<Duration>,
    failing: Arc<Mutex<BTreeSet<OracleQueryKind>>>,
    log: Arc<Mutex<Vec<OracleQuery>>>,
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self {
            variability: Arc::new(|_: &str| String::new()),
            always_safe: Arc::new(|_: &ActionSchema| false),
            param_range: Arc::new(|_: &ActionSchema| -> Option<String> { None }),
            within_range: Arc::new(|_: &ActionCall, _: &str| true),
            match_state: Arc::new(|_: &[String], observation: &str| {
                StateChoice::new_state(observation)
            }),
            next_state: Arc::new(
                |_: &str, action: &ActionCall, _: &[TransitionCandidate]| {
                    StateChoice::new_state(format!("after_{}", action.name))
                },
            ),
            variation: Arc::new(|_: &str, _: &ActionCall, _: &str| String::new()),
            bounds: Arc::new(|_: &str, _: &str, _: &str| false),
            affects: Arc::new(|_: &str, _: &[String]| -> Vec<CoreVariableRelation> {
                Vec::new()
            }),
            latency: None,
            failing: Arc::new(Mutex::new(BTreeSet::new())),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variability(
        mut self,
        hook: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.variability = Arc::new(hook);
        self
    }

    pub fn with_always_safe(
        mut self,
        hook: impl Fn(&ActionSchema) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.always_safe = Arc::new(hook);
        self
    }

    pub fn with_param_range(
        mut self,
        hook: impl Fn(&ActionSchema) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.param_range = Arc::new(hook);
        self
    }

    pub fn with_within_range(
        mut self,
        hook: impl Fn(&ActionCall, &str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.within_range = Arc::new(hook);
        self
    }

    pub fn with_match_state(
        mut self,
        hook: impl Fn(&[String], &str) -> StateChoice + Send + Sync + 'static,
    ) -> Self {
        self.match_state = Arc::new(hook);
        self
    }

    pub fn with_next_state(
        mut self,
        hook: impl Fn(&str, &ActionCall, &[TransitionCandidate]) -> StateChoice
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.next_state = Arc::new(hook);
        self
    }

    pub fn with_variation(
        mut self,
        hook: impl Fn(&str, &ActionCall, &str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.variation = Arc::new(hook);
        self
    }

    pub fn with_bounds(
        mut self,
        hook: impl Fn(&str, &str, &str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.bounds = Arc::new(hook);
        self
    }

    pub fn with_affects(
        mut self,
        hook: impl Fn(&str, &[String]) -> Vec<CoreVariableRelation> + Send + Sync + 'static,
    ) -> Self {
        self.affects = Arc::new(hook);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every later query of `kind` fail as unavailable until [`Self::recover`].
    pub fn fail(&self, kind: OracleQueryKind) {
        self.failing
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .insert(kind);
    }

    pub fn recover(&self, kind: OracleQueryKind) {
        self.failing
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .remove(&kind);
    }

    pub fn calls(&self, kind: OracleQueryKind) -> usize {
        self.log
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .iter()
            .filter(|query| query.kind() == kind)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.log.lock().unwrap_or_else(|err| err.into_inner()).len()
    }

    pub fn call_counts(&self) -> BTreeMap<OracleQueryKind, usize> {
        let mut counts = BTreeMap::new();
        for query in self.log.lock().unwrap_or_else(|err| err.into_inner()).iter() {
            *counts.entry(query.kind()).or_insert(0) += 1;
        }
        counts
    }

    pub fn queries(&self) -> Vec<OracleQuery> {
        self.log.lock().unwrap_or_else(|err| err.into_inner()).clone()
    }

    fn respond(&self, query: &OracleQuery) -> OracleAnswer {
        match query {
            OracleQuery::CoreVariableVariability { core_variable, .. } => {
                OracleAnswer::Variability {
                    variability: (self.variability)(core_variable),
                }
            }
            OracleQuery::IsAlwaysSafe { action, .. } => OracleAnswer::Verdict {
                value: (self.always_safe)(action),
            },
            OracleQuery::UsualParamRange { action, .. } => OracleAnswer::ParamRange {
                param_range: (self.param_range)(action),
            },
            OracleQuery::IsParamWithinRange {
                action,
                param_range,
                ..
            } => OracleAnswer::Verdict {
                value: (self.within_range)(action, param_range),
            },
            OracleQuery::MatchEffectiveState {
                candidates,
                observation,
                ..
            } => OracleAnswer::StateChoice((self.match_state)(candidates, observation)),
            OracleQuery::NextEffectiveState {
                current_state,
                action,
                candidates,
                ..
            } => OracleAnswer::StateChoice((self.next_state)(current_state, action, candidates)),
            OracleQuery::ActualVariation {
                effective_state,
                action,
                core_variable,
                ..
            } => OracleAnswer::Variation {
                variation: (self.variation)(effective_state, action, core_variable),
            },
            OracleQuery::IsVariationBeyondBounds {
                actual_variation,
                expected_variability,
                core_variable,
            } => OracleAnswer::Verdict {
                value: (self.bounds)(actual_variation, expected_variability, core_variable),
            },
            OracleQuery::StateAffectsCoreVariables {
                state,
                core_variables,
                ..
            } => OracleAnswer::Relations {
                relations: (self.affects)(state, core_variables),
            },
        }
    }
}

#[async_trait]
impl OracleTransport for ScriptedOracle {
    async fn answer(&self, query: OracleQuery) -> Result<OracleAnswer, OracleError> {
        self.log
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(query.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let kind = query.kind();
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .contains(&kind);
        if failing {
            return Err(OracleError::new(
                OracleErrorKind::Unavailable,
                format!("scripted outage for {kind}"),
            )
            .with_query(kind));
        }

        Ok(self.respond(&query))
    }
}

pub fn relation(core_variable: &str, relation: &str) -> CoreVariableRelation {
    CoreVariableRelation {
        core_variable: core_variable.to_string(),
        relation: relation.to_string(),
    }
}
