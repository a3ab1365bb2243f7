use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    action_space::{Action, ActionSignature, ActionSpace},
    oracle::{ReasoningOracle, SingleFlight},
    safety::{
        error::{SafetyError, SafetyResult},
        protocol::DecisionRun,
        types::{TaskContext, Verdict},
    },
    world_model::{NodeKey, WorldModel},
};

type DecisionKey = (String, ActionSignature);

struct Session {
    world: WorldModel,
    effective_state: NodeKey,
    context: Option<TaskContext>,
}

struct SafetyInner {
    initial_state: NodeKey,
    action_space: Arc<ActionSpace>,
    oracle: ReasoningOracle,
    session: Mutex<Session>,
    decisions: SingleFlight<DecisionKey, SafetyResult<Verdict>>,
}

/// Session-scoped gatekeeper for an agent's actions.
///
/// Decisions run one at a time against the session's world model. Identical checks issued
/// while one is in flight share its outcome. A decision that fails leaves the session exactly
/// as it was.
#[derive(Clone)]
pub struct SafetyModule {
    inner: Arc<SafetyInner>,
}

impl SafetyModule {
    pub fn new(
        initial_state: impl Into<NodeKey>,
        action_space: Arc<ActionSpace>,
        oracle: ReasoningOracle,
    ) -> SafetyResult<Self> {
        let initial_state = initial_state.into();
        if initial_state.trim().is_empty() {
            return Err(SafetyError::configuration("initial state cannot be empty"));
        }
        let world = WorldModel::new(&initial_state)?;

        Ok(Self {
            inner: Arc::new(SafetyInner {
                session: Mutex::new(Session {
                    world,
                    effective_state: initial_state.clone(),
                    context: None,
                }),
                initial_state,
                action_space,
                oracle,
                decisions: SingleFlight::new(),
            }),
        })
    }

    /// Learns the expected variability of each core variable for `task`. Must run once before
    /// any safety check.
    #[tracing::instrument(
        name = "analyze_core_variability",
        target = "safety",
        skip_all,
        fields(core_variables = core_variables.len())
    )]
    pub async fn analyze_core_variability(
        &self,
        core_variables: Vec<String>,
        task: impl Into<String>,
    ) -> SafetyResult<()> {
        let task = task.into();
        if let Some(blank) = core_variables.iter().find(|name| name.trim().is_empty()) {
            return Err(SafetyError::configuration(format!(
                "core variable names cannot be blank: {blank:?}"
            )));
        }

        let mut session = self.inner.session.lock().await;
        let variabilities = self
            .inner
            .oracle
            .analyze_core_variability(&core_variables, &task)
            .await?;

        let mut world = session.world.clone();
        world.set_variability(&core_variables, &variabilities)?;

        for (core_variable, variability) in core_variables.iter().zip(&variabilities) {
            tracing::info!(
                target: "safety",
                core_variable = %core_variable,
                variability = %variability,
                "core_variable_analyzed"
            );
        }

        session.world = world;
        session.context = Some(TaskContext {
            task,
            core_variables,
        });
        Ok(())
    }

    /// Decides whether `action` may run given the agent's current `observation`.
    pub async fn is_action_safe(
        &self,
        observation: &str,
        action: &Action,
    ) -> SafetyResult<Verdict> {
        let key = (observation.to_string(), action.signature());
        let inner = Arc::clone(&self.inner);
        let observation = observation.to_string();
        let action = action.clone();

        self.inner
            .decisions
            .run(key, move || async move { inner.decide(&observation, &action).await })
            .await
    }

    /// Resolves `observation` to an effective state and makes it the session's current one.
    pub async fn resolve_effective_state(&self, observation: &str) -> SafetyResult<NodeKey> {
        let mut session = self.inner.session.lock().await;
        let context = session
            .context
            .clone()
            .ok_or_else(|| not_analyzed("effective state resolution"))?;

        let mut run = DecisionRun::new(
            &self.inner.oracle,
            &context,
            &self.inner.initial_state,
            session.world.clone(),
            session.effective_state.clone(),
        );
        let state = run.resolve_effective_state(observation).await?;

        let (world, effective_state) = run.into_parts();
        session.world = world;
        session.effective_state = effective_state;
        Ok(state)
    }

    pub async fn effective_state(&self) -> NodeKey {
        self.inner.session.lock().await.effective_state.clone()
    }

    /// Snapshot of the session's world model.
    pub async fn world_model(&self) -> WorldModel {
        self.inner.session.lock().await.world.clone()
    }

    pub fn initial_state(&self) -> &str {
        &self.inner.initial_state
    }

    pub fn action_space(&self) -> &ActionSpace {
        &self.inner.action_space
    }
}

impl SafetyInner {
    #[tracing::instrument(
        name = "safety_decision",
        target = "safety",
        skip_all,
        fields(action = %action)
    )]
    async fn decide(&self, observation: &str, action: &Action) -> SafetyResult<Verdict> {
        let schema = self.action_space.get(&action.name).ok_or_else(|| {
            SafetyError::configuration(format!(
                "action '{}' is not in the action space",
                action.name
            ))
        })?;

        let mut session = self.session.lock().await;
        let context = session
            .context
            .clone()
            .ok_or_else(|| not_analyzed("safety check"))?;

        tracing::debug!(
            target: "safety",
            effective_state = %session.effective_state,
            "decision_started"
        );

        if session.world.is_analyzed(&action.name) && session.world.is_always_safe(&action.name) {
            tracing::debug!(target: "safety", "always_safe_short_circuit");
            return Ok(Verdict::Safe);
        }

        let mut run = DecisionRun::new(
            &self.oracle,
            &context,
            &self.initial_state,
            session.world.clone(),
            session.effective_state.clone(),
        );

        match run.run(observation, action, schema).await {
            Ok(verdict) => {
                let (world, effective_state) = run.into_parts();
                session.world = world;
                session.effective_state = effective_state;
                tracing::info!(
                    target: "safety",
                    verdict = %verdict,
                    effective_state = %session.effective_state,
                    "decision_committed"
                );
                Ok(verdict)
            }
            Err(err) => {
                tracing::warn!(
                    target: "safety",
                    error = %err,
                    retryable = err.is_retryable(),
                    "decision_aborted"
                );
                Err(err)
            }
        }
    }
}

fn not_analyzed(operation: &str) -> SafetyError {
    SafetyError::configuration(format!(
        "{operation} attempted before analyze_core_variability"
    ))
}
