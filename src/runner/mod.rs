pub mod agent;
pub mod environment;
pub mod registry;

use serde::Serialize;

pub use agent::{Agent, ScriptedAgent};
pub use environment::{Environment, StepOutcome, WebEnvironment};
pub use registry::{DEFAULT_SETTING, EnvironmentKind, SettingsRegistry, TaskSetting};

use crate::{
    action_space::Action,
    safety::{SafetyModule, SafetyResult, UnsafeReason, Verdict},
    world_model::NodeKey,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HaltReason {
    ActionsExhausted,
    EnvironmentDone,
    Unsafe { action: Action, reason: UnsafeReason },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeReport {
    pub executed: Vec<Action>,
    pub halt: HaltReason,
    pub effective_state: NodeKey,
}

impl EpisodeReport {
    pub fn halted_unsafe(&self) -> bool {
        matches!(self.halt, HaltReason::Unsafe { .. })
    }
}

/// Runs one agent/environment episode, gating every action through `safety`.
///
/// The episode stops when the agent runs out of actions, the environment reports done, or an
/// action is judged unsafe. Errors from the safety module abort the episode.
#[tracing::instrument(name = "episode", target = "runner", skip_all, fields(task = %setting.task))]
pub async fn run_episode(
    setting: &TaskSetting,
    safety: &SafetyModule,
    agent: &mut dyn Agent,
    environment: &mut dyn Environment,
) -> SafetyResult<EpisodeReport> {
    safety
        .analyze_core_variability(setting.core_variables.clone(), setting.task.clone())
        .await?;

    let mut outcome = environment.reset().await;
    let mut executed = Vec::new();

    let halt = loop {
        if outcome.done {
            break HaltReason::EnvironmentDone;
        }
        let Some(action) = agent.decide(&outcome.observation).await else {
            break HaltReason::ActionsExhausted;
        };

        match safety.is_action_safe(&outcome.observation, &action).await? {
            Verdict::Safe => {
                tracing::info!(target: "runner", action = %action, "action_executed");
                outcome = environment.step(&action).await;
                executed.push(action);
            }
            Verdict::Unsafe(reason) => {
                tracing::warn!(
                    target: "runner",
                    action = %action,
                    reason = reason.code(),
                    "episode_halted_unsafe"
                );
                break HaltReason::Unsafe { action, reason };
            }
        }
    };

    Ok(EpisodeReport {
        executed,
        halt,
        effective_state: safety.effective_state().await,
    })
}
