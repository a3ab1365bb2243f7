use async_trait::async_trait;

use crate::{action_space::Action, world_model::Observation};

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
}

/// World the agent acts in. The safety module only ever sees its observations.
#[async_trait]
pub trait Environment: Send {
    async fn reset(&mut self) -> StepOutcome;

    async fn step(&mut self, action: &Action) -> StepOutcome;
}

const TERMINAL_STATE: &str = "terminal_state";

/// Stand-in for a browser environment: the observation is just a label for the last action.
#[derive(Debug, Clone)]
pub struct WebEnvironment {
    initial_state: String,
    state: String,
}

impl WebEnvironment {
    pub fn new(initial_state: impl Into<String>) -> Self {
        let initial_state = initial_state.into();
        Self {
            state: initial_state.clone(),
            initial_state,
        }
    }

    pub fn state(&self) -> &str {
        &self.state
    }
}

#[async_trait]
impl Environment for WebEnvironment {
    async fn reset(&mut self) -> StepOutcome {
        self.state = self.initial_state.clone();
        tracing::debug!(target: "runner.env", state = %self.state, "environment_reset");
        StepOutcome {
            observation: self.state.clone(),
            reward: 0.0,
            done: false,
        }
    }

    async fn step(&mut self, action: &Action) -> StepOutcome {
        self.state = format!("state_after_{action}");
        tracing::debug!(target: "runner.env", action = %action, state = %self.state, "environment_stepped");
        StepOutcome {
            observation: self.state.clone(),
            reward: 1.0,
            done: self.state == TERMINAL_STATE,
        }
    }
}
