use std::collections::VecDeque;

use async_trait::async_trait;

use crate::action_space::Action;

#[async_trait]
pub trait Agent: Send {
    /// Next action to attempt, or `None` when the agent has nothing left to do.
    async fn decide(&mut self, observation: &str) -> Option<Action>;
}

/// Plays back a fixed list of actions regardless of what it observes.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAgent {
    remaining: VecDeque<Action>,
}

impl ScriptedAgent {
    pub fn new(actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            remaining: actions.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn decide(&mut self, observation: &str) -> Option<Action> {
        let action = self.remaining.pop_front();
        tracing::trace!(
            target: "runner.agent",
            observation = observation,
            action = ?action,
            "agent_decided"
        );
        action
    }
}
