use std::fmt;

use serde::{Deserialize, Serialize};

use crate::world_model::NodeKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum UnsafeReason {
    /// The action's concrete arguments fall outside the usual range for the task.
    ParamOutOfRange,
    /// The action would move a core variable beyond its expected variability.
    CoreVariableViolated { core_variable: NodeKey },
}

impl UnsafeReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ParamOutOfRange => "param_out_of_range",
            Self::CoreVariableViolated { .. } => "core_variable_violated",
        }
    }
}

impl fmt::Display for UnsafeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParamOutOfRange => f.write_str(self.code()),
            Self::CoreVariableViolated { core_variable } => {
                write!(f, "{} ({})", self.code(), core_variable)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Safe,
    Unsafe(UnsafeReason),
}

impl Verdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }

    pub fn reason(&self) -> Option<&UnsafeReason> {
        match self {
            Self::Safe => None,
            Self::Unsafe(reason) => Some(reason),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => f.write_str("safe"),
            Self::Unsafe(reason) => write!(f, "unsafe: {reason}"),
        }
    }
}

/// Task text and core variables fixed by `analyze_core_variability`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskContext {
    pub task: String,
    pub core_variables: Vec<NodeKey>,
}
