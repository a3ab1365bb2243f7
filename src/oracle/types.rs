use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    action_space::{ActionCall, ActionSchema},
    world_model::{CoreVariableRelation, NodeKey},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum OracleQueryKind {
    CoreVariableVariability,
    IsAlwaysSafe,
    UsualParamRange,
    IsParamWithinRange,
    MatchEffectiveState,
    NextEffectiveState,
    ActualVariation,
    IsVariationBeyondBounds,
    StateAffectsCoreVariables,
}

impl OracleQueryKind {
    pub const ALL: [OracleQueryKind; 9] = [
        Self::CoreVariableVariability,
        Self::IsAlwaysSafe,
        Self::UsualParamRange,
        Self::IsParamWithinRange,
        Self::MatchEffectiveState,
        Self::NextEffectiveState,
        Self::ActualVariation,
        Self::IsVariationBeyondBounds,
        Self::StateAffectsCoreVariables,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CoreVariableVariability => "core_variable_variability",
            Self::IsAlwaysSafe => "is_always_safe",
            Self::UsualParamRange => "usual_param_range",
            Self::IsParamWithinRange => "is_param_within_range",
            Self::MatchEffectiveState => "match_effective_state",
            Self::NextEffectiveState => "next_effective_state",
            Self::ActualVariation => "actual_variation",
            Self::IsVariationBeyondBounds => "is_variation_beyond_bounds",
            Self::StateAffectsCoreVariables => "state_affects_core_variables",
        }
    }
}

impl fmt::Display for OracleQueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate transition offered to `next_effective_state`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TransitionCandidate {
    pub next_state: NodeKey,
    pub relation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum OracleQuery {
    CoreVariableVariability {
        core_variable: String,
        task: String,
    },
    IsAlwaysSafe {
        action: ActionSchema,
        task: String,
        initial_state: String,
        core_variables: Vec<String>,
    },
    UsualParamRange {
        action: ActionSchema,
        task: String,
        initial_state: String,
    },
    IsParamWithinRange {
        action: ActionCall,
        task: String,
        initial_state: String,
        param_range: String,
    },
    MatchEffectiveState {
        candidates: Vec<NodeKey>,
        observation: String,
        core_variables: Vec<String>,
        task: String,
    },
    NextEffectiveState {
        current_state: NodeKey,
        action: ActionCall,
        candidates: Vec<TransitionCandidate>,
        task: String,
        core_variables: Vec<String>,
    },
    ActualVariation {
        effective_state: NodeKey,
        observation: String,
        action: ActionCall,
        core_variable: String,
    },
    IsVariationBeyondBounds {
        actual_variation: String,
        expected_variability: String,
        core_variable: String,
    },
    StateAffectsCoreVariables {
        state: NodeKey,
        core_variables: Vec<String>,
        task: String,
    },
}

impl OracleQuery {
    pub fn kind(&self) -> OracleQueryKind {
        match self {
            Self::CoreVariableVariability { .. } => OracleQueryKind::CoreVariableVariability,
            Self::IsAlwaysSafe { .. } => OracleQueryKind::IsAlwaysSafe,
            Self::UsualParamRange { .. } => OracleQueryKind::UsualParamRange,
            Self::IsParamWithinRange { .. } => OracleQueryKind::IsParamWithinRange,
            Self::MatchEffectiveState { .. } => OracleQueryKind::MatchEffectiveState,
            Self::NextEffectiveState { .. } => OracleQueryKind::NextEffectiveState,
            Self::ActualVariation { .. } => OracleQueryKind::ActualVariation,
            Self::IsVariationBeyondBounds { .. } => OracleQueryKind::IsVariationBeyondBounds,
            Self::StateAffectsCoreVariables { .. } => OracleQueryKind::StateAffectsCoreVariables,
        }
    }
}

/// Pick among indexed candidates, or name a new state when `index` is out of range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StateChoice {
    pub index: i64,
    #[serde(default)]
    pub new_state: String,
}

impl StateChoice {
    pub fn existing(index: usize) -> Self {
        Self {
            index: index as i64,
            new_state: String::new(),
        }
    }

    pub fn new_state(name: impl Into<String>) -> Self {
        Self {
            index: -1,
            new_state: name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "answer", rename_all = "snake_case")]
pub enum OracleAnswer {
    Variability { variability: String },
    Verdict { value: bool },
    ParamRange { param_range: Option<String> },
    StateChoice(StateChoice),
    Variation { variation: String },
    Relations { relations: Vec<CoreVariableRelation> },
}

impl OracleAnswer {
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Variability { .. } => "variability",
            Self::Verdict { .. } => "verdict",
            Self::ParamRange { .. } => "param_range",
            Self::StateChoice(_) => "state_choice",
            Self::Variation { .. } => "variation",
            Self::Relations { .. } => "relations",
        }
    }
}

/// Outcome of resolving a state choice against its candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateResolution {
    Existing(NodeKey),
    New(NodeKey),
}

impl StateResolution {
    pub fn key(&self) -> &NodeKey {
        match self {
            Self::Existing(key) | Self::New(key) => key,
        }
    }

    pub fn into_key(self) -> NodeKey {
        match self {
            Self::Existing(key) | Self::New(key) => key,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::New(_))
    }
}
