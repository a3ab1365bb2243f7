use serde::{Deserialize, Serialize};

pub type NodeKey = String;
pub type Observation = String;

pub const TRANSITION_RELATION: &str = "transition";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    State,
    CoreVariable,
}

/// Attributes stored on a graph node. The variant is the node's kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum NodeAttrs {
    State,
    CoreVariable {
        /// Expected range of change. Empty means the variable must not change.
        variability: String,
    },
}

impl NodeAttrs {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::State => NodeKind::State,
            Self::CoreVariable { .. } => NodeKind::CoreVariable,
        }
    }

    pub fn core_variable(variability: impl Into<String>) -> Self {
        Self::CoreVariable {
            variability: variability.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub subject: NodeKey,
    pub relation: String,
    pub object: NodeKey,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EdgeAttrs {
    /// Action that triggers a transition edge. `None` for core-variable relations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
}

impl EdgeAttrs {
    pub fn transition(action_name: impl Into<String>) -> Self {
        Self {
            action_name: Some(action_name.into()),
        }
    }
}

/// A directed edge as returned to callers, endpoints and attributes flattened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Edge {
    pub subject: NodeKey,
    pub relation: String,
    pub object: NodeKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
}

impl Edge {
    pub fn transition(
        subject: impl Into<NodeKey>,
        object: impl Into<NodeKey>,
        action_name: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: TRANSITION_RELATION.to_string(),
            object: object.into(),
            action_name: Some(action_name.into()),
        }
    }

    pub fn relation(
        subject: impl Into<NodeKey>,
        relation: impl Into<String>,
        object: impl Into<NodeKey>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
            action_name: None,
        }
    }

    pub fn is_transition(&self) -> bool {
        self.relation == TRANSITION_RELATION
    }

    pub(crate) fn from_parts(key: &EdgeKey, attrs: &EdgeAttrs) -> Self {
        Self {
            subject: key.subject.clone(),
            relation: key.relation.clone(),
            object: key.object.clone(),
            action_name: attrs.action_name.clone(),
        }
    }
}

/// A core variable a state may affect, and how.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CoreVariableRelation {
    pub core_variable: String,
    pub relation: String,
}
