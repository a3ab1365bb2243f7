use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldModelErrorKind {
    GraphInconsistency,
    ArityMismatch,
    UnknownNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldModelError {
    pub kind: WorldModelErrorKind,
    pub message: String,
}

impl WorldModelError {
    pub fn new(kind: WorldModelErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for WorldModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for WorldModelError {}

pub fn graph_inconsistency(message: impl Into<String>) -> WorldModelError {
    WorldModelError::new(WorldModelErrorKind::GraphInconsistency, message)
}

pub fn arity_mismatch(message: impl Into<String>) -> WorldModelError {
    WorldModelError::new(WorldModelErrorKind::ArityMismatch, message)
}

pub fn unknown_node(message: impl Into<String>) -> WorldModelError {
    WorldModelError::new(WorldModelErrorKind::UnknownNode, message)
}
