pub mod cache;
pub mod error;
pub mod graph;
pub mod model;
pub mod types;

pub use cache::WorldCaches;
pub use error::{WorldModelError, WorldModelErrorKind};
pub use graph::StateGraph;
pub use model::WorldModel;
pub use types::{
    CoreVariableRelation, Edge, EdgeAttrs, EdgeKey, NodeAttrs, NodeKey, NodeKind, Observation,
    TRANSITION_RELATION,
};
