pub mod error;
pub mod module;
mod protocol;
pub mod types;

pub use error::{SafetyError, SafetyResult};
pub use module::SafetyModule;
pub use types::{TaskContext, UnsafeReason, Verdict};
