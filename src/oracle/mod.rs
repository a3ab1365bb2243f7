pub mod error;
pub mod llm;
pub mod memoized;
pub mod ports;
pub mod reasoning;
pub mod single_flight;
pub mod testing;
pub mod types;

pub use error::{OracleError, OracleErrorKind};
pub use memoized::MemoizedTransport;
pub use ports::OracleTransport;
pub use reasoning::ReasoningOracle;
pub use single_flight::SingleFlight;
pub use types::{
    OracleAnswer, OracleQuery, OracleQueryKind, StateChoice, StateResolution, TransitionCandidate,
};
