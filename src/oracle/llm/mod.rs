pub mod config;
pub mod output;
pub mod prompts;
pub mod reliability;
pub mod transport;

pub use config::{CredentialRef, LlmBackendConfig, ReliabilityConfig};
pub use transport::{LlmOracleTransport, map_http_error};
