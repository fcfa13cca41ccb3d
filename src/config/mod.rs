//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, backend address parsing)
//!     → Settings (validated, immutable)
//!     → handed to the entry point at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no reload at runtime
//! - Optional sections have defaults; bind, port, max_connections and
//!   backends do not
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{parse_balance, parse_config, read_config, ConfigError};
pub use schema::{LimitsConfig, Mode, ObservabilityConfig, ProxyConfig, ServerConfig, TimeoutConfig};
pub use validation::{validate_config, Settings, ValidationError};
