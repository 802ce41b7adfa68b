//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON)
//!     → loader.rs (parse & deserialize, units.rs for durations)
//!     → validation.rs (semantic checks)
//!     → AllocatorConfig / MemLimiterConfig (validated, immutable)
//!     → handed to the service constructor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - Sizes and durations are human-readable ("1GiB", "250ms")
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod units;
pub mod validation;

pub use loader::{load_config, load_memlimiter_config, ConfigError};
pub use schema::{AllocatorConfig, ListenerConfig, MemLimiterConfig, ObservabilityConfig, TimeoutConfig};
pub use validation::ValidationError;
