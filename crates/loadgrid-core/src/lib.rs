//! loadgrid-core — shared types for the loadgrid cluster simulator.
//!
//! - **`types`** — `Task`, `SizeClass`, `Algorithm`, `TaskSpec`
//! - **`config`** — `cluster.toml` parsing

pub mod config;
pub mod types;

pub use config::{ClusterConfig, HostSettings};
pub use types::*;
