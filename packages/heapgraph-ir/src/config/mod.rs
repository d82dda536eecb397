//! Analysis configuration
//!
//! Two tiers:
//! - Level 1: Preset - one call (`AnalysisConfig::from_preset(Preset::Fast)`)
//! - Level 2: YAML with per-field overrides on top of a preset
//!
//! # Examples
//!
//! ```rust,ignore
//! use heapgraph_ir::config::{AnalysisConfig, Preset};
//!
//! let config = AnalysisConfig::from_preset(Preset::Balanced)
//!     .max_stack_depth(8)
//!     .exclude_namespace("Vendor.Generated");
//! config.validate()?;
//!
//! let config = AnalysisConfig::from_yaml_file("analysis.yaml")?;
//! ```

pub mod analysis_config;
pub mod error;
pub mod io;
pub mod preset;

pub use analysis_config::{AnalysisConfig, DEFAULT_ASSUMED_PURE_PREFIXES, DEFAULT_EXCLUDED_NAMESPACES};
pub use error::{ConfigError, ConfigResult};
pub use io::{AnalysisOverrides, ConfigExportV1};
pub use preset::{Preset, Tuning};
