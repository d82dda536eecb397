//! Configuration I/O
//!
//! Defines the YAML schema types. Loading and export live on
//! [`AnalysisConfig`](super::AnalysisConfig).

use super::analysis_config::AnalysisConfig;
use serde::{Deserialize, Serialize};

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigExportV1 {
    /// Schema version (always 1 for v1)
    pub version: Option<u32>,

    /// Base preset
    pub preset: String,

    /// Fine-grained overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<AnalysisOverrides>,
}

/// Settings replacing the preset's values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interprocedural: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixpoint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_stack_depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fixpoint_iterations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolve_virtual_calls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worst_case: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assume_more_pures: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_confined_by_default: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_annotations: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_namespaces: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assumed_pure_prefixes: Option<Vec<String>>,
}

impl From<&AnalysisConfig> for AnalysisOverrides {
    fn from(c: &AnalysisConfig) -> Self {
        Self {
            interprocedural: Some(c.interprocedural),
            fixpoint: Some(c.fixpoint),
            max_stack_depth: Some(c.max_stack_depth),
            max_fixpoint_iterations: Some(c.max_fixpoint_iterations),
            resolve_virtual_calls: Some(c.resolve_virtual_calls),
            worst_case: Some(c.worst_case),
            assume_more_pures: Some(c.assume_more_pures),
            write_confined_by_default: Some(c.write_confined_by_default),
            verify_annotations: Some(c.verify_annotations),
            class_filter: c.class_filter.clone(),
            module_filter: c.module_filter.clone(),
            excluded_namespaces: Some(c.excluded_namespaces.clone()),
            assumed_pure_prefixes: Some(c.assumed_pure_prefixes.clone()),
        }
    }
}
