//! Analysis session configuration

use super::error::{ConfigError, ConfigResult};
use super::io::{AnalysisOverrides, ConfigExportV1};
use super::preset::Preset;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Method-name prefixes treated as pure when no attribute says otherwise
pub const DEFAULT_ASSUMED_PURE_PREFIXES: &[&str] = &[
    "Linq.Enumerable.",
    "System.Query.",
    "System.Query.Sequence.Where",
    "System.Query.Sequence.Select",
    "System.Environment.GetResourceFromDefault",
    "System.Threading.Interlocked.CompareExchange",
    "System.Threading.Monitor.Enter",
    "System.Threading.Monitor.Exit",
    "System.Collections.ICollection.get_SyncRoot",
    "System.Activator.CreateInstance",
    "System.ArgumentNullException",
];

/// Namespaces whose methods are never analyzed
pub const DEFAULT_EXCLUDED_NAMESPACES: &[&str] = &["Microsoft.Contracts"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Bind callees through their summaries (otherwise every call uses annotations)
    pub interprocedural: bool,

    /// SCC fixpoint instead of on-demand inlining
    pub fixpoint: bool,

    /// Inlining depth bound
    pub max_stack_depth: usize,

    /// Worklist pops per SCC before the current summaries are kept
    pub max_fixpoint_iterations: usize,

    /// Resolve virtual calls on concrete inside receivers
    pub resolve_virtual_calls: bool,

    /// Every non-analyzed method is impure, escaping and global-writing
    pub worst_case: bool,

    /// Extend the assumed-pure heuristics to getters, `Is*`, `IndexOf*`, enumerators and constructors
    pub assume_more_pures: bool,

    pub write_confined_by_default: bool,

    /// Warn when a method declared fresh fails the freshness check
    pub verify_annotations: bool,

    /// Only analyze methods whose declaring type name contains this text
    pub class_filter: Option<String>,

    /// Only analyze methods of this module (the program's module when unset)
    pub module_filter: Option<String>,

    pub excluded_namespaces: Vec<String>,

    pub assumed_pure_prefixes: Vec<String>,

    #[serde(skip)]
    preset: Preset,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::from_preset(Preset::default())
    }
}

impl AnalysisConfig {
    /// Preset knobs over the shared defaults
    pub fn from_preset(preset: Preset) -> Self {
        let tuning = preset.tuning();
        Self {
            interprocedural: true,
            fixpoint: tuning.fixpoint,
            max_stack_depth: tuning.max_stack_depth,
            max_fixpoint_iterations: tuning.max_fixpoint_iterations,
            resolve_virtual_calls: tuning.resolve_virtual_calls,
            worst_case: false,
            assume_more_pures: false,
            write_confined_by_default: false,
            verify_annotations: tuning.verify_annotations,
            class_filter: None,
            module_filter: None,
            excluded_namespaces: DEFAULT_EXCLUDED_NAMESPACES.iter().map(|s| s.to_string()).collect(),
            assumed_pure_prefixes: DEFAULT_ASSUMED_PURE_PREFIXES.iter().map(|s| s.to_string()).collect(),
            preset,
        }
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_stack_depth == 0 || self.max_stack_depth > 64 {
            return Err(ConfigError::range_with_hint(
                "max_stack_depth",
                self.max_stack_depth,
                1,
                64,
                "Inlining needs at least one frame",
            ));
        }
        if self.max_fixpoint_iterations == 0 || self.max_fixpoint_iterations > 1_000_000 {
            return Err(ConfigError::range_with_hint(
                "max_fixpoint_iterations",
                self.max_fixpoint_iterations,
                1,
                1_000_000,
                "The SCC worklist must be allowed to run",
            ));
        }
        if self.fixpoint && !self.interprocedural {
            return Err(ConfigError::Conflict {
                issue: "fixpoint requires interprocedural analysis".to_string(),
                fix: "set interprocedural: true or fixpoint: false".to_string(),
            });
        }
        if self.assumed_pure_prefixes.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::Validation(
                "assumed_pure_prefixes must not contain empty entries".to_string(),
            ));
        }
        Ok(())
    }

    /// Builder: Set interprocedural
    pub fn interprocedural(mut self, v: bool) -> Self {
        self.interprocedural = v;
        self
    }

    /// Builder: Set fixpoint
    pub fn fixpoint(mut self, v: bool) -> Self {
        self.fixpoint = v;
        self
    }

    /// Builder: Set max_stack_depth
    pub fn max_stack_depth(mut self, v: usize) -> Self {
        self.max_stack_depth = v;
        self
    }

    /// Builder: Set max_fixpoint_iterations
    pub fn max_fixpoint_iterations(mut self, v: usize) -> Self {
        self.max_fixpoint_iterations = v;
        self
    }

    /// Builder: Set resolve_virtual_calls
    pub fn resolve_virtual_calls(mut self, v: bool) -> Self {
        self.resolve_virtual_calls = v;
        self
    }

    /// Builder: Set worst_case
    pub fn worst_case(mut self, v: bool) -> Self {
        self.worst_case = v;
        self
    }

    /// Builder: Set assume_more_pures
    pub fn assume_more_pures(mut self, v: bool) -> Self {
        self.assume_more_pures = v;
        self
    }

    /// Builder: Set write_confined_by_default
    pub fn write_confined_by_default(mut self, v: bool) -> Self {
        self.write_confined_by_default = v;
        self
    }

    /// Builder: Set verify_annotations
    pub fn verify_annotations(mut self, v: bool) -> Self {
        self.verify_annotations = v;
        self
    }

    /// Builder: Set class_filter
    pub fn class_filter(mut self, v: impl Into<String>) -> Self {
        self.class_filter = Some(v.into());
        self
    }

    /// Builder: Set module_filter
    pub fn module_filter(mut self, v: impl Into<String>) -> Self {
        self.module_filter = Some(v.into());
        self
    }

    /// Builder: Add an excluded namespace
    pub fn exclude_namespace(mut self, v: impl Into<String>) -> Self {
        self.excluded_namespaces.push(v.into());
        self
    }

    /// Builder: Add an assumed-pure prefix
    pub fn assume_pure(mut self, v: impl Into<String>) -> Self {
        self.assumed_pure_prefixes.push(v.into());
        self
    }

    // ═══════════════════════════════════════════════════════════════════════
    // YAML
    // ═══════════════════════════════════════════════════════════════════════

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let export: ConfigExportV1 = serde_yaml::from_str(content)?;

        match export.version {
            None => return Err(ConfigError::MissingVersion),
            Some(1) => {}
            Some(found) => {
                return Err(ConfigError::UnsupportedVersion {
                    found,
                    supported: vec![1],
                })
            }
        }

        let preset: Preset = export.preset.parse()?;
        let mut config = Self::from_preset(preset);
        if let Some(overrides) = export.overrides {
            config.apply(overrides);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Serializes as the preset plus every setting as an override
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let export = ConfigExportV1 {
            version: Some(1),
            preset: self.preset.to_string(),
            overrides: Some(AnalysisOverrides::from(self)),
        };
        serde_yaml::to_string(&export).map_err(ConfigError::Yaml)
    }

    fn apply(&mut self, o: AnalysisOverrides) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(v) = o.$field { self.$field = v; })*
            };
        }
        set!(
            interprocedural,
            fixpoint,
            max_stack_depth,
            max_fixpoint_iterations,
            resolve_virtual_calls,
            worst_case,
            assume_more_pures,
            write_confined_by_default,
            verify_annotations,
            excluded_namespaces,
            assumed_pure_prefixes
        );
        if o.class_filter.is_some() {
            self.class_filter = o.class_filter;
        }
        if o.module_filter.is_some() {
            self.module_filter = o.module_filter;
        }
    }
}
