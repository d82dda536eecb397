//! Named starting points for an analysis session

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How much precision a session buys with time.
///
/// Each preset fixes the solver knobs in [`Tuning`]; the remaining settings
/// start from the same defaults for every preset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Shallow inlining without fixpoint; virtual calls stay unresolved
    Fast,
    /// SCC fixpoint with virtual call resolution
    #[default]
    Balanced,
    /// Deeper bounds, and fresh-result annotations are checked
    Thorough,
    /// Balanced knobs, meant to be overridden from YAML or the builder
    Custom,
}

/// Solver knobs a preset decides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    pub fixpoint: bool,
    pub max_stack_depth: usize,
    pub max_fixpoint_iterations: usize,
    pub resolve_virtual_calls: bool,
    pub verify_annotations: bool,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::Fast, Preset::Balanced, Preset::Thorough, Preset::Custom];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Fast => "fast",
            Preset::Balanced => "balanced",
            Preset::Thorough => "thorough",
            Preset::Custom => "custom",
        }
    }

    pub fn tuning(self) -> Tuning {
        match self {
            Preset::Fast => Tuning {
                fixpoint: false,
                max_stack_depth: 3,
                max_fixpoint_iterations: 100,
                resolve_virtual_calls: false,
                verify_annotations: false,
            },
            Preset::Balanced | Preset::Custom => Tuning {
                fixpoint: true,
                max_stack_depth: 6,
                max_fixpoint_iterations: 1_000,
                resolve_virtual_calls: true,
                verify_annotations: false,
            },
            Preset::Thorough => Tuning {
                fixpoint: true,
                max_stack_depth: 12,
                max_fixpoint_iterations: 10_000,
                resolve_virtual_calls: true,
                verify_annotations: true,
            },
        }
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    /// Case-insensitive preset name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_string()))
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for preset in Preset::ALL {
            assert_eq!(preset.to_string().parse::<Preset>().unwrap(), preset);
        }
        assert_eq!(" Thorough ".parse::<Preset>().unwrap(), Preset::Thorough);
    }

    #[test]
    fn test_unknown_name_is_a_config_error() {
        let err = "turbo".parse::<Preset>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPreset(ref name) if name == "turbo"));
        assert!(err.to_string().contains("fast, balanced, thorough, custom"));
    }

    #[test]
    fn test_tuning_grows_with_precision() {
        let (fast, balanced, thorough) = (
            Preset::Fast.tuning(),
            Preset::Balanced.tuning(),
            Preset::Thorough.tuning(),
        );
        assert!(!fast.fixpoint && balanced.fixpoint && thorough.fixpoint);
        assert!(fast.max_stack_depth < balanced.max_stack_depth);
        assert!(balanced.max_stack_depth < thorough.max_stack_depth);
        assert!(thorough.verify_annotations && !balanced.verify_annotations);
        assert_eq!(Preset::Custom.tuning(), balanced);
        assert_eq!(Preset::default(), Preset::Balanced);
    }
}
