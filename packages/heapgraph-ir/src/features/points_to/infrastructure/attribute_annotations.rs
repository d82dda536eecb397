//! Attribute-backed annotation policy
//!
//! Answers effect queries from the attributes recorded on methods and
//! parameters, plus a set of naming heuristics for well-known library code.

use crate::config::AnalysisConfig;
use crate::features::ir::{MethodId, ParamAttributes, ParamMode, Program, VarId};
use crate::features::points_to::ports::AnnotationProvider;

const PURE_BY_NAME: &[&str] = &["Equals", "GetHashCode", "ToString"];
const CONTRACTS_NAMESPACE: &str = "Microsoft.Contracts";
const PURE_CTOR_TYPES: &[&str] = &["System.Object", "System.Collections"];

#[derive(Debug, Clone)]
pub struct AttributeAnnotations {
    pub worst_case: bool,
    pub assume_more_pures: bool,
    pub write_confined_by_default: bool,
    pub assumed_pure_prefixes: Vec<String>,
}

impl Default for AttributeAnnotations {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl AttributeAnnotations {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            worst_case: config.worst_case,
            assume_more_pures: config.assume_more_pures,
            write_confined_by_default: config.write_confined_by_default,
            assumed_pure_prefixes: config.assumed_pure_prefixes.clone(),
        }
    }

    fn param_attrs<'p>(program: &'p Program, p: VarId) -> Option<&'p ParamAttributes> {
        program.param_info(p).map(|info| &info.attributes)
    }

    fn is_this(program: &Program, p: VarId) -> Option<MethodId> {
        let m = program.param_method(p)?;
        let this = program.method(m).this_param.as_ref()?;
        (this.var == p).then_some(m)
    }

    /// Library methods known to have no visible side effects
    fn is_assumed_confined(&self, program: &Program, m: MethodId) -> bool {
        let def = program.method(m);
        let attrs = &def.attributes;
        let name = def.name.as_str();
        let full_name = program.method_full_name(m);
        let declaring = program.declaring_type_name(m);

        if attrs.confined || attrs.state_independent {
            return true;
        }
        if PURE_BY_NAME.contains(&name) || declaring.starts_with(CONTRACTS_NAMESPACE) {
            return true;
        }
        if self.assume_more_pures
            && (name.contains("GetEnumerator")
                || ["Is", "Get_", "get_", "GetString", "IndexOf"]
                    .iter()
                    .any(|p| name.starts_with(p))
                || def.is_constructor()
                || full_name.starts_with("System.ThrowHelper"))
        {
            return true;
        }
        if self.assumed_pure_prefixes.iter().any(|p| full_name.starts_with(p.as_str())) {
            return true;
        }
        if def.is_constructor() && PURE_CTOR_TYPES.iter().any(|t| declaring.starts_with(t)) {
            return true;
        }
        name == "Parse" && program.is_primitive(def.declaring_type)
    }

    fn is_declared_write_confined(&self, program: &Program, m: MethodId) -> bool {
        !self.worst_case && (self.write_confined_by_default || program.method(m).attributes.write_confined)
    }

    fn is_declared_write_confined_param(&self, program: &Program, p: VarId) -> bool {
        !self.worst_case
            && (self.write_confined_by_default
                || Self::param_attrs(program, p).and_then(|a| a.write_confined) == Some(true))
    }

    fn is_declared_write(&self, program: &Program, p: VarId) -> bool {
        self.worst_case || Self::param_attrs(program, p).and_then(|a| a.write).unwrap_or(true)
    }

    /// `Some(owned)` when the receiver of `m` may escape
    fn method_escaping(&self, program: &Program, m: MethodId) -> Option<bool> {
        if self.worst_case {
            return Some(true);
        }
        let def = program.method(m);
        if def.is_constructor() {
            return None;
        }
        if !def.flags.is_static && def.attributes.captured {
            return Some(true);
        }
        def.attributes.escapes.filter(|e| e.value).map(|e| e.owned)
    }
}

impl AnnotationProvider for AttributeAnnotations {
    fn is_declared_pure(&self, program: &Program, m: MethodId) -> bool {
        let a = &program.method(m).attributes;
        !self.worst_case && (a.pure || a.confined || a.state_independent)
    }

    fn is_assumed_pure(&self, program: &Program, m: MethodId) -> bool {
        !self.worst_case && (self.is_declared_pure(program, m) || self.is_assumed_confined(program, m))
    }

    fn is_declared_fresh(&self, program: &Program, m: MethodId) -> bool {
        let a = &program.method(m).attributes;
        !self.worst_case && (a.fresh || a.return_fresh)
    }

    fn is_declared_fresh_param(&self, program: &Program, p: VarId) -> bool {
        !self.worst_case && Self::param_attrs(program, p).map_or(false, |a| a.fresh)
    }

    fn declared_escaping(&self, program: &Program, p: VarId) -> Option<bool> {
        if self.worst_case {
            return Some(true);
        }
        if let Some(m) = Self::is_this(program, p) {
            return self.method_escaping(program, m);
        }
        let attrs = Self::param_attrs(program, p)?;
        if attrs.captured {
            return Some(true);
        }
        attrs.escapes.filter(|e| e.value).map(|e| e.owned)
    }

    fn is_declared_read(&self, program: &Program, p: VarId) -> bool {
        self.worst_case || Self::param_attrs(program, p).and_then(|a| a.read).unwrap_or(true)
    }

    fn is_write_parameter(&self, program: &Program, m: MethodId, p: VarId) -> bool {
        if program.method(m).is_constructor() {
            return false;
        }
        let out = program.param_mode(p) == Some(ParamMode::Out);
        (!self.is_assumed_pure(program, m) && self.is_declared_write(program, p)) || out
    }

    fn is_write_confined_parameter(&self, program: &Program, m: MethodId, p: VarId) -> bool {
        !self.is_assumed_pure(program, m)
            && (self.is_declared_write_confined(program, m) || self.is_declared_write_confined_param(program, p))
    }

    fn is_declared_accessing_globals(&self, program: &Program, m: MethodId) -> bool {
        if self.worst_case {
            return true;
        }
        let def = program.method(m);
        if let Some(v) = def.attributes.global_access {
            return v;
        }
        !(self.is_assumed_confined(program, m) || def.is_constructor())
    }

    fn is_declared_reading_globals(&self, program: &Program, m: MethodId) -> bool {
        if self.worst_case {
            return true;
        }
        if let Some(v) = program.method(m).attributes.global_read {
            return v;
        }
        self.is_declared_accessing_globals(program, m)
            && !self.is_assumed_confined(program, m)
            && !self.is_declared_write_confined(program, m)
    }

    fn is_declared_writing_globals(&self, program: &Program, m: MethodId) -> bool {
        if self.worst_case {
            return true;
        }
        if let Some(v) = program.method(m).attributes.global_write {
            return v;
        }
        self.is_declared_accessing_globals(program, m)
            && !self.is_assumed_pure(program, m)
            && !self.is_declared_write_confined(program, m)
    }

    fn is_annotated(&self, program: &Program, m: MethodId) -> bool {
        let def = program.method(m);
        let a = &def.attributes;
        let method_level = a.write.is_some()
            || a.write_confined
            || a.global_write.is_some()
            || a.global_read.is_some()
            || a.pure;
        method_level
            || def.all_params().any(|p| {
                let pa = &p.attributes;
                pa.read.is_some() || pa.pure || pa.write.is_some() || pa.write_confined.is_some() || pa.escapes.is_some()
            })
    }
}
