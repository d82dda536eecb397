//! Edge fields
//!
//! Four sentinels sit next to the program's declared fields:
//! - `*`       dereference (address → value)
//! - `?`       any field, followed by ownership-restricted reachability
//! - `$`       any field not owned by the holder
//! - `__arr__` array elements

use crate::features::ir::{FieldId, Program};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    Deref,
    AllFields,
    AllFieldsNotOwned,
    ArrayElement,
    Named(FieldId),
}

impl Field {
    pub fn is_wildcard(self) -> bool {
        matches!(self, Field::AllFields | Field::AllFieldsNotOwned)
    }

    /// Fields followed by ownership-restricted reachability
    pub fn is_owned(self, program: &Program) -> bool {
        match self {
            Field::Deref | Field::AllFields | Field::ArrayElement => true,
            Field::AllFieldsNotOwned => false,
            Field::Named(f) => program.field(f).is_owned,
        }
    }

    pub fn name(self, program: &Program) -> String {
        match self {
            Field::Named(f) => program.field(f).name.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Deref => f.write_str("*"),
            Field::AllFields => f.write_str("?"),
            Field::AllFieldsNotOwned => f.write_str("$"),
            Field::ArrayElement => f.write_str("__arr__"),
            Field::Named(id) => write!(f, "{}", id),
        }
    }
}
