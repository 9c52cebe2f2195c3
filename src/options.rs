//! Per-instance options, inherited by every nested object an instance creates.
use serde::{Deserialize, Serialize};

use crate::decl::ClassId;
use crate::error::MapperError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapperOptions {
    /// `call("getFooBar", ..)`-style access
    pub allow_dynamic_access: bool,
    /// run the analyzer at construction and refuse data with problems
    pub require_analysis: bool,
    /// let `set_field` create keys the property map does not declare
    pub allow_undefined_writes: bool,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            allow_dynamic_access: true,
            require_analysis: false,
            allow_undefined_writes: false,
        }
    }
}

/// Operations that an option can switch off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatedOperation {
    DynamicCall(String),
    UndefinedWrite(String),
}

impl MapperOptions {
    pub fn strict() -> Self {
        Self { require_analysis: true, ..Self::default() }
    }

    pub fn allows(&self, op: &GatedOperation) -> bool {
        match op {
            GatedOperation::DynamicCall(_) => self.allow_dynamic_access,
            GatedOperation::UndefinedWrite(_) => self.allow_undefined_writes,
        }
    }

    /// Gate hook: `Ok(())` when `op` is permitted, else a `UserOption` error.
    pub fn ensure(&self, class: &ClassId, op: GatedOperation) -> Result<(), MapperError> {
        if self.allows(&op) {
            return Ok(());
        }
        let (option, operation) = match op {
            GatedOperation::DynamicCall(method) => ("allow_dynamic_access", format!("dynamic call `{method}`")),
            GatedOperation::UndefinedWrite(field) => ("allow_undefined_writes", format!("write to undeclared field `{field}`")),
        };
        Err(MapperError::UserOption { class: class.clone(), option, operation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_allow_dynamic_access_only() {
        let opts = MapperOptions::default();
        assert!(opts.allow_dynamic_access);
        assert!(!opts.require_analysis);
        assert!(!opts.allow_undefined_writes);
        assert!(MapperOptions::strict().require_analysis);
    }

    #[test]
    fn ensure_reports_the_disabled_option() {
        let class = ClassId::new("app::User").unwrap();
        let opts = MapperOptions { allow_dynamic_access: false, ..MapperOptions::default() };
        let err = opts.ensure(&class, GatedOperation::DynamicCall("getName".into())).unwrap_err();
        match err {
            MapperError::UserOption { option, operation, .. } => {
                assert_eq!(option, "allow_dynamic_access");
                assert!(operation.contains("getName"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(opts.ensure(&class, GatedOperation::UndefinedWrite("x".into())).is_err());
    }
}
