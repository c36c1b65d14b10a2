use crate::types::module::Module;
use log::warn;
use std::fmt;

/// Why a selection entry was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    UnknownModule,
    UnknownField,
    /// A legacy flat entry whose field name exists in more than one module.
    AmbiguousField(Vec<Module>),
    /// A module value that is neither `"all"`, a list, nor a boolean.
    InvalidModuleValue(String),
    Duplicate,
    /// The storage column does not exist in the archive schema.
    MissingColumn(String),
    ModuleDisabled,
}

/// One dropped selection entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub module: Option<Module>,
    pub field: String,
    pub reason: RejectionReason,
}

impl Rejection {
    pub fn new(module: Option<Module>, field: impl Into<String>, reason: RejectionReason) -> Self {
        Self {
            module,
            field: field.into(),
            reason,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{module}.{}: ", self.field)?,
            None => write!(f, "{}: ", self.field)?,
        }
        match &self.reason {
            RejectionReason::UnknownModule => f.write_str("unknown module"),
            RejectionReason::UnknownField => f.write_str("not defined in the field catalog"),
            RejectionReason::AmbiguousField(modules) => {
                let names: Vec<&str> = modules.iter().map(Module::name).collect();
                write!(f, "field exists in several modules ({})", names.join(", "))
            }
            RejectionReason::InvalidModuleValue(value) => {
                write!(f, "expected \"all\", a field list or a boolean, got '{value}'")
            }
            RejectionReason::Duplicate => f.write_str("listed more than once"),
            RejectionReason::MissingColumn(column) => {
                write!(f, "column '{column}' is missing from the archive schema")
            }
            RejectionReason::ModuleDisabled => f.write_str("module is disabled"),
        }
    }
}

/// Logs every rejection individually.
pub fn log_rejections(context: &str, rejections: &[Rejection]) {
    for rejection in rejections {
        warn!("{context}: dropping {rejection}");
    }
}
