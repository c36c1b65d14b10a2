//! Field selections and the pure functions that resolve, validate and expand them.
//!
//! None of these functions log. Every dropped entry is returned as a
//! [`Rejection`] so the caller decides how to report it.

use crate::catalog::field::{FieldDefinition, StorageType};
use crate::catalog::field_catalog::FieldCatalog;
use crate::selection::rejection::{Rejection, RejectionReason};
use crate::selection::tier::ComplexityTier;
use crate::types::module::Module;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// What to collect from one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSelection {
    /// Every field the catalog defines for the module.
    All,
    /// An ordered list of service field names.
    Fields(Vec<String>),
}

/// A module value as it may appear in configuration, before normalization.
///
/// Besides the canonical `"all"` and field lists this accepts booleans and
/// comma separated strings, which older installations wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawModuleSelection {
    Flag(bool),
    Keyword(String),
    Fields(Vec<String>),
}

pub type RawSelection = BTreeMap<String, RawModuleSelection>;

/// Canonical selection: module name to `All` or a field list. Never holds booleans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelection {
    modules: BTreeMap<Module, ModuleSelection>,
}

impl FieldSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, replacing any previous selection for `module`.
    pub fn with(mut self, module: Module, selection: ModuleSelection) -> Self {
        self.modules.insert(module, selection);
        self
    }

    pub fn with_fields(self, module: Module, fields: &[&str]) -> Self {
        self.with(
            module,
            ModuleSelection::Fields(fields.iter().map(|f| f.to_string()).collect()),
        )
    }

    pub fn get(&self, module: Module) -> Option<&ModuleSelection> {
        self.modules.get(&module)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Module, &ModuleSelection)> {
        self.modules.iter().map(|(module, selection)| (*module, selection))
    }

    pub fn modules(&self) -> impl Iterator<Item = Module> + '_ {
        self.modules.keys().copied()
    }

    /// `true` when nothing at all would be collected.
    pub fn is_empty(&self) -> bool {
        self.modules.values().all(|selection| match selection {
            ModuleSelection::All => false,
            ModuleSelection::Fields(fields) => fields.is_empty(),
        })
    }

    /// Combines `selection` into the entry for `module`. `All` absorbs field lists.
    fn merge(&mut self, module: Module, selection: ModuleSelection) {
        match (self.modules.get_mut(&module), selection) {
            (None, selection) => {
                self.modules.insert(module, selection);
            }
            (Some(ModuleSelection::All), _) => {}
            (Some(existing), ModuleSelection::All) => *existing = ModuleSelection::All,
            (Some(ModuleSelection::Fields(existing)), ModuleSelection::Fields(mut extra)) => {
                existing.append(&mut extra);
            }
        }
    }

    /// Converts back to the configuration representation.
    pub fn to_raw(&self) -> RawSelection {
        self.modules
            .iter()
            .map(|(module, selection)| {
                let raw = match selection {
                    ModuleSelection::All => RawModuleSelection::Keyword("all".to_string()),
                    ModuleSelection::Fields(fields) => RawModuleSelection::Fields(fields.clone()),
                };
                (module.name().to_string(), raw)
            })
            .collect()
    }
}

/// A request for a selection, either a preset tier or caller-supplied fields.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionRequest {
    Tier(ComplexityTier),
    Custom(FieldSelection),
    Raw(RawSelection),
}

/// The outcome of [`resolve`]: what survived and what was dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub selection: FieldSelection,
    pub rejections: Vec<Rejection>,
}

/// Turns a tier or a custom selection into a validated [`FieldSelection`].
pub fn resolve(request: &SelectionRequest, catalog: &FieldCatalog) -> Resolution {
    let (selection, rejections) = match request {
        SelectionRequest::Tier(tier) => (catalog.tier(*tier).clone(), Vec::new()),
        SelectionRequest::Custom(selection) => validate(selection, catalog),
        SelectionRequest::Raw(raw) => normalize(raw, catalog),
    };
    Resolution {
        selection,
        rejections,
    }
}

/// Drops field names the catalog does not define for their module, and duplicates.
///
/// Order of the remaining names is preserved. Modules left without fields are removed.
pub fn validate(
    selection: &FieldSelection,
    catalog: &FieldCatalog,
) -> (FieldSelection, Vec<Rejection>) {
    let mut valid = FieldSelection::new();
    let mut rejections = Vec::new();

    for (module, module_selection) in selection.iter() {
        match module_selection {
            ModuleSelection::All => {
                valid.modules.insert(module, ModuleSelection::All);
            }
            ModuleSelection::Fields(names) => {
                let mut seen = HashSet::new();
                let mut kept = Vec::new();
                for name in names {
                    if !seen.insert(name.as_str()) {
                        rejections.push(Rejection::new(
                            Some(module),
                            name,
                            RejectionReason::Duplicate,
                        ));
                    } else if catalog.field(module, name).is_none() {
                        rejections.push(Rejection::new(
                            Some(module),
                            name,
                            RejectionReason::UnknownField,
                        ));
                    } else {
                        kept.push(name.clone());
                    }
                }
                if !kept.is_empty() {
                    valid.modules.insert(module, ModuleSelection::Fields(kept));
                }
            }
        }
    }

    (valid, rejections)
}

/// Normalizes a configuration selection into canonical form and validates it.
///
/// Keys naming a module take `"all"`, a list, a comma separated string or a
/// boolean (`false` switches the module off). Any other key is read as a
/// legacy flat entry `field_name = true|false`, and its module is inferred
/// from the catalog.
pub fn normalize(raw: &RawSelection, catalog: &FieldCatalog) -> (FieldSelection, Vec<Rejection>) {
    let mut selection = FieldSelection::new();
    let mut rejections = Vec::new();

    for (key, value) in raw {
        if let Ok(module) = key.parse::<Module>() {
            match module_value(module, value) {
                Ok(Some(module_selection)) => selection.merge(module, module_selection),
                Ok(None) => {}
                Err(rejection) => rejections.push(rejection),
            }
            continue;
        }

        match value {
            RawModuleSelection::Flag(false) => {}
            RawModuleSelection::Flag(true) => {
                let modules = catalog.modules_defining(key);
                match modules.len() {
                    0 => rejections.push(Rejection::new(None, key, RejectionReason::UnknownField)),
                    1 => selection.merge(modules[0], ModuleSelection::Fields(vec![key.clone()])),
                    _ => rejections.push(Rejection::new(
                        None,
                        key,
                        RejectionReason::AmbiguousField(modules),
                    )),
                }
            }
            _ => rejections.push(Rejection::new(None, key, RejectionReason::UnknownModule)),
        }
    }

    let (valid, mut dropped) = validate(&selection, catalog);
    rejections.append(&mut dropped);
    (valid, rejections)
}

/// Interprets one module value without consulting the catalog.
pub(crate) fn module_value(
    module: Module,
    value: &RawModuleSelection,
) -> Result<Option<ModuleSelection>, Rejection> {
    match value {
        RawModuleSelection::Flag(true) => Ok(Some(ModuleSelection::All)),
        RawModuleSelection::Flag(false) => Ok(None),
        RawModuleSelection::Keyword(keyword) if keyword.trim().eq_ignore_ascii_case("all") => {
            Ok(Some(ModuleSelection::All))
        }
        RawModuleSelection::Keyword(keyword) => {
            let fields: Vec<String> = keyword
                .split(',')
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .map(str::to_string)
                .collect();
            if fields.is_empty() {
                Err(Rejection::new(
                    Some(module),
                    module.name(),
                    RejectionReason::InvalidModuleValue(keyword.clone()),
                ))
            } else {
                Ok(Some(ModuleSelection::Fields(fields)))
            }
        }
        RawModuleSelection::Fields(fields) => Ok(Some(ModuleSelection::Fields(fields.clone()))),
    }
}

/// The catalog definitions a selection refers to, in module then selection order.
///
/// Names the catalog does not know are skipped; run [`validate`] first to report them.
pub fn selected_fields<'c>(
    selection: &FieldSelection,
    catalog: &'c FieldCatalog,
) -> Vec<&'c FieldDefinition> {
    let mut fields = Vec::new();
    for (module, module_selection) in selection.iter() {
        match module_selection {
            ModuleSelection::All => fields.extend(catalog.fields_for(module)),
            ModuleSelection::Fields(names) => {
                fields.extend(names.iter().filter_map(|name| catalog.field(module, name)))
            }
        }
    }
    fields
}

/// Maps every selected field to its storage column and type.
pub fn expand(selection: &FieldSelection, catalog: &FieldCatalog) -> BTreeMap<String, StorageType> {
    selected_fields(selection, catalog)
        .into_iter()
        .map(|field| (field.storage_column.clone(), field.storage_type))
        .collect()
}

/// Number of storage columns a selection maps to.
pub fn estimate_count(selection: &FieldSelection, catalog: &FieldCatalog) -> usize {
    expand(selection, catalog).len()
}
