//! Entry-point classification.
//!
//! What counts as an entry point is policy, not graph structure: a
//! main-like signature, a framework role, a user designation kept across
//! runs. The graph consumes the policy through one small trait so callers
//! can swap in project-specific conventions without touching the engine.

use std::collections::HashSet;

use crate::model::{Declaration, ProgramModel};

/// Injectable oracle deciding which declarations are entry points.
pub trait EntryPointPolicy {
    /// Conventional entry point by its own shape (e.g. a main method).
    fn is_entry(&self, model: &ProgramModel, decl: &Declaration) -> bool;

    /// Entry point by configured qualified name.
    fn is_entry_name(&self, _external_name: &str) -> bool {
        false
    }
}

/// Default policy: main-like methods, framework roles recorded on the
/// declaration, plus any extra qualified names from configuration.
#[derive(Debug, Default, Clone)]
pub struct ConventionalEntryPoints {
    extra_names: HashSet<String>,
}

impl ConventionalEntryPoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add configured entry-point names (`pkg.Class.method(T1,T2)` form).
    pub fn with_names(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_names.extend(names.into_iter().map(Into::into));
        self
    }
}

impl EntryPointPolicy for ConventionalEntryPoints {
    fn is_entry(&self, model: &ProgramModel, decl: &Declaration) -> bool {
        if decl.as_method().is_some_and(|m| m.main_like) {
            return true;
        }
        // The class hosting a main method is launched with it.
        if decl.is_class() {
            let hosts_main = model.declarations.iter().any(|d| {
                d.owner == Some(decl.id) && d.as_method().is_some_and(|m| m.main_like)
            });
            if hosts_main {
                return true;
            }
        }
        decl.roles.any()
    }

    fn is_entry_name(&self, external_name: &str) -> bool {
        self.extra_names.contains(external_name)
    }
}
