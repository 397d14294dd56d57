use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::Error;
use crate::format::Format;
use crate::scope::{LegalScopeId, ScopeInstanceId, ScopeManager, ScopeTree};

/// `(scope_instance, name, format)`. Equality is structural on all three;
/// ordering (for use as a key in ordered containers) is lexicographic on
/// scope-instance identity then name only, per the data model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableId {
    pub scope_instance: ScopeInstanceId,
    pub name: String,
    pub format: Format,
}

impl VariableId {
    pub fn new(scope_instance: ScopeInstanceId, name: impl Into<String>, format: Format) -> Self {
        VariableId { scope_instance, name: name.into(), format }
    }
}

impl PartialOrd for VariableId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VariableId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.scope_instance.0, &self.name).cmp(&(other.scope_instance.0, &other.name))
    }
}

/// C3. Asserts, validates, and issues `(LegalScope, name) -> Format` mappings.
pub struct VariableLibrary {
    entries: HashMap<(LegalScopeId, String), Format>,
    /// name -> every legal scope where it has been asserted, to enforce the
    /// no-shadowing-across-ancestor/descendant invariant in O(declared names).
    declared_at: HashMap<String, Vec<LegalScopeId>>,
}

impl VariableLibrary {
    pub fn new() -> Self {
        VariableLibrary { entries: HashMap::new(), declared_at: HashMap::new() }
    }

    pub fn assert(&mut self, tree: &ScopeTree, name: &str, ls: LegalScopeId, format: Format) -> Result<(), Error> {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed != name {
            return Err(Error::BadName { name: name.to_string() });
        }
        if let Some(existing) = self.entries.get(&(ls, name.to_string())) {
            return if *existing == format {
                Ok(())
            } else {
                Err(Error::ConflictingFormat {
                    name: name.to_string(),
                    existing: existing.to_string(),
                    attempted: format.to_string(),
                })
            };
        }
        if let Some(others) = self.declared_at.get(name) {
            for &other in others {
                if tree.is_related(other, ls) {
                    return Err(Error::ShadowedName { name: name.to_string() });
                }
            }
        }
        self.entries.insert((ls, name.to_string()), format);
        self.declared_at.entry(name.to_string()).or_default().push(ls);
        Ok(())
    }

    pub fn is_legal(&self, ls: LegalScopeId, name: &str) -> bool {
        self.entries.contains_key(&(ls, name.to_string()))
    }

    pub fn format_of(&self, ls: LegalScopeId, name: &str) -> Option<Format> {
        self.entries.get(&(ls, name.to_string())).cloned()
    }

    pub fn identifier_for(
        &self,
        scopes: &ScopeManager,
        si: ScopeInstanceId,
        name: &str,
    ) -> Result<VariableId, Error> {
        let ls = scopes.legal_scope_of(si)?;
        match self.format_of(ls, name) {
            Some(format) => Ok(VariableId::new(si, name, format)),
            None => Err(Error::UnknownVariable { name: name.to_string() }),
        }
    }

    /// Formats that were asserted for some name but which the format
    /// registry cannot produce a default value for, reported for
    /// diagnostics rather than failing assertion outright.
    pub fn formats_without_default(&self, registry: &crate::format::FormatRegistry) -> Vec<Format> {
        let mut missing = Vec::new();
        for format in self.entries.values() {
            if registry.default_for(format).is_none() && !missing.contains(format) {
                missing.push(format.clone());
            }
        }
        missing
    }
}

impl Default for VariableLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasserting_the_same_name_and_format_is_a_no_op() {
        let tree = ScopeTree::new();
        let global = tree.global();
        let mut vars = VariableLibrary::new();
        vars.assert(&tree, "hp", global, Format::Integer).unwrap();
        vars.assert(&tree, "hp", global, Format::Integer).unwrap();
        assert_eq!(vars.format_of(global, "hp"), Some(Format::Integer));
    }

    #[test]
    fn reasserting_with_a_different_format_is_rejected() {
        let tree = ScopeTree::new();
        let global = tree.global();
        let mut vars = VariableLibrary::new();
        vars.assert(&tree, "hp", global, Format::Integer).unwrap();
        let err = vars.assert(&tree, "hp", global, Format::Real).unwrap_err();
        assert!(matches!(err, Error::ConflictingFormat { .. }));
    }

    #[test]
    fn shadowing_across_ancestor_or_descendant_scopes_is_rejected() {
        let mut tree = ScopeTree::new();
        let global = tree.global();
        let equipment = tree.declare("Equipment", global);
        let mut vars = VariableLibrary::new();
        vars.assert(&tree, "name", global, Format::String).unwrap();
        let err = vars.assert(&tree, "name", equipment, Format::String).unwrap_err();
        assert!(matches!(err, Error::ShadowedName { .. }));
    }

    #[test]
    fn unrelated_scopes_may_declare_the_same_name() {
        let mut tree = ScopeTree::new();
        let global = tree.global();
        let equipment = tree.declare("Equipment", global);
        let party = tree.declare("Party", global);
        let mut vars = VariableLibrary::new();
        vars.assert(&tree, "name", equipment, Format::String).unwrap();
        vars.assert(&tree, "name", party, Format::String).unwrap();
    }

    #[test]
    fn blank_or_padded_names_are_rejected() {
        let tree = ScopeTree::new();
        let global = tree.global();
        let mut vars = VariableLibrary::new();
        assert!(matches!(vars.assert(&tree, "  ", global, Format::Integer), Err(Error::BadName { .. })));
        assert!(matches!(vars.assert(&tree, " hp", global, Format::Integer), Err(Error::BadName { .. })));
    }
}
