use crate::error::Error;

/// Id of a static node in the legal-scope tree (a `LegalScope` declaration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LegalScopeId(pub(crate) u32);

/// Id of a runtime occurrence of a legal scope (a `ScopeInstance`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeInstanceId(pub(crate) u32);

struct LegalScopeNode {
    name: String,
    parent: Option<LegalScopeId>,
}

/// C2 (static half). A named node in a tree rooted at a single global
/// scope. Declares "variables with these names may exist here" without
/// itself holding any variables.
pub struct ScopeTree {
    nodes: Vec<LegalScopeNode>,
}

impl ScopeTree {
    pub fn new() -> Self {
        ScopeTree { nodes: vec![LegalScopeNode { name: "global".to_string(), parent: None }] }
    }

    pub fn global(&self) -> LegalScopeId {
        LegalScopeId(0)
    }

    pub fn declare(&mut self, name: &str, parent: LegalScopeId) -> LegalScopeId {
        self.nodes.push(LegalScopeNode { name: name.to_string(), parent: Some(parent) });
        LegalScopeId((self.nodes.len() - 1) as u32)
    }

    pub fn name_of(&self, ls: LegalScopeId) -> &str {
        &self.nodes[ls.0 as usize].name
    }

    pub fn parent_of(&self, ls: LegalScopeId) -> Option<LegalScopeId> {
        self.nodes[ls.0 as usize].parent
    }

    /// True iff `a` is an ancestor of `b` (strictly), walking up from `b`.
    pub fn is_ancestor(&self, a: LegalScopeId, b: LegalScopeId) -> bool {
        let mut cur = self.parent_of(b);
        while let Some(p) = cur {
            if p == a {
                return true;
            }
            cur = self.parent_of(p);
        }
        false
    }

    /// True iff `a` and `b` are on the same root-to-leaf path, i.e. one is
    /// an ancestor of the other (or they are equal).
    pub fn is_related(&self, a: LegalScopeId, b: LegalScopeId) -> bool {
        a == b || self.is_ancestor(a, b) || self.is_ancestor(b, a)
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

struct ScopeInstanceNode {
    legal_scope: LegalScopeId,
    parent: Option<ScopeInstanceId>,
    owner: Option<u64>,
}

/// C2 (runtime half). Creates scope instances and enforces the invariant
/// `SI.legal_scope.parent == SI.parent.legal_scope` (or both none). Owns
/// exactly one instance of the global scope.
pub struct ScopeManager {
    instances: Vec<ScopeInstanceNode>,
    global: ScopeInstanceId,
}

impl ScopeManager {
    pub fn new(tree: &ScopeTree) -> Self {
        let root = ScopeInstanceNode { legal_scope: tree.global(), parent: None, owner: None };
        ScopeManager { instances: vec![root], global: ScopeInstanceId(0) }
    }

    pub fn global_instance(&self) -> ScopeInstanceId {
        self.global
    }

    pub fn open_instance(
        &mut self,
        tree: &ScopeTree,
        legal_scope: LegalScopeId,
        parent: ScopeInstanceId,
        owner: Option<u64>,
    ) -> Result<ScopeInstanceId, Error> {
        let parent_ls = self.legal_scope_of(parent)?;
        let expected_parent_ls = tree.parent_of(legal_scope);
        if expected_parent_ls != Some(parent_ls) {
            return Err(Error::InvariantViolation {
                message: format!(
                    "scope instance parent-consistency violated: legal scope {:?} expects parent legal scope {:?}, got {:?}",
                    legal_scope, expected_parent_ls, parent_ls
                ),
            });
        }
        self.instances.push(ScopeInstanceNode { legal_scope, parent: Some(parent), owner });
        Ok(ScopeInstanceId((self.instances.len() - 1) as u32))
    }

    pub fn legal_scope_of(&self, si: ScopeInstanceId) -> Result<LegalScopeId, Error> {
        self.instances
            .get(si.0 as usize)
            .map(|n| n.legal_scope)
            .ok_or(Error::InvariantViolation { message: format!("no such scope instance {si:?}") })
    }

    pub fn parent_of(&self, si: ScopeInstanceId) -> Option<ScopeInstanceId> {
        self.instances.get(si.0 as usize).and_then(|n| n.parent)
    }

    pub fn owner_of(&self, si: ScopeInstanceId) -> Option<u64> {
        self.instances.get(si.0 as usize).and_then(|n| n.owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_related_holds_for_ancestors_descendants_and_self() {
        let mut tree = ScopeTree::new();
        let global = tree.global();
        let equipment = tree.declare("Equipment", global);
        let slot = tree.declare("Slot", equipment);
        let sibling = tree.declare("Party", global);

        assert!(tree.is_related(global, slot));
        assert!(tree.is_related(slot, global));
        assert!(tree.is_related(equipment, equipment));
        assert!(!tree.is_related(slot, sibling));
    }

    #[test]
    fn open_instance_rejects_inconsistent_parent() {
        let mut tree = ScopeTree::new();
        let global = tree.global();
        let equipment = tree.declare("Equipment", global);
        let mut scopes = ScopeManager::new(&tree);
        let global_instance = scopes.global_instance();

        let e1 = scopes.open_instance(&tree, equipment, global_instance, Some(1)).unwrap();
        assert_eq!(scopes.legal_scope_of(e1).unwrap(), equipment);
        assert_eq!(scopes.parent_of(e1), Some(global_instance));

        // Equipment's legal-scope parent is global, not e1, so nesting an
        // equipment instance under another equipment instance is rejected.
        let err = scopes.open_instance(&tree, equipment, e1, Some(2)).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation { .. }));
    }
}
