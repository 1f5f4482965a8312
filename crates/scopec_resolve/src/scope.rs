//! Scope stack: an arena of scope records plus the chain of currently open scopes.

use std::collections::HashMap;

use scopec_lexer::Span;

/// Index of a scope in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What opened a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// The translation unit.
    File,
    /// A function's parameter list, one per declaration or definition.
    Parameters,
    /// The outermost block of a function definition.
    FunctionBody,
    /// Any other `{ ... }` block.
    Block,
    /// The header of a `for` loop; encloses the loop body.
    ForHeader,
    /// A `switch` body, braced or not.
    Switch,
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScopeKind::File => "file",
            ScopeKind::Parameters => "parameters",
            ScopeKind::FunctionBody => "function body",
            ScopeKind::Block => "block",
            ScopeKind::ForHeader => "for header",
            ScopeKind::Switch => "switch",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Variable,
    Function,
}

impl std::fmt::Display for DeclKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeclKind::Variable => write!(f, "variable"),
            DeclKind::Function => write!(f, "function"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    None,
    Internal,
    External,
}

impl Linkage {
    pub fn has_linkage(self) -> bool {
        !matches!(self, Linkage::None)
    }
}

impl std::fmt::Display for Linkage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Linkage::None => write!(f, "none"),
            Linkage::Internal => write!(f, "internal"),
            Linkage::External => write!(f, "external"),
        }
    }
}

/// What a scope remembers about one declared name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclRecord {
    pub unique_name: String,
    pub kind: DeclKind,
    pub linkage: Linkage,
    pub span: Span,
}

/// Result of walking the open scopes for a name.
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a> {
    pub record: &'a DeclRecord,
    pub scope: ScopeId,
    pub from_current_scope: bool,
}

#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    names: HashMap<String, DeclRecord>,
}

impl Scope {
    pub fn get(&self, name: &str) -> Option<&DeclRecord> {
        self.names.get(name)
    }
}

/// Scopes are never removed from the arena, so every `ScopeId` handed out
/// stays valid. Closing a scope only drops its name table.
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    open: Vec<ScopeId>,
}

impl ScopeTree {
    /// A tree holding only the open file scope.
    pub fn new() -> Self {
        let root = Scope {
            id: ScopeId(0),
            parent: None,
            kind: ScopeKind::File,
            names: HashMap::new(),
        };
        Self {
            scopes: vec![root],
            open: vec![ScopeId(0)],
        }
    }

    pub fn enter(&mut self, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            id,
            parent: Some(self.current()),
            kind,
            names: HashMap::new(),
        });
        self.open.push(id);
        id
    }

    /// Close the innermost scope. The file scope is never closed.
    pub fn exit(&mut self) -> Option<ScopeId> {
        if self.open.len() <= 1 {
            return None;
        }
        let id = self.open.pop()?;
        self.scopes[id.0 as usize].names = HashMap::new();
        Some(id)
    }

    pub fn current(&self) -> ScopeId {
        self.open.last().copied().unwrap_or(ScopeId(0))
    }

    pub fn current_kind(&self) -> ScopeKind {
        self.scope(self.current()).kind
    }

    /// Number of open scopes enclosing the current one (0 at file scope).
    pub fn depth(&self) -> usize {
        self.open.len() - 1
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn declare(&mut self, name: impl Into<String>, record: DeclRecord) {
        let current = self.current();
        self.scopes[current.0 as usize].names.insert(name.into(), record);
    }

    /// Nearest visible declaration of `name`, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<Lookup<'_>> {
        let current = self.current();
        let mut next = Some(current);
        while let Some(id) = next {
            let scope = self.scope(id);
            if let Some(record) = scope.get(name) {
                return Some(Lookup {
                    record,
                    scope: id,
                    from_current_scope: id == current,
                });
            }
            next = scope.parent;
        }
        None
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(unique: &str) -> DeclRecord {
        DeclRecord {
            unique_name: unique.to_string(),
            kind: DeclKind::Variable,
            linkage: Linkage::None,
            span: Span::default(),
        }
    }

    #[test]
    fn test_lookup_walks_outward() {
        let mut tree = ScopeTree::new();
        tree.declare("a", var("a"));
        let block = tree.enter(ScopeKind::Block);
        tree.declare("b", var("b.0"));

        let found = tree.lookup("a").unwrap();
        assert_eq!(found.scope, ScopeId(0));
        assert!(!found.from_current_scope);

        let found = tree.lookup("b").unwrap();
        assert_eq!(found.scope, block);
        assert!(found.from_current_scope);

        assert!(tree.lookup("c").is_none());
    }

    #[test]
    fn test_inner_declaration_shadows() {
        let mut tree = ScopeTree::new();
        tree.enter(ScopeKind::FunctionBody);
        tree.declare("a", var("a.0"));
        tree.enter(ScopeKind::Block);
        tree.declare("a", var("a.1"));

        assert_eq!(tree.lookup("a").unwrap().record.unique_name, "a.1");
        tree.exit();
        assert_eq!(tree.lookup("a").unwrap().record.unique_name, "a.0");
    }

    #[test]
    fn test_exit_discards_names_but_keeps_record() {
        let mut tree = ScopeTree::new();
        let block = tree.enter(ScopeKind::Switch);
        tree.declare("x", var("x.0"));
        assert_eq!(tree.depth(), 1);

        assert_eq!(tree.exit(), Some(block));
        assert_eq!(tree.depth(), 0);
        assert!(tree.lookup("x").is_none());
        assert_eq!(tree.scope(block).kind, ScopeKind::Switch);
        assert_eq!(tree.scope(block).parent, Some(ScopeId(0)));
        assert!(tree.scope(block).get("x").is_none());
    }

    #[test]
    fn test_file_scope_never_closes() {
        let mut tree = ScopeTree::new();
        assert_eq!(tree.exit(), None);
        assert_eq!(tree.current_kind(), ScopeKind::File);
    }

    #[test]
    fn test_scope_ids_are_not_reused() {
        let mut tree = ScopeTree::new();
        let first = tree.enter(ScopeKind::Block);
        tree.exit();
        let second = tree.enter(ScopeKind::Block);
        assert_ne!(first, second);
        assert_eq!(tree.scope_count(), 3);
    }
}
