//! Scope resolution - validates declarations and renames identifiers in place

use std::collections::HashMap;

use scopec_ast::*;
use scopec_lexer::Span;
use tracing::{debug, trace};

use crate::error::{ResolveError, ResolveErrorKind};
use crate::labels::LabelTable;
use crate::names::NameGen;
use crate::scope::{DeclKind, DeclRecord, Linkage, ScopeId, ScopeKind, ScopeTree};

type ResolveResult<T> = Result<T, ResolveError>;

/// One distinct declaration seen during resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub source_name: String,
    /// Equal to `source_name` for functions and other names with linkage
    pub unique_name: String,
    pub kind: DeclKind,
    pub linkage: Linkage,
    pub span: Span,
    pub scope: ScopeId,
    pub depth: usize,
}

/// A renamed program plus what the resolver learned about it
#[derive(Debug)]
pub struct ResolvedProgram {
    pub program: Program,
    /// Bindings in declaration order
    pub bindings: Vec<Binding>,
    /// Every scope opened during resolution; name tables are already discarded
    pub scopes: ScopeTree,
}

impl ResolvedProgram {
    pub fn binding(&self, unique_name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.unique_name == unique_name)
    }

    /// Bindings whose declarations were given a generated name
    pub fn renamed(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter().filter(|b| b.unique_name != b.source_name)
    }

    pub fn scope_kind(&self, binding: &Binding) -> ScopeKind {
        self.scopes.scope(binding.scope).kind
    }
}

/// The innermost enclosing switch
#[derive(Debug, Default)]
struct SwitchContext {
    default_span: Option<Span>,
}

/// Scope resolver
pub struct Resolver {
    scopes: ScopeTree,
    names: NameGen,
    bindings: Vec<Binding>,
    /// First declaration of every name with linkage, at any depth
    linked: HashMap<String, DeclRecord>,
    /// Function definitions and initialized file-scope variables
    definitions: HashMap<String, Span>,
    switches: Vec<SwitchContext>,
    /// Labels of the function body being resolved
    labels: Option<LabelTable>,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            scopes: ScopeTree::new(),
            names: NameGen::new(),
            bindings: Vec::new(),
            linked: HashMap::new(),
            definitions: HashMap::new(),
            switches: Vec::new(),
            labels: None,
        }
    }

    /// Resolve a program, returning it with every local renamed
    pub fn resolve(program: Program) -> Result<Program, ResolveError> {
        Self::resolve_program(program).map(|resolved| resolved.program)
    }

    /// Resolve a program, keeping the binding table and scope records
    pub fn resolve_program(mut program: Program) -> Result<ResolvedProgram, ResolveError> {
        let mut resolver = Resolver::new();
        debug!(decls = program.decls.len(), "resolving program");

        let result = program
            .decls
            .iter_mut()
            .try_for_each(|decl| resolver.resolve_file_decl(decl));
        if let Err(err) = &result {
            debug!(%err, "resolution failed");
        }
        result?;

        debug!(
            bindings = resolver.bindings.len(),
            renamed = resolver.names.issued(),
            scopes = resolver.scopes.scope_count(),
            "resolution finished"
        );

        Ok(ResolvedProgram {
            program,
            bindings: resolver.bindings,
            scopes: resolver.scopes,
        })
    }

    // === Scopes ===

    fn enter_scope(&mut self, kind: ScopeKind) -> ScopeId {
        let id = self.scopes.enter(kind);
        trace!(scope = %id, %kind, depth = self.scopes.depth(), "enter scope");
        id
    }

    fn exit_scope(&mut self) {
        if let Some(id) = self.scopes.exit() {
            trace!(scope = %id, "exit scope");
        }
    }

    // === Declarations ===

    /// Register `name` in the current scope and return the name references
    /// to it should use.
    fn declare(&mut self, name: &Ident, kind: DeclKind, linkage: Linkage) -> ResolveResult<String> {
        if let Some(prior) = self.same_scope_record(&name.name) {
            let prior = prior.clone();
            return Self::redeclare(name, kind, linkage, prior);
        }

        if linkage.has_linkage() {
            if let Some(entity) = self.linked.get(&name.name) {
                if entity.kind != kind {
                    return Err(ResolveError::new(
                        ResolveErrorKind::ConflictingLinkage { name: name.name.clone() },
                        name.span,
                    )
                    .with_prior(entity.span));
                }
            }
        }

        let unique_name = if linkage.has_linkage() {
            name.name.clone()
        } else {
            self.names.fresh(&name.name)
        };

        let record = DeclRecord {
            unique_name: unique_name.clone(),
            kind,
            linkage,
            span: name.span,
        };
        trace!(source = %name.name, unique = %unique_name, %kind, %linkage, "declare");

        if linkage.has_linkage() {
            self.linked
                .entry(name.name.clone())
                .or_insert_with(|| record.clone());
        }
        self.bindings.push(Binding {
            source_name: name.name.clone(),
            unique_name: unique_name.clone(),
            kind,
            linkage,
            span: name.span,
            scope: self.scopes.current(),
            depth: self.scopes.depth(),
        });
        self.scopes.declare(name.name.clone(), record);

        Ok(unique_name)
    }

    /// A declaration of `name` that a new one in the current scope would clash
    /// with. The outermost block of a function shares a namespace with the
    /// function's parameters.
    fn same_scope_record(&self, name: &str) -> Option<&DeclRecord> {
        let found = self.scopes.lookup(name)?;
        if found.from_current_scope {
            return Some(found.record);
        }
        let current = self.scopes.scope(self.scopes.current());
        if current.kind == ScopeKind::FunctionBody && current.parent == Some(found.scope) {
            return Some(found.record);
        }
        None
    }

    fn redeclare(name: &Ident, kind: DeclKind, linkage: Linkage, prior: DeclRecord) -> ResolveResult<String> {
        if !prior.linkage.has_linkage() && !linkage.has_linkage() {
            return Err(ResolveError::new(
                ResolveErrorKind::DuplicateDeclaration { name: name.name.clone() },
                name.span,
            )
            .with_prior(prior.span));
        }

        if prior.kind != kind || prior.linkage != linkage {
            return Err(ResolveError::new(
                ResolveErrorKind::ConflictingLinkage { name: name.name.clone() },
                name.span,
            )
            .with_prior(prior.span));
        }

        trace!(source = %name.name, "compatible redeclaration");
        Ok(prior.unique_name)
    }

    /// `extern` declarations and functions refer to whatever entity with
    /// linkage is already visible
    fn inherited_linkage(&self, name: &str) -> Linkage {
        match self.scopes.lookup(name) {
            Some(found) if found.record.linkage.has_linkage() => found.record.linkage,
            _ => Linkage::External,
        }
    }

    fn record_definition(&mut self, name: &Ident) -> ResolveResult<()> {
        if let Some(prior) = self.definitions.get(&name.name) {
            return Err(ResolveError::new(
                ResolveErrorKind::DuplicateDeclaration { name: name.name.clone() },
                name.span,
            )
            .with_prior(*prior));
        }
        self.definitions.insert(name.name.clone(), name.span);
        Ok(())
    }

    fn resolve_file_decl(&mut self, decl: &mut Declaration) -> ResolveResult<()> {
        match decl {
            Declaration::Variable(v) => self.resolve_file_var(v),
            Declaration::Function(f) => self.resolve_function(f),
        }
    }

    fn resolve_file_var(&mut self, v: &mut VarDecl) -> ResolveResult<()> {
        let linkage = match v.storage {
            Some(StorageClass::Static) => Linkage::Internal,
            Some(StorageClass::Extern) => self.inherited_linkage(&v.name.name),
            None => Linkage::External,
        };
        self.declare(&v.name, DeclKind::Variable, linkage)?;

        if let Some(init) = &mut v.init {
            self.record_definition(&v.name)?;
            self.resolve_expr(init)?;
        }
        Ok(())
    }

    fn resolve_local_var(&mut self, v: &mut VarDecl) -> ResolveResult<()> {
        if v.storage == Some(StorageClass::Extern) {
            if let Some(init) = &v.init {
                return Err(ResolveError::new(
                    ResolveErrorKind::ExternInitializer { name: v.name.name.clone() },
                    init.span,
                ));
            }
            let linkage = self.inherited_linkage(&v.name.name);
            self.declare(&v.name, DeclKind::Variable, linkage)?;
        } else {
            v.name.name = self.declare(&v.name, DeclKind::Variable, Linkage::None)?;
        }

        // The new name is already in scope inside its own initializer
        if let Some(init) = &mut v.init {
            self.resolve_expr(init)?;
        }
        Ok(())
    }

    fn resolve_function(&mut self, f: &mut FunctionDecl) -> ResolveResult<()> {
        let at_file_scope = self.scopes.current_kind() == ScopeKind::File;
        if f.body.is_some() && !at_file_scope {
            return Err(ResolveError::new(
                ResolveErrorKind::NestedFunctionDefinition { name: f.name.name.clone() },
                f.name.span,
            ));
        }

        let linkage = match f.storage {
            Some(StorageClass::Static) if at_file_scope => Linkage::Internal,
            Some(StorageClass::Static) => {
                return Err(ResolveError::new(
                    ResolveErrorKind::StaticBlockFunction { name: f.name.name.clone() },
                    f.name.span,
                ));
            }
            _ => self.inherited_linkage(&f.name.name),
        };
        self.declare(&f.name, DeclKind::Function, linkage)?;
        if f.body.is_some() {
            self.record_definition(&f.name)?;
            debug!(function = %f.name.name, "resolving function body");
        }

        self.enter_scope(ScopeKind::Parameters);
        for param in &mut f.params {
            param.name = self.declare(param, DeclKind::Variable, Linkage::None)?;
        }

        if let Some(body) = &mut f.body {
            self.labels = Some(LabelTable::new());
            self.resolve_block(body, ScopeKind::FunctionBody)?;
            if let Some(labels) = self.labels.take() {
                labels.finish()?;
            }
        }

        self.exit_scope();
        Ok(())
    }

    // === Statements ===

    fn resolve_block(&mut self, block: &mut Block, kind: ScopeKind) -> ResolveResult<()> {
        self.enter_scope(kind);
        self.resolve_items(&mut block.items)?;
        self.exit_scope();
        Ok(())
    }

    fn resolve_items(&mut self, items: &mut [BlockItem]) -> ResolveResult<()> {
        for item in items {
            match item {
                BlockItem::Decl(Declaration::Variable(v)) => self.resolve_local_var(v)?,
                BlockItem::Decl(Declaration::Function(f)) => self.resolve_function(f)?,
                BlockItem::Stmt(stmt) => self.resolve_stmt(stmt)?,
            }
        }
        Ok(())
    }

    fn resolve_stmt(&mut self, stmt: &mut Stmt) -> ResolveResult<()> {
        let span = stmt.span;

        match &mut stmt.kind {
            StmtKind::Return(expr) | StmtKind::Expr(expr) => self.resolve_expr(expr)?,
            StmtKind::If(cond, then, otherwise) => {
                self.resolve_expr(cond)?;
                self.resolve_stmt(then)?;
                if let Some(otherwise) = otherwise {
                    self.resolve_stmt(otherwise)?;
                }
            }
            StmtKind::Compound(block) => self.resolve_block(block, ScopeKind::Block)?,
            StmtKind::While(cond, body) => {
                self.resolve_expr(cond)?;
                self.resolve_stmt(body)?;
            }
            StmtKind::DoWhile(body, cond) => {
                self.resolve_stmt(body)?;
                self.resolve_expr(cond)?;
            }
            StmtKind::For(init, cond, post, body) => {
                self.enter_scope(ScopeKind::ForHeader);
                match init {
                    ForInit::Decl(v) => self.resolve_local_var(v)?,
                    ForInit::Expr(expr) => self.resolve_opt_expr(expr)?,
                }
                self.resolve_opt_expr(cond)?;
                self.resolve_opt_expr(post)?;
                self.resolve_stmt(body)?;
                self.exit_scope();
            }
            StmtKind::Switch(scrutinee, body) => {
                self.resolve_expr(scrutinee)?;
                self.enter_scope(ScopeKind::Switch);
                self.switches.push(SwitchContext::default());

                // The switch scope is the body's scope; its braces add nothing
                match &mut body.kind {
                    StmtKind::Compound(block) => self.resolve_items(&mut block.items)?,
                    _ => self.resolve_stmt(body)?,
                }

                self.switches.pop();
                self.exit_scope();
            }
            StmtKind::Case(value, body) => {
                self.resolve_expr(value)?;
                self.resolve_stmt(body)?;
            }
            StmtKind::Default(body) => {
                let label = Span::new(span.start, span.start + "default".len());
                if let Some(switch) = self.switches.last_mut() {
                    if let Some(prior) = switch.default_span {
                        return Err(ResolveError::new(ResolveErrorKind::DuplicateDefaultLabel, label)
                            .with_prior(prior));
                    }
                    switch.default_span = Some(label);
                }
                self.resolve_stmt(body)?;
            }
            StmtKind::Labeled(label, body) => {
                if let Some(labels) = &mut self.labels {
                    labels.define(label)?;
                }
                self.resolve_stmt(body)?;
            }
            StmtKind::Goto(label) => {
                if let Some(labels) = &mut self.labels {
                    labels.goto(label);
                }
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Null => {}
        }

        Ok(())
    }

    // === Expressions ===

    fn resolve_opt_expr(&mut self, expr: &mut Option<Expr>) -> ResolveResult<()> {
        match expr {
            Some(expr) => self.resolve_expr(expr),
            None => Ok(()),
        }
    }

    fn resolve_expr(&mut self, expr: &mut Expr) -> ResolveResult<()> {
        match &mut expr.kind {
            ExprKind::Constant(_) => {}
            ExprKind::Var(ident) => ident.name = self.resolve_name(ident)?,
            ExprKind::Unary(_, operand) => self.resolve_expr(operand)?,
            ExprKind::Binary(lhs, _, rhs) => {
                self.resolve_expr(lhs)?;
                self.resolve_expr(rhs)?;
            }
            ExprKind::Assign(lhs, rhs) | ExprKind::CompoundAssign(_, lhs, rhs) => {
                check_lvalue(lhs)?;
                self.resolve_expr(lhs)?;
                self.resolve_expr(rhs)?;
            }
            ExprKind::Prefix(_, operand) | ExprKind::Postfix(_, operand) => {
                check_lvalue(operand)?;
                self.resolve_expr(operand)?;
            }
            ExprKind::Conditional(cond, then, otherwise) => {
                self.resolve_expr(cond)?;
                self.resolve_expr(then)?;
                self.resolve_expr(otherwise)?;
            }
            ExprKind::Call(callee, args) => {
                callee.name = self.resolve_name(callee)?;
                for arg in args {
                    self.resolve_expr(arg)?;
                }
            }
        }
        Ok(())
    }

    fn resolve_name(&self, ident: &Ident) -> ResolveResult<String> {
        match self.scopes.lookup(&ident.name) {
            Some(found) => Ok(found.record.unique_name.clone()),
            None => Err(ResolveError::new(
                ResolveErrorKind::UnresolvedIdentifier { name: ident.name.clone() },
                ident.span,
            )),
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

fn check_lvalue(target: &Expr) -> ResolveResult<()> {
    match target.kind {
        ExprKind::Var(_) => Ok(()),
        _ => Err(ResolveError::new(ResolveErrorKind::InvalidLvalue, target.span)),
    }
}
