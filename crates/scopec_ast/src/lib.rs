use scopec_lexer::Span;

mod emit;

/// A translation unit: the file-scope declarations in source order
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub decls: Vec<Declaration>,
}

/// File-scope or block-scope declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Variable(VarDecl),
    Function(FunctionDecl),
}

impl Declaration {
    pub fn name(&self) -> &Ident {
        match self {
            Declaration::Variable(v) => &v.name,
            Declaration::Function(f) => &f.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Declaration::Variable(v) => v.span,
            Declaration::Function(f) => f.span,
        }
    }
}

/// Storage-class specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Static,
    Extern,
}

impl std::fmt::Display for StorageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageClass::Static => write!(f, "static"),
            StorageClass::Extern => write!(f, "extern"),
        }
    }
}

/// Variable declaration: `[static|extern] int name [= init];`
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: Ident,
    pub init: Option<Expr>,
    pub storage: Option<StorageClass>,
    pub span: Span,
}

/// Function declaration or definition
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Ident>,
    /// None for a declaration without a body
    pub body: Option<Block>,
    pub storage: Option<StorageClass>,
    pub span: Span,
}

/// A braced block of items
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub items: Vec<BlockItem>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockItem {
    Decl(Declaration),
    Stmt(Stmt),
}

/// Statements
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// return expr;
    Return(Expr),
    /// expr;
    Expr(Expr),
    /// if (cond) then [else otherwise]
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    /// { ... }
    Compound(Block),
    /// while (cond) body
    While(Expr, Box<Stmt>),
    /// do body while (cond);
    DoWhile(Box<Stmt>, Expr),
    /// for (init; cond; post) body
    For(ForInit, Option<Expr>, Option<Expr>, Box<Stmt>),
    Break,
    Continue,
    /// switch (scrutinee) body
    Switch(Expr, Box<Stmt>),
    /// case value: body
    Case(Expr, Box<Stmt>),
    /// default: body
    Default(Box<Stmt>),
    /// label: body
    Labeled(Ident, Box<Stmt>),
    /// goto label;
    Goto(Ident),
    /// ;
    Null,
}

/// Initializer clause of a `for` loop
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    Decl(VarDecl),
    Expr(Option<Expr>),
}

/// Expressions
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Integer constant: 42
    Constant(i64),
    /// Variable reference: a
    Var(Ident),
    /// Unary operation: -x, ~x, !x
    Unary(UnaryOp, Box<Expr>),
    /// Binary operation: a + b
    Binary(Box<Expr>, BinOp, Box<Expr>),
    /// Assignment: a = b
    Assign(Box<Expr>, Box<Expr>),
    /// Compound assignment: a += b
    CompoundAssign(BinOp, Box<Expr>, Box<Expr>),
    /// ++a, --a
    Prefix(UpdateOp, Box<Expr>),
    /// a++, a--
    Postfix(UpdateOp, Box<Expr>),
    /// cond ? then : otherwise
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Function call: f(a, b)
    Call(Ident, Vec<Expr>),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    // Comparison
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    // Logical
    And,
    Or,
}

impl BinOp {
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::BitOr => 3,
            BinOp::BitXor => 4,
            BinOp::BitAnd => 5,
            BinOp::Eq | BinOp::NotEq => 6,
            BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq => 7,
            BinOp::Shl | BinOp::Shr => 8,
            BinOp::Add | BinOp::Sub => 9,
            BinOp::Mul | BinOp::Div | BinOp::Mod => 10,
        }
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinOp::Add => write!(f, "+"),
            BinOp::Sub => write!(f, "-"),
            BinOp::Mul => write!(f, "*"),
            BinOp::Div => write!(f, "/"),
            BinOp::Mod => write!(f, "%"),
            BinOp::BitAnd => write!(f, "&"),
            BinOp::BitOr => write!(f, "|"),
            BinOp::BitXor => write!(f, "^"),
            BinOp::Shl => write!(f, "<<"),
            BinOp::Shr => write!(f, ">>"),
            BinOp::Eq => write!(f, "=="),
            BinOp::NotEq => write!(f, "!="),
            BinOp::Lt => write!(f, "<"),
            BinOp::Gt => write!(f, ">"),
            BinOp::LtEq => write!(f, "<="),
            BinOp::GtEq => write!(f, ">="),
            BinOp::And => write!(f, "&&"),
            BinOp::Or => write!(f, "||"),
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,        // -
    Complement, // ~
    Not,        // !
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Complement => write!(f, "~"),
            UnaryOp::Not => write!(f, "!"),
        }
    }
}

/// `++` / `--`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

impl std::fmt::Display for UpdateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateOp::Increment => write!(f, "++"),
            UpdateOp::Decrement => write!(f, "--"),
        }
    }
}

/// Identifier with span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self { name: name.into(), span }
    }
}

// === Pretty Printing ===

impl Program {
    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        for decl in &self.decls {
            out.push_str(&decl.pretty_print(0));
            out.push('\n');
        }
        out
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.decls.iter().filter_map(|d| match d {
            Declaration::Function(f) => Some(f),
            Declaration::Variable(_) => None,
        })
    }
}

impl Declaration {
    pub fn pretty_print(&self, indent: usize) -> String {
        match self {
            Declaration::Variable(v) => v.pretty_print(indent),
            Declaration::Function(f) => f.pretty_print(indent),
        }
    }
}

fn storage_prefix(storage: Option<StorageClass>) -> String {
    storage.map(|s| format!("{} ", s)).unwrap_or_default()
}

impl VarDecl {
    pub fn pretty_print(&self, indent: usize) -> String {
        let ind = "  ".repeat(indent);
        let mut out = format!("{}{}VarDecl '{}'", ind, storage_prefix(self.storage), self.name.name);
        if let Some(init) = &self.init {
            out.push_str(" =\n");
            out.push_str(&init.pretty_print_indented(indent + 1));
        } else {
            out.push('\n');
        }
        out
    }
}

impl FunctionDecl {
    pub fn pretty_print(&self, indent: usize) -> String {
        let ind = "  ".repeat(indent);
        let params = self.params.iter()
            .map(|p| p.name.clone())
            .collect::<Vec<_>>()
            .join(", ");
        let mut out = format!(
            "{}{}FunctionDecl '{}'({})\n",
            ind,
            storage_prefix(self.storage),
            self.name.name,
            params
        );
        if let Some(body) = &self.body {
            out.push_str(&format!("{}  body:\n", ind));
            out.push_str(&body.pretty_print(indent + 2));
        } else {
            out.push_str(&format!("{}  (declaration only)\n", ind));
        }
        out
    }
}

impl Block {
    pub fn pretty_print(&self, indent: usize) -> String {
        let ind = "  ".repeat(indent);
        let mut out = format!("{}Block\n", ind);
        for item in &self.items {
            match item {
                BlockItem::Decl(d) => out.push_str(&d.pretty_print(indent + 1)),
                BlockItem::Stmt(s) => out.push_str(&s.pretty_print(indent + 1)),
            }
        }
        out
    }
}

impl Stmt {
    pub fn pretty_print(&self, indent: usize) -> String {
        let ind = "  ".repeat(indent);
        let sub = "  ".repeat(indent + 1);
        match &self.kind {
            StmtKind::Return(e) => {
                let mut out = format!("{}Return\n", ind);
                out.push_str(&e.pretty_print_indented(indent + 1));
                out
            }
            StmtKind::Expr(e) => {
                let mut out = format!("{}ExprStmt\n", ind);
                out.push_str(&e.pretty_print_indented(indent + 1));
                out
            }
            StmtKind::If(cond, then, otherwise) => {
                let mut out = format!("{}If\n", ind);
                out.push_str(&format!("{}condition:\n", sub));
                out.push_str(&cond.pretty_print_indented(indent + 2));
                out.push_str(&format!("{}then:\n", sub));
                out.push_str(&then.pretty_print(indent + 2));
                if let Some(otherwise) = otherwise {
                    out.push_str(&format!("{}else:\n", sub));
                    out.push_str(&otherwise.pretty_print(indent + 2));
                }
                out
            }
            StmtKind::Compound(block) => block.pretty_print(indent),
            StmtKind::While(cond, body) => {
                let mut out = format!("{}While\n", ind);
                out.push_str(&format!("{}condition:\n", sub));
                out.push_str(&cond.pretty_print_indented(indent + 2));
                out.push_str(&format!("{}body:\n", sub));
                out.push_str(&body.pretty_print(indent + 2));
                out
            }
            StmtKind::DoWhile(body, cond) => {
                let mut out = format!("{}DoWhile\n", ind);
                out.push_str(&format!("{}body:\n", sub));
                out.push_str(&body.pretty_print(indent + 2));
                out.push_str(&format!("{}condition:\n", sub));
                out.push_str(&cond.pretty_print_indented(indent + 2));
                out
            }
            StmtKind::For(init, cond, post, body) => {
                let mut out = format!("{}For\n", ind);
                match init {
                    ForInit::Decl(d) => {
                        out.push_str(&format!("{}init:\n", sub));
                        out.push_str(&d.pretty_print(indent + 2));
                    }
                    ForInit::Expr(Some(e)) => {
                        out.push_str(&format!("{}init:\n", sub));
                        out.push_str(&e.pretty_print_indented(indent + 2));
                    }
                    ForInit::Expr(None) => {}
                }
                if let Some(cond) = cond {
                    out.push_str(&format!("{}condition:\n", sub));
                    out.push_str(&cond.pretty_print_indented(indent + 2));
                }
                if let Some(post) = post {
                    out.push_str(&format!("{}post:\n", sub));
                    out.push_str(&post.pretty_print_indented(indent + 2));
                }
                out.push_str(&format!("{}body:\n", sub));
                out.push_str(&body.pretty_print(indent + 2));
                out
            }
            StmtKind::Break => format!("{}Break\n", ind),
            StmtKind::Continue => format!("{}Continue\n", ind),
            StmtKind::Switch(scrutinee, body) => {
                let mut out = format!("{}Switch\n", ind);
                out.push_str(&format!("{}scrutinee:\n", sub));
                out.push_str(&scrutinee.pretty_print_indented(indent + 2));
                out.push_str(&format!("{}body:\n", sub));
                out.push_str(&body.pretty_print(indent + 2));
                out
            }
            StmtKind::Case(value, body) => {
                let mut out = format!("{}Case {}\n", ind, value.pretty_print());
                out.push_str(&body.pretty_print(indent + 1));
                out
            }
            StmtKind::Default(body) => {
                let mut out = format!("{}Default\n", ind);
                out.push_str(&body.pretty_print(indent + 1));
                out
            }
            StmtKind::Labeled(label, body) => {
                let mut out = format!("{}Label '{}'\n", ind, label.name);
                out.push_str(&body.pretty_print(indent + 1));
                out
            }
            StmtKind::Goto(label) => format!("{}Goto '{}'\n", ind, label.name),
            StmtKind::Null => format!("{}Null\n", ind),
        }
    }
}

impl Expr {
    /// Pretty print with indentation for full AST display
    pub fn pretty_print_indented(&self, indent: usize) -> String {
        let ind = "  ".repeat(indent);
        match &self.kind {
            ExprKind::Constant(n) => format!("{}Constant({})\n", ind, n),
            ExprKind::Var(id) => format!("{}Var({})\n", ind, id.name),
            ExprKind::Unary(op, e) => {
                let mut out = format!("{}Unary({})\n", ind, op);
                out.push_str(&e.pretty_print_indented(indent + 1));
                out
            }
            ExprKind::Binary(l, op, r) => {
                let mut out = format!("{}Binary({})\n", ind, op);
                out.push_str(&l.pretty_print_indented(indent + 1));
                out.push_str(&r.pretty_print_indented(indent + 1));
                out
            }
            ExprKind::Assign(lhs, rhs) => {
                let mut out = format!("{}Assign\n", ind);
                out.push_str(&lhs.pretty_print_indented(indent + 1));
                out.push_str(&rhs.pretty_print_indented(indent + 1));
                out
            }
            ExprKind::CompoundAssign(op, lhs, rhs) => {
                let mut out = format!("{}CompoundAssign({}=)\n", ind, op);
                out.push_str(&lhs.pretty_print_indented(indent + 1));
                out.push_str(&rhs.pretty_print_indented(indent + 1));
                out
            }
            ExprKind::Prefix(op, e) => {
                let mut out = format!("{}Prefix({})\n", ind, op);
                out.push_str(&e.pretty_print_indented(indent + 1));
                out
            }
            ExprKind::Postfix(op, e) => {
                let mut out = format!("{}Postfix({})\n", ind, op);
                out.push_str(&e.pretty_print_indented(indent + 1));
                out
            }
            ExprKind::Conditional(cond, then, otherwise) => {
                let mut out = format!("{}Conditional\n", ind);
                out.push_str(&cond.pretty_print_indented(indent + 1));
                out.push_str(&then.pretty_print_indented(indent + 1));
                out.push_str(&otherwise.pretty_print_indented(indent + 1));
                out
            }
            ExprKind::Call(callee, args) => {
                let mut out = format!("{}Call '{}'\n", ind, callee.name);
                for arg in args {
                    out.push_str(&arg.pretty_print_indented(indent + 1));
                }
                out
            }
        }
    }

    /// Constants, variables and calls print without surrounding parentheses
    pub fn is_atom(&self) -> bool {
        matches!(self.kind, ExprKind::Constant(_) | ExprKind::Var(_) | ExprKind::Call(..))
    }

    /// Compact pretty print (for inline display)
    pub fn pretty_print(&self) -> String {
        match &self.kind {
            ExprKind::Constant(n) => format!("{}", n),
            ExprKind::Var(id) => id.name.clone(),
            ExprKind::Unary(op, e) if e.is_atom() => format!("{}{}", op, e.pretty_print()),
            ExprKind::Unary(op, e) => format!("{}({})", op, e.pretty_print()),
            ExprKind::Binary(l, op, r) => format!("({} {} {})", l.pretty_print(), op, r.pretty_print()),
            ExprKind::Assign(lhs, rhs) => format!("{} = {}", lhs.pretty_print(), rhs.pretty_print()),
            ExprKind::CompoundAssign(op, lhs, rhs) => {
                format!("{} {}= {}", lhs.pretty_print(), op, rhs.pretty_print())
            }
            ExprKind::Prefix(op, e) if e.is_atom() => format!("{}{}", op, e.pretty_print()),
            ExprKind::Prefix(op, e) => format!("{}({})", op, e.pretty_print()),
            ExprKind::Postfix(op, e) if e.is_atom() => format!("{}{}", e.pretty_print(), op),
            ExprKind::Postfix(op, e) => format!("({}){}", e.pretty_print(), op),
            ExprKind::Conditional(cond, then, otherwise) => format!(
                "({} ? {} : {})",
                cond.pretty_print(),
                then.pretty_print(),
                otherwise.pretty_print()
            ),
            ExprKind::Call(callee, args) => {
                let args_str = args.iter().map(|a| a.pretty_print()).collect::<Vec<_>>().join(", ");
                format!("{}({})", callee.name, args_str)
            }
        }
    }
}
