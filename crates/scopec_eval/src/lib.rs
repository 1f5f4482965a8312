//! Tree-walking evaluator for resolved programs.
//!
//! Every call frame keeps its locals in one flat map keyed by the names the
//! resolver generated, so the evaluator never tracks block scopes itself.
//! Running an unresolved program gives wrong answers as soon as a name is
//! shadowed.

use std::collections::HashMap;

use scopec_ast::*;
use scopec_lexer::Span;
use tracing::{debug, trace};

const MAX_CALL_DEPTH: usize = 256;

#[derive(Debug, Clone)]
pub struct EvalError {
    pub message: String,
    pub span: Span,
}

impl EvalError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self { message: message.into(), span }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for EvalError {}

pub type EvalResult<T> = Result<T, EvalError>;

/// How a statement finished
#[derive(Debug, Clone, PartialEq)]
enum Flow {
    Normal,
    Break,
    Continue,
    Return(i32),
    Goto(String),
}

/// What a statement walk is skipping forward to. While a target is set,
/// statements are visited without being executed until the target is found.
#[derive(Debug, Clone, PartialEq)]
enum Target {
    Label(String),
    Case(i32),
    Default,
}

#[derive(Debug, Default)]
struct Frame {
    locals: HashMap<String, i32>,
}

/// Generated names contain a `.`; source names never do
fn is_local_name(name: &str) -> bool {
    name.contains('.')
}

pub struct Interpreter<'p> {
    functions: HashMap<&'p str, &'p FunctionDecl>,
    /// File-scope variables by source name, static locals by generated name
    globals: HashMap<String, i32>,
    depth: usize,
    max_depth: usize,
}

impl<'p> Interpreter<'p> {
    /// Collect function definitions and initialize file-scope variables
    pub fn new(program: &'p Program) -> EvalResult<Self> {
        let mut interp = Self {
            functions: HashMap::new(),
            globals: HashMap::new(),
            depth: 0,
            max_depth: MAX_CALL_DEPTH,
        };

        for decl in &program.decls {
            match decl {
                Declaration::Variable(v) => match &v.init {
                    Some(init) => {
                        let value = interp.eval(init, &mut Frame::default())?;
                        interp.globals.insert(v.name.name.clone(), value);
                    }
                    None if v.storage != Some(StorageClass::Extern) => {
                        interp.globals.entry(v.name.name.clone()).or_insert(0);
                    }
                    None => {}
                },
                Declaration::Function(f) if f.body.is_some() => {
                    interp.functions.insert(f.name.name.as_str(), f);
                }
                Declaration::Function(_) => {}
            }
        }

        Ok(interp)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Evaluate `main()` of a resolved program
    pub fn run_main(program: &'p Program) -> EvalResult<i32> {
        let mut interp = Interpreter::new(program)?;
        if !interp.functions.contains_key("main") {
            return Err(EvalError::new("no definition of 'main'", Span::default()));
        }
        interp.call("main", Vec::new(), Span::default())
    }

    pub fn call(&mut self, name: &str, args: Vec<i32>, span: Span) -> EvalResult<i32> {
        let func = self
            .functions
            .get(name)
            .copied()
            .ok_or_else(|| EvalError::new(format!("function '{}' has no definition", name), span))?;
        let body = func
            .body
            .as_ref()
            .ok_or_else(|| EvalError::new(format!("function '{}' has no definition", name), span))?;

        if func.params.len() != args.len() {
            return Err(EvalError::new(
                format!("function '{}' expects {} arguments, got {}", name, func.params.len(), args.len()),
                span,
            ));
        }
        if self.depth >= self.max_depth {
            return Err(EvalError::new(format!("call depth limit of {} exceeded", self.max_depth), span));
        }

        let mut frame = Frame::default();
        for (param, value) in func.params.iter().zip(args) {
            frame.locals.insert(param.name.clone(), value);
        }

        self.depth += 1;
        debug!(function = name, depth = self.depth, "call");
        let flow = self.exec_items(&body.items, &mut frame, &mut None);
        self.depth -= 1;

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Goto(label) => Err(EvalError::new(format!("goto to unknown label '{}'", label), span)),
            // Falling off the end returns 0
            Flow::Normal | Flow::Break | Flow::Continue => Ok(0),
        }
    }

    // === Statements ===

    fn exec_items(
        &mut self,
        items: &'p [BlockItem],
        frame: &mut Frame,
        seek: &mut Option<Target>,
    ) -> EvalResult<Flow> {
        'restart: loop {
            for item in items {
                let flow = match item {
                    BlockItem::Decl(Declaration::Variable(v)) => {
                        self.exec_local_decl(v, frame, seek.is_some())?;
                        Flow::Normal
                    }
                    BlockItem::Decl(Declaration::Function(_)) => Flow::Normal,
                    BlockItem::Stmt(stmt) => self.exec_stmt(stmt, frame, seek)?,
                };

                match flow {
                    Flow::Normal => {}
                    Flow::Goto(label) if items.iter().any(|i| item_has_label(i, &label)) => {
                        trace!(%label, "goto");
                        *seek = Some(Target::Label(label));
                        continue 'restart;
                    }
                    other => return Ok(other),
                }
            }
            return Ok(Flow::Normal);
        }
    }

    fn exec_local_decl(&mut self, v: &'p VarDecl, frame: &mut Frame, seeking: bool) -> EvalResult<()> {
        match v.storage {
            Some(StorageClass::Extern) => {}
            // Initialized once, even when a jump passes over the declaration
            Some(StorageClass::Static) => {
                if !self.globals.contains_key(&v.name.name) {
                    let value = match &v.init {
                        Some(init) => self.eval(init, &mut Frame::default())?,
                        None => 0,
                    };
                    self.globals.insert(v.name.name.clone(), value);
                }
            }
            None if seeking => {}
            None => {
                let value = match &v.init {
                    Some(init) => self.eval(init, frame)?,
                    None => 0,
                };
                frame.locals.insert(v.name.name.clone(), value);
            }
        }
        Ok(())
    }

    fn exec_stmt(&mut self, stmt: &'p Stmt, frame: &mut Frame, seek: &mut Option<Target>) -> EvalResult<Flow> {
        let seeking = seek.is_some();

        match &stmt.kind {
            StmtKind::Return(expr) => {
                if seeking {
                    return Ok(Flow::Normal);
                }
                Ok(Flow::Return(self.eval(expr, frame)?))
            }
            StmtKind::Expr(expr) => {
                if !seeking {
                    self.eval(expr, frame)?;
                }
                Ok(Flow::Normal)
            }
            StmtKind::If(cond, then, otherwise) => {
                if seeking {
                    let flow = self.exec_stmt(then, frame, seek)?;
                    if seek.is_none() {
                        return Ok(flow);
                    }
                    return match otherwise {
                        Some(otherwise) => self.exec_stmt(otherwise, frame, seek),
                        None => Ok(Flow::Normal),
                    };
                }
                if self.eval(cond, frame)? != 0 {
                    self.exec_stmt(then, frame, seek)
                } else if let Some(otherwise) = otherwise {
                    self.exec_stmt(otherwise, frame, seek)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::Compound(block) => self.exec_items(&block.items, frame, seek),
            StmtKind::While(cond, body) => self.exec_loop(Some(cond), None, body, true, frame, seek),
            StmtKind::DoWhile(body, cond) => self.exec_loop(Some(cond), None, body, false, frame, seek),
            StmtKind::For(init, cond, post, body) => {
                if !seeking {
                    match init {
                        ForInit::Decl(v) => self.exec_local_decl(v, frame, false)?,
                        ForInit::Expr(Some(expr)) => {
                            self.eval(expr, frame)?;
                        }
                        ForInit::Expr(None) => {}
                    }
                }
                self.exec_loop(cond.as_ref(), post.as_ref(), body, true, frame, seek)
            }
            StmtKind::Break if !seeking => Ok(Flow::Break),
            StmtKind::Continue if !seeking => Ok(Flow::Continue),
            StmtKind::Goto(label) if !seeking => Ok(Flow::Goto(label.name.clone())),
            StmtKind::Break | StmtKind::Continue | StmtKind::Goto(_) | StmtKind::Null => Ok(Flow::Normal),
            StmtKind::Switch(scrutinee, body) => {
                let flow = if seeking {
                    // Only a goto can land inside a switch body from outside
                    if !matches!(seek, Some(Target::Label(_))) {
                        return Ok(Flow::Normal);
                    }
                    self.exec_stmt(body, frame, seek)?
                } else {
                    let value = self.eval(scrutinee, frame)?;
                    let Some(target) = self.switch_target(body, value, frame)? else {
                        return Ok(Flow::Normal);
                    };
                    trace!(value, ?target, "switch");
                    self.exec_stmt(body, frame, &mut Some(target))?
                };
                Ok(match flow {
                    Flow::Break => Flow::Normal,
                    other => other,
                })
            }
            StmtKind::Case(value, body) => {
                let wanted = match seek {
                    Some(Target::Case(wanted)) => Some(*wanted),
                    _ => None,
                };
                if let Some(wanted) = wanted {
                    if self.eval(value, frame)? == wanted {
                        *seek = None;
                    }
                }
                self.exec_stmt(body, frame, seek)
            }
            StmtKind::Default(body) => {
                if matches!(seek, Some(Target::Default)) {
                    *seek = None;
                }
                self.exec_stmt(body, frame, seek)
            }
            StmtKind::Labeled(label, body) => {
                if matches!(seek, Some(Target::Label(wanted)) if *wanted == label.name) {
                    *seek = None;
                }
                self.exec_stmt(body, frame, seek)
            }
        }
    }

    /// Shared by `while`, `do`/`while`, and `for`. A loop entered while
    /// seeking runs its body once in seek mode and only keeps looping if the
    /// target was found inside.
    fn exec_loop(
        &mut self,
        cond: Option<&'p Expr>,
        post: Option<&'p Expr>,
        body: &'p Stmt,
        test_first: bool,
        frame: &mut Frame,
        seek: &mut Option<Target>,
    ) -> EvalResult<Flow> {
        let mut first = true;

        loop {
            if seek.is_none() && (test_first || !first) {
                if let Some(cond) = cond {
                    if self.eval(cond, frame)? == 0 {
                        break;
                    }
                }
            }
            first = false;

            match self.exec_stmt(body, frame, seek)? {
                Flow::Break => break,
                Flow::Normal | Flow::Continue => {}
                other => return Ok(other),
            }

            if seek.is_some() {
                return Ok(Flow::Normal);
            }
            if let Some(post) = post {
                self.eval(post, frame)?;
            }
        }

        Ok(Flow::Normal)
    }

    /// Where control enters a switch body for `value`, if anywhere
    fn switch_target(&mut self, body: &'p Stmt, value: i32, frame: &mut Frame) -> EvalResult<Option<Target>> {
        let mut cases = Vec::new();
        let mut has_default = false;
        collect_cases(body, &mut cases, &mut has_default);

        for case in cases {
            if self.eval(case, frame)? == value {
                return Ok(Some(Target::Case(value)));
            }
        }
        Ok(has_default.then_some(Target::Default))
    }

    // === Expressions ===

    fn eval(&mut self, expr: &'p Expr, frame: &mut Frame) -> EvalResult<i32> {
        match &expr.kind {
            // Constants wider than `int` wrap as a conversion to `int` would
            ExprKind::Constant(n) => Ok(*n as i32),
            ExprKind::Var(ident) => self.read(&ident.name, ident.span, frame),
            ExprKind::Unary(op, operand) => {
                let value = self.eval(operand, frame)?;
                Ok(match op {
                    UnaryOp::Neg => value.wrapping_neg(),
                    UnaryOp::Complement => !value,
                    UnaryOp::Not => (value == 0) as i32,
                })
            }
            ExprKind::Binary(lhs, BinOp::And, rhs) => {
                if self.eval(lhs, frame)? == 0 {
                    return Ok(0);
                }
                Ok((self.eval(rhs, frame)? != 0) as i32)
            }
            ExprKind::Binary(lhs, BinOp::Or, rhs) => {
                if self.eval(lhs, frame)? != 0 {
                    return Ok(1);
                }
                Ok((self.eval(rhs, frame)? != 0) as i32)
            }
            ExprKind::Binary(lhs, op, rhs) => {
                let l = self.eval(lhs, frame)?;
                let r = self.eval(rhs, frame)?;
                binop(*op, l, r, expr.span)
            }
            ExprKind::Assign(lhs, rhs) => {
                let name = lvalue_name(lhs)?;
                let value = self.eval(rhs, frame)?;
                self.write(name, value, lhs.span, frame)?;
                Ok(value)
            }
            ExprKind::CompoundAssign(op, lhs, rhs) => {
                let name = lvalue_name(lhs)?;
                let current = self.read(name, lhs.span, frame)?;
                let r = self.eval(rhs, frame)?;
                let value = binop(*op, current, r, expr.span)?;
                self.write(name, value, lhs.span, frame)?;
                Ok(value)
            }
            ExprKind::Prefix(op, operand) | ExprKind::Postfix(op, operand) => {
                let name = lvalue_name(operand)?;
                let old = self.read(name, operand.span, frame)?;
                let new = match op {
                    UpdateOp::Increment => old.wrapping_add(1),
                    UpdateOp::Decrement => old.wrapping_sub(1),
                };
                self.write(name, new, operand.span, frame)?;
                Ok(if matches!(expr.kind, ExprKind::Prefix(..)) { new } else { old })
            }
            ExprKind::Conditional(cond, then, otherwise) => {
                if self.eval(cond, frame)? != 0 {
                    self.eval(then, frame)
                } else {
                    self.eval(otherwise, frame)
                }
            }
            ExprKind::Call(callee, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, frame)?);
                }
                self.call(&callee.name, values, expr.span)
            }
        }
    }

    fn read(&self, name: &str, span: Span, frame: &Frame) -> EvalResult<i32> {
        if let Some(value) = frame.locals.get(name) {
            return Ok(*value);
        }
        if let Some(value) = self.globals.get(name) {
            return Ok(*value);
        }
        // A local whose declaration was jumped over
        if is_local_name(name) {
            return Ok(0);
        }
        Err(EvalError::new(format!("variable '{}' has no definition", name), span))
    }

    fn write(&mut self, name: &str, value: i32, span: Span, frame: &mut Frame) -> EvalResult<()> {
        if let Some(slot) = frame.locals.get_mut(name) {
            *slot = value;
        } else if let Some(slot) = self.globals.get_mut(name) {
            *slot = value;
        } else if is_local_name(name) {
            frame.locals.insert(name.to_string(), value);
        } else {
            return Err(EvalError::new(format!("variable '{}' has no definition", name), span));
        }
        Ok(())
    }
}

fn lvalue_name(expr: &Expr) -> EvalResult<&str> {
    match &expr.kind {
        ExprKind::Var(ident) => Ok(&ident.name),
        _ => Err(EvalError::new("cannot assign to this expression", expr.span)),
    }
}

fn binop(op: BinOp, l: i32, r: i32, span: Span) -> EvalResult<i32> {
    Ok(match op {
        BinOp::Add => l.wrapping_add(r),
        BinOp::Sub => l.wrapping_sub(r),
        BinOp::Mul => l.wrapping_mul(r),
        BinOp::Div | BinOp::Mod if r == 0 => {
            return Err(EvalError::new("division by zero", span));
        }
        BinOp::Div => l.wrapping_div(r),
        BinOp::Mod => l.wrapping_rem(r),
        BinOp::BitAnd => l & r,
        BinOp::BitOr => l | r,
        BinOp::BitXor => l ^ r,
        BinOp::Shl | BinOp::Shr if !(0..32).contains(&r) => {
            return Err(EvalError::new(format!("shift amount {} is out of range", r), span));
        }
        BinOp::Shl => l.wrapping_shl(r as u32),
        BinOp::Shr => l.wrapping_shr(r as u32),
        BinOp::Eq => (l == r) as i32,
        BinOp::NotEq => (l != r) as i32,
        BinOp::Lt => (l < r) as i32,
        BinOp::Gt => (l > r) as i32,
        BinOp::LtEq => (l <= r) as i32,
        BinOp::GtEq => (l >= r) as i32,
        BinOp::And => (l != 0 && r != 0) as i32,
        BinOp::Or => (l != 0 || r != 0) as i32,
    })
}

/// Case values and `default` belonging to one switch, skipping nested switches
fn collect_cases<'p>(stmt: &'p Stmt, cases: &mut Vec<&'p Expr>, has_default: &mut bool) {
    match &stmt.kind {
        StmtKind::Case(value, body) => {
            cases.push(value);
            collect_cases(body, cases, has_default);
        }
        StmtKind::Default(body) => {
            *has_default = true;
            collect_cases(body, cases, has_default);
        }
        StmtKind::Compound(block) => {
            for item in &block.items {
                if let BlockItem::Stmt(stmt) = item {
                    collect_cases(stmt, cases, has_default);
                }
            }
        }
        StmtKind::If(_, then, otherwise) => {
            collect_cases(then, cases, has_default);
            if let Some(otherwise) = otherwise {
                collect_cases(otherwise, cases, has_default);
            }
        }
        StmtKind::While(_, body)
        | StmtKind::DoWhile(body, _)
        | StmtKind::For(_, _, _, body)
        | StmtKind::Labeled(_, body) => collect_cases(body, cases, has_default),
        _ => {}
    }
}

fn item_has_label(item: &BlockItem, label: &str) -> bool {
    match item {
        BlockItem::Stmt(stmt) => stmt_has_label(stmt, label),
        BlockItem::Decl(_) => false,
    }
}

fn stmt_has_label(stmt: &Stmt, label: &str) -> bool {
    match &stmt.kind {
        StmtKind::Labeled(l, body) => l.name == label || stmt_has_label(body, label),
        StmtKind::Compound(block) => block.items.iter().any(|i| item_has_label(i, label)),
        StmtKind::If(_, then, otherwise) => {
            stmt_has_label(then, label) || otherwise.as_ref().is_some_and(|o| stmt_has_label(o, label))
        }
        StmtKind::While(_, body)
        | StmtKind::DoWhile(body, _)
        | StmtKind::For(_, _, _, body)
        | StmtKind::Switch(_, body)
        | StmtKind::Case(_, body)
        | StmtKind::Default(body) => stmt_has_label(body, label),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopec_parser::Parser;
    use scopec_resolve::Resolver;

    fn run(source: &str) -> i32 {
        let program = Resolver::resolve(Parser::parse(source).unwrap()).unwrap();
        Interpreter::run_main(&program).unwrap()
    }

    fn run_err(source: &str) -> EvalError {
        let program = Resolver::resolve(Parser::parse(source).unwrap()).unwrap();
        Interpreter::run_main(&program).unwrap_err()
    }

    #[test]
    fn test_nested_shadowing_fixture() {
        let source = "int main(void) {
            int a; int result; int a1 = 1;
            { int a = 2; int a1 = 2;
              { int a; { int a; { int a; { int a; { int a; { int a; { int a; { int a;
                { int a = 20; result = a; { int a; a = 5; result = result + a; } }
              } } } } } } } }
              result = result + a1;
            }
            return result + a1;
        }";
        assert_eq!(run(source), 28);
    }

    #[test]
    fn test_shadowing_inside_block() {
        let source = "int main(void) {
            int a = 2; int b;
            { a = -4; int a = 7; b = a + 1; }
            return b == 8 && a == -4;
        }";
        assert_eq!(run(source), 1);
    }

    #[test]
    fn test_loops() {
        assert_eq!(run("int main(void) { int a = 10; for (int i = 0; i < 10; i++) { int a = 5; a++; } return a; }"), 10);
        assert_eq!(run("int main(void) { int s = 0; for (int i = 0; i < 10; i = i + 1) { if (i % 2) continue; if (i > 6) break; s += i; } return s; }"), 12);
        assert_eq!(run("int main(void) { int n = 0; do n++; while (n < 3); return n; }"), 3);
        assert_eq!(run("int main(void) { int n = 5; while (n > 0) n--; return n; }"), 0);
    }

    #[test]
    fn test_switch_fallthrough_and_default() {
        let source = |x: i32| {
            format!(
                "int main(void) {{ int x = {}; int r = 0; switch (x) {{ case 1: r = r + 1; case 2: r = r + 10; case 3: r = r + 100; break; default: r = 1000; }} return r; }}",
                x
            )
        };
        assert_eq!(run(&source(1)), 111);
        assert_eq!(run(&source(2)), 110);
        assert_eq!(run(&source(7)), 1000);
        assert_eq!(run("int main(void) { switch (3) case 1: return 1; return 9; }"), 9);
    }

    #[test]
    fn test_case_before_declaration() {
        assert_eq!(run("int main(void) { int x = 0; switch (x) { case 0: int b = 2; return b; } return 0; }"), 2);
    }

    #[test]
    fn test_nested_switch_cases_are_separate() {
        let source = "int main(void) { int r = 0; switch (2) { case 1: switch (1) { case 2: r = 50; } break; case 2: r = 7; } return r; }";
        assert_eq!(run(source), 7);
    }

    #[test]
    fn test_goto() {
        assert_eq!(run("int main(void) { int i = 0; loop: i = i + 1; if (i < 5) goto loop; return i; }"), 5);
        assert_eq!(run("int main(void) { goto end; return 1; end: return 2; }"), 2);
        assert_eq!(run("int main(void) { int n = 0; goto inner; while (n < 10) { n = n + 100; inner: n = n + 1; } return n; }"), 102);
    }

    #[test]
    fn test_functions_and_globals() {
        assert_eq!(run("int fact(int n) { if (n <= 1) return 1; return n * fact(n - 1); } int main(void) { return fact(5); }"), 120);
        assert_eq!(run("int g = 5; int bump(void) { g = g + 1; return g; } int main(void) { bump(); return g; }"), 6);
        assert_eq!(run("int foo(int a, int b); int main(void) { return foo(2, 1); } int foo(int x, int y) { return x - y; }"), 1);
        assert_eq!(run("int main(void) { int a = 10; int f(int a); return f(a); } int f(int a) { return a * 2; }"), 20);
    }

    #[test]
    fn test_static_local_keeps_value() {
        let source = "int counter(void) { static int n = 0; n = n + 1; return n; } int main(void) { counter(); counter(); return counter(); }";
        assert_eq!(run(source), 3);
    }

    #[test]
    fn test_operators() {
        assert_eq!(run("int main(void) { return (1 << 4) | 3 ^ 1; }"), 18);
        assert_eq!(run("int main(void) { int a = 5; int b = a++ + ++a; return b * 10 + a; }"), 127);
        assert_eq!(run("int main(void) { int a = 6; a *= 2; a -= 2; a %= 7; return a; }"), 3);
        assert_eq!(run("int main(void) { return 0 || 0 ? 4 : -~2; }"), 3);
    }

    #[test]
    fn test_int_arithmetic_wraps() {
        assert_eq!(run("int main(void) { int a = 2147483647; a = a + 1; return a < 0; }"), 1);
        assert_eq!(run("int main(void) { int a = 2147483647; a++; return a == -2147483647 - 1; }"), 1);
        assert_eq!(run("int main(void) { return 4294967297; }"), 1);
        assert_eq!(run_err("int main(void) { return 1 << 32; }").message, "shift amount 32 is out of range");
    }

    #[test]
    fn test_runtime_errors() {
        assert_eq!(run_err("int main(void) { return 1 / 0; }").message, "division by zero");
        assert!(run_err("int f(void); int main(void) { return f(); }").message.contains("no definition"));

        let program = Resolver::resolve(Parser::parse("int f(void) { return f(); }").unwrap()).unwrap();
        let err = Interpreter::new(&program)
            .unwrap()
            .with_max_depth(8)
            .call("f", Vec::new(), Span::default())
            .unwrap_err();
        assert_eq!(err.message, "call depth limit of 8 exceeded");
        assert!(run_err("int helper(void) { return 0; }").message.contains("main"));
    }
}
