//! C-like source emission, used to show a program after renaming

use crate::*;

const INDENT: &str = "    ";

impl Program {
    /// Render the program back to C-like source text
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        for (i, decl) in self.decls.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            emit_decl(&mut out, decl, 0);
        }
        out
    }
}

fn emit_decl(out: &mut String, decl: &Declaration, depth: usize) {
    match decl {
        Declaration::Variable(v) => {
            out.push_str(&INDENT.repeat(depth));
            out.push_str(&var_decl_source(v));
            out.push_str(";\n");
        }
        Declaration::Function(f) => {
            out.push_str(&INDENT.repeat(depth));
            out.push_str(&storage_prefix(f.storage));
            let params = if f.params.is_empty() {
                "void".to_string()
            } else {
                f.params.iter()
                    .map(|p| format!("int {}", p.name))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            out.push_str(&format!("int {}({})", f.name.name, params));
            match &f.body {
                Some(body) => {
                    out.push(' ');
                    emit_block(out, body, depth);
                    out.push('\n');
                }
                None => out.push_str(";\n"),
            }
        }
    }
}

fn var_decl_source(v: &VarDecl) -> String {
    let mut s = format!("{}int {}", storage_prefix(v.storage), v.name.name);
    if let Some(init) = &v.init {
        s.push_str(" = ");
        s.push_str(&init.pretty_print());
    }
    s
}

fn emit_block(out: &mut String, block: &Block, depth: usize) {
    out.push_str("{\n");
    for item in &block.items {
        match item {
            BlockItem::Decl(d) => emit_decl(out, d, depth + 1),
            BlockItem::Stmt(s) => emit_stmt(out, s, depth + 1),
        }
    }
    out.push_str(&INDENT.repeat(depth));
    out.push('}');
}

/// Statements used as a body (`if`, loops, labels) print their own line
fn emit_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    let ind = INDENT.repeat(depth);
    match &stmt.kind {
        StmtKind::Return(e) => out.push_str(&format!("{}return {};\n", ind, e.pretty_print())),
        StmtKind::Expr(e) => out.push_str(&format!("{}{};\n", ind, e.pretty_print())),
        StmtKind::If(cond, then, otherwise) => {
            out.push_str(&format!("{}if ({})\n", ind, cond.pretty_print()));
            emit_stmt(out, then, depth + 1);
            if let Some(otherwise) = otherwise {
                out.push_str(&format!("{}else\n", ind));
                emit_stmt(out, otherwise, depth + 1);
            }
        }
        StmtKind::Compound(block) => {
            out.push_str(&ind);
            emit_block(out, block, depth);
            out.push('\n');
        }
        StmtKind::While(cond, body) => {
            out.push_str(&format!("{}while ({})\n", ind, cond.pretty_print()));
            emit_stmt(out, body, depth + 1);
        }
        StmtKind::DoWhile(body, cond) => {
            out.push_str(&format!("{}do\n", ind));
            emit_stmt(out, body, depth + 1);
            out.push_str(&format!("{}while ({});\n", ind, cond.pretty_print()));
        }
        StmtKind::For(init, cond, post, body) => {
            let init = match init {
                ForInit::Decl(d) => var_decl_source(d),
                ForInit::Expr(e) => e.as_ref().map(|e| e.pretty_print()).unwrap_or_default(),
            };
            let cond = cond.as_ref().map(|e| e.pretty_print()).unwrap_or_default();
            let post = post.as_ref().map(|e| e.pretty_print()).unwrap_or_default();
            out.push_str(&format!("{}for ({}; {}; {})\n", ind, init, cond, post));
            emit_stmt(out, body, depth + 1);
        }
        StmtKind::Break => out.push_str(&format!("{}break;\n", ind)),
        StmtKind::Continue => out.push_str(&format!("{}continue;\n", ind)),
        StmtKind::Switch(scrutinee, body) => {
            out.push_str(&format!("{}switch ({})\n", ind, scrutinee.pretty_print()));
            emit_stmt(out, body, depth + 1);
        }
        StmtKind::Case(value, body) => {
            out.push_str(&format!("{}case {}:\n", ind, value.pretty_print()));
            emit_stmt(out, body, depth + 1);
        }
        StmtKind::Default(body) => {
            out.push_str(&format!("{}default:\n", ind));
            emit_stmt(out, body, depth + 1);
        }
        StmtKind::Labeled(label, body) => {
            out.push_str(&format!("{}{}:\n", ind, label.name));
            emit_stmt(out, body, depth + 1);
        }
        StmtKind::Goto(label) => out.push_str(&format!("{}goto {};\n", ind, label.name)),
        StmtKind::Null => out.push_str(&format!("{};\n", ind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopec_lexer::Span;

    fn ident(name: &str) -> Ident {
        Ident::new(name, Span::default())
    }

    fn expr(kind: ExprKind) -> Expr {
        Expr { kind, span: Span::default() }
    }

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt { kind, span: Span::default() }
    }

    #[test]
    fn test_emit_function_with_switch() {
        let body = Block {
            items: vec![
                BlockItem::Decl(Declaration::Variable(VarDecl {
                    name: ident("x.0"),
                    init: Some(expr(ExprKind::Constant(3))),
                    storage: None,
                    span: Span::default(),
                })),
                BlockItem::Stmt(stmt(StmtKind::Switch(
                    expr(ExprKind::Var(ident("x.0"))),
                    Box::new(stmt(StmtKind::Compound(Block {
                        items: vec![BlockItem::Stmt(stmt(StmtKind::Case(
                            expr(ExprKind::Constant(3)),
                            Box::new(stmt(StmtKind::Return(expr(ExprKind::Constant(1))))),
                        )))],
                        span: Span::default(),
                    }))),
                ))),
                BlockItem::Stmt(stmt(StmtKind::Return(expr(ExprKind::Constant(0))))),
            ],
            span: Span::default(),
        };
        let program = Program {
            decls: vec![
                Declaration::Function(FunctionDecl {
                    name: ident("f"),
                    params: vec![ident("a.1")],
                    body: None,
                    storage: Some(StorageClass::Extern),
                    span: Span::default(),
                }),
                Declaration::Function(FunctionDecl {
                    name: ident("main"),
                    params: vec![],
                    body: Some(body),
                    storage: None,
                    span: Span::default(),
                }),
            ],
        };

        let expected = "\
extern int f(int a.1);

int main(void) {
    int x.0 = 3;
    switch (x.0)
        {
            case 3:
                return 1;
        }
    return 0;
}
";
        assert_eq!(program.to_source(), expected);
    }
}
