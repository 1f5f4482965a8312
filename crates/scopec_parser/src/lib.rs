use scopec_ast::*;
use scopec_lexer::{Lexer, Span, SpannedToken, Token};

pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

impl Parser {
    pub fn new(source: &str) -> ParseResult<Self> {
        let tokens = Lexer::tokenize(source)
            .map_err(|e| ParseError { message: e.message, span: e.span })?;
        Ok(Self { tokens, pos: 0 })
    }

    pub fn parse(source: &str) -> ParseResult<Program> {
        let mut parser = Parser::new(source)?;
        parser.parse_program()
    }

    // === Token Access ===

    fn current(&self) -> &SpannedToken {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.current().token
    }

    fn peek_nth(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)].token
    }

    fn peek_span(&self) -> Span {
        self.current().span
    }

    /// Span of the most recently consumed token
    fn prev_span(&self) -> Span {
        if self.pos == 0 {
            self.peek_span()
        } else {
            self.tokens[(self.pos - 1).min(self.tokens.len() - 1)].span
        }
    }

    fn advance(&mut self) -> &SpannedToken {
        let idx = self.pos.min(self.tokens.len() - 1);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        &self.tokens[idx]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> ParseResult<SpannedToken> {
        if self.check(&expected) {
            Ok(self.advance().clone())
        } else {
            Err(ParseError {
                message: format!("expected '{}', found '{}'", expected, self.peek()),
                span: self.peek_span(),
            })
        }
    }

    fn expect_ident(&mut self) -> ParseResult<Ident> {
        match self.peek().clone() {
            Token::Ident(name) => {
                let span = self.peek_span();
                self.advance();
                Ok(Ident::new(name, span))
            }
            _ => Err(ParseError {
                message: format!("expected identifier, found '{}'", self.peek()),
                span: self.peek_span(),
            }),
        }
    }

    // === Declarations ===

    fn parse_program(&mut self) -> ParseResult<Program> {
        let mut decls = Vec::new();

        while !self.is_at_end() {
            decls.push(self.parse_declaration()?);
        }

        Ok(Program { decls })
    }

    /// Parse `int` plus at most one storage class, in any order
    fn parse_specifiers(&mut self) -> ParseResult<Option<StorageClass>> {
        let start = self.peek_span();
        let mut saw_int = false;
        let mut storage = None;

        loop {
            let class = match self.peek() {
                Token::Int if saw_int => {
                    return Err(ParseError {
                        message: "duplicate 'int' specifier".to_string(),
                        span: self.peek_span(),
                    });
                }
                Token::Int => {
                    saw_int = true;
                    self.advance();
                    continue;
                }
                Token::Static => StorageClass::Static,
                Token::Extern => StorageClass::Extern,
                _ => break,
            };
            if storage.is_some() {
                return Err(ParseError {
                    message: format!("conflicting storage class '{}'", class),
                    span: self.peek_span(),
                });
            }
            storage = Some(class);
            self.advance();
        }

        if !saw_int {
            return Err(ParseError {
                message: format!("expected type specifier 'int', found '{}'", self.peek()),
                span: start,
            });
        }

        Ok(storage)
    }

    fn parse_declaration(&mut self) -> ParseResult<Declaration> {
        let start = self.peek_span();
        let storage = self.parse_specifiers()?;
        let name = self.expect_ident()?;

        if self.check(&Token::LParen) {
            self.advance();
            let params = self.parse_param_list()?;
            self.expect(Token::RParen)?;

            let body = if self.check(&Token::LBrace) {
                Some(self.parse_block()?)
            } else {
                self.expect(Token::Semi)?;
                None
            };

            let span = Span::new(start.start, self.prev_span().end);
            return Ok(Declaration::Function(FunctionDecl { name, params, body, storage, span }));
        }

        let init = if self.eat(&Token::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let end = self.expect(Token::Semi)?;

        let span = Span::new(start.start, end.span.end);
        Ok(Declaration::Variable(VarDecl { name, init, storage, span }))
    }

    /// `void`, `()`, or `int a, int b, ...`
    fn parse_param_list(&mut self) -> ParseResult<Vec<Ident>> {
        if self.check(&Token::Void) && matches!(self.peek_nth(1), Token::RParen) {
            self.advance();
            return Ok(Vec::new());
        }

        let mut params = Vec::new();
        if self.check(&Token::RParen) {
            return Ok(params);
        }

        // Every comma must be followed by another parameter
        loop {
            self.expect(Token::Int)?;
            params.push(self.expect_ident()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        Ok(params)
    }

    // === Statements ===

    fn parse_block(&mut self) -> ParseResult<Block> {
        let start = self.peek_span();
        self.expect(Token::LBrace)?;

        let mut items = Vec::new();

        while !self.check(&Token::RBrace) && !self.is_at_end() {
            items.push(self.parse_block_item()?);
        }

        let end = self.expect(Token::RBrace)?;
        let span = Span::new(start.start, end.span.end);

        Ok(Block { items, span })
    }

    fn parse_block_item(&mut self) -> ParseResult<BlockItem> {
        if self.peek().starts_declaration() {
            self.parse_declaration().map(BlockItem::Decl)
        } else {
            self.parse_stmt().map(BlockItem::Stmt)
        }
    }

    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        let start = self.peek_span();

        let kind = match self.peek().clone() {
            Token::Return => {
                self.advance();
                let value = self.parse_expr()?;
                self.expect(Token::Semi)?;
                StmtKind::Return(value)
            }
            Token::Semi => {
                self.advance();
                StmtKind::Null
            }
            Token::LBrace => StmtKind::Compound(self.parse_block()?),
            Token::If => {
                self.advance();
                let cond = self.parse_paren_expr()?;
                let then = self.parse_stmt()?;
                let otherwise = if self.eat(&Token::Else) {
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                StmtKind::If(cond, Box::new(then), otherwise)
            }
            Token::While => {
                self.advance();
                let cond = self.parse_paren_expr()?;
                let body = self.parse_stmt()?;
                StmtKind::While(cond, Box::new(body))
            }
            Token::Do => {
                self.advance();
                let body = self.parse_stmt()?;
                self.expect(Token::While)?;
                let cond = self.parse_paren_expr()?;
                self.expect(Token::Semi)?;
                StmtKind::DoWhile(Box::new(body), cond)
            }
            Token::For => return self.parse_for_stmt(),
            Token::Break => {
                self.advance();
                self.expect(Token::Semi)?;
                StmtKind::Break
            }
            Token::Continue => {
                self.advance();
                self.expect(Token::Semi)?;
                StmtKind::Continue
            }
            Token::Switch => {
                self.advance();
                let scrutinee = self.parse_paren_expr()?;
                let body = self.parse_stmt()?;
                StmtKind::Switch(scrutinee, Box::new(body))
            }
            Token::Case => {
                self.advance();
                let value = self.parse_expr()?;
                self.expect(Token::Colon)?;
                StmtKind::Case(value, Box::new(self.parse_label_body()?))
            }
            Token::Default => {
                self.advance();
                self.expect(Token::Colon)?;
                StmtKind::Default(Box::new(self.parse_label_body()?))
            }
            Token::Goto => {
                self.advance();
                let label = self.expect_ident()?;
                self.expect(Token::Semi)?;
                StmtKind::Goto(label)
            }
            Token::Ident(_) if matches!(self.peek_nth(1), Token::Colon) => {
                let label = self.expect_ident()?;
                self.advance();
                StmtKind::Labeled(label, Box::new(self.parse_label_body()?))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(Token::Semi)?;
                StmtKind::Expr(expr)
            }
        };

        let span = Span::new(start.start, self.prev_span().end);
        Ok(Stmt { kind, span })
    }

    /// The statement a label governs. A label directly before a declaration
    /// or a closing brace governs an empty statement; the declaration itself
    /// stays an ordinary item of the enclosing block.
    fn parse_label_body(&mut self) -> ParseResult<Stmt> {
        if self.peek().starts_declaration() || self.check(&Token::RBrace) {
            let at = self.prev_span().end;
            return Ok(Stmt { kind: StmtKind::Null, span: Span::new(at, at) });
        }
        self.parse_stmt()
    }

    fn parse_for_stmt(&mut self) -> ParseResult<Stmt> {
        let start = self.peek_span();
        self.expect(Token::For)?;
        self.expect(Token::LParen)?;

        let init = if self.peek().starts_declaration() {
            match self.parse_declaration()? {
                Declaration::Variable(v) if v.storage.is_none() => ForInit::Decl(v),
                Declaration::Variable(v) => {
                    return Err(ParseError {
                        message: "storage class not allowed in for loop initializer".to_string(),
                        span: v.span,
                    });
                }
                Declaration::Function(f) => {
                    return Err(ParseError {
                        message: format!("function '{}' declared in for loop initializer", f.name.name),
                        span: f.span,
                    });
                }
            }
        } else {
            let expr = self.parse_optional_expr(&Token::Semi)?;
            self.expect(Token::Semi)?;
            ForInit::Expr(expr)
        };

        let cond = self.parse_optional_expr(&Token::Semi)?;
        self.expect(Token::Semi)?;
        let post = self.parse_optional_expr(&Token::RParen)?;
        self.expect(Token::RParen)?;

        let body = self.parse_stmt()?;
        let span = Span::new(start.start, body.span.end);

        Ok(Stmt {
            kind: StmtKind::For(init, cond, post, Box::new(body)),
            span,
        })
    }

    fn parse_optional_expr(&mut self, terminator: &Token) -> ParseResult<Option<Expr>> {
        if self.check(terminator) {
            Ok(None)
        } else {
            self.parse_expr().map(Some)
        }
    }

    fn parse_paren_expr(&mut self) -> ParseResult<Expr> {
        self.expect(Token::LParen)?;
        let expr = self.parse_expr()?;
        self.expect(Token::RParen)?;
        Ok(expr)
    }

    // === Expression Parsing (Pratt Parser) ===

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_conditional()?;

        if self.check(&Token::Eq) {
            self.advance();
            let rhs = self.parse_assignment()?;
            let span = Span::new(expr.span.start, rhs.span.end);
            return Ok(Expr {
                kind: ExprKind::Assign(Box::new(expr), Box::new(rhs)),
                span,
            });
        }

        if let Some(op) = self.peek_compound_assign() {
            self.advance();
            let rhs = self.parse_assignment()?;
            let span = Span::new(expr.span.start, rhs.span.end);
            return Ok(Expr {
                kind: ExprKind::CompoundAssign(op, Box::new(expr), Box::new(rhs)),
                span,
            });
        }

        Ok(expr)
    }

    fn peek_compound_assign(&self) -> Option<BinOp> {
        match self.peek() {
            Token::PlusEq => Some(BinOp::Add),
            Token::MinusEq => Some(BinOp::Sub),
            Token::StarEq => Some(BinOp::Mul),
            Token::SlashEq => Some(BinOp::Div),
            Token::PercentEq => Some(BinOp::Mod),
            Token::AmpEq => Some(BinOp::BitAnd),
            Token::PipeEq => Some(BinOp::BitOr),
            Token::CaretEq => Some(BinOp::BitXor),
            Token::ShlEq => Some(BinOp::Shl),
            Token::ShrEq => Some(BinOp::Shr),
            _ => None,
        }
    }

    fn parse_conditional(&mut self) -> ParseResult<Expr> {
        let cond = self.parse_binary(0)?;

        if !self.eat(&Token::Question) {
            return Ok(cond);
        }

        let then = self.parse_expr()?;
        self.expect(Token::Colon)?;
        let otherwise = self.parse_conditional()?;
        let span = Span::new(cond.span.start, otherwise.span.end);

        Ok(Expr {
            kind: ExprKind::Conditional(Box::new(cond), Box::new(then), Box::new(otherwise)),
            span,
        })
    }

    fn parse_binary(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;

        while let Some(op) = self.peek_binop() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }

            self.advance(); // consume operator
            let right = self.parse_binary(prec + 1)?;

            let span = Span::new(left.span.start, right.span.end);
            left = Expr {
                kind: ExprKind::Binary(Box::new(left), op, Box::new(right)),
                span,
            };
        }

        Ok(left)
    }

    fn peek_binop(&self) -> Option<BinOp> {
        match self.peek() {
            Token::Plus => Some(BinOp::Add),
            Token::Minus => Some(BinOp::Sub),
            Token::Star => Some(BinOp::Mul),
            Token::Slash => Some(BinOp::Div),
            Token::Percent => Some(BinOp::Mod),
            Token::Amp => Some(BinOp::BitAnd),
            Token::Pipe => Some(BinOp::BitOr),
            Token::Caret => Some(BinOp::BitXor),
            Token::Shl => Some(BinOp::Shl),
            Token::Shr => Some(BinOp::Shr),
            Token::EqEq => Some(BinOp::Eq),
            Token::NotEq => Some(BinOp::NotEq),
            Token::Lt => Some(BinOp::Lt),
            Token::Gt => Some(BinOp::Gt),
            Token::LtEq => Some(BinOp::LtEq),
            Token::GtEq => Some(BinOp::GtEq),
            Token::AndAnd => Some(BinOp::And),
            Token::OrOr => Some(BinOp::Or),
            _ => None,
        }
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let start = self.peek_span();

        let unary = match self.peek() {
            Token::Minus => Some(UnaryOp::Neg),
            Token::Tilde => Some(UnaryOp::Complement),
            Token::Bang => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = unary {
            self.advance();
            let expr = self.parse_unary()?;
            let span = Span::new(start.start, expr.span.end);
            return Ok(Expr {
                kind: ExprKind::Unary(op, Box::new(expr)),
                span,
            });
        }

        let update = match self.peek() {
            Token::PlusPlus => Some(UpdateOp::Increment),
            Token::MinusMinus => Some(UpdateOp::Decrement),
            _ => None,
        };
        if let Some(op) = update {
            self.advance();
            let expr = self.parse_unary()?;
            let span = Span::new(start.start, expr.span.end);
            return Ok(Expr {
                kind: ExprKind::Prefix(op, Box::new(expr)),
                span,
            });
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            let op = match self.peek() {
                Token::PlusPlus => UpdateOp::Increment,
                Token::MinusMinus => UpdateOp::Decrement,
                _ => break,
            };
            let end = self.advance().span;
            let span = Span::new(expr.span.start, end.end);
            expr = Expr {
                kind: ExprKind::Postfix(op, Box::new(expr)),
                span,
            };
        }

        Ok(expr)
    }

    fn parse_arg_list(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();

        while !self.check(&Token::RParen) && !self.is_at_end() {
            args.push(self.parse_expr()?);

            if !self.check(&Token::RParen) {
                self.expect(Token::Comma)?;
            }
        }

        Ok(args)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let start = self.peek_span();

        match self.peek().clone() {
            Token::Constant(n) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Constant(n),
                    span: start,
                })
            }
            Token::Ident(name) => {
                self.advance();
                let ident = Ident::new(name, start);

                if self.check(&Token::LParen) {
                    self.advance();
                    let args = self.parse_arg_list()?;
                    let end = self.expect(Token::RParen)?;
                    let span = Span::new(start.start, end.span.end);
                    return Ok(Expr {
                        kind: ExprKind::Call(ident, args),
                        span,
                    });
                }

                Ok(Expr {
                    kind: ExprKind::Var(ident),
                    span: start,
                })
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                let end = self.expect(Token::RParen)?;
                Ok(Expr {
                    kind: inner.kind,
                    span: Span::new(start.start, end.span.end),
                })
            }
            _ => Err(ParseError {
                message: format!("expected expression, found '{}'", self.peek()),
                span: start,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn main_body(source: &str) -> Vec<BlockItem> {
        let program = Parser::parse(source).unwrap();
        match program.decls.into_iter().next() {
            Some(Declaration::Function(FunctionDecl { body: Some(body), .. })) => body.items,
            other => panic!("expected a function definition, got {:?}", other),
        }
    }

    fn expr_of(source: &str) -> Expr {
        let items = main_body(&format!("int main(void) {{ return {}; }}", source));
        match items.into_iter().next() {
            Some(BlockItem::Stmt(Stmt { kind: StmtKind::Return(e), .. })) => e,
            other => panic!("expected return, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_fn() {
        let source = "int main(void) { int x = 5; return x; }";
        let ast = Parser::parse(source).unwrap();
        assert_eq!(ast.decls.len(), 1);
        assert_eq!(main_body(source).len(), 2);
    }

    #[test]
    fn test_parse_function_declarations_and_params() {
        let source = "int foo(int a, int b); static int bar(void); extern int g; int main() { return 0; }";
        let ast = Parser::parse(source).unwrap();
        assert_eq!(ast.decls.len(), 4);
        match &ast.decls[0] {
            Declaration::Function(f) => {
                assert_eq!(f.name.name, "foo");
                let names: Vec<_> = f.params.iter().map(|p| p.name.as_str()).collect();
                assert_eq!(names, vec!["a", "b"]);
                assert!(f.body.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(&ast.decls[1], Declaration::Function(f) if f.storage == Some(StorageClass::Static)));
        assert!(matches!(&ast.decls[2], Declaration::Variable(v) if v.storage == Some(StorageClass::Extern)));
    }

    #[test]
    fn test_trailing_comma_in_parameters_rejected() {
        let source = "int f(int a,) { return a; }";
        let err = Parser::parse(source).unwrap_err();
        assert_eq!(err.message, "expected 'int', found ')'");
        assert_eq!(err.span.start, source.find(')').unwrap());
    }

    #[test]
    fn test_storage_class_after_type() {
        let ast = Parser::parse("int static counter = 3;").unwrap();
        assert!(matches!(&ast.decls[0], Declaration::Variable(v) if v.storage == Some(StorageClass::Static)));
    }

    #[test]
    fn test_conflicting_storage_classes_rejected() {
        let err = Parser::parse("static extern int x;").unwrap_err();
        assert!(err.message.contains("conflicting storage class"));
    }

    #[test]
    fn test_precedence() {
        assert_eq!(expr_of("1 + 2 * 3").pretty_print(), "(1 + (2 * 3))");
        assert_eq!(expr_of("1 << 2 + 3 & 4").pretty_print(), "((1 << (2 + 3)) & 4)");
        assert_eq!(expr_of("a || b && c == d").pretty_print(), "(a || (b && (c == d)))");
        assert_eq!(expr_of("10 - 3 - 2").pretty_print(), "((10 - 3) - 2)");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(expr_of("a = b += 3").pretty_print(), "a = b += 3");
        match expr_of("a = b = 1").kind {
            ExprKind::Assign(lhs, rhs) => {
                assert!(matches!(lhs.kind, ExprKind::Var(_)));
                assert!(matches!(rhs.kind, ExprKind::Assign(..)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_conditional_and_updates() {
        assert_eq!(expr_of("a ? b : c ? d : e").pretty_print(), "(a ? b : (c ? d : e))");
        assert_eq!(expr_of("-a++").pretty_print(), "-(a++)");
        assert_eq!(expr_of("--a").pretty_print(), "--a");
        assert_eq!(expr_of("f(1, x + 1)").pretty_print(), "f(1, (x + 1))");
    }

    #[test]
    fn test_case_label_before_declaration() {
        let items = main_body("int main(void) { switch (x) { int b = 1; case 0: int b = 2; } return 0; }");
        let body = match &items[0] {
            BlockItem::Stmt(Stmt { kind: StmtKind::Switch(_, body), .. }) => body,
            other => panic!("unexpected {:?}", other),
        };
        let block = match &body.kind {
            StmtKind::Compound(block) => block,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(block.items.len(), 3);
        assert!(matches!(&block.items[0], BlockItem::Decl(_)));
        assert!(matches!(
            &block.items[1],
            BlockItem::Stmt(Stmt { kind: StmtKind::Case(_, inner), .. }) if inner.kind == StmtKind::Null
        ));
        assert!(matches!(&block.items[2], BlockItem::Decl(_)));
    }

    #[test]
    fn test_labels_and_goto() {
        let items = main_body("int main(void) { goto end; end: return 1; }");
        assert!(matches!(&items[0], BlockItem::Stmt(Stmt { kind: StmtKind::Goto(l), .. }) if l.name == "end"));
        assert!(matches!(&items[1], BlockItem::Stmt(Stmt { kind: StmtKind::Labeled(l, _), .. }) if l.name == "end"));
    }

    #[test]
    fn test_for_loop_forms() {
        let items = main_body("int main(void) { for (int i = 0; i < 3; i++) ; for (;;) break; return 0; }");
        assert!(matches!(
            &items[0],
            BlockItem::Stmt(Stmt { kind: StmtKind::For(ForInit::Decl(_), Some(_), Some(_), _), .. })
        ));
        assert!(matches!(
            &items[1],
            BlockItem::Stmt(Stmt { kind: StmtKind::For(ForInit::Expr(None), None, None, _), .. })
        ));
    }

    #[test]
    fn test_for_loop_rejects_storage_class() {
        let err = Parser::parse("int main(void) { for (static int i = 0;;) ; }").unwrap_err();
        assert!(err.message.contains("storage class"));
    }

    #[test]
    fn test_spans_cover_declarations() {
        let source = "int main(void) { int abc = 1; return abc; }";
        let items = main_body(source);
        match &items[0] {
            BlockItem::Decl(Declaration::Variable(v)) => {
                assert_eq!(&source[v.span.start..v.span.end], "int abc = 1;");
                assert_eq!(&source[v.name.span.start..v.name.span.end], "abc");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_semicolon() {
        let err = Parser::parse("int main(void) { return 1 }").unwrap_err();
        assert_eq!(err.message, "expected ';', found '}'");
    }
}
