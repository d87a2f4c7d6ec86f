//! Recursive-descent parser for placement programs.

use super::ast::*;
use super::lexer::{tokenize, tokenize_from_line, Spanned, TemplatePiece, Token};
use crate::error::{Result, SceneError};
use std::rc::Rc;

/// Deepest statement or expression nesting accepted. Evaluation recurses
/// along the syntax tree, so this also bounds the evaluator's stack use.
pub const MAX_NESTING: usize = 256;

/// Parse a complete program.
pub fn parse_program(source: &str) -> Result<Vec<Stmt>> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let mut statements = Vec::new();
    while !parser.at_eof() {
        statements.push(parser.statement()?);
    }
    Ok(statements)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// One level deeper, failing past [`MAX_NESTING`].
    fn deepen(&mut self) -> Result<()> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("program nests deeper than {} levels", MAX_NESTING)));
        }
        self.depth += 1;
        Ok(())
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.deepen()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn peek(&self) -> &Token {
        self.peek_n(0)
    }

    fn peek_n(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> SceneError {
        SceneError::Parse {
            line: self.line(),
            message: message.into(),
        }
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Token::Punct(q) if *q == p)
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Token::Ident(name) if name == kw)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.is_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}', found {}", p, describe(self.peek()))))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek().clone() {
            Token::Ident(name) if !is_reserved(&name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected identifier, found {}", describe(&other)))),
        }
    }

    // ----- statements -----

    fn statement(&mut self) -> Result<Stmt> {
        self.nested(Self::statement_inner)
    }

    fn statement_inner(&mut self) -> Result<Stmt> {
        if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        }
        if self.is_punct("{") {
            return Ok(Stmt::Block(self.block()?));
        }

        let keyword = match self.peek() {
            Token::Ident(name) => name.clone(),
            _ => String::new(),
        };

        match keyword.as_str() {
            "let" | "const" | "var" => {
                let stmt = self.declaration()?;
                self.eat_punct(";");
                Ok(stmt)
            }
            "function" => {
                self.advance();
                let def = self.function_rest(true)?;
                Ok(Stmt::Function(def))
            }
            "if" => self.if_statement(),
            "for" => self.for_statement(),
            "while" => {
                self.advance();
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                let body = self.statement()?;
                Ok(Stmt::While(test, Box::new(body)))
            }
            "do" => {
                self.advance();
                let body = self.statement()?;
                if !self.eat_keyword("while") {
                    return Err(self.error("expected 'while' after do body"));
                }
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                self.eat_punct(";");
                Ok(Stmt::DoWhile(Box::new(body), test))
            }
            "return" => {
                self.advance();
                let value = if self.is_punct(";") || self.is_punct("}") || self.at_eof() {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.eat_punct(";");
                Ok(Stmt::Return(value))
            }
            "break" => {
                self.advance();
                self.eat_punct(";");
                Ok(Stmt::Break)
            }
            "continue" => {
                self.advance();
                self.eat_punct(";");
                Ok(Stmt::Continue)
            }
            _ => {
                let expr = self.expression()?;
                self.eat_punct(";");
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>> {
        self.expect_punct("{")?;
        let mut statements = Vec::new();
        while !self.is_punct("}") {
            if self.at_eof() {
                return Err(self.error("unterminated block"));
            }
            statements.push(self.statement()?);
        }
        self.advance();
        Ok(statements)
    }

    fn decl_kind(&mut self) -> Option<DeclKind> {
        let kind = match self.peek() {
            Token::Ident(name) if name == "let" => DeclKind::Let,
            Token::Ident(name) if name == "const" => DeclKind::Const,
            Token::Ident(name) if name == "var" => DeclKind::Var,
            _ => return None,
        };
        self.advance();
        Some(kind)
    }

    fn declaration(&mut self) -> Result<Stmt> {
        let kind = self
            .decl_kind()
            .ok_or_else(|| self.error("expected declaration"))?;
        let mut bindings = Vec::new();
        loop {
            let name = self.expect_ident()?;
            let init = if self.eat_punct("=") {
                Some(self.assignment()?)
            } else {
                None
            };
            bindings.push((name, init));
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(Stmt::Declare(kind, bindings))
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.advance();
        self.expect_punct("(")?;
        let test = self.expression()?;
        self.expect_punct(")")?;
        let then = self.statement()?;
        let otherwise = if self.eat_keyword("else") {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If(test, Box::new(then), otherwise))
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        self.advance();
        self.expect_punct("(")?;

        // for (const name of iterable)
        let is_decl = matches!(self.peek(), Token::Ident(k) if k == "let" || k == "const" || k == "var");
        let is_for_of = is_decl
            && matches!(self.peek_n(1), Token::Ident(_))
            && matches!(self.peek_n(2), Token::Ident(k) if k == "of");
        if is_for_of {
            let kind = self.decl_kind().unwrap_or(DeclKind::Let);
            let name = self.expect_ident()?;
            self.advance();
            let iterable = self.expression()?;
            self.expect_punct(")")?;
            let body = self.statement()?;
            return Ok(Stmt::ForOf {
                kind,
                name,
                iterable,
                body: Box::new(body),
            });
        }

        let init = if self.is_punct(";") {
            None
        } else if is_decl {
            Some(Box::new(self.declaration()?))
        } else {
            Some(Box::new(Stmt::Expr(self.expression()?)))
        };
        self.expect_punct(";")?;

        let test = if self.is_punct(";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(";")?;

        let update = if self.is_punct(")") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(")")?;

        let body = self.statement()?;
        Ok(Stmt::For {
            init,
            test,
            update,
            body: Box::new(body),
        })
    }

    /// After the `function` keyword: optional name, params, block body.
    fn function_rest(&mut self, require_name: bool) -> Result<Rc<FunctionDef>> {
        let name = if require_name {
            Some(self.expect_ident()?)
        } else if matches!(self.peek(), Token::Ident(_)) {
            Some(self.expect_ident()?)
        } else {
            None
        };

        self.expect_punct("(")?;
        let params = self.param_list()?;
        let body = FunctionBody::Block(self.block()?);
        Ok(Rc::new(FunctionDef { name, params, body }))
    }

    /// Parameter names up to and including the closing `)`.
    fn param_list(&mut self) -> Result<Vec<String>> {
        let mut params = Vec::new();
        if self.eat_punct(")") {
            return Ok(params);
        }
        loop {
            params.push(self.expect_ident()?);
            if self.eat_punct(")") {
                return Ok(params);
            }
            self.expect_punct(",")?;
        }
    }

    // ----- expressions -----

    fn expression(&mut self) -> Result<Expr> {
        let first = self.assignment()?;
        if !self.is_punct(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_punct(",") {
            items.push(self.assignment()?);
        }
        Ok(Expr::Sequence(items))
    }

    fn arrow_ahead(&self) -> bool {
        match self.peek() {
            Token::Ident(name) if !is_reserved(name) => matches!(self.peek_n(1), Token::Punct("=>")),
            Token::Punct("(") => {
                let mut n = 1;
                loop {
                    match self.peek_n(n) {
                        Token::Punct(")") => return matches!(self.peek_n(n + 1), Token::Punct("=>")),
                        Token::Ident(_) | Token::Punct(",") => n += 1,
                        _ => return false,
                    }
                }
            }
            _ => false,
        }
    }

    fn arrow(&mut self) -> Result<Expr> {
        let params = if self.eat_punct("(") {
            self.param_list()?
        } else {
            vec![self.expect_ident()?]
        };
        self.expect_punct("=>")?;
        let body = if self.is_punct("{") {
            FunctionBody::Block(self.block()?)
        } else {
            FunctionBody::Expr(self.assignment()?)
        };
        Ok(Expr::Function(Rc::new(FunctionDef {
            name: None,
            params,
            body,
        })))
    }

    fn assignment(&mut self) -> Result<Expr> {
        self.nested(Self::assignment_inner)
    }

    fn assignment_inner(&mut self) -> Result<Expr> {
        if self.arrow_ahead() {
            return self.arrow();
        }

        let target = self.conditional()?;

        let op = match self.peek() {
            Token::Punct("=") => None,
            Token::Punct("+=") => Some(BinaryOp::Add),
            Token::Punct("-=") => Some(BinaryOp::Sub),
            Token::Punct("*=") => Some(BinaryOp::Mul),
            Token::Punct("/=") => Some(BinaryOp::Div),
            Token::Punct("%=") => Some(BinaryOp::Rem),
            Token::Punct("**=") => Some(BinaryOp::Pow),
            Token::Punct("<<=") => Some(BinaryOp::Shl),
            Token::Punct(">>=") => Some(BinaryOp::Shr),
            _ => return Ok(target),
        };

        if !matches!(target, Expr::Ident(_) | Expr::Member(..) | Expr::Index(..)) {
            return Err(self.error("invalid assignment target"));
        }
        self.advance();
        let value = self.assignment()?;
        Ok(Expr::Assign(op, Box::new(target), Box::new(value)))
    }

    fn conditional(&mut self) -> Result<Expr> {
        let test = self.logical_or()?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let then = self.assignment()?;
        self.expect_punct(":")?;
        let otherwise = self.assignment()?;
        Ok(Expr::Conditional(Box::new(test), Box::new(then), Box::new(otherwise)))
    }

    // Operator chains build left-deep trees, so each link counts as a level.

    fn logical_or(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut lhs = self.logical_and()?;
        loop {
            let op = if self.eat_punct("||") {
                LogicalOp::Or
            } else if self.eat_punct("??") {
                LogicalOp::Nullish
            } else {
                self.depth = base;
                return Ok(lhs);
            };
            self.deepen()?;
            let rhs = self.logical_and()?;
            lhs = Expr::Logical(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn logical_and(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut lhs = self.binary(0)?;
        while self.eat_punct("&&") {
            self.deepen()?;
            let rhs = self.binary(0)?;
            lhs = Expr::Logical(LogicalOp::And, Box::new(lhs), Box::new(rhs));
        }
        self.depth = base;
        Ok(lhs)
    }

    /// Left-associative binary levels, loosest first.
    fn binary(&mut self, level: usize) -> Result<Expr> {
        const LEVELS: &[&[(&str, BinaryOp)]] = &[
            &[("|", BinaryOp::BitOr)],
            &[("^", BinaryOp::BitXor)],
            &[("&", BinaryOp::BitAnd)],
            &[
                ("===", BinaryOp::StrictEq),
                ("!==", BinaryOp::StrictNotEq),
                ("==", BinaryOp::Eq),
                ("!=", BinaryOp::NotEq),
            ],
            &[
                ("<=", BinaryOp::LtEq),
                (">=", BinaryOp::GtEq),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            &[("<<", BinaryOp::Shl), (">>", BinaryOp::Shr)],
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
        ];

        if level == LEVELS.len() {
            return self.exponent();
        }

        let base = self.depth;
        let mut lhs = self.binary(level + 1)?;
        'outer: loop {
            for (punct, op) in LEVELS[level] {
                if self.eat_punct(punct) {
                    self.deepen()?;
                    let rhs = self.binary(level + 1)?;
                    lhs = Expr::Binary(*op, Box::new(lhs), Box::new(rhs));
                    continue 'outer;
                }
            }
            self.depth = base;
            return Ok(lhs);
        }
    }

    fn exponent(&mut self) -> Result<Expr> {
        let base = self.unary()?;
        if self.eat_punct("**") {
            let power = self.nested(Self::exponent)?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(power)));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Token::Punct("-") => Some(UnaryOp::Neg),
            Token::Punct("+") => Some(UnaryOp::Plus),
            Token::Punct("!") => Some(UnaryOp::Not),
            Token::Punct("~") => Some(UnaryOp::BitNot),
            Token::Ident(name) if name == "typeof" => Some(UnaryOp::TypeOf),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.nested(Self::unary)?;
            return Ok(Expr::Unary(op, Box::new(operand)));
        }

        for (punct, delta) in [("++", 1.0), ("--", -1.0)] {
            if self.eat_punct(punct) {
                let target = self.nested(Self::unary)?;
                return Ok(Expr::Update {
                    delta,
                    prefix: true,
                    target: Box::new(target),
                });
            }
        }

        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr> {
        let expr = self.call_member()?;
        for (punct, delta) in [("++", 1.0), ("--", -1.0)] {
            if self.eat_punct(punct) {
                return Ok(Expr::Update {
                    delta,
                    prefix: false,
                    target: Box::new(expr),
                });
            }
        }
        Ok(expr)
    }

    fn call_member(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut expr = self.primary()?;
        loop {
            if self.is_punct(".") || self.is_punct("?.") || self.is_punct("[") || self.is_punct("(") {
                self.deepen()?;
            }
            if self.eat_punct(".") || self.eat_punct("?.") {
                let name = match self.advance() {
                    Token::Ident(name) => name,
                    other => return Err(self.error(format!("expected property name, found {}", describe(&other)))),
                };
                expr = Expr::Member(Box::new(expr), name);
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.eat_punct("(") {
                let args = self.arguments()?;
                expr = Expr::Call(Box::new(expr), args);
            } else {
                self.depth = base;
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.eat_punct(")") {
            args.push(self.assignment()?);
            if !self.is_punct(")") {
                self.expect_punct(",")?;
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr> {
        let line = self.line();
        match self.advance() {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Template(pieces) => {
                let mut parts = Vec::with_capacity(pieces.len());
                for piece in pieces {
                    match piece {
                        TemplatePiece::Text(text) => parts.push(TemplatePart::Text(text)),
                        TemplatePiece::Code(code, line) => {
                            let mut sub = Parser::new(tokenize_from_line(&code, line)?);
                            sub.depth = self.depth;
                            let expr = sub.nested(Self::expression)?;
                            if !sub.at_eof() {
                                return Err(sub.error("unexpected tokens in template substitution"));
                            }
                            parts.push(TemplatePart::Expr(expr));
                        }
                    }
                }
                Ok(Expr::Template(parts))
            }
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                "undefined" => Ok(Expr::Undefined),
                "function" => Ok(Expr::Function(self.function_rest(false)?)),
                _ if is_reserved(&name) => Err(SceneError::Parse {
                    line,
                    message: format!("unsupported keyword '{}'", name),
                }),
                _ => Ok(Expr::Ident(name)),
            },
            Token::Punct("(") => self.nested(|parser| {
                let expr = parser.expression()?;
                parser.expect_punct(")")?;
                Ok(expr)
            }),
            Token::Punct("[") => self.nested(|parser| {
                let mut items = Vec::new();
                while !parser.eat_punct("]") {
                    items.push(parser.assignment()?);
                    if !parser.is_punct("]") {
                        parser.expect_punct(",")?;
                    }
                }
                Ok(Expr::Array(items))
            }),
            other => Err(SceneError::Parse {
                line,
                message: format!("unexpected {}", describe(&other)),
            }),
        }
    }
}

fn is_reserved(name: &str) -> bool {
    matches!(
        name,
        "let" | "const" | "var" | "function" | "if" | "else" | "for" | "while" | "do"
            | "return" | "break" | "continue" | "true" | "false" | "null" | "undefined"
            | "typeof" | "new" | "class" | "import" | "export" | "this" | "async" | "await"
            | "eval" | "with" | "delete" | "in" | "yield"
    )
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {}", n),
        Token::Str(_) | Token::Template(_) => "string".to_string(),
        Token::Ident(name) => format!("'{}'", name),
        Token::Punct(p) => format!("'{}'", p),
        Token::Eof => "end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let program = parse_program("x = 1 + 2 * 3;").unwrap();
        let Stmt::Expr(Expr::Assign(None, _, value)) = &program[0] else {
            panic!("expected assignment");
        };
        assert_eq!(
            **value,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Number(1.0)),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Number(2.0)),
                    Box::new(Expr::Number(3.0))
                ))
            )
        );
    }

    #[test]
    fn test_for_loop_and_function() {
        let program = parse_program(
            "function build() {\n  for (let x = 0; x < 3; x++) { place(x, 0, 0, 'stone'); }\n}\n",
        )
        .unwrap();
        assert_eq!(program.len(), 1);
        let Stmt::Function(def) = &program[0] else {
            panic!("expected function");
        };
        assert_eq!(def.name.as_deref(), Some("build"));
        let FunctionBody::Block(body) = &def.body else {
            panic!("expected block body");
        };
        assert!(matches!(body[0], Stmt::For { .. }));
    }

    #[test]
    fn test_for_of() {
        let program = parse_program("for (const c of colors) place(0, 0, 0, c);").unwrap();
        assert!(matches!(&program[0], Stmt::ForOf { name, .. } if name == "c"));
    }

    #[test]
    fn test_arrow_functions() {
        let program = parse_program("const f = (a, b) => a + b; const g = x => { return x; }; const h = () => 1;").unwrap();
        assert_eq!(program.len(), 3);
        for stmt in &program {
            let Stmt::Declare(DeclKind::Const, bindings) = stmt else {
                panic!("expected const");
            };
            assert!(matches!(bindings[0].1, Some(Expr::Function(_))));
        }
    }

    #[test]
    fn test_parenthesized_expression_is_not_arrow() {
        let program = parse_program("y = (a + b) * 2;").unwrap();
        assert!(matches!(&program[0], Stmt::Expr(Expr::Assign(None, _, v)) if matches!(**v, Expr::Binary(BinaryOp::Mul, _, _))));
    }

    #[test]
    fn test_optional_semicolons() {
        let program = parse_program("let a = 1\nlet b = 2\nplace(a, b, 0, 'dirt')").unwrap();
        assert_eq!(program.len(), 3);
    }

    #[test]
    fn test_template_substitution() {
        let program = parse_program("place(0, 0, 0, `${c}_wool`);").unwrap();
        let Stmt::Expr(Expr::Call(_, args)) = &program[0] else {
            panic!("expected call");
        };
        assert_eq!(
            args[3],
            Expr::Template(vec![
                TemplatePart::Expr(Expr::Ident("c".into())),
                TemplatePart::Text("_wool".into())
            ])
        );
    }

    #[test]
    fn test_parse_errors_report_line() {
        let err = parse_program("let a = 1;\nlet = 2;").unwrap_err();
        assert!(matches!(err, SceneError::Parse { line: 2, .. }));
        assert!(parse_program("new Foo();").is_err());
        assert!(parse_program("1 = 2;").is_err());
        assert!(parse_program("{ unterminated").is_err());
    }

    fn nesting_error(source: &str) -> bool {
        matches!(
            parse_program(source),
            Err(SceneError::Parse { message, .. }) if message.contains("nests deeper")
        )
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let parens = format!("x = {}1{};", "(".repeat(5000), ")".repeat(5000));
        assert!(nesting_error(&parens));

        let blocks = format!("{}{}", "{".repeat(5000), "}".repeat(5000));
        assert!(nesting_error(&blocks));

        assert!(nesting_error(&format!("x = {}1;", "-".repeat(5000))));
        assert!(nesting_error(&format!("x = {}[];", "[".repeat(5000))));
        assert!(nesting_error(&format!("x = 1{};", " + 1".repeat(5000))));
        assert!(nesting_error(&format!("x = a{};", ".b".repeat(5000))));
        assert!(nesting_error(&format!("x = {}1;", "a = ".repeat(5000))));
        assert!(nesting_error(&format!("x = {}1{};", "`${".repeat(300), "}`".repeat(300))));
    }

    #[test]
    fn test_ordinary_nesting_is_accepted() {
        let parens = format!("x = {}1{};", "(".repeat(40), ")".repeat(40));
        assert!(parse_program(&parens).is_ok());
        assert!(parse_program(&format!("x = 1{};", " + 1".repeat(100))).is_ok());

        // Sibling chains do not accumulate depth.
        let lines = "a = b + c + d + e;\n".repeat(500);
        assert!(parse_program(&lines).is_ok());
    }
}
