//! Recursive-descent parser for the embedded dialect.
//!
//! Purely syntactic: no name resolution, no evaluation. Statement parsing
//! is slightly lenient about trailing semicolons (a missing `;` before `}`
//! or end of input is accepted), which keeps generated text composable.

use std::rc::Rc;

use crate::errors::{parse_error, CtError, ErrorContext, SourceArc, Span};
use crate::script::ast::{
    AssignOp, BinOp, Declarator, Expr, ForInit, FunctionLit, LogicalOp, SpExpr, SpStmt, Spanned,
    Stmt, UnaryOp, UpdateOp,
};
use crate::script::lexer::{tokenize, Tok, Token};

/// Parses `source` as a list of statements (a program).
pub fn parse_program(source: &str, src: &SourceArc) -> Result<Vec<SpStmt>, CtError> {
    let mut parser = Parser::new(source, src)?;
    let mut stmts = Vec::new();
    while !parser.at_eof() {
        stmts.push(parser.statement()?);
    }
    Ok(stmts)
}

/// Parses `source` as a single expression spanning the whole input.
pub fn parse_expression(source: &str, src: &SourceArc) -> Result<SpExpr, CtError> {
    let mut parser = Parser::new(source, src)?;
    let expr = parser.expression()?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser<'a> {
    source: &'a str,
    src: SourceArc,
    tokens: Vec<Token>,
    pos: usize,
    last_end: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, src: &SourceArc) -> Result<Self, CtError> {
        let tokens = tokenize(source, src)?;
        Ok(Self {
            source,
            src: SourceArc::clone(src),
            tokens,
            pos: 0,
            last_end: 0,
        })
    }

    // --- token plumbing ---

    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        let i = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[i].tok
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        self.last_end = token.span.end;
        token
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Tok::Eof)
    }

    fn check(&self, tok: &Tok) -> bool {
        self.peek() == tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.check(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok) -> Result<Token, CtError> {
        if self.check(&tok) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("expected {}", tok.describe())))
        }
    }

    fn expect_eof(&mut self) -> Result<(), CtError> {
        if self.at_eof() {
            Ok(())
        } else {
            Err(self.unexpected("expected end of input"))
        }
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Tok::Ident(s) if s == word)
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.is_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> Result<String, CtError> {
        match self.peek() {
            Tok::Ident(s) => {
                let name = s.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("expected identifier")),
        }
    }

    fn unexpected(&self, message: &str) -> CtError {
        parse_error(
            format!("{}, found {}", message, self.peek().describe()),
            ErrorContext::at(&self.src, self.peek_span()),
        )
    }

    fn spanned(&self, node: Expr, start: usize) -> SpExpr {
        Spanned::new(node, Span::new(start, self.last_end))
    }

    // --- statements ---

    fn statement(&mut self) -> Result<SpStmt, CtError> {
        let start = self.peek_span().start;

        if self.eat(&Tok::Semi) {
            return Ok(Spanned::new(Stmt::Empty, Span::new(start, self.last_end)));
        }
        if self.check(&Tok::LBrace) {
            return self.block();
        }
        if self.is_keyword("var") {
            self.advance();
            let decls = self.declarators()?;
            self.end_statement()?;
            return Ok(Spanned::new(
                Stmt::Var(decls),
                Span::new(start, self.last_end),
            ));
        }
        if self.is_keyword("return") {
            self.advance();
            let value = if self.check(&Tok::Semi)
                || self.check(&Tok::RBrace)
                || self.at_eof()
            {
                None
            } else {
                Some(self.expression()?)
            };
            self.end_statement()?;
            return Ok(Spanned::new(
                Stmt::Return(value),
                Span::new(start, self.last_end),
            ));
        }
        if self.is_keyword("if") {
            return self.if_statement();
        }
        if self.is_keyword("for") {
            return self.for_statement();
        }
        if self.is_keyword("function") {
            if let Tok::Ident(_) = self.peek_at(1) {
                let lit = self.function_literal()?;
                return Ok(Spanned::new(
                    Stmt::FunctionDecl(lit),
                    Span::new(start, self.last_end),
                ));
            }
        }

        let expr = self.expression()?;
        self.end_statement()?;
        Ok(Spanned::new(
            Stmt::Expr(expr),
            Span::new(start, self.last_end),
        ))
    }

    /// Consumes the statement terminator. A `;` is standard; `}` or end of
    /// input also close an expression statement.
    fn end_statement(&mut self) -> Result<(), CtError> {
        if self.eat(&Tok::Semi) || self.check(&Tok::RBrace) || self.at_eof() {
            Ok(())
        } else {
            Err(self.unexpected("expected ';'"))
        }
    }

    fn block(&mut self) -> Result<SpStmt, CtError> {
        let start = self.peek_span().start;
        self.expect(Tok::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&Tok::RBrace) {
            if self.at_eof() {
                return Err(self.unexpected("expected '}'"));
            }
            stmts.push(self.statement()?);
        }
        self.expect(Tok::RBrace)?;
        Ok(Spanned::new(
            Stmt::Block(stmts),
            Span::new(start, self.last_end),
        ))
    }

    fn if_statement(&mut self) -> Result<SpStmt, CtError> {
        let start = self.peek_span().start;
        self.advance(); // if
        self.expect(Tok::LParen)?;
        let cond = self.expression()?;
        self.expect(Tok::RParen)?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.eat_keyword("else") {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Spanned::new(
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            },
            Span::new(start, self.last_end),
        ))
    }

    fn for_statement(&mut self) -> Result<SpStmt, CtError> {
        let start = self.peek_span().start;
        self.advance(); // for
        self.expect(Tok::LParen)?;

        // Three shapes behind the paren: `var k in`, `k in`, or a classic
        // three-clause header.
        if self.is_keyword("var") {
            if let (Tok::Ident(name), Tok::Ident(kw)) = (self.peek_at(1), self.peek_at(2)) {
                if kw == "in" {
                    let var = name.clone();
                    self.advance(); // var
                    self.advance(); // name
                    self.advance(); // in
                    return self.finish_for_in(start, true, var);
                }
            }
            self.advance(); // var
            let decls = self.declarators()?;
            self.expect(Tok::Semi)?;
            return self.finish_for(start, ForInit::Var(decls));
        }

        if let (Tok::Ident(name), Tok::Ident(kw)) = (self.peek(), self.peek_at(1)) {
            if kw == "in" && name != "var" {
                let var = name.clone();
                self.advance(); // name
                self.advance(); // in
                return self.finish_for_in(start, false, var);
            }
        }

        if self.eat(&Tok::Semi) {
            return self.finish_for(start, ForInit::None);
        }
        let init = self.expression()?;
        self.expect(Tok::Semi)?;
        self.finish_for(start, ForInit::Expr(init))
    }

    fn finish_for(&mut self, start: usize, init: ForInit) -> Result<SpStmt, CtError> {
        let cond = if self.check(&Tok::Semi) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(Tok::Semi)?;
        let update = if self.check(&Tok::RParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(Tok::RParen)?;
        let body = Box::new(self.statement()?);
        Ok(Spanned::new(
            Stmt::For {
                init,
                cond,
                update,
                body,
            },
            Span::new(start, self.last_end),
        ))
    }

    fn finish_for_in(&mut self, start: usize, decl: bool, var: String) -> Result<SpStmt, CtError> {
        let object = self.expression()?;
        self.expect(Tok::RParen)?;
        let body = Box::new(self.statement()?);
        Ok(Spanned::new(
            Stmt::ForIn {
                decl,
                var,
                object,
                body,
            },
            Span::new(start, self.last_end),
        ))
    }

    fn declarators(&mut self) -> Result<Vec<Declarator>, CtError> {
        let mut decls = Vec::new();
        let mut name = self.expect_ident()?;
        loop {
            let init = if self.eat(&Tok::Assign) {
                Some(self.assignment()?)
            } else {
                None
            };
            decls.push(Declarator { name, init });
            if !self.eat(&Tok::Comma) {
                break;
            }
            name = self.expect_ident()?;
        }
        Ok(decls)
    }

    // --- expressions, highest nesting first ---

    /// Full expression including the comma sequence.
    fn expression(&mut self) -> Result<SpExpr, CtError> {
        let start = self.peek_span().start;
        let first = self.assignment()?;
        if !self.check(&Tok::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Tok::Comma) {
            items.push(self.assignment()?);
        }
        Ok(self.spanned(Expr::Sequence(items), start))
    }

    fn assignment(&mut self) -> Result<SpExpr, CtError> {
        let start = self.peek_span().start;
        let target = self.conditional()?;
        let op = match self.peek() {
            Tok::Assign => AssignOp::Assign,
            Tok::PlusAssign => AssignOp::AddAssign,
            Tok::MinusAssign => AssignOp::SubAssign,
            Tok::StarAssign => AssignOp::MulAssign,
            Tok::SlashAssign => AssignOp::DivAssign,
            _ => return Ok(target),
        };
        if !matches!(
            target.node,
            Expr::Ident(_) | Expr::Member(..) | Expr::Index(..)
        ) {
            return Err(parse_error(
                "invalid assignment target",
                ErrorContext::at(&self.src, target.span),
            ));
        }
        self.advance();
        let value = self.assignment()?;
        Ok(self.spanned(Expr::Assign(op, Box::new(target), Box::new(value)), start))
    }

    fn conditional(&mut self) -> Result<SpExpr, CtError> {
        let start = self.peek_span().start;
        let cond = self.logical_or()?;
        if !self.eat(&Tok::Question) {
            return Ok(cond);
        }
        let then_branch = self.assignment()?;
        self.expect(Tok::Colon)?;
        let else_branch = self.assignment()?;
        Ok(self.spanned(
            Expr::Conditional(
                Box::new(cond),
                Box::new(then_branch),
                Box::new(else_branch),
            ),
            start,
        ))
    }

    fn logical_or(&mut self) -> Result<SpExpr, CtError> {
        let start = self.peek_span().start;
        let mut left = self.logical_and()?;
        while self.eat(&Tok::OrOr) {
            let right = self.logical_and()?;
            left = self.spanned(
                Expr::Logical(LogicalOp::Or, Box::new(left), Box::new(right)),
                start,
            );
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<SpExpr, CtError> {
        let start = self.peek_span().start;
        let mut left = self.equality()?;
        while self.eat(&Tok::AndAnd) {
            let right = self.equality()?;
            left = self.spanned(
                Expr::Logical(LogicalOp::And, Box::new(left), Box::new(right)),
                start,
            );
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<SpExpr, CtError> {
        let start = self.peek_span().start;
        let mut left = self.relational()?;
        loop {
            let op = match self.peek() {
                Tok::Eq => BinOp::Eq,
                Tok::Ne => BinOp::Ne,
                Tok::StrictEq => BinOp::StrictEq,
                Tok::StrictNe => BinOp::StrictNe,
                _ => break,
            };
            self.advance();
            let right = self.relational()?;
            left = self.spanned(Expr::Binary(op, Box::new(left), Box::new(right)), start);
        }
        Ok(left)
    }

    fn relational(&mut self) -> Result<SpExpr, CtError> {
        let start = self.peek_span().start;
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Tok::Lt => BinOp::Lt,
                Tok::Le => BinOp::Le,
                Tok::Gt => BinOp::Gt,
                Tok::Ge => BinOp::Ge,
                Tok::Ident(s) if s == "in" => BinOp::In,
                _ => break,
            };
            self.advance();
            let right = self.additive()?;
            left = self.spanned(Expr::Binary(op, Box::new(left), Box::new(right)), start);
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<SpExpr, CtError> {
        let start = self.peek_span().start;
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.multiplicative()?;
            left = self.spanned(Expr::Binary(op, Box::new(left), Box::new(right)), start);
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<SpExpr, CtError> {
        let start = self.peek_span().start;
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::Percent => BinOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.unary()?;
            left = self.spanned(Expr::Binary(op, Box::new(left), Box::new(right)), start);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<SpExpr, CtError> {
        let start = self.peek_span().start;
        let op = match self.peek() {
            Tok::Not => Some(UnaryOp::Not),
            Tok::Minus => Some(UnaryOp::Neg),
            Tok::Plus => Some(UnaryOp::Pos),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.unary()?;
            return Ok(self.spanned(Expr::Unary(op, Box::new(operand)), start));
        }
        let update = match self.peek() {
            Tok::PlusPlus => Some(UpdateOp::Incr),
            Tok::MinusMinus => Some(UpdateOp::Decr),
            _ => None,
        };
        if let Some(op) = update {
            self.advance();
            let operand = self.unary()?;
            return Ok(self.spanned(Expr::Update(op, true, Box::new(operand)), start));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<SpExpr, CtError> {
        let start = self.peek_span().start;
        let mut expr = self.call_member()?;
        loop {
            let op = match self.peek() {
                Tok::PlusPlus => UpdateOp::Incr,
                Tok::MinusMinus => UpdateOp::Decr,
                _ => break,
            };
            self.advance();
            expr = self.spanned(Expr::Update(op, false, Box::new(expr)), start);
        }
        Ok(expr)
    }

    fn call_member(&mut self) -> Result<SpExpr, CtError> {
        let start = self.peek_span().start;
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Tok::Dot) {
                let name = self.expect_ident()?;
                expr = self.spanned(Expr::Member(Box::new(expr), name), start);
            } else if self.eat(&Tok::LBracket) {
                let index = self.expression()?;
                self.expect(Tok::RBracket)?;
                expr = self.spanned(Expr::Index(Box::new(expr), Box::new(index)), start);
            } else if self.eat(&Tok::LParen) {
                let mut args = Vec::new();
                if !self.check(&Tok::RParen) {
                    loop {
                        args.push(self.assignment()?);
                        if !self.eat(&Tok::Comma) {
                            break;
                        }
                    }
                }
                self.expect(Tok::RParen)?;
                expr = self.spanned(Expr::Call(Box::new(expr), args), start);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<SpExpr, CtError> {
        let start = self.peek_span().start;
        match self.peek().clone() {
            Tok::Number(n) => {
                self.advance();
                Ok(self.spanned(Expr::Number(n), start))
            }
            Tok::Str(s) => {
                self.advance();
                Ok(self.spanned(Expr::Str(s), start))
            }
            Tok::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(Tok::RParen)?;
                // Keep the inner node; grouping has no semantic weight.
                Ok(inner)
            }
            Tok::LBracket => self.array_literal(),
            Tok::LBrace => self.object_literal(),
            Tok::Ident(name) => match name.as_str() {
                "null" => {
                    self.advance();
                    Ok(self.spanned(Expr::Null, start))
                }
                "true" => {
                    self.advance();
                    Ok(self.spanned(Expr::Bool(true), start))
                }
                "false" => {
                    self.advance();
                    Ok(self.spanned(Expr::Bool(false), start))
                }
                "function" => {
                    let lit = self.function_literal()?;
                    Ok(self.spanned(Expr::Function(lit), start))
                }
                _ => {
                    self.advance();
                    Ok(self.spanned(Expr::Ident(name), start))
                }
            },
            _ => Err(self.unexpected("expected expression")),
        }
    }

    fn array_literal(&mut self) -> Result<SpExpr, CtError> {
        let start = self.peek_span().start;
        self.expect(Tok::LBracket)?;
        let mut items = Vec::new();
        if !self.check(&Tok::RBracket) {
            loop {
                items.push(self.assignment()?);
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
        }
        self.expect(Tok::RBracket)?;
        Ok(self.spanned(Expr::Array(items), start))
    }

    fn object_literal(&mut self) -> Result<SpExpr, CtError> {
        let start = self.peek_span().start;
        self.expect(Tok::LBrace)?;
        let mut entries = Vec::new();
        if !self.check(&Tok::RBrace) {
            loop {
                let key = match self.peek().clone() {
                    Tok::Ident(s) => {
                        self.advance();
                        s
                    }
                    Tok::Str(s) => {
                        self.advance();
                        s
                    }
                    _ => return Err(self.unexpected("expected object key")),
                };
                self.expect(Tok::Colon)?;
                let value = self.assignment()?;
                entries.push((key, value));
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
        }
        self.expect(Tok::RBrace)?;
        Ok(self.spanned(Expr::Object(entries), start))
    }

    fn function_literal(&mut self) -> Result<Rc<FunctionLit>, CtError> {
        let start = self.peek_span().start;
        self.advance(); // function
        let name = match self.peek() {
            Tok::Ident(s) => {
                let n = s.clone();
                self.advance();
                Some(n)
            }
            _ => None,
        };
        self.expect(Tok::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Tok::RParen) {
            loop {
                params.push(self.expect_ident()?);
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
        }
        self.expect(Tok::RParen)?;
        let body = match self.block()?.node {
            Stmt::Block(stmts) => stmts,
            _ => unreachable!("block() always yields Stmt::Block"),
        };
        let source = self.source[start..self.last_end].to_string();
        Ok(Rc::new(FunctionLit {
            name,
            params,
            body,
            source,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::to_error_source;
    use crate::script::ast::{BinOp, Expr, Stmt};

    fn expr(source: &str) -> SpExpr {
        let src = to_error_source("test", source);
        parse_expression(source, &src).unwrap()
    }

    fn program(source: &str) -> Vec<SpStmt> {
        let src = to_error_source("test", source);
        parse_program(source, &src).unwrap()
    }

    #[test]
    fn precedence_of_arithmetic() {
        let e = expr("1 + 2 * 3");
        match e.node {
            Expr::Binary(BinOp::Add, _, rhs) => {
                assert!(matches!(rhs.node, Expr::Binary(BinOp::Mul, _, _)));
            }
            other => panic!("expected Add at root, got {:?}", other),
        }
    }

    #[test]
    fn parses_comma_sequence() {
        let e = expr("(a = 1, b = 2, b)");
        assert!(matches!(e.node, Expr::Sequence(items) if items.len() == 3));
    }

    #[test]
    fn parses_counted_for_loop() {
        let stmts = program("for (var i = 0, n = 4; i < n; i++) { x += i; }");
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0].node, Stmt::For { .. }));
    }

    #[test]
    fn parses_for_in_loop() {
        let stmts = program("for (var k in o) if (!(k in {})) { x = k; }");
        match &stmts[0].node {
            Stmt::ForIn { decl, var, .. } => {
                assert!(*decl);
                assert_eq!(var, "k");
            }
            other => panic!("expected ForIn, got {:?}", other),
        }
    }

    #[test]
    fn function_literal_keeps_source_text() {
        let e = expr("function add(a, b) { return a + b; }");
        match e.node {
            Expr::Function(lit) => {
                assert_eq!(lit.name.as_deref(), Some("add"));
                assert_eq!(lit.params, vec!["a".to_string(), "b".to_string()]);
                assert!(lit.source.starts_with("function add"));
                assert!(lit.source.ends_with('}'));
            }
            other => panic!("expected Function, got {:?}", other),
        }
    }

    #[test]
    fn rejects_invalid_assignment_target() {
        let src = to_error_source("test", "1 + 2 = 3");
        assert!(parse_expression("1 + 2 = 3", &src).is_err());
    }

    #[test]
    fn object_literal_in_expression_position() {
        let e = expr("k in {}");
        assert!(matches!(e.node, Expr::Binary(BinOp::In, _, _)));
    }
}
