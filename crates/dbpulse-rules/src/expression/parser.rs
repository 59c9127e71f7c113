//! Recursive-descent parser for rule expressions.
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! expr        := or_expr ('if' or_expr 'else' expr)?
//! or_expr     := and_expr ('or' and_expr)*
//! and_expr    := not_expr ('and' not_expr)*
//! not_expr    := 'not' not_expr | comparison
//! comparison  := arith (comp_op arith)*
//! arith       := term (('+' | '-') term)*
//! term        := unary (('*' | '/' | '//' | '%') unary)*
//! unary       := ('-' | '+') unary | postfix
//! postfix     := primary ('[' expr ']' | '.' NAME '(' args ')')*
//! primary     := literal | NAME | NAME '(' args ')' | '(' expr ')' | '[' list ']'
//! comp_for    := 'for' NAME (',' NAME)* 'in' or_expr ('if' or_expr)*
//! ```

use serde_json::Value;

use dbpulse_core::errors::ExpressionError;

use super::ast::{BinaryOp, BoolOp, CompareOp, Expr, UnaryOp};
use super::lexer::{tokenize, Token, TokenKind};

/// Deepest nesting of sub-expressions and operator chains a rule may use.
pub const MAX_DEPTH: usize = 64;

/// Parse a complete expression; trailing tokens are a syntax error.
pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expr()?;
    match parser.peek() {
        TokenKind::Eof => Ok(expr),
        other => Err(parser.error(format!("unexpected {} after expression", describe(other)))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), ExpressionError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, found {}", describe(self.peek()))))
        }
    }

    fn error(&self, message: String) -> ExpressionError {
        let offset = self.tokens[self.pos.min(self.tokens.len() - 1)].offset;
        ExpressionError::Syntax { offset, message }
    }

    /// One level deeper into the tree. Callers reset `depth` on the way out.
    fn enter(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(format!("expression nested deeper than {MAX_DEPTH} levels")));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.depth;
        self.enter()?;
        let value = self.or_expr()?;
        if !self.eat(&TokenKind::If) {
            self.depth = base;
            return Ok(value);
        }
        let condition = self.or_expr()?;
        self.expect(TokenKind::Else, "'else'")?;
        let otherwise = self.expr()?;
        self.depth = base;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then: Box::new(value),
            otherwise: Box::new(otherwise),
        })
    }

    fn or_expr(&mut self) -> Result<Expr, ExpressionError> {
        self.bool_chain(BoolOp::Or, TokenKind::Or, Self::and_expr)
    }

    fn and_expr(&mut self) -> Result<Expr, ExpressionError> {
        self.bool_chain(BoolOp::And, TokenKind::And, Self::not_expr)
    }

    fn bool_chain(
        &mut self,
        op: BoolOp,
        token: TokenKind,
        next: fn(&mut Self) -> Result<Expr, ExpressionError>,
    ) -> Result<Expr, ExpressionError> {
        let first = next(self)?;
        if self.peek() != &token {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat(&token) {
            values.push(next(self)?);
        }
        Ok(Expr::Bool { op, values })
    }

    fn not_expr(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&TokenKind::Not) {
            let base = self.depth;
            self.enter()?;
            let operand = self.not_expr()?;
            self.depth = base;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ExpressionError> {
        let first = self.arith()?;
        let mut rest = Vec::new();

        while let Some(op) = self.compare_op() {
            rest.push((op, self.arith()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        let op = match self.peek() {
            TokenKind::EqEq => CompareOp::Eq,
            TokenKind::NotEq => CompareOp::NotEq,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Le => CompareOp::Le,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::Ge => CompareOp::Ge,
            TokenKind::In => CompareOp::In,
            TokenKind::Not if self.peek_at(1) == &TokenKind::In => {
                self.advance();
                CompareOp::NotIn
            }
            TokenKind::Is if self.peek_at(1) == &TokenKind::Not => {
                self.advance();
                CompareOp::IsNot
            }
            TokenKind::Is => CompareOp::Is,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn arith(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.depth;
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => {
                    self.depth = base;
                    return Ok(left);
                }
            };
            self.advance();
            self.enter()?;
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn term(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.depth;
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::DoubleSlash => BinaryOp::FloorDiv,
                TokenKind::Percent => BinaryOp::Mod,
                _ => {
                    self.depth = base;
                    return Ok(left);
                }
            };
            self.advance();
            self.enter()?;
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.postfix(),
        };
        self.advance();
        let base = self.depth;
        self.enter()?;
        let operand = self.unary()?;
        self.depth = base;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.depth;
        let mut expr = self.primary()?;
        loop {
            if matches!(self.peek(), TokenKind::LBracket | TokenKind::Dot) {
                self.enter()?;
            }
            if self.eat(&TokenKind::LBracket) {
                let index = self.expr()?;
                self.expect(TokenKind::RBracket, "']'")?;
                expr = Expr::Subscript {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat(&TokenKind::Dot) {
                let name = match self.advance() {
                    TokenKind::Ident(name) => name,
                    other => {
                        return Err(self.error(format!(
                            "expected method name, found {}",
                            describe(&other)
                        )))
                    }
                };
                if self.peek() != &TokenKind::LParen {
                    return Err(self.error(format!(
                        "attribute access '.{name}' is not supported; only method calls are"
                    )));
                }
                self.advance();
                let args = self.call_args()?;
                expr = Expr::Method {
                    target: Box::new(expr),
                    name,
                    args,
                };
            } else {
                self.depth = base;
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let start = self.pos;
        match self.advance() {
            TokenKind::Int(i) => Ok(Expr::Literal(Value::from(i))),
            TokenKind::Float(f) => Ok(Expr::Literal(Value::from(f))),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::String(s))),
            TokenKind::True => Ok(Expr::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Value::Bool(false))),
            TokenKind::None => Ok(Expr::Literal(Value::Null)),
            TokenKind::Ident(name) => {
                if self.eat(&TokenKind::LParen) {
                    let args = self.call_args()?;
                    Ok(Expr::Call { func: name, args })
                } else {
                    Ok(Expr::Name(name))
                }
            }
            TokenKind::LParen => {
                let inner = self.expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => self.list_display(),
            other => {
                self.pos = start;
                Err(self.error(format!("unexpected {}", describe(&other))))
            }
        }
    }

    /// Arguments after an opening `(`; consumes the closing `)`.
    fn call_args(&mut self) -> Result<Vec<Expr>, ExpressionError> {
        if self.eat(&TokenKind::RParen) {
            return Ok(Vec::new());
        }

        let first = self.expr()?;
        if self.peek() == &TokenKind::For {
            let generator = self.comprehension(first)?;
            self.expect(TokenKind::RParen, "')' after generator expression")?;
            return Ok(vec![generator]);
        }

        let mut args = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.peek() == &TokenKind::RParen {
                break;
            }
            args.push(self.expr()?);
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(args)
    }

    /// List display or list comprehension after an opening `[`.
    fn list_display(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&TokenKind::RBracket) {
            return Ok(Expr::List(Vec::new()));
        }

        let first = self.expr()?;
        if self.peek() == &TokenKind::For {
            let comprehension = self.comprehension(first)?;
            self.expect(TokenKind::RBracket, "']' after list comprehension")?;
            return Ok(comprehension);
        }

        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.peek() == &TokenKind::RBracket {
                break;
            }
            items.push(self.expr()?);
        }
        self.expect(TokenKind::RBracket, "']'")?;
        Ok(Expr::List(items))
    }

    fn comprehension(&mut self, element: Expr) -> Result<Expr, ExpressionError> {
        self.expect(TokenKind::For, "'for'")?;

        let mut targets = Vec::new();
        loop {
            match self.advance() {
                TokenKind::Ident(name) => targets.push(name),
                other => {
                    return Err(self.error(format!(
                        "expected loop variable, found {}",
                        describe(&other)
                    )))
                }
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(TokenKind::In, "'in'")?;
        let iter = self.or_expr()?;

        let mut conditions = Vec::new();
        while self.eat(&TokenKind::If) {
            conditions.push(self.or_expr()?);
        }

        Ok(Expr::Comprehension {
            element: Box::new(element),
            targets,
            iter: Box::new(iter),
            conditions,
        })
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Int(i) => format!("number {i}"),
        TokenKind::Float(f) => format!("number {f}"),
        TokenKind::Str(s) => format!("string '{s}'"),
        TokenKind::Ident(name) => format!("name '{name}'"),
        TokenKind::Eof => "end of expression".to_string(),
        other => format!("{other:?}"),
    }
}
