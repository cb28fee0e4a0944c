//! Recursive-descent parser producing the program AST.

use serde_json::Value;

use super::ProgramError;
use super::lexer::{Spanned, Token, tokenize};

/// Deepest nesting of expressions and blocks a program may use.
pub const MAX_NESTING: usize = 128;

/// A parsed program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub(crate) statements: Vec<Stmt>,
}

impl Program {
    /// Parse source text.
    pub fn parse(source: &str) -> Result<Self, ProgramError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let mut statements = Vec::new();
        while !parser.at(&Token::Eof) {
            statements.push(parser.statement()?);
        }
        Ok(Self { statements })
    }

    /// Whether the program has no statements.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    Let { name: String, value: Expr },
    Assign { name: String, value: Expr },
    Return(Expr),
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    For {
        binding: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        binding: String,
        handler: Vec<Stmt>,
    },
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Var(String),
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call { name: String, args: Vec<Expr> },
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn peek_next(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)].token
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, context: &str) -> Result<(), ProgramError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {} {}, found {}",
                token.describe(),
                context,
                self.peek().describe()
            )))
        }
    }

    fn ident(&mut self, context: &str) -> Result<String, ProgramError> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(self.error(format!(
                "expected a name {}, found {}",
                context,
                other.describe()
            ))),
        }
    }

    /// Run `f` one nesting level deeper, failing past [`MAX_NESTING`].
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ProgramError>,
    ) -> Result<T, ProgramError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!(
                "program nests deeper than {} levels",
                MAX_NESTING
            )));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn error(&self, message: String) -> ProgramError {
        ProgramError::Parse {
            line: self.line(),
            message,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────

    fn statement(&mut self) -> Result<Stmt, ProgramError> {
        match self.peek() {
            Token::Let => {
                self.advance();
                let name = self.ident("after 'let'")?;
                self.expect(Token::Assign, "after variable name")?;
                let value = self.expression()?;
                self.end_statement()?;
                Ok(Stmt::Let { name, value })
            }
            Token::Return => {
                self.advance();
                let value = if self.at(&Token::Semicolon) || self.at(&Token::RBrace) {
                    Expr::Literal(Value::Null)
                } else {
                    self.expression()?
                };
                self.end_statement()?;
                Ok(Stmt::Return(value))
            }
            Token::If => self.if_statement(),
            Token::For => {
                self.advance();
                let binding = self.ident("after 'for'")?;
                self.expect(Token::In, "in for loop")?;
                let iterable = self.expression()?;
                let body = self.block()?;
                Ok(Stmt::For {
                    binding,
                    iterable,
                    body,
                })
            }
            Token::Try => {
                self.advance();
                let body = self.block()?;
                self.expect(Token::Catch, "after try block")?;
                let binding = self.ident("after 'catch'")?;
                let handler = self.block()?;
                Ok(Stmt::Try {
                    body,
                    binding,
                    handler,
                })
            }
            Token::Ident(_) if self.peek_next() == &Token::Assign => {
                let name = self.ident("")?;
                self.advance();
                let value = self.expression()?;
                self.end_statement()?;
                Ok(Stmt::Assign { name, value })
            }
            _ => {
                let expr = self.expression()?;
                self.end_statement()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn if_statement(&mut self) -> Result<Stmt, ProgramError> {
        self.expect(Token::If, "")?;
        let cond = self.expression()?;
        let then = self.block()?;
        let otherwise = if self.eat(&Token::Else) {
            if self.at(&Token::If) {
                vec![self.if_statement()?]
            } else {
                self.block()?
            }
        } else {
            Vec::new()
        };
        Ok(Stmt::If {
            cond,
            then,
            otherwise,
        })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ProgramError> {
        self.nested(Self::block_body)
    }

    fn block_body(&mut self) -> Result<Vec<Stmt>, ProgramError> {
        self.expect(Token::LBrace, "to open a block")?;
        let mut statements = Vec::new();
        while !self.at(&Token::RBrace) {
            if self.at(&Token::Eof) {
                return Err(self.error("unclosed block".to_string()));
            }
            statements.push(self.statement()?);
        }
        self.advance();
        Ok(statements)
    }

    /// Semicolons are required, except before a closing brace or the end.
    fn end_statement(&mut self) -> Result<(), ProgramError> {
        if self.eat(&Token::Semicolon) || self.at(&Token::RBrace) || self.at(&Token::Eof) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected ';' after statement, found {}",
                self.peek().describe()
            )))
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions, lowest precedence first
    // ─────────────────────────────────────────────────────────────────────

    fn expression(&mut self) -> Result<Expr, ProgramError> {
        self.or()
    }

    fn or(&mut self) -> Result<Expr, ProgramError> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            let right = self.and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ProgramError> {
        let mut left = self.equality()?;
        while self.eat(&Token::And) {
            let right = self.equality()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ProgramError> {
        let mut left = self.comparison()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn comparison(&mut self) -> Result<Expr, ProgramError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinaryOp::Lt,
                Token::LtEq => BinaryOp::LtEq,
                Token::Gt => BinaryOp::Gt,
                Token::GtEq => BinaryOp::GtEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn additive(&mut self) -> Result<Expr, ProgramError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ProgramError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, ProgramError> {
        self.nested(|p| {
            if p.eat(&Token::Minus) {
                return Ok(Expr::Unary(UnaryOp::Neg, Box::new(p.unary()?)));
            }
            if p.eat(&Token::Bang) {
                return Ok(Expr::Unary(UnaryOp::Not, Box::new(p.unary()?)));
            }
            p.postfix()
        })
    }

    fn postfix(&mut self) -> Result<Expr, ProgramError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let field = self.ident("after '.'")?;
                expr = Expr::Field(Box::new(expr), field);
            } else if self.eat(&Token::LBracket) {
                let index = self.expression()?;
                self.expect(Token::RBracket, "to close index")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ProgramError> {
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal(
                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            )),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::LParen => self.nested(|p| {
                let expr = p.expression()?;
                p.expect(Token::RParen, "to close '('")?;
                Ok(expr)
            }),
            Token::LBracket => self.nested(|p| Ok(Expr::Array(p.list(Token::RBracket)?))),
            Token::LBrace => self.nested(Self::object),
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    let args = self.nested(|p| p.list(Token::RParen))?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Var(name))
                }
            }
            other => Err(self.error(format!("unexpected {}", other.describe()))),
        }
    }

    /// Object literal fields after the opening brace.
    fn object(&mut self) -> Result<Expr, ProgramError> {
        let mut fields = Vec::new();
        while !self.eat(&Token::RBrace) {
            let key = match self.advance() {
                Token::Ident(name) | Token::Str(name) => name,
                other => {
                    return Err(self.error(format!(
                        "expected an object key, found {}",
                        other.describe()
                    )));
                }
            };
            self.expect(Token::Colon, "after object key")?;
            fields.push((key, self.expression()?));
            if !self.eat(&Token::Comma) {
                self.expect(Token::RBrace, "to close object")?;
                break;
            }
        }
        Ok(Expr::Object(fields))
    }

    /// Comma-separated expressions up to `close`; trailing comma allowed.
    fn list(&mut self, close: Token) -> Result<Vec<Expr>, ProgramError> {
        let mut items = Vec::new();
        while !self.eat(&close) {
            items.push(self.expression()?);
            if !self.eat(&Token::Comma) {
                self.expect(close, "to close list")?;
                break;
            }
        }
        Ok(items)
    }
}
