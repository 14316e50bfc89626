//! Parser for hotscript.
//!
//! Recursive descent for statements, precedence climbing for arithmetic.
//! Precedence from loosest to tightest: `|`, `+ -`, `* / %`, unary `-`,
//! postfix `.member` / `(args)`. The first unexpected token aborts the whole
//! parse; there is no recovery.

use super::ast::*;
use super::error::ParseError;
use super::token::{BinaryOp, Position, Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Parse a token stream in one call.
pub fn parse(tokens: Vec<Token>) -> Result<Program, ParseError> {
    Parser::new(tokens).parse()
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        let needs_end = tokens
            .last()
            .map_or(true, |t| t.kind != TokenKind::EndOfInput);
        if needs_end {
            let (line, column) = tokens.last().map_or((1, 1), |t| (t.line, t.column));
            tokens.push(Token {
                kind: TokenKind::EndOfInput,
                value: String::new(),
                raw: String::new(),
                line,
                column,
            });
        }
        Self { tokens, pos: 0 }
    }

    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();

        self.skip_separators();
        while !self.is_at_end() {
            statements.push(self.parse_statement()?);
            self.expect_statement_end(false)?;
            self.skip_separators();
        }

        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match &self.peek().kind {
            TokenKind::Let => self.parse_let(),
            TokenKind::Hotkey(_) => self.parse_hotkey(),
            TokenKind::If => self.parse_if(),
            _ => {
                let expr = self.parse_expression()?;
                let pos = expr.pos;
                Ok(Stmt {
                    kind: StmtKind::Expr(expr),
                    pos,
                })
            }
        }
    }

    fn parse_let(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.expect(TokenKind::Let)?.position();
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Equals)?;
        let value = self.parse_expression()?;
        Ok(Stmt {
            kind: StmtKind::Let { name, value },
            pos,
        })
    }

    fn parse_hotkey(&mut self) -> Result<Stmt, ParseError> {
        let token = self.advance().clone();
        let TokenKind::Hotkey(pattern) = token.kind.clone() else {
            return Err(self.error_at("hotkey", &token));
        };
        self.expect(TokenKind::Arrow)?;
        self.skip_newlines();

        let body = if self.check(TokenKind::OpenBrace) {
            Body::Block(self.parse_block()?)
        } else {
            Body::Expr(self.parse_expression()?)
        };

        Ok(Stmt {
            kind: StmtKind::Hotkey { pattern, body },
            pos: Position::new(token.line, token.column),
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.expect(TokenKind::If)?.position();
        self.expect(TokenKind::OpenParen)?;
        self.skip_newlines();
        let condition = self.parse_expression()?;
        self.skip_newlines();
        self.expect(TokenKind::CloseParen)?;
        self.skip_newlines();
        let then_block = self.parse_block()?;

        let else_block = if self.check_skip_newlines(TokenKind::Else) {
            self.advance(); // consume 'else'
            if self.check(TokenKind::If) {
                // `else if` nests as a block holding a single if-statement
                let nested = self.parse_if()?;
                let block_pos = nested.pos;
                Some(Block {
                    statements: vec![nested],
                    pos: block_pos,
                })
            } else {
                self.skip_newlines();
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Ok(Stmt {
            kind: StmtKind::If {
                condition,
                then_block,
                else_block,
            },
            pos,
        })
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let pos = self.expect(TokenKind::OpenBrace)?.position();
        let mut statements = Vec::new();

        self.skip_separators();
        while !self.check(TokenKind::CloseBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
            self.expect_statement_end(true)?;
            self.skip_separators();
        }
        self.expect(TokenKind::CloseBrace)?;

        Ok(Block { statements, pos })
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_pipe()
    }

    /// `AddExpr ('|' AddExpr)*`; a newline directly before `|` continues the chain.
    fn parse_pipe(&mut self) -> Result<Expr, ParseError> {
        let mut input = self.parse_binary(1)?;

        while self.check_skip_newlines(TokenKind::Pipe) {
            let pos = self.advance().position();
            self.skip_newlines();
            let stage = self.parse_binary(1)?;
            input = Expr::new(
                ExprKind::Pipe {
                    input: Box::new(input),
                    stage: Box::new(stage),
                },
                pos,
            );
        }

        Ok(input)
    }

    /// Precedence climbing over the arithmetic operators.
    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek().kind {
                TokenKind::BinaryOp(op) if op.precedence() >= min_prec => op,
                _ => break,
            };
            let pos = self.advance().position();
            let right = self.parse_binary(op.precedence() + 1)?;
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                pos,
            );
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.check(TokenKind::BinaryOp(BinaryOp::Sub)) {
            let pos = self.advance().position();
            let operand = self.parse_unary()?;
            return Ok(Expr::new(ExprKind::Negate(Box::new(operand)), pos));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        while self.check(TokenKind::Dot) {
            self.advance(); // consume '.'
            let member = self.expect_identifier()?;
            let pos = expr.pos;
            expr = Expr::new(
                ExprKind::MemberAccess {
                    object: Box::new(expr),
                    member,
                },
                pos,
            );
            if self.check(TokenKind::OpenParen) {
                let args = self.parse_args()?;
                expr = Expr::new(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    pos,
                );
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let t = self.peek().clone();
        let pos = t.position();
        match t.kind {
            TokenKind::Number => {
                self.advance();
                let value: f64 = t
                    .value
                    .parse()
                    .map_err(|_| self.error_at("number", &t))?;
                Ok(Expr::new(ExprKind::NumberLiteral(value), pos))
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::new(ExprKind::StringLiteral(t.value), pos))
            }
            TokenKind::Identifier => {
                self.advance();
                let ident = Expr::new(ExprKind::Identifier(t.value), pos);
                if self.check(TokenKind::OpenParen) {
                    let args = self.parse_args()?;
                    Ok(Expr::new(
                        ExprKind::Call {
                            callee: Box::new(ident),
                            args,
                        },
                        pos,
                    ))
                } else {
                    Ok(ident)
                }
            }
            TokenKind::OpenParen => {
                self.advance();
                self.skip_newlines();
                let inner = self.parse_expression()?;
                self.skip_newlines();
                self.expect(TokenKind::CloseParen)?;
                Ok(inner)
            }
            _ => Err(self.error("expression")),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(TokenKind::OpenParen)?;
        self.skip_newlines();

        let mut args = Vec::new();
        if !self.check(TokenKind::CloseParen) {
            loop {
                args.push(self.parse_expression()?);
                self.skip_newlines();
                if self.check(TokenKind::Comma) {
                    self.advance();
                    self.skip_newlines();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::CloseParen)?;

        Ok(args)
    }

    // --- token helpers ---

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> &Token {
        let current = self.pos;
        if !self.is_at_end() {
            self.pos += 1;
        }
        &self.tokens[current]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::EndOfInput
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    /// If the next non-newline token is `kind`, skip the newlines and return true.
    fn check_skip_newlines(&mut self, kind: TokenKind) -> bool {
        let mut look = self.pos;
        while self.tokens[look].kind == TokenKind::NewLine {
            look += 1;
        }
        if self.tokens[look].kind == kind {
            self.pos = look;
            true
        } else {
            false
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(TokenKind::NewLine) {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while self.check(TokenKind::NewLine) || self.check(TokenKind::Semicolon) {
            self.advance();
        }
    }

    fn expect_statement_end(&mut self, in_block: bool) -> Result<(), ParseError> {
        match self.peek().kind {
            TokenKind::NewLine | TokenKind::Semicolon => {
                self.advance();
                Ok(())
            }
            TokenKind::EndOfInput => Ok(()),
            TokenKind::CloseBrace if in_block => Ok(()),
            _ => Err(self.error("newline or ';'")),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token, ParseError> {
        if self.check(kind.clone()) {
            Ok(self.advance())
        } else {
            Err(self.error(&kind.describe()))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        if self.check(TokenKind::Identifier) {
            Ok(self.advance().value.clone())
        } else {
            Err(self.error("identifier"))
        }
    }

    fn error(&self, expected: &str) -> ParseError {
        self.error_at(expected, self.peek())
    }

    fn error_at(&self, expected: &str, found: &Token) -> ParseError {
        ParseError::new(expected, describe_found(found), found.position())
    }
}

fn describe_found(t: &Token) -> String {
    match t.kind {
        TokenKind::Identifier => format!("identifier '{}'", t.value),
        TokenKind::Number => format!("number {}", t.value),
        TokenKind::String => format!("string \"{}\"", t.raw),
        TokenKind::Unknown => format!("unknown character '{}'", t.value),
        _ => t.kind.describe(),
    }
}
