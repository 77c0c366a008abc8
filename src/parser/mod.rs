// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Parser for generator procedures
//!
//! Recursive descent over the token stream. A compilation unit is a list of
//! procedures of the form `Type name(Type p, ...) { statements }`.

use crate::ast::{
    BinaryOp, CatchClause, CompilationUnit, Expr, Ident, Literal, LocalDecl, Param, Procedure,
    Stmt, StmtKind, SwitchCase, TryStmt, TypeRef, UnaryOp,
};
use crate::error::{ParserError, SourceLocation};
use crate::lexer::{Keyword, Lexer, Token, TokenType};

#[cfg(test)]
mod tests;

/// Tokenize and parse a whole source file
pub fn parse_source(source: &str, file_name: &str) -> Result<CompilationUnit, ParserError> {
    let tokens = Lexer::new(source, file_name.to_string()).tokenize()?;
    Parser::new(tokens).parse_unit()
}

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        let ends_with_eof = tokens
            .last()
            .is_some_and(|t| matches!(t.token_type, TokenType::Eof));
        if !ends_with_eof {
            let location = tokens
                .last()
                .map(|t| t.location.clone())
                .unwrap_or_default();
            tokens.push(Token::new(TokenType::Eof, location, String::new()));
        }
        Self {
            tokens,
            position: 0,
        }
    }

    // ==================== TOKEN STREAM ====================

    /// Current token; the stream always ends with `Eof`
    pub fn peek(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, pos: usize) -> &TokenType {
        &self.tokens[pos.min(self.tokens.len() - 1)].token_type
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.position += 1;
        }
        token
    }

    pub fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::Eof)
    }

    fn check(&self, token_type: &TokenType) -> bool {
        &self.peek().token_type == token_type
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(&self.peek().token_type, TokenType::Keyword(k) if *k == keyword)
    }

    fn match_token(&mut self, token_type: &TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token_type: &TokenType, message: &str) -> Result<Token, ParserError> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(message))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword, message: &str) -> Result<Token, ParserError> {
        if self.check_keyword(keyword) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(message))
        }
    }

    fn expect_identifier(&mut self, message: &str) -> Result<String, ParserError> {
        match &self.peek().token_type {
            TokenType::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(message)),
        }
    }

    fn unexpected(&self, expected: &str) -> ParserError {
        let token = self.peek();
        let found = match token.token_type {
            TokenType::Eof => "end of input".to_string(),
            _ => format!("'{}'", token.lexeme),
        };
        ParserError::UnexpectedToken {
            expected: expected.to_string(),
            found,
            location: token.location.clone(),
        }
    }

    fn current_location(&self) -> SourceLocation {
        self.peek().location.clone()
    }

    // ==================== LOOKAHEAD ====================

    /// Scan a type starting at `pos` without consuming anything; returns the
    /// position just past it
    fn scan_type(&self, pos: usize) -> Option<usize> {
        if !matches!(self.peek_at(pos), TokenType::Identifier(_)) {
            return None;
        }
        let mut pos = pos + 1;
        if matches!(self.peek_at(pos), TokenType::Less) {
            pos += 1;
            loop {
                pos = self.scan_type(pos)?;
                match self.peek_at(pos) {
                    TokenType::Comma => pos += 1,
                    TokenType::Greater => return Some(pos + 1),
                    _ => return None,
                }
            }
        }
        Some(pos)
    }

    /// `Type name` at the current position
    fn looks_like_declaration(&self) -> bool {
        self.scan_type(self.position)
            .is_some_and(|pos| matches!(self.peek_at(pos), TokenType::Identifier(_)))
    }

    /// `Type name :` at the current position (inside a `for` header)
    fn looks_like_foreach(&self) -> bool {
        self.scan_type(self.position).is_some_and(|pos| {
            matches!(self.peek_at(pos), TokenType::Identifier(_))
                && matches!(self.peek_at(pos + 1), TokenType::Colon)
        })
    }

    // ==================== DECLARATIONS ====================

    pub fn parse_unit(&mut self) -> Result<CompilationUnit, ParserError> {
        let mut procedures = Vec::new();
        while !self.is_at_end() {
            procedures.push(self.parse_procedure()?);
        }
        Ok(CompilationUnit { procedures })
    }

    /// Grammar: type identifier "(" parameters ")" block
    pub fn parse_procedure(&mut self) -> Result<Procedure, ParserError> {
        let location = self.current_location();
        let return_type = self.parse_type()?;
        let name = self.expect_identifier("expected procedure name")?;

        self.expect(&TokenType::LeftParen, "expected '(' after procedure name")?;
        let mut params = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                let ty = self.parse_type()?;
                let name = self.expect_identifier("expected parameter name")?;
                params.push(Param {
                    name: Ident::new(name),
                    ty,
                });
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenType::RightParen, "expected ')' after parameters")?;

        let body = self.parse_block()?;
        Ok(Procedure {
            name,
            params,
            return_type: Some(return_type),
            body,
            location,
        })
    }

    pub fn parse_type(&mut self) -> Result<TypeRef, ParserError> {
        let name = self.expect_identifier("expected type name")?;
        let mut args = Vec::new();
        if self.match_token(&TokenType::Less) {
            loop {
                args.push(self.parse_type()?);
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
            }
            self.expect(&TokenType::Greater, "expected '>' to close type arguments")?;
        }
        Ok(TypeRef { name, args })
    }

    /// Grammar: type identifier ("=" expression)?
    fn parse_local_decl(&mut self) -> Result<LocalDecl, ParserError> {
        let ty = self.parse_type()?;
        let name = self.expect_identifier("expected variable name")?;
        let init = if self.match_token(&TokenType::Equal) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(LocalDecl {
            name: Ident::new(name),
            ty,
            init,
        })
    }

    // ==================== STATEMENTS ====================

    /// Grammar: "{" statement* "}"
    pub fn parse_block(&mut self) -> Result<Vec<Stmt>, ParserError> {
        self.expect(&TokenType::LeftBrace, "expected '{'")?;
        let mut statements = Vec::new();
        while !self.check(&TokenType::RightBrace) {
            if self.is_at_end() {
                return Err(self.unexpected("expected '}'"));
            }
            statements.push(self.parse_statement()?);
        }
        self.advance();
        Ok(statements)
    }

    pub fn parse_statement(&mut self) -> Result<Stmt, ParserError> {
        let location = self.current_location();

        let kind = match self.peek().token_type.clone() {
            TokenType::LeftBrace => StmtKind::Block(self.parse_block()?),
            TokenType::Semicolon => {
                self.advance();
                StmtKind::Empty
            }
            TokenType::Keyword(keyword) => self.parse_keyword_statement(keyword)?,
            TokenType::Identifier(label) if matches!(self.peek_at(self.position + 1), TokenType::Colon) => {
                self.advance();
                self.advance();
                let body = self.parse_statement()?;
                StmtKind::Labeled {
                    label,
                    body: Box::new(body),
                }
            }
            _ if self.looks_like_declaration() => {
                let decl = self.parse_local_decl()?;
                self.expect(&TokenType::Semicolon, "expected ';' after declaration")?;
                StmtKind::Local(decl)
            }
            _ => {
                let expr = self.parse_expression()?;
                self.expect(&TokenType::Semicolon, "expected ';' after expression")?;
                StmtKind::Expr(expr)
            }
        };

        Ok(Stmt::new(kind, location))
    }

    fn parse_keyword_statement(&mut self, keyword: Keyword) -> Result<StmtKind, ParserError> {
        match keyword {
            Keyword::If => self.parse_if_statement(),
            Keyword::While => self.parse_while_loop(),
            Keyword::Do => self.parse_do_while_loop(),
            Keyword::For => self.parse_for_loop(),
            Keyword::Switch => self.parse_switch_statement(),
            Keyword::Try => self.parse_try_statement(),
            Keyword::Synchronized => {
                self.advance();
                let lock = self.parse_parenthesized()?;
                let body = self.parse_block()?;
                Ok(StmtKind::Synchronized { lock, body })
            }
            Keyword::Return => {
                self.advance();
                let value = if self.check(&TokenType::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect(&TokenType::Semicolon, "expected ';' after return")?;
                Ok(StmtKind::Return(value))
            }
            Keyword::Break | Keyword::Continue => {
                self.advance();
                let label = match &self.peek().token_type {
                    TokenType::Identifier(label) => {
                        let label = label.clone();
                        self.advance();
                        Some(label)
                    }
                    _ => None,
                };
                self.expect(&TokenType::Semicolon, "expected ';' after jump")?;
                Ok(if keyword == Keyword::Break {
                    StmtKind::Break(label)
                } else {
                    StmtKind::Continue(label)
                })
            }
            Keyword::Throw => {
                self.advance();
                let value = self.parse_expression()?;
                self.expect(&TokenType::Semicolon, "expected ';' after throw")?;
                Ok(StmtKind::Throw(value))
            }
            Keyword::Else | Keyword::Case | Keyword::Default | Keyword::Catch | Keyword::Finally => {
                Err(self.unexpected("expected statement"))
            }
        }
    }

    fn parse_parenthesized(&mut self) -> Result<Expr, ParserError> {
        self.expect(&TokenType::LeftParen, "expected '('")?;
        let expr = self.parse_expression()?;
        self.expect(&TokenType::RightParen, "expected ')'")?;
        Ok(expr)
    }

    /// Grammar: "if" "(" expression ")" statement ("else" statement)?
    fn parse_if_statement(&mut self) -> Result<StmtKind, ParserError> {
        self.expect_keyword(Keyword::If, "expected 'if'")?;
        let cond = self.parse_parenthesized()?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.check_keyword(Keyword::Else) {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(StmtKind::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn parse_while_loop(&mut self) -> Result<StmtKind, ParserError> {
        self.expect_keyword(Keyword::While, "expected 'while'")?;
        let cond = self.parse_parenthesized()?;
        let body = Box::new(self.parse_statement()?);
        Ok(StmtKind::While { cond, body })
    }

    fn parse_do_while_loop(&mut self) -> Result<StmtKind, ParserError> {
        self.expect_keyword(Keyword::Do, "expected 'do'")?;
        let body = Box::new(self.parse_statement()?);
        self.expect_keyword(Keyword::While, "expected 'while' after do body")?;
        let cond = self.parse_parenthesized()?;
        self.expect(&TokenType::Semicolon, "expected ';' after do-while")?;
        Ok(StmtKind::DoWhile { body, cond })
    }

    /// Grammar:
    ///   "for" "(" type identifier ":" expression ")" statement
    ///   "for" "(" init? ";" expression? ";" updates? ")" statement
    fn parse_for_loop(&mut self) -> Result<StmtKind, ParserError> {
        self.expect_keyword(Keyword::For, "expected 'for'")?;
        self.expect(&TokenType::LeftParen, "expected '(' after 'for'")?;

        if self.looks_like_foreach() {
            let ty = self.parse_type()?;
            let name = self.expect_identifier("expected loop variable")?;
            self.expect(&TokenType::Colon, "expected ':' in for-each")?;
            let iterable = self.parse_expression()?;
            self.expect(&TokenType::RightParen, "expected ')' after for-each header")?;
            let body = Box::new(self.parse_statement()?);
            return Ok(StmtKind::ForEach {
                var: LocalDecl {
                    name: Ident::new(name),
                    ty,
                    init: None,
                },
                iterable,
                body,
            });
        }

        let mut init = Vec::new();
        if !self.check(&TokenType::Semicolon) {
            if self.looks_like_declaration() {
                let location = self.current_location();
                let decl = self.parse_local_decl()?;
                init.push(Stmt::new(StmtKind::Local(decl), location));
            } else {
                loop {
                    let location = self.current_location();
                    let expr = self.parse_expression()?;
                    init.push(Stmt::new(StmtKind::Expr(expr), location));
                    if !self.match_token(&TokenType::Comma) {
                        break;
                    }
                }
            }
        }
        self.expect(&TokenType::Semicolon, "expected ';' after for initializer")?;

        let cond = if self.check(&TokenType::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenType::Semicolon, "expected ';' after for condition")?;

        let mut update = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                update.push(self.parse_expression()?);
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenType::RightParen, "expected ')' after for header")?;

        let body = Box::new(self.parse_statement()?);
        Ok(StmtKind::For {
            init,
            cond,
            update,
            body,
        })
    }

    /// Grammar: "switch" "(" expression ")" "{" (("case" expression | "default") ":" statement*)* "}"
    fn parse_switch_statement(&mut self) -> Result<StmtKind, ParserError> {
        self.expect_keyword(Keyword::Switch, "expected 'switch'")?;
        let selector = self.parse_parenthesized()?;
        self.expect(&TokenType::LeftBrace, "expected '{' after switch selector")?;

        let mut cases: Vec<SwitchCase> = Vec::new();
        let mut seen_default = false;
        while !self.match_token(&TokenType::RightBrace) {
            let location = self.current_location();
            let mut case = SwitchCase {
                labels: Vec::new(),
                is_default: false,
                body: Vec::new(),
            };
            if self.check_keyword(Keyword::Case) {
                self.advance();
                case.labels.push(self.parse_expression()?);
            } else if self.check_keyword(Keyword::Default) {
                self.advance();
                if seen_default {
                    return Err(ParserError::InvalidSyntax {
                        message: "duplicate default label".to_string(),
                        location,
                    });
                }
                seen_default = true;
                case.is_default = true;
            } else {
                return Err(self.unexpected("expected 'case', 'default' or '}'"));
            }
            self.expect(&TokenType::Colon, "expected ':' after case label")?;

            while !self.check_keyword(Keyword::Case)
                && !self.check_keyword(Keyword::Default)
                && !self.check(&TokenType::RightBrace)
            {
                if self.is_at_end() {
                    return Err(self.unexpected("expected '}' to close switch"));
                }
                case.body.push(self.parse_statement()?);
            }
            cases.push(case);
        }

        Ok(StmtKind::Switch { selector, cases })
    }

    /// Grammar:
    ///   "try" ("(" resource (";" resource)* ";"? ")")? block
    ///   ("catch" "(" type ("|" type)* identifier ")" block)* ("finally" block)?
    fn parse_try_statement(&mut self) -> Result<StmtKind, ParserError> {
        let location = self.current_location();
        self.expect_keyword(Keyword::Try, "expected 'try'")?;

        let mut resources = Vec::new();
        if self.match_token(&TokenType::LeftParen) {
            while !self.check(&TokenType::RightParen) {
                let decl = self.parse_local_decl()?;
                if decl.init.is_none() {
                    return Err(ParserError::InvalidSyntax {
                        message: format!("resource `{}` must be initialized", decl.name.name),
                        location: self.current_location(),
                    });
                }
                resources.push(decl);
                if !self.match_token(&TokenType::Semicolon) {
                    break;
                }
            }
            self.expect(&TokenType::RightParen, "expected ')' after resources")?;
        }

        let body = self.parse_block()?;

        let mut catches = Vec::new();
        while self.check_keyword(Keyword::Catch) {
            self.advance();
            self.expect(&TokenType::LeftParen, "expected '(' after 'catch'")?;
            let mut types = vec![self.parse_type()?];
            while self.match_token(&TokenType::Pipe) {
                types.push(self.parse_type()?);
            }
            let param = self.expect_identifier("expected catch parameter name")?;
            self.expect(&TokenType::RightParen, "expected ')' after catch parameter")?;
            let body = self.parse_block()?;
            catches.push(CatchClause {
                param: Ident::new(param),
                types,
                body,
            });
        }

        let finally = if self.check_keyword(Keyword::Finally) {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };

        if resources.is_empty() && catches.is_empty() && finally.is_none() {
            return Err(ParserError::InvalidSyntax {
                message: "'try' without 'catch', 'finally' or resources".to_string(),
                location,
            });
        }

        Ok(StmtKind::Try(Box::new(TryStmt {
            resources,
            body,
            catches,
            finally,
        })))
    }

    // ==================== EXPRESSIONS ====================

    pub fn parse_expression(&mut self) -> Result<Expr, ParserError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParserError> {
        let location = self.current_location();
        let lhs = self.parse_binary(0)?;

        let op = match self.peek().token_type {
            TokenType::Equal => None,
            TokenType::PlusEqual => Some(BinaryOp::Add),
            TokenType::MinusEqual => Some(BinaryOp::Sub),
            TokenType::StarEqual => Some(BinaryOp::Mul),
            TokenType::SlashEqual => Some(BinaryOp::Div),
            TokenType::PercentEqual => Some(BinaryOp::Rem),
            _ => return Ok(lhs),
        };
        self.advance();

        let target = match lhs {
            Expr::Ident(ident) => ident,
            _ => {
                return Err(ParserError::InvalidSyntax {
                    message: "invalid assignment target".to_string(),
                    location,
                })
            }
        };
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            target,
            op,
            value: Box::new(value),
        })
    }

    /// Precedence climbing over the binary operator table
    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expr, ParserError> {
        let mut lhs = self.parse_unary()?;
        while let Some((op, precedence)) = binary_operator(&self.peek().token_type) {
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(precedence + 1)?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParserError> {
        match self.peek().token_type {
            TokenType::Bang => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            TokenType::Minus => {
                self.advance();
                match self.parse_unary()? {
                    Expr::Literal(Literal::Int(value)) => Ok(Expr::int(-value)),
                    operand => Ok(Expr::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand),
                    }),
                }
            }
            TokenType::PlusPlus | TokenType::MinusMinus => {
                let delta = if self.check(&TokenType::PlusPlus) { 1 } else { -1 };
                self.advance();
                let name = self.expect_identifier("expected variable after prefix operator")?;
                Ok(Expr::Increment {
                    target: Ident::new(name),
                    delta,
                    postfix: false,
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().token_type {
                TokenType::Dot => {
                    self.advance();
                    let method = self.expect_identifier("expected method name after '.'")?;
                    let args = self.parse_arguments()?;
                    expr = Expr::MethodCall {
                        receiver: Box::new(expr),
                        method,
                        args,
                    };
                }
                TokenType::PlusPlus | TokenType::MinusMinus => {
                    let target = match expr {
                        Expr::Ident(ref ident) => ident.clone(),
                        _ => break,
                    };
                    let delta = if self.check(&TokenType::PlusPlus) { 1 } else { -1 };
                    self.advance();
                    expr = Expr::Increment {
                        target,
                        delta,
                        postfix: true,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParserError> {
        match self.peek().token_type.clone() {
            TokenType::IntegerLiteral(value) => {
                self.advance();
                Ok(Expr::int(value))
            }
            TokenType::StringLiteral(value) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(value)))
            }
            TokenType::BoolLiteral(value) => {
                self.advance();
                Ok(Expr::boolean(value))
            }
            TokenType::NullLiteral => {
                self.advance();
                Ok(Expr::null())
            }
            TokenType::Identifier(name) => {
                self.advance();
                if self.check(&TokenType::LeftParen) {
                    let args = self.parse_arguments()?;
                    Ok(Expr::Call { callee: name, args })
                } else {
                    Ok(Expr::Ident(Ident::new(name)))
                }
            }
            TokenType::LeftParen => self.parse_parenthesized(),
            _ => Err(self.unexpected("expected expression")),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParserError> {
        self.expect(&TokenType::LeftParen, "expected '('")?;
        let mut args = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenType::RightParen, "expected ')' after arguments")?;
        Ok(args)
    }
}

/// Binary operator and its precedence (higher binds tighter)
fn binary_operator(token_type: &TokenType) -> Option<(BinaryOp, u8)> {
    let entry = match token_type {
        TokenType::PipePipe => (BinaryOp::Or, 1),
        TokenType::AmpAmp => (BinaryOp::And, 2),
        TokenType::EqualEqual => (BinaryOp::Eq, 3),
        TokenType::BangEqual => (BinaryOp::Ne, 3),
        TokenType::Less => (BinaryOp::Lt, 4),
        TokenType::LessEqual => (BinaryOp::Le, 4),
        TokenType::Greater => (BinaryOp::Gt, 4),
        TokenType::GreaterEqual => (BinaryOp::Ge, 4),
        TokenType::Plus => (BinaryOp::Add, 5),
        TokenType::Minus => (BinaryOp::Sub, 5),
        TokenType::Star => (BinaryOp::Mul, 6),
        TokenType::Slash => (BinaryOp::Div, 6),
        TokenType::Percent => (BinaryOp::Rem, 6),
        _ => return None,
    };
    Some(entry)
}
