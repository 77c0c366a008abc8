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

//! Lexical analysis for generator procedures
//!
//! Tokenizes the brace-and-semicolon surface syntax used to write input
//! trees by hand.

use crate::error::{LexerError, SourceLocation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenType {
    // Delimiters
    LeftParen,  // (
    RightParen, // )
    LeftBrace,  // {
    RightBrace, // }

    // Punctuation
    Semicolon, // ;
    Colon,     // :
    Comma,     // ,
    Dot,       // .
    Pipe,      // | (multi-catch)

    // Operators - Arithmetic
    Plus,       // +
    Minus,      // -
    Star,       // *
    Slash,      // /
    Percent,    // %
    PlusPlus,   // ++
    MinusMinus, // --

    // Operators - Comparison
    EqualEqual,   // ==
    BangEqual,    // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=

    // Operators - Logical
    AmpAmp,   // &&
    PipePipe, // ||
    Bang,     // !

    // Operators - Assignment
    Equal,        // =
    PlusEqual,    // +=
    MinusEqual,   // -=
    StarEqual,    // *=
    SlashEqual,   // /=
    PercentEqual, // %=

    // Literals
    IntegerLiteral(i64),
    StringLiteral(String),
    BoolLiteral(bool),
    NullLiteral,

    // Identifiers and Keywords
    Identifier(String),
    Keyword(Keyword),

    // Special
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    If,
    Else,
    While,
    Do,
    For,
    Switch,
    Case,
    Default,
    Try,
    Catch,
    Finally,
    Synchronized,
    Return,
    Break,
    Continue,
    Throw,
}

/// A token with its type and location information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub token_type: TokenType,
    pub location: SourceLocation,
    pub lexeme: String,
}

impl Token {
    pub fn new(token_type: TokenType, location: SourceLocation, lexeme: String) -> Self {
        Self {
            token_type,
            location,
            lexeme,
        }
    }
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
    line: usize,
    column: usize,
    file_name: String,
    keywords: HashMap<&'static str, Keyword>,
}

impl Lexer {
    pub fn new(input: &str, file_name: String) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        let mut lexer = Self {
            input: chars,
            position: 0,
            current_char,
            line: 1,
            column: 1,
            file_name,
            keywords: HashMap::new(),
        };

        lexer.initialize_keywords();
        lexer
    }

    fn initialize_keywords(&mut self) {
        // Control flow
        self.keywords.insert("if", Keyword::If);
        self.keywords.insert("else", Keyword::Else);
        self.keywords.insert("while", Keyword::While);
        self.keywords.insert("do", Keyword::Do);
        self.keywords.insert("for", Keyword::For);
        self.keywords.insert("switch", Keyword::Switch);
        self.keywords.insert("case", Keyword::Case);
        self.keywords.insert("default", Keyword::Default);
        self.keywords.insert("return", Keyword::Return);
        self.keywords.insert("break", Keyword::Break);
        self.keywords.insert("continue", Keyword::Continue);

        // Error handling
        self.keywords.insert("try", Keyword::Try);
        self.keywords.insert("catch", Keyword::Catch);
        self.keywords.insert("finally", Keyword::Finally);
        self.keywords.insert("throw", Keyword::Throw);

        self.keywords.insert("synchronized", Keyword::Synchronized);
    }

    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(
            self.file_name.clone(),
            self.line,
            self.column,
            self.position,
        )
    }

    fn advance(&mut self) {
        if self.current_char == Some('\n') {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Skip a line comment until end of line or EOF
    fn skip_line_comment(&mut self) {
        // Positioned on the second '/'
        self.advance();

        while let Some(ch) = self.current_char {
            self.advance();
            if ch == '\n' {
                break;
            }
        }
    }

    /// Skip a block comment (/* ... */). Block comments do not nest.
    fn skip_block_comment(&mut self, start_location: SourceLocation) -> Result<(), LexerError> {
        // Positioned on the '*' that opened the comment
        self.advance();

        loop {
            match self.current_char {
                Some('*') => {
                    self.advance();
                    if self.current_char == Some('/') {
                        self.advance();
                        return Ok(());
                    }
                }
                Some(_) => self.advance(),
                None => {
                    return Err(LexerError::UnterminatedBlockComment {
                        location: start_location,
                    })
                }
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, LexerError> {
        let start_location = self.current_location();
        let mut number_str = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() || ch == '_' {
                number_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Java-style long suffix
        if matches!(self.current_char, Some('L') | Some('l')) {
            self.advance();
        }

        if self.current_char.is_some_and(|c| c.is_ascii_alphabetic()) {
            while let Some(ch) = self.current_char {
                if !ch.is_ascii_alphanumeric() {
                    break;
                }
                number_str.push(ch);
                self.advance();
            }
            return Err(LexerError::InvalidNumber {
                value: number_str,
                location: start_location,
            });
        }

        match number_str.replace('_', "").parse::<i64>() {
            Ok(value) => Ok(Token::new(
                TokenType::IntegerLiteral(value),
                start_location,
                number_str,
            )),
            Err(_) => Err(LexerError::InvalidNumber {
                value: number_str,
                location: start_location,
            }),
        }
    }

    fn read_string(&mut self) -> Result<Token, LexerError> {
        let start_location = self.current_location();
        let mut string_value = String::new();
        let mut lexeme = String::from('"');

        // Skip opening quote
        self.advance();

        while let Some(ch) = self.current_char {
            match ch {
                '"' => {
                    lexeme.push(ch);
                    self.advance();
                    return Ok(Token::new(
                        TokenType::StringLiteral(string_value),
                        start_location,
                        lexeme,
                    ));
                }
                '\\' => {
                    lexeme.push(ch);
                    self.advance();
                    let escaped = match self.current_char {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some('\'') => '\'',
                        Some('0') => '\0',
                        Some(other) => {
                            return Err(LexerError::InvalidEscapeSequence {
                                sequence: other.to_string(),
                                location: self.current_location(),
                            });
                        }
                        None => {
                            return Err(LexerError::UnterminatedString {
                                location: start_location,
                            });
                        }
                    };
                    if let Some(raw) = self.current_char {
                        lexeme.push(raw);
                    }
                    string_value.push(escaped);
                    self.advance();
                }
                '\n' | '\r' => {
                    return Err(LexerError::UnterminatedString {
                        location: start_location,
                    });
                }
                _ => {
                    string_value.push(ch);
                    lexeme.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexerError::UnterminatedString {
            location: start_location,
        })
    }

    fn read_identifier(&mut self) -> Token {
        let start_location = self.current_location();
        let mut identifier = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                identifier.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let token_type = match identifier.as_str() {
            "true" => TokenType::BoolLiteral(true),
            "false" => TokenType::BoolLiteral(false),
            "null" => TokenType::NullLiteral,
            other => match self.keywords.get(other) {
                Some(keyword) => TokenType::Keyword(*keyword),
                None => TokenType::Identifier(identifier.clone()),
            },
        };

        Token::new(token_type, start_location, identifier)
    }

    /// Consume one character and produce `single`, or two when the next
    /// character is `second` and produce `double`
    fn one_or_two(
        &mut self,
        location: SourceLocation,
        single: (TokenType, &str),
        second: char,
        double: (TokenType, &str),
    ) -> Token {
        self.advance();
        if self.current_char == Some(second) {
            self.advance();
            Token::new(double.0, location, double.1.to_string())
        } else {
            Token::new(single.0, location, single.1.to_string())
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        loop {
            self.skip_whitespace();
            let location = self.current_location();

            let token = match self.current_char {
                None => Token::new(TokenType::Eof, location, String::new()),

                Some(ch) if ch.is_ascii_alphabetic() || ch == '_' || ch == '$' => {
                    self.read_identifier()
                }
                Some(ch) if ch.is_ascii_digit() => self.read_number()?,
                Some('"') => self.read_string()?,

                // Delimiters and punctuation
                Some('(') => self.single(TokenType::LeftParen, location, "("),
                Some(')') => self.single(TokenType::RightParen, location, ")"),
                Some('{') => self.single(TokenType::LeftBrace, location, "{"),
                Some('}') => self.single(TokenType::RightBrace, location, "}"),
                Some(';') => self.single(TokenType::Semicolon, location, ";"),
                Some(':') => self.single(TokenType::Colon, location, ":"),
                Some(',') => self.single(TokenType::Comma, location, ","),
                Some('.') => self.single(TokenType::Dot, location, "."),

                // Arithmetic and assignment
                Some('+') => {
                    self.advance();
                    match self.current_char {
                        Some('+') => self.single(TokenType::PlusPlus, location, "++"),
                        Some('=') => self.single(TokenType::PlusEqual, location, "+="),
                        _ => Token::new(TokenType::Plus, location, "+".to_string()),
                    }
                }
                Some('-') => {
                    self.advance();
                    match self.current_char {
                        Some('-') => self.single(TokenType::MinusMinus, location, "--"),
                        Some('=') => self.single(TokenType::MinusEqual, location, "-="),
                        _ => Token::new(TokenType::Minus, location, "-".to_string()),
                    }
                }
                Some('*') => self.one_or_two(
                    location,
                    (TokenType::Star, "*"),
                    '=',
                    (TokenType::StarEqual, "*="),
                ),
                Some('%') => self.one_or_two(
                    location,
                    (TokenType::Percent, "%"),
                    '=',
                    (TokenType::PercentEqual, "%="),
                ),
                Some('/') => {
                    self.advance();
                    match self.current_char {
                        Some('/') => {
                            self.skip_line_comment();
                            continue;
                        }
                        Some('*') => {
                            self.skip_block_comment(location)?;
                            continue;
                        }
                        Some('=') => self.single(TokenType::SlashEqual, location, "/="),
                        _ => Token::new(TokenType::Slash, location, "/".to_string()),
                    }
                }

                // Comparison and logic
                Some('=') => self.one_or_two(
                    location,
                    (TokenType::Equal, "="),
                    '=',
                    (TokenType::EqualEqual, "=="),
                ),
                Some('!') => self.one_or_two(
                    location,
                    (TokenType::Bang, "!"),
                    '=',
                    (TokenType::BangEqual, "!="),
                ),
                Some('<') => self.one_or_two(
                    location,
                    (TokenType::Less, "<"),
                    '=',
                    (TokenType::LessEqual, "<="),
                ),
                Some('>') => self.one_or_two(
                    location,
                    (TokenType::Greater, ">"),
                    '=',
                    (TokenType::GreaterEqual, ">="),
                ),
                Some('|') => self.one_or_two(
                    location,
                    (TokenType::Pipe, "|"),
                    '|',
                    (TokenType::PipePipe, "||"),
                ),
                Some('&') => {
                    self.advance();
                    if self.current_char == Some('&') {
                        self.single(TokenType::AmpAmp, location, "&&")
                    } else {
                        return Err(LexerError::UnexpectedCharacter {
                            character: '&',
                            location,
                        });
                    }
                }

                Some(ch) => {
                    return Err(LexerError::UnexpectedCharacter {
                        character: ch,
                        location,
                    })
                }
            };
            return Ok(token);
        }
    }

    /// Consume the current character and produce a token
    fn single(&mut self, token_type: TokenType, location: SourceLocation, lexeme: &str) -> Token {
        self.advance();
        Token::new(token_type, location, lexeme.to_string())
    }

    /// Tokenize the entire input; the last token is always `Eof`
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.token_type, TokenType::Eof);
            tokens.push(token);

            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Look up a keyword by name
    pub fn lookup_keyword(&self, name: &str) -> Option<Keyword> {
        self.keywords.get(name).copied()
    }
}

#[cfg(test)]
mod tests;
