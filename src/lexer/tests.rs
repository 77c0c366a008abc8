use super::*;

fn token_types(input: &str) -> Vec<TokenType> {
    let mut lexer = Lexer::new(input, "test.java".to_string());
    lexer
        .tokenize()
        .expect("tokenize should succeed")
        .into_iter()
        .map(|t| t.token_type)
        .collect()
}

// ==================== PUNCTUATION AND OPERATORS ====================

#[test]
fn test_delimiters() {
    assert_eq!(
        token_types("( ) { } ; : , ."),
        vec![
            TokenType::LeftParen,
            TokenType::RightParen,
            TokenType::LeftBrace,
            TokenType::RightBrace,
            TokenType::Semicolon,
            TokenType::Colon,
            TokenType::Comma,
            TokenType::Dot,
            TokenType::Eof,
        ]
    );
}

#[test]
fn test_compound_operators() {
    assert_eq!(
        token_types("++ -- += -= *= /= %= == != <= >= && || |"),
        vec![
            TokenType::PlusPlus,
            TokenType::MinusMinus,
            TokenType::PlusEqual,
            TokenType::MinusEqual,
            TokenType::StarEqual,
            TokenType::SlashEqual,
            TokenType::PercentEqual,
            TokenType::EqualEqual,
            TokenType::BangEqual,
            TokenType::LessEqual,
            TokenType::GreaterEqual,
            TokenType::AmpAmp,
            TokenType::PipePipe,
            TokenType::Pipe,
            TokenType::Eof,
        ]
    );
}

#[test]
fn test_increment_without_spaces() {
    assert_eq!(
        token_types("i++<n"),
        vec![
            TokenType::Identifier("i".to_string()),
            TokenType::PlusPlus,
            TokenType::Less,
            TokenType::Identifier("n".to_string()),
            TokenType::Eof,
        ]
    );
}

#[test]
fn test_single_ampersand_is_rejected() {
    let mut lexer = Lexer::new("a & b", "test.java".to_string());
    let err = lexer.tokenize().unwrap_err();
    assert!(matches!(err, LexerError::UnexpectedCharacter { character: '&', .. }));
}

// ==================== LITERALS AND KEYWORDS ====================

#[test]
fn test_literals() {
    assert_eq!(
        token_types(r#"42 1_000 7L "hi\n" true false null"#),
        vec![
            TokenType::IntegerLiteral(42),
            TokenType::IntegerLiteral(1000),
            TokenType::IntegerLiteral(7),
            TokenType::StringLiteral("hi\n".to_string()),
            TokenType::BoolLiteral(true),
            TokenType::BoolLiteral(false),
            TokenType::NullLiteral,
            TokenType::Eof,
        ]
    );
}

#[test]
fn test_keywords_and_identifiers() {
    assert_eq!(
        token_types("synchronized stepAll do $tmp"),
        vec![
            TokenType::Keyword(Keyword::Synchronized),
            TokenType::Identifier("stepAll".to_string()),
            TokenType::Keyword(Keyword::Do),
            TokenType::Identifier("$tmp".to_string()),
            TokenType::Eof,
        ]
    );

    let lexer = Lexer::new("", "test.java".to_string());
    assert_eq!(lexer.lookup_keyword("finally"), Some(Keyword::Finally));
    assert_eq!(lexer.lookup_keyword("step"), None);
}

#[test]
fn test_invalid_number() {
    let mut lexer = Lexer::new("12abc", "test.java".to_string());
    let err = lexer.tokenize().unwrap_err();
    assert!(matches!(err, LexerError::InvalidNumber { ref value, .. } if value == "12abc"));
}

#[test]
fn test_unterminated_string() {
    let mut lexer = Lexer::new("\"open\nclose\"", "test.java".to_string());
    assert!(matches!(
        lexer.tokenize(),
        Err(LexerError::UnterminatedString { .. })
    ));
}

#[test]
fn test_invalid_escape() {
    let mut lexer = Lexer::new(r#""\q""#, "test.java".to_string());
    assert!(matches!(
        lexer.tokenize(),
        Err(LexerError::InvalidEscapeSequence { ref sequence, .. }) if sequence == "q"
    ));
}

// ==================== COMMENTS AND LOCATIONS ====================

#[test]
fn test_comments_are_skipped() {
    assert_eq!(
        token_types("a // line\n/* block\n */ b / c"),
        vec![
            TokenType::Identifier("a".to_string()),
            TokenType::Identifier("b".to_string()),
            TokenType::Slash,
            TokenType::Identifier("c".to_string()),
            TokenType::Eof,
        ]
    );
}

#[test]
fn test_unterminated_block_comment() {
    let mut lexer = Lexer::new("x /* never closed", "test.java".to_string());
    let err = lexer.tokenize().unwrap_err();
    match err {
        LexerError::UnterminatedBlockComment { location } => {
            assert_eq!(location.line, 1);
            assert_eq!(location.column, 3);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_token_locations() {
    let mut lexer = Lexer::new("a\n  step(1);", "gen.java".to_string());
    let tokens = lexer.tokenize().unwrap();
    let step = &tokens[1];
    assert_eq!(step.lexeme, "step");
    assert_eq!(step.location.file, "gen.java");
    assert_eq!(step.location.line, 2);
    assert_eq!(step.location.column, 3);
    assert_eq!(step.location.offset, 4);
}
