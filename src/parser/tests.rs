use super::*;

fn parse_body(body: &str) -> Vec<Stmt> {
    let source = format!("Iterator<Integer> gen() {{ {} }}", body);
    let unit = parse_source(&source, "test.java").expect("parse should succeed");
    unit.procedures.into_iter().next().expect("one procedure").body
}

fn parse_error(source: &str) -> ParserError {
    parse_source(source, "test.java").expect_err("parse should fail")
}

// ==================== PROCEDURES ====================

#[test]
fn test_procedure_signature() {
    let unit = parse_source(
        "Iterator<String> words(int n, List<String> xs) { }\nIterator<Integer> empty() {}",
        "test.java",
    )
    .unwrap();

    assert_eq!(unit.procedures.len(), 2);
    let words = &unit.procedures[0];
    assert_eq!(words.name, "words");
    assert_eq!(words.element_type(), Some(TypeRef::named("String")));
    assert_eq!(words.params.len(), 2);
    assert_eq!(words.params[1].ty.to_string(), "List<String>");
    assert_eq!(words.location.line, 1);
    assert_eq!(unit.procedures[1].location.line, 2);
}

#[test]
fn test_nested_generic_return_type() {
    let unit = parse_source("Iterator<Map<String, List<Integer>>> g() {}", "t.java").unwrap();
    assert_eq!(
        unit.procedures[0].element_type().unwrap().to_string(),
        "Map<String, List<Integer>>"
    );
}

// ==================== STATEMENTS ====================

#[test]
fn test_declaration_and_marker() {
    let body = parse_body("int x = 1; step(x + 1);");
    assert!(matches!(&body[0].kind, StmtKind::Local(decl) if decl.name.name == "x" && decl.ty == TypeRef::int()));
    match &body[1].kind {
        StmtKind::Expr(Expr::Call { callee, args }) => {
            assert_eq!(callee, "step");
            assert!(matches!(args[0], Expr::Binary { op: BinaryOp::Add, .. }));
        }
        other => panic!("expected call, got {:?}", other),
    }
}

#[test]
fn test_for_loop_header() {
    let body = parse_body("for (int i = 0; i < 10; i++, j--) { step(i); }");
    match &body[0].kind {
        StmtKind::For { init, cond, update, .. } => {
            assert_eq!(init.len(), 1);
            assert!(cond.is_some());
            assert_eq!(update.len(), 2);
            assert!(matches!(update[1], Expr::Increment { delta: -1, postfix: true, .. }));
        }
        other => panic!("expected for loop, got {:?}", other),
    }
}

#[test]
fn test_empty_for_header() {
    let body = parse_body("for (;;) break;");
    assert!(matches!(
        &body[0].kind,
        StmtKind::For { init, cond: None, update, .. } if init.is_empty() && update.is_empty()
    ));
}

#[test]
fn test_foreach_loop() {
    let body = parse_body("for (String s : names) step(s);");
    match &body[0].kind {
        StmtKind::ForEach { var, iterable, .. } => {
            assert_eq!(var.name.name, "s");
            assert_eq!(var.ty, TypeRef::named("String"));
            assert!(matches!(iterable, Expr::Ident(i) if i.name == "names"));
        }
        other => panic!("expected for-each, got {:?}", other),
    }
}

#[test]
fn test_do_while_and_labels() {
    let body = parse_body("outer: do { continue outer; } while (x > 0);");
    match &body[0].kind {
        StmtKind::Labeled { label, body } => {
            assert_eq!(label, "outer");
            assert!(matches!(body.kind, StmtKind::DoWhile { .. }));
        }
        other => panic!("expected labeled statement, got {:?}", other),
    }
}

#[test]
fn test_switch_cases() {
    let body = parse_body("switch (x) { case 1: step(1); case -2: step(2); break; default: }");
    match &body[0].kind {
        StmtKind::Switch { cases, .. } => {
            assert_eq!(cases.len(), 3);
            assert_eq!(cases[1].labels, vec![Expr::int(-2)]);
            assert_eq!(cases[1].body.len(), 2);
            assert!(cases[2].is_default);
            assert!(cases[2].body.is_empty());
        }
        other => panic!("expected switch, got {:?}", other),
    }
}

#[test]
fn test_duplicate_default_is_rejected() {
    let err = parse_error("Iterator<Integer> g() { switch (x) { default: default: } }");
    assert!(matches!(err, ParserError::InvalidSyntax { .. }));
}

#[test]
fn test_try_with_resources_and_multi_catch() {
    let body = parse_body(
        "try (Res a = resource(\"a\"); Res b = resource(\"b\");) { step(1); } \
         catch (IllegalStateException | IllegalArgumentException e) { step(2); } \
         finally { trace(\"done\"); }",
    );
    match &body[0].kind {
        StmtKind::Try(stmt) => {
            assert_eq!(stmt.resources.len(), 2);
            assert_eq!(stmt.catches.len(), 1);
            assert_eq!(stmt.catches[0].types.len(), 2);
            assert!(stmt.finally.is_some());
        }
        other => panic!("expected try, got {:?}", other),
    }
}

#[test]
fn test_bare_try_is_rejected() {
    let err = parse_error("Iterator<Integer> g() { try { } }");
    assert!(err.to_string().contains("without 'catch'"));
}

#[test]
fn test_synchronized_and_jumps() {
    let body = parse_body("synchronized (lock) { x++; } return; throw error(\"boom\");");
    assert!(matches!(body[0].kind, StmtKind::Synchronized { .. }));
    assert_eq!(body[1].kind, StmtKind::Return(None));
    assert!(matches!(body[2].kind, StmtKind::Throw(Expr::Call { .. })));
}

// ==================== EXPRESSIONS ====================

#[test]
fn test_operator_precedence() {
    let body = parse_body("x = a + b * c == d || !e;");
    let StmtKind::Expr(Expr::Assign { value, .. }) = &body[0].kind else {
        panic!("expected assignment");
    };
    match value.as_ref() {
        Expr::Binary { op: BinaryOp::Or, lhs, rhs } => {
            assert!(matches!(lhs.as_ref(), Expr::Binary { op: BinaryOp::Eq, .. }));
            assert!(matches!(rhs.as_ref(), Expr::Unary { op: UnaryOp::Not, .. }));
        }
        other => panic!("unexpected tree {:?}", other),
    }
}

#[test]
fn test_compound_assignment_is_right_associative() {
    let body = parse_body("a += b = 2;");
    match &body[0].kind {
        StmtKind::Expr(Expr::Assign { op: Some(BinaryOp::Add), value, .. }) => {
            assert!(matches!(value.as_ref(), Expr::Assign { op: None, .. }));
        }
        other => panic!("unexpected tree {:?}", other),
    }
}

#[test]
fn test_method_chain() {
    let body = parse_body("step(xs.iterator().next());");
    let StmtKind::Expr(Expr::Call { args, .. }) = &body[0].kind else {
        panic!("expected call");
    };
    match &args[0] {
        Expr::MethodCall { receiver, method, .. } => {
            assert_eq!(method, "next");
            assert!(matches!(receiver.as_ref(), Expr::MethodCall { method, .. } if method == "iterator"));
        }
        other => panic!("unexpected tree {:?}", other),
    }
}

#[test]
fn test_invalid_assignment_target() {
    let err = parse_error("Iterator<Integer> g() { f() = 1; }");
    assert!(matches!(err, ParserError::InvalidSyntax { ref message, .. } if message == "invalid assignment target"));
}

#[test]
fn test_missing_semicolon_reports_location() {
    let err = parse_error("Iterator<Integer> g() {\n  step(1)\n}");
    match err {
        ParserError::UnexpectedToken { found, location, .. } => {
            assert_eq!(found, "'}'");
            assert_eq!(location.line, 3);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_unclosed_block() {
    let err = parse_error("Iterator<Integer> g() { step(1);");
    assert!(matches!(err, ParserError::UnexpectedToken { ref found, .. } if found == "end of input"));
}
