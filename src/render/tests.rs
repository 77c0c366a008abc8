use super::*;
use crate::config::LoweringConfig;
use crate::pipeline::lower_procedure;
use crate::parser::parse_source;

fn render(source: &str) -> String {
    let procedure = parse_source(source, "test.java")
        .expect("parse should succeed")
        .procedures
        .remove(0);
    let class = lower_procedure(&procedure, &LoweringConfig::default()).expect("lowering should succeed");
    render_class(&class)
}

#[test]
fn test_class_skeleton() {
    let text = render("Iterator<Integer> count(int n) { for (int i = 0; i < n; i++) step(i); }");

    assert!(text.starts_with("public final class count$Generator implements java.util.Iterator<Integer> {"));
    assert!(text.contains("    private int n$0;\n"));
    assert!(text.contains("    private int i$1;\n"));
    assert!(text.contains("    private int selector$2;\n"));
    assert!(text.contains("    public count$Generator(int n) {\n        this.n$0 = n;\n        this.selector$2 = 1;\n"));
    assert!(text.contains("private boolean advance() {"));
    assert!(text.contains("dispatch0: while (true) {"));
    assert!(text.contains("switch (selector$2) {"));
    assert!(text.contains("case 0:\n                    break dispatch0;"));
    assert!(text.contains("throw new IllegalStateException(\"Unreachable generator step\");"));
    assert!(text.contains("public boolean hasNext() {"));
    assert!(text.contains("\"Called next on finished generator\""));
    assert!(text.trim_end().ends_with('}'));
}

#[test]
fn test_emit_renders_store_and_return() {
    let text = render("Iterator<Integer> gen() { step(1 + 2 * 3); }");
    assert!(text.contains("selector$0 = 2;\n"));
    assert!(text.contains("current$ = 1 + 2 * 3;\n"));
    assert!(text.contains("return true;"));
    assert!(text.contains("selector$0 = 0;\n"));
}

#[test]
fn test_jumps_continue_dispatch() {
    let text = render("Iterator<Integer> gen() { while (true) { step(1); } }");
    assert!(text.contains("continue dispatch0;"));
}

#[test]
fn test_plain_statements_use_field_names() {
    let text = render("Iterator<Integer> gen(int n) { int total = 0; total += n; step(total); }");
    assert!(text.contains("total$1 = 0;"));
    assert!(text.contains("total$1 += n$0;"));
}

#[test]
fn test_nested_machine_gets_own_method() {
    let text = render(
        "Iterator<Integer> gen() { try (Res r = open()) { step(1); } catch (IOException | Boom e) { step(2); } finally { log(\"done\"); } }",
    );
    assert!(text.contains("private boolean advance$1() {"));
    assert!(text.contains("dispatch1: while (true) {"));
    assert!(text.contains("guard1: while (true) {"));
    assert!(text.contains("if (advance$1()) {"));
    assert!(text.contains("failure$ instanceof IOException || failure$ instanceof Boom"));
    assert!(text.contains("failure$.addSuppressed(suppressed$);"));
    assert!(text.contains("throw sneakyThrow(rethrown$);"));
}

#[test]
fn test_parenthesizes_by_precedence() {
    let text = render("Iterator<Integer> gen(int a) { step((a + 1) * 2); step(a - (a - 1)); step(-a); }");
    assert!(text.contains("current$ = (a$0 + 1) * 2;"));
    assert!(text.contains("current$ = a$0 - (a$0 - 1);"));
    assert!(text.contains("current$ = -a$0;"));
}

#[test]
fn test_string_literals_are_escaped() {
    let text = render("Iterator<String> gen() { step(\"say \\\"hi\\\"\"); }");
    assert!(text.contains(r#"current$ = "say \"hi\"";"#));
}

#[test]
fn test_for_header_declares_type_once() {
    let mut procedure = parse_source(
        "Iterator<Integer> gen() { for (int i = 0; i < 2; i++) trace(i); step(1); }",
        "test.java",
    )
    .expect("parse should succeed")
    .procedures
    .remove(0);
    // A host-supplied tree may declare several loop variables
    let StmtKind::For { init, .. } = &mut procedure.body[0].kind else {
        panic!("expected a for loop, got {:?}", procedure.body[0].kind);
    };
    init.push(Stmt::synthetic(StmtKind::Local(LocalDecl {
        name: Ident::new("j"),
        ty: crate::ast::TypeRef::int(),
        init: Some(Expr::int(5)),
    })));

    let class = lower_procedure(&procedure, &LoweringConfig::default()).expect("lowering should succeed");
    let text = render_class(&class);
    assert!(text.contains("for (int i$0 = 0, j$1 = 5; i$0 < 2; i$0++) {"), "{}", text);
}
