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

//! Java-like source output for generator classes
//!
//! The root machine becomes `advance()`, every nested machine its own
//! `advance$N()`. Each is a labelled `while (true)` around a switch on the
//! machine's selector field. `advance` methods return `true` after storing
//! a value in `current$` and `false` once the machine has finished.

use crate::ast::{BinaryOp, Expr, Ident, Literal, LocalDecl, Stmt, StmtKind, SymbolId, UnaryOp};
use crate::builder::GeneratorClass;
use crate::machine::{Guard, Machine, MachineId, Op, StateId, Tag};

#[cfg(test)]
mod tests;

const INDENT: &str = "    ";

/// Render `class` as source text
pub fn render_class(class: &GeneratorClass) -> String {
    let mut printer = Printer {
        class,
        out: String::new(),
        indent: 0,
        label: String::new(),
        selector: String::new(),
    };
    printer.class_decl();
    printer.out
}

/// Name of the advance method of a machine
pub fn advance_method(id: MachineId) -> String {
    if id == MachineId::ROOT {
        "advance".to_string()
    } else {
        format!("advance${}", id.0)
    }
}

struct Printer<'c> {
    class: &'c GeneratorClass,
    out: String,
    indent: usize,
    /// Dispatch label of the machine being printed
    label: String,
    /// Selector field of the machine being printed
    selector: String,
}

impl Printer<'_> {
    fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.indent += 1;
        f(self);
        self.indent -= 1;
    }

    fn field(&self, symbol: SymbolId) -> String {
        self.class.symbols.display(symbol)
    }

    fn ident(&self, ident: &Ident) -> String {
        match ident.symbol {
            Some(symbol) => self.field(symbol),
            None => ident.name.clone(),
        }
    }

    fn state_of(&self, tag: Tag) -> i64 {
        self.class
            .tags
            .target(tag)
            .map_or(-1, |state| state.0 as i64)
    }

    // ==================== CLASS ====================

    fn class_decl(&mut self) {
        let class = self.class;
        self.line(format!(
            "public final class {} implements java.util.Iterator<{}> {{",
            class.name, class.element_type
        ));
        self.nested(|p| {
            for capture in class.captures.iter() {
                p.line(format!("private {} {};", capture.ty, capture.name));
            }
            p.line(format!("private {} current$;", class.element_type));
            p.line("private boolean buffered$;");
            p.blank();

            p.constructor();
            for machine in class.advance.machines() {
                p.blank();
                p.machine(machine);
            }
            p.blank();
            p.protocol();
        });
        self.line("}");
    }

    fn constructor(&mut self) {
        let class = self.class;
        let params = class
            .params
            .iter()
            .map(|param| format!("{} {}", param.ty, param.name.name))
            .collect::<Vec<_>>()
            .join(", ");
        self.line(format!("public {}({}) {{", class.name, params));
        self.nested(|p| {
            for param in &class.params {
                p.line(format!("this.{} = {};", p.ident(&param.name), param.name.name));
            }
            p.line(format!(
                "this.{} = {};",
                p.field(class.advance.selector),
                StateId::START
            ));
        });
        self.line("}");
    }

    fn protocol(&mut self) {
        let class = self.class;
        let root_selector = self.field(class.advance.selector);

        self.line("@Override");
        self.line("public boolean hasNext() {");
        self.nested(|p| {
            p.line("if (!buffered$) {");
            p.nested(|p| {
                p.line("try {");
                p.nested(|p| p.line("buffered$ = advance();"));
                p.line("} catch (Throwable failure$) {");
                p.nested(|p| {
                    p.line(format!("{} = {};", root_selector, StateId::FINISHED));
                    p.line("throw sneakyThrow(failure$);");
                });
                p.line("}");
            });
            p.line("}");
            p.line("return buffered$;");
        });
        self.line("}");
        self.blank();

        self.line("@Override");
        self.line(format!("public {} next() {{", class.element_type));
        self.nested(|p| {
            p.line("if (!hasNext()) {");
            p.nested(|p| {
                p.line(
                    "throw new java.util.NoSuchElementException(\"Called next on finished generator\");",
                )
            });
            p.line("}");
            p.line(format!("{} value$ = current$;", class.element_type));
            p.line("current$ = null;");
            p.line("buffered$ = false;");
            p.line("return value$;");
        });
        self.line("}");
        self.blank();

        self.line("@SuppressWarnings(\"unchecked\")");
        self.line(
            "private static <T extends Throwable> RuntimeException sneakyThrow(Throwable t) throws T {",
        );
        self.nested(|p| p.line("throw (T) t;"));
        self.line("}");
    }

    // ==================== MACHINES ====================

    fn machine(&mut self, machine: &Machine) {
        let selector = self.field(machine.selector);
        let saved_label = std::mem::replace(&mut self.label, format!("dispatch{}", machine.id.0));
        let saved_selector = std::mem::replace(&mut self.selector, selector);

        self.line(format!("private boolean {}() {{", advance_method(machine.id)));
        self.nested(|p| {
            p.line(format!("{}: while (true) {{", p.label));
            p.nested(|p| {
                p.line(format!("switch ({}) {{", p.selector));
                p.nested(|p| {
                    p.line(format!("case {}:", StateId::FINISHED));
                    p.nested(|p| p.line(format!("break {};", p.label)));
                    for state in &machine.states {
                        p.line(format!("case {}: {{", state.id));
                        p.nested(|p| p.ops(&state.ops));
                        p.line("}");
                    }
                    p.line("default:");
                    p.nested(|p| {
                        p.line("throw new IllegalStateException(\"Unreachable generator step\");")
                    });
                });
                p.line("}");
            });
            p.line("}");
            p.line("return false;");
        });
        self.line("}");

        self.label = saved_label;
        self.selector = saved_selector;
    }

    fn ops(&mut self, ops: &[Op]) {
        for op in ops {
            self.op(op);
        }
    }

    fn op(&mut self, op: &Op) {
        match op {
            Op::Plain(stmt) => self.stmt(stmt),
            Op::Assign { target, value } => {
                let text = format!("{} = {};", self.field(*target), self.expr(value));
                self.line(text);
            }
            Op::Clear(symbol) => {
                let text = format!("{} = null;", self.field(*symbol));
                self.line(text);
            }
            Op::SetState(tag) => {
                let text = format!("{} = {};", self.selector, self.state_of(*tag));
                self.line(text);
            }
            Op::Jump(tag) => {
                let text = format!("{} = {};", self.selector, self.state_of(*tag));
                self.line(text);
                let text = format!("continue {};", self.label);
                self.line(text);
            }
            Op::Yield(value) => {
                let text = format!("current$ = {};", self.expr(value));
                self.line(text);
                self.line("return true;");
            }
            Op::Finish => {
                let text = format!("{} = {};", self.selector, StateId::FINISHED);
                self.line(text);
                self.line("return false;");
            }
            Op::If {
                cond,
                then_ops,
                else_ops,
            } => {
                let text = format!("if ({}) {{", self.expr(cond));
                self.line(text);
                self.nested(|p| p.ops(then_ops));
                if !else_ops.is_empty() {
                    self.line("} else {");
                    self.nested(|p| p.ops(else_ops));
                }
                self.line("}");
            }
            Op::Switch { selector, arms } => {
                let text = format!("switch ({}) {{", self.expr(selector));
                self.line(text);
                self.nested(|p| {
                    for arm in arms {
                        for label in &arm.labels {
                            let text = format!("case {}:", p.expr(label));
                            p.line(text);
                        }
                        if arm.is_default {
                            p.line("default:");
                        }
                        p.nested(|p| {
                            let text = format!("{} = {};", p.selector, p.state_of(arm.target));
                            p.line(text);
                            let text = format!("continue {};", p.label);
                            p.line(text);
                        });
                    }
                });
                self.line("}");
            }
            Op::Synchronized { lock, body } => {
                let text = format!("synchronized ({}) {{", self.expr(lock));
                self.line(text);
                self.nested(|p| p.ops(body));
                self.line("}");
            }
            Op::Guard(guard) => self.guard(guard),
            Op::RethrowPending(pending) => {
                let field = self.field(*pending);
                self.line(format!("if ({} != null) {{", field));
                self.nested(|p| {
                    p.line(format!("Throwable rethrown$ = {};", field));
                    p.line(format!("{} = null;", field));
                    p.line("throw sneakyThrow(rethrown$);");
                });
                self.line("}");
            }
        }
    }

    fn guard(&mut self, guard: &Guard) {
        let label = format!("guard{}", guard.machine.id.0);
        let handling = self.field(guard.in_handler);
        let pending = self.field(guard.pending);
        let nested_selector = self.field(guard.machine.selector);

        self.line(format!("{}: while (true) {{", label));
        self.nested(|p| {
            p.line("try {");
            p.nested(|p| {
                p.line(format!("if ({}()) {{", advance_method(guard.machine.id)));
                p.nested(|p| p.line("return true;"));
                p.line("}");
                if !guard.resources.is_empty() {
                    p.line(format!("if (!{}) {{", handling));
                    p.nested(|p| p.close_resources(&guard.resources, false));
                    p.line("}");
                }
                p.line(format!("break {};", label));
            });
            p.line("} catch (Throwable failure$) {");
            p.nested(|p| {
                p.line(format!("if ({}) {{", handling));
                p.nested(|p| {
                    p.line(format!("{} = failure$;", pending));
                    p.line(format!("break {};", label));
                });
                p.line("}");
                p.close_resources(&guard.resources, true);
                p.line(format!("{} = -1;", p.field(guard.pending_jump)));
                for handler in &guard.handlers {
                    let test = handler
                        .types
                        .iter()
                        .map(|ty| format!("failure$ instanceof {}", ty))
                        .collect::<Vec<_>>()
                        .join(" || ");
                    let param_ty = p
                        .class
                        .captures
                        .get(handler.param)
                        .map(|capture| capture.ty.to_string())
                        .unwrap_or_else(|| "Throwable".to_string());
                    p.line(format!("if ({}) {{", test));
                    p.nested(|p| {
                        p.line(format!("{} = true;", handling));
                        p.line(format!("{} = ({}) failure$;", p.field(handler.param), param_ty));
                        p.line(format!("{} = {};", nested_selector, p.state_of(handler.entry)));
                        p.line(format!("continue {};", label));
                    });
                    p.line("}");
                }
                p.line(format!("{} = failure$;", pending));
                p.line(format!("break {};", label));
            });
            p.line("}");
        });
        self.line("}");
    }

    /// Close resource fields in reverse order, nulling each before closing
    fn close_resources(&mut self, resources: &[SymbolId], suppress: bool) {
        for resource in resources.iter().rev() {
            let field = self.field(*resource);
            self.line(format!("if ({} != null) {{", field));
            self.nested(|p| {
                p.line(format!("AutoCloseable closing$ = {};", field));
                p.line(format!("{} = null;", field));
                if suppress {
                    p.line("try {");
                    p.nested(|p| p.line("closing$.close();"));
                    p.line("} catch (Throwable suppressed$) {");
                    p.nested(|p| p.line("failure$.addSuppressed(suppressed$);"));
                    p.line("}");
                } else {
                    p.line("closing$.close();");
                }
            });
            self.line("}");
        }
    }

    // ==================== STATEMENTS ====================

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    /// Body of a compound statement, without the surrounding braces
    fn body(&mut self, stmt: &Stmt) {
        self.nested(|p| match &stmt.kind {
            StmtKind::Block(stmts) => p.stmts(stmts),
            _ => p.stmt(stmt),
        });
    }

    fn local(&self, decl: &LocalDecl) -> String {
        match &decl.init {
            Some(init) => format!("{} {} = {}", decl.ty, self.ident(&decl.name), self.expr(init)),
            None => format!("{} {}", decl.ty, self.ident(&decl.name)),
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Empty => self.line(";"),
            StmtKind::Expr(expr) => {
                let text = format!("{};", self.expr(expr));
                self.line(text);
            }
            StmtKind::Local(decl) => {
                let text = format!("{};", self.local(decl));
                self.line(text);
            }
            StmtKind::Block(stmts) => {
                self.line("{");
                self.nested(|p| p.stmts(stmts));
                self.line("}");
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let text = format!("if ({}) {{", self.expr(cond));
                self.line(text);
                self.body(then_branch);
                if let Some(else_branch) = else_branch {
                    self.line("} else {");
                    self.body(else_branch);
                }
                self.line("}");
            }
            StmtKind::While { cond, body } => {
                let text = format!("while ({}) {{", self.expr(cond));
                self.line(text);
                self.body(body);
                self.line("}");
            }
            StmtKind::DoWhile { body, cond } => {
                self.line("do {");
                self.body(body);
                let text = format!("}} while ({});", self.expr(cond));
                self.line(text);
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                // One declaration statement: the type is written once
                let init = init
                    .iter()
                    .enumerate()
                    .map(|(index, s)| match &s.kind {
                        StmtKind::Local(decl) if index == 0 => self.local(decl),
                        StmtKind::Local(decl) => match &decl.init {
                            Some(value) => format!("{} = {}", self.ident(&decl.name), self.expr(value)),
                            None => self.ident(&decl.name),
                        },
                        StmtKind::Expr(expr) => self.expr(expr),
                        _ => String::new(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                let cond = cond.as_ref().map(|c| self.expr(c)).unwrap_or_default();
                let update = update
                    .iter()
                    .map(|u| self.expr(u))
                    .collect::<Vec<_>>()
                    .join(", ");
                self.line(format!("for ({}; {}; {}) {{", init, cond, update));
                self.body(body);
                self.line("}");
            }
            StmtKind::ForEach {
                var,
                iterable,
                body,
            } => {
                let text = format!(
                    "for ({} {} : {}) {{",
                    var.ty,
                    self.ident(&var.name),
                    self.expr(iterable)
                );
                self.line(text);
                self.body(body);
                self.line("}");
            }
            StmtKind::Switch { selector, cases } => {
                let text = format!("switch ({}) {{", self.expr(selector));
                self.line(text);
                self.nested(|p| {
                    for case in cases {
                        for label in &case.labels {
                            let text = format!("case {}:", p.expr(label));
                            p.line(text);
                        }
                        if case.is_default {
                            p.line("default:");
                        }
                        p.nested(|p| p.stmts(&case.body));
                    }
                });
                self.line("}");
            }
            StmtKind::Try(try_stmt) => {
                if try_stmt.resources.is_empty() {
                    self.line("try {");
                } else {
                    let resources = try_stmt
                        .resources
                        .iter()
                        .map(|r| self.local(r))
                        .collect::<Vec<_>>()
                        .join("; ");
                    self.line(format!("try ({}) {{", resources));
                }
                self.nested(|p| p.stmts(&try_stmt.body));
                for catch in &try_stmt.catches {
                    let types = catch
                        .types
                        .iter()
                        .map(|t| t.to_string())
                        .collect::<Vec<_>>()
                        .join(" | ");
                    let text = format!("}} catch ({} {}) {{", types, self.ident(&catch.param));
                    self.line(text);
                    self.nested(|p| p.stmts(&catch.body));
                }
                if let Some(finally) = &try_stmt.finally {
                    self.line("} finally {");
                    self.nested(|p| p.stmts(finally));
                }
                self.line("}");
            }
            StmtKind::Labeled { label, body } => {
                self.line(format!("{}:", label));
                self.stmt(body);
            }
            StmtKind::Synchronized { lock, body } => {
                let text = format!("synchronized ({}) {{", self.expr(lock));
                self.line(text);
                self.nested(|p| p.stmts(body));
                self.line("}");
            }
            StmtKind::Return(None) => self.line("return;"),
            StmtKind::Return(Some(value)) => {
                let text = format!("return {};", self.expr(value));
                self.line(text);
            }
            StmtKind::Break(None) => self.line("break;"),
            StmtKind::Break(Some(label)) => self.line(format!("break {};", label)),
            StmtKind::Continue(None) => self.line("continue;"),
            StmtKind::Continue(Some(label)) => self.line(format!("continue {};", label)),
            StmtKind::Throw(value) => {
                let text = format!("throw {};", self.expr(value));
                self.line(text);
            }
        }
    }

    // ==================== EXPRESSIONS ====================

    fn expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(literal) => literal_text(literal),
            Expr::Ident(ident) => self.ident(ident),
            Expr::Unary { op, operand } => {
                let symbol = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                };
                format!("{}{}", symbol, self.operand(operand, UNARY_PRECEDENCE))
            }
            Expr::Binary { op, lhs, rhs } => {
                let precedence = binary_precedence(*op);
                format!(
                    "{} {} {}",
                    self.operand(lhs, precedence),
                    op.symbol(),
                    self.operand(rhs, precedence + 1)
                )
            }
            Expr::Assign { target, op, value } => {
                let op = op.map(BinaryOp::symbol).unwrap_or("");
                format!("{} {}= {}", self.ident(target), op, self.expr(value))
            }
            Expr::Increment {
                target,
                delta,
                postfix,
            } => {
                let name = self.ident(target);
                match (*delta, *postfix) {
                    (1, true) => format!("{}++", name),
                    (1, false) => format!("++{}", name),
                    (-1, true) => format!("{}--", name),
                    (-1, false) => format!("--{}", name),
                    (delta, _) => format!("{} += {}", name, delta),
                }
            }
            Expr::Call { callee, args } => format!("{}({})", callee, self.args(args)),
            Expr::MethodCall {
                receiver,
                method,
                args,
            } => format!(
                "{}.{}({})",
                self.operand(receiver, PRIMARY_PRECEDENCE),
                method,
                self.args(args)
            ),
        }
    }

    /// `expr`, parenthesized when it binds looser than `min`
    fn operand(&self, expr: &Expr, min: u8) -> String {
        if precedence(expr) < min {
            format!("({})", self.expr(expr))
        } else {
            self.expr(expr)
        }
    }

    fn args(&self, args: &[Expr]) -> String {
        args.iter()
            .map(|a| self.expr(a))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

const UNARY_PRECEDENCE: u8 = 7;
const PRIMARY_PRECEDENCE: u8 = 8;

fn binary_precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Or => 1,
        BinaryOp::And => 2,
        BinaryOp::Eq | BinaryOp::Ne => 3,
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 4,
        BinaryOp::Add | BinaryOp::Sub => 5,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 6,
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Assign { .. } => 0,
        Expr::Binary { op, .. } => binary_precedence(*op),
        Expr::Unary { .. } => UNARY_PRECEDENCE,
        Expr::Literal(Literal::Int(value)) if *value < 0 => UNARY_PRECEDENCE,
        _ => PRIMARY_PRECEDENCE,
    }
}

fn literal_text(literal: &Literal) -> String {
    match literal {
        Literal::Int(value) => value.to_string(),
        Literal::Bool(value) => value.to_string(),
        Literal::Null => "null".to_string(),
        Literal::Str(text) => {
            let mut out = String::with_capacity(text.len() + 2);
            out.push('"');
            for c in text.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    '\r' => out.push_str("\\r"),
                    c => out.push(c),
                }
            }
            out.push('"');
            out
        }
    }
}
