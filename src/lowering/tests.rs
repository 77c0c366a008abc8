use super::*;
use crate::parser::parse_source;
use crate::semantic::remap_procedure;

fn lower_with(body: &str, config: &LoweringConfig) -> Result<LoweredBody> {
    let source = format!("Iterator<Integer> gen(int n) {{ {} }}", body);
    let procedure = parse_source(&source, "test.java")
        .expect("parse should succeed")
        .procedures
        .remove(0);
    let (remapped, symbols) = remap_procedure(&procedure);
    lower_body(&remapped, symbols, &TypeRef::named("Integer"), config)
}

fn lower(body: &str) -> Result<LoweredBody> {
    lower_with(body, &LoweringConfig::default())
}

fn ops(lowered: &LoweredBody, state: u32) -> &[Op] {
    &lowered
        .machine
        .state(StateId(state))
        .expect("state should exist")
        .ops
}

/// Every op of the root machine, including ops inside structural ops
fn all_ops(lowered: &LoweredBody) -> Vec<&Op> {
    fn walk<'a>(ops: &'a [Op], out: &mut Vec<&'a Op>) {
        for op in ops {
            out.push(op);
            match op {
                Op::If {
                    then_ops, else_ops, ..
                } => {
                    walk(then_ops, out);
                    walk(else_ops, out);
                }
                Op::Synchronized { body, .. } => walk(body, out),
                _ => {}
            }
        }
    }
    let mut out = Vec::new();
    for state in &lowered.machine.states {
        walk(&state.ops, &mut out);
    }
    out
}

// ==================== STRAIGHT-LINE CODE ====================

#[test]
fn test_each_emit_opens_a_state() {
    let lowered = lower("step(1); step(2);").unwrap();
    assert_eq!(lowered.machine.states.len(), 3);

    let Op::SetState(resume) = ops(&lowered, 1)[0] else {
        panic!("expected set-state, got {:?}", ops(&lowered, 1));
    };
    assert_eq!(ops(&lowered, 1)[1], Op::Yield(Expr::int(1)));
    assert_eq!(lowered.tags.target(resume), Some(StateId(2)));
    assert_eq!(ops(&lowered, 3), &[Op::Finish]);
}

#[test]
fn test_plain_statements_are_copied() {
    let lowered = lower("trace(1); step(2);").unwrap();
    assert!(matches!(&ops(&lowered, 1)[0], Op::Plain(stmt) if matches!(stmt.kind, StmtKind::Expr(_))));
    assert!(matches!(ops(&lowered, 1)[1], Op::SetState(_)));
}

#[test]
fn test_empty_body_finishes_immediately() {
    let lowered = lower("").unwrap();
    assert_eq!(lowered.machine.states.len(), 1);
    assert_eq!(ops(&lowered, 1), &[Op::Finish]);
}

#[test]
fn test_parameters_and_selector_are_captured() {
    let lowered = lower("step(n);").unwrap();
    assert_eq!(lowered.captures.names(), vec!["n$0", "selector$1"]);
    let selector = lowered.captures.get(lowered.machine.selector).unwrap();
    assert_eq!(selector.origin, CaptureOrigin::Selector);
    assert_eq!(
        lowered.captures.get(SymbolId(0)).unwrap().origin,
        CaptureOrigin::Parameter
    );
}

#[test]
fn test_emit_all_polls_delegate() {
    let lowered = lower("stepAll(xs);").unwrap();
    assert_eq!(lowered.machine.states.len(), 2);

    let delegate = lowered
        .captures
        .iter()
        .find(|c| c.name.starts_with("delegate$"))
        .expect("delegate captured");
    assert_eq!(delegate.ty.to_string(), "Iterator<Integer>");
    assert!(delegate.is_cleared());

    assert!(matches!(&ops(&lowered, 1)[0], Op::Assign { target, .. } if *target == delegate.symbol));
    assert!(matches!(ops(&lowered, 1)[1], Op::Jump(_)));

    let poll = ops(&lowered, 2);
    let Op::If { then_ops, else_ops, .. } = &poll[0] else {
        panic!("expected poll, got {:?}", poll);
    };
    assert!(matches!(then_ops.as_slice(), [Op::Yield(_)]));
    assert!(else_ops.is_empty());
    assert_eq!(poll[1], Op::Clear(delegate.symbol));
    assert_eq!(poll[2], Op::Finish);
}

// ==================== CONTROL FLOW ====================

#[test]
fn test_unsplit_conditional_stays_structural() {
    let lowered = lower("if (n > 0) { return; } step(1);").unwrap();
    let Op::If { then_ops, else_ops, .. } = &ops(&lowered, 1)[0] else {
        panic!("expected if");
    };
    assert_eq!(then_ops, &vec![Op::Finish]);
    assert!(else_ops.is_empty());
    assert_eq!(lowered.machine.states.len(), 2);
}

#[test]
fn test_split_conditional_joins() {
    let lowered = lower("if (n > 0) { step(1); } else { trace(2); } step(3);").unwrap();
    // START, resume after step(1), join, resume after step(3)
    assert_eq!(lowered.machine.states.len(), 4);

    let Op::If { else_ops, .. } = &ops(&lowered, 1)[0] else {
        panic!("expected if");
    };
    let Some(Op::Jump(join)) = else_ops.last() else {
        panic!("else branch should jump to the join state");
    };
    assert_eq!(lowered.tags.target(*join), Some(StateId(3)));
    assert_eq!(ops(&lowered, 2), &[Op::Jump(*join)]);
}

#[test]
fn test_counted_loop_layout() {
    let lowered = lower("for (int i = 0; i < n; i++) step(i);").unwrap();
    // START, body, resume, update, check, end
    assert_eq!(lowered.machine.states.len(), 6);

    assert!(matches!(ops(&lowered, 1)[0], Op::Assign { .. }));
    let Op::Jump(check) = ops(&lowered, 1)[1] else {
        panic!("expected jump to check");
    };
    assert_eq!(lowered.tags.target(check), Some(StateId(5)));

    assert!(matches!(&ops(&lowered, 4)[0], Op::Plain(_)));
    assert_eq!(ops(&lowered, 4)[1], Op::Jump(check));
    assert_eq!(ops(&lowered, 6), &[Op::Finish]);
}

#[test]
fn test_do_while_enters_body_first() {
    let lowered = lower("do { step(n); } while (n > 0);").unwrap();
    let Op::Jump(entry) = ops(&lowered, 1)[0] else {
        panic!("expected jump");
    };
    assert_eq!(lowered.tags.target(entry), Some(StateId(2)));
}

#[test]
fn test_foreach_clears_iteration_handle() {
    let lowered = lower("for (String s : names) { step(s); }").unwrap();
    let handle = lowered
        .captures
        .iter()
        .find(|c| c.name.starts_with("iter$"))
        .expect("iteration handle captured");
    assert_eq!(handle.ty.to_string(), "Iterator<String>");

    let end = ops(&lowered, lowered.machine.states.len() as u32);
    assert!(end.contains(&Op::Clear(handle.symbol)));
    assert_eq!(end.last(), Some(&Op::Finish));
}

#[test]
fn test_break_and_continue_jump_to_loop_states() {
    let lowered = lower("while (true) { step(1); if (n > 2) break; if (n > 1) continue; }").unwrap();
    let jumps: Vec<Tag> = all_ops(&lowered)
        .into_iter()
        .filter_map(|op| match op {
            Op::Jump(tag) => Some(*tag),
            _ => None,
        })
        .collect();
    assert!(lowered.tags.verify().is_ok());
    // break targets the end state, continue the check state
    let targets: Vec<StateId> = jumps.iter().filter_map(|t| lowered.tags.target(*t)).collect();
    let last = StateId(lowered.machine.states.len() as u32);
    assert!(targets.contains(&last));
    // body 2, resume 3, check 4
    assert!(targets.contains(&StateId(4)));
}

#[test]
fn test_labeled_break_leaves_outer_loop() {
    let lowered = lower("outer: while (true) { while (true) { step(1); break outer; } }").unwrap();
    let last = StateId(lowered.machine.states.len() as u32);
    assert_eq!(ops(&lowered, last.0), &[Op::Finish]);
    let reaches_end = all_ops(&lowered).into_iter().any(|op| match op {
        Op::Jump(tag) => lowered.tags.target(*tag) == Some(last),
        _ => false,
    });
    assert!(reaches_end);
}

#[test]
fn test_switch_dispatches_to_case_states() {
    let lowered = lower("switch (n) { case 1: step(1); case 2: step(2); break; }").unwrap();
    let Op::Switch { arms, .. } = &ops(&lowered, 1)[0] else {
        panic!("expected switch");
    };
    assert_eq!(arms.len(), 2);
    // Without a default the switch falls through to the end
    assert!(matches!(ops(&lowered, 1)[1], Op::Jump(_)));

    let first_case = lowered.tags.target(arms[0].target).unwrap();
    let second_case = lowered.tags.target(arms[1].target).unwrap();
    assert!(first_case < second_case);
}

#[test]
fn test_return_finishes_root_machine() {
    let lowered = lower("step(1); return;").unwrap();
    assert_eq!(ops(&lowered, 2), &[Op::Finish]);
}

// ==================== SCOPES ====================

#[test]
fn test_reference_locals_cleared_at_scope_end() {
    let lowered = lower("{ String s = name(); step(s); } step(2);").unwrap();
    let s = lowered
        .captures
        .iter()
        .find(|c| c.name.starts_with("s$"))
        .unwrap();
    assert!(s.is_cleared());
    assert_eq!(ops(&lowered, 2)[0], Op::Clear(s.symbol));
}

#[test]
fn test_clearing_can_be_disabled() {
    let config = LoweringConfig::from_json_str(r#"{"clear_references": false}"#).unwrap();
    let lowered = lower_with("{ String s = name(); step(s); } stepAll(xs);", &config).unwrap();
    assert!(!all_ops(&lowered).iter().any(|op| matches!(op, Op::Clear(_))));
    assert!(lowered.captures.iter().all(|c| !c.is_cleared()));
}

#[test]
fn test_primitive_locals_are_retained() {
    let lowered = lower("int x = 1; step(x);").unwrap();
    let x = lowered
        .captures
        .iter()
        .find(|c| c.name.starts_with("x$"))
        .unwrap();
    assert_eq!(x.liveness, Liveness::Retained);
}

#[test]
fn test_break_clears_scopes_before_jumping() {
    let lowered = lower("while (true) { String s = name(); step(s); if (s != null) break; } step(2);").unwrap();
    let s = lowered
        .captures
        .iter()
        .find(|c| c.name.starts_with("s$"))
        .unwrap();
    let exits: Vec<&Vec<Op>> = all_ops(&lowered)
        .into_iter()
        .filter_map(|op| match op {
            Op::If { then_ops, .. } if matches!(then_ops.last(), Some(Op::Jump(_))) => Some(then_ops),
            _ => None,
        })
        .filter(|then_ops| then_ops.len() == 2)
        .collect();
    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0][0], Op::Clear(s.symbol));
}

#[test]
fn test_return_clears_every_open_scope() {
    let lowered = lower("String a = name(); { String b = name(); step(1); return; }").unwrap();
    let cleared: Vec<String> = ops(&lowered, 2)
        .iter()
        .filter_map(|op| match op {
            Op::Clear(symbol) => Some(lowered.symbols.display(*symbol)),
            _ => None,
        })
        .collect();
    assert_eq!(cleared.len(), 2);
    assert!(cleared[0].starts_with("b$"));
    assert!(cleared[1].starts_with("a$"));
    assert_eq!(ops(&lowered, 2).last(), Some(&Op::Finish));
}

// ==================== GUARDED REGIONS ====================

#[test]
fn test_try_becomes_nested_machine() {
    let lowered = lower("try { step(1); } catch (Exception e) { step(2); } finally { trace(3); }").unwrap();
    let machines = lowered.machine.machines();
    assert_eq!(machines.len(), 2);

    let Op::Guard(guard) = &ops(&lowered, 2)[0] else {
        panic!("expected guard, got {:?}", ops(&lowered, 2));
    };
    assert_eq!(guard.handlers.len(), 1);
    assert_eq!(guard.machine.id, MachineId(1));
    let entry = lowered.tags.target(guard.handlers[0].entry).unwrap();
    assert!(guard.machine.state(entry).is_some());
    assert_eq!(lowered.tags.owner(guard.handlers[0].entry), MachineId(1));

    // Finally state: user code, then rethrow
    let finally = ops(&lowered, 3);
    assert!(matches!(&finally[0], Op::Plain(_)));
    assert_eq!(finally[1], Op::RethrowPending(guard.pending));
}

#[test]
fn test_break_out_of_try_is_parked() {
    let lowered = lower("while (true) { try { step(1); break; } finally { trace(0); } }").unwrap();
    let guard = all_ops(&lowered)
        .into_iter()
        .find_map(|op| match op {
            Op::Guard(guard) => Some(guard.as_ref().clone()),
            _ => None,
        })
        .expect("guard emitted");

    let parks = guard.machine.states.iter().flat_map(|s| s.ops.iter()).any(|op| {
        matches!(op, Op::Assign { target, value: Expr::Literal(_) } if *target == guard.pending_jump)
    });
    assert!(parks);

    let dispatch = all_ops(&lowered).into_iter().any(|op| match op {
        Op::If {
            cond: Expr::Binary { op: BinaryOp::Eq, lhs, .. },
            then_ops,
            ..
        } => {
            matches!(lhs.as_ref(), Expr::Ident(i) if i.symbol == Some(guard.pending_jump))
                && matches!(then_ops.as_slice(), [Op::Jump(tag)] if lowered.tags.owner(*tag) == MachineId::ROOT)
        }
        _ => false,
    });
    assert!(dispatch);
}

#[test]
fn test_resources_are_guard_fields() {
    let lowered = lower("try (Res r = open(n)) { step(r); }").unwrap();
    let Op::Guard(guard) = &ops(&lowered, 2)[0] else {
        panic!("expected guard");
    };
    assert_eq!(guard.resources.len(), 1);
    let nested_start = &guard.machine.state(StateId::START).unwrap().ops;
    assert!(matches!(&nested_start[0], Op::Assign { target, .. } if *target == guard.resources[0]));
    // Entry resets the resource field before the guard runs
    assert!(ops(&lowered, 1).contains(&Op::Assign {
        target: guard.resources[0],
        value: Expr::null(),
    }));
}

// ==================== DIAGNOSTICS ====================

#[test]
fn test_marker_in_initializer_is_rejected() {
    let err = lower("int y = step(3);").unwrap_err();
    assert!(matches!(err, LoweringError::MisplacedMarker { ref marker, .. } if marker == "step"));
}

#[test]
fn test_marker_inside_expression_is_rejected() {
    let err = lower("trace(stepAll(xs));").unwrap_err();
    assert!(matches!(err, LoweringError::MisplacedMarker { ref marker, .. } if marker == "stepAll"));
}

#[test]
fn test_return_with_value_is_rejected() {
    assert!(matches!(
        lower("return 1;").unwrap_err(),
        LoweringError::ReturnWithValue { .. }
    ));
}

#[test]
fn test_suspension_in_synchronized_is_rejected() {
    let err = lower("synchronized (n) {\n trace(0);\n step(1);\n}").unwrap_err();
    let LoweringError::IllegalSuspension { marker, location, .. } = err else {
        panic!("expected illegal suspension");
    };
    assert_eq!(marker, "step");
    assert_eq!(location.line, 3);
}

#[test]
fn test_split_inside_synchronized_is_rejected() {
    let err = lower("synchronized (n) { while (true) { if (n > 0) return; } }").unwrap_err();
    assert!(matches!(err, LoweringError::UnsplittableConstruct { .. }));
}

#[test]
fn test_synchronized_without_split_is_kept() {
    let lowered = lower("synchronized (n) { if (n > 0) return; } step(1);").unwrap();
    assert!(matches!(&ops(&lowered, 1)[0], Op::Synchronized { body, .. } if body.len() == 1));
}

#[test]
fn test_unmatched_jumps() {
    assert!(matches!(
        lower("break;").unwrap_err(),
        LoweringError::UnmatchedBreak { label: None, .. }
    ));
    assert!(matches!(
        lower("continue;").unwrap_err(),
        LoweringError::UnmatchedContinue { label: None, .. }
    ));
    assert!(matches!(
        lower("while (true) { step(1); break missing; }").unwrap_err(),
        LoweringError::UnmatchedBreak { label: Some(_), .. }
    ));
    assert!(matches!(
        lower("block: { step(1); continue block; }").unwrap_err(),
        LoweringError::UnmatchedContinue { label: Some(_), .. }
    ));
}

#[test]
fn test_duplicate_label_is_rejected() {
    let err = lower("a: while (true) { a: while (true) { step(1); } }").unwrap_err();
    assert!(matches!(err, LoweringError::DuplicateLabel { ref label, .. } if label == "a"));
}

#[test]
fn test_lowering_is_deterministic() {
    let body = "for (String s : names) { try { step(s); } catch (Exception e) { continue; } }";
    assert_eq!(lower(body).unwrap(), lower(body).unwrap());
}
