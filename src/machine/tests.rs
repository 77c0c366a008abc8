use super::*;
use crate::ast::StmtKind;

#[test]
fn test_finished_tag_is_preresolved() {
    let tags = TagTable::new();
    assert_eq!(tags.target(Tag::FINISHED), Some(StateId::FINISHED));
    assert_eq!(tags.owner(Tag::FINISHED), MachineId::ROOT);
    assert!(tags.verify().is_ok());
}

#[test]
fn test_tag_resolves_exactly_once() {
    let mut tags = TagTable::new();
    let tag = tags.fresh(MachineId(2));
    assert_eq!(tags.target(tag), None);
    assert_eq!(tags.owner(tag), MachineId(2));

    tags.resolve(tag, StateId(4)).unwrap();
    assert_eq!(tags.target(tag), Some(StateId(4)));

    let err = tags.resolve(tag, StateId(5)).unwrap_err();
    assert!(err.is_internal());
}

#[test]
fn test_verify_reports_unresolved_tag() {
    let mut tags = TagTable::new();
    let resolved = tags.fresh(MachineId::ROOT);
    let dangling = tags.fresh(MachineId::ROOT);
    tags.resolve(resolved, StateId::START).unwrap();

    assert_eq!(
        tags.verify(),
        Err(LoweringError::UnresolvedTag { tag: dangling.0 })
    );
}

#[test]
fn test_block_numbers_states_from_start() {
    let mut block = Block::new(MachineId::ROOT, SymbolId(0));
    assert_eq!(block.current(), StateId::START);

    let second = block.open_state();
    let third = block.open_state();
    assert_eq!(second, StateId(2));
    assert_eq!(third, StateId(3));
    assert_eq!(block.current(), third);

    block.ops_mut(second).unwrap().push(Op::Finish);
    assert!(block.ops_mut(StateId::FINISHED).is_err());

    let machine = block.finish();
    assert_eq!(machine.states.len(), 3);
    assert_eq!(machine.state(StateId(2)).unwrap().ops, vec![Op::Finish]);
    assert!(machine.state(StateId::FINISHED).is_none());
}

#[test]
fn test_terminal_ops() {
    assert!(Op::Jump(Tag(1)).is_terminal());
    assert!(Op::Finish.is_terminal());
    assert!(!Op::SetState(Tag(1)).is_terminal());
    assert!(!Op::Clear(SymbolId(1)).is_terminal());
    assert!(Op::Plain(Stmt::synthetic(StmtKind::Throw(Expr::null()))).is_terminal());

    let half = Op::If {
        cond: Expr::boolean(true),
        then_ops: vec![Op::Finish],
        else_ops: vec![],
    };
    assert!(!half.is_terminal());

    let both = Op::If {
        cond: Expr::boolean(true),
        then_ops: vec![Op::Finish],
        else_ops: vec![Op::Jump(Tag(2))],
    };
    assert!(both.is_terminal());

    let no_default = Op::Switch {
        selector: Expr::int(1),
        arms: vec![SwitchArm {
            labels: vec![Expr::int(1)],
            is_default: false,
            target: Tag(3),
        }],
    };
    assert!(!no_default.is_terminal());
    assert!(!ends_terminal(&[]));
}

#[test]
fn test_nested_machines_are_collected() {
    let inner = Machine {
        id: MachineId(1),
        selector: SymbolId(3),
        states: vec![State {
            id: StateId::START,
            ops: vec![Op::Finish],
        }],
    };
    let guard = Guard {
        machine: inner,
        resources: vec![],
        handlers: vec![],
        in_handler: SymbolId(4),
        pending: SymbolId(5),
        pending_jump: SymbolId(6),
    };
    let root = Machine {
        id: MachineId::ROOT,
        selector: SymbolId(0),
        states: vec![State {
            id: StateId::START,
            ops: vec![Op::If {
                cond: Expr::boolean(true),
                then_ops: vec![Op::Guard(Box::new(guard))],
                else_ops: vec![],
            }],
        }],
    };

    let ids: Vec<MachineId> = root.machines().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![MachineId::ROOT, MachineId(1)]);
}

#[test]
fn test_capture_set_orders_by_symbol() {
    let mut captures = CaptureSet::new();
    for (id, name) in [(5, "b$5"), (1, "a$1")] {
        captures.insert(Capture {
            symbol: SymbolId(id),
            name: name.to_string(),
            ty: TypeRef::named("String"),
            liveness: Liveness::ClearedAtScopeEnd,
            origin: CaptureOrigin::Local,
        });
    }
    assert_eq!(captures.names(), vec!["a$1", "b$5"]);
    assert!(captures.get(SymbolId(5)).unwrap().is_cleared());
    assert!(!captures.contains(SymbolId(2)));
}
