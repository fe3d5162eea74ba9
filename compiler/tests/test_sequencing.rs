/// Integration tests for evaluation-order repair through the full pipeline
use compiler::tast::builder::{expr_stmt, method_member, type_decl, UnitBuilder};
use compiler::tast::{
    BinaryOp, Block, ElementRef, Expression, ExpressionKind, Member, MethodId, Statement, TypeElementId,
    TypeRef, TypedUnit, UnaryOp, VariableId,
};
use compiler::{lower_unit, LoweringOptions};

struct Method {
    b: UnitBuilder,
    class: TypeElementId,
    m: MethodId,
}

fn method(name: &str) -> Method {
    compiler::logging::init_test();
    let mut b = UnitBuilder::new(name);
    let class = b.class(name);
    let m = b.method(class, "m", &[], TypeRef::Void);
    Method { b, class, m }
}

fn declare(var: VariableId) -> Statement {
    Statement::VarDecl {
        var,
        initializer: None,
    }
}

fn finish(fixture: Method, statements: Vec<Statement>) -> TypedUnit {
    let Method { mut b, class, m } = fixture;
    b.declare(type_decl(class, vec![method_member(m, statements)]));
    b.finish()
}

fn body(unit: &TypedUnit) -> &Block {
    match &unit.types[0].members[0] {
        Member::Method { body: Some(body), .. } => body,
        other => panic!("expected method, got {:?}", other),
    }
}

fn lower(unit: &mut TypedUnit) {
    let mut options = LoweringOptions::default();
    options.devirtualization.enabled = false;
    lower_unit(unit, &options).unwrap();
}

/// Whether `stmt` writes `var` outside of any `if`
fn writes_unconditionally(stmt: &Statement, var: VariableId) -> bool {
    fn writes(expr: &Expression, var: VariableId) -> bool {
        let own = match &expr.kind {
            ExpressionKind::Assignment { target, .. } => target.kind == ExpressionKind::Variable(var),
            _ => false,
        };
        own || expr.children().into_iter().any(|child| writes(child, var))
    }
    match stmt {
        Statement::Expression(expr) => writes(expr, var),
        Statement::VarDecl {
            initializer: Some(init),
            ..
        } => writes(init, var),
        _ => false,
    }
}

#[test]
fn test_index_read_hoisted_before_increment() {
    // a[i] = i++  ->  int unseq$0 = i; a[unseq$0] = i++;
    let mut fixture = method("Index");
    let owner = ElementRef::Method(fixture.m);
    let b = &mut fixture.b;
    let a = b.local(owner, "a", TypeRef::Array(Box::new(TypeRef::INT)));
    let i = b.local(owner, "i", TypeRef::INT);
    let array = b.var(a);
    let index = b.var(i);
    let target = b.array_access(array, index);
    let operand = b.var(i);
    let increment = b.post_increment(operand);
    let assign = b.assign(target, increment);
    let decl_a = declare(a);
    let decl_i = declare(i);
    let mut unit = finish(fixture, vec![decl_a, decl_i, expr_stmt(assign)]);

    lower(&mut unit);

    let statements = &body(&unit).statements;
    assert_eq!(statements.len(), 4);
    let Statement::VarDecl {
        var: temp,
        initializer: Some(init),
    } = &statements[2]
    else {
        panic!("expected temporary, got {:?}", statements[2]);
    };
    assert_eq!(unit.elements.variable(*temp).name, "unseq$0");
    assert_eq!(init.kind, ExpressionKind::Variable(i));

    let Statement::Expression(root) = &statements[3] else {
        panic!("root statement moved");
    };
    let ExpressionKind::Assignment { target, value, .. } = &root.kind else {
        panic!("expected assignment");
    };
    let ExpressionKind::ArrayAccess { index, .. } = &target.kind else {
        panic!("expected array store");
    };
    assert_eq!(index.kind, ExpressionKind::Variable(*temp));
    assert!(matches!(
        value.kind,
        ExpressionKind::Unary {
            op: UnaryOp::PostIncrement,
            ..
        }
    ));
}

#[test]
fn test_exclusive_conditional_writes_are_left_in_place() {
    // cond ? (x = f()) : (x = g())
    let mut fixture = method("Exclusive");
    let owner = ElementRef::Method(fixture.m);
    let class = fixture.class;
    let b = &mut fixture.b;
    let x = b.local(owner, "x", TypeRef::INT);
    let cond = b.local(owner, "cond", TypeRef::BOOLEAN);
    let f = b.method(class, "f", &[], TypeRef::INT);
    let g = b.method(class, "g", &[], TypeRef::INT);

    let test = b.var(cond);
    let t1 = b.var(x);
    let call_f = b.call(None, f, vec![]);
    let then_expr = b.assign(t1, call_f);
    let t2 = b.var(x);
    let call_g = b.call(None, g, vec![]);
    let else_expr = b.assign(t2, call_g);
    let choice = b.conditional(test, then_expr, else_expr);
    let decl_x = declare(x);
    let decl_cond = declare(cond);
    let mut unit = finish(fixture, vec![decl_x, decl_cond, expr_stmt(choice)]);
    let before = body(&unit).clone();

    lower(&mut unit);

    assert_eq!(body(&unit), &before);
}

#[test]
fn test_conditional_writes_stay_behind_their_branch() {
    // y = x + (cond ? (x = 1) : (x = 2))
    let mut fixture = method("Shadow");
    let owner = ElementRef::Method(fixture.m);
    let b = &mut fixture.b;
    let x = b.local(owner, "x", TypeRef::INT);
    let y = b.local(owner, "y", TypeRef::INT);
    let cond = b.local(owner, "cond", TypeRef::BOOLEAN);

    let left = b.var(x);
    let test = b.var(cond);
    let t1 = b.var(x);
    let one = b.int(1);
    let then_expr = b.assign(t1, one);
    let t2 = b.var(x);
    let two = b.int(2);
    let else_expr = b.assign(t2, two);
    let choice = b.conditional(test, then_expr, else_expr);
    let sum = b.binary(BinaryOp::Add, left, choice);
    let target = b.var(y);
    let store = b.assign(target, sum);
    let statements = vec![declare(x), declare(y), declare(cond), expr_stmt(store)];
    let mut unit = finish(fixture, statements);

    lower(&mut unit);

    let statements = &body(&unit).statements[3..];
    // int unseq$0 = x; int unseq$1; if (cond) { unseq$1 = x = 1; } else { unseq$1 = x = 2; } y = unseq$0 + unseq$1;
    assert_eq!(statements.len(), 4);
    assert!(statements.iter().all(|stmt| !writes_unconditionally(stmt, x)));
    let Statement::If {
        then_branch,
        else_branch: Some(else_branch),
        ..
    } = &statements[2]
    else {
        panic!("expected if/else shadow, got {:?}", statements[2]);
    };
    for branch in [then_branch.as_ref(), else_branch.as_ref()] {
        let Statement::Block(block) = branch else {
            panic!("expected block branch");
        };
        assert_eq!(block.statements.len(), 1);
        assert!(writes_unconditionally(&block.statements[0], x));
    }
}

#[test]
fn test_extraction_can_be_disabled() {
    let mut fixture = method("Off");
    let owner = ElementRef::Method(fixture.m);
    let b = &mut fixture.b;
    let i = b.local(owner, "i", TypeRef::INT);
    let target = b.var(i);
    let operand = b.var(i);
    let increment = b.post_increment(operand);
    let assign = b.assign(target, increment);
    let decl_i = declare(i);
    let mut unit = finish(fixture, vec![decl_i, expr_stmt(assign)]);
    let before = body(&unit).clone();

    let mut options = LoweringOptions::default();
    options.sequencing.extract_unsequenced = false;
    options.devirtualization.enabled = false;
    let report = lower_unit(&mut unit, &options).unwrap();
    assert!(report.pass("unsequenced-rewriter").is_none());
    assert_eq!(body(&unit), &before);
}

/// `j = i + i++` over locals declared in the fixture method
fn sum_with_increment(b: &mut UnitBuilder, i: VariableId, j: VariableId) -> Expression {
    let read = b.var(i);
    let operand = b.var(i);
    let increment = b.post_increment(operand);
    let sum = b.binary(BinaryOp::Add, read, increment);
    let target = b.var(j);
    b.assign(target, sum)
}

#[test]
fn test_hazardous_for_update_runs_at_end_of_body() {
    // for (; i < 10; j = i + i++) {}
    let mut fixture = method("Update");
    let owner = ElementRef::Method(fixture.m);
    let b = &mut fixture.b;
    let i = b.local(owner, "i", TypeRef::INT);
    let j = b.local(owner, "j", TypeRef::INT);
    let bound = b.var(i);
    let ten = b.int(10);
    let condition = b.binary(BinaryOp::Lt, bound, ten);
    let update = sum_with_increment(b, i, j);
    let stmt = Statement::For {
        init: Vec::new(),
        condition: Some(condition.clone()),
        update: vec![update],
        body: Box::new(Statement::Block(Block::default())),
    };
    let mut unit = finish(fixture, vec![declare(i), declare(j), stmt]);

    let mut options = LoweringOptions::default();
    options.devirtualization.enabled = false;
    let report = lower_unit(&mut unit, &options).unwrap();
    let stats = report.pass("unsequenced-rewriter").unwrap();
    assert_eq!(stats.stat("loop-updates"), 1);

    let Statement::For {
        condition: kept,
        update,
        body: loop_body,
        ..
    } = &body(&unit).statements[2]
    else {
        panic!("loop changed kind");
    };
    assert_eq!(kept.as_ref(), Some(&condition));
    assert!(update.is_empty());
    let Statement::Block(inner) = loop_body.as_ref() else {
        panic!("expected block body");
    };
    // {} int unseq$0 = i; j = unseq$0 + i++;
    assert_eq!(inner.statements.len(), 3);
    assert_eq!(inner.statements[0], Statement::Block(Block::default()));
    let Statement::VarDecl {
        var: temp,
        initializer: Some(init),
    } = &inner.statements[1]
    else {
        panic!("expected temporary, got {:?}", inner.statements[1]);
    };
    assert_eq!(unit.elements.variable(*temp).name, "unseq$0");
    assert_eq!(init.kind, ExpressionKind::Variable(i));
    assert!(writes_unconditionally(&inner.statements[2], j));
}

#[test]
fn test_for_init_prelude_runs_after_earlier_inits() {
    // for (i = 0, j = i + i++; ; ) {}  ->  { i = 0; int unseq$0 = i; j = unseq$0 + i++; for (;;) {} }
    let mut fixture = method("Init");
    let owner = ElementRef::Method(fixture.m);
    let b = &mut fixture.b;
    let i = b.local(owner, "i", TypeRef::INT);
    let j = b.local(owner, "j", TypeRef::INT);
    let target = b.var(i);
    let zero = b.int(0);
    let reset = b.assign(target, zero);
    let update = sum_with_increment(b, i, j);
    let stmt = Statement::For {
        init: vec![expr_stmt(reset), expr_stmt(update)],
        condition: None,
        update: Vec::new(),
        body: Box::new(Statement::Block(Block::default())),
    };
    let mut unit = finish(fixture, vec![declare(i), declare(j), stmt]);

    lower(&mut unit);

    let statements = &body(&unit).statements;
    assert_eq!(statements.len(), 3);
    let Statement::Block(scope) = &statements[2] else {
        panic!("expected init block, got {:?}", statements[2]);
    };
    assert_eq!(scope.statements.len(), 4);
    assert!(writes_unconditionally(&scope.statements[0], i));
    let Statement::VarDecl {
        initializer: Some(init),
        ..
    } = &scope.statements[1]
    else {
        panic!("expected temporary after the first init, got {:?}", scope.statements[1]);
    };
    assert_eq!(init.kind, ExpressionKind::Variable(i));
    assert!(writes_unconditionally(&scope.statements[2], j));
    assert!(matches!(&scope.statements[3], Statement::For { init, .. } if init.is_empty()));
}
