/// Integration tests for scope and capture resolution
///
/// Units are assembled with `UnitBuilder`, which stands in for the front end,
/// then lowered and inspected node by node.
use compiler::lowering::{CaptureRegistry, LoweringPass, OuterReferenceResolver};
use compiler::tast::builder::{block, expr_stmt, method_member, type_decl, UnitBuilder};
use compiler::tast::{
    ElementRef, Expression, ExpressionKind, Member, Statement, TypeRef, TypedUnit, VariableId,
};

fn resolve(unit: &mut TypedUnit) -> CaptureRegistry {
    compiler::logging::init_test();
    let mut registry = CaptureRegistry::new();
    OuterReferenceResolver::new()
        .run_on_unit(unit, &mut registry)
        .expect("resolution failed");
    registry
}

fn method_statements(member: &Member) -> &[Statement] {
    match member {
        Member::Method { body: Some(body), .. } => &body.statements,
        other => panic!("expected method with body, got {:?}", other),
    }
}

/// Field chain of a path expression, outermost access last
fn path_fields(expr: &Expression) -> Vec<VariableId> {
    let mut fields = Vec::new();
    let mut current = expr;
    while let ExpressionKind::FieldAccess { object, field } = &current.kind {
        fields.push(*field);
        current = object;
    }
    fields.reverse();
    fields
}

/// `Outer.m() { int x; Runnable r = () -> { class Local { int get() { return x; } } }; }`
#[test]
fn test_local_captured_across_two_boundaries_has_two_hops() {
    let mut b = UnitBuilder::new("Nest");
    let outer = b.class("Nest");
    let runnable = b.interface("Runnable");
    let m = b.method(outer, "m", &[], TypeRef::Void);
    let x = b.local(ElementRef::Method(m), "x", TypeRef::INT);
    let lambda = b.lambda_type(ElementRef::Method(m), runnable);
    let local = b.local_class(ElementRef::Type(lambda), "Local");
    let get = b.method(local, "get", &[], TypeRef::INT);

    let read = b.var(x);
    let local_decl = type_decl(local, vec![method_member(get, vec![Statement::Return(Some(read))])]);
    let lambda_expr = b.lambda(lambda, vec![], block(vec![Statement::LocalClass(local_decl)]));
    let zero = b.int(0);
    let body = vec![
        Statement::VarDecl {
            var: x,
            initializer: Some(zero),
        },
        expr_stmt(lambda_expr),
    ];
    b.declare(type_decl(outer, vec![method_member(m, body)]));
    let mut unit = b.finish();

    let registry = resolve(&mut unit);

    let statements = method_statements(&unit.types[0].members[0]);
    let Statement::Expression(lambda_expr) = &statements[1] else {
        panic!("lambda statement moved");
    };
    let ExpressionKind::Lambda { body, implicit, .. } = &lambda_expr.kind else {
        panic!("expected lambda");
    };
    assert_eq!(implicit.captures.len(), 1);
    assert_eq!(implicit.captures[0].kind, ExpressionKind::Variable(x));

    let Statement::LocalClass(local_decl) = &body.statements[0] else {
        panic!("local class moved");
    };
    let Statement::Return(Some(path)) = &method_statements(&local_decl.members[0])[0] else {
        panic!("return changed shape");
    };

    let fields = path_fields(path);
    assert_eq!(fields.len(), 2);
    // hop 1 lands on the lambda, hop 2 holds the captured value
    assert_eq!(Some(fields[0]), registry.outer_field(local));
    assert_eq!(unit.elements.variable(fields[0]).ty, TypeRef::Class(lambda));
    let capture = &registry.local_captures(lambda)[0];
    assert_eq!(capture.var, x);
    assert_eq!(Some(fields[1]), capture.field);
    assert_eq!(unit.elements.variable(fields[1]).ty, TypeRef::INT);
}

/// `Outer(int p) { new Runnable() { void run() { use(Outer.this); use(p); } }; }`
#[test]
fn test_anonymous_class_in_constructor_takes_outer_then_capture() {
    let mut b = UnitBuilder::new("Owner");
    let outer = b.class("Owner");
    let runnable = b.interface("Runnable");
    let ctor = b.constructor(outer, &[("p", TypeRef::INT)]);
    let p = b.param_of(ctor, 0);
    let sink = b.static_method(outer, "use", &[("value", TypeRef::Class(outer))], TypeRef::Void);
    let sink_int = b.static_method(outer, "useInt", &[("value", TypeRef::INT)], TypeRef::Void);

    let anon = b.anonymous_class(ElementRef::Method(ctor), runnable);
    let anon_ctor = b.constructor(anon, &[]);
    let run = b.method(anon, "run", &[], TypeRef::Void);

    let this_outer = b.this(outer);
    let use_this = b.call(None, sink, vec![this_outer]);
    let read_p = b.var(p);
    let use_p = b.call(None, sink_int, vec![read_p]);
    let anon_decl = type_decl(anon, vec![method_member(run, vec![expr_stmt(use_this), expr_stmt(use_p)])]);
    let creation = b.new_anonymous(anon_decl, anon_ctor, vec![]);
    b.declare(type_decl(outer, vec![method_member(ctor, vec![expr_stmt(creation)])]));
    let mut unit = b.finish();

    let registry = resolve(&mut unit);

    let entry = registry.entry(anon).expect("anonymous class has no entry");
    let outer_param = entry.outer_param.expect("missing outer hop");
    assert_eq!(entry.captures.len(), 1);
    assert_eq!(entry.captures[0].var, p);
    assert_eq!(
        registry.constructor_params(anon, &[]),
        vec![outer_param, entry.captures[0].param]
    );

    let Statement::Expression(creation) = &method_statements(&unit.types[0].members[0])[0] else {
        panic!("creation moved");
    };
    let ExpressionKind::New { implicit, body, .. } = &creation.kind else {
        panic!("expected creation");
    };
    assert!(implicit.resolved);
    assert_eq!(
        implicit.outer.as_deref().map(|e| &e.kind),
        Some(&ExpressionKind::This(outer))
    );
    assert_eq!(implicit.captures.len(), 1);
    assert_eq!(implicit.captures[0].kind, ExpressionKind::Variable(p));

    let body = body.as_deref().expect("anonymous body dropped");
    let statements = method_statements(&body.members[0]);
    let Statement::Expression(use_this) = &statements[0] else {
        panic!("statement changed shape");
    };
    let ExpressionKind::MethodCall { args, .. } = &use_this.kind else {
        panic!("expected call");
    };
    assert_eq!(path_fields(&args[0]), vec![entry.outer_field.expect("missing outer field")]);
}

#[test]
fn test_second_run_is_a_no_op() {
    let mut b = UnitBuilder::new("Twice");
    let outer = b.class("Twice");
    let count = b.field(outer, "count", TypeRef::INT);
    let inner = b.inner_class(outer, "Inner");
    let bump = b.method(inner, "bump", &[], TypeRef::Void);
    let target = b.var(count);
    let one = b.int(1);
    let assign = b.assign(target, one);
    let inner_decl = type_decl(inner, vec![method_member(bump, vec![expr_stmt(assign)])]);
    b.declare(type_decl(outer, vec![Member::Type(inner_decl)]));
    let mut unit = b.finish();

    let mut registry = CaptureRegistry::new();
    let first = OuterReferenceResolver::new()
        .run_on_unit(&mut unit, &mut registry)
        .unwrap();
    assert_eq!(first.stat("outer-paths"), 1);
    let resolved = unit.types.clone();
    let variables = unit.elements.variable_count();

    let second = OuterReferenceResolver::new()
        .run_on_unit(&mut unit, &mut registry)
        .unwrap();
    assert!(!second.modified);
    assert_eq!(unit.types, resolved);
    assert_eq!(unit.elements.variable_count(), variables);
}

#[test]
fn test_registry_survives_json() {
    let mut b = UnitBuilder::new("Json");
    let outer = b.class("Json");
    let inner = b.inner_class(outer, "Inner");
    b.declare(type_decl(outer, vec![Member::Type(type_decl(inner, vec![]))]));
    let mut unit = b.finish();

    let registry = resolve(&mut unit);
    let json = serde_json::to_string(&registry).unwrap();
    let decoded: CaptureRegistry = serde_json::from_str(&json).unwrap();
    assert!(decoded.is_sealed());
    assert_eq!(decoded.outer_param(inner), registry.outer_param(inner));
}

/// `Outer.m() { new Inner() {}; }` with `Inner` a member class of `Outer`
#[test]
fn test_anonymous_subclass_of_inner_class_gets_super_outer() {
    let mut b = UnitBuilder::new("SuperOuter");
    let outer = b.class("Outer");
    let inner = b.inner_class(outer, "Inner");
    let inner_ctor = b.constructor(inner, &[]);
    let m = b.method(outer, "m", &[], TypeRef::Void);
    let anon = b.anonymous_class(ElementRef::Method(m), inner);
    let anon_ctor = b.constructor(anon, &[]);

    let creation = b.new_anonymous(type_decl(anon, vec![]), anon_ctor, vec![]);
    let inner_decl = type_decl(inner, vec![method_member(inner_ctor, vec![])]);
    b.declare(type_decl(
        outer,
        vec![Member::Type(inner_decl), method_member(m, vec![expr_stmt(creation)])],
    ));
    let mut unit = b.finish();

    let registry = resolve(&mut unit);

    let Statement::Expression(creation) = &method_statements(&unit.types[0].members[1])[0] else {
        panic!("creation moved");
    };
    let ExpressionKind::New { implicit, .. } = &creation.kind else {
        panic!("expected creation");
    };
    assert!(implicit.resolved);
    assert!(implicit.outer.is_none());
    assert_eq!(
        implicit.super_outer.as_deref().map(|e| &e.kind),
        Some(&ExpressionKind::This(outer))
    );

    let param = registry.super_outer_param(anon).expect("missing super outer parameter");
    assert_eq!(unit.elements.variable(param).name, "superOuter$");
    assert_eq!(unit.elements.variable(param).ty, TypeRef::Class(outer));
    assert!(registry.outer_param(anon).is_none());
}

/// `Outer extends Base { class Inner extends Base { run() { Outer.super.m(); } } }`
#[test]
fn test_qualified_super_call_walks_to_the_named_class() {
    let mut b = UnitBuilder::new("QualifiedSuper");
    let base = b.class("Base");
    let base_m = b.method(base, "m", &[], TypeRef::Void);
    let outer = b.class("Outer");
    b.extends(outer, base);
    let inner = b.inner_class(outer, "Inner");
    b.extends(inner, base);
    let run = b.method(inner, "run", &[], TypeRef::Void);

    let call = b.super_call(Some(outer), base_m, vec![]);
    let inner_decl = type_decl(inner, vec![method_member(run, vec![expr_stmt(call)])]);
    b.declare(type_decl(base, vec![method_member(base_m, vec![])]));
    b.declare(type_decl(outer, vec![Member::Type(inner_decl)]));
    let mut unit = b.finish();

    let registry = resolve(&mut unit);

    let Member::Type(inner_decl) = &unit.types[1].members[0] else {
        panic!("inner class moved");
    };
    let Statement::Expression(call) = &method_statements(&inner_decl.members[0])[0] else {
        panic!("call moved");
    };
    let ExpressionKind::SuperMethodCall { receiver: Some(receiver), .. } = &call.kind else {
        panic!("expected super call with a receiver, got {:?}", call.kind);
    };
    // Inner inherits Base too, so only an exact match on Outer ends the walk
    let outer_field = registry.outer_field(inner).expect("missing outer field");
    assert_eq!(path_fields(receiver), vec![outer_field]);
    let ExpressionKind::FieldAccess { object, .. } = &receiver.kind else {
        panic!("expected field access");
    };
    assert_eq!(object.kind, ExpressionKind::This(inner));
}

/// `Inner() { this(1); }` and `Sub extends Inner { Sub() { super(2); } }`,
/// both member classes of `Outer`
#[test]
fn test_explicit_constructor_calls_pass_outer_parameter() {
    let mut b = UnitBuilder::new("Delegation");
    let outer = b.class("Outer");
    let inner = b.inner_class(outer, "Inner");
    let with_value = b.constructor(inner, &[("v", TypeRef::INT)]);
    let no_args = b.constructor(inner, &[]);
    let sub = b.inner_class(outer, "Sub");
    b.extends(sub, inner);
    let sub_ctor = b.constructor(sub, &[]);

    let one = b.int(1);
    let this_call = b.this_constructor_call(with_value, vec![one]);
    let two = b.int(2);
    let super_call = b.super_constructor_call(with_value, vec![two]);
    let inner_decl = type_decl(
        inner,
        vec![method_member(with_value, vec![]), method_member(no_args, vec![this_call])],
    );
    let sub_decl = type_decl(sub, vec![method_member(sub_ctor, vec![super_call])]);
    b.declare(type_decl(outer, vec![Member::Type(inner_decl), Member::Type(sub_decl)]));
    let mut unit = b.finish();

    let registry = resolve(&mut unit);

    let cases = [(0, 1, inner), (1, 0, sub)];
    for (type_index, member_index, owner) in cases {
        let Member::Type(decl) = &unit.types[0].members[type_index] else {
            panic!("member class moved");
        };
        let Statement::ConstructorCall(call) = &method_statements(&decl.members[member_index])[0] else {
            panic!("constructor call moved");
        };
        assert!(call.implicit.resolved);
        let param = registry.outer_param(owner).expect("missing outer parameter");
        assert_eq!(
            call.implicit.outer.as_deref().map(|e| &e.kind),
            Some(&ExpressionKind::Variable(param))
        );
        assert!(call.implicit.captures.is_empty());
    }
}

/// `Outer { int count; class Inner extends Outer { class Deep { bump() { count = 1; } } } }`
#[test]
fn test_inherited_member_stops_at_subclass_frame() {
    let mut b = UnitBuilder::new("Inherited");
    let outer = b.class("Outer");
    let count = b.field(outer, "count", TypeRef::INT);
    let inner = b.inner_class(outer, "Inner");
    b.extends(inner, outer);
    let deep = b.inner_class(inner, "Deep");
    let bump = b.method(deep, "bump", &[], TypeRef::Void);

    let target = b.var(count);
    let one = b.int(1);
    let assign = b.assign(target, one);
    let deep_decl = type_decl(deep, vec![method_member(bump, vec![expr_stmt(assign)])]);
    let inner_decl = type_decl(inner, vec![Member::Type(deep_decl)]);
    b.declare(type_decl(outer, vec![Member::Type(inner_decl)]));
    let mut unit = b.finish();

    let registry = resolve(&mut unit);

    let Member::Type(inner_decl) = &unit.types[0].members[0] else {
        panic!("inner class moved");
    };
    let Member::Type(deep_decl) = &inner_decl.members[0] else {
        panic!("deep class moved");
    };
    let Statement::Expression(assign) = &method_statements(&deep_decl.members[0])[0] else {
        panic!("assignment moved");
    };
    let ExpressionKind::Assignment { target, .. } = &assign.kind else {
        panic!("expected assignment");
    };
    // one hop to Inner, which holds `count` through its superclass
    let deep_field = registry.outer_field(deep).expect("missing outer field");
    assert_eq!(path_fields(target), vec![deep_field, count]);
    assert!(registry.outer_field(inner).is_none());
}

/// `B extends A`, both member classes reading `Outer.count`
#[test]
fn test_outer_field_of_subclass_is_numbered_past_superclass() {
    let mut b = UnitBuilder::new("Numbering");
    let outer = b.class("Outer");
    let count = b.field(outer, "count", TypeRef::INT);
    let a = b.inner_class(outer, "A");
    let f = b.method(a, "f", &[], TypeRef::INT);
    let sub = b.inner_class(outer, "B");
    b.extends(sub, a);
    let g = b.method(sub, "g", &[], TypeRef::INT);

    let in_a = b.var(count);
    let in_sub = b.var(count);
    let a_decl = type_decl(a, vec![method_member(f, vec![Statement::Return(Some(in_a))])]);
    let sub_decl = type_decl(sub, vec![method_member(g, vec![Statement::Return(Some(in_sub))])]);
    b.declare(type_decl(outer, vec![Member::Type(a_decl), Member::Type(sub_decl)]));
    let mut unit = b.finish();

    let registry = resolve(&mut unit);

    let a_field = registry.outer_field(a).expect("A has no outer field");
    let sub_field = registry.outer_field(sub).expect("B has no outer field");
    assert_eq!(unit.elements.variable(a_field).name, "this$0");
    assert_eq!(unit.elements.variable(sub_field).name, "this$1");
    assert_eq!(unit.elements.variable(sub_field).ty, TypeRef::Class(outer));
}

#[test]
fn test_resolved_unit_with_fresh_registry_is_rejected() {
    let mut b = UnitBuilder::new("Fresh");
    let outer = b.class("Fresh");
    let count = b.field(outer, "count", TypeRef::INT);
    let inner = b.inner_class(outer, "Inner");
    let bump = b.method(inner, "bump", &[], TypeRef::Void);
    let target = b.var(count);
    let one = b.int(1);
    let assign = b.assign(target, one);
    let inner_decl = type_decl(inner, vec![method_member(bump, vec![expr_stmt(assign)])]);
    b.declare(type_decl(outer, vec![Member::Type(inner_decl)]));
    let mut unit = b.finish();

    resolve(&mut unit);
    let resolved = unit.types.clone();
    let variables = unit.elements.variable_count();

    let err = OuterReferenceResolver::new()
        .run_on_unit(&mut unit, &mut CaptureRegistry::new())
        .unwrap_err();
    assert_eq!(err.code(), compiler::error_codes::UNIT_ALREADY_RESOLVED);
    assert_eq!(unit.types, resolved);
    assert_eq!(unit.elements.variable_count(), variables);
}
