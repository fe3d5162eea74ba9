//! Devirtualization
//!
//! Turns method bodies into free functions taking the receiver as an explicit
//! `self` parameter, and retargets call sites whose dispatch target cannot
//! vary to call those functions directly.
//!
//! A method qualifies when it is private or static, or when it is not
//! overridable (or is the target of a `super` call) and every `super` call
//! in its own body reaches a method that qualifies as well. That last
//! condition is resolved per method by a memoized depth-first search over the
//! super-call graph; a method reached again while its own resolution is still
//! in progress resolves to `false`, so cycles settle on `false` for every
//! member.

use log::{debug, trace};

use super::capture::CaptureRegistry;
use super::{LoweringError, LoweringPass, PassResult};
use crate::error_codes;
use crate::tast::collections::{new_id_map, new_id_set, IdMap, IdSet};
use crate::tast::visit::{walk_expression, walk_member, walk_type_declaration};
use crate::tast::{
    Block, ElementRef, ElementTable, Expression, ExpressionId, ExpressionKind, FunctionDeclaration,
    IdGenerator, Member, MethodElement, MethodId, MethodKind, MutVisitor, Statement,
    TypeDeclaration, TypeElementId, TypeKind, TypeRef, TypedUnit, VariableElement, VariableId,
    VariableKind,
};

const PASS: &str = "devirtualizer";

/// Methods other runtimes call by name; they keep dynamic dispatch
pub const DEFAULT_KEEP_VIRTUAL: &[&str] = &["equals/1", "hashCode/0"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Unknown,
    InProgress,
    Resolved(bool),
}

/// Per-candidate analysis state
#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub resolution: Resolution,
    /// Targets of `super` calls in the method's own body, in source order
    pub super_calls: IdSet<MethodId>,
}

impl Default for MethodInfo {
    fn default() -> Self {
        Self {
            resolution: Resolution::Unknown,
            super_calls: new_id_set(),
        }
    }
}

/// Whether every `super` call issued by `method` reaches a functionizable
/// method. Methods without an info entry (declared elsewhere, abstract or
/// kept virtual) are not.
pub fn resolve(infos: &mut IdMap<MethodId, MethodInfo>, method: MethodId) -> bool {
    let Some(info) = infos.get_mut(&method) else {
        return false;
    };
    match info.resolution {
        Resolution::Resolved(value) => return value,
        Resolution::InProgress => return false,
        Resolution::Unknown => {}
    }
    info.resolution = Resolution::InProgress;
    let targets: Vec<MethodId> = info.super_calls.iter().copied().collect();

    let value = targets.into_iter().all(|target| resolve(infos, target));
    if let Some(info) = infos.get_mut(&method) {
        info.resolution = Resolution::Resolved(value);
    }
    value
}

#[derive(Debug, Clone)]
pub struct Devirtualizer {
    keep_virtual: Vec<String>,
}

impl Default for Devirtualizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Devirtualizer {
    pub fn new() -> Self {
        Self::with_keep_virtual(DEFAULT_KEEP_VIRTUAL.iter().map(|s| s.to_string()).collect())
    }

    /// `keep_virtual` entries have the form `name/arity`
    pub fn with_keep_virtual(keep_virtual: Vec<String>) -> Self {
        Self { keep_virtual }
    }

    fn keeps_virtual(&self, method: &MethodElement) -> bool {
        let key = format!("{}/{}", method.name, method.params.len());
        self.keep_virtual.iter().any(|k| *k == key)
    }

    fn is_candidate(&self, method: &MethodElement) -> bool {
        method.kind == MethodKind::Method
            && !method.is_static
            && !method.is_abstract
            && !method.is_native
            && !self.keeps_virtual(method)
    }

    fn is_forced(&self, method: &MethodElement) -> bool {
        method.kind == MethodKind::Method
            && (method.is_private || method.is_static)
            && !method.is_abstract
            && !method.is_native
            && !self.keeps_virtual(method)
    }
}

impl LoweringPass for Devirtualizer {
    fn name(&self) -> &'static str {
        PASS
    }

    fn run_on_unit(
        &mut self,
        unit: &mut TypedUnit,
        _registry: &mut CaptureRegistry,
    ) -> Result<PassResult, LoweringError> {
        let TypedUnit {
            name,
            elements,
            types,
            functions,
            expression_ids,
        } = unit;

        let done: IdSet<MethodId> = functions.iter().map(|f| f.source_method).collect();

        let mut collector = SuperCallCollector::new(self, elements, &done);
        for decl in types.iter_mut() {
            collector.visit_type_declaration(decl);
        }
        let SuperCallCollector {
            mut infos,
            forced,
            non_virtual,
            ..
        } = collector;

        let mut selected: Vec<MethodId> = forced.iter().copied().collect();
        let candidates: Vec<MethodId> = infos.keys().copied().collect();
        for method in candidates {
            if forced.contains(&method) {
                continue;
            }
            if resolve(&mut infos, method)
                && (non_virtual.contains(&method) || !elements.is_overridable(method))
            {
                selected.push(method);
            }
        }
        selected.sort();
        debug!(
            "{}: {} of {} candidate method(s) functionized",
            name,
            selected.len(),
            infos.len() + forced.iter().filter(|m| !infos.contains_key(*m)).count()
        );
        if selected.is_empty() {
            return Ok(PassResult::unchanged());
        }

        let plan = plan_functions(elements, &selected);
        let mut result = PassResult::unchanged();

        let mut extractor = FunctionExtractor {
            elements,
            ids: expression_ids,
            plan: &plan,
            functions: Vec::new(),
            removed: new_id_set(),
            result: &mut result,
        };
        for decl in types.iter_mut() {
            extractor.visit_type_declaration(decl);
        }
        let extracted = std::mem::take(&mut extractor.functions);
        if let Some(missing) = plan
            .keys()
            .find(|m| !extracted.iter().any(|f| f.source_method == **m))
        {
            return Err(LoweringError::internal(
                error_codes::MISSING_METHOD_BODY,
                PASS,
                format!("no body found for {}", elements.method(*missing).name),
            ));
        }
        functions.extend(extracted);

        let mut call_sites = CallSiteRewriter {
            elements,
            ids: expression_ids,
            plan: &plan,
            types: Vec::new(),
            result: &mut result,
        };
        for decl in types.iter_mut() {
            call_sites.visit_type_declaration(decl);
        }
        for function in functions.iter_mut() {
            let owner = call_sites.elements.method(function.function).declaring_type;
            call_sites.types.push(owner);
            call_sites.visit_block(&mut function.body);
            call_sites.types.pop();
        }

        Ok(result)
    }
}

// ----- collection -----

struct SuperCallCollector<'a> {
    config: &'a Devirtualizer,
    elements: &'a ElementTable,
    done: &'a IdSet<MethodId>,
    infos: IdMap<MethodId, MethodInfo>,
    forced: IdSet<MethodId>,
    /// Methods invoked somewhere without dynamic dispatch
    non_virtual: IdSet<MethodId>,
    /// Innermost method whose own body is being walked
    current: Vec<Option<MethodId>>,
}

impl<'a> SuperCallCollector<'a> {
    fn new(config: &'a Devirtualizer, elements: &'a ElementTable, done: &'a IdSet<MethodId>) -> Self {
        Self {
            config,
            elements,
            done,
            infos: new_id_map(),
            forced: new_id_set(),
            non_virtual: new_id_set(),
            current: Vec::new(),
        }
    }
}

impl MutVisitor for SuperCallCollector<'_> {
    fn visit_type_declaration(&mut self, decl: &mut TypeDeclaration) {
        self.current.push(None);
        walk_type_declaration(self, decl);
        self.current.pop();
    }

    fn visit_member(&mut self, member: &mut Member) {
        let Member::Method {
            method,
            body: Some(_),
        } = member
        else {
            walk_member(self, member);
            return;
        };
        let method = *method;
        if !self.done.contains(&method) {
            let element = self.elements.method(method);
            if self.config.is_forced(element) {
                self.forced.insert(method);
            }
            if self.config.is_candidate(element) {
                self.infos.entry(method).or_default();
            }
        }
        self.current.push(Some(method));
        walk_member(self, member);
        self.current.pop();
    }

    fn visit_expression(&mut self, expr: &mut Expression) {
        match &expr.kind {
            ExpressionKind::SuperMethodCall { method, .. } => {
                self.non_virtual.insert(*method);
                if let Some(Some(current)) = self.current.last() {
                    if let Some(info) = self.infos.get_mut(current) {
                        info.super_calls.insert(*method);
                    }
                }
            }
            ExpressionKind::MethodCall { method, .. } => {
                if !self.elements.is_overridable(*method) {
                    self.non_virtual.insert(*method);
                }
            }
            _ => {}
        }

        if matches!(expr.kind, ExpressionKind::Lambda { .. }) {
            self.current.push(None);
            walk_expression(self, expr);
            self.current.pop();
        } else {
            walk_expression(self, expr);
        }
    }
}

// ----- planning -----

#[derive(Debug, Clone)]
struct Functionized {
    function: MethodId,
    name: String,
    owner: TypeElementId,
    self_param: Option<VariableId>,
    params: Vec<VariableId>,
    /// Parameters of the dispatching method once its body forwards
    forwarder_params: Vec<VariableId>,
    return_type: TypeRef,
    is_private: bool,
}

fn function_name(elements: &ElementTable, method: MethodId) -> String {
    let element = elements.method(method);
    let owner = element.declaring_type;
    let base = format!("{}_{}", elements.qualified_name(owner), element.name);
    let overloads = elements
        .type_element(owner)
        .methods
        .iter()
        .filter(|other| elements.method(**other).name == element.name)
        .count();
    let suffix = elements.signature_suffix(method);
    if overloads > 1 && !suffix.is_empty() {
        format!("{}_{}", base, suffix)
    } else {
        base
    }
}

fn plan_functions(elements: &mut ElementTable, selected: &[MethodId]) -> IdMap<MethodId, Functionized> {
    let mut plan = new_id_map();
    for &method in selected {
        let name = function_name(elements, method);
        let source = elements.method(method).clone();
        let function = elements.add_method(MethodElement {
            name: name.clone(),
            kind: MethodKind::Function,
            declaring_type: source.declaring_type,
            params: Vec::new(),
            return_type: source.return_type.clone(),
            is_static: true,
            is_private: source.is_private,
            is_final: true,
            is_abstract: false,
            is_native: false,
        });

        let self_param = (!source.is_static).then(|| {
            elements.add_variable(VariableElement {
                name: "self".to_string(),
                kind: VariableKind::Parameter,
                declaring: ElementRef::Method(function),
                ty: TypeRef::Class(source.declaring_type),
                is_static: false,
                is_final: true,
                constant: None,
                synthetic: true,
            })
        });

        let mut forwarder_params = Vec::new();
        for &param in &source.params {
            if !source.is_private {
                let mut fresh = elements.variable(param).clone();
                fresh.declaring = ElementRef::Method(method);
                forwarder_params.push(elements.add_variable(fresh));
            }
            elements.variable_mut(param).declaring = ElementRef::Method(function);
        }

        let mut function_params: Vec<VariableId> = self_param.into_iter().collect();
        function_params.extend(source.params.iter().copied());
        elements.method_mut(function).params = function_params;
        if !source.is_private {
            elements.method_mut(method).params = forwarder_params.clone();
        }

        trace!("{}: {} becomes {}", PASS, source.name, name);
        plan.insert(
            method,
            Functionized {
                function,
                name,
                owner: source.declaring_type,
                self_param,
                params: source.params.clone(),
                forwarder_params,
                return_type: source.return_type.clone(),
                is_private: source.is_private,
            },
        );
    }
    plan
}

// ----- extraction -----

struct FunctionExtractor<'a> {
    elements: &'a mut ElementTable,
    ids: &'a mut IdGenerator<ExpressionId>,
    plan: &'a IdMap<MethodId, Functionized>,
    functions: Vec<FunctionDeclaration>,
    removed: IdSet<MethodId>,
    result: &'a mut PassResult,
}

impl FunctionExtractor<'_> {
    fn make(&mut self, ty: TypeRef, kind: ExpressionKind) -> Expression {
        Expression::new(self.ids.next(), ty, kind)
    }

    fn forwarder(&mut self, target: &Functionized) -> Block {
        let mut args = Vec::with_capacity(target.forwarder_params.len() + 1);
        if target.self_param.is_some() {
            args.push(self.make(TypeRef::Class(target.owner), ExpressionKind::This(target.owner)));
        }
        for &param in &target.forwarder_params {
            let ty = self.elements.variable(param).ty.clone();
            args.push(self.make(ty, ExpressionKind::Variable(param)));
        }
        let call = self.make(
            target.return_type.clone(),
            ExpressionKind::FunctionCall {
                function: target.function,
                args,
            },
        );
        let statement = if target.return_type.is_void() {
            Statement::Expression(call)
        } else {
            Statement::Return(Some(call))
        };
        Block::new(vec![statement])
    }
}

impl MutVisitor for FunctionExtractor<'_> {
    fn visit_type_declaration(&mut self, decl: &mut TypeDeclaration) {
        walk_type_declaration(self, decl);
        if !self.removed.is_empty() {
            let removed = &self.removed;
            decl.members.retain(|member| match member {
                Member::Method { method, .. } => !removed.contains(method),
                _ => true,
            });
        }
    }

    fn visit_member(&mut self, member: &mut Member) {
        // nested declarations in the body are handled before the body moves
        walk_member(self, member);

        let Member::Method { method, body } = member else {
            return;
        };
        let method = *method;
        let plan = self.plan;
        let Some(target) = plan.get(&method) else {
            return;
        };
        let Some(mut function_body) = body.take() else {
            return;
        };

        if let Some(self_param) = target.self_param {
            let mut rewriter = SelfRewriter {
                elements: self.elements,
                ids: self.ids,
                self_param,
                self_ty: TypeRef::Class(target.owner),
            };
            rewriter.visit_block(&mut function_body);
        }

        self.functions.push(FunctionDeclaration {
            name: target.name.clone(),
            function: target.function,
            source_method: method,
            self_param: target.self_param,
            params: target.params.clone(),
            body: function_body,
        });
        self.result.record("functionized");

        if target.is_private {
            self.removed.insert(method);
            self.result.record("private-removed");
        } else {
            *body = Some(self.forwarder(target));
            self.result.record("forwarders");
        }
    }
}

/// Routes implicit receivers in a function body through `self`. Nested
/// class and lambda bodies keep their own receivers.
struct SelfRewriter<'a> {
    elements: &'a ElementTable,
    ids: &'a mut IdGenerator<ExpressionId>,
    self_param: VariableId,
    self_ty: TypeRef,
}

impl SelfRewriter<'_> {
    fn self_expr(&mut self) -> Expression {
        Expression::new(
            self.ids.next(),
            self.self_ty.clone(),
            ExpressionKind::Variable(self.self_param),
        )
    }
}

impl MutVisitor for SelfRewriter<'_> {
    fn visit_type_declaration(&mut self, _decl: &mut TypeDeclaration) {}

    fn visit_expression(&mut self, expr: &mut Expression) {
        if matches!(expr.kind, ExpressionKind::Lambda { .. }) {
            for child in expr.children_mut() {
                self.visit_expression(child);
            }
            return;
        }
        walk_expression(self, expr);

        let replacement = match &mut expr.kind {
            ExpressionKind::This(_) => Some(ExpressionKind::Variable(self.self_param)),
            ExpressionKind::Variable(var) if self.elements.variable(*var).is_instance_field() => {
                let field = *var;
                Some(ExpressionKind::FieldAccess {
                    object: Box::new(self.self_expr()),
                    field,
                })
            }
            ExpressionKind::MethodCall {
                receiver, method, ..
            } if receiver.is_none() && !self.elements.method(*method).is_static => {
                *receiver = Some(Box::new(self.self_expr()));
                None
            }
            ExpressionKind::SuperMethodCall { receiver, .. } if receiver.is_none() => {
                *receiver = Some(Box::new(self.self_expr()));
                None
            }
            _ => None,
        };
        if let Some(kind) = replacement {
            expr.kind = kind;
        }
    }
}

// ----- call sites -----

struct CallSiteRewriter<'a> {
    elements: &'a ElementTable,
    ids: &'a mut IdGenerator<ExpressionId>,
    plan: &'a IdMap<MethodId, Functionized>,
    /// Innermost type or lambda whose `this` an implicit receiver means
    types: Vec<TypeElementId>,
    result: &'a mut PassResult,
}

impl CallSiteRewriter<'_> {
    /// `this` of the innermost type; `super` skips lambdas, whose `this`
    /// is the enclosing class
    fn this_expr(&mut self, is_super: bool) -> Option<Expression> {
        let elements = self.elements;
        let ty = *self
            .types
            .iter()
            .rev()
            .find(|ty| !is_super || elements.type_element(**ty).kind != TypeKind::Lambda)?;
        Some(Expression::new(
            self.ids.next(),
            TypeRef::Class(ty),
            ExpressionKind::This(ty),
        ))
    }

    fn direct_call(&mut self, expr: &mut Expression) {
        let (receiver, method, args, is_super) = match &mut expr.kind {
            ExpressionKind::MethodCall {
                receiver,
                method,
                args,
            } => (receiver, *method, args, false),
            ExpressionKind::SuperMethodCall {
                receiver,
                method,
                args,
                ..
            } => (receiver, *method, args, true),
            _ => return,
        };
        let plan = self.plan;
        let Some(target) = plan.get(&method) else {
            return;
        };
        if !is_super && self.elements.is_overridable(method) {
            return;
        }

        let mut call_args = Vec::with_capacity(args.len() + 1);
        if target.self_param.is_some() {
            let receiver = match receiver.take() {
                Some(receiver) => *receiver,
                None => match self.this_expr(is_super) {
                    Some(this) => this,
                    None => return,
                },
            };
            call_args.push(receiver);
        } else if receiver.is_some() {
            // static call through an instance expression keeps its evaluation
            return;
        }
        call_args.append(args);

        expr.kind = ExpressionKind::FunctionCall {
            function: target.function,
            args: call_args,
        };
        self.result.record("direct-calls");
    }
}

impl MutVisitor for CallSiteRewriter<'_> {
    fn visit_type_declaration(&mut self, decl: &mut TypeDeclaration) {
        self.types.push(decl.element);
        walk_type_declaration(self, decl);
        self.types.pop();
    }

    fn visit_expression(&mut self, expr: &mut Expression) {
        let lambda = match &expr.kind {
            ExpressionKind::Lambda { element, .. } => Some(*element),
            _ => None,
        };
        if let Some(element) = lambda {
            self.types.push(element);
        }
        walk_expression(self, expr);
        if lambda.is_some() {
            self.types.pop();
        }
        self.direct_call(expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tast::builder::{expr_stmt, method_member, type_decl, UnitBuilder};

    fn info(targets: &[MethodId]) -> MethodInfo {
        let mut info = MethodInfo::default();
        info.super_calls.extend(targets.iter().copied());
        info
    }

    #[test]
    fn test_resolve_cycle_is_false_for_every_member() {
        let a = MethodId::from_raw(0);
        let b = MethodId::from_raw(1);
        let c = MethodId::from_raw(2);
        let mut infos = new_id_map();
        infos.insert(a, info(&[b]));
        infos.insert(b, info(&[c]));
        infos.insert(c, info(&[a]));

        assert!(!resolve(&mut infos, a));
        for method in [a, b, c] {
            assert_eq!(infos[&method].resolution, Resolution::Resolved(false));
        }
    }

    #[test]
    fn test_resolve_chain_and_unknown_target() {
        let leaf = MethodId::from_raw(0);
        let middle = MethodId::from_raw(1);
        let external = MethodId::from_raw(7);
        let caller = MethodId::from_raw(2);
        let mut infos = new_id_map();
        infos.insert(leaf, info(&[]));
        infos.insert(middle, info(&[leaf]));
        infos.insert(caller, info(&[middle, external]));

        assert!(resolve(&mut infos, middle));
        assert!(!resolve(&mut infos, caller));
        assert_eq!(infos[&leaf].resolution, Resolution::Resolved(true));
        assert_eq!(infos[&caller].resolution, Resolution::Resolved(false));
    }

    #[test]
    fn test_private_method_becomes_function_and_call_is_direct() {
        let mut b = UnitBuilder::new("Counter");
        let class = b.class("Counter");
        let count = b.field(class, "count", TypeRef::INT);
        let bump = b.method(class, "bump", &[], TypeRef::Void);
        b.set_private(bump);
        let run = b.method(class, "run", &[], TypeRef::Void);

        let target = b.var(count);
        let one = b.int(1);
        let add = b.compound_assign(crate::tast::AssignOp::Add, target, one);
        let call = b.call(None, bump, vec![]);
        b.declare(type_decl(
            class,
            vec![
                method_member(bump, vec![expr_stmt(add)]),
                method_member(run, vec![expr_stmt(call)]),
            ],
        ));
        let mut unit = b.finish();

        let mut pass = Devirtualizer::new();
        let result = pass.run_on_unit(&mut unit, &mut CaptureRegistry::new()).unwrap();
        assert_eq!(result.stat("private-removed"), 1);

        let bump_fn = unit
            .functions
            .iter()
            .find(|f| f.source_method == bump)
            .expect("bump functionized");
        assert_eq!(bump_fn.name, "Counter_bump");
        let self_param = bump_fn.self_param.unwrap();
        let Statement::Expression(body_expr) = &bump_fn.body.statements[0] else {
            panic!("function body changed shape");
        };
        let ExpressionKind::Assignment { target, .. } = &body_expr.kind else {
            panic!("expected assignment");
        };
        match &target.kind {
            ExpressionKind::FieldAccess { object, field } => {
                assert_eq!(*field, count);
                assert_eq!(object.kind, ExpressionKind::Variable(self_param));
            }
            other => panic!("expected self.count, got {:?}", other),
        }

        assert!(!unit.types[0]
            .members
            .iter()
            .any(|m| matches!(m, Member::Method { method, .. } if *method == bump)));

        // run stays a dispatched method with its own body
        assert!(!unit.functions.iter().any(|f| f.source_method == run));
        let Member::Method { body: Some(run_body), .. } = &unit.types[0].members[0] else {
            panic!("run missing");
        };
        let Statement::Expression(call) = &run_body.statements[0] else {
            panic!("run body changed shape");
        };
        match &call.kind {
            ExpressionKind::FunctionCall { function, args } => {
                assert_eq!(*function, bump_fn.function);
                assert_eq!(args[0].kind, ExpressionKind::This(class));
            }
            other => panic!("expected direct call, got {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_super_call_in_lambda_uses_class_instance() {
        // B extends A { run() { () -> super.m(); } } without capture resolution
        let mut b = UnitBuilder::new("Fallback");
        let a = b.class("A");
        let a_m = b.method(a, "m", &[], TypeRef::Void);
        let sub = b.class("B");
        b.extends(sub, a);
        let run = b.method(sub, "run", &[], TypeRef::Void);
        let runnable = b.interface("Runnable");
        let lambda = b.lambda_type(ElementRef::Method(run), runnable);
        let super_call = b.super_call(None, a_m, vec![]);
        let lambda_expr = b.lambda(lambda, vec![], crate::tast::builder::block(vec![expr_stmt(super_call)]));
        b.declare(type_decl(a, vec![method_member(a_m, vec![])]));
        b.declare(type_decl(sub, vec![method_member(run, vec![expr_stmt(lambda_expr)])]));
        let mut unit = b.finish();

        Devirtualizer::new()
            .run_on_unit(&mut unit, &mut CaptureRegistry::new())
            .unwrap();
        let a_fn = unit
            .functions
            .iter()
            .find(|f| f.source_method == a_m)
            .expect("A.m functionized")
            .function;
        let holder = unit
            .functions
            .iter()
            .find(|f| f.source_method == run)
            .map(|f| &f.body)
            .or_else(|| match &unit.types[1].members[0] {
                Member::Method { body, .. } => body.as_ref(),
                _ => None,
            })
            .expect("run body missing");
        let Statement::Expression(lambda_expr) = &holder.statements[0] else {
            panic!("run body changed shape");
        };
        let ExpressionKind::Lambda { body, .. } = &lambda_expr.kind else {
            panic!("expected lambda");
        };
        let Statement::Expression(call) = &body.statements[0] else {
            panic!("lambda body changed shape");
        };
        match &call.kind {
            ExpressionKind::FunctionCall { function, args } => {
                assert_eq!(*function, a_fn);
                assert_ne!(args[0].kind, ExpressionKind::This(lambda));
                assert_eq!(args[0].ty, TypeRef::Class(sub));
            }
            other => panic!("expected direct call, got {:?}", other),
        }
    }

    #[test]
    fn test_keep_virtual_methods_are_left_alone() {
        let mut b = UnitBuilder::new("Value");
        let class = b.class("Value");
        b.set_final(class);
        let hash = b.method(class, "hashCode", &[], TypeRef::INT);
        let zero = b.int(0);
        b.declare(type_decl(class, vec![method_member(hash, vec![Statement::Return(Some(zero))])]));
        let mut unit = b.finish();
        let before = unit.types.clone();

        let result = Devirtualizer::new()
            .run_on_unit(&mut unit, &mut CaptureRegistry::new())
            .unwrap();
        assert!(!result.modified);
        assert!(unit.functions.is_empty());
        assert_eq!(unit.types, before);
    }
}
