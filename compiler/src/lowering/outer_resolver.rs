//! Scope & capture resolution (closure conversion)
//!
//! Replaces every implicit reference that crosses a type boundary with an
//! explicit access path:
//!
//! - `this` of an enclosing class and implicit outer fields or methods become
//!   chains of outer-instance hops (`this$0.this$0.f`)
//! - locals captured by local, anonymous and lambda types become reads of
//!   capture fields or constructor parameters (`val$x`, `capture$x`)
//! - creation sites (`new`, lambdas, `super(..)`, `this(..)`) receive the
//!   implicit outer, super-outer and capture arguments
//!
//! Resolution runs in two phases. The collect phase walks the unit without
//! touching the tree, creating registry entries for every hop it would
//! need, and repeats until a walk adds nothing. At that point every type's
//! capture set and outer requirement is final, so the registry is sealed and
//! the rewrite phase replaces nodes using the completed sets.
//!
//! Running again over a resolved unit is a no-op only with the sealed
//! registry of the first run. A fresh registry cannot be rebuilt from the
//! rewritten tree, so that case is rejected with E8103.

use log::{debug, trace};

use super::capture::CaptureRegistry;
use super::scope::{ScopeKind, ScopeStack};
use super::{LoweringError, LoweringPass, PassResult};
use crate::error_codes;
use crate::tast::{
    Block, ConstructorCall, ConstructorCallKind, ElementRef, ElementTable, Expression, ExpressionId,
    ExpressionKind, IdGenerator, ImplicitArgs, Literal, Member, MethodKind, Statement,
    TypeDeclaration, TypeElementId, TypeKind, TypeRef, TypedUnit, VariableId, VariableKind,
};

const PASS: &str = "outer-resolver";

/// Upper bound on collect rounds; each round adds at least one variable, and
/// deeply nested capture chains settle after a handful
pub const DEFAULT_MAX_COLLECT_ROUNDS: usize = 64;

#[derive(Debug)]
pub struct OuterReferenceResolver {
    max_rounds: usize,
}

impl Default for OuterReferenceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl OuterReferenceResolver {
    pub fn new() -> Self {
        Self::with_max_rounds(DEFAULT_MAX_COLLECT_ROUNDS)
    }

    pub fn with_max_rounds(max_rounds: usize) -> Self {
        Self {
            max_rounds: max_rounds.max(1),
        }
    }
}

impl LoweringPass for OuterReferenceResolver {
    fn name(&self) -> &'static str {
        PASS
    }

    fn run_on_unit(
        &mut self,
        unit: &mut TypedUnit,
        registry: &mut CaptureRegistry,
    ) -> Result<PassResult, LoweringError> {
        let TypedUnit {
            name,
            elements,
            types,
            expression_ids,
            ..
        } = unit;

        if !registry.is_sealed() && registry.entries().next().is_none() {
            if let Some((owner, var)) = resolver_variable(elements) {
                return Err(LoweringError::Input {
                    code: error_codes::UNIT_ALREADY_RESOLVED,
                    unit: name.clone(),
                    message: format!(
                        "{} already declares {}; its capture registry cannot be rebuilt from the tree",
                        elements.qualified_name(owner),
                        elements.variable(var).name
                    ),
                });
            }
        }

        let mut rounds = 0;
        loop {
            let before = registry.revision();
            let mut walker = Walker::new(elements, expression_ids, registry, Mode::Collect);
            walker.walk_types(types)?;
            rounds += 1;
            if registry.revision() == before {
                break;
            }
            if rounds >= self.max_rounds {
                return Err(LoweringError::internal(
                    error_codes::CAPTURES_DID_NOT_CONVERGE,
                    PASS,
                    format!("{} still growing after {} rounds", name, rounds),
                ));
            }
        }
        debug!(
            "{}: capture sets settled after {} collect round(s), {} capturing type(s)",
            name,
            rounds,
            registry.entries().count()
        );

        registry.seal();
        let mut walker = Walker::new(elements, expression_ids, registry, Mode::Rewrite);
        walker.walk_types(types)?;
        Ok(walker.result)
    }
}

/// A synthetic parameter or field this pass adds to a type, if the unit
/// holds one
fn resolver_variable(elements: &ElementTable) -> Option<(TypeElementId, VariableId)> {
    (0..elements.variable_count())
        .map(|index| VariableId::from_raw(index as u32))
        .find_map(|var| {
            let element = elements.variable(var);
            match element.declaring {
                ElementRef::Type(owner)
                    if element.synthetic
                        && matches!(element.kind, VariableKind::Parameter | VariableKind::Field) =>
                {
                    Some((owner, var))
                }
                _ => None,
            }
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Collect,
    Rewrite,
}

/// One step of an access path
#[derive(Debug, Clone, Copy)]
struct Hop {
    /// Type whose instance the hop starts from
    owner: TypeElementId,
    var: VariableId,
    via_param: bool,
}

enum LocalValue {
    InScope,
    Constant(Literal),
    Path(Vec<Hop>),
}

struct Walker<'a> {
    elements: &'a mut ElementTable,
    ids: &'a mut IdGenerator<ExpressionId>,
    registry: &'a mut CaptureRegistry,
    scopes: ScopeStack,
    mode: Mode,
    result: PassResult,
}

impl<'a> Walker<'a> {
    fn new(
        elements: &'a mut ElementTable,
        ids: &'a mut IdGenerator<ExpressionId>,
        registry: &'a mut CaptureRegistry,
        mode: Mode,
    ) -> Self {
        Self {
            elements,
            ids,
            registry,
            scopes: ScopeStack::new(),
            mode,
            result: PassResult::unchanged(),
        }
    }

    fn rewriting(&self) -> bool {
        self.mode == Mode::Rewrite
    }

    fn walk_types(&mut self, types: &mut [TypeDeclaration]) -> Result<(), LoweringError> {
        for decl in types {
            self.walk_type_declaration(decl)?;
        }
        Ok(())
    }

    fn walk_type_declaration(&mut self, decl: &mut TypeDeclaration) -> Result<(), LoweringError> {
        let ty = decl.element;
        if self.elements.type_element(ty).kind == TypeKind::Member && self.elements.has_outer_context(ty) {
            self.registry.get_or_create_outer_param(self.elements, ty)?;
        }
        self.scopes.push_class(self.elements, ty);
        if self.mode == Mode::Collect {
            self.inherit_superclass_captures(ty)?;
        }
        for member in &mut decl.members {
            self.walk_member(member)?;
        }
        self.scopes.pop();
        Ok(())
    }

    /// A local type extending another local type must pass the superclass's
    /// captures to its constructor, so it captures them too.
    fn inherit_superclass_captures(&mut self, ty: TypeElementId) -> Result<(), LoweringError> {
        if !self.elements.type_element(ty).is_local_like() {
            return Ok(());
        }
        let Some(superclass) = self.elements.type_element(ty).superclass else {
            return Ok(());
        };
        let inherited: Vec<VariableId> = self
            .registry
            .local_captures(superclass)
            .iter()
            .map(|c| c.var)
            .collect();
        if inherited.is_empty() {
            return Ok(());
        }
        self.scopes.push_method(None, &[], true);
        for var in inherited {
            self.local_value(var)?;
        }
        self.scopes.pop();
        Ok(())
    }

    fn walk_member(&mut self, member: &mut Member) -> Result<(), LoweringError> {
        match member {
            Member::Field { var, initializer } => {
                if let Some(init) = initializer {
                    let is_static = self.elements.variable(*var).is_static;
                    self.scopes.push_method(None, &[], !is_static);
                    self.walk_expression(init)?;
                    self.scopes.pop();
                }
            }
            Member::Method { method, body } => {
                if let Some(body) = body {
                    let element = self.elements.method(*method);
                    let initializing = element.kind == MethodKind::Constructor;
                    let params = element.params.clone();
                    self.scopes.push_method(Some(*method), &params, initializing);
                    self.walk_block(body)?;
                    self.scopes.pop();
                }
            }
            Member::Initializer { is_static, body } => {
                self.scopes.push_method(None, &[], !*is_static);
                self.walk_block(body)?;
                self.scopes.pop();
            }
            Member::Type(decl) => self.walk_type_declaration(decl)?,
        }
        Ok(())
    }

    fn walk_block(&mut self, block: &mut Block) -> Result<(), LoweringError> {
        for stmt in &mut block.statements {
            self.walk_statement(stmt)?;
        }
        Ok(())
    }

    fn walk_statement(&mut self, stmt: &mut Statement) -> Result<(), LoweringError> {
        match stmt {
            Statement::Expression(expr) | Statement::Throw(expr) => self.walk_expression(expr)?,
            Statement::VarDecl { var, initializer } => {
                self.scopes.declare(*var);
                if let Some(init) = initializer {
                    self.walk_expression(init)?;
                }
            }
            Statement::LocalClass(decl) => self.walk_type_declaration(decl)?,
            Statement::Block(block) => self.walk_block(block)?,
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.walk_expression(condition)?;
                self.walk_statement(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.walk_statement(else_branch)?;
                }
            }
            Statement::While { condition, body } => {
                self.walk_expression(condition)?;
                self.walk_statement(body)?;
            }
            Statement::DoWhile { body, condition } => {
                self.walk_statement(body)?;
                self.walk_expression(condition)?;
            }
            Statement::For {
                init,
                condition,
                update,
                body,
            } => {
                for stmt in init {
                    self.walk_statement(stmt)?;
                }
                if let Some(condition) = condition {
                    self.walk_expression(condition)?;
                }
                for expr in update {
                    self.walk_expression(expr)?;
                }
                self.walk_statement(body)?;
            }
            Statement::ForEach {
                var,
                iterable,
                body,
            } => {
                self.walk_expression(iterable)?;
                self.scopes.declare(*var);
                self.walk_statement(body)?;
            }
            Statement::Switch {
                discriminant,
                cases,
            } => {
                self.walk_expression(discriminant)?;
                for case in cases {
                    for label in &mut case.labels {
                        self.walk_expression(label)?;
                    }
                    for stmt in &mut case.body {
                        self.walk_statement(stmt)?;
                    }
                }
            }
            Statement::Return(value) => {
                if let Some(value) = value {
                    self.walk_expression(value)?;
                }
            }
            Statement::Break(_) | Statement::Continue(_) | Statement::Empty => {}
            Statement::Labeled { body, .. } => self.walk_statement(body)?,
            Statement::Try {
                body,
                catches,
                finally,
            } => {
                self.walk_block(body)?;
                for catch in catches {
                    self.scopes.declare(catch.param);
                    self.walk_block(&mut catch.body)?;
                }
                if let Some(finally) = finally {
                    self.walk_block(finally)?;
                }
            }
            Statement::Synchronized { lock, body } => {
                self.walk_expression(lock)?;
                self.walk_block(body)?;
            }
            Statement::Assert { condition, message } => {
                self.walk_expression(condition)?;
                if let Some(message) = message {
                    self.walk_expression(message)?;
                }
            }
            Statement::ConstructorCall(call) => self.walk_constructor_call(call)?,
        }
        Ok(())
    }

    fn walk_constructor_call(&mut self, call: &mut ConstructorCall) -> Result<(), LoweringError> {
        if let Some(qualifier) = &mut call.qualifier {
            self.walk_expression(qualifier)?;
        }
        for arg in &mut call.args {
            self.walk_expression(arg)?;
        }
        if call.implicit.resolved {
            return Ok(());
        }
        let target = match call.kind {
            ConstructorCallKind::Super | ConstructorCallKind::This => {
                self.elements.method(call.constructor).declaring_type
            }
        };
        let mut implicit = ImplicitArgs::default();
        if call.qualifier.is_none() && self.takes_outer_instance(target) {
            implicit.outer = Some(Box::new(self.outer_instance_of(target)?));
        }
        implicit.captures = self.capture_args(target)?;
        if self.rewriting() {
            implicit.resolved = true;
            call.implicit = implicit;
            self.result.record("creation-sites");
        }
        Ok(())
    }

    fn walk_expression(&mut self, expr: &mut Expression) -> Result<(), LoweringError> {
        for child in expr.children_mut() {
            self.walk_expression(child)?;
        }

        let replacement = match &mut expr.kind {
            ExpressionKind::Literal(_)
            | ExpressionKind::FieldAccess { .. }
            | ExpressionKind::ArrayAccess { .. }
            | ExpressionKind::FunctionCall { .. }
            | ExpressionKind::Assignment { .. }
            | ExpressionKind::Unary { .. }
            | ExpressionKind::Binary { .. }
            | ExpressionKind::ShortCircuit { .. }
            | ExpressionKind::Conditional { .. }
            | ExpressionKind::Cast { .. }
            | ExpressionKind::InstanceOf { .. }
            | ExpressionKind::ArrayLiteral { .. } => None,
            ExpressionKind::Variable(var) => {
                let var = *var;
                self.resolve_variable(var)?
            }
            ExpressionKind::This(ty) => {
                let ty = *ty;
                self.resolve_this(ty)?
            }
            ExpressionKind::MethodCall {
                receiver, method, ..
            } => {
                if receiver.is_none() {
                    let method = self.elements.method(*method);
                    if !method.is_static && method.kind == MethodKind::Method {
                        let owner = method.declaring_type;
                        let hops = self.inherited_hops(owner)?;
                        if !hops.is_empty() && self.rewriting() {
                            *receiver = Some(Box::new(self.path_expression(&hops)));
                            self.result.record("outer-paths");
                        }
                    }
                }
                None
            }
            ExpressionKind::SuperMethodCall {
                qualifier: Some(qualifier),
                receiver,
                ..
            } => {
                let qualifier = *qualifier;
                let is_outer_class = !self.elements.type_element(qualifier).is_interface
                    && self.scopes.current_class().map(|s| s.ty) != Some(qualifier);
                if receiver.is_none() && is_outer_class {
                    let hops = self.exact_hops(qualifier)?;
                    if self.rewriting() {
                        *receiver = Some(Box::new(self.path_expression(&hops)));
                        self.result.record("outer-paths");
                    }
                }
                None
            }
            ExpressionKind::SuperMethodCall {
                qualifier: None,
                receiver,
                ..
            } => {
                // `super` inside a lambda belongs to the class around it
                let in_lambda = self.scopes.current_class().map(|s| s.kind) == Some(ScopeKind::Lambda);
                if receiver.is_none() && in_lambda {
                    let Some(owner) = self.scopes.nearest_class().map(|s| s.ty) else {
                        return Err(LoweringError::internal(
                            error_codes::BROKEN_NESTING_CHAIN,
                            PASS,
                            "super call in a lambda outside any class".to_string(),
                        ));
                    };
                    let hops = self.exact_hops(owner)?;
                    if self.rewriting() {
                        *receiver = Some(Box::new(self.path_expression(&hops)));
                        self.result.record("outer-paths");
                    }
                }
                None
            }
            ExpressionKind::New {
                class,
                qualifier,
                body,
                implicit,
                ..
            } => {
                if let Some(decl) = body {
                    self.walk_type_declaration(decl)?;
                }
                if !implicit.resolved {
                    let class = *class;
                    let resolved = if body.is_some() {
                        self.anonymous_creation_args(class, qualifier.is_some())?
                    } else {
                        self.creation_args(class, qualifier.is_some())?
                    };
                    if self.rewriting() {
                        *implicit = resolved;
                        self.result.record("creation-sites");
                    }
                }
                None
            }
            ExpressionKind::Lambda {
                element,
                params,
                body,
                implicit,
            } => {
                let element = *element;
                self.scopes.push_lambda(element, params);
                self.walk_block(body)?;
                self.scopes.pop();
                if !implicit.resolved {
                    let mut resolved = ImplicitArgs::default();
                    if self.registry.needs_outer_param(element) {
                        resolved.outer = Some(Box::new(self.outer_instance_of(element)?));
                    }
                    resolved.captures = self.capture_args(element)?;
                    if self.rewriting() {
                        resolved.resolved = true;
                        *implicit = resolved;
                        self.result.record("creation-sites");
                    }
                }
                None
            }
        };

        if let Some(replacement) = replacement {
            if self.rewriting() {
                trace!("{}: replaced expression {}", PASS, expr.id);
                *expr = replacement;
            }
        }
        Ok(())
    }

    fn resolve_variable(&mut self, var: VariableId) -> Result<Option<Expression>, LoweringError> {
        let element = self.elements.variable(var);
        if element.synthetic {
            return Ok(None);
        }
        let kind = element.kind;
        match kind {
            VariableKind::Field => {
                if element.is_static {
                    return Ok(None);
                }
                let owner = match element.declaring {
                    ElementRef::Type(owner) => owner,
                    ElementRef::Method(method) => self.elements.method(method).declaring_type,
                };
                let hops = self.inherited_hops(owner)?;
                if hops.is_empty() || !self.rewriting() {
                    return Ok(None);
                }
                self.result.record("outer-paths");
                let object = self.path_expression(&hops);
                Ok(Some(self.field_access(object, var)))
            }
            VariableKind::Parameter | VariableKind::Local => match self.local_value(var)? {
                LocalValue::InScope => Ok(None),
                LocalValue::Constant(literal) => {
                    if !self.rewriting() {
                        return Ok(None);
                    }
                    self.result.record("constants-inlined");
                    let ty = self.elements.variable(var).ty.clone();
                    Ok(Some(self.make(ty, ExpressionKind::Literal(literal))))
                }
                LocalValue::Path(hops) => {
                    if !self.rewriting() {
                        return Ok(None);
                    }
                    self.result.record("captures");
                    Ok(Some(self.path_expression(&hops)))
                }
            },
        }
    }

    fn resolve_this(&mut self, ty: TypeElementId) -> Result<Option<Expression>, LoweringError> {
        if self.scopes.current_class().map(|s| s.ty) == Some(ty) {
            return Ok(None);
        }
        let hops = self.exact_hops(ty)?;
        if hops.is_empty() || !self.rewriting() {
            return Ok(None);
        }
        self.result.record("outer-paths");
        Ok(Some(self.path_expression(&hops)))
    }

    /// Member inner classes always take their enclosing instance; local
    /// types only once something inside them needs it
    fn takes_outer_instance(&self, ty: TypeElementId) -> bool {
        let element = self.elements.type_element(ty);
        match element.kind {
            TypeKind::Member => self.elements.has_outer_context(ty),
            TypeKind::TopLevel => false,
            TypeKind::Local | TypeKind::Anonymous | TypeKind::Lambda => {
                self.registry.needs_outer_param(ty)
            }
        }
    }

    /// Expression for the instance enclosing `ty`, seen from the current scope
    fn outer_instance_of(&mut self, ty: TypeElementId) -> Result<Expression, LoweringError> {
        let outer = self.elements.enclosing_type(ty).ok_or_else(|| {
            LoweringError::internal(
                error_codes::NO_ENCLOSING_INSTANCE,
                PASS,
                format!("{} has no enclosing type", self.elements.qualified_name(ty)),
            )
        })?;
        self.instance_of(outer)
    }

    fn instance_of(&mut self, ty: TypeElementId) -> Result<Expression, LoweringError> {
        let hops = self.exact_hops(ty)?;
        if hops.is_empty() {
            Ok(self.make(TypeRef::Class(ty), ExpressionKind::This(ty)))
        } else {
            Ok(self.path_expression(&hops))
        }
    }

    fn capture_args(&mut self, ty: TypeElementId) -> Result<Vec<Expression>, LoweringError> {
        let captured: Vec<VariableId> = self
            .registry
            .local_captures(ty)
            .iter()
            .map(|c| c.var)
            .collect();
        let mut args = Vec::with_capacity(captured.len());
        for var in captured {
            let value = match self.local_value(var)? {
                LocalValue::InScope => {
                    let ty = self.elements.variable(var).ty.clone();
                    self.make(ty, ExpressionKind::Variable(var))
                }
                LocalValue::Constant(literal) => {
                    let ty = self.elements.variable(var).ty.clone();
                    self.make(ty, ExpressionKind::Literal(literal))
                }
                LocalValue::Path(hops) => self.path_expression(&hops),
            };
            args.push(value);
        }
        Ok(args)
    }

    fn creation_args(&mut self, class: TypeElementId, qualified: bool) -> Result<ImplicitArgs, LoweringError> {
        let mut implicit = ImplicitArgs::default();
        if !qualified && self.takes_outer_instance(class) {
            implicit.outer = Some(Box::new(self.outer_instance_of(class)?));
        }
        implicit.captures = self.capture_args(class)?;
        implicit.resolved = true;
        Ok(implicit)
    }

    /// An anonymous class takes its own enclosing instance, and separately
    /// the one its superclass constructor needs, unless the creation is
    /// qualified (`outer.new Super() { .. }`)
    fn anonymous_creation_args(&mut self, class: TypeElementId, qualified: bool) -> Result<ImplicitArgs, LoweringError> {
        let mut implicit = ImplicitArgs::default();
        if self.registry.needs_outer_param(class) {
            implicit.outer = Some(Box::new(self.outer_instance_of(class)?));
        }
        if let Some(superclass) = self.elements.type_element(class).superclass {
            if !qualified && self.takes_outer_instance(superclass) {
                let super_outer = self.elements.enclosing_type(superclass).ok_or_else(|| {
                    LoweringError::internal(
                        error_codes::NO_ENCLOSING_INSTANCE,
                        PASS,
                        format!("{} has no enclosing type", self.elements.qualified_name(superclass)),
                    )
                })?;
                self.registry
                    .get_or_create_super_outer_param(self.elements, class, super_outer)?;
                implicit.super_outer = Some(Box::new(self.instance_of(super_outer)?));
            }
        }
        implicit.captures = self.capture_args(class)?;
        implicit.resolved = true;
        Ok(implicit)
    }

    // ----- path walks -----

    fn class_frames(&self) -> Vec<usize> {
        self.scopes.class_like_frames().collect()
    }

    fn broken_chain(&self, target: TypeElementId) -> LoweringError {
        LoweringError::internal(
            error_codes::BROKEN_NESTING_CHAIN,
            PASS,
            format!(
                "no enclosing scope provides {}",
                self.elements.qualified_name(target)
            ),
        )
    }

    /// Walk outward until a frame inherits `target`'s members
    fn inherited_hops(&mut self, target: TypeElementId) -> Result<Vec<Hop>, LoweringError> {
        let frames = self.class_frames();
        let mut hops = Vec::new();
        for (position, index) in frames.iter().enumerate() {
            let frame = self.scopes.frame(*index);
            if frame.inherited.contains(&target) {
                return Ok(hops);
            }
            let ty = frame.ty;
            self.check_next_frame(ty, frames.get(position + 1).copied())?;
            hops.push(self.outer_hop(ty, hops.is_empty())?);
        }
        Err(self.broken_chain(target))
    }

    /// Walk outward until a frame is exactly `target`
    fn exact_hops(&mut self, target: TypeElementId) -> Result<Vec<Hop>, LoweringError> {
        let frames = self.class_frames();
        let mut hops = Vec::new();
        for (position, index) in frames.iter().enumerate() {
            let ty = self.scopes.frame(*index).ty;
            if ty == target {
                return Ok(hops);
            }
            self.check_next_frame(ty, frames.get(position + 1).copied())?;
            hops.push(self.outer_hop(ty, hops.is_empty())?);
        }
        Err(self.broken_chain(target))
    }

    /// The frame an outer hop lands on must be the hop owner's enclosing type
    fn check_next_frame(&self, owner: TypeElementId, next: Option<usize>) -> Result<(), LoweringError> {
        let Some(next) = next else {
            return Ok(());
        };
        let landed = self.scopes.frame(next).ty;
        match self.elements.enclosing_type(owner) {
            Some(expected) if expected == landed => Ok(()),
            Some(expected) => Err(LoweringError::internal(
                error_codes::BROKEN_NESTING_CHAIN,
                PASS,
                format!(
                    "outer hop from {} expects {} but the enclosing scope is {}",
                    self.elements.qualified_name(owner),
                    self.elements.qualified_name(expected),
                    self.elements.qualified_name(landed)
                ),
            )),
            None => Err(self.broken_chain(owner)),
        }
    }

    /// Method frames are transparent: each class-like boundary passed
    /// through costs an outer hop, and the boundary just inside the
    /// declaring scope holds the captured value
    fn local_value(&mut self, var: VariableId) -> Result<LocalValue, LoweringError> {
        let in_top = self
            .scopes
            .top()
            .map(|top| top.declared.contains(&var))
            .unwrap_or(false);
        if in_top {
            return Ok(LocalValue::InScope);
        }
        if let Some(constant) = &self.elements.variable(var).constant {
            return Ok(LocalValue::Constant(constant.clone()));
        }

        let mut crossed = Vec::new();
        let mut found = false;
        for index in self.scopes.indices_innermost_first() {
            let frame = self.scopes.frame(index);
            if frame.declared.contains(&var) {
                found = true;
                break;
            }
            if frame.kind.is_class_like() {
                crossed.push(frame.ty);
            }
        }
        if !found {
            return Err(LoweringError::internal(
                error_codes::VARIABLE_NOT_IN_SCOPE,
                PASS,
                format!(
                    "'{}' is not declared in any enclosing scope",
                    self.elements.variable(var).name
                ),
            ));
        }
        let Some((&holder, passed)) = crossed.split_last() else {
            return Ok(LocalValue::InScope);
        };

        let mut hops = Vec::with_capacity(crossed.len());
        for owner in passed {
            hops.push(self.outer_hop(*owner, hops.is_empty())?);
        }
        hops.push(self.capture_hop(var, holder, hops.is_empty())?);
        Ok(LocalValue::Path(hops))
    }

    /// Only the first hop can read a constructor parameter, and only while
    /// the innermost frame is initializing
    fn outer_hop(&mut self, owner: TypeElementId, first: bool) -> Result<Hop, LoweringError> {
        if first && self.scopes.in_initializing_context() {
            let var = self.registry.get_or_create_outer_param(self.elements, owner)?;
            Ok(Hop {
                owner,
                var,
                via_param: true,
            })
        } else {
            let var = self.registry.get_or_create_outer_field(self.elements, owner)?;
            Ok(Hop {
                owner,
                var,
                via_param: false,
            })
        }
    }

    fn capture_hop(&mut self, captured: VariableId, owner: TypeElementId, first: bool) -> Result<Hop, LoweringError> {
        if first && self.scopes.in_initializing_context() {
            let var = self
                .registry
                .get_or_create_capture_param(self.elements, captured, owner)?;
            Ok(Hop {
                owner,
                var,
                via_param: true,
            })
        } else {
            let var = self
                .registry
                .get_or_create_capture_field(self.elements, captured, owner)?;
            Ok(Hop {
                owner,
                var,
                via_param: false,
            })
        }
    }

    // ----- expression construction -----

    fn make(&mut self, ty: TypeRef, kind: ExpressionKind) -> Expression {
        let id = self.ids.next();
        Expression::new(id, ty, kind)
    }

    fn field_access(&mut self, object: Expression, field: VariableId) -> Expression {
        let ty = self.elements.variable(field).ty.clone();
        self.make(
            ty,
            ExpressionKind::FieldAccess {
                object: Box::new(object),
                field,
            },
        )
    }

    /// `hops` must not be empty
    fn path_expression(&mut self, hops: &[Hop]) -> Expression {
        let mut iter = hops.iter();
        let mut expr = match iter.next() {
            Some(first) if first.via_param => {
                let ty = self.elements.variable(first.var).ty.clone();
                self.make(ty, ExpressionKind::Variable(first.var))
            }
            Some(first) => {
                let this = self.make(TypeRef::Class(first.owner), ExpressionKind::This(first.owner));
                self.field_access(this, first.var)
            }
            None => return Expression::placeholder(),
        };
        for hop in iter {
            expr = self.field_access(expr, hop.var);
        }
        expr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tast::builder::{block, expr_stmt, method_member, type_decl, UnitBuilder};

    fn run(unit: &mut TypedUnit) -> CaptureRegistry {
        let mut registry = CaptureRegistry::new();
        OuterReferenceResolver::new()
            .run_on_unit(unit, &mut registry)
            .unwrap();
        registry
    }

    fn method_body(decl: &TypeDeclaration, index: usize) -> &Block {
        match &decl.members[index] {
            Member::Method { body: Some(body), .. } => body,
            other => panic!("expected method body, got {:?}", other),
        }
    }

    #[test]
    fn test_inner_class_field_reference_gets_outer_hop() {
        let mut b = UnitBuilder::new("Outer");
        let outer = b.class("Outer");
        let count = b.field(outer, "count", TypeRef::INT);
        let inner = b.inner_class(outer, "Inner");
        let bump = b.method(inner, "bump", &[], TypeRef::Void);

        let read = b.var(count);
        let body = vec![expr_stmt(read)];
        let inner_decl = type_decl(inner, vec![method_member(bump, body)]);
        b.declare(type_decl(outer, vec![Member::Type(inner_decl)]));
        let mut unit = b.finish();

        let registry = run(&mut unit);
        let this0 = registry.outer_field(inner).unwrap();
        assert_eq!(unit.elements.variable(this0).name, "this$0");

        let Member::Type(inner_decl) = &unit.types[0].members[0] else {
            panic!("inner declaration moved");
        };
        let Statement::Expression(expr) = &method_body(inner_decl, 0).statements[0] else {
            panic!("statement kind changed");
        };
        match &expr.kind {
            ExpressionKind::FieldAccess { object, field } => {
                assert_eq!(*field, count);
                match &object.kind {
                    ExpressionKind::FieldAccess { object, field } => {
                        assert_eq!(*field, this0);
                        assert_eq!(object.kind, ExpressionKind::This(inner));
                    }
                    other => panic!("expected outer hop, got {:?}", other),
                }
            }
            other => panic!("expected field access, got {:?}", other),
        }
    }

    #[test]
    fn test_reference_to_own_field_is_untouched() {
        let mut b = UnitBuilder::new("Plain");
        let class = b.class("Plain");
        let value = b.field(class, "value", TypeRef::INT);
        let get = b.method(class, "get", &[], TypeRef::INT);
        let read = b.var(value);
        b.declare(type_decl(class, vec![method_member(get, vec![Statement::Return(Some(read))])]));
        let mut unit = b.finish();
        let before = unit.types.clone();

        let registry = run(&mut unit);
        assert_eq!(unit.types, before);
        assert!(registry.entry(class).is_none());
        assert!(registry.is_sealed());
    }

    #[test]
    fn test_captured_constant_is_inlined() {
        let mut b = UnitBuilder::new("Consts");
        let outer = b.class("Consts");
        let runnable = b.interface("Runnable");
        let run_m = b.method(outer, "run", &[], TypeRef::Void);
        let limit = b.constant_local(ElementRef::Method(run_m), "LIMIT", Literal::Int(10), TypeRef::INT);
        let lambda = b.lambda_type(ElementRef::Method(run_m), runnable);

        let read = b.var(limit);
        let body = block(vec![expr_stmt(read)]);
        let lambda_expr = b.lambda(lambda, vec![], body);
        let ten = b.int(10);
        let stmts = vec![
            Statement::VarDecl {
                var: limit,
                initializer: Some(ten),
            },
            expr_stmt(lambda_expr),
        ];
        b.declare(type_decl(outer, vec![method_member(run_m, stmts)]));
        let mut unit = b.finish();

        let registry = run(&mut unit);
        assert!(registry.local_captures(lambda).is_empty());
        let Statement::Expression(expr) = &method_body(&unit.types[0], 0).statements[1] else {
            panic!("statement kind changed");
        };
        let ExpressionKind::Lambda { body, implicit, .. } = &expr.kind else {
            panic!("lambda moved");
        };
        assert!(implicit.resolved);
        assert!(implicit.captures.is_empty());
        let Statement::Expression(inlined) = &body.statements[0] else {
            panic!("lambda body changed shape");
        };
        assert_eq!(inlined.kind, ExpressionKind::Literal(Literal::Int(10)));
    }

    #[test]
    fn test_unknown_local_is_internal_error() {
        let mut b = UnitBuilder::new("Broken");
        let class = b.class("Broken");
        let m = b.method(class, "m", &[], TypeRef::Void);
        let other = b.method(class, "other", &[], TypeRef::Void);
        let stray = b.local(ElementRef::Method(other), "stray", TypeRef::INT);
        let read = b.var(stray);
        b.declare(type_decl(class, vec![method_member(m, vec![expr_stmt(read)])]));
        let mut unit = b.finish();

        let mut registry = CaptureRegistry::new();
        let err = OuterReferenceResolver::new()
            .run_on_unit(&mut unit, &mut registry)
            .unwrap_err();
        assert_eq!(err.code(), error_codes::VARIABLE_NOT_IN_SCOPE);
    }
}
