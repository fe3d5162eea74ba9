//! Evaluation-order repair
//!
//! The source language evaluates operands strictly left to right; the target
//! leaves the order of most operands unspecified. For every sequence-point
//! root whose access ledger reports an unordered write, the hazardous
//! accesses are hoisted, in evaluation order, into `unseq$N` temporaries
//! declared right before the root's statement.
//!
//! Conditional operators are rebuilt as `if`/`else` so that an access in one
//! branch is never hoisted out of it, and `&&`/`||` chains become a boolean
//! accumulator whose later operands are gated by `if`. Loop conditions and
//! for-loop updates move into the loop body so their prelude runs on every
//! iteration.

use log::{debug, warn};

use super::access_ledger::{AccessKind, AccessLedger, NodeClass, PathStep, VariableAccess};
use super::capture::CaptureRegistry;
use super::{LoweringError, LoweringPass, PassResult};
use crate::error_codes;
use crate::tast::{
    AssignOp, Block, ElementRef, ElementTable, Expression, ExpressionId, ExpressionKind,
    IdGenerator, Literal, LogicalOp, Member, Statement, TypeDeclaration, TypeElementId, TypeRef,
    TypedUnit, UnaryOp, VariableElement, VariableId, VariableKind,
};

const PASS: &str = "unsequenced-rewriter";

#[derive(Debug, Default)]
pub struct UnsequencedRewriter;

impl UnsequencedRewriter {
    pub fn new() -> Self {
        Self
    }
}

impl LoweringPass for UnsequencedRewriter {
    fn name(&self) -> &'static str {
        PASS
    }

    fn run_on_unit(
        &mut self,
        unit: &mut TypedUnit,
        _registry: &mut CaptureRegistry,
    ) -> Result<PassResult, LoweringError> {
        let TypedUnit {
            elements,
            types,
            functions,
            expression_ids,
            ..
        } = unit;

        let mut repair = Repair {
            elements,
            ids: expression_ids,
            owners: Vec::new(),
            next_temp: 0,
            result: PassResult::unchanged(),
        };
        for decl in types.iter_mut() {
            repair.process_type_declaration(decl)?;
        }
        for function in functions.iter_mut() {
            repair.owners.push(ElementRef::Method(function.function));
            repair.process_block(&mut function.body)?;
            repair.owners.pop();
        }
        Ok(repair.result)
    }
}

/// Find `id` below any of `roots`
fn find<'r>(roots: &'r mut [&mut Expression], id: ExpressionId) -> Result<&'r mut Expression, LoweringError> {
    for root in roots.iter_mut() {
        if let Some(found) = root.find_mut(id) {
            return Ok(found);
        }
    }
    Err(LoweringError::internal(
        error_codes::EXTRACTION_TARGET_MISSING,
        PASS,
        format!("expression {} is not part of the root", id),
    ))
}

/// Innermost-scope-first search for the outermost `?:`, `&&` or `||`
/// enclosing an access, starting at `scope` inclusive
fn top_conditional(access: &VariableAccess, scope: Option<ExpressionId>) -> Option<PathStep> {
    let steps = match scope {
        None => &access.path[..],
        Some(scope) => match access.path.iter().position(|step| step.node == scope) {
            Some(start) => &access.path[start..],
            None => &[],
        },
    };
    steps
        .iter()
        .find(|step| matches!(step.class, NodeClass::Conditional | NodeClass::ShortCircuit))
        .copied()
}

/// Whether a `continue` in `stmt` resumes the loop `stmt` belongs to
fn continues_loop(stmt: &Statement, label: Option<&str>, nested: bool) -> bool {
    match stmt {
        Statement::Continue(None) => !nested,
        Statement::Continue(Some(target)) => Some(target.as_str()) == label,
        Statement::Block(block) => block.statements.iter().any(|s| continues_loop(s, label, nested)),
        Statement::If {
            then_branch,
            else_branch,
            ..
        } => {
            continues_loop(then_branch, label, nested)
                || else_branch
                    .as_deref()
                    .map(|s| continues_loop(s, label, nested))
                    .unwrap_or(false)
        }
        Statement::While { body, .. }
        | Statement::DoWhile { body, .. }
        | Statement::For { body, .. }
        | Statement::ForEach { body, .. } => continues_loop(body, label, true),
        Statement::Labeled { body, .. } => continues_loop(body, label, nested),
        Statement::Switch { cases, .. } => cases
            .iter()
            .flat_map(|case| case.body.iter())
            .any(|s| continues_loop(s, label, nested)),
        Statement::Try {
            body,
            catches,
            finally,
        } => {
            body.statements.iter().any(|s| continues_loop(s, label, nested))
                || catches
                    .iter()
                    .flat_map(|c| c.body.statements.iter())
                    .any(|s| continues_loop(s, label, nested))
                || finally
                    .iter()
                    .flat_map(|f| f.statements.iter())
                    .any(|s| continues_loop(s, label, nested))
        }
        Statement::Synchronized { body, .. } => {
            body.statements.iter().any(|s| continues_loop(s, label, nested))
        }
        Statement::Expression(_)
        | Statement::VarDecl { .. }
        | Statement::LocalClass(_)
        | Statement::Return(_)
        | Statement::Throw(_)
        | Statement::Break(_)
        | Statement::Assert { .. }
        | Statement::ConstructorCall(_)
        | Statement::Empty => false,
    }
}

fn into_statement(mut statements: Vec<Statement>) -> Statement {
    if statements.len() == 1 {
        if let Some(single) = statements.pop() {
            return single;
        }
    }
    Statement::Block(Block::new(statements))
}

struct Repair<'a> {
    elements: &'a mut ElementTable,
    ids: &'a mut IdGenerator<ExpressionId>,
    /// Element new temporaries are declared in
    owners: Vec<ElementRef>,
    next_temp: usize,
    result: PassResult,
}

impl Repair<'_> {
    // ----- declarations -----

    fn process_type_declaration(&mut self, decl: &mut TypeDeclaration) -> Result<(), LoweringError> {
        self.owners.push(ElementRef::Type(decl.element));
        for member in &mut decl.members {
            match member {
                Member::Field { var, initializer } => {
                    if let Some(init) = initializer {
                        self.process_nested_bodies(init)?;
                        if !AccessLedger::collect([&*init]).unsequenced().is_empty() {
                            debug!(
                                "{}: initializer of '{}' has unsequenced accesses and no statement to split into",
                                PASS,
                                self.elements.variable(*var).name
                            );
                        }
                    }
                }
                Member::Method { method, body } => {
                    if let Some(body) = body {
                        self.owners.push(ElementRef::Method(*method));
                        self.process_block(body)?;
                        self.owners.pop();
                    }
                }
                Member::Initializer { body, .. } => self.process_block(body)?,
                Member::Type(nested) => self.process_type_declaration(nested)?,
            }
        }
        self.owners.pop();
        Ok(())
    }

    /// Lambda and anonymous class bodies inside `expr` have statements of
    /// their own
    fn process_nested_bodies(&mut self, expr: &mut Expression) -> Result<(), LoweringError> {
        for child in expr.children_mut() {
            self.process_nested_bodies(child)?;
        }
        match &mut expr.kind {
            ExpressionKind::Lambda { element, body, .. } => {
                self.owners.push(ElementRef::Type(*element));
                self.process_block(body)?;
                self.owners.pop();
            }
            ExpressionKind::New {
                body: Some(decl), ..
            } => self.process_type_declaration(decl)?,
            _ => {}
        }
        Ok(())
    }

    // ----- statements -----

    fn process_block(&mut self, block: &mut Block) -> Result<(), LoweringError> {
        let statements = std::mem::take(&mut block.statements);
        let mut out = Vec::with_capacity(statements.len());
        for stmt in statements {
            self.process_statement(stmt, &mut out, None)?;
        }
        block.statements = out;
        Ok(())
    }

    fn process_statements(&mut self, statements: &mut Vec<Statement>) -> Result<(), LoweringError> {
        let mut block = Block::new(std::mem::take(statements));
        self.process_block(&mut block)?;
        *statements = block.statements;
        Ok(())
    }

    /// Process a statement in a single-statement position, wrapping it in a
    /// block when it gains a prelude
    fn process_nested(&mut self, stmt: &mut Statement) -> Result<(), LoweringError> {
        let inner = std::mem::replace(stmt, Statement::Empty);
        let mut out = Vec::new();
        self.process_statement(inner, &mut out, None)?;
        *stmt = into_statement(out);
        Ok(())
    }

    /// Push `stmt`, preceded by any prelude its roots need, onto `out`
    fn process_statement(
        &mut self,
        mut stmt: Statement,
        out: &mut Vec<Statement>,
        label: Option<&str>,
    ) -> Result<(), LoweringError> {
        // init statements hoisted in front of a `for`, scoped by a block
        let mut scoped_init = Vec::new();
        let mut relabeled = None;
        let prelude = match &mut stmt {
            Statement::Expression(expr) | Statement::Throw(expr) => self.repair_root(expr)?,
            Statement::VarDecl {
                initializer: Some(init),
                ..
            } => self.repair_root(init)?,
            Statement::VarDecl {
                initializer: None, ..
            } => Vec::new(),
            Statement::Return(Some(value)) => self.repair_root(value)?,
            Statement::Return(None)
            | Statement::Break(_)
            | Statement::Continue(_)
            | Statement::Empty => Vec::new(),
            Statement::LocalClass(decl) => {
                self.process_type_declaration(decl)?;
                Vec::new()
            }
            Statement::Block(block) => {
                self.process_block(block)?;
                Vec::new()
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.process_nested(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.process_nested(else_branch)?;
                }
                self.repair_root(condition)?
            }
            Statement::While { condition, body } => {
                self.process_nested(body)?;
                self.process_nested_bodies(condition)?;
                let prelude = self.repair_expressions(&mut [&mut *condition])?;
                if !prelude.is_empty() {
                    self.move_condition_into_body(condition, body, prelude);
                    self.result.record("loop-conditions");
                }
                Vec::new()
            }
            Statement::DoWhile { body, condition } => {
                self.process_nested(body)?;
                self.process_nested_bodies(condition)?;
                if self.has_hazards(&[&*condition]) {
                    if continues_loop(body, label, false) {
                        warn!(
                            "{}: do-while condition has unsequenced accesses but a continue targets the loop; left unchanged",
                            PASS
                        );
                        self.result.record("loops-skipped");
                    } else {
                        let prelude = self.repair_expressions(&mut [&mut *condition])?;
                        self.append_condition_to_body(condition, body, prelude);
                        self.result.record("loop-conditions");
                    }
                }
                Vec::new()
            }
            Statement::For {
                init,
                condition,
                update,
                body,
            } => {
                self.process_nested(body)?;
                let mut hoisted = Vec::new();
                let mut split = false;
                for stmt in std::mem::take(init) {
                    let before = hoisted.len();
                    self.process_statement(stmt, &mut hoisted, None)?;
                    split |= hoisted.len() > before + 1;
                }
                if split {
                    scoped_init = hoisted;
                    self.result.record("loop-inits");
                } else {
                    *init = hoisted;
                }

                let hazardous_update = update
                    .iter()
                    .any(|expr| !AccessLedger::collect([expr]).unsequenced().is_empty());
                if hazardous_update {
                    if continues_loop(body, label, false) {
                        warn!(
                            "{}: for-loop update has unsequenced accesses but a continue targets the loop; left unchanged",
                            PASS
                        );
                        self.result.record("loops-skipped");
                    } else {
                        self.move_updates_into_body(update, body)?;
                        self.result.record("loop-updates");
                    }
                } else {
                    for expr in update.iter_mut() {
                        self.process_nested_bodies(expr)?;
                    }
                }

                if let Some(cond) = condition {
                    self.process_nested_bodies(cond)?;
                    let cond_prelude = self.repair_expressions(&mut [&mut *cond])?;
                    if !cond_prelude.is_empty() {
                        let mut moved = std::mem::replace(cond, Expression::placeholder());
                        self.move_condition_into_body(&mut moved, body, cond_prelude);
                        *condition = None;
                        self.result.record("loop-conditions");
                    }
                }
                Vec::new()
            }
            Statement::ForEach { iterable, body, .. } => {
                self.process_nested(body)?;
                self.repair_root(iterable)?
            }
            Statement::Switch {
                discriminant,
                cases,
            } => {
                for case in cases.iter_mut() {
                    self.process_statements(&mut case.body)?;
                }
                self.repair_root(discriminant)?
            }
            Statement::Labeled { label, body } => {
                let inner = std::mem::replace(body.as_mut(), Statement::Empty);
                let is_for = matches!(inner, Statement::For { .. });
                let mut processed = Vec::new();
                self.process_statement(inner, &mut processed, Some(label.as_str()))?;
                match processed.pop() {
                    // the label stays on the loop, inside the block holding its init
                    Some(Statement::Block(mut scope)) if is_for => {
                        let loop_stmt = scope.statements.pop().unwrap_or(Statement::Empty);
                        scope.statements.push(Statement::Labeled {
                            label: label.clone(),
                            body: Box::new(loop_stmt),
                        });
                        relabeled = Some(Statement::Block(scope));
                    }
                    loop_stmt => **body = loop_stmt.unwrap_or(Statement::Empty),
                }
                processed
            }
            Statement::Try {
                body,
                catches,
                finally,
            } => {
                self.process_block(body)?;
                for catch in catches.iter_mut() {
                    self.process_block(&mut catch.body)?;
                }
                if let Some(finally) = finally {
                    self.process_block(finally)?;
                }
                Vec::new()
            }
            Statement::Synchronized { lock, body } => {
                self.process_block(body)?;
                self.repair_root(lock)?
            }
            Statement::Assert { condition, message } => {
                self.process_nested_bodies(condition)?;
                let mut roots: Vec<&Expression> = vec![&*condition];
                if let Some(message) = message {
                    self.process_nested_bodies(message)?;
                    roots.push(&*message);
                }
                if self.has_hazards(&roots) {
                    debug!("{}: assert with unsequenced accesses left unchanged", PASS);
                }
                Vec::new()
            }
            Statement::ConstructorCall(call) => {
                let mut roots: Vec<&mut Expression> = Vec::new();
                if let Some(qualifier) = call.qualifier.as_deref_mut() {
                    roots.push(qualifier);
                }
                if let Some(outer) = call.implicit.outer.as_deref_mut() {
                    roots.push(outer);
                }
                if let Some(super_outer) = call.implicit.super_outer.as_deref_mut() {
                    roots.push(super_outer);
                }
                roots.extend(call.implicit.captures.iter_mut());
                roots.extend(call.args.iter_mut());
                for root in roots.iter_mut() {
                    self.process_nested_bodies(root)?;
                }
                self.repair_expressions(&mut roots)?
            }
        };
        if let Some(block) = relabeled {
            stmt = block;
        }
        out.extend(prelude);
        if scoped_init.is_empty() {
            out.push(stmt);
        } else {
            scoped_init.push(stmt);
            out.push(Statement::Block(Block::new(scoped_init)));
        }
        Ok(())
    }

    /// `while (c)` becomes `while (true) { prelude; if (!c) break; body }`
    fn move_condition_into_body(&mut self, condition: &mut Expression, body: &mut Statement, prelude: Vec<Statement>) {
        let test = std::mem::replace(condition, self.make(TypeRef::BOOLEAN, ExpressionKind::Literal(Literal::Boolean(true))));
        let negated = self.not(test);
        let mut statements = prelude;
        statements.push(Statement::If {
            condition: negated,
            then_branch: Box::new(Statement::Break(None)),
            else_branch: None,
        });
        statements.push(std::mem::replace(body, Statement::Empty));
        *body = Statement::Block(Block::new(statements));
    }

    /// `do body while (c)` becomes `do { body; prelude; if (!c) break; } while (true)`
    fn append_condition_to_body(&mut self, condition: &mut Expression, body: &mut Statement, prelude: Vec<Statement>) {
        let test = std::mem::replace(condition, self.make(TypeRef::BOOLEAN, ExpressionKind::Literal(Literal::Boolean(true))));
        let negated = self.not(test);
        let mut statements = vec![std::mem::replace(body, Statement::Empty)];
        statements.extend(prelude);
        statements.push(Statement::If {
            condition: negated,
            then_branch: Box::new(Statement::Break(None)),
            else_branch: None,
        });
        *body = Statement::Block(Block::new(statements));
    }

    fn move_updates_into_body(&mut self, update: &mut Vec<Expression>, body: &mut Statement) -> Result<(), LoweringError> {
        let mut statements = vec![std::mem::replace(body, Statement::Empty)];
        for expr in std::mem::take(update) {
            self.process_statement(Statement::Expression(expr), &mut statements, None)?;
        }
        *body = Statement::Block(Block::new(statements));
        Ok(())
    }

    // ----- roots -----

    fn has_hazards(&self, roots: &[&Expression]) -> bool {
        !AccessLedger::collect(roots.iter().copied()).unsequenced().is_empty()
    }

    fn repair_root(&mut self, root: &mut Expression) -> Result<Vec<Statement>, LoweringError> {
        self.process_nested_bodies(root)?;
        self.repair_expressions(&mut [root])
    }

    /// Split the hazardous accesses of one sequence-point root into a
    /// prelude; the roots keep whatever stays in place
    fn repair_expressions(&mut self, roots: &mut [&mut Expression]) -> Result<Vec<Statement>, LoweringError> {
        let hazards = AccessLedger::collect(roots.iter().map(|root| &**root)).unsequenced();
        if hazards.is_empty() {
            return Ok(Vec::new());
        }
        let mut prelude = Vec::new();
        self.extract_ordered(&mut prelude, roots, None, &hazards, true)?;
        self.result.record("roots-split");
        Ok(prelude)
    }

    // ----- extraction -----

    fn extract_ordered(
        &mut self,
        stmts: &mut Vec<Statement>,
        roots: &mut [&mut Expression],
        scope: Option<ExpressionId>,
        accesses: &[VariableAccess],
        leave_last: bool,
    ) -> Result<(), LoweringError> {
        let mut index = 0;
        while index < accesses.len() {
            let access = &accesses[index];
            if let Some(conditional) = top_conditional(access, scope) {
                let end = accesses[index..]
                    .iter()
                    .position(|other| other.step_through(conditional.node).is_none())
                    .map(|offset| index + offset)
                    .unwrap_or(accesses.len());
                let group = &accesses[index..end];
                match conditional.class {
                    NodeClass::Conditional => self.extract_conditional(stmts, roots, conditional.node, group)?,
                    NodeClass::ShortCircuit => self.extract_short_circuit(stmts, roots, conditional.node, group)?,
                    NodeClass::Assignment | NodeClass::Other => {
                        return Err(LoweringError::internal(
                            error_codes::UNEXPECTED_CONDITIONAL,
                            PASS,
                            format!("expression {} is not a conditional", conditional.node),
                        ))
                    }
                }
                index = end;
                continue;
            }

            if leave_last && index + 1 == accesses.len() {
                break;
            }
            match access.kind {
                AccessKind::CompoundRead => self.extract_compound_read(stmts, roots, access)?,
                AccessKind::Read | AccessKind::Write => self.extract_access(stmts, roots, access.node)?,
            }
            index += 1;
        }
        Ok(())
    }

    /// `T unseq$N = <node>;` with the node replaced by the temporary
    fn extract_access(
        &mut self,
        stmts: &mut Vec<Statement>,
        roots: &mut [&mut Expression],
        node: ExpressionId,
    ) -> Result<(), LoweringError> {
        let target = find(roots, node)?;
        let ty = target.ty.clone();
        let temp = self.temp(ty.clone());
        let replacement = self.make(ty, ExpressionKind::Variable(temp));
        let original = std::mem::replace(target, replacement);
        stmts.push(Statement::VarDecl {
            var: temp,
            initializer: Some(original),
        });
        Ok(())
    }

    /// `x op= v` reads `x` before evaluating `v`: hoist the read and
    /// rewrite to `x = (T) (unseq$N op v)`
    fn extract_compound_read(
        &mut self,
        stmts: &mut Vec<Statement>,
        roots: &mut [&mut Expression],
        access: &VariableAccess,
    ) -> Result<(), LoweringError> {
        let Some(assignment) = access.path.last().filter(|step| step.class == NodeClass::Assignment) else {
            return Err(LoweringError::internal(
                error_codes::EXTRACTION_TARGET_MISSING,
                PASS,
                format!("compound read {} has no enclosing assignment", access.node),
            ));
        };
        let node = find(roots, assignment.node)?;
        let ExpressionKind::Assignment { op, target, value } = &mut node.kind else {
            return Err(LoweringError::internal(
                error_codes::EXTRACTION_TARGET_MISSING,
                PASS,
                format!("expression {} is no longer an assignment", assignment.node),
            ));
        };
        let Some(binary) = op.binary_op() else {
            return Ok(());
        };

        let ty = target.ty.clone();
        let temp = self.temp(ty.clone());
        let mut read = (**target).clone();
        self.refresh_ids(&mut read);
        stmts.push(Statement::VarDecl {
            var: temp,
            initializer: Some(read),
        });

        let narrow = ty.as_primitive().map(|p| p.is_narrower_than_int()).unwrap_or(false);
        let left = self.make(ty.clone(), ExpressionKind::Variable(temp));
        let right = std::mem::replace(value.as_mut(), Expression::placeholder());
        let mut combined = self.make(
            if narrow { TypeRef::INT } else { ty.clone() },
            ExpressionKind::Binary {
                op: binary,
                left: Box::new(left),
                right: Box::new(right),
            },
        );
        if narrow {
            combined = self.make(
                ty.clone(),
                ExpressionKind::Cast {
                    target: ty,
                    operand: Box::new(combined),
                },
            );
        }
        **value = combined;
        *op = AssignOp::Assign;
        Ok(())
    }

    fn extract_conditional(
        &mut self,
        stmts: &mut Vec<Statement>,
        roots: &mut [&mut Expression],
        node: ExpressionId,
        group: &[VariableAccess],
    ) -> Result<(), LoweringError> {
        let slot_accesses = |slot: usize| -> Vec<VariableAccess> {
            group
                .iter()
                .filter(|access| access.step_through(node).map(|s| s.slot) == Some(slot))
                .cloned()
                .collect()
        };
        let (in_condition, in_then, in_else) = (slot_accesses(0), slot_accesses(1), slot_accesses(2));

        let conditional = find(roots, node)?;
        let result_ty = conditional.ty.clone();
        let ExpressionKind::Conditional {
            condition,
            then_expr,
            else_expr,
        } = &mut conditional.kind
        else {
            return Err(LoweringError::internal(
                error_codes::UNEXPECTED_CONDITIONAL,
                PASS,
                format!("expression {} is not a conditional", node),
            ));
        };

        if in_then.is_empty() && in_else.is_empty() {
            let scope = condition.id;
            return self.extract_ordered(stmts, &mut [condition.as_mut()], Some(scope), &in_condition, false);
        }

        let result = self.temp(result_ty.clone());
        stmts.push(Statement::VarDecl {
            var: result,
            initializer: None,
        });

        let mut condition = std::mem::replace(condition.as_mut(), Expression::placeholder());
        let mut then_expr = std::mem::replace(then_expr.as_mut(), Expression::placeholder());
        let mut else_expr = std::mem::replace(else_expr.as_mut(), Expression::placeholder());

        let scope = condition.id;
        self.extract_ordered(stmts, &mut [&mut condition], Some(scope), &in_condition, true)?;

        let mut then_stmts = Vec::new();
        let scope = then_expr.id;
        self.extract_ordered(&mut then_stmts, &mut [&mut then_expr], Some(scope), &in_then, true)?;
        then_stmts.push(self.assign(result, then_expr));

        let mut else_stmts = Vec::new();
        let scope = else_expr.id;
        self.extract_ordered(&mut else_stmts, &mut [&mut else_expr], Some(scope), &in_else, true)?;
        else_stmts.push(self.assign(result, else_expr));

        stmts.push(Statement::If {
            condition,
            then_branch: Box::new(Statement::Block(Block::new(then_stmts))),
            else_branch: Some(Box::new(Statement::Block(Block::new(else_stmts)))),
        });
        *conditional = self.make(result_ty, ExpressionKind::Variable(result));
        Ok(())
    }

    fn extract_short_circuit(
        &mut self,
        stmts: &mut Vec<Statement>,
        roots: &mut [&mut Expression],
        node: ExpressionId,
        group: &[VariableAccess],
    ) -> Result<(), LoweringError> {
        let chain = find(roots, node)?;
        let ExpressionKind::ShortCircuit { op, operands } = &mut chain.kind else {
            return Err(LoweringError::internal(
                error_codes::UNEXPECTED_CONDITIONAL,
                PASS,
                format!("expression {} is not a short-circuit chain", node),
            ));
        };
        let op = *op;
        let mut operands = std::mem::take(operands);
        let slot_of = |access: &VariableAccess| access.step_through(node).map(|s| s.slot);

        // operands ahead of the first hazardous one keep their short-circuit form
        let first = group
            .iter()
            .filter_map(slot_of)
            .min()
            .unwrap_or(0)
            .min(operands.len().saturating_sub(1));
        let rest = operands.split_off(first.max(1).min(operands.len()));
        let head = if operands.len() == 1 {
            operands.remove(0)
        } else {
            self.make(TypeRef::BOOLEAN, ExpressionKind::ShortCircuit { op, operands })
        };

        let flag = self.temp(TypeRef::BOOLEAN);
        stmts.push(Statement::VarDecl {
            var: flag,
            initializer: None,
        });

        let start = first.max(1) - 1;
        let segments = std::iter::once(head).chain(rest);
        for (slot, mut operand) in (start..).zip(segments) {
            let accesses: Vec<VariableAccess> = group
                .iter()
                .filter(|access| slot_of(access) == Some(slot))
                .cloned()
                .collect();
            let scope = operand.id;
            if slot == start {
                self.extract_ordered(stmts, &mut [&mut operand], Some(scope), &accesses, true)?;
                stmts.push(self.assign(flag, operand));
                continue;
            }
            let mut segment = Vec::new();
            self.extract_ordered(&mut segment, &mut [&mut operand], Some(scope), &accesses, true)?;
            segment.push(self.assign(flag, operand));
            let current = self.make(TypeRef::BOOLEAN, ExpressionKind::Variable(flag));
            let gate = match op {
                LogicalOp::And => current,
                LogicalOp::Or => self.not(current),
            };
            stmts.push(Statement::If {
                condition: gate,
                then_branch: Box::new(Statement::Block(Block::new(segment))),
                else_branch: None,
            });
        }

        *chain = self.make(TypeRef::BOOLEAN, ExpressionKind::Variable(flag));
        Ok(())
    }

    // ----- construction -----

    fn make(&mut self, ty: TypeRef, kind: ExpressionKind) -> Expression {
        Expression::new(self.ids.next(), ty, kind)
    }

    fn not(&mut self, operand: Expression) -> Expression {
        self.make(
            TypeRef::BOOLEAN,
            ExpressionKind::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            },
        )
    }

    fn assign(&mut self, var: VariableId, value: Expression) -> Statement {
        let ty = self.elements.variable(var).ty.clone();
        let target = self.make(ty.clone(), ExpressionKind::Variable(var));
        Statement::Expression(self.make(
            ty,
            ExpressionKind::Assignment {
                op: AssignOp::Assign,
                target: Box::new(target),
                value: Box::new(value),
            },
        ))
    }

    fn refresh_ids(&mut self, expr: &mut Expression) {
        expr.id = self.ids.next();
        for child in expr.children_mut() {
            self.refresh_ids(child);
        }
    }

    fn temp(&mut self, ty: TypeRef) -> VariableId {
        let name = format!("unseq${}", self.next_temp);
        self.next_temp += 1;
        let declaring = self
            .owners
            .last()
            .copied()
            .unwrap_or(ElementRef::Type(TypeElementId::invalid()));
        self.elements.add_variable(VariableElement {
            name,
            kind: VariableKind::Local,
            declaring,
            ty,
            is_static: false,
            is_final: false,
            constant: None,
            synthetic: true,
        })
    }
}
