//! Traversal helpers shared by the lowering passes.
//!
//! `children`/`children_mut` list the sub-expressions evaluated as part of an
//! expression, in source evaluation order. They do not enter lambda bodies or
//! anonymous class bodies, which run in their own frames; the implicit
//! arguments of a creation site are included since they are evaluated at the
//! site.

use super::node::{Block, Expression, ExpressionKind, ImplicitArgs, Member, Statement, TypeDeclaration};
use super::id_types::ExpressionId;
use smallvec::SmallVec;

pub type Children<'a> = SmallVec<[&'a Expression; 4]>;
pub type ChildrenMut<'a> = SmallVec<[&'a mut Expression; 4]>;

fn implicit_children<'a>(implicit: &'a ImplicitArgs, out: &mut Children<'a>) {
    if let Some(outer) = &implicit.outer {
        out.push(outer);
    }
    if let Some(super_outer) = &implicit.super_outer {
        out.push(super_outer);
    }
    out.extend(implicit.captures.iter());
}

fn implicit_children_mut<'a>(implicit: &'a mut ImplicitArgs, out: &mut ChildrenMut<'a>) {
    if let Some(outer) = &mut implicit.outer {
        out.push(outer);
    }
    if let Some(super_outer) = &mut implicit.super_outer {
        out.push(super_outer);
    }
    out.extend(implicit.captures.iter_mut());
}

impl Expression {
    pub fn children(&self) -> Children<'_> {
        let mut out = Children::new();
        match &self.kind {
            ExpressionKind::Literal(_) | ExpressionKind::Variable(_) | ExpressionKind::This(_) => {}
            ExpressionKind::FieldAccess { object, .. } => out.push(object),
            ExpressionKind::ArrayAccess { array, index } => {
                out.push(array);
                out.push(index);
            }
            ExpressionKind::MethodCall { receiver, args, .. }
            | ExpressionKind::SuperMethodCall { receiver, args, .. } => {
                if let Some(receiver) = receiver {
                    out.push(receiver);
                }
                out.extend(args.iter());
            }
            ExpressionKind::FunctionCall { args, .. } => out.extend(args.iter()),
            ExpressionKind::New {
                qualifier,
                args,
                implicit,
                ..
            } => {
                if let Some(qualifier) = qualifier {
                    out.push(qualifier);
                }
                implicit_children(implicit, &mut out);
                out.extend(args.iter());
            }
            ExpressionKind::Lambda { implicit, .. } => implicit_children(implicit, &mut out),
            ExpressionKind::Assignment { target, value, .. } => {
                out.push(target);
                out.push(value);
            }
            ExpressionKind::Unary { operand, .. }
            | ExpressionKind::Cast { operand, .. }
            | ExpressionKind::InstanceOf { operand, .. } => out.push(operand),
            ExpressionKind::Binary { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            ExpressionKind::ShortCircuit { operands, .. } => out.extend(operands.iter()),
            ExpressionKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                out.push(condition);
                out.push(then_expr);
                out.push(else_expr);
            }
            ExpressionKind::ArrayLiteral { elements } => out.extend(elements.iter()),
        }
        out
    }

    pub fn children_mut(&mut self) -> ChildrenMut<'_> {
        let mut out = ChildrenMut::new();
        match &mut self.kind {
            ExpressionKind::Literal(_) | ExpressionKind::Variable(_) | ExpressionKind::This(_) => {}
            ExpressionKind::FieldAccess { object, .. } => out.push(object),
            ExpressionKind::ArrayAccess { array, index } => {
                out.push(array);
                out.push(index);
            }
            ExpressionKind::MethodCall { receiver, args, .. }
            | ExpressionKind::SuperMethodCall { receiver, args, .. } => {
                if let Some(receiver) = receiver {
                    out.push(receiver);
                }
                out.extend(args.iter_mut());
            }
            ExpressionKind::FunctionCall { args, .. } => out.extend(args.iter_mut()),
            ExpressionKind::New {
                qualifier,
                args,
                implicit,
                ..
            } => {
                if let Some(qualifier) = qualifier {
                    out.push(qualifier);
                }
                implicit_children_mut(implicit, &mut out);
                out.extend(args.iter_mut());
            }
            ExpressionKind::Lambda { implicit, .. } => implicit_children_mut(implicit, &mut out),
            ExpressionKind::Assignment { target, value, .. } => {
                out.push(target);
                out.push(value);
            }
            ExpressionKind::Unary { operand, .. }
            | ExpressionKind::Cast { operand, .. }
            | ExpressionKind::InstanceOf { operand, .. } => out.push(operand),
            ExpressionKind::Binary { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            ExpressionKind::ShortCircuit { operands, .. } => out.extend(operands.iter_mut()),
            ExpressionKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                out.push(condition);
                out.push(then_expr);
                out.push(else_expr);
            }
            ExpressionKind::ArrayLiteral { elements } => out.extend(elements.iter_mut()),
        }
        out
    }

    /// Locate a node by ID within this subtree, not entering nested bodies
    pub fn find_mut(&mut self, id: ExpressionId) -> Option<&mut Expression> {
        if self.id == id {
            return Some(self);
        }
        self.children_mut()
            .into_iter()
            .find_map(|child| child.find_mut(id))
    }

    pub fn contains(&self, id: ExpressionId) -> bool {
        self.id == id || self.children().into_iter().any(|child| child.contains(id))
    }
}

/// Mutable tree walker with overridable hooks.
///
/// The `walk_*` functions perform the default descent, including lambda and
/// anonymous class bodies; override a hook and call back into `walk_*` to
/// keep descending.
pub trait MutVisitor {
    fn visit_type_declaration(&mut self, decl: &mut TypeDeclaration) {
        walk_type_declaration(self, decl);
    }

    fn visit_member(&mut self, member: &mut Member) {
        walk_member(self, member);
    }

    fn visit_block(&mut self, block: &mut Block) {
        walk_block(self, block);
    }

    fn visit_statement(&mut self, stmt: &mut Statement) {
        walk_statement(self, stmt);
    }

    fn visit_expression(&mut self, expr: &mut Expression) {
        walk_expression(self, expr);
    }
}

pub fn walk_type_declaration<V: MutVisitor + ?Sized>(visitor: &mut V, decl: &mut TypeDeclaration) {
    for member in &mut decl.members {
        visitor.visit_member(member);
    }
}

pub fn walk_member<V: MutVisitor + ?Sized>(visitor: &mut V, member: &mut Member) {
    match member {
        Member::Field { initializer, .. } => {
            if let Some(init) = initializer {
                visitor.visit_expression(init);
            }
        }
        Member::Method { body, .. } => {
            if let Some(body) = body {
                visitor.visit_block(body);
            }
        }
        Member::Initializer { body, .. } => visitor.visit_block(body),
        Member::Type(decl) => visitor.visit_type_declaration(decl),
    }
}

pub fn walk_block<V: MutVisitor + ?Sized>(visitor: &mut V, block: &mut Block) {
    for stmt in &mut block.statements {
        visitor.visit_statement(stmt);
    }
}

pub fn walk_statement<V: MutVisitor + ?Sized>(visitor: &mut V, stmt: &mut Statement) {
    match stmt {
        Statement::Expression(expr) | Statement::Throw(expr) => visitor.visit_expression(expr),
        Statement::VarDecl { initializer, .. } => {
            if let Some(init) = initializer {
                visitor.visit_expression(init);
            }
        }
        Statement::LocalClass(decl) => visitor.visit_type_declaration(decl),
        Statement::Block(block) => visitor.visit_block(block),
        Statement::If {
            condition,
            then_branch,
            else_branch,
        } => {
            visitor.visit_expression(condition);
            visitor.visit_statement(then_branch);
            if let Some(else_branch) = else_branch {
                visitor.visit_statement(else_branch);
            }
        }
        Statement::While { condition, body } => {
            visitor.visit_expression(condition);
            visitor.visit_statement(body);
        }
        Statement::DoWhile { body, condition } => {
            visitor.visit_statement(body);
            visitor.visit_expression(condition);
        }
        Statement::For {
            init,
            condition,
            update,
            body,
        } => {
            for stmt in init {
                visitor.visit_statement(stmt);
            }
            if let Some(condition) = condition {
                visitor.visit_expression(condition);
            }
            for expr in update {
                visitor.visit_expression(expr);
            }
            visitor.visit_statement(body);
        }
        Statement::ForEach { iterable, body, .. } => {
            visitor.visit_expression(iterable);
            visitor.visit_statement(body);
        }
        Statement::Switch {
            discriminant,
            cases,
        } => {
            visitor.visit_expression(discriminant);
            for case in cases {
                for label in &mut case.labels {
                    visitor.visit_expression(label);
                }
                for stmt in &mut case.body {
                    visitor.visit_statement(stmt);
                }
            }
        }
        Statement::Return(value) => {
            if let Some(value) = value {
                visitor.visit_expression(value);
            }
        }
        Statement::Break(_) | Statement::Continue(_) | Statement::Empty => {}
        Statement::Labeled { body, .. } => visitor.visit_statement(body),
        Statement::Try {
            body,
            catches,
            finally,
        } => {
            visitor.visit_block(body);
            for catch in catches {
                visitor.visit_block(&mut catch.body);
            }
            if let Some(finally) = finally {
                visitor.visit_block(finally);
            }
        }
        Statement::Synchronized { lock, body } => {
            visitor.visit_expression(lock);
            visitor.visit_block(body);
        }
        Statement::Assert { condition, message } => {
            visitor.visit_expression(condition);
            if let Some(message) = message {
                visitor.visit_expression(message);
            }
        }
        Statement::ConstructorCall(call) => {
            if let Some(qualifier) = &mut call.qualifier {
                visitor.visit_expression(qualifier);
            }
            if let Some(outer) = &mut call.implicit.outer {
                visitor.visit_expression(outer);
            }
            if let Some(super_outer) = &mut call.implicit.super_outer {
                visitor.visit_expression(super_outer);
            }
            for capture in &mut call.implicit.captures {
                visitor.visit_expression(capture);
            }
            for arg in &mut call.args {
                visitor.visit_expression(arg);
            }
        }
    }
}

pub fn walk_expression<V: MutVisitor + ?Sized>(visitor: &mut V, expr: &mut Expression) {
    for child in expr.children_mut() {
        visitor.visit_expression(child);
    }
    match &mut expr.kind {
        ExpressionKind::Lambda { body, .. } => visitor.visit_block(body),
        ExpressionKind::New {
            body: Some(decl), ..
        } => visitor.visit_type_declaration(decl),
        _ => {}
    }
}
