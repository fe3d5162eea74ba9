//! Programmatic construction of bound units.
//!
//! Plays the role of the front end for tests and tools: it creates elements
//! with consistent enclosing links, allocates expression IDs, and derives
//! each expression's type from its binding.

use super::elements::{
    ElementRef, ElementTable, MethodElement, MethodKind, TypeElement, TypeKind, VariableElement,
    VariableKind,
};
use super::id_types::{ExpressionId, MethodId, TypeElementId, VariableId};
use super::node::{
    AssignOp, BinaryOp, Block, ConstructorCall, ConstructorCallKind, Expression, ExpressionKind,
    ImplicitArgs, Literal, LogicalOp, Member, Statement, TypeDeclaration, TypedUnit, UnaryOp,
};
use super::types::{PrimitiveType, TypeRef};

pub struct UnitBuilder {
    unit: TypedUnit,
}

impl UnitBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            unit: TypedUnit::new(name),
        }
    }

    pub fn elements(&self) -> &ElementTable {
        &self.unit.elements
    }

    pub fn elements_mut(&mut self) -> &mut ElementTable {
        &mut self.unit.elements
    }

    pub fn finish(self) -> TypedUnit {
        self.unit
    }

    /// Add a top-level declaration to the unit
    pub fn declare(&mut self, decl: TypeDeclaration) {
        self.unit.types.push(decl);
    }

    // ----- types -----

    fn add_type(&mut self, name: &str, kind: TypeKind, enclosing: Option<ElementRef>) -> TypeElementId {
        let mut element = TypeElement::new(name, kind);
        element.enclosing = enclosing;
        if let Some(ElementRef::Method(m)) = enclosing {
            element.in_static_context = self.unit.elements.method(m).is_static;
        }
        if let Some(ElementRef::Type(t)) = enclosing {
            let outer = self.unit.elements.type_element(t);
            if outer.kind == TypeKind::Lambda || outer.kind == TypeKind::Anonymous || outer.kind == TypeKind::Local {
                element.in_static_context = outer.in_static_context;
            }
        }
        self.unit.elements.add_type(element)
    }

    pub fn class(&mut self, name: &str) -> TypeElementId {
        self.add_type(name, TypeKind::TopLevel, None)
    }

    pub fn interface(&mut self, name: &str) -> TypeElementId {
        let id = self.add_type(name, TypeKind::TopLevel, None);
        let element = self.unit.elements.type_element_mut(id);
        element.is_interface = true;
        element.is_abstract = true;
        id
    }

    /// Type declared in another unit
    pub fn external_class(&mut self, name: &str) -> TypeElementId {
        let id = self.add_type(name, TypeKind::TopLevel, None);
        self.unit.elements.type_element_mut(id).is_external = true;
        id
    }

    /// Non-static member class
    pub fn inner_class(&mut self, outer: TypeElementId, name: &str) -> TypeElementId {
        self.add_type(name, TypeKind::Member, Some(ElementRef::Type(outer)))
    }

    pub fn static_nested_class(&mut self, outer: TypeElementId, name: &str) -> TypeElementId {
        let id = self.add_type(name, TypeKind::Member, Some(ElementRef::Type(outer)));
        self.unit.elements.type_element_mut(id).is_static = true;
        id
    }

    /// Class declared in a method body; `enclosing` is the method, or the
    /// lambda or local type whose body holds the declaration
    pub fn local_class(&mut self, enclosing: ElementRef, name: &str) -> TypeElementId {
        self.add_type(name, TypeKind::Local, Some(enclosing))
    }

    pub fn anonymous_class(&mut self, enclosing: ElementRef, superclass: TypeElementId) -> TypeElementId {
        let index = self.unit.elements.type_count();
        let id = self.add_type(&format!("{}", index), TypeKind::Anonymous, Some(enclosing));
        if self.unit.elements.type_element(superclass).is_interface {
            self.unit.elements.type_element_mut(id).interfaces.push(superclass);
        } else {
            self.unit.elements.type_element_mut(id).superclass = Some(superclass);
        }
        id
    }

    pub fn lambda_type(&mut self, enclosing: ElementRef, functional_interface: TypeElementId) -> TypeElementId {
        let index = self.unit.elements.type_count();
        let id = self.add_type(&format!("lambda${}", index), TypeKind::Lambda, Some(enclosing));
        self.unit
            .elements
            .type_element_mut(id)
            .interfaces
            .push(functional_interface);
        id
    }

    pub fn extends(&mut self, sub: TypeElementId, sup: TypeElementId) {
        self.unit.elements.type_element_mut(sub).superclass = Some(sup);
    }

    pub fn set_final(&mut self, ty: TypeElementId) {
        self.unit.elements.type_element_mut(ty).is_final = true;
    }

    // ----- variables -----

    fn add_variable(&mut self, name: &str, kind: VariableKind, declaring: ElementRef, ty: TypeRef) -> VariableId {
        self.unit.elements.add_variable(VariableElement {
            name: name.to_string(),
            kind,
            declaring,
            ty,
            is_static: false,
            is_final: false,
            constant: None,
            synthetic: false,
        })
    }

    pub fn field(&mut self, owner: TypeElementId, name: &str, ty: TypeRef) -> VariableId {
        self.add_variable(name, VariableKind::Field, ElementRef::Type(owner), ty)
    }

    pub fn static_field(&mut self, owner: TypeElementId, name: &str, ty: TypeRef) -> VariableId {
        let id = self.field(owner, name, ty);
        self.unit.elements.variable_mut(id).is_static = true;
        id
    }

    pub fn local(&mut self, declaring: ElementRef, name: &str, ty: TypeRef) -> VariableId {
        self.add_variable(name, VariableKind::Local, declaring, ty)
    }

    /// Final local initialized with a compile-time constant
    pub fn constant_local(&mut self, declaring: ElementRef, name: &str, value: Literal, ty: TypeRef) -> VariableId {
        let id = self.local(declaring, name, ty);
        let var = self.unit.elements.variable_mut(id);
        var.is_final = true;
        var.constant = Some(value);
        id
    }

    pub fn parameter(&mut self, declaring: ElementRef, name: &str, ty: TypeRef) -> VariableId {
        self.add_variable(name, VariableKind::Parameter, declaring, ty)
    }

    // ----- methods -----

    fn add_method(
        &mut self,
        owner: TypeElementId,
        name: &str,
        kind: MethodKind,
        params: &[(&str, TypeRef)],
        return_type: TypeRef,
    ) -> MethodId {
        let id = self.unit.elements.add_method(MethodElement {
            name: name.to_string(),
            kind,
            declaring_type: owner,
            params: Vec::new(),
            return_type,
            is_static: false,
            is_private: false,
            is_final: false,
            is_abstract: false,
            is_native: false,
        });
        let vars: Vec<VariableId> = params
            .iter()
            .map(|(name, ty)| self.parameter(ElementRef::Method(id), name, ty.clone()))
            .collect();
        self.unit.elements.method_mut(id).params = vars;
        id
    }

    pub fn method(&mut self, owner: TypeElementId, name: &str, params: &[(&str, TypeRef)], return_type: TypeRef) -> MethodId {
        self.add_method(owner, name, MethodKind::Method, params, return_type)
    }

    pub fn static_method(&mut self, owner: TypeElementId, name: &str, params: &[(&str, TypeRef)], return_type: TypeRef) -> MethodId {
        let id = self.method(owner, name, params, return_type);
        self.unit.elements.method_mut(id).is_static = true;
        id
    }

    pub fn constructor(&mut self, owner: TypeElementId, params: &[(&str, TypeRef)]) -> MethodId {
        self.add_method(owner, "<init>", MethodKind::Constructor, params, TypeRef::Void)
    }

    pub fn set_private(&mut self, method: MethodId) {
        self.unit.elements.method_mut(method).is_private = true;
    }

    pub fn set_method_final(&mut self, method: MethodId) {
        self.unit.elements.method_mut(method).is_final = true;
    }

    pub fn set_abstract(&mut self, method: MethodId) {
        self.unit.elements.method_mut(method).is_abstract = true;
    }

    pub fn param_of(&self, method: MethodId, index: usize) -> VariableId {
        self.unit.elements.method(method).params[index]
    }

    // ----- expressions -----

    fn expr(&mut self, ty: TypeRef, kind: ExpressionKind) -> Expression {
        let id: ExpressionId = self.unit.expression_ids.next();
        Expression::new(id, ty, kind)
    }

    pub fn int(&mut self, value: i64) -> Expression {
        self.expr(TypeRef::INT, ExpressionKind::Literal(Literal::Int(value)))
    }

    pub fn boolean(&mut self, value: bool) -> Expression {
        self.expr(TypeRef::BOOLEAN, ExpressionKind::Literal(Literal::Boolean(value)))
    }

    pub fn var(&mut self, var: VariableId) -> Expression {
        let ty = self.unit.elements.variable(var).ty.clone();
        self.expr(ty, ExpressionKind::Variable(var))
    }

    pub fn this(&mut self, ty: TypeElementId) -> Expression {
        self.expr(TypeRef::Class(ty), ExpressionKind::This(ty))
    }

    pub fn field_access(&mut self, object: Expression, field: VariableId) -> Expression {
        let ty = self.unit.elements.variable(field).ty.clone();
        self.expr(
            ty,
            ExpressionKind::FieldAccess {
                object: Box::new(object),
                field,
            },
        )
    }

    pub fn array_access(&mut self, array: Expression, index: Expression) -> Expression {
        let ty = match &array.ty {
            TypeRef::Array(inner) => (**inner).clone(),
            other => other.clone(),
        };
        self.expr(
            ty,
            ExpressionKind::ArrayAccess {
                array: Box::new(array),
                index: Box::new(index),
            },
        )
    }

    pub fn call(&mut self, receiver: Option<Expression>, method: MethodId, args: Vec<Expression>) -> Expression {
        let ty = self.unit.elements.method(method).return_type.clone();
        self.expr(
            ty,
            ExpressionKind::MethodCall {
                receiver: receiver.map(Box::new),
                method,
                args,
            },
        )
    }

    pub fn super_call(&mut self, qualifier: Option<TypeElementId>, method: MethodId, args: Vec<Expression>) -> Expression {
        let ty = self.unit.elements.method(method).return_type.clone();
        self.expr(
            ty,
            ExpressionKind::SuperMethodCall {
                qualifier,
                receiver: None,
                method,
                args,
            },
        )
    }

    pub fn new_object(&mut self, class: TypeElementId, constructor: MethodId, args: Vec<Expression>) -> Expression {
        self.expr(
            TypeRef::Class(class),
            ExpressionKind::New {
                class,
                constructor,
                qualifier: None,
                args,
                body: None,
                implicit: ImplicitArgs::default(),
            },
        )
    }

    pub fn new_qualified(&mut self, qualifier: Expression, class: TypeElementId, constructor: MethodId, args: Vec<Expression>) -> Expression {
        let mut expr = self.new_object(class, constructor, args);
        if let ExpressionKind::New { qualifier: slot, .. } = &mut expr.kind {
            *slot = Some(Box::new(qualifier));
        }
        expr
    }

    /// `new Super(args) { members }`; `decl.element` is the anonymous type
    pub fn new_anonymous(&mut self, decl: TypeDeclaration, constructor: MethodId, args: Vec<Expression>) -> Expression {
        let class = decl.element;
        self.expr(
            TypeRef::Class(class),
            ExpressionKind::New {
                class,
                constructor,
                qualifier: None,
                args,
                body: Some(Box::new(decl)),
                implicit: ImplicitArgs::default(),
            },
        )
    }

    pub fn lambda(&mut self, element: TypeElementId, params: Vec<VariableId>, body: Block) -> Expression {
        let ty = match self.unit.elements.type_element(element).interfaces.first() {
            Some(iface) => TypeRef::Class(*iface),
            None => TypeRef::Class(element),
        };
        self.expr(
            ty,
            ExpressionKind::Lambda {
                element,
                params,
                body,
                implicit: ImplicitArgs::default(),
            },
        )
    }

    pub fn assign(&mut self, target: Expression, value: Expression) -> Expression {
        self.compound_assign(AssignOp::Assign, target, value)
    }

    pub fn compound_assign(&mut self, op: AssignOp, target: Expression, value: Expression) -> Expression {
        let ty = target.ty.clone();
        self.expr(
            ty,
            ExpressionKind::Assignment {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
        )
    }

    pub fn unary(&mut self, op: UnaryOp, operand: Expression) -> Expression {
        let ty = match op {
            UnaryOp::Not => TypeRef::BOOLEAN,
            _ => operand.ty.clone(),
        };
        self.expr(
            ty,
            ExpressionKind::Unary {
                op,
                operand: Box::new(operand),
            },
        )
    }

    pub fn post_increment(&mut self, operand: Expression) -> Expression {
        self.unary(UnaryOp::PostIncrement, operand)
    }

    pub fn pre_increment(&mut self, operand: Expression) -> Expression {
        self.unary(UnaryOp::PreIncrement, operand)
    }

    pub fn binary(&mut self, op: BinaryOp, left: Expression, right: Expression) -> Expression {
        let ty = match op {
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne => {
                TypeRef::Primitive(PrimitiveType::Boolean)
            }
            _ => left.ty.clone(),
        };
        self.expr(
            ty,
            ExpressionKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        )
    }

    pub fn logical(&mut self, op: LogicalOp, operands: Vec<Expression>) -> Expression {
        self.expr(TypeRef::BOOLEAN, ExpressionKind::ShortCircuit { op, operands })
    }

    pub fn conditional(&mut self, condition: Expression, then_expr: Expression, else_expr: Expression) -> Expression {
        let ty = then_expr.ty.clone();
        self.expr(
            ty,
            ExpressionKind::Conditional {
                condition: Box::new(condition),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
        )
    }

    // ----- statements and declarations -----

    pub fn super_constructor_call(&mut self, constructor: MethodId, args: Vec<Expression>) -> Statement {
        Statement::ConstructorCall(ConstructorCall {
            kind: ConstructorCallKind::Super,
            constructor,
            qualifier: None,
            args,
            implicit: ImplicitArgs::default(),
        })
    }

    pub fn this_constructor_call(&mut self, constructor: MethodId, args: Vec<Expression>) -> Statement {
        Statement::ConstructorCall(ConstructorCall {
            kind: ConstructorCallKind::This,
            constructor,
            qualifier: None,
            args,
            implicit: ImplicitArgs::default(),
        })
    }
}

pub fn method_member(method: MethodId, statements: Vec<Statement>) -> Member {
    Member::Method {
        method,
        body: Some(Block::new(statements)),
    }
}

pub fn expr_stmt(expr: Expression) -> Statement {
    Statement::Expression(expr)
}

pub fn block(statements: Vec<Statement>) -> Block {
    Block::new(statements)
}

pub fn type_decl(element: TypeElementId, members: Vec<Member>) -> TypeDeclaration {
    TypeDeclaration { element, members }
}
