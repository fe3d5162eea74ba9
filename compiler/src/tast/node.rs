//! Typed AST nodes
//!
//! Declarations, statements and expressions of one bound unit. All node
//! kinds are closed enums so that every pass matches them exhaustively.

use super::elements::ElementTable;
use super::id_types::{ExpressionId, IdGenerator, MethodId, TypeElementId, VariableId};
use super::types::TypeRef;
use serde::{Deserialize, Serialize};

/// A fully bound compilation unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypedUnit {
    pub name: String,
    pub elements: ElementTable,
    pub types: Vec<TypeDeclaration>,
    /// Free functions generated by devirtualization
    #[serde(default)]
    pub functions: Vec<FunctionDeclaration>,
    #[serde(default)]
    pub expression_ids: IdGenerator<ExpressionId>,
}

impl TypedUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: ElementTable::new(),
            types: Vec::new(),
            functions: Vec::new(),
            expression_ids: IdGenerator::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDeclaration {
    pub element: TypeElementId,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Member {
    Field {
        var: VariableId,
        initializer: Option<Expression>,
    },
    Method {
        method: MethodId,
        body: Option<Block>,
    },
    Initializer {
        is_static: bool,
        body: Block,
    },
    Type(TypeDeclaration),
}

/// Free function with the receiver as explicit leading parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub function: MethodId,
    /// Method the function was generated from
    pub source_method: MethodId,
    /// `None` for functions generated from static methods
    pub self_param: Option<VariableId>,
    pub params: Vec<VariableId>,
    pub body: Block,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    /// Empty for the `default` case
    pub labels: Vec<Expression>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    pub param: VariableId,
    pub body: Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstructorCallKind {
    Super,
    This,
}

/// `super(..)` or `this(..)` as the first statement of a constructor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructorCall {
    pub kind: ConstructorCallKind,
    pub constructor: MethodId,
    /// Explicit outer instance, as in `outer.super(..)`
    pub qualifier: Option<Box<Expression>>,
    pub args: Vec<Expression>,
    #[serde(default)]
    pub implicit: ImplicitArgs,
}

/// Arguments added to a creation site by capture resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImplicitArgs {
    pub outer: Option<Box<Expression>>,
    pub super_outer: Option<Box<Expression>>,
    pub captures: Vec<Expression>,
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Expression(Expression),
    VarDecl {
        var: VariableId,
        initializer: Option<Expression>,
    },
    LocalClass(TypeDeclaration),
    Block(Block),
    If {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    DoWhile {
        body: Box<Statement>,
        condition: Expression,
    },
    For {
        init: Vec<Statement>,
        condition: Option<Expression>,
        update: Vec<Expression>,
        body: Box<Statement>,
    },
    ForEach {
        var: VariableId,
        iterable: Expression,
        body: Box<Statement>,
    },
    Switch {
        discriminant: Expression,
        cases: Vec<SwitchCase>,
    },
    Return(Option<Expression>),
    Throw(Expression),
    Break(Option<String>),
    Continue(Option<String>),
    Labeled {
        label: String,
        body: Box<Statement>,
    },
    Try {
        body: Block,
        catches: Vec<CatchClause>,
        finally: Option<Block>,
    },
    Synchronized {
        lock: Expression,
        body: Block,
    },
    Assert {
        condition: Expression,
        message: Option<Expression>,
    },
    ConstructorCall(ConstructorCall),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Boolean(bool),
    Int(i64),
    Long(i64),
    Double(f64),
    Char(char),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}

impl AssignOp {
    /// The binary operator a compound assignment applies
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Rem => Some(BinaryOp::Rem),
            AssignOp::BitAnd => Some(BinaryOp::BitAnd),
            AssignOp::BitOr => Some(BinaryOp::BitOr),
            AssignOp::BitXor => Some(BinaryOp::BitXor),
            AssignOp::Shl => Some(BinaryOp::Shl),
            AssignOp::Shr => Some(BinaryOp::Shr),
            AssignOp::UShr => Some(BinaryOp::UShr),
        }
    }

    pub fn is_compound(self) -> bool {
        self != AssignOp::Assign
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

impl UnaryOp {
    pub fn is_increment_or_decrement(self) -> bool {
        matches!(
            self,
            UnaryOp::PreIncrement
                | UnaryOp::PreDecrement
                | UnaryOp::PostIncrement
                | UnaryOp::PostDecrement
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    UShr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    BitXor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub id: ExpressionId,
    pub ty: TypeRef,
    pub kind: ExpressionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionKind {
    Literal(Literal),
    /// Simple name: local, parameter, or field with implicit receiver
    Variable(VariableId),
    FieldAccess {
        object: Box<Expression>,
        field: VariableId,
    },
    ArrayAccess {
        array: Box<Expression>,
        index: Box<Expression>,
    },
    /// `this` or `Outer.this`; the type names which instance is meant
    This(TypeElementId),
    MethodCall {
        receiver: Option<Box<Expression>>,
        method: MethodId,
        args: Vec<Expression>,
    },
    /// `super.m()`, `Outer.super.m()` or `Iface.super.m()`
    SuperMethodCall {
        qualifier: Option<TypeElementId>,
        receiver: Option<Box<Expression>>,
        method: MethodId,
        args: Vec<Expression>,
    },
    FunctionCall {
        function: MethodId,
        args: Vec<Expression>,
    },
    New {
        class: TypeElementId,
        constructor: MethodId,
        qualifier: Option<Box<Expression>>,
        args: Vec<Expression>,
        /// Body of an anonymous class; `class` is then the anonymous type
        body: Option<Box<TypeDeclaration>>,
        implicit: ImplicitArgs,
    },
    Lambda {
        element: TypeElementId,
        params: Vec<VariableId>,
        body: Block,
        implicit: ImplicitArgs,
    },
    Assignment {
        op: AssignOp,
        target: Box<Expression>,
        value: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    ShortCircuit {
        op: LogicalOp,
        operands: Vec<Expression>,
    },
    Conditional {
        condition: Box<Expression>,
        then_expr: Box<Expression>,
        else_expr: Box<Expression>,
    },
    Cast {
        target: TypeRef,
        operand: Box<Expression>,
    },
    InstanceOf {
        operand: Box<Expression>,
        target: TypeRef,
    },
    ArrayLiteral {
        elements: Vec<Expression>,
    },
}

impl Expression {
    pub fn new(id: ExpressionId, ty: TypeRef, kind: ExpressionKind) -> Self {
        Self { id, ty, kind }
    }

    /// Throwaway node left behind while a subtree is moved out
    pub fn placeholder() -> Self {
        Self::new(
            ExpressionId::invalid(),
            TypeRef::Null,
            ExpressionKind::Literal(Literal::Null),
        )
    }

    /// Simple name or `this.f`, the forms whose variable is known statically
    pub fn tracked_variable(&self) -> Option<VariableId> {
        match &self.kind {
            ExpressionKind::Variable(var) => Some(*var),
            ExpressionKind::FieldAccess { object, field } => match object.kind {
                ExpressionKind::This(_) => Some(*field),
                _ => None,
            },
            _ => None,
        }
    }
}
