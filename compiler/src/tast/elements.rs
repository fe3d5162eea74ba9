//! Element table: the bound symbols of one unit.
//!
//! Types, variables and methods live in flat arenas indexed by their ID
//! newtypes. The front end fills the table; the lowering passes only append
//! synthetic variables and generated functions and never remove anything.

use super::id_types::{MethodId, TypeElementId, VariableId};
use super::node::Literal;
use super::types::TypeRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a type element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    TopLevel,
    Member,
    Local,
    Anonymous,
    Lambda,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::TopLevel => write!(f, "top-level"),
            TypeKind::Member => write!(f, "member"),
            TypeKind::Local => write!(f, "local"),
            TypeKind::Anonymous => write!(f, "anonymous"),
            TypeKind::Lambda => write!(f, "lambda"),
        }
    }
}

/// Either a type or a method, used for enclosing and declaring links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementRef {
    Type(TypeElementId),
    Method(MethodId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeElement {
    pub name: String,
    pub kind: TypeKind,
    pub is_interface: bool,
    pub is_static: bool,
    pub is_final: bool,
    pub is_abstract: bool,
    /// Declared inside a static method or static initializer
    pub in_static_context: bool,
    /// Defined in another unit; only referenced here
    pub is_external: bool,
    pub enclosing: Option<ElementRef>,
    pub superclass: Option<TypeElementId>,
    pub interfaces: Vec<TypeElementId>,
    pub fields: Vec<VariableId>,
    pub methods: Vec<MethodId>,
}

impl TypeElement {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            is_interface: false,
            is_static: false,
            is_final: false,
            is_abstract: false,
            in_static_context: false,
            is_external: false,
            enclosing: None,
            superclass: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Local, anonymous and lambda types are the ones that can capture
    pub fn is_local_like(&self) -> bool {
        matches!(self.kind, TypeKind::Local | TypeKind::Anonymous | TypeKind::Lambda)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableKind {
    Field,
    Parameter,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableElement {
    pub name: String,
    pub kind: VariableKind,
    pub declaring: ElementRef,
    pub ty: TypeRef,
    pub is_static: bool,
    pub is_final: bool,
    /// Compile-time constant value, if any
    pub constant: Option<Literal>,
    /// Created by a lowering pass rather than the front end
    pub synthetic: bool,
}

impl VariableElement {
    pub fn is_instance_field(&self) -> bool {
        self.kind == VariableKind::Field && !self.is_static
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    Method,
    Constructor,
    /// Free function generated by devirtualization
    Function,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodElement {
    pub name: String,
    pub kind: MethodKind,
    pub declaring_type: TypeElementId,
    pub params: Vec<VariableId>,
    pub return_type: TypeRef,
    pub is_static: bool,
    pub is_private: bool,
    pub is_final: bool,
    pub is_abstract: bool,
    pub is_native: bool,
}

/// Arena of all elements referenced by a unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementTable {
    types: Vec<TypeElement>,
    variables: Vec<VariableElement>,
    methods: Vec<MethodElement>,
}

impl ElementTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, element: TypeElement) -> TypeElementId {
        let id = TypeElementId::from_raw(self.types.len() as u32);
        self.types.push(element);
        id
    }

    pub fn add_variable(&mut self, element: VariableElement) -> VariableId {
        let id = VariableId::from_raw(self.variables.len() as u32);
        if let ElementRef::Type(owner) = element.declaring {
            if element.kind == VariableKind::Field {
                self.types[owner.index()].fields.push(id);
            }
        }
        self.variables.push(element);
        id
    }

    pub fn add_method(&mut self, element: MethodElement) -> MethodId {
        let id = MethodId::from_raw(self.methods.len() as u32);
        let owner = element.declaring_type;
        if element.kind != MethodKind::Function {
            self.types[owner.index()].methods.push(id);
        }
        self.methods.push(element);
        id
    }

    pub fn type_element(&self, id: TypeElementId) -> &TypeElement {
        &self.types[id.index()]
    }

    pub fn type_element_mut(&mut self, id: TypeElementId) -> &mut TypeElement {
        &mut self.types[id.index()]
    }

    pub fn variable(&self, id: VariableId) -> &VariableElement {
        &self.variables[id.index()]
    }

    pub fn variable_mut(&mut self, id: VariableId) -> &mut VariableElement {
        &mut self.variables[id.index()]
    }

    pub fn method(&self, id: MethodId) -> &MethodElement {
        &self.methods[id.index()]
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut MethodElement {
        &mut self.methods[id.index()]
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// The type whose instance an inner type's outer reference points to
    pub fn enclosing_type(&self, id: TypeElementId) -> Option<TypeElementId> {
        match self.type_element(id).enclosing? {
            ElementRef::Type(t) => Some(t),
            ElementRef::Method(m) => Some(self.method(m).declaring_type),
        }
    }

    /// Whether instances of `id` can have an enclosing instance at all
    pub fn has_outer_context(&self, id: TypeElementId) -> bool {
        let element = self.type_element(id);
        match element.kind {
            TypeKind::TopLevel => false,
            TypeKind::Member => !element.is_static && !element.is_interface,
            TypeKind::Local | TypeKind::Anonymous | TypeKind::Lambda => {
                !element.in_static_context
            }
        }
    }

    /// `id` followed by its superclass chain and all transitively
    /// implemented interfaces, without duplicates
    pub fn supertypes_inclusive(&self, id: TypeElementId) -> Vec<TypeElementId> {
        let mut result = Vec::new();
        let mut worklist = vec![id];
        while let Some(current) = worklist.pop() {
            if result.contains(&current) {
                continue;
            }
            result.push(current);
            let element = self.type_element(current);
            for iface in element.interfaces.iter().rev() {
                worklist.push(*iface);
            }
            if let Some(superclass) = element.superclass {
                worklist.push(superclass);
            }
        }
        result
    }

    /// Number of proper superclasses that carry their own outer reference.
    ///
    /// A subclass reuses the slots its superclasses already occupy, so its
    /// own outer field is numbered after them.
    pub fn superclass_outer_depth(&self, id: TypeElementId) -> usize {
        let mut depth = 0;
        let mut current = self.type_element(id).superclass;
        while let Some(superclass) = current {
            if self.has_outer_context(superclass) {
                depth += 1;
            }
            current = self.type_element(superclass).superclass;
        }
        depth
    }

    /// Flattened name, `Outer_Inner` for nested types
    pub fn qualified_name(&self, id: TypeElementId) -> String {
        let element = self.type_element(id);
        match self.enclosing_type(id) {
            Some(outer) if element.kind != TypeKind::TopLevel => {
                format!("{}_{}", self.qualified_name(outer), element.name)
            }
            _ => element.name.clone(),
        }
    }

    /// Whether calls to `id` may dispatch to an override
    pub fn is_overridable(&self, id: MethodId) -> bool {
        let method = self.method(id);
        if method.kind != MethodKind::Method {
            return false;
        }
        let owner = self.type_element(method.declaring_type);
        !(method.is_private
            || method.is_static
            || method.is_final
            || owner.is_final
            || owner.kind == TypeKind::Anonymous)
    }

    /// Parameter type names, used to disambiguate overloads
    pub fn signature_suffix(&self, id: MethodId) -> String {
        self.method(id)
            .params
            .iter()
            .map(|p| self.type_name(&self.variable(*p).ty))
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn type_name(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::Void => "void".to_string(),
            TypeRef::Null => "null".to_string(),
            TypeRef::Primitive(p) => p.to_string(),
            TypeRef::Class(id) => self.qualified_name(*id),
            TypeRef::Array(inner) => format!("{}Array", self.type_name(inner)),
        }
    }

    pub fn methods(&self) -> impl Iterator<Item = (MethodId, &MethodElement)> {
        self.methods
            .iter()
            .enumerate()
            .map(|(i, m)| (MethodId::from_raw(i as u32), m))
    }
}
