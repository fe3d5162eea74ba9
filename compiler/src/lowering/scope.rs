//! Lexical scope stack used by capture resolution.
//!
//! One frame per type, lambda, or method-like body currently being walked.
//! Frames only exist for the duration of one traversal.

use fxhash::FxHashSet;

use crate::tast::{ElementTable, MethodId, TypeElementId, VariableId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Class,
    Lambda,
    Method,
}

impl ScopeKind {
    /// Class and lambda frames own an instance that paths hop through
    pub fn is_class_like(self) -> bool {
        matches!(self, ScopeKind::Class | ScopeKind::Lambda)
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    /// Type the frame belongs to; for method frames, the declaring type
    pub ty: TypeElementId,
    pub method: Option<MethodId>,
    /// Index of the nearest class-like frame at or below this one
    pub class_scope: usize,
    /// Types whose members are reachable through this frame's `this`
    pub inherited: FxHashSet<TypeElementId>,
    /// Constructor, instance initializer or instance field initializer
    pub initializing: bool,
    pub declared: FxHashSet<VariableId>,
}

#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_class(&mut self, elements: &ElementTable, ty: TypeElementId) {
        self.push_class_like(elements, ty, ScopeKind::Class);
    }

    /// Lambdas inherit no members; every reference out of one hops
    pub fn push_lambda(&mut self, ty: TypeElementId, params: &[VariableId]) {
        let index = self.frames.len();
        self.frames.push(Scope {
            kind: ScopeKind::Lambda,
            ty,
            method: None,
            class_scope: index,
            inherited: FxHashSet::default(),
            initializing: false,
            declared: params.iter().copied().collect(),
        });
    }

    fn push_class_like(&mut self, elements: &ElementTable, ty: TypeElementId, kind: ScopeKind) {
        let index = self.frames.len();
        self.frames.push(Scope {
            kind,
            ty,
            method: None,
            class_scope: index,
            inherited: elements.supertypes_inclusive(ty).into_iter().collect(),
            initializing: false,
            declared: FxHashSet::default(),
        });
    }

    /// Method, constructor, initializer block or field initializer body.
    ///
    /// Must sit directly on top of the frame of the type it belongs to.
    pub fn push_method(&mut self, method: Option<MethodId>, params: &[VariableId], initializing: bool) {
        let class_scope = self
            .frames
            .iter()
            .rposition(|frame| frame.kind.is_class_like())
            .unwrap_or(0);
        let ty = self
            .frames
            .get(class_scope)
            .map(|frame| frame.ty)
            .unwrap_or_default();
        self.frames.push(Scope {
            kind: ScopeKind::Method,
            ty,
            method,
            class_scope,
            inherited: FxHashSet::default(),
            initializing,
            declared: params.iter().copied().collect(),
        });
    }

    pub fn pop(&mut self) -> Option<Scope> {
        self.frames.pop()
    }

    pub fn declare(&mut self, var: VariableId) {
        if let Some(top) = self.frames.last_mut() {
            top.declared.insert(var);
        }
    }

    pub fn top(&self) -> Option<&Scope> {
        self.frames.last()
    }

    pub fn frame(&self, index: usize) -> &Scope {
        &self.frames[index]
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Innermost class-like frame
    pub fn current_class(&self) -> Option<&Scope> {
        self.top().map(|top| &self.frames[top.class_scope])
    }

    /// Innermost frame of a real class, skipping lambdas
    pub fn nearest_class(&self) -> Option<&Scope> {
        self.frames.iter().rev().find(|frame| frame.kind == ScopeKind::Class)
    }

    /// Whether the innermost frame is an initializing method body
    pub fn in_initializing_context(&self) -> bool {
        self.top()
            .map(|top| top.kind == ScopeKind::Method && top.initializing)
            .unwrap_or(false)
    }

    /// Indices of class-like frames, innermost first
    pub fn class_like_frames(&self) -> impl Iterator<Item = usize> + '_ {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, frame)| frame.kind.is_class_like())
            .map(|(index, _)| index)
    }

    /// Frame indices from innermost to outermost
    pub fn indices_innermost_first(&self) -> impl Iterator<Item = usize> {
        (0..self.frames.len()).rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tast::{TypeElement, TypeKind};

    #[test]
    fn test_method_frame_links_to_owner() {
        let mut elements = ElementTable::new();
        let outer = elements.add_type(TypeElement::new("Outer", TypeKind::TopLevel));
        let local = elements.add_type(TypeElement::new("Local", TypeKind::Local));

        let mut stack = ScopeStack::new();
        stack.push_class(&elements, outer);
        stack.push_method(None, &[], true);
        assert!(stack.in_initializing_context());
        assert_eq!(stack.current_class().map(|s| s.ty), Some(outer));

        stack.push_class(&elements, local);
        stack.push_method(None, &[VariableId::from_raw(7)], false);
        assert!(!stack.in_initializing_context());
        assert_eq!(stack.top().map(|s| s.ty), Some(local));
        assert!(stack.top().unwrap().declared.contains(&VariableId::from_raw(7)));

        let classes: Vec<_> = stack.class_like_frames().collect();
        assert_eq!(classes, vec![2, 0]);
        assert!(stack.frame(0).inherited.contains(&outer));
        assert!(!stack.frame(2).inherited.contains(&outer));
    }
}
