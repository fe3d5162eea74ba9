//! Capture registry
//!
//! Records, per capturing type, the synthetic variables that carry its
//! enclosing instance and its captured locals. Entries are created on demand
//! by capture resolution and only ever grow. Once resolution of the unit is
//! complete the registry is sealed; later passes (class extraction,
//! constructor synthesis, lambda lowering) read it to emit the matching
//! fields and constructor parameters.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::LoweringError;
use crate::error_codes;
use crate::tast::{ElementRef, ElementTable, TypeElementId, TypeRef, VariableElement, VariableId, VariableKind};

const PASS: &str = "capture-registry";

/// A local variable captured by a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCapture {
    pub var: VariableId,
    /// Constructor parameter receiving the value
    pub param: VariableId,
    /// Field holding the value, created when the value is read outside
    /// of an initializing context
    pub field: Option<VariableId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureEntry {
    pub outer_param: Option<VariableId>,
    pub outer_field: Option<VariableId>,
    /// Outer instance forwarded to the superclass constructor of an
    /// anonymous class
    pub super_outer_param: Option<VariableId>,
    pub captures: Vec<LocalCapture>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureRegistry {
    entries: IndexMap<TypeElementId, CaptureEntry>,
    #[serde(skip)]
    revision: u64,
    sealed: bool,
}

impl CaptureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Incremented on every new variable
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn entry(&self, ty: TypeElementId) -> Option<&CaptureEntry> {
        self.entries.get(&ty)
    }

    pub fn entries(&self) -> impl Iterator<Item = (TypeElementId, &CaptureEntry)> {
        self.entries.iter().map(|(ty, entry)| (*ty, entry))
    }

    pub fn outer_param(&self, ty: TypeElementId) -> Option<VariableId> {
        self.entry(ty).and_then(|e| e.outer_param)
    }

    pub fn outer_field(&self, ty: TypeElementId) -> Option<VariableId> {
        self.entry(ty).and_then(|e| e.outer_field)
    }

    pub fn super_outer_param(&self, ty: TypeElementId) -> Option<VariableId> {
        self.entry(ty).and_then(|e| e.super_outer_param)
    }

    /// Whether constructors of `ty` take the enclosing instance
    pub fn needs_outer_param(&self, ty: TypeElementId) -> bool {
        self.outer_param(ty).is_some()
    }

    /// Whether instances of `ty` keep the enclosing instance in a field
    pub fn needs_outer_reference(&self, ty: TypeElementId) -> bool {
        self.outer_field(ty).is_some()
    }

    pub fn local_captures(&self, ty: TypeElementId) -> &[LocalCapture] {
        self.entry(ty).map(|e| e.captures.as_slice()).unwrap_or(&[])
    }

    /// Parameters constructors of `ty` take before the declared ones
    pub fn implicit_prefix_params(&self, ty: TypeElementId) -> Vec<VariableId> {
        let mut params = Vec::new();
        if let Some(outer) = self.outer_param(ty) {
            params.push(outer);
        }
        if let Some(super_outer) = self.super_outer_param(ty) {
            params.push(super_outer);
        }
        params
    }

    /// Parameters constructors of `ty` take after the declared ones
    pub fn implicit_postfix_params(&self, ty: TypeElementId) -> Vec<VariableId> {
        self.local_captures(ty).iter().map(|c| c.param).collect()
    }

    /// Full constructor parameter list of `ty`
    pub fn constructor_params(&self, ty: TypeElementId, declared: &[VariableId]) -> Vec<VariableId> {
        let mut params = self.implicit_prefix_params(ty);
        params.extend_from_slice(declared);
        params.extend(self.implicit_postfix_params(ty));
        params
    }

    fn ensure_writable(&self, what: &str, ty: TypeElementId) -> Result<(), LoweringError> {
        if self.sealed {
            return Err(LoweringError::internal(
                error_codes::REGISTRY_SEALED,
                PASS,
                format!("attempted to create {} for {} after sealing", what, ty),
            ));
        }
        Ok(())
    }

    fn synthesize(
        &mut self,
        elements: &mut ElementTable,
        owner: TypeElementId,
        name: String,
        kind: VariableKind,
        ty: TypeRef,
    ) -> VariableId {
        self.revision += 1;
        elements.add_variable(VariableElement {
            name,
            kind,
            declaring: ElementRef::Type(owner),
            ty,
            is_static: false,
            is_final: true,
            constant: None,
            synthetic: true,
        })
    }

    fn outer_type(elements: &ElementTable, ty: TypeElementId) -> Result<TypeElementId, LoweringError> {
        if !elements.has_outer_context(ty) {
            return Err(LoweringError::internal(
                error_codes::NO_ENCLOSING_INSTANCE,
                PASS,
                format!(
                    "{} type {} has no enclosing instance",
                    elements.type_element(ty).kind,
                    elements.qualified_name(ty)
                ),
            ));
        }
        elements.enclosing_type(ty).ok_or_else(|| {
            LoweringError::internal(
                error_codes::NO_ENCLOSING_INSTANCE,
                PASS,
                format!("{} has no enclosing element", elements.qualified_name(ty)),
            )
        })
    }

    pub fn get_or_create_outer_param(
        &mut self,
        elements: &mut ElementTable,
        ty: TypeElementId,
    ) -> Result<VariableId, LoweringError> {
        if let Some(param) = self.outer_param(ty) {
            return Ok(param);
        }
        self.ensure_writable("outer parameter", ty)?;
        let outer = Self::outer_type(elements, ty)?;
        let param = self.synthesize(elements, ty, "outer$".to_string(), VariableKind::Parameter, TypeRef::Class(outer));
        self.entries.entry(ty).or_default().outer_param = Some(param);
        Ok(param)
    }

    /// The field also requires the parameter that initializes it
    pub fn get_or_create_outer_field(
        &mut self,
        elements: &mut ElementTable,
        ty: TypeElementId,
    ) -> Result<VariableId, LoweringError> {
        if let Some(field) = self.outer_field(ty) {
            return Ok(field);
        }
        self.get_or_create_outer_param(elements, ty)?;
        self.ensure_writable("outer field", ty)?;
        let outer = Self::outer_type(elements, ty)?;
        let name = format!("this${}", elements.superclass_outer_depth(ty));
        let field = self.synthesize(elements, ty, name, VariableKind::Field, TypeRef::Class(outer));
        self.entries.entry(ty).or_default().outer_field = Some(field);
        Ok(field)
    }

    pub fn get_or_create_super_outer_param(
        &mut self,
        elements: &mut ElementTable,
        ty: TypeElementId,
        super_outer: TypeElementId,
    ) -> Result<VariableId, LoweringError> {
        if let Some(param) = self.super_outer_param(ty) {
            return Ok(param);
        }
        self.ensure_writable("super outer parameter", ty)?;
        let param = self.synthesize(
            elements,
            ty,
            "superOuter$".to_string(),
            VariableKind::Parameter,
            TypeRef::Class(super_outer),
        );
        self.entries.entry(ty).or_default().super_outer_param = Some(param);
        Ok(param)
    }

    pub fn get_or_create_capture_param(
        &mut self,
        elements: &mut ElementTable,
        var: VariableId,
        ty: TypeElementId,
    ) -> Result<VariableId, LoweringError> {
        if let Some(capture) = self.local_captures(ty).iter().find(|c| c.var == var) {
            return Ok(capture.param);
        }
        self.ensure_writable("capture parameter", ty)?;
        let captured = elements.variable(var);
        let name = format!("capture${}", captured.name);
        let var_ty = captured.ty.clone();
        let param = self.synthesize(elements, ty, name, VariableKind::Parameter, var_ty);
        self.entries.entry(ty).or_default().captures.push(LocalCapture {
            var,
            param,
            field: None,
        });
        Ok(param)
    }

    pub fn get_or_create_capture_field(
        &mut self,
        elements: &mut ElementTable,
        var: VariableId,
        ty: TypeElementId,
    ) -> Result<VariableId, LoweringError> {
        self.get_or_create_capture_param(elements, var, ty)?;
        if let Some(field) = self
            .local_captures(ty)
            .iter()
            .find(|c| c.var == var)
            .and_then(|c| c.field)
        {
            return Ok(field);
        }
        self.ensure_writable("capture field", ty)?;
        let captured = elements.variable(var);
        let name = format!("val${}", captured.name);
        let var_ty = captured.ty.clone();
        let field = self.synthesize(elements, ty, name, VariableKind::Field, var_ty);
        if let Some(capture) = self
            .entries
            .entry(ty)
            .or_default()
            .captures
            .iter_mut()
            .find(|c| c.var == var)
        {
            capture.field = Some(field);
        }
        Ok(field)
    }
}
