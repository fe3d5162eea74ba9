//! Variable access ledger for one sequence-point root.
//!
//! Records every read and write of a trackable variable (simple names and
//! `this.f`) in evaluation order, together with the path from the root to
//! the access. Two accesses to the same variable, at least one a write, are
//! a hazard unless the language orders them:
//!
//! - both are the same node
//! - their lowest common ancestor is `?:`, `&&` or `||`
//! - one is an assignment and the other sits in its target, or is a plain
//!   read in its right-hand side
//!
//! Lambda and anonymous class bodies run later and are not part of a root.

use crate::tast::{Expression, ExpressionId, ExpressionKind, VariableId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeClass {
    Conditional,
    ShortCircuit,
    Assignment,
    Other,
}

/// One ancestor on the way from the root to an access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub node: ExpressionId,
    pub class: NodeClass,
    /// Which child of `node` the path continues into
    pub slot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
    /// The implicit read of a compound assignment target
    CompoundRead,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableAccess {
    pub var: VariableId,
    /// Node that performs the access; for writes, the assignment or
    /// increment node
    pub node: ExpressionId,
    pub kind: AccessKind,
    pub path: Vec<PathStep>,
}

impl VariableAccess {
    pub fn is_write(&self) -> bool {
        self.kind == AccessKind::Write
    }

    /// Step through `node` if the access lies below it
    pub fn step_through(&self, node: ExpressionId) -> Option<&PathStep> {
        self.path.iter().find(|step| step.node == node)
    }
}

#[derive(Debug, Default)]
pub struct AccessLedger {
    accesses: Vec<VariableAccess>,
}

impl AccessLedger {
    /// Collect accesses from roots evaluated left to right; constructor
    /// arguments are the one multi-root case
    pub fn collect<'e>(roots: impl IntoIterator<Item = &'e Expression>) -> Self {
        let mut ledger = Self::default();
        let mut path = Vec::new();
        for (index, root) in roots.into_iter().enumerate() {
            path.push(PathStep {
                node: ExpressionId::invalid(),
                class: NodeClass::Other,
                slot: index,
            });
            ledger.visit(root, &mut path);
            path.pop();
        }
        ledger
    }

    pub fn accesses(&self) -> &[VariableAccess] {
        &self.accesses
    }

    pub fn is_empty(&self) -> bool {
        self.accesses.is_empty()
    }

    fn record(&mut self, var: VariableId, node: ExpressionId, kind: AccessKind, path: &[PathStep]) {
        self.accesses.push(VariableAccess {
            var,
            node,
            kind,
            path: path.to_vec(),
        });
    }

    fn visit(&mut self, expr: &Expression, path: &mut Vec<PathStep>) {
        match &expr.kind {
            ExpressionKind::Assignment { op, target, value } => {
                let step = |slot| PathStep {
                    node: expr.id,
                    class: NodeClass::Assignment,
                    slot,
                };
                match target.tracked_variable() {
                    Some(var) => {
                        if op.is_compound() {
                            path.push(step(0));
                            self.record(var, target.id, AccessKind::CompoundRead, path);
                            path.pop();
                        }
                        path.push(step(1));
                        self.visit(value, path);
                        path.pop();
                        self.record(var, expr.id, AccessKind::Write, path);
                    }
                    None => {
                        path.push(step(0));
                        self.visit(target, path);
                        path.pop();
                        path.push(step(1));
                        self.visit(value, path);
                        path.pop();
                    }
                }
            }
            ExpressionKind::Unary { op, operand } if op.is_increment_or_decrement() => {
                match operand.tracked_variable() {
                    Some(var) => self.record(var, expr.id, AccessKind::Write, path),
                    None => self.visit_children(expr, NodeClass::Other, path),
                }
            }
            _ => {
                if let Some(var) = expr.tracked_variable() {
                    self.record(var, expr.id, AccessKind::Read, path);
                    return;
                }
                let class = match expr.kind {
                    ExpressionKind::Conditional { .. } => NodeClass::Conditional,
                    ExpressionKind::ShortCircuit { .. } => NodeClass::ShortCircuit,
                    _ => NodeClass::Other,
                };
                self.visit_children(expr, class, path);
            }
        }
    }

    fn visit_children(&mut self, expr: &Expression, class: NodeClass, path: &mut Vec<PathStep>) {
        for (slot, child) in expr.children().into_iter().enumerate() {
            path.push(PathStep {
                node: expr.id,
                class,
                slot,
            });
            self.visit(child, path);
            path.pop();
        }
    }

    /// Whether the language orders `a` and `b` relative to each other
    pub fn is_sequenced(a: &VariableAccess, b: &VariableAccess) -> bool {
        if a.node == b.node {
            return true;
        }
        if let Some(step) = b.step_through(a.node) {
            return Self::sequenced_below(step, b);
        }
        if let Some(step) = a.step_through(b.node) {
            return Self::sequenced_below(step, a);
        }
        match a.path.iter().zip(&b.path).find(|(x, y)| x != y) {
            Some((divergence, _)) => matches!(
                divergence.class,
                NodeClass::Conditional | NodeClass::ShortCircuit
            ),
            None => false,
        }
    }

    /// `step` is the ancestor access's own node on the descendant's path
    fn sequenced_below(step: &PathStep, descendant: &VariableAccess) -> bool {
        step.class == NodeClass::Assignment && (step.slot == 0 || !descendant.is_write())
    }

    /// Accesses taking part in at least one unordered pair with a write,
    /// in ledger order
    pub fn unsequenced(&self) -> Vec<VariableAccess> {
        let mut hazardous = vec![false; self.accesses.len()];
        for (i, a) in self.accesses.iter().enumerate() {
            for (j, b) in self.accesses.iter().enumerate().skip(i + 1) {
                if a.var != b.var || !(a.is_write() || b.is_write()) {
                    continue;
                }
                if !Self::is_sequenced(a, b) {
                    hazardous[i] = true;
                    hazardous[j] = true;
                }
            }
        }
        self.accesses
            .iter()
            .zip(hazardous)
            .filter(|(_, hazard)| *hazard)
            .map(|(access, _)| access.clone())
            .collect()
    }
}
