//! Semantic lowering passes
//!
//! Three passes rewrite a bound unit toward the target object model:
//!
//! ```text
//! TypedUnit → OuterReferenceResolver → Devirtualizer → UnsequencedRewriter
//!                    │
//!                    └→ CaptureRegistry (read by later consumers)
//! ```
//!
//! The passes never call each other. They share the tree, the element
//! table, and the registry produced by capture resolution.

use std::fmt;

use indexmap::IndexMap;

use crate::error_codes::{self, ErrorCode};
use crate::tast::TypedUnit;

pub mod access_ledger;
pub mod capture;
pub mod devirtualize;
pub mod outer_resolver;
pub mod scope;
pub mod sequencing;

pub use capture::{CaptureEntry, CaptureRegistry, LocalCapture};
pub use devirtualize::Devirtualizer;
pub use outer_resolver::OuterReferenceResolver;
pub use sequencing::UnsequencedRewriter;

/// A lowering pass over one unit
pub trait LoweringPass {
    /// Get the name of this pass
    fn name(&self) -> &'static str;

    /// Run the pass, reading or filling the unit's capture registry
    fn run_on_unit(
        &mut self,
        unit: &mut TypedUnit,
        registry: &mut CaptureRegistry,
    ) -> Result<PassResult, LoweringError>;
}

/// Result of a lowering pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassResult {
    /// Whether the unit was modified
    pub modified: bool,

    /// Named rewrite counters
    pub stats: IndexMap<&'static str, usize>,
}

impl PassResult {
    pub fn unchanged() -> Self {
        Self::default()
    }

    /// Count one rewrite of the given kind
    pub fn record(&mut self, key: &'static str) {
        self.modified = true;
        *self.stats.entry(key).or_insert(0) += 1;
    }

    pub fn stat(&self, key: &str) -> usize {
        self.stats.get(key).copied().unwrap_or(0)
    }

    pub fn combine(mut self, other: PassResult) -> Self {
        self.modified |= other.modified;
        for (key, value) in other.stats {
            *self.stats.entry(key).or_insert(0) += value;
        }
        self
    }
}

/// Errors raised while lowering a unit
#[derive(Debug, Clone, PartialEq)]
pub enum LoweringError {
    /// The input tree or a pass broke an invariant; the unit is abandoned
    InternalInvariant {
        code: u16,
        pass: &'static str,
        message: String,
    },

    /// Configuration could not be loaded
    Config { code: u16, message: String },

    /// A unit could not be read or decoded
    Input {
        code: u16,
        unit: String,
        message: String,
    },
}

impl LoweringError {
    pub fn internal(code: u16, pass: &'static str, message: impl Into<String>) -> Self {
        Self::InternalInvariant {
            code,
            pass,
            message: message.into(),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            LoweringError::InternalInvariant { code, .. }
            | LoweringError::Config { code, .. }
            | LoweringError::Input { code, .. } => *code,
        }
    }

    pub fn error_code(&self) -> Option<&'static ErrorCode> {
        error_codes::get_error_code(self.code())
    }
}

impl fmt::Display for LoweringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoweringError::InternalInvariant {
                code,
                pass,
                message,
            } => write!(
                f,
                "{} internal error in {}: {}",
                error_codes::format_error_code(*code),
                pass,
                message
            ),
            LoweringError::Config { code, message } => {
                write!(f, "{} {}", error_codes::format_error_code(*code), message)
            }
            LoweringError::Input {
                code,
                unit,
                message,
            } => write!(
                f,
                "{} {}: {}",
                error_codes::format_error_code(*code),
                unit,
                message
            ),
        }
    }
}

impl std::error::Error for LoweringError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_result_combines_counters() {
        let mut first = PassResult::unchanged();
        first.record("paths");
        let mut second = PassResult::unchanged();
        second.record("paths");
        second.record("captures");

        let combined = first.combine(second);
        assert!(combined.modified);
        assert_eq!(combined.stat("paths"), 2);
        assert_eq!(combined.stat("captures"), 1);
        assert_eq!(combined.stat("missing"), 0);
    }

    #[test]
    fn test_internal_error_display_carries_code() {
        let err = LoweringError::internal(
            error_codes::BROKEN_NESTING_CHAIN,
            "outer-resolver",
            "no frame for Outer",
        );
        assert_eq!(
            err.to_string(),
            "E9101 internal error in outer-resolver: no frame for Outer"
        );
        assert_eq!(err.error_code().map(|c| c.category), Some("Capture"));
    }
}
