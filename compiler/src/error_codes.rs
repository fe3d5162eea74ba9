//! Error Code Registry for the lowering middle end
//!
//! Every error the lowering passes or the driver can produce carries a
//! numeric code from this registry.
//!
//! # Error Code Ranges
//!
//! - E8000-E8999: Configuration and input errors
//! - E9000-E9999: Internal invariant violations
//!
//! # Subcategory Organization
//!
//! Within the internal range, the hundreds digit names the pass:
//! - 1: Scope and capture resolution
//! - 2: Devirtualization
//! - 3: Evaluation-order repair

use std::collections::HashMap;
use std::fmt;

pub const BROKEN_NESTING_CHAIN: u16 = 9101;
pub const NO_ENCLOSING_INSTANCE: u16 = 9102;
pub const REGISTRY_SEALED: u16 = 9103;
pub const CAPTURES_DID_NOT_CONVERGE: u16 = 9104;
pub const VARIABLE_NOT_IN_SCOPE: u16 = 9105;
pub const MISSING_METHOD_BODY: u16 = 9201;
pub const EXTRACTION_TARGET_MISSING: u16 = 9301;
pub const UNEXPECTED_CONDITIONAL: u16 = 9302;

pub const CONFIG_PARSE_FAILED: u16 = 8001;
pub const CONFIG_INVALID_VALUE: u16 = 8002;
pub const UNIT_READ_FAILED: u16 = 8101;
pub const UNIT_DECODE_FAILED: u16 = 8102;
pub const UNIT_ALREADY_RESOLVED: u16 = 8103;

/// Error code struct containing the numeric code and human-readable description
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// The numeric error code (e.g., 9101)
    pub code: u16,
    /// Human-readable error category
    pub category: &'static str,
    /// Brief description of what this error means
    pub description: &'static str,
    /// Optional help text
    pub help: Option<&'static str>,
}

impl ErrorCode {
    pub const fn new(
        code: u16,
        category: &'static str,
        description: &'static str,
        help: Option<&'static str>,
    ) -> Self {
        Self {
            code,
            category,
            description,
            help,
        }
    }

    /// Format the error code as "E{code:04}" (e.g., "E9101")
    pub fn format_code(&self) -> String {
        format!("E{:04}", self.code)
    }

    pub fn is_internal(&self) -> bool {
        self.code >= 9000
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]: {}",
            self.format_code(),
            self.category,
            self.description
        )
    }
}

/// Registry containing all defined error codes
pub struct ErrorCodeRegistry {
    codes: HashMap<u16, ErrorCode>,
}

impl ErrorCodeRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            codes: HashMap::new(),
        };
        registry.register_all_codes();
        registry
    }

    pub fn get(&self, code: u16) -> Option<&ErrorCode> {
        self.codes.get(&code)
    }

    fn register(&mut self, error_code: ErrorCode) {
        self.codes.insert(error_code.code, error_code);
    }

    fn register_all_codes(&mut self) {
        // ===== CONFIGURATION AND INPUT (E8000-E8999) =====
        self.register(ErrorCode::new(
            CONFIG_PARSE_FAILED,
            "Config",
            "Lowering configuration could not be parsed",
            Some("Check the TOML syntax and section names"),
        ));
        self.register(ErrorCode::new(
            CONFIG_INVALID_VALUE,
            "Config",
            "Invalid configuration value",
            Some("keep-virtual entries use the form name/arity, e.g. equals/1"),
        ));
        self.register(ErrorCode::new(
            UNIT_READ_FAILED,
            "Input",
            "Typed unit could not be read",
            None,
        ));
        self.register(ErrorCode::new(
            UNIT_DECODE_FAILED,
            "Input",
            "Typed unit is not valid JSON for the expected schema",
            Some("Units must be produced by a front end of the same version"),
        ));
        self.register(ErrorCode::new(
            UNIT_ALREADY_RESOLVED,
            "Input",
            "Unit already carries resolved outer and capture variables",
            Some("Lower the bound unit from the front end, or rerun resolution with the sealed registry of the first run"),
        ));

        // ===== INTERNAL INVARIANTS (E9000-E9999) =====
        // Scope and capture resolution (E9100-E9199)
        self.register(ErrorCode::new(
            BROKEN_NESTING_CHAIN,
            "Capture",
            "No enclosing scope matches the required outer type",
            Some("The nesting chain of the input tree is inconsistent with its elements"),
        ));
        self.register(ErrorCode::new(
            NO_ENCLOSING_INSTANCE,
            "Capture",
            "Type has no enclosing instance to reference",
            Some("An outer reference was requested from a static context"),
        ));
        self.register(ErrorCode::new(
            REGISTRY_SEALED,
            "Capture",
            "Capture registry modified after capture sets were final",
            None,
        ));
        self.register(ErrorCode::new(
            CAPTURES_DID_NOT_CONVERGE,
            "Capture",
            "Capture collection did not reach a fixed point",
            None,
        ));
        self.register(ErrorCode::new(
            VARIABLE_NOT_IN_SCOPE,
            "Capture",
            "Local variable referenced outside of its declaring scope",
            None,
        ));

        // Devirtualization (E9200-E9299)
        self.register(ErrorCode::new(
            MISSING_METHOD_BODY,
            "Devirtualize",
            "Functionized method has no body",
            None,
        ));

        // Evaluation-order repair (E9300-E9399)
        self.register(ErrorCode::new(
            EXTRACTION_TARGET_MISSING,
            "Sequencing",
            "Recorded access no longer present in the expression",
            None,
        ));
        self.register(ErrorCode::new(
            UNEXPECTED_CONDITIONAL,
            "Sequencing",
            "Conditional extraction reached a non-conditional node",
            None,
        ));
    }
}

impl Default for ErrorCodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static REGISTRY: std::sync::OnceLock<ErrorCodeRegistry> = std::sync::OnceLock::new();

/// Get the global error code registry
pub fn error_registry() -> &'static ErrorCodeRegistry {
    REGISTRY.get_or_init(ErrorCodeRegistry::new)
}

pub fn get_error_code(code: u16) -> Option<&'static ErrorCode> {
    error_registry().get(code)
}

/// Helper function to format error code string (e.g., 9101 -> "E9101")
pub fn format_error_code(code: u16) -> String {
    format!("E{:04}", code)
}
