pub mod config;
pub mod error_codes;
pub mod logging;
pub mod lowering;
pub mod pipeline;
pub mod tast;

pub use config::LoweringOptions;
pub use lowering::{CaptureRegistry, LoweringError, PassResult};
pub use pipeline::{lower_unit, lower_units, LoweringReport};
