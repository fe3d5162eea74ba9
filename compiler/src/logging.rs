//! Logging for the lowering passes
//!
//! Each pass logs under its own module target, shown without the crate
//! prefix:
//!
//! ```text
//! [DEBUG lowering::outer_resolver] Main: capture sets settled after 2 collect round(s), 3 capturing type(s)
//! [WARN  lowering::sequencing] unsequenced-rewriter: for-loop update has unsequenced accesses ...
//! ```
//!
//! The driver picks the level from its `-v` count; `RUST_LOG` directives
//! are applied on top, so a single pass can be traced:
//!
//! ```bash
//! lowerc -v Main.json
//! RUST_LOG=compiler::lowering::sequencing=trace lowerc Main.json
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

const CRATE_PREFIX: &str = "compiler::";

/// Level for a count of `-v` flags: warnings by default, then info
/// (batch summary), debug (per unit and pass) and trace (every rewrite)
pub fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Module target without the crate prefix
pub fn short_target(target: &str) -> &str {
    target.strip_prefix(CRATE_PREFIX).unwrap_or(target)
}

/// Install the logger for the driver. Later calls are no-ops.
pub fn init(verbosity: u8) {
    INIT.call_once(|| {
        let mut builder = Builder::new();
        builder.filter_level(level_for_verbosity(verbosity));
        if let Ok(directives) = std::env::var("RUST_LOG") {
            builder.parse_filters(&directives);
        }
        builder.format(|buf, record| {
            writeln!(
                buf,
                "[{:5} {}] {}",
                record.level(),
                short_target(record.target()),
                record.args()
            )
        });
        let _ = builder.try_init();
    });
}

/// Logger for tests; output is captured by the harness
pub fn init_test() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .is_test(true)
        .try_init();
}
