//! Lowering pipeline: TypedUnit -> resolved, devirtualized, sequenced TypedUnit
//!
//! Runs the lowering passes over a unit in their fixed order:
//! 1. Scope and capture resolution (fills and seals the capture registry)
//! 2. Devirtualization (optional)
//! 3. Evaluation-order repair (optional)
//!
//! Units share no state, so batches are lowered in parallel. A failing unit
//! reports its error without affecting the rest of the batch.

use log::{debug, info};
use rayon::prelude::*;

use crate::config::LoweringOptions;
use crate::error_codes;
use crate::lowering::{
    CaptureRegistry, Devirtualizer, LoweringError, LoweringPass, OuterReferenceResolver, PassResult,
    UnsequencedRewriter,
};
use crate::tast::TypedUnit;

/// Outcome of lowering one unit
#[derive(Debug, Clone)]
pub struct LoweringReport {
    pub unit: String,
    /// Sealed capture registry of the unit
    pub registry: CaptureRegistry,
    /// Per-pass results in execution order
    pub passes: Vec<(&'static str, PassResult)>,
}

impl LoweringReport {
    pub fn pass(&self, name: &str) -> Option<&PassResult> {
        self.passes
            .iter()
            .find(|(pass, _)| *pass == name)
            .map(|(_, result)| result)
    }

    pub fn modified(&self) -> bool {
        self.passes.iter().any(|(_, result)| result.modified)
    }

    /// Counters of every pass merged into one result
    pub fn totals(&self) -> PassResult {
        self.passes
            .iter()
            .fold(PassResult::unchanged(), |acc, (_, result)| acc.combine(result.clone()))
    }
}

/// Build the pass list the options enable, in pipeline order
fn passes(options: &LoweringOptions) -> Vec<Box<dyn LoweringPass>> {
    let mut passes: Vec<Box<dyn LoweringPass>> = vec![Box::new(OuterReferenceResolver::with_max_rounds(
        options.capture.max_collect_rounds,
    ))];
    if options.devirtualization.enabled {
        passes.push(Box::new(Devirtualizer::with_keep_virtual(
            options.devirtualization.keep_virtual.clone(),
        )));
    }
    if options.sequencing.extract_unsequenced {
        passes.push(Box::new(UnsequencedRewriter::new()));
    }
    passes
}

/// Lower one unit in place
pub fn lower_unit(unit: &mut TypedUnit, options: &LoweringOptions) -> Result<LoweringReport, LoweringError> {
    let span = tracing::debug_span!("lower_unit", unit = %unit.name);
    let _enter = span.enter();

    let mut registry = CaptureRegistry::new();
    let mut results = Vec::new();
    for mut pass in passes(options) {
        let name = pass.name();
        let pass_span = tracing::trace_span!("pass", pass = name);
        let _pass_enter = pass_span.enter();

        let ids_before = unit.expression_ids.count();
        let result = pass.run_on_unit(unit, &mut registry)?;
        if result.modified {
            debug!(
                "{}: {} modified unit ({} new node(s)): {:?}",
                unit.name,
                name,
                unit.expression_ids.count() - ids_before,
                result.stats
            );
        } else {
            debug!("{}: {} left unit unchanged", unit.name, name);
        }
        results.push((name, result));
    }

    Ok(LoweringReport {
        unit: unit.name.clone(),
        registry,
        passes: results,
    })
}

/// Lower a batch of units in parallel
///
/// Returns one result per unit, in input order.
pub fn lower_units(
    units: &mut [TypedUnit],
    options: &LoweringOptions,
) -> Result<Vec<Result<LoweringReport, LoweringError>>, LoweringError> {
    let run = |units: &mut [TypedUnit]| -> Vec<Result<LoweringReport, LoweringError>> {
        units
            .par_iter_mut()
            .map(|unit| lower_unit(unit, options))
            .collect()
    };

    let results = match options.pipeline.jobs {
        Some(jobs) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build()
                .map_err(|e| LoweringError::Config {
                    code: error_codes::CONFIG_INVALID_VALUE,
                    message: format!("cannot start {} worker threads: {}", jobs, e),
                })?;
            pool.install(|| run(units))
        }
        None => run(units),
    };

    let failed = results.iter().filter(|result| result.is_err()).count();
    info!(
        "lowered {} unit(s), {} failed",
        results.len() - failed,
        failed
    );
    Ok(results)
}
