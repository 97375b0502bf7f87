//! Internal computation faults.
//!
//! Missing or malformed upstream data is never an error in this crate; it
//! short-circuits to a reduced-capability result. `EngineError` covers only
//! unexpected internal faults, and is caught at the engine boundary where it
//! degrades to "no significance result" with a log line.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A floating-point degeneracy produced a non-finite aggregate.
    #[error("non-finite {stat} in {scope} aggregate")]
    NonFiniteStatistic {
        scope: &'static str,
        stat: &'static str,
    },

    /// A p-value escaped the unit interval.
    #[error("p-value {value} out of [0, 1] in {scope} aggregate")]
    PValueOutOfRange { scope: &'static str, value: f64 },
}
