//! The variable bindings a program executes against.

use splot_core::{RtcSnapshot, Value};

/// Variable bindings bound into one SAE evaluation: the propagated value
/// and its predecessor, the owning primitive's fire count, and the
/// real-time-clock snapshot.
///
/// `v`/`v_l` carry the full heterogeneous [`Value`] a resource link
/// propagated (text, array, map, ...), not just a number — a transform
/// that reads `v` off a non-numeric resource must see that value, not a
/// silently-coerced `0.0`.
#[derive(Debug, Clone)]
pub struct Context {
    /// Current propagated value, bound to `v`.
    pub v: Value,
    /// Previous propagated value, bound to `v_l`.
    pub v_l: Value,
    /// Times the owning primitive has fired since last reset, bound to `c`.
    pub c: f64,
    /// Real-time-clock snapshot, bound to `rtc.*`.
    pub rtc: RtcSnapshot,
}

impl Context {
    /// Build a context binding `v`/`v_l` to the given values.
    pub fn new(v: Value, v_l: Value, c: f64, rtc: RtcSnapshot) -> Self {
        Context { v, v_l, c, rtc }
    }
}
