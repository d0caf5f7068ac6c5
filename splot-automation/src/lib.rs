//! # splot-automation — in-band automation primitives for Splot
//!
//! Three primitives sit on top of `splot-core`'s `Thing`/`ResourceLink`
//! model and `splot-sae`'s expression language:
//!
//! - [`pairing::Pairing`] mirrors a value between two resource links,
//!   optionally through forward/reverse SAE transforms.
//! - [`rule::Rule`] watches a set of conditions and dispatches an action
//!   list when their `ALL`/`ANY` aggregate goes true.
//! - [`timer::Timer`] runs a schedule/predicate state machine, dispatching
//!   actions on each qualifying fire.
//!
//! All three share [`action::ActionDispatcher`] for honoring an action
//! list's `sync` semantics, and [`manager::AutomationManager`] for
//! lifecycle and persistence.

#![deny(missing_docs)]

pub mod action;
pub mod error;
pub mod manager;
pub mod pairing;
pub mod rule;
pub mod snapshot;
pub mod timer;

pub use action::{ActionDispatcher, ActionMethod, ActionSpec, DispatchGate, InvocationStats, SyncMode};
pub use error::AutomationError;
pub use manager::{generate_id, AutomationManager};
pub use pairing::{Pairing, PairingConfig};
pub use rule::{ConditionSpec, MatchMode, Rule, RuleConfig};
pub use snapshot::{ActionSnapshot, ConditionSnapshot, PairingSnapshot, RuleSnapshot, TimerSnapshot};
pub use timer::{Timer, TimerConfig, TimerState};
