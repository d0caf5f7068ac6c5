#![deny(missing_docs)]
//! # splot — umbrella crate
//!
//! Single import surface for the Splot in-band automation engine.
//! Re-exports the per-concern crates behind feature flags, plus a
//! `prelude` for the happy path.

#[cfg(feature = "core")]
pub use splot_core;

#[cfg(feature = "sae")]
pub use splot_sae;

#[cfg(feature = "automation")]
pub use splot_automation;

/// Happy-path imports for composing Splot systems.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use splot_core::{
        Clock, Env, ListenerId, MethodId, MethodKey, Modifier, PrimitiveId, PropId,
        PropertyFlags, PropertyKey, PropertySchema, ResourceLink, ResourceLinkManager,
        RestClient, RtcSnapshot, Section, SystemClock, Thing, ThingId, TraitId, TraitImpl,
        Value, ValueType,
    };

    #[cfg(feature = "sae")]
    pub use splot_sae::{compile, run, Context, Opcode, SaeError};

    #[cfg(feature = "automation")]
    pub use splot_automation::{
        generate_id, ActionDispatcher, ActionMethod, ActionSpec, AutomationManager, ConditionSpec,
        MatchMode, Pairing, PairingConfig, Rule, RuleConfig, SyncMode, Timer, TimerConfig,
        TimerState,
    };
}
