//! # splot-core — data model and resource-link protocol for Splot
//!
//! Splot is a framework for uniform monitoring, control, and in-band
//! automation of networked "things." This crate owns the parts that don't
//! change with the transport: the dynamic [`Value`], property/method keys,
//! the [`Thing`] container with its transition engine, and the
//! [`ResourceLink`] abstraction through which automation primitives in
//! `splot-automation` observe and mutate values without caring whether they
//! live in this process or across the network.
//!
//! ## Design principle
//!
//! Every protocol trait here is operation-defined, not mechanism-defined.
//! [`ResourceLink::fetch`] means "get the current value" — not "send a
//! CoAP GET." The wire codec, persistence, and discovery live outside this
//! crate entirely; it only consumes [`ResourceLinkManager`], [`RestClient`],
//! and [`Clock`].

#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod id;
pub mod links;
pub mod modifier;
pub mod property_key;
pub mod resource_link;
pub mod thing;
pub mod transition;
pub mod uri;
pub mod value;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use env::{Clock, Env, RtcSnapshot, SystemClock};
pub use error::CoreError;
pub use id::{MethodId, PrimitiveId, PropId, ThingId, TraitId};
pub use links::{NativeUriResourceLink, PropertyResourceLink, SectionResourceLink};
pub use modifier::Modifier;
pub use property_key::{MethodKey, PropertyFlags, PropertyKey, Section};
pub use resource_link::{ListenerId, ResourceLink, ResourceLinkManager, RestClient};
pub use thing::{PropertySchema, Thing, TraitImpl};
pub use uri::get_relative;
pub use value::{Value, ValueType};
