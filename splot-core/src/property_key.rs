//! Sections, property keys, method keys, and property flags.

use crate::error::CoreError;
use crate::id::{MethodId, PropId, TraitId};
use crate::value::ValueType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three property sections. Only `State` properties participate
/// in transitions and scenes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Section {
    /// Live, possibly-transitioning values (`s`).
    State,
    /// User-set configuration (`c`).
    Config,
    /// Read-only descriptive data (`m`).
    Metadata,
}

impl Section {
    /// Single-character wire prefix for this section.
    ///
    /// Note: an earlier Java implementation of this enum had a constructor
    /// bug that assigned `SECTION_CONFIG`'s prefix to every variant. This
    /// implementation does not reproduce that bug; each variant's prefix is
    /// distinct and callers may rely on it.
    pub fn short_code(self) -> &'static str {
        match self {
            Section::State => "s",
            Section::Config => "c",
            Section::Metadata => "m",
        }
    }

    /// Parse a wire section prefix back into a `Section`.
    pub fn parse(code: &str) -> Result<Section, CoreError> {
        match code {
            "s" => Ok(Section::State),
            "c" => Ok(Section::Config),
            "m" => Ok(Section::Metadata),
            other => Err(CoreError::InvalidValue(format!(
                "unknown section prefix: {other}"
            ))),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_code())
    }
}

/// Flags governing how a property may be read, written, and observed.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct PropertyFlags {
    /// Readable via fetch.
    pub get: bool,
    /// Writable via invoke/set.
    pub set: bool,
    /// Emits a change-notify listener event on write.
    pub change_notify: bool,
    /// `get` must succeed for the thing to be considered healthy.
    pub get_required: bool,
    /// `set` must succeed for the thing to be considered healthy.
    pub set_required: bool,
    /// Writing `null` resets the property to its default.
    pub reset: bool,
    /// Excluded from persistent-state snapshots.
    pub no_save: bool,
    /// Exempt from the transition engine even if in the `State` section.
    pub no_transition: bool,
    /// Rejects the `increment` modifier.
    pub no_increment: bool,
}

impl PropertyFlags {
    /// A read-only property: gettable, change-notifying, nothing else.
    pub fn read_only() -> Self {
        PropertyFlags {
            get: true,
            set: false,
            change_notify: true,
            get_required: false,
            set_required: false,
            reset: false,
            no_save: false,
            no_transition: false,
            no_increment: false,
        }
    }

    /// A read-write property: gettable, settable, change-notifying.
    pub fn read_write() -> Self {
        PropertyFlags {
            get: true,
            set: true,
            change_notify: true,
            get_required: false,
            set_required: false,
            reset: false,
            no_save: false,
            no_transition: false,
            no_increment: false,
        }
    }

    /// A write-only property: settable but never gettable.
    pub fn write_only() -> Self {
        PropertyFlags {
            get: false,
            set: true,
            change_notify: false,
            get_required: false,
            set_required: false,
            reset: false,
            no_save: false,
            no_transition: false,
            no_increment: false,
        }
    }

    /// A constant: gettable, never settable, never changes.
    pub fn constant() -> Self {
        PropertyFlags {
            get: true,
            set: false,
            change_notify: false,
            get_required: false,
            set_required: false,
            reset: false,
            no_save: true,
            no_transition: true,
            no_increment: true,
        }
    }

    /// An enumerated property: read-write, but never transitions and never
    /// accepts `increment`.
    pub fn enum_flags() -> Self {
        PropertyFlags {
            get: true,
            set: true,
            change_notify: true,
            get_required: false,
            set_required: false,
            reset: false,
            no_save: false,
            no_transition: true,
            no_increment: true,
        }
    }
}

/// A property's full identity: which section, which trait, which name,
/// under what declared type.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PropertyKey {
    /// Section this property lives in.
    pub section: Section,
    /// Short id of the owning trait.
    pub trait_id: TraitId,
    /// Short id of the property within the trait.
    pub prop_id: PropId,
    /// Declared value type.
    pub value_type: ValueType,
}

impl PropertyKey {
    /// Well-known section prefix constants, per the spec's resolution of
    /// the `Section.prefix` ambiguity: code must key off these string
    /// constants, never off a derived `Section::short_code` lookup table
    /// that could be miswired.
    pub const SECTION_STATE: &'static str = "s";
    /// See [`PropertyKey::SECTION_STATE`].
    pub const SECTION_CONFIG: &'static str = "c";
    /// See [`PropertyKey::SECTION_STATE`].
    pub const SECTION_METADATA: &'static str = "m";

    /// Build a new property key.
    pub fn new(section: Section, trait_id: TraitId, prop_id: PropId, value_type: ValueType) -> Self {
        PropertyKey {
            section,
            trait_id,
            prop_id,
            value_type,
        }
    }

    /// Canonical wire string: `<section>/<trait>/<prop>`.
    pub fn canonical(&self) -> String {
        format!(
            "{}/{}/{}",
            self.section.short_code(),
            self.trait_id.as_str(),
            self.prop_id.as_str()
        )
    }

    /// Parse a canonical `<section>/<trait>/<prop>` string. The declared
    /// type cannot be recovered from the wire form alone, so the caller
    /// must supply it (typically looked up from the thing's trait schema).
    pub fn parse(s: &str, value_type: ValueType) -> Result<PropertyKey, CoreError> {
        let mut parts = s.splitn(3, '/');
        let (Some(section), Some(trait_id), Some(prop_id)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(CoreError::InvalidValue(format!(
                "malformed property key: {s}"
            )));
        };
        Ok(PropertyKey::new(
            Section::parse(section)?,
            TraitId::new(trait_id),
            PropId::new(prop_id),
            value_type,
        ))
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// A method's identity: `(trait, method)`, rendered as `f/<trait>?<method>`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MethodKey {
    /// Short id of the owning trait.
    pub trait_id: TraitId,
    /// Short id of the method within the trait.
    pub method_id: MethodId,
}

impl MethodKey {
    /// Build a new method key.
    pub fn new(trait_id: TraitId, method_id: MethodId) -> Self {
        MethodKey { trait_id, method_id }
    }

    /// Canonical wire string: `f/<trait>?<method>`.
    pub fn canonical(&self) -> String {
        format!("f/{}?{}", self.trait_id.as_str(), self.method_id.as_str())
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_prefixes_are_distinct() {
        assert_ne!(Section::State.short_code(), Section::Config.short_code());
        assert_ne!(Section::State.short_code(), Section::Metadata.short_code());
        assert_ne!(Section::Config.short_code(), Section::Metadata.short_code());
    }

    #[test]
    fn property_key_round_trips_canonical_form() {
        let key = PropertyKey::new(
            Section::State,
            TraitId::new("onof"),
            PropId::new("v"),
            ValueType::Bool,
        );
        assert_eq!(key.canonical(), "s/onof/v");
        let parsed = PropertyKey::parse(&key.canonical(), ValueType::Bool).unwrap();
        assert_eq!(parsed.section, key.section);
        assert_eq!(parsed.trait_id, key.trait_id);
        assert_eq!(parsed.prop_id, key.prop_id);
    }

    #[test]
    fn method_key_canonical_form() {
        let mk = MethodKey::new(TraitId::new("pmgr"), MethodId::new("create"));
        assert_eq!(mk.canonical(), "f/pmgr?create");
    }
}
