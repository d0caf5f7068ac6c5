//! Modifier query strings attached to property fetches and writes.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};

/// Parameter keys recognized in a modifier query string.
///
/// `PARAM_ACTION_SYNC` and `PARAM_ACTION_BODY` collided on the wire key
/// `"b"` in an earlier revision of this schema; that has been fixed here to
/// distinct keys (`"b"` for body, `"y"` for sync) per the spec's own
/// suggested resolution.
pub mod keys {
    /// Transition duration, non-negative seconds.
    pub const DURATION: &str = "d";
    /// Request the post-transition value rather than the current one.
    pub const TRANSITION_TARGET: &str = "tt";
    /// Request all properties (section-link fetch).
    pub const ALL: &str = "all";
    /// Apply the write as a numeric increment rather than a replace.
    pub const INCREMENT: &str = "inc";
    /// Apply the write as a numeric decrement.
    pub const DECREMENT: &str = "dec";
    /// Apply the write as a boolean toggle.
    pub const TOGGLE: &str = "tog";
    /// Apply the write as an array insert.
    pub const INSERT: &str = "ins";
    /// Apply the write as an array remove.
    pub const REMOVE: &str = "rem";
    /// Action-list entry body (distinct from the sync key; see module docs).
    pub const ACTION_BODY: &str = "b";
    /// Action-list entry sync mode (distinct from the body key).
    pub const ACTION_SYNC: &str = "y";
}

/// A parsed set of modifiers attached to a property read or write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    /// Transition duration in seconds, if present.
    pub duration: Option<f64>,
    /// Request the post-transition value.
    pub transition_target: bool,
    /// Request all properties.
    pub all: bool,
    /// Apply as increment.
    pub increment: bool,
    /// Apply as decrement.
    pub decrement: bool,
    /// Apply as toggle.
    pub toggle: bool,
    /// Apply as insert.
    pub insert: bool,
    /// Apply as remove.
    pub remove: bool,
}

impl Modifier {
    /// True if no modifier flags or values are set.
    pub fn is_empty(&self) -> bool {
        self == &Modifier::default()
    }

    /// Parse a modifier query string of the form `key[=value]&key[=value]`.
    pub fn parse(query: &str) -> Result<Modifier, CoreError> {
        let mut m = Modifier::default();
        if query.is_empty() {
            return Ok(m);
        }
        for part in query.split('&') {
            if part.is_empty() {
                continue;
            }
            let mut kv = part.splitn(2, '=');
            let key = kv.next().unwrap_or_default();
            let value = kv.next();
            match key {
                keys::DURATION => {
                    let raw = value.ok_or_else(|| {
                        CoreError::InvalidModifier("duration requires a value".into())
                    })?;
                    let d: f64 = raw.parse().map_err(|_| {
                        CoreError::InvalidModifier(format!("malformed duration: {raw}"))
                    })?;
                    if d < 0.0 {
                        return Err(CoreError::InvalidModifier(format!(
                            "negative duration: {d}"
                        )));
                    }
                    m.duration = Some(d);
                }
                keys::TRANSITION_TARGET => m.transition_target = true,
                keys::ALL => m.all = true,
                keys::INCREMENT => m.increment = true,
                keys::DECREMENT => m.decrement = true,
                keys::TOGGLE => m.toggle = true,
                keys::INSERT => m.insert = true,
                keys::REMOVE => m.remove = true,
                other => {
                    return Err(CoreError::InvalidModifierList(format!(
                        "unrecognized modifier key: {other}"
                    )));
                }
            }
        }
        Ok(m)
    }

    /// Render back to a modifier query string. Key order matches the order
    /// fields are declared in this struct, which is stable and matches the
    /// spec's worked example (`d=2.00&tt&all`).
    pub fn to_query(&self) -> String {
        let mut parts = Vec::new();
        if let Some(d) = self.duration {
            parts.push(format!("{}={:.2}", keys::DURATION, d));
        }
        if self.transition_target {
            parts.push(keys::TRANSITION_TARGET.to_owned());
        }
        if self.all {
            parts.push(keys::ALL.to_owned());
        }
        if self.increment {
            parts.push(keys::INCREMENT.to_owned());
        }
        if self.decrement {
            parts.push(keys::DECREMENT.to_owned());
        }
        if self.toggle {
            parts.push(keys::TOGGLE.to_owned());
        }
        if self.insert {
            parts.push(keys::INSERT.to_owned());
        }
        if self.remove {
            parts.push(keys::REMOVE.to_owned());
        }
        parts.join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn worked_example_from_spec() {
        let m = Modifier {
            duration: Some(2.0),
            transition_target: true,
            all: true,
            ..Default::default()
        };
        assert_eq!(m.to_query(), "d=2.00&tt&all");
    }

    #[test]
    fn negative_duration_rejected() {
        assert!(Modifier::parse("d=-2").is_err());
    }

    #[test]
    fn action_body_and_sync_keys_are_distinct() {
        assert_ne!(keys::ACTION_BODY, keys::ACTION_SYNC);
    }

    proptest! {
        #[test]
        fn round_trip(
            d in proptest::option::of(0f64..1_000_000.0),
            tt in any::<bool>(), all in any::<bool>(),
            inc in any::<bool>(), dec in any::<bool>(),
            tog in any::<bool>(), ins in any::<bool>(), rem in any::<bool>(),
        ) {
            let m = Modifier {
                duration: d.map(|x| (x * 100.0).round() / 100.0),
                transition_target: tt, all, increment: inc, decrement: dec,
                toggle: tog, insert: ins, remove: rem,
            };
            let parsed = Modifier::parse(&m.to_query()).unwrap();
            prop_assert_eq!(parsed, m);
        }
    }
}
