//! Typed ID wrappers for things, traits, properties, methods, and primitives.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed ID wrappers prevent mixing up a trait's short id with a thing id,
/// a primitive id, and so on. These are just strings underneath: Splot
/// doesn't mandate a format or a UUID scheme for any of them.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed ID from anything that converts to String.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(ThingId, "Unique identifier for a thing.");
typed_id!(TraitId, "Short identifier for a trait (e.g. `onof`, `levl`).");
typed_id!(PropId, "Short identifier for a property within a trait.");
typed_id!(MethodId, "Short identifier for a method within a trait.");
typed_id!(PrimitiveId, "Unique identifier for a Pairing, Rule, or Timer.");
