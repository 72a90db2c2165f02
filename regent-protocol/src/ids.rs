//! Opaque identifiers shared between the orchestrator, its controllers and
//! remote nodes.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a managed service (an application with its own start/stop lifecycle)
    ServiceId
);

string_id!(
    /// Identifier of a cluster node. Equality is exact.
    NodeId
);

string_id!(
    /// Name of an operating mode
    Mode
);

/// Name of the bootstrap mode every orchestrator starts in
pub const PROTECTED_MODE: &str = "protected";

impl Mode {
    /// The distinguished, maximally restrictive bootstrap mode
    pub fn protected() -> Self {
        Self::new(PROTECTED_MODE)
    }

    pub fn is_protected(&self) -> bool {
        self.0 == PROTECTED_MODE
    }
}
