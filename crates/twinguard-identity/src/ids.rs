//! Access point and device identifiers.
//!
//! ## Validation Rules
//!
//! Access point ids:
//! - Length: 1-64 characters
//! - Allowed characters: alphanumeric (a-z, A-Z, 0-9), underscore (_), hyphen (-)
//!
//! Device ids are user-chosen names:
//! - Length: 1-64 characters, not only whitespace
//! - Any Unicode except control characters
//!
//! Identifiers arrive from the command transport, so they are validated once
//! at the boundary and carried as newtypes afterwards.

use serde::{Deserialize, Serialize};

use crate::{IdentityError, Result};

/// Maximum identifier length in characters.
pub const MAX_ID_LEN: usize = 64;

fn check_length(kind: &'static str, raw: &str) -> Result<()> {
    let len = raw.chars().count();
    if len == 0 || len > MAX_ID_LEN {
        return Err(IdentityError::InvalidId {
            kind,
            reason: format!("length must be 1-{} characters, got {}", MAX_ID_LEN, len),
        });
    }
    Ok(())
}

fn invalid_char(kind: &'static str, c: char) -> IdentityError {
    IdentityError::InvalidId {
        kind,
        reason: format!("invalid character {:?}", c),
    }
}

fn validate_ap(raw: &str) -> Result<()> {
    check_length("ap", raw)?;
    match raw
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        Some(c) => Err(invalid_char("ap", c)),
        None => Ok(()),
    }
}

fn validate_device(raw: &str) -> Result<()> {
    check_length("device", raw)?;
    if raw.trim().is_empty() {
        return Err(IdentityError::InvalidId {
            kind: "device",
            reason: "must not be blank".to_string(),
        });
    }
    match raw.chars().find(|c| c.is_control()) {
        Some(c) => Err(invalid_char("device", c)),
        None => Ok(()),
    }
}

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $validate:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a validated identifier.
            pub fn new(raw: &str) -> Result<Self> {
                $validate(raw)?;
                Ok(Self(raw.to_string()))
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdentityError;

            fn try_from(raw: String) -> Result<Self> {
                $validate(&raw)?;
                Ok(Self(raw))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdentityError;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

id_type!(
    /// Identifier of an access point, fixed (`AP1`) or guest (`AP1_guest_0003_2`).
    ApId,
    validate_ap
);

id_type!(
    /// Identifier of a device, chosen by the client on connect.
    DeviceId,
    validate_device
);

impl ApId {
    /// Identifier for the `index`-th guest of spawn batch `batch` near `target`.
    pub fn guest(target: &ApId, batch: u64, index: usize) -> Self {
        // Inputs are already valid and the suffix only adds [0-9a-f_].
        let mut raw = format!("{}_guest_{:04x}_{}", target.0, batch, index);
        raw.truncate(MAX_ID_LEN);
        Self(raw)
    }
}
