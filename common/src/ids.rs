//! Prefixed opaque identifiers (`ws-...`, `org-...`, `task-...`, ...).
//!
//! Every identifier is generated here so that the prefix convention lives
//! in exactly one place; repositories never construct an id string by hand.

use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Generates a fresh id of the form `{prefix}-{uuid_v4}`.
pub fn generate(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

macro_rules! prefixed_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSql, FromSql,
        )]
        #[postgres(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn generate() -> Self {
                Self(generate($prefix))
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

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_string()))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

prefixed_id!(OrganizationId, "org");
prefixed_id!(WorkspaceId, "ws");
prefixed_id!(TaskId, "task");
prefixed_id!(UserId, "usr");
prefixed_id!(SessionId, "sess");
prefixed_id!(SubscriptionId, "sub");
prefixed_id!(InvoiceId, "inv");
prefixed_id!(UsageRecordId, "usage");
prefixed_id!(ProcessorEventId, "evt");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_their_prefix() {
        let id = WorkspaceId::generate();
        assert!(id.as_str().starts_with("ws-"));
    }

    #[test]
    fn ids_display_without_quoting() {
        let id = OrganizationId("org-abc".to_string());
        assert_eq!(id.to_string(), "org-abc");
    }
}
