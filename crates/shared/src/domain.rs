use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix reserved for ids minted locally before the store confirms a create.
///
/// Canonical ids are hyphenated uuids, which never contain a `:`, so the two
/// namespaces cannot collide.
pub const PROVISIONAL_PREFIX: &str = "provisional:";

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

macro_rules! string_id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Fresh canonical id, as assigned by the store.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn provisional(seq: u64) -> Self {
                Self(format!("{PROVISIONAL_PREFIX}{seq}"))
            }

            pub fn is_provisional(&self) -> bool {
                self.0.starts_with(PROVISIONAL_PREFIX)
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
    };
}

id_newtype!(BoardId);

string_id_newtype!(AccountId);
string_id_newtype!(ColumnId);
string_id_newtype!(ItemId);

pub const DEFAULT_BOARD_COLOR: &str = "#cbd5e1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
}
