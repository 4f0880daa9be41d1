//! Client-side board state: optimistic mutations layered over the last
//! confirmed read of a board, and the transport that confirms them.

use shared::domain::AccountId;

pub mod board_view;
pub mod boards;
pub mod dispatcher;
pub mod drag;
pub mod error;
pub mod reducer;
pub mod snapshot;
pub mod transport;

pub use dispatcher::{BoardSession, Dispatch, MutationRequest};
pub use error::{MutationError, StoreError};
pub use snapshot::{BoardSnapshot, ColumnSnapshot, ItemSnapshot};
pub use transport::{EntityStore, HttpEntityStore};

/// Who is signed in. `None` means nothing may be mutated.
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<AccountId>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<AccountId>);

impl StaticIdentity {
    pub fn signed_in(account_id: AccountId) -> Self {
        Self(Some(account_id))
    }

    pub fn signed_out() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<AccountId> {
        self.0.clone()
    }
}

#[cfg(test)]
#[path = "tests/fake_store.rs"]
mod fake_store;
