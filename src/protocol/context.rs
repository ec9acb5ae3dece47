//! Per-connection context handed to the protocol handler.

use std::path::PathBuf;

use crate::accounts::{AccountId, AccountRoot};
use crate::protocol::identity::PeerIdentity;

/// The resolved account a connection is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountHandle {
    /// Numeric account id.
    pub id: AccountId,
    /// Root directory of the account's storage.
    pub root: PathBuf,
    /// Disc set the account is assigned to.
    pub disc_set: u32,
}

/// State bound to one accepted connection.
///
/// Carries the resolved account when it exists; otherwise the context stays
/// unauthenticated and the protocol handler must reject requests that need
/// an account. The connection is not dropped outright: some operations
/// (account creation, for one) are valid without a pre-existing account.
#[derive(Debug)]
pub struct ConnectionContext {
    identity: PeerIdentity,
    account: Option<AccountHandle>,
}

impl ConnectionContext {
    /// Context for a connection whose account exists.
    pub fn authenticated(identity: PeerIdentity, root: AccountRoot) -> Self {
        Self {
            identity,
            account: Some(AccountHandle {
                id: identity.account_id(),
                root: root.path,
                disc_set: root.disc_set,
            }),
        }
    }

    /// Context for a valid identity with no matching account.
    pub fn unauthenticated(identity: PeerIdentity) -> Self {
        Self {
            identity,
            account: None,
        }
    }

    /// The peer identity this connection presented.
    pub fn identity(&self) -> PeerIdentity {
        self.identity
    }

    /// The resolved account, if one exists.
    pub fn account(&self) -> Option<&AccountHandle> {
        self.account.as_ref()
    }

    /// Whether an account was resolved for this connection.
    pub fn has_account(&self) -> bool {
        self.account.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_context_has_no_account() {
        let identity = PeerIdentity::parse("BACKUP-42").unwrap();
        let ctx = ConnectionContext::unauthenticated(identity);
        assert!(!ctx.has_account());
        assert!(ctx.account().is_none());
        assert_eq!(ctx.identity(), identity);
    }

    #[test]
    fn authenticated_context_carries_root() {
        let identity = PeerIdentity::parse("BACKUP-42").unwrap();
        let root = AccountRoot {
            path: PathBuf::from("/srv/backstore/42"),
            disc_set: 3,
        };
        let ctx = ConnectionContext::authenticated(identity, root);
        let account = ctx.account().unwrap();
        assert_eq!(account.id, AccountId::new(0x42));
        assert_eq!(account.root, PathBuf::from("/srv/backstore/42"));
        assert_eq!(account.disc_set, 3);
    }
}
