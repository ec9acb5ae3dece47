//! Peer identity: mapping certificate common names to accounts.

use crate::accounts::AccountId;

/// Prefix every store client certificate carries in its common name.
const IDENTITY_PREFIX: &str = "BACKUP-";

/// The account-identifying string extracted from a client certificate.
///
/// Wire form is `BACKUP-<hex-account-id>`, matched case-insensitively.
/// Anything else is "no identity": scanners and stray clients present all
/// sorts of certificates, so a malformed name is an expected, quiet event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerIdentity {
    account: AccountId,
}

impl PeerIdentity {
    /// Parse a certificate common name into a peer identity.
    pub fn parse(common_name: &str) -> Option<Self> {
        let (prefix, hex) = common_name.split_at_checked(IDENTITY_PREFIX.len())?;
        if !prefix.eq_ignore_ascii_case(IDENTITY_PREFIX) {
            return None;
        }
        AccountId::from_hex(hex).map(|account| Self { account })
    }

    /// The numeric account id this identity names.
    pub fn account_id(&self) -> AccountId {
        self.account
    }
}

impl std::fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", IDENTITY_PREFIX, self.account)
    }
}
