//! Account store interface and the file-backed implementation.
//!
//! # Responsibilities
//! - Define the lookup surface the dispatcher needs: does this account
//!   exist, and where does its storage live
//! - Provide a TOML-backed store for the daemon binary
//!
//! # Design Decisions
//! - The store is re-read on configuration reload, never cached across one
//! - Account ids are numeric; the wire form is the hex suffix of the
//!   client certificate's common name

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Numeric account identifier.
///
/// Displayed in the canonical zero-padded hex form used in certificate
/// common names and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(u64);

impl AccountId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Parse from a hex string (case-insensitive, no prefix).
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.is_empty() {
            return None;
        }
        u64::from_str_radix(hex, 16).ok().map(Self)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Where an account's data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRoot {
    /// Root directory of the account's storage.
    pub path: PathBuf,
    /// Disc set the account is assigned to.
    pub disc_set: u32,
}

/// Error type for account store operations.
#[derive(Debug, Error)]
pub enum AccountStoreError {
    #[error("failed to read account store: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse account store: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate account id {0}")]
    DuplicateAccount(AccountId),

    #[error("invalid account id {0:?}: not a hex number")]
    InvalidAccountId(String),
}

/// Lookup surface consumed by the connection dispatcher.
pub trait AccountStore {
    /// Whether the given account exists.
    fn account_exists(&self, id: AccountId) -> bool;

    /// The storage root for the given account, if it exists.
    fn account_root(&self, id: AccountId) -> Option<AccountRoot>;
}

/// One entry in the accounts file.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct AccountEntry {
    /// Account id as hex (matching the certificate common name suffix).
    id: String,
    /// Root directory of the account's storage.
    root: PathBuf,
    /// Disc set the account is assigned to.
    #[serde(default)]
    disc_set: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
struct AccountsFile {
    #[serde(default, rename = "account")]
    accounts: Vec<AccountEntry>,
}

/// TOML-backed account store.
///
/// The file is a list of `[[account]]` tables:
///
/// ```toml
/// [[account]]
/// id = "1a2b"
/// root = "/srv/backstore/1a2b"
/// disc_set = 0
/// ```
#[derive(Debug, Clone, Default)]
pub struct TomlAccountStore {
    accounts: HashMap<AccountId, AccountRoot>,
}

impl TomlAccountStore {
    /// Load the store from disk.
    pub fn load(path: &Path) -> Result<Self, AccountStoreError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse the store from TOML text.
    pub fn parse(content: &str) -> Result<Self, AccountStoreError> {
        let file: AccountsFile = toml::from_str(content)?;
        let mut accounts = HashMap::new();
        for entry in file.accounts {
            let id = AccountId::from_hex(&entry.id)
                .ok_or_else(|| AccountStoreError::InvalidAccountId(entry.id.clone()))?;
            let root = AccountRoot {
                path: entry.root,
                disc_set: entry.disc_set,
            };
            if accounts.insert(id, root).is_some() {
                return Err(AccountStoreError::DuplicateAccount(id));
            }
        }
        Ok(Self { accounts })
    }

    /// Number of accounts in the store.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Iterate over all accounts, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (AccountId, &AccountRoot)> {
        self.accounts.iter().map(|(id, root)| (*id, root))
    }
}

impl AccountStore for TomlAccountStore {
    fn account_exists(&self, id: AccountId) -> bool {
        self.accounts.contains_key(&id)
    }

    fn account_root(&self, id: AccountId) -> Option<AccountRoot> {
        self.accounts.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_hex_roundtrip() {
        let id = AccountId::from_hex("1a2b").unwrap();
        assert_eq!(id.as_u64(), 0x1a2b);
        assert_eq!(id.to_string(), "00001a2b");
        assert_eq!(AccountId::from_hex("1A2B"), Some(id));
    }

    #[test]
    fn account_id_rejects_garbage() {
        assert_eq!(AccountId::from_hex(""), None);
        assert_eq!(AccountId::from_hex("notHex"), None);
        // 17 hex digits overflows u64
        assert_eq!(AccountId::from_hex("11111111111111111"), None);
    }

    #[test]
    fn parses_accounts_file() {
        let store = TomlAccountStore::parse(
            r#"
            [[account]]
            id = "1a2b"
            root = "/srv/backstore/1a2b"
            disc_set = 1

            [[account]]
            id = "ff"
            root = "/srv/backstore/ff"
            "#,
        )
        .unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.account_exists(AccountId::new(0x1a2b)));
        let root = store.account_root(AccountId::new(0x1a2b)).unwrap();
        assert_eq!(root.path, PathBuf::from("/srv/backstore/1a2b"));
        assert_eq!(root.disc_set, 1);
        assert_eq!(store.account_root(AccountId::new(0xff)).unwrap().disc_set, 0);
        assert!(!store.account_exists(AccountId::new(0xdead)));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = TomlAccountStore::parse(
            r#"
            [[account]]
            id = "01"
            root = "/a"

            [[account]]
            id = "1"
            root = "/b"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, AccountStoreError::DuplicateAccount(_)));
    }

    #[test]
    fn rejects_bad_id() {
        let err = TomlAccountStore::parse(
            r#"
            [[account]]
            id = "xyz"
            root = "/a"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, AccountStoreError::InvalidAccountId(_)));
    }
}
