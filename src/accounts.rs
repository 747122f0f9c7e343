//! Candidate account lists
//!
//! Accounts are tried in file order, so the list doubles as the operator's
//! priority order. The bundled list covers the factory defaults of the
//! device family.

use crate::error::ScanError;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

/// One credential pair, shared read-only across all negotiation attempts
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub username: String,
    pub password: String,
}

/// Ordered list of candidate accounts loaded from a CSV file
#[derive(Debug, Clone)]
pub struct AccountStore {
    accounts: Vec<Account>,
}

/// Factory-default credentials compiled into the binary
const BUNDLED_ACCOUNTS: &str = include_str!("../data/default-accounts.csv");

impl AccountStore {
    /// Load accounts from a CSV file with `username` and `password` columns
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScanError::AccountsError(format!(
                "accounts list file \"{}\" does not exist",
                path.display()
            )));
        }
        let reader = csv::Reader::from_path(path)?;
        let store = Self::from_csv(reader)?;
        log::debug!(
            "Account list file \"{}\" has been found with {} record(s).",
            path.display(),
            store.len()
        );
        Ok(store)
    }

    /// The bundled factory-default account list
    pub fn bundled() -> crate::Result<Self> {
        Self::from_csv(csv::Reader::from_reader(BUNDLED_ACCOUNTS.as_bytes()))
    }

    /// A single operator-supplied account
    pub fn single(username: String, password: String) -> Self {
        Self {
            accounts: vec![Account { username, password }],
        }
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> crate::Result<Self> {
        let mut accounts = Vec::new();
        for row in reader.deserialize() {
            let account: Account =
                row.map_err(|e| ScanError::AccountsError(format!("malformed row: {}", e)))?;
            accounts.push(account);
        }
        if accounts.is_empty() {
            return Err(ScanError::AccountsError(
                "accounts list contains no records".to_string(),
            ));
        }
        Ok(Self { accounts })
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
