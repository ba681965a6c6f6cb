//! Account alias resolution.

use std::collections::HashMap;

use negsweep_platform::AccountId;
use serde::{Deserialize, Serialize};

use crate::error::{SweepError, SweepResult};

/// One configured ad account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Business description handed to the AI classifier.
    #[serde(default)]
    pub context: String,
}

/// A resolved account, ready to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    /// What the caller asked for.
    pub key: String,
    pub account_id: AccountId,
    pub name: String,
    pub context: String,
}

impl AccountRef {
    /// Context for the classifier, falling back to the account name.
    pub fn business_context(&self) -> &str {
        if self.context.trim().is_empty() {
            &self.name
        } else {
            &self.context
        }
    }
}

fn normalize_key(key: &str) -> String {
    key.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Case- and whitespace-insensitive lookup by name, alias or id.
#[derive(Debug, Clone, Default)]
pub struct AccountDirectory {
    entries: Vec<AccountEntry>,
    index: HashMap<String, usize>,
}

impl AccountDirectory {
    pub fn new(entries: Vec<AccountEntry>) -> SweepResult<Self> {
        let mut index = HashMap::new();
        for (pos, entry) in entries.iter().enumerate() {
            let id = AccountId::new(&entry.id);
            if id.as_str().is_empty() || !id.as_str().chars().all(|c| c.is_ascii_digit()) {
                return Err(SweepError::Configuration(format!(
                    "account '{}' has invalid id '{}'",
                    entry.name, entry.id
                )));
            }

            let keys = std::iter::once(id.as_str().to_string())
                .chain(std::iter::once(normalize_key(&entry.name)))
                .chain(entry.aliases.iter().map(|a| normalize_key(a)));
            for key in keys.filter(|k| !k.is_empty()) {
                if let Some(&other) = index.get(&key) {
                    let other: &AccountEntry = &entries[other];
                    if AccountId::new(&other.id) != id {
                        return Err(SweepError::Configuration(format!(
                            "alias '{key}' maps to both {} and {}",
                            other.id, entry.id
                        )));
                    }
                    continue;
                }
                index.insert(key, pos);
            }
        }
        Ok(Self { entries, index })
    }

    /// Resolve a name, alias or id (dashes allowed) to an account.
    pub fn resolve(&self, key: &str) -> SweepResult<AccountRef> {
        let normalized = normalize_key(key);
        let pos = self
            .index
            .get(&normalized)
            .or_else(|| self.index.get(AccountId::new(key).as_str()))
            .copied()
            .ok_or_else(|| SweepError::AccountNotFound(key.trim().to_string()))?;
        let entry = &self.entries[pos];
        Ok(AccountRef {
            key: key.trim().to_string(),
            account_id: AccountId::new(&entry.id),
            name: entry.name.clone(),
            context: entry.context.clone(),
        })
    }

    /// Every configured account, once each, in configuration order.
    pub fn accounts(&self) -> Vec<AccountRef> {
        let mut seen = Vec::<AccountId>::new();
        let mut out = Vec::new();
        for entry in &self.entries {
            let id = AccountId::new(&entry.id);
            if seen.contains(&id) {
                continue;
            }
            seen.push(id.clone());
            out.push(AccountRef {
                key: entry.name.clone(),
                account_id: id,
                name: entry.name.clone(),
                context: entry.context.clone(),
            });
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, name: &str, aliases: &[&str]) -> AccountEntry {
        AccountEntry {
            id: id.to_string(),
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            context: String::new(),
        }
    }

    fn directory() -> AccountDirectory {
        AccountDirectory::new(vec![
            entry("5616230554", "Satilla Family Smiles", &["satilla", "sfs"]),
            entry("3035218698", "First National Bank", &["fnbmd"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_resolve_alias_case_and_whitespace_insensitive() {
        let dir = directory();
        let account = dir.resolve("  SATILLA   family smiles ").unwrap();
        assert_eq!(account.account_id.as_str(), "5616230554");
        assert_eq!(dir.resolve("Sfs").unwrap().name, "Satilla Family Smiles");
    }

    #[test]
    fn test_resolve_by_dashed_id() {
        let account = directory().resolve("303-521-8698").unwrap();
        assert_eq!(account.name, "First National Bank");
    }

    #[test]
    fn test_unknown_key_is_account_not_found() {
        let err = directory().resolve("godley").unwrap_err();
        assert!(matches!(err, SweepError::AccountNotFound(ref k) if k == "godley"));
    }

    #[test]
    fn test_colliding_alias_rejected() {
        let err = AccountDirectory::new(vec![
            entry("1", "One", &["shared"]),
            entry("2", "Two", &["shared"]),
        ])
        .unwrap_err();
        assert!(matches!(err, SweepError::Configuration(_)));
    }

    #[test]
    fn test_same_id_twice_is_listed_once() {
        let dir = AccountDirectory::new(vec![
            entry("1", "One", &["uno"]),
            entry("1", "One Again", &[]),
        ])
        .unwrap();
        assert_eq!(dir.accounts().len(), 1);
    }

    #[test]
    fn test_non_numeric_id_rejected() {
        assert!(AccountDirectory::new(vec![entry("abc", "Bad", &[])]).is_err());
    }

    #[test]
    fn test_business_context_falls_back_to_name() {
        let account = directory().resolve("sfs").unwrap();
        assert_eq!(account.business_context(), "Satilla Family Smiles");
    }
}
