//! Durable bookkeeping for issued certificates.
//!
//! `current.yaml` under the data directory maps each configuration
//! identity to the most recent remote certificate and the local files
//! it was published to. The store holds at most one record per
//! `confId`; renewals update records in place. The file is rewritten
//! wholesale after every successful mutation, so a crash between a
//! CA-side change and a save leaves the store trailing the CA until a
//! later run reconciles.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StateError;

/// One issued certificate as last committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    pub common_name: String,
    pub conf_id: String,
    pub cert_id: String,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateData {
    #[serde(default)]
    certs: Vec<CertificateRecord>,
}

/// Filesystem-backed record store.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    certs: Vec<CertificateRecord>,
}

impl StateStore {
    /// Load the store from `path`.
    ///
    /// A missing or empty file is an empty store; a present-but-corrupt
    /// file is an error the caller treats as fatal.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        if !path.exists() {
            debug!(path = %path.display(), "no state file, starting empty");
            return Ok(Self {
                path: path.to_path_buf(),
                certs: Vec::new(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Self {
                path: path.to_path_buf(),
                certs: Vec::new(),
            });
        }
        let data: StateData =
            serde_yaml::from_str(&raw).map_err(|source| StateError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), records = data.certs.len(), "loaded state file");
        Ok(Self {
            path: path.to_path_buf(),
            certs: data.certs,
        })
    }

    /// Rewrite the whole state file.
    pub fn save(&self) -> Result<(), StateError> {
        let data = StateData {
            certs: self.certs.clone(),
        };
        let raw = serde_yaml::to_string(&data).map_err(StateError::Serialize)?;
        std::fs::write(&self.path, raw).map_err(|source| StateError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn find(&self, conf_id: &str) -> Option<&CertificateRecord> {
        self.certs.iter().find(|c| c.conf_id == conf_id)
    }

    /// Insert or replace the record for the given `confId`; at most one
    /// record per configuration identity ever exists.
    pub fn upsert(&mut self, record: CertificateRecord) {
        match self.certs.iter_mut().find(|c| c.conf_id == record.conf_id) {
            Some(existing) => *existing = record,
            None => self.certs.push(record),
        }
    }

    /// Replace the record currently pointing at `cert_id`. The renewal
    /// path matches on the original remote id, then refreshes every
    /// field from the new issuance.
    pub fn update_by_cert_id(&mut self, cert_id: &str, record: CertificateRecord) {
        if let Some(existing) = self.certs.iter_mut().find(|c| c.cert_id == cert_id) {
            *existing = record;
        }
    }

    pub fn records(&self) -> &[CertificateRecord] {
        &self.certs
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(conf_id: &str, cert_id: &str) -> CertificateRecord {
        CertificateRecord {
            common_name: "203.0.113.5".to_string(),
            conf_id: conf_id.to_string(),
            cert_id: cert_id.to_string(),
            cert_file: PathBuf::from("/etc/ssl/fullchain.pem"),
            key_file: PathBuf::from("/etc/ssl/privkey.pem"),
        }
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::load(&temp.path().join("current.yaml")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn empty_file_is_an_empty_store() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("current.yaml");
        std::fs::write(&path, "\n").unwrap();
        let store = StateStore::load(&path).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("current.yaml");
        std::fs::write(&path, "certs: {not: [valid").unwrap();
        assert!(matches!(
            StateStore::load(&path),
            Err(StateError::Parse { .. })
        ));
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("current.yaml");

        let mut store = StateStore::load(&path).unwrap();
        store.upsert(record("a", "cert-1"));
        store.upsert(record("b", "cert-2"));
        store.save().unwrap();

        let reloaded = StateStore::load(&path).unwrap();
        assert_eq!(reloaded.records().len(), 2);
        assert_eq!(reloaded.find("a").unwrap().cert_id, "cert-1");
        assert_eq!(reloaded.find("b").unwrap().cert_id, "cert-2");
    }

    #[test]
    fn upsert_replaces_instead_of_appending() {
        let temp = TempDir::new().unwrap();
        let mut store = StateStore::load(&temp.path().join("current.yaml")).unwrap();

        store.upsert(record("a", "cert-1"));
        store.upsert(record("a", "cert-2"));

        assert_eq!(store.records().len(), 1);
        assert_eq!(store.find("a").unwrap().cert_id, "cert-2");
    }

    #[test]
    fn update_by_cert_id_refreshes_in_place() {
        let temp = TempDir::new().unwrap();
        let mut store = StateStore::load(&temp.path().join("current.yaml")).unwrap();

        store.upsert(record("a", "cert-1"));
        let mut renewed = record("a", "cert-9");
        renewed.common_name = "198.51.100.7".to_string();
        store.update_by_cert_id("cert-1", renewed);

        assert_eq!(store.records().len(), 1);
        let updated = store.find("a").unwrap();
        assert_eq!(updated.cert_id, "cert-9");
        assert_eq!(updated.common_name, "198.51.100.7");
    }
}
