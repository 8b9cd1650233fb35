//! Certificate lifecycle orchestration.
//!
//! Drives one certificate at a time through key generation, CSR
//! submission, domain validation, status polling, download, and
//! publication, committing each success to the state store so repeated
//! runs stay idempotent.
//!
//! Everything is strictly sequential: identities are processed one at
//! a time and each workflow stage runs to completion before the next.
//! CA backends rate-limit per account and the validation hook usually
//! touches a shared resource (one web server document root), so
//! concurrent challenges could clobber each other.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use ipcert_zerossl::client::CertificateAuthority;
use ipcert_zerossl::csr::{build_csr, KeyMaterial};
use ipcert_zerossl::models::{CertificateInfo, CertificateStatus, DomainValidation};

use crate::config::{CertConfig, Config};
use crate::error::IssueError;
use crate::hooks;
use crate::state::{CertificateRecord, StateStore};

/// Settle delay before the first post-verification status check.
const SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Interval between status polls while waiting for issuance. The poll
/// loop has no attempt ceiling; a run that never converges must be
/// interrupted externally.
const POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Page size for the abandoned-draft cleanup sweep.
const CLEANUP_PAGE_SIZE: u32 = 100;

/// Shared handle to a CA client.
pub type CaHandle = Arc<dyn CertificateAuthority>;

/// Drives the issue/renew lifecycle for every configured identity.
///
/// Certificate entries carry their own API keys, so clients are
/// obtained per identity through the injected factory; tests substitute
/// a factory returning an in-memory fake.
pub struct Orchestrator<F>
where
    F: Fn(&str) -> CaHandle,
{
    config: Config,
    store: StateStore,
    client_for: F,
    settle_delay: Duration,
    poll_interval: Duration,
}

impl<F> Orchestrator<F>
where
    F: Fn(&str) -> CaHandle,
{
    pub fn new(config: Config, store: StateStore, client_for: F) -> Self {
        Self {
            config,
            store,
            client_for,
            settle_delay: SETTLE_DELAY,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Override the settle delay and poll interval (tests).
    pub fn with_intervals(mut self, settle_delay: Duration, poll_interval: Duration) -> Self {
        self.settle_delay = settle_delay;
        self.poll_interval = poll_interval;
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Process every configured identity in input order: renew the ones
    /// already recorded, issue the rest. One identity's failure is
    /// logged and does not abort the remaining identities.
    pub async fn issue_all(&mut self) {
        info!(count = self.config.cert_configs.len(), "issuing configured certificates");
        for conf in self.config.cert_configs.clone() {
            if let Some(record) = self.store.find(&conf.conf_id).cloned() {
                info!(
                    conf_id = %conf.conf_id,
                    common_name = %conf.common_name,
                    "certificate already recorded, trying renewal"
                );
                if let Err(e) = self.renew_one(&record.cert_id, &conf).await {
                    error!(
                        conf_id = %conf.conf_id,
                        common_name = %conf.common_name,
                        error = %e,
                        "renewal failed"
                    );
                }
                continue;
            }

            info!(
                conf_id = %conf.conf_id,
                common_name = %conf.common_name,
                "no existing record, issuing"
            );
            match self.issue_one(&conf).await {
                Ok(cert_id) => {
                    info!(conf_id = %conf.conf_id, cert_id = %cert_id, "certificate issued");
                    self.store.upsert(CertificateRecord {
                        common_name: conf.common_name.clone(),
                        conf_id: conf.conf_id.clone(),
                        cert_id,
                        cert_file: conf.cert_file.clone(),
                        key_file: conf.key_file.clone(),
                    });
                    self.persist();
                }
                Err(e) => error!(
                    conf_id = %conf.conf_id,
                    common_name = %conf.common_name,
                    error = %e,
                    "issuance failed"
                ),
            }
        }
    }

    /// Renew every recorded certificate, in store order. A record with
    /// no matching configuration is expected when configuration shrinks
    /// and is skipped, not an error.
    pub async fn renew_all(&mut self) {
        info!(count = self.store.records().len(), "renewing recorded certificates");
        for record in self.store.records().to_vec() {
            let conf = self
                .config
                .cert_configs
                .iter()
                .find(|c| c.conf_id == record.conf_id)
                .cloned();
            match conf {
                Some(conf) => {
                    if let Err(e) = self.renew_one(&record.cert_id, &conf).await {
                        error!(
                            conf_id = %conf.conf_id,
                            common_name = %conf.common_name,
                            error = %e,
                            "renewal failed"
                        );
                    }
                }
                None => info!(
                    conf_id = %record.conf_id,
                    common_name = %record.common_name,
                    "no config for recorded certificate, skipping"
                ),
            }
        }
    }

    /// Renew a single certificate if the CA reports it expiring soon.
    ///
    /// The gate is CA-reported status only, never the local clock. On
    /// success the existing record is updated in place, matched by the
    /// original remote id.
    async fn renew_one(&mut self, cert_id: &str, conf: &CertConfig) -> Result<(), IssueError> {
        let client = (self.client_for)(&conf.api_key);
        let cert = client.get_certificate(cert_id).await?;
        if cert.status != CertificateStatus::ExpiringSoon {
            info!(
                cert_id = %cert_id,
                status = %cert.status,
                "certificate not due for renewal"
            );
            return Ok(());
        }

        info!(cert_id = %cert_id, common_name = %conf.common_name, "renewing certificate");
        let new_id = self.issue_one(conf).await?;
        self.store.update_by_cert_id(
            cert_id,
            CertificateRecord {
                common_name: conf.common_name.clone(),
                conf_id: conf.conf_id.clone(),
                cert_id: new_id,
                cert_file: conf.cert_file.clone(),
                key_file: conf.key_file.clone(),
            },
        );
        self.persist();
        Ok(())
    }

    /// Run the full issuance workflow for one identity. Linear: each
    /// stage aborts the whole operation on failure, leaving nothing
    /// committed, so the next run can retry from scratch.
    async fn issue_one(&self, conf: &CertConfig) -> Result<String, IssueError> {
        let scratch = self.config.data_dir.join("temp");
        let scratch_key = scratch.join("privkey.pem");
        let scratch_chain = scratch.join("cert-fullchain.pem");

        // Fresh scratch area per attempt; no artifacts survive from
        // earlier attempts or other identities.
        if scratch.exists() {
            std::fs::remove_dir_all(&scratch)?;
        }
        std::fs::create_dir_all(&scratch)?;

        let client = (self.client_for)(&conf.api_key);

        info!(common_name = %conf.common_name, "generating key material");
        let key = KeyMaterial::generate(conf.key_algorithm()?, &conf.sig_alg)?;
        let csr = build_csr(&conf.subject(), &key)?;

        // The key hits disk before any CA call so a later failure still
        // leaves it recoverable by hand.
        std::fs::write(&scratch_key, key.private_key_pem())?;

        info!(common_name = %conf.common_name, days = conf.days, "requesting certificate");
        let cert = client
            .create_certificate(&conf.common_name, &csr, conf.days, conf.strict_domains)
            .await?;
        info!(cert_id = %cert.id, status = %cert.status, "certificate draft created");

        let challenge = http_challenge(&cert, &conf.common_name)
            .ok_or_else(|| IssueError::MissingChallenge(conf.common_name.clone()))?;
        let env = hooks::validation_env(challenge)?;
        hooks::run_hook(&conf.verify_hook, &env).await?;

        let verify = client
            .verify_domains(&cert.id, conf.validation_method()?, None)
            .await?;
        info!(cert_id = %cert.id, success = verify.success, "requested domain verification");

        tokio::time::sleep(self.settle_delay).await;
        let checked = client.get_certificate(&cert.id).await?;
        if checked.status == CertificateStatus::Draft {
            return Err(IssueError::StillDraft);
        }

        self.wait_until_issued(client.as_ref(), &cert.id).await?;

        let bundle = client.download_certificate(&cert.id, true).await?;
        let chain = full_chain(&bundle.certificate, &bundle.ca_bundle);
        std::fs::write(&scratch_chain, &chain)?;

        // Files are published before the post hook runs, but the record
        // is only committed after it succeeds: a post-hook failure
        // leaves published files with no record, and the next run will
        // reissue. Carried over as-is from the original behavior.
        let published = self.publish(conf, &scratch_chain, &scratch_key).await;

        if let Err(e) = std::fs::remove_dir_all(&scratch) {
            warn!(scratch = %scratch.display(), error = %e, "failed to remove scratch dir");
        }
        published?;

        Ok(cert.id)
    }

    /// Copy chain and key to their destinations, then run the post hook.
    async fn publish(
        &self,
        conf: &CertConfig,
        chain_src: &Path,
        key_src: &Path,
    ) -> Result<(), IssueError> {
        info!(cert_file = %conf.cert_file.display(), "publishing certificate chain");
        copy_create_dirs(chain_src, &conf.cert_file)?;
        info!(key_file = %conf.key_file.display(), "publishing private key");
        copy_create_dirs(key_src, &conf.key_file)?;

        let env = vec![
            (
                hooks::ENV_CERT_FPATH.to_string(),
                conf.cert_file.display().to_string(),
            ),
            (
                hooks::ENV_KEY_FPATH.to_string(),
                conf.key_file.display().to_string(),
            ),
        ];
        hooks::run_hook(&conf.post_hook, &env).await?;
        Ok(())
    }

    /// Poll until the CA reports the certificate issued. No attempt
    /// ceiling and no deadline, matching the upstream behavior.
    async fn wait_until_issued(
        &self,
        client: &dyn CertificateAuthority,
        id: &str,
    ) -> Result<(), IssueError> {
        loop {
            let cert = client.get_certificate(id).await?;
            if cert.status == CertificateStatus::Issued {
                info!(cert_id = %id, "certificate is ready");
                return Ok(());
            }
            debug!(cert_id = %id, status = %cert.status, "certificate not ready yet");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Best-effort sweep of abandoned draft and pending-validation
    /// certificates, one pass per distinct API key. No ordering
    /// guarantee against concurrent issuance elsewhere.
    pub async fn clean_unfinished(&self) {
        let mut seen: Vec<&str> = Vec::new();
        for conf in &self.config.cert_configs {
            if seen.contains(&conf.api_key.as_str()) {
                continue;
            }
            seen.push(&conf.api_key);
            let client = (self.client_for)(&conf.api_key);
            if let Err(e) = sweep_unfinished(client.as_ref()).await {
                warn!(error = %e, "cleanup sweep aborted");
            }
        }
    }

    /// Flush the store. A save failure is logged, not rolled back; the
    /// store may trail the CA until a later run reconciles manually.
    fn persist(&self) {
        if let Err(e) = self.store.save() {
            error!(error = %e, "failed to persist state");
        }
    }
}

async fn sweep_unfinished(client: &dyn CertificateAuthority) -> Result<(), IssueError> {
    info!("cleaning unfinished certificates");
    let mut page = 1;
    loop {
        let list = client
            .list_certificates(None, None, CLEANUP_PAGE_SIZE, page)
            .await?;
        for cert in &list.results {
            if matches!(
                cert.status,
                CertificateStatus::Draft | CertificateStatus::PendingValidation
            ) {
                info!(
                    cert_id = %cert.id,
                    common_name = %cert.common_name,
                    status = %cert.status,
                    "deleting unfinished certificate"
                );
                if let Err(e) = client.delete_certificate(&cert.id).await {
                    warn!(cert_id = %cert.id, error = %e, "failed to delete unfinished certificate");
                }
            }
        }
        if list.result_count < i64::from(CLEANUP_PAGE_SIZE) {
            return Ok(());
        }
        page += 1;
    }
}

/// HTTP file-validation challenge for the given common name, if the CA
/// returned one.
fn http_challenge<'a>(
    cert: &'a CertificateInfo,
    common_name: &str,
) -> Option<&'a DomainValidation> {
    cert.validation.as_ref()?.other_methods.get(common_name)
}

/// Join leaf and CA bundle into the single PEM stream downstream
/// consumers expect: trimmed leaf, newline, trimmed bundle, newline.
pub fn full_chain(certificate: &str, ca_bundle: &str) -> String {
    format!("{}\n{}\n", certificate.trim(), ca_bundle.trim())
}

fn copy_create_dirs(src: &Path, dst: &Path) -> std::io::Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(src, dst)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_chain_framing_is_exact() {
        assert_eq!(full_chain("A\n ", " B\n"), "A\nB\n");
    }

    #[test]
    fn full_chain_is_stable_for_clean_input() {
        let leaf = "-----BEGIN CERTIFICATE-----\nleaf\n-----END CERTIFICATE-----";
        let bundle = "-----BEGIN CERTIFICATE-----\nca\n-----END CERTIFICATE-----";
        assert_eq!(full_chain(leaf, bundle), format!("{leaf}\n{bundle}\n"));
    }

    #[test]
    fn http_challenge_matches_common_name_only() {
        use std::collections::HashMap;
        use ipcert_zerossl::models::ValidationInfo;

        let mut other_methods = HashMap::new();
        other_methods.insert("203.0.113.5".to_string(), DomainValidation::default());
        let cert = CertificateInfo {
            id: "abc".to_string(),
            cert_type: String::new(),
            common_name: "203.0.113.5".to_string(),
            additional_domains: String::new(),
            created: String::new(),
            expires: String::new(),
            status: CertificateStatus::Draft,
            validation_type: None,
            validation_emails: None,
            replacement_for: None,
            validation: Some(ValidationInfo {
                email_validation: HashMap::new(),
                other_methods,
            }),
        };

        assert!(http_challenge(&cert, "203.0.113.5").is_some());
        assert!(http_challenge(&cert, "198.51.100.7").is_none());
    }
}
