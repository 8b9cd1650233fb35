//! YAML run configuration.
//!
//! One [`CertConfig`] per certificate identity, plus process-wide
//! settings. `confId` is the stable key correlating a configuration
//! entry to one remote certificate across its renewal history; it must
//! stay put even when the common name or file paths change.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use ipcert_zerossl::csr::{EcdsaCurve, KeyAlgorithm, Subject};
use ipcert_zerossl::models::ValidationMethod;

use crate::error::ConfigError;

/// Process-wide configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory for the state file and per-attempt scratch space.
    pub data_dir: PathBuf,
    /// Log file, appended to alongside stdout.
    pub log_file: PathBuf,
    /// Sweep abandoned draft certificates off the CA after each run.
    #[serde(default)]
    pub clean_unfinished: bool,
    #[serde(default)]
    pub cert_configs: Vec<CertConfig>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&raw)?)
    }
}

/// One certificate identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertConfig {
    /// Stable identity correlating this entry to its remote certificate.
    pub conf_id: String,
    pub api_key: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub locality: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub organization_unit: String,
    pub common_name: String,
    /// Requested validity in days.
    pub days: u32,
    /// `rsa` or `ecdsa`, case-insensitive.
    pub key_type: String,
    #[serde(default)]
    pub key_bits: usize,
    #[serde(default)]
    pub key_curve: String,
    pub sig_alg: String,
    #[serde(default)]
    pub strict_domains: bool,
    #[serde(default = "default_verify_method")]
    pub verify_method: String,
    /// Script that publishes the file-validation challenge.
    pub verify_hook: PathBuf,
    /// Script run after the certificate and key are in place.
    pub post_hook: PathBuf,
    /// Destination for the full certificate chain.
    pub cert_file: PathBuf,
    /// Destination for the private key.
    pub key_file: PathBuf,
}

fn default_verify_method() -> String {
    "HTTP_CSR_HASH".to_string()
}

impl CertConfig {
    /// Resolve the configured key type, bits, and curve into a closed
    /// variant. Unknown names are configuration errors.
    pub fn key_algorithm(&self) -> Result<KeyAlgorithm, ConfigError> {
        match self.key_type.to_uppercase().as_str() {
            "RSA" => Ok(KeyAlgorithm::Rsa {
                bits: self.key_bits,
            }),
            "ECDSA" => {
                let curve = EcdsaCurve::parse(&self.key_curve)
                    .ok_or_else(|| ConfigError::UnsupportedCurve(self.key_curve.clone()))?;
                Ok(KeyAlgorithm::Ecdsa { curve })
            }
            _ => Err(ConfigError::UnsupportedKeyType(self.key_type.clone())),
        }
    }

    pub fn validation_method(&self) -> Result<ValidationMethod, ConfigError> {
        ValidationMethod::parse(&self.verify_method)
            .ok_or_else(|| ConfigError::UnsupportedValidationMethod(self.verify_method.clone()))
    }

    pub fn subject(&self) -> Subject {
        Subject {
            country: self.country.clone(),
            province: self.province.clone(),
            locality: self.locality.clone(),
            organization: self.organization.clone(),
            organizational_unit: self.organization_unit.clone(),
            common_name: self.common_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
dataDir: /var/lib/ipcert
logFile: /var/log/ipcert.log
cleanUnfinished: true
certConfigs:
  - confId: edge-1
    apiKey: secret
    country: US
    province: CA
    locality: San Francisco
    organization: Example
    organizationUnit: Ops
    commonName: 203.0.113.5
    days: 90
    keyType: rsa
    keyBits: 2048
    sigAlg: SHA256-RSA
    strictDomains: true
    verifyHook: /opt/hooks/verify.sh
    postHook: /opt/hooks/post.sh
    certFile: /etc/ssl/edge-1/fullchain.pem
    keyFile: /etc/ssl/edge-1/privkey.pem
"#;

    #[test]
    fn parses_camel_case_yaml() {
        let config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        assert!(config.clean_unfinished);
        assert_eq!(config.cert_configs.len(), 1);

        let cert = &config.cert_configs[0];
        assert_eq!(cert.conf_id, "edge-1");
        assert_eq!(cert.common_name, "203.0.113.5");
        assert_eq!(cert.days, 90);
        assert!(cert.strict_domains);
        // Unset verifyMethod falls back to the HTTP CSR hash.
        assert_eq!(
            cert.validation_method().unwrap(),
            ValidationMethod::HttpCsrHash
        );
    }

    #[test]
    fn resolves_key_algorithms() {
        let mut config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        let cert = &mut config.cert_configs[0];

        assert_eq!(
            cert.key_algorithm().unwrap(),
            KeyAlgorithm::Rsa { bits: 2048 }
        );

        cert.key_type = "ECDSA".to_string();
        cert.key_curve = "P-384".to_string();
        assert_eq!(
            cert.key_algorithm().unwrap(),
            KeyAlgorithm::Ecdsa {
                curve: EcdsaCurve::P384
            }
        );

        cert.key_curve = "P-521".to_string();
        assert!(matches!(
            cert.key_algorithm(),
            Err(ConfigError::UnsupportedCurve(_))
        ));

        cert.key_type = "dsa".to_string();
        assert!(matches!(
            cert.key_algorithm(),
            Err(ConfigError::UnsupportedKeyType(_))
        ));
    }
}
