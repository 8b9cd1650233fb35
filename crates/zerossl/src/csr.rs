//! Key-pair generation and CSR construction.
//!
//! The CA accepts RSA (2048/3072/4096 bit) and ECDSA (P-256/P-384)
//! keys. ECDSA pairs come straight from `rcgen`; RSA pairs are
//! generated with the `rsa` crate and imported into `rcgen` for
//! signing, since `rcgen` only consumes RSA keys.

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;

use crate::error::CsrError;

/// Subject fields for a certificate request.
#[derive(Debug, Clone, Default)]
pub struct Subject {
    pub country: String,
    pub province: String,
    pub locality: String,
    pub organization: String,
    pub organizational_unit: String,
    pub common_name: String,
}

/// Requested key algorithm, resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa { bits: usize },
    Ecdsa { curve: EcdsaCurve },
}

/// Named curves the CA accepts for ECDSA keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcdsaCurve {
    P256,
    P384,
}

impl EcdsaCurve {
    /// Parse a configured curve name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "P-256" => Some(Self::P256),
            "P-384" => Some(Self::P384),
            _ => None,
        }
    }
}

/// A generated private key, tagged by algorithm family.
///
/// Both variants carry the key pair used for CSR signing and the
/// PKCS#8 PEM written to disk.
#[derive(Debug)]
pub enum KeyMaterial {
    Rsa {
        key_pair: KeyPair,
        private_key_pem: String,
    },
    Ecdsa {
        key_pair: KeyPair,
        private_key_pem: String,
    },
}

impl KeyMaterial {
    /// Generate a key pair for `algorithm`, bound to the signature
    /// algorithm named by `sig_alg` (`SHA256-RSA`, `SHA384-RSA`,
    /// `ECDSA-SHA256`, `ECDSA-SHA384`, case-insensitive).
    ///
    /// An unknown name, or a name that does not match the key family
    /// or curve, is a configuration error and is never retried.
    pub fn generate(algorithm: KeyAlgorithm, sig_alg: &str) -> Result<Self, CsrError> {
        let normalized = sig_alg.to_uppercase();
        match algorithm {
            KeyAlgorithm::Rsa { bits } => {
                let alg = match normalized.as_str() {
                    "SHA256-RSA" => &rcgen::PKCS_RSA_SHA256,
                    "SHA384-RSA" => &rcgen::PKCS_RSA_SHA384,
                    "ECDSA-SHA256" | "ECDSA-SHA384" => {
                        return Err(CsrError::SignatureAlgorithmMismatch {
                            key_type: "RSA",
                            sig_alg: sig_alg.to_string(),
                        })
                    }
                    _ => {
                        return Err(CsrError::UnsupportedSignatureAlgorithm(sig_alg.to_string()))
                    }
                };
                let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, bits)?;
                let pem = private_key.to_pkcs8_pem(LineEnding::LF)?;
                let key_pair = KeyPair::from_pem_and_sign_algo(pem.as_str(), alg)?;
                Ok(Self::Rsa {
                    key_pair,
                    private_key_pem: pem.to_string(),
                })
            }
            KeyAlgorithm::Ecdsa { curve } => {
                let alg = match (curve, normalized.as_str()) {
                    (EcdsaCurve::P256, "ECDSA-SHA256") => &rcgen::PKCS_ECDSA_P256_SHA256,
                    (EcdsaCurve::P384, "ECDSA-SHA384") => &rcgen::PKCS_ECDSA_P384_SHA384,
                    (_, "ECDSA-SHA256" | "ECDSA-SHA384" | "SHA256-RSA" | "SHA384-RSA") => {
                        return Err(CsrError::SignatureAlgorithmMismatch {
                            key_type: "ECDSA",
                            sig_alg: sig_alg.to_string(),
                        })
                    }
                    _ => {
                        return Err(CsrError::UnsupportedSignatureAlgorithm(sig_alg.to_string()))
                    }
                };
                let key_pair = KeyPair::generate_for(alg)?;
                let private_key_pem = key_pair.serialize_pem();
                Ok(Self::Ecdsa {
                    key_pair,
                    private_key_pem,
                })
            }
        }
    }

    /// PKCS#8 PEM encoding of the private key.
    pub fn private_key_pem(&self) -> &str {
        match self {
            Self::Rsa {
                private_key_pem, ..
            }
            | Self::Ecdsa {
                private_key_pem, ..
            } => private_key_pem,
        }
    }

    fn key_pair(&self) -> &KeyPair {
        match self {
            Self::Rsa { key_pair, .. } | Self::Ecdsa { key_pair, .. } => key_pair,
        }
    }
}

/// Build a PEM-encoded CSR over `subject`, signed with `key`.
///
/// The common name also becomes the sole subject alternative name; an
/// IP-address common name is encoded as an IP SAN.
pub fn build_csr(subject: &Subject, key: &KeyMaterial) -> Result<String, CsrError> {
    let mut params = CertificateParams::new(vec![subject.common_name.clone()])?;
    let mut dn = DistinguishedName::new();
    if !subject.country.is_empty() {
        dn.push(DnType::CountryName, subject.country.clone());
    }
    if !subject.province.is_empty() {
        dn.push(DnType::StateOrProvinceName, subject.province.clone());
    }
    if !subject.locality.is_empty() {
        dn.push(DnType::LocalityName, subject.locality.clone());
    }
    if !subject.organization.is_empty() {
        dn.push(DnType::OrganizationName, subject.organization.clone());
    }
    if !subject.organizational_unit.is_empty() {
        dn.push(
            DnType::OrganizationalUnitName,
            subject.organizational_unit.clone(),
        );
    }
    dn.push(DnType::CommonName, subject.common_name.clone());
    params.distinguished_name = dn;

    let csr = params.serialize_request(key.key_pair())?;
    Ok(csr.pem()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(common_name: &str) -> Subject {
        Subject {
            country: "US".to_string(),
            province: "CA".to_string(),
            locality: "San Francisco".to_string(),
            organization: "Example".to_string(),
            organizational_unit: "Ops".to_string(),
            common_name: common_name.to_string(),
        }
    }

    #[test]
    fn ecdsa_p256_key_and_csr() {
        let key = KeyMaterial::generate(
            KeyAlgorithm::Ecdsa {
                curve: EcdsaCurve::P256,
            },
            "ECDSA-SHA256",
        )
        .unwrap();
        assert!(key.private_key_pem().contains("BEGIN PRIVATE KEY"));

        let csr = build_csr(&subject("203.0.113.5"), &key).unwrap();
        assert!(csr.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
        assert!(csr.trim_end().ends_with("-----END CERTIFICATE REQUEST-----"));
    }

    #[test]
    fn rsa_2048_key_and_csr() {
        let key = KeyMaterial::generate(KeyAlgorithm::Rsa { bits: 2048 }, "SHA256-RSA").unwrap();
        assert!(key.private_key_pem().contains("BEGIN PRIVATE KEY"));

        let csr = build_csr(&subject("198.51.100.7"), &key).unwrap();
        assert!(csr.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
    }

    #[test]
    fn sig_alg_names_are_case_insensitive() {
        let key = KeyMaterial::generate(
            KeyAlgorithm::Ecdsa {
                curve: EcdsaCurve::P384,
            },
            "ecdsa-sha384",
        );
        assert!(key.is_ok());
    }

    #[test]
    fn mismatched_sig_alg_is_rejected() {
        let err = KeyMaterial::generate(KeyAlgorithm::Rsa { bits: 2048 }, "ECDSA-SHA256")
            .unwrap_err();
        assert!(matches!(err, CsrError::SignatureAlgorithmMismatch { .. }));

        let err = KeyMaterial::generate(
            KeyAlgorithm::Ecdsa {
                curve: EcdsaCurve::P256,
            },
            "ECDSA-SHA384",
        )
        .unwrap_err();
        assert!(matches!(err, CsrError::SignatureAlgorithmMismatch { .. }));
    }

    #[test]
    fn unknown_sig_alg_is_rejected() {
        let err = KeyMaterial::generate(
            KeyAlgorithm::Ecdsa {
                curve: EcdsaCurve::P256,
            },
            "ED25519",
        )
        .unwrap_err();
        assert!(matches!(err, CsrError::UnsupportedSignatureAlgorithm(_)));
    }

    #[test]
    fn curve_names_parse_case_insensitively() {
        assert_eq!(EcdsaCurve::parse("p-256"), Some(EcdsaCurve::P256));
        assert_eq!(EcdsaCurve::parse("P-384"), Some(EcdsaCurve::P384));
        assert_eq!(EcdsaCurve::parse("P-521"), None);
    }
}
