//! Wire models for the ZeroSSL certificates API.
//!
//! Field names and shapes follow the documented API schema; responses
//! are lenient about absent fields because the API omits them freely
//! depending on certificate state.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status the CA reports for a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Draft,
    PendingValidation,
    Issued,
    Cancelled,
    ExpiringSoon,
    Expired,
}

impl CertificateStatus {
    /// Wire representation, also used for the list status filter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingValidation => "pending_validation",
            Self::Issued => "issued",
            Self::Cancelled => "cancelled",
            Self::ExpiringSoon => "expiring_soon",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain-validation method accepted by the challenges endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMethod {
    Email,
    CnameCsrHash,
    HttpCsrHash,
    HttpsCsrHash,
}

impl ValidationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::CnameCsrHash => "CNAME_CSR_HASH",
            Self::HttpCsrHash => "HTTP_CSR_HASH",
            Self::HttpsCsrHash => "HTTPS_CSR_HASH",
        }
    }

    /// Parse a configured method name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "EMAIL" => Some(Self::Email),
            "CNAME_CSR_HASH" => Some(Self::CnameCsrHash),
            "HTTP_CSR_HASH" => Some(Self::HttpCsrHash),
            "HTTPS_CSR_HASH" => Some(Self::HttpsCsrHash),
            _ => None,
        }
    }
}

/// A certificate as the CA sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateInfo {
    pub id: String,
    #[serde(rename = "type", default)]
    pub cert_type: String,
    pub common_name: String,
    #[serde(default)]
    pub additional_domains: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub expires: String,
    pub status: CertificateStatus,
    #[serde(default)]
    pub validation_type: Option<String>,
    #[serde(rename = "validation_email", default)]
    pub validation_emails: Option<String>,
    #[serde(default)]
    pub replacement_for: Option<String>,
    /// Present while the certificate is in draft or pending validation.
    #[serde(default)]
    pub validation: Option<ValidationInfo>,
}

/// Per-domain validation challenges attached to a draft certificate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationInfo {
    #[serde(default)]
    pub email_validation: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub other_methods: HashMap<String, DomainValidation>,
}

/// File-serving or CNAME challenge targets for one domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainValidation {
    #[serde(default)]
    pub file_validation_url_http: String,
    #[serde(default)]
    pub file_validation_url_https: String,
    #[serde(default)]
    pub file_validation_content: Vec<String>,
    #[serde(default)]
    pub cname_validation_p1: String,
    #[serde(default)]
    pub cname_validation_p2: String,
}

/// Response of the challenges endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyDomainsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<VerifyDomainsError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyDomainsError {
    #[serde(default)]
    pub code: i64,
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub details: Option<VerifyDomainsErrorDetails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyDomainsErrorDetails {
    #[serde(default)]
    pub cname_found: i64,
    #[serde(default)]
    pub record_correct: i64,
    #[serde(default)]
    pub target_host: String,
    #[serde(default)]
    pub target_record: String,
    #[serde(default)]
    pub actual_record: String,
}

/// Response of the verification-status endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationStatus {
    #[serde(default)]
    pub validation_completed: i64,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// Inline download: leaf certificate plus CA bundle, both PEM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificateBundle {
    #[serde(rename = "certificate.crt", default)]
    pub certificate: String,
    #[serde(rename = "ca_bundle.crt", default)]
    pub ca_bundle: String,
}

/// One page of the certificate list.
///
/// The `page` field of the response is dynamically typed upstream and
/// is deliberately not modeled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificateList {
    #[serde(default)]
    pub total_count: i64,
    #[serde(default)]
    pub result_count: i64,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub results: Vec<CertificateInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips_through_wire_names() {
        for status in [
            CertificateStatus::Draft,
            CertificateStatus::PendingValidation,
            CertificateStatus::Issued,
            CertificateStatus::Cancelled,
            CertificateStatus::ExpiringSoon,
            CertificateStatus::Expired,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            let back: CertificateStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn validation_method_parse_is_case_insensitive() {
        assert_eq!(
            ValidationMethod::parse("http_csr_hash"),
            Some(ValidationMethod::HttpCsrHash)
        );
        assert_eq!(
            ValidationMethod::parse("HTTPS_CSR_HASH"),
            Some(ValidationMethod::HttpsCsrHash)
        );
        assert_eq!(ValidationMethod::parse("DNS-01"), None);
    }

    #[test]
    fn certificate_info_tolerates_missing_validation() {
        let json = r#"{
            "id": "abc",
            "common_name": "203.0.113.5",
            "status": "issued"
        }"#;
        let cert: CertificateInfo = serde_json::from_str(json).unwrap();
        assert_eq!(cert.status, CertificateStatus::Issued);
        assert!(cert.validation.is_none());
    }

    #[test]
    fn download_bundle_uses_dotted_keys() {
        let json = r#"{"certificate.crt": "leaf", "ca_bundle.crt": "bundle"}"#;
        let bundle: CertificateBundle = serde_json::from_str(json).unwrap();
        assert_eq!(bundle.certificate, "leaf");
        assert_eq!(bundle.ca_bundle, "bundle");
    }
}
