//! HTTPS client for the ZeroSSL certificates API.
//!
//! Every call carries the account access key as a query parameter.
//! Mutating endpoints are form-encoded POSTs; reads are GETs under the
//! `/certificates` path hierarchy. Any HTTP status >= 400 is reported
//! as [`ZeroSslError::Protocol`] without inspecting the body.

use async_trait::async_trait;
use tracing::debug;

use crate::error::ZeroSslError;
use crate::models::{
    CertificateBundle, CertificateInfo, CertificateList, CertificateStatus, ValidationMethod,
    VerificationStatus, VerifyDomainsResponse,
};

/// Public API endpoint.
pub const API_ENDPOINT: &str = "https://api.zerossl.com";

/// One method per ZeroSSL certificate operation.
///
/// Implemented by [`ZeroSslClient`]; tests substitute an in-memory
/// fake. No method retries internally; retry policy, if any, belongs
/// to the caller.
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Create a draft certificate for the given domains and CSR.
    async fn create_certificate(
        &self,
        domains: &str,
        csr: &str,
        validity_days: u32,
        strict_domains: bool,
    ) -> Result<CertificateInfo, ZeroSslError>;

    /// Fetch a certificate by id.
    async fn get_certificate(&self, id: &str) -> Result<CertificateInfo, ZeroSslError>;

    /// Ask the CA to verify the domains of a draft certificate.
    async fn verify_domains(
        &self,
        id: &str,
        method: ValidationMethod,
        validation_email: Option<&str>,
    ) -> Result<VerifyDomainsResponse, ZeroSslError>;

    /// Fetch the verification progress of a certificate.
    async fn verification_status(&self, id: &str) -> Result<VerificationStatus, ZeroSslError>;

    /// Download an issued certificate and its CA bundle inline.
    async fn download_certificate(
        &self,
        id: &str,
        include_cross_signed: bool,
    ) -> Result<CertificateBundle, ZeroSslError>;

    /// List certificates, optionally filtered by status and search term.
    async fn list_certificates(
        &self,
        status: Option<CertificateStatus>,
        search: Option<&str>,
        limit: u32,
        page: u32,
    ) -> Result<CertificateList, ZeroSslError>;

    /// Cancel a pending certificate.
    async fn cancel_certificate(&self, id: &str) -> Result<(), ZeroSslError>;

    /// Delete a certificate.
    async fn delete_certificate(&self, id: &str) -> Result<(), ZeroSslError>;
}

/// Concrete HTTPS client.
#[derive(Debug, Clone)]
pub struct ZeroSslClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ZeroSslClient {
    /// Create a client for the public API endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: API_ENDPOINT.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Map HTTP error statuses to protocol errors before decoding.
fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ZeroSslError> {
    let status = resp.status().as_u16();
    if status >= 400 {
        return Err(ZeroSslError::Protocol { status });
    }
    Ok(resp)
}

#[async_trait]
impl CertificateAuthority for ZeroSslClient {
    async fn create_certificate(
        &self,
        domains: &str,
        csr: &str,
        validity_days: u32,
        strict_domains: bool,
    ) -> Result<CertificateInfo, ZeroSslError> {
        debug!(domains = %domains, validity_days, "creating certificate");
        let form = [
            ("certificate_domains", domains.to_string()),
            ("certificate_csr", csr.to_string()),
            ("certificate_validity_days", validity_days.to_string()),
            (
                "strict_domains",
                if strict_domains { "1" } else { "0" }.to_string(),
            ),
        ];
        let resp = self
            .http
            .post(self.url("/certificates"))
            .query(&[("access_key", self.api_key.as_str())])
            .form(&form)
            .send()
            .await?;
        Ok(check_status(resp)?.json().await?)
    }

    async fn get_certificate(&self, id: &str) -> Result<CertificateInfo, ZeroSslError> {
        let resp = self
            .http
            .get(self.url(&format!("/certificates/{id}")))
            .query(&[("access_key", self.api_key.as_str())])
            .send()
            .await?;
        Ok(check_status(resp)?.json().await?)
    }

    async fn verify_domains(
        &self,
        id: &str,
        method: ValidationMethod,
        validation_email: Option<&str>,
    ) -> Result<VerifyDomainsResponse, ZeroSslError> {
        debug!(cert_id = %id, method = method.as_str(), "requesting domain verification");
        let mut form = vec![("validation_method", method.as_str().to_string())];
        if let Some(email) = validation_email {
            form.push(("validation_email", email.to_string()));
        }
        let resp = self
            .http
            .post(self.url(&format!("/certificates/{id}/challenges")))
            .query(&[("access_key", self.api_key.as_str())])
            .form(&form)
            .send()
            .await?;
        Ok(check_status(resp)?.json().await?)
    }

    async fn verification_status(&self, id: &str) -> Result<VerificationStatus, ZeroSslError> {
        let resp = self
            .http
            .get(self.url(&format!("/certificates/{id}/status")))
            .query(&[("access_key", self.api_key.as_str())])
            .send()
            .await?;
        Ok(check_status(resp)?.json().await?)
    }

    async fn download_certificate(
        &self,
        id: &str,
        include_cross_signed: bool,
    ) -> Result<CertificateBundle, ZeroSslError> {
        let mut query = vec![("access_key", self.api_key.clone())];
        if include_cross_signed {
            query.push(("include_cross_signed", "1".to_string()));
        }
        let resp = self
            .http
            .get(self.url(&format!("/certificates/{id}/download/return")))
            .query(&query)
            .send()
            .await?;
        Ok(check_status(resp)?.json().await?)
    }

    async fn list_certificates(
        &self,
        status: Option<CertificateStatus>,
        search: Option<&str>,
        limit: u32,
        page: u32,
    ) -> Result<CertificateList, ZeroSslError> {
        let mut query = vec![("access_key", self.api_key.clone())];
        if let Some(status) = status {
            query.push(("certificate_status", status.as_str().to_string()));
        }
        if let Some(search) = search {
            query.push(("search", search.to_string()));
        }
        query.push(("limit", limit.to_string()));
        query.push(("page", page.to_string()));
        let resp = self
            .http
            .get(self.url("/certificates"))
            .query(&query)
            .send()
            .await?;
        Ok(check_status(resp)?.json().await?)
    }

    async fn cancel_certificate(&self, id: &str) -> Result<(), ZeroSslError> {
        let resp = self
            .http
            .post(self.url(&format!("/certificates/{id}/cancel")))
            .query(&[("access_key", self.api_key.as_str())])
            .send()
            .await?;
        check_status(resp)?;
        Ok(())
    }

    async fn delete_certificate(&self, id: &str) -> Result<(), ZeroSslError> {
        let resp = self
            .http
            .delete(self.url(&format!("/certificates/{id}")))
            .query(&[("access_key", self.api_key.as_str())])
            .send()
            .await?;
        check_status(resp)?;
        Ok(())
    }
}
