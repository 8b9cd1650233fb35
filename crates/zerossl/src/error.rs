//! Error types for the ZeroSSL client.

use thiserror::Error;

/// Errors surfaced by the API client.
///
/// Transport failures and HTTP error statuses are kept distinct so
/// callers can tell a dead network from a request the CA rejected.
#[derive(Debug, Error)]
pub enum ZeroSslError {
    /// Network-level failure: connect, TLS, body read, or JSON decode
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with an HTTP error status (>= 400), regardless
    /// of body content
    #[error("ZeroSSL API returned status code {status}")]
    Protocol { status: u16 },
}

/// Errors from key-pair generation and CSR construction.
///
/// Unsupported names are configuration errors and are never retried.
#[derive(Debug, Error)]
pub enum CsrError {
    /// Signature algorithm name not in the supported set
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedSignatureAlgorithm(String),

    /// Signature algorithm does not match the key family or curve
    #[error("signature algorithm {sig_alg} cannot be used with {key_type} keys")]
    SignatureAlgorithmMismatch {
        key_type: &'static str,
        sig_alg: String,
    },

    /// RSA key generation failed
    #[error("RSA key generation failed: {0}")]
    RsaGeneration(#[from] rsa::Error),

    /// Private key could not be encoded as PKCS#8 PEM
    #[error("failed to encode private key: {0}")]
    KeyEncoding(#[from] rsa::pkcs8::Error),

    /// Key-pair import or CSR serialization failed
    #[error("CSR construction failed: {0}")]
    Rcgen(#[from] rcgen::Error),
}
