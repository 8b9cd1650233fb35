//! Typed client for the ZeroSSL certificates API.
//!
//! ZeroSSL is one of the few public certificate authorities that issues
//! TLS certificates for bare IP-address subjects, which it exposes
//! through a plain HTTPS API rather than ACME.
//!
//! # Components
//!
//! - [`CertificateAuthority`] - one async method per API operation,
//!   implemented by [`ZeroSslClient`] and trivially fakeable in tests
//! - [`models`] - wire models matching the documented API schema
//! - [`csr`] - key-pair generation and CSR construction for the
//!   supported RSA and ECDSA algorithm selections
//!
//! The client performs no internal retries; retry policy belongs to the
//! caller.

pub mod client;
pub mod csr;
pub mod error;
pub mod models;

pub use client::{CertificateAuthority, ZeroSslClient, API_ENDPOINT};
pub use error::{CsrError, ZeroSslError};
