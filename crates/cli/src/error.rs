//! Error types for the issuance tool.
//!
//! The taxonomy separates failures that abort the whole process
//! (configuration and state-file load problems) from failures that
//! abort only the current identity's workflow (CA, hook, filesystem).

use std::path::PathBuf;

use thiserror::Error;

use ipcert_zerossl::{CsrError, ZeroSslError};

/// Fatal-at-startup or per-identity configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("unsupported ECDSA curve: {0}")]
    UnsupportedCurve(String),

    #[error("unsupported validation method: {0}")]
    UnsupportedValidationMethod(String),
}

/// State-file failures. Fatal on load; logged and swallowed on save.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse state file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to serialize state: {0}")]
    Serialize(serde_yaml::Error),
}

/// Operator hook failures. Abort the current identity only.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook executable {0} not found")]
    NotFound(PathBuf),

    #[error("failed to spawn hook {path}: {source}")]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("hook {path} exited with status {status}")]
    Failed { path: PathBuf, status: i32 },
}

/// Everything that can end one identity's issuance workflow.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("key/CSR generation failed: {0}")]
    Csr(#[from] CsrError),

    #[error(transparent)]
    Ca(#[from] ZeroSslError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no validation challenge returned for {0}")]
    MissingChallenge(String),

    #[error("invalid file validation URL {url}: {source}")]
    InvalidValidationUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("certificate verification failed, still in draft status")]
    StillDraft,
}
