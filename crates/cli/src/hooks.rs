//! Operator hook execution.
//!
//! Hooks are operator-supplied executables driven through a fixed
//! environment-variable contract: the validation hook publishes the
//! CA's file-validation challenge on external infrastructure, the post
//! hook reacts to a freshly published certificate (reloading a web
//! server, usually). Zero exit status means success.

use std::path::Path;

use tokio::process::Command;
use tracing::{info, warn};
use url::Url;

use ipcert_zerossl::models::DomainValidation;

use crate::error::{HookError, IssueError};

/// Host serving the validation file.
pub const ENV_FV_HOST: &str = "HTTP_FV_HOST";
/// URL path the CA will fetch.
pub const ENV_FV_PATH: &str = "HTTP_FV_PATH";
/// Port the CA will connect to, `"80"` when the URL has none.
pub const ENV_FV_PORT: &str = "HTTP_FV_PORT";
/// Newline-joined lines of the validation file body.
pub const ENV_FV_CONTENT: &str = "HTTP_FV_CONTENT";
/// Final certificate-chain path, passed to the post hook.
pub const ENV_CERT_FPATH: &str = "CERT_FPATH";
/// Final private-key path, passed to the post hook.
pub const ENV_KEY_FPATH: &str = "KEY_FPATH";

/// Translate an HTTP file-validation challenge into the validation
/// hook's environment contract.
pub fn validation_env(
    challenge: &DomainValidation,
) -> Result<Vec<(String, String)>, IssueError> {
    let url = Url::parse(&challenge.file_validation_url_http).map_err(|source| {
        IssueError::InvalidValidationUrl {
            url: challenge.file_validation_url_http.clone(),
            source,
        }
    })?;
    let host = url.host_str().unwrap_or_default().to_string();
    let port = url
        .port()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "80".to_string());
    let path = url.path().to_string();
    let content = challenge.file_validation_content.join("\n");

    Ok(vec![
        (ENV_FV_HOST.to_string(), host),
        (ENV_FV_PATH.to_string(), path),
        (ENV_FV_PORT.to_string(), port),
        (ENV_FV_CONTENT.to_string(), content),
    ])
}

/// Run a hook with the given extra environment, inheriting stdio.
///
/// A missing path is a configuration error; a non-zero exit is a hook
/// failure carrying the status.
pub async fn run_hook(path: &Path, env: &[(String, String)]) -> Result<(), HookError> {
    if !path.exists() {
        return Err(HookError::NotFound(path.to_path_buf()));
    }
    make_executable(path);

    info!(hook = %path.display(), "running hook");
    let status = Command::new(path)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .status()
        .await
        .map_err(|source| HookError::Spawn {
            path: path.to_path_buf(),
            source,
        })?;

    if !status.success() {
        return Err(HookError::Failed {
            path: path.to_path_buf(),
            status: status.code().unwrap_or(-1),
        });
    }
    Ok(())
}

/// Best-effort `chmod +x`; the subsequent spawn is the authoritative
/// check, so a failure here is only logged.
fn make_executable(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let result = std::fs::metadata(path).and_then(|meta| {
            let mut perms = meta.permissions();
            perms.set_mode(perms.mode() | 0o111);
            std::fs::set_permissions(path, perms)
        });
        if let Err(e) = result {
            warn!(hook = %path.display(), error = %e, "could not mark hook executable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        path
    }

    fn challenge(url: &str, content: &[&str]) -> DomainValidation {
        DomainValidation {
            file_validation_url_http: url.to_string(),
            file_validation_content: content.iter().map(|s| s.to_string()).collect(),
            ..DomainValidation::default()
        }
    }

    #[test]
    fn validation_env_defaults_port_80() {
        let env = validation_env(&challenge(
            "http://203.0.113.5/.well-known/pki-validation/fileauth.txt",
            &["a", "b", "c"],
        ))
        .unwrap();

        let lookup = |key: &str| {
            env.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        assert_eq!(lookup(ENV_FV_HOST), "203.0.113.5");
        assert_eq!(lookup(ENV_FV_PATH), "/.well-known/pki-validation/fileauth.txt");
        assert_eq!(lookup(ENV_FV_PORT), "80");
        assert_eq!(lookup(ENV_FV_CONTENT), "a\nb\nc");
    }

    #[test]
    fn validation_env_keeps_explicit_port() {
        let env = validation_env(&challenge("http://203.0.113.5:8080/check.txt", &["x"])).unwrap();
        assert!(env.contains(&(ENV_FV_PORT.to_string(), "8080".to_string())));
    }

    #[test]
    fn validation_env_rejects_garbage_url() {
        let err = validation_env(&challenge("not a url", &[])).unwrap_err();
        assert!(matches!(err, IssueError::InvalidValidationUrl { .. }));
    }

    #[tokio::test]
    async fn hook_receives_environment() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out.txt");
        let script = write_script(
            temp.path(),
            "hook.sh",
            "printf '%s:%s' \"$HTTP_FV_HOST\" \"$HTTP_FV_PORT\" > \"$HOOK_OUT\"",
        );

        let env = vec![
            (ENV_FV_HOST.to_string(), "203.0.113.5".to_string()),
            (ENV_FV_PORT.to_string(), "80".to_string()),
            ("HOOK_OUT".to_string(), out.display().to_string()),
        ];
        run_hook(&script, &env).await.unwrap();

        assert_eq!(std::fs::read_to_string(&out).unwrap(), "203.0.113.5:80");
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_failure() {
        let temp = TempDir::new().unwrap();
        let script = write_script(temp.path(), "fail.sh", "exit 3");

        let err = run_hook(&script, &[]).await.unwrap_err();
        match err {
            HookError::Failed { status, .. } => assert_eq!(status, 3),
            other => panic!("expected failed hook, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_hook_is_a_configuration_error() {
        let err = run_hook(Path::new("/nonexistent/hook.sh"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::NotFound(_)));
    }
}
