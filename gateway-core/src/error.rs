//! Error types for the Kerberos retry engine.
//!
//! Each variant corresponds to a failure class a flow can encounter. Every
//! non-fatal variant is handled by the pipeline driver by leaving the
//! original upstream response untouched; see [`crate::pipeline`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be validated at load time. Fatal at startup.
    #[error("configuration invalid: {0}")]
    ConfigurationInvalid(String),

    /// No keytab file exists for the given username.
    #[error("keytab missing for {username}: {path}")]
    KeytabMissing { username: String, path: String },

    /// `klist` ran but produced no principal line for the configured realm.
    #[error("could not resolve principal for {username} in realm {realm}")]
    PrincipalUnresolved { username: String, realm: String },

    /// `kinit` exited with a non-zero status.
    #[error("kinit failed for {principal} (exit code {exit_code:?})")]
    KinitFailed {
        principal: String,
        exit_code: Option<i32>,
    },

    /// GSSAPI token generation failed.
    #[error("spnego exchange failed for {principal} against {target}: {source}")]
    SpnegoExchangeFailed {
        principal: String,
        target: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The retry HTTP request to the upstream failed.
    #[error("upstream io error: {0}")]
    UpstreamIoError(#[from] reqwest::Error),

    /// Spawning or awaiting a `kinit`/`klist` child process failed.
    #[error("failed to run {command}: {source}")]
    SubprocessIoError {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
