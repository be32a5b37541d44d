//! The Kerberos credential cache: principal resolution and ticket refresh.
//!
//! All `kinit` invocations and writes to the login timestamps happen while
//! holding `logins`, a single cooperative lock shared by every username.
//! This matches the on-disk `KRB5CCNAME=DIR:...` cache being shared mutable
//! state: overlapping `kinit` runs against it are unsafe to run concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Abstracts over spawning `kinit`/`klist` so tests can inject a fake runner
/// instead of shelling out to real Kerberos tooling.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<std::process::Output>;
}

/// Runs `kinit`/`klist` as real child processes via `tokio::process`.
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<std::process::Output> {
        tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
    }
}

pub struct KerberosCache {
    keytabs_path: String,
    realm: String,
    expiration: Duration,
    runner: Arc<dyn ProcessRunner>,
    principals: Mutex<HashMap<String, String>>,
    logins: Mutex<HashMap<String, Instant>>,
}

impl KerberosCache {
    pub fn new(keytabs_path: String, realm: String, expiration: Duration) -> Self {
        Self::with_runner(keytabs_path, realm, expiration, Arc::new(TokioProcessRunner))
    }

    pub fn with_runner(
        keytabs_path: String,
        realm: String,
        expiration: Duration,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        KerberosCache {
            keytabs_path,
            realm,
            expiration,
            runner,
            principals: Mutex::new(HashMap::new()),
            logins: Mutex::new(HashMap::new()),
        }
    }

    fn keytab_path(&self, username: &str) -> String {
        format!("{}/{}.keytab", self.keytabs_path.trim_end_matches('/'), username)
    }

    /// Resolves and memoizes the principal for `username` by invoking
    /// `klist -kt <keytab>` and selecting the last field of the first line
    /// ending in `@<realm>`.
    pub async fn principal_for(&self, username: &str) -> Result<String> {
        {
            let principals = self.principals.lock().await;
            if let Some(principal) = principals.get(username) {
                return Ok(principal.clone());
            }
        }

        let path = self.keytab_path(username);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(Error::KeytabMissing {
                username: username.to_string(),
                path,
            });
        }

        let output = self
            .runner
            .run("klist", &["-kt".to_string(), path.clone()])
            .await
            .map_err(|source| Error::SubprocessIoError {
                command: format!("klist -kt {path}"),
                source,
            })?;

        if !output.status.success() {
            return Err(Error::PrincipalUnresolved {
                username: username.to_string(),
                realm: self.realm.clone(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let suffix = format!("@{}", self.realm);
        let principal = stdout
            .lines()
            .filter_map(|line| line.split_whitespace().last())
            .find(|token| token.ends_with(&suffix))
            .map(str::to_string);

        match principal {
            Some(principal) => {
                let mut principals = self.principals.lock().await;
                principals.insert(username.to_string(), principal.clone());
                Ok(principal)
            }
            None => Err(Error::PrincipalUnresolved {
                username: username.to_string(),
                realm: self.realm.clone(),
            }),
        }
    }

    /// True iff a prior `login` for `username` is still within the
    /// configured expiration window. Reads the login timestamps under the
    /// same lock `login` writes under, but briefly: callers never block an
    /// in-flight `kinit` for longer than the lock hand-off.
    pub async fn has_valid_login(&self, username: &str) -> bool {
        let logins = self.logins.lock().await;
        logins
            .get(username)
            .map(|last| last.elapsed() <= self.expiration)
            .unwrap_or(false)
    }

    /// Ensures a valid ticket for `username` exists, refreshing it via
    /// `kinit` if `refresh` is set or no valid prior login is recorded.
    /// Every `kinit` invocation across every username is serialized by
    /// `logins`'s lock.
    pub async fn login(&self, username: &str, refresh: bool) -> Result<String> {
        let principal = self.principal_for(username).await?;

        let mut logins = self.logins.lock().await;
        if !refresh {
            if let Some(last) = logins.get(username) {
                if last.elapsed() <= self.expiration {
                    return Ok(principal);
                }
            }
        }

        let path = self.keytab_path(username);
        let output = self
            .runner
            .run(
                "kinit",
                &["-kt".to_string(), path.clone(), principal.clone()],
            )
            .await
            .map_err(|source| Error::SubprocessIoError {
                command: format!("kinit -kt {path} {principal}"),
                source,
            })?;

        if !output.status.success() {
            return Err(Error::KinitFailed {
                principal,
                exit_code: output.status.code(),
            });
        }

        logins.insert(username.to_string(), Instant::now());
        Ok(principal)
    }
}
