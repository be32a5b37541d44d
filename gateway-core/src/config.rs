//! Configuration for the Kerberos/SPNEGO retry engine.
//!
//! Configuration is loaded once from environment variables at startup and can be
//! rebuilt via [`Config::from_env`] on reconfiguration. Validation happens eagerly
//! so a misconfigured deployment fails at startup instead of on the first flow.

use std::collections::HashSet;
use std::env;
use std::time::Duration;

use url::Url;

use crate::error::Error;

const DEFAULT_REALM: &str = "LOCALHOST";
const DEFAULT_SPNEGO_CODES: &str = "401";
const DEFAULT_KNOX_CODES: &str = "302";
const DEFAULT_KNOX_USER_AGENT: &str = "curl/7.61.1";
const DEFAULT_KEYTABS_PATH: &str = "/etc/security/keytabs/";
const DEFAULT_CACHE_EXPIRATION: &str = "12h";

/// A single `public -> internal` host rewrite applied on the request path and
/// inverted on the response path for redirects.
#[derive(Debug, Clone)]
pub struct HostMapping {
    pub public: Url,
    pub internal: Url,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub realm: String,
    pub spnego_codes: HashSet<u16>,
    pub knox_urls: Vec<Url>,
    pub knox_codes: HashSet<u16>,
    /// `User-Agent` applied before a KNOX-triggered retry. `None` disables the override.
    pub knox_user_agent_override: Option<String>,
    pub keytabs_path: String,
    pub cache_expiration: Duration,
    pub host_mappings: Vec<HostMapping>,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_env_with(|name| env::var(name).ok())
    }

    /// Testable seam: builds a `Config` from an arbitrary lookup function instead
    /// of the process environment.
    pub(crate) fn from_env_with(getter: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let krb5ccname = getter("KRB5CCNAME").unwrap_or_default();
        if !krb5ccname.starts_with("DIR:") {
            return Err(Error::ConfigurationInvalid(format!(
                "KRB5CCNAME must start with \"DIR:\", got {krb5ccname:?}"
            )));
        }

        let realm = getter("kerberos_realm").unwrap_or_else(|| DEFAULT_REALM.to_string());

        let spnego_codes = parse_codes(
            &getter("kerberos_spnego_codes").unwrap_or_else(|| DEFAULT_SPNEGO_CODES.to_string()),
        )?;
        let knox_codes = parse_codes(
            &getter("kerberos_knox_codes").unwrap_or_else(|| DEFAULT_KNOX_CODES.to_string()),
        )?;
        let knox_urls = parse_urls(&getter("kerberos_knox_urls").unwrap_or_default())?;

        let knox_user_agent_override = match getter("kerberos_knox_user_agent_override") {
            Some(ua) if ua.is_empty() => None,
            Some(ua) => Some(ua),
            None => Some(DEFAULT_KNOX_USER_AGENT.to_string()),
        };

        let keytabs_path =
            getter("kerberos_keytabs_path").unwrap_or_else(|| DEFAULT_KEYTABS_PATH.to_string());

        let cache_expiration = parse_duration(
            &getter("kerberos_cache_expiration")
                .unwrap_or_else(|| DEFAULT_CACHE_EXPIRATION.to_string()),
        )?;

        let host_mappings = parse_host_mappings(&getter("hosts_mappings").unwrap_or_default())?;

        Ok(Config {
            realm,
            spnego_codes,
            knox_urls,
            knox_codes,
            knox_user_agent_override,
            keytabs_path,
            cache_expiration,
            host_mappings,
        })
    }

    /// Path to the keytab file for `username`, per the `<keytabs_path>/<username>.keytab`
    /// layout documented for the credential cache.
    pub fn keytab_path_for(&self, username: &str) -> String {
        format!("{}/{}.keytab", self.keytabs_path.trim_end_matches('/'), username)
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
}

fn parse_codes(raw: &str) -> Result<HashSet<u16>, Error> {
    split_list(raw)
        .map(|tok| {
            tok.parse::<u16>()
                .map_err(|_| Error::ConfigurationInvalid(format!("invalid status code: {tok:?}")))
        })
        .collect()
}

fn parse_urls(raw: &str) -> Result<Vec<Url>, Error> {
    split_list(raw)
        .map(|tok| {
            Url::parse(tok)
                .map_err(|e| Error::ConfigurationInvalid(format!("invalid URL {tok:?}: {e}")))
        })
        .collect()
}

fn parse_host_mappings(raw: &str) -> Result<Vec<HostMapping>, Error> {
    split_list(raw)
        .map(|tok| {
            let (public, internal) = tok.split_once('=').ok_or_else(|| {
                Error::ConfigurationInvalid(format!("host mapping missing '=': {tok:?}"))
            })?;
            let public = Url::parse(public).map_err(|e| {
                Error::ConfigurationInvalid(format!("invalid public URL {public:?}: {e}"))
            })?;
            let internal = Url::parse(internal).map_err(|e| {
                Error::ConfigurationInvalid(format!("invalid internal URL {internal:?}: {e}"))
            })?;
            Ok(HostMapping { public, internal })
        })
        .collect()
}

/// Accepts `<int>(s|m|h|d)`: one integer magnitude and exactly one unit suffix.
/// Compound durations such as `1h30m` are rejected.
fn parse_duration(raw: &str) -> Result<Duration, Error> {
    let raw = raw.trim();
    let invalid = || Error::ConfigurationInvalid(format!("invalid duration: {raw:?}"));

    if raw.is_empty() {
        return Err(invalid());
    }
    let (digits, unit) = raw.split_at(raw.len() - 1);
    let magnitude: u64 = digits.parse().map_err(|_| invalid())?;
    let secs = match unit {
        "s" => magnitude,
        "m" => magnitude * 60,
        "h" => magnitude * 60 * 60,
        "d" => magnitude * 60 * 60 * 24,
        _ => return Err(invalid()),
    };
    Ok(Duration::from_secs(secs))
}
