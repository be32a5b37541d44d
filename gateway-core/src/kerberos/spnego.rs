//! SPNEGO token generation via GSSAPI.
//!
//! Generates an `Authorization: Negotiate <token>` value targeting
//! `HTTP@<upstream_host>` for a principal already logged in by the
//! credential cache. GSSAPI calls block, so the exchange runs on a
//! blocking worker thread rather than the async event loop.

use base64::Engine;
use libgssapi::{
    context::{ClientCtx, CtxFlags},
    credential::{Cred, CredUsage},
    name::Name,
    oid::{Oid, OidSet, GSS_MECH_KRB5, GSS_NT_HOSTBASED_SERVICE, GSS_NT_USER_NAME},
};

use crate::error::Error;

/// SPNEGO negotiation mechanism OID, 1.3.6.1.5.5.2. `libgssapi` does not
/// export it as a constant alongside `GSS_MECH_KRB5`.
const GSS_MECH_SPNEGO: Oid = Oid::from_slice(&[0x2b, 0x06, 0x01, 0x05, 0x05, 0x02]);

/// Generates the opportunistic SPNEGO token for `principal` against
/// `upstream_host` and returns the full header value. Opportunistic: no
/// server challenge token is fed back in, since the retry action replaces
/// the whole request/response exchange rather than continuing one.
pub async fn negotiate_header(principal: &str, upstream_host: &str) -> Result<String, Error> {
    let principal = principal.to_string();
    let upstream_host = upstream_host.to_string();
    tokio::task::spawn_blocking(move || negotiate_header_blocking(&principal, &upstream_host))
        .await
        .map_err(|e| Error::SpnegoExchangeFailed {
            principal: String::new(),
            target: String::new(),
            source: Box::new(e),
        })?
}

fn negotiate_header_blocking(principal: &str, upstream_host: &str) -> Result<String, Error> {
    let target = format!("HTTP@{upstream_host}");
    let wrap = |source: libgssapi::error::Error| Error::SpnegoExchangeFailed {
        principal: principal.to_string(),
        target: target.clone(),
        source: Box::new(source),
    };

    let mut mechs = OidSet::new().map_err(wrap)?;
    mechs.add(&GSS_MECH_SPNEGO).map_err(wrap)?;
    mechs.add(&GSS_MECH_KRB5).map_err(wrap)?;

    let client_name = Name::new(principal.as_bytes(), Some(&GSS_NT_USER_NAME)).map_err(wrap)?;
    let cred = Cred::acquire(Some(&client_name), None, CredUsage::Initiate, Some(&mechs))
        .map_err(wrap)?;

    let service_name =
        Name::new(target.as_bytes(), Some(&GSS_NT_HOSTBASED_SERVICE)).map_err(wrap)?;

    let mut ctx = ClientCtx::new(
        Some(cred),
        service_name,
        CtxFlags::GSS_C_MUTUAL_FLAG,
        Some(&GSS_MECH_SPNEGO),
    );

    let token = ctx
        .step(None, None)
        .map_err(wrap)?
        .ok_or_else(|| Error::SpnegoExchangeFailed {
            principal: principal.to_string(),
            target: target.clone(),
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no token produced for single-leg SPNEGO exchange",
            )),
        })?;

    let encoded = base64::engine::general_purpose::STANDARD.encode(&token[..]);
    Ok(format!("Negotiate {encoded}"))
}
