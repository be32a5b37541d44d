//! Kerberos/SPNEGO authentication retry engine for a forwarding HTTP proxy.
//!
//! A client authenticates to the proxy once with ordinary HTTP Basic
//! credentials. This crate inspects upstream responses, detects a SPNEGO
//! challenge or a redirect to a known identity gateway, and resends the
//! upstream request with a Kerberos ticket belonging to the client —
//! without the client ever needing Kerberos libraries or keytabs itself.
//!
//! The host proxy that terminates client connections, validates Basic
//! auth, and forwards HTTP messages is an external collaborator: it
//! constructs a [`flow::Flow`] per intercepted response and drives it
//! through [`pipeline::Pipeline`].

pub mod config;
pub mod error;
pub mod filters;
pub mod flow;
pub mod kerberos;
pub mod pipeline;

pub use config::Config;
pub use error::Error;
pub use flow::Flow;
pub use pipeline::Pipeline;

/// Initializes `env_logger` from `RUST_LOG`. Convenience for host
/// processes that embed this crate and have no logger of their own set up
/// yet; has no effect if a logger is already installed.
pub fn init_logging() {
    let _ = env_logger::try_init();
}
