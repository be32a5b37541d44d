//! Top-level response handling: wires the detection filters, the host
//! remap response filter, and the Kerberos retry action together per flow.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;

use crate::config::Config;
use crate::filters::{detect, drive, hosts, FilterId, ResponseFilter};
use crate::flow::Flow;
use crate::kerberos::cache::KerberosCache;
use crate::kerberos::retry;

/// Wraps [`detect::check_spnego`] as a pipeline filter: schedules the
/// Kerberos retry when it fires, otherwise yields no follow-up.
struct SpnegoDetectFilter<'a> {
    config: &'a Config,
}

#[async_trait]
impl<'a> ResponseFilter for SpnegoDetectFilter<'a> {
    fn id(&self) -> FilterId {
        FilterId::CheckSpnego
    }

    async fn run(&self, flow: &mut Flow) -> Vec<FilterId> {
        if detect::check_spnego(flow, self.config) {
            vec![FilterId::KerberosRetry]
        } else {
            Vec::new()
        }
    }
}

/// Wraps [`detect::check_knox`] as a pipeline filter. `check_knox` mutates
/// `flow.request`'s `User-Agent` as a side effect when it fires and a
/// non-empty override is configured.
struct KnoxDetectFilter<'a> {
    config: &'a Config,
}

#[async_trait]
impl<'a> ResponseFilter for KnoxDetectFilter<'a> {
    fn id(&self) -> FilterId {
        FilterId::CheckKnox
    }

    async fn run(&self, flow: &mut Flow) -> Vec<FilterId> {
        if detect::check_knox(flow, self.config) {
            vec![FilterId::KerberosRetry]
        } else {
            Vec::new()
        }
    }
}

/// The terminal action scheduled by either detection filter: resolves the
/// proxy-authenticated username, ensures a valid Kerberos login, and
/// performs the SPNEGO retry. Runs at most once per flow even when both
/// detectors schedule it.
struct KerberosRetryFilter<'a> {
    cache: &'a KerberosCache,
    client: &'a Client,
}

#[async_trait]
impl<'a> ResponseFilter for KerberosRetryFilter<'a> {
    fn id(&self) -> FilterId {
        FilterId::KerberosRetry
    }

    async fn run(&self, flow: &mut Flow) -> Vec<FilterId> {
        let Some(username) = flow.metadata.proxyauth().map(|(u, _)| u.to_string()) else {
            debug!("no proxyauth metadata on flow; leaving response untouched");
            return Vec::new();
        };

        if self.cache.has_valid_login(&username).await {
            debug!("{username} already has a valid kerberos login");
        }
        let principal = match self.cache.login(&username, false).await {
            Ok(principal) => principal,
            Err(err) => {
                info!("kerberos login failed for {username}: {err}");
                return Vec::new();
            }
        };

        if let Err(err) = retry::retry(self.client, flow, &principal).await {
            warn!("kerberos retry failed for {username}: {err}");
        }
        Vec::new()
    }
}

/// Owns the pieces a single proxy process needs to drive flows: the
/// validated configuration, the Kerberos credential cache, and the HTTP
/// client used for retries. Cheap to clone — everything inside is an `Arc`
/// or, for the client, already internally reference-counted.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    cache: Arc<KerberosCache>,
    client: Client,
}

impl Pipeline {
    pub fn new(config: Arc<Config>, cache: Arc<KerberosCache>) -> Result<Self, reqwest::Error> {
        Ok(Pipeline {
            config,
            cache,
            client: retry::build_client()?,
        })
    }

    /// Reloads configuration from the environment and rebuilds the
    /// credential cache, returning a fresh `Pipeline`. Flows already in
    /// flight keep the `Pipeline` clone (and therefore the `Config`/
    /// `KerberosCache` `Arc`s) they were handed, so an in-flight retry is
    /// never disturbed by a concurrent reconfiguration; only flows started
    /// after the caller swaps in the returned `Pipeline` observe the change.
    pub fn reconfigure(&self) -> Result<Self, crate::error::Error> {
        let config = Arc::new(Config::from_env()?);
        let cache = Arc::new(KerberosCache::new(
            config.keytabs_path.clone(),
            config.realm.clone(),
            config.cache_expiration,
        ));
        Pipeline::new(config, cache).map_err(crate::error::Error::UpstreamIoError)
    }

    /// Applies the request-path host remap. The host proxy calls this
    /// before forwarding the request upstream.
    pub fn remap_request(&self, flow: &mut Flow) {
        hosts::remap_request_hosts(flow, &self.config.host_mappings);
    }

    /// The top-level response filter invoked by the host proxy once it has
    /// an upstream response for `flow`. Drives both detection filters through
    /// the work-list pipeline; de-duplication there is what keeps a flow
    /// where both SPNEGO and KNOX fire to a single retry.
    pub async fn response(&self, flow: &mut Flow) {
        hosts::remap_redirect_response_hosts(flow);

        let spnego = SpnegoDetectFilter { config: &self.config };
        let knox = KnoxDetectFilter { config: &self.config };
        let kerberos_retry = KerberosRetryFilter {
            cache: &self.cache,
            client: &self.client,
        };
        let registry: Vec<&dyn ResponseFilter> = vec![&spnego, &knox, &kerberos_retry];

        drive(
            flow,
            &registry,
            vec![FilterId::CheckSpnego, FilterId::CheckKnox],
        )
        .await;
    }
}
