//! The response-phase filter pipeline driver.
//!
//! Filters are named actions rather than closures chained together, so the
//! driver can de-duplicate follow-up work by identity. This is what keeps a
//! flow where both the SPNEGO and KNOX detectors fire to a single retry.

pub mod detect;
pub mod hosts;

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;

use crate::flow::Flow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterId {
    CheckSpnego,
    CheckKnox,
    KerberosRetry,
}

/// A response-phase action identified by a stable [`FilterId`]. `run` may
/// return further filter ids to schedule. Async because the only terminal
/// action in this pipeline — the Kerberos retry — suspends on `kinit`,
/// GSSAPI, and the upstream HTTP send.
#[async_trait]
pub trait ResponseFilter: Send + Sync {
    fn id(&self) -> FilterId;
    async fn run(&self, flow: &mut Flow) -> Vec<FilterId>;
}

/// Drives `initial` through `registry` to completion. Each filter id runs at
/// most once: a follow-up naming an id already run or already queued is
/// dropped. This is what keeps a flow where both `check_spnego` and
/// `check_knox` schedule [`FilterId::KerberosRetry`] to a single retry.
pub async fn drive(flow: &mut Flow, registry: &[&(dyn ResponseFilter)], initial: Vec<FilterId>) {
    let mut remaining: VecDeque<FilterId> = initial.into();
    let mut seen: HashSet<FilterId> = HashSet::new();

    while let Some(id) = remaining.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        if let Some(filter) = registry.iter().find(|f| f.id() == id) {
            for follow_up in filter.run(flow).await {
                if !seen.contains(&follow_up) && !remaining.contains(&follow_up) {
                    remaining.push_back(follow_up);
                }
            }
        }
    }
}
