//! Host remap filter pair sharing the `mapped_urls` metadata key.

use http::HeaderValue;
use url::Url;

use crate::config::HostMapping;
use crate::flow::Flow;

/// Rewrites `flow.request.url` to its internal equivalent for the first
/// matching configured mapping, preserving path suffix, query, and
/// fragment, and records the winning pair in `flow.metadata` for the
/// response-path counterpart. No-op if no mapping matches.
pub fn remap_request_hosts(flow: &mut Flow, mappings: &[HostMapping]) {
    let request_url = flow.request.url.clone();
    for mapping in mappings {
        if let Some(internal_url) = rewrite(&request_url, &mapping.public, &mapping.internal) {
            flow.request.url = internal_url;
            flow.metadata
                .set_mapped_urls(mapping.public.clone(), mapping.internal.clone());
            return;
        }
    }
}

/// Rewrites the `Location` header of a 3xx response by the inverse of the
/// mapping recorded in `flow.metadata`. No-op if no mapping was recorded or
/// the response is not a redirect.
pub fn remap_redirect_response_hosts(flow: &mut Flow) {
    if !flow.response.status.is_redirection() {
        return;
    }
    let Some((public, internal)) = flow.metadata.mapped_urls() else {
        return;
    };
    let public = public.clone();
    let internal = internal.clone();

    let Some(location_str) = flow
        .response
        .headers
        .get(http::header::LOCATION)
        .and_then(|v| v.to_str().ok())
    else {
        return;
    };
    let Ok(location_url) = Url::parse(location_str) else {
        return;
    };

    if let Some(rewritten) = rewrite(&location_url, &internal, &public) {
        if let Ok(value) = HeaderValue::from_str(rewritten.as_str()) {
            flow.response.headers.insert(http::header::LOCATION, value);
        }
    }
}

/// If `url` matches `from`'s host, port, and path prefix, returns `url` with
/// that prefix replaced by `to`, preserving `url`'s remaining path, query,
/// and fragment.
fn rewrite(url: &Url, from: &Url, to: &Url) -> Option<Url> {
    if url.host_str() != from.host_str() {
        return None;
    }
    if url.port_or_known_default() != from.port_or_known_default() {
        return None;
    }
    let suffix = url.path().strip_prefix(from.path())?;

    let mut rewritten = to.clone();
    let new_path = format!("{}{}", to.path().trim_end_matches('/'), suffix);
    rewritten.set_path(&new_path);
    rewritten.set_query(url.query());
    rewritten.set_fragment(url.fragment());
    Some(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{Request, Response};
    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode};

    fn mapping(public: &str, internal: &str) -> HostMapping {
        HostMapping {
            public: Url::parse(public).unwrap(),
            internal: Url::parse(internal).unwrap(),
        }
    }

    fn flow_for(url: &str) -> Flow {
        Flow::new(
            Request {
                method: Method::GET,
                url: Url::parse(url).unwrap(),
                headers: HeaderMap::new(),
                body: Bytes::new(),
            },
            Response {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Bytes::new(),
            },
        )
    }

    #[test]
    fn remaps_request_and_records_metadata() {
        let mappings = vec![mapping(
            "http://example0.com/v1",
            "http://internal0/api/v1",
        )];
        let mut flow = flow_for("http://example0.com/v1/some/path");

        remap_request_hosts(&mut flow, &mappings);

        assert_eq!(
            flow.request.url.as_str(),
            "http://internal0/api/v1/some/path"
        );
        assert!(flow.metadata.mapped_urls().is_some());
    }

    #[test]
    fn no_match_leaves_request_untouched() {
        let mappings = vec![mapping(
            "http://example0.com/v1",
            "http://internal0/api/v1",
        )];
        let mut flow = flow_for("http://other.com/v1/some/path");

        remap_request_hosts(&mut flow, &mappings);

        assert_eq!(flow.request.url.as_str(), "http://other.com/v1/some/path");
        assert!(flow.metadata.mapped_urls().is_none());
    }

    #[test]
    fn rewrites_redirect_location_back_to_public() {
        let mappings = vec![mapping(
            "http://example0.com/v1",
            "http://internal0/api/v1",
        )];
        let mut flow = flow_for("http://example0.com/v1/some/path");
        remap_request_hosts(&mut flow, &mappings);

        flow.response.status = StatusCode::MOVED_PERMANENTLY;
        flow.response.headers.insert(
            http::header::LOCATION,
            HeaderValue::from_static("http://internal0/api/v1/other"),
        );

        remap_redirect_response_hosts(&mut flow);

        assert_eq!(
            flow.response
                .headers
                .get(http::header::LOCATION)
                .unwrap(),
            "http://example0.com/v1/other"
        );
    }

    #[test]
    fn non_redirect_response_is_not_rewritten() {
        let mappings = vec![mapping(
            "http://example0.com/v1",
            "http://internal0/api/v1",
        )];
        let mut flow = flow_for("http://example0.com/v1/some/path");
        remap_request_hosts(&mut flow, &mappings);

        flow.response.status = StatusCode::OK;
        flow.response.headers.insert(
            http::header::LOCATION,
            HeaderValue::from_static("http://internal0/api/v1/other"),
        );

        remap_redirect_response_hosts(&mut flow);

        assert_eq!(
            flow.response
                .headers
                .get(http::header::LOCATION)
                .unwrap(),
            "http://internal0/api/v1/other"
        );
    }
}
