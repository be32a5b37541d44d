//! Pure predicate filters that classify a response as "needs Kerberos".

use http::{header, HeaderValue, Method};
use url::Url;

use crate::config::Config;
use crate::flow::Flow;

/// True iff the response status is a configured SPNEGO denial code and the
/// `WWW-Authenticate` header is exactly `Negotiate`, or begins with the
/// literal prefix `Negotiate ` (space-terminated). Any other value,
/// including `Negotiate-NonStandard`, is rejected.
pub fn check_spnego(flow: &Flow, config: &Config) -> bool {
    if !config.spnego_codes.contains(&flow.response.status.as_u16()) {
        return false;
    }
    flow.response
        .headers
        .get(header::WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "Negotiate" || v.starts_with("Negotiate "))
        .unwrap_or(false)
}

/// True iff the response redirects a `GET` to a configured KNOX endpoint.
/// When a non-empty user agent override is configured, mutates
/// `flow.request`'s `User-Agent` as a side effect before returning `true` —
/// the retried request must see the override.
pub fn check_knox(flow: &mut Flow, config: &Config) -> bool {
    if !config.knox_codes.contains(&flow.response.status.as_u16()) {
        return false;
    }
    if flow.request.method != Method::GET {
        return false;
    }

    let location = match flow
        .response
        .headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
    {
        Some(s) if !s.is_empty() => s,
        _ => return false,
    };

    let location_url = match Url::parse(location).or_else(|_| flow.request.url.join(location)) {
        Ok(u) => u,
        Err(_) => return false,
    };

    let matches = config.knox_urls.iter().any(|knox| {
        knox.host_str() == location_url.host_str()
            && knox.port_or_known_default() == location_url.port_or_known_default()
            && location_url.path().starts_with(knox.path())
    });
    if !matches {
        return false;
    }

    if let Some(ua) = &config.knox_user_agent_override {
        if let Ok(value) = HeaderValue::from_str(ua) {
            flow.request.headers.insert(header::USER_AGENT, value);
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{Request, Response};
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};
    use std::collections::HashSet;

    fn base_config() -> Config {
        Config {
            realm: "EXAMPLE.COM".to_string(),
            spnego_codes: HashSet::from([401]),
            knox_urls: vec![Url::parse("http://knox.example/some").unwrap()],
            knox_codes: HashSet::from([302]),
            knox_user_agent_override: Some("curl/7.61.1".to_string()),
            keytabs_path: "/etc/security/keytabs".to_string(),
            cache_expiration: std::time::Duration::from_secs(3600),
            host_mappings: Vec::new(),
        }
    }

    fn flow_with(status: StatusCode, headers: Vec<(http::HeaderName, &str)>, method: Method) -> Flow {
        let mut response_headers = HeaderMap::new();
        for (name, value) in headers {
            response_headers.insert(name, HeaderValue::from_str(value).unwrap());
        }
        Flow::new(
            Request {
                method,
                url: Url::parse("http://example.com/path").unwrap(),
                headers: HeaderMap::new(),
                body: Bytes::new(),
            },
            Response {
                status,
                headers: response_headers,
                body: Bytes::new(),
            },
        )
    }

    #[test]
    fn spnego_fires_on_exact_negotiate() {
        let flow = flow_with(
            StatusCode::UNAUTHORIZED,
            vec![(header::WWW_AUTHENTICATE, "Negotiate")],
            Method::GET,
        );
        assert!(check_spnego(&flow, &base_config()));
    }

    #[test]
    fn spnego_fires_on_negotiate_with_token() {
        let flow = flow_with(
            StatusCode::UNAUTHORIZED,
            vec![(header::WWW_AUTHENTICATE, "Negotiate dG9rZW4=")],
            Method::GET,
        );
        assert!(check_spnego(&flow, &base_config()));
    }

    #[test]
    fn spnego_rejects_non_standard_scheme() {
        let flow = flow_with(
            StatusCode::UNAUTHORIZED,
            vec![(header::WWW_AUTHENTICATE, "Negotiate-NonStandard")],
            Method::GET,
        );
        assert!(!check_spnego(&flow, &base_config()));
    }

    #[test]
    fn spnego_ignores_unconfigured_status_code() {
        let flow = flow_with(
            StatusCode::TOO_MANY_REQUESTS,
            vec![(header::WWW_AUTHENTICATE, "Negotiate")],
            Method::GET,
        );
        assert!(!check_spnego(&flow, &base_config()));
    }

    #[test]
    fn spnego_never_fires_with_empty_code_set() {
        let mut config = base_config();
        config.spnego_codes = HashSet::new();
        let flow = flow_with(
            StatusCode::UNAUTHORIZED,
            vec![(header::WWW_AUTHENTICATE, "Negotiate")],
            Method::GET,
        );
        assert!(!check_spnego(&flow, &config));
    }

    #[test]
    fn knox_fires_and_applies_user_agent_override() {
        let mut flow = flow_with(
            StatusCode::FOUND,
            vec![(header::LOCATION, "http://knox.example/some/stuff")],
            Method::GET,
        );
        assert!(check_knox(&mut flow, &base_config()));
        assert_eq!(
            flow.request.headers.get(header::USER_AGENT).unwrap(),
            "curl/7.61.1"
        );
    }

    #[test]
    fn knox_does_not_fire_on_unrelated_path() {
        let mut flow = flow_with(
            StatusCode::FOUND,
            vec![(header::LOCATION, "http://knox.example/other/path")],
            Method::GET,
        );
        assert!(!check_knox(&mut flow, &base_config()));
    }

    #[test]
    fn knox_does_not_fire_for_non_get_methods() {
        let mut flow = flow_with(
            StatusCode::FOUND,
            vec![(header::LOCATION, "http://knox.example/some/stuff")],
            Method::POST,
        );
        assert!(!check_knox(&mut flow, &base_config()));
    }

    #[test]
    fn knox_without_override_leaves_headers_untouched() {
        let mut config = base_config();
        config.knox_user_agent_override = None;
        let mut flow = flow_with(
            StatusCode::FOUND,
            vec![(header::LOCATION, "http://knox.example/some/stuff")],
            Method::GET,
        );
        assert!(check_knox(&mut flow, &config));
        assert!(flow.request.headers.get(header::USER_AGENT).is_none());
    }
}
