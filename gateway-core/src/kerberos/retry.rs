//! Rebuilds an upstream request with a SPNEGO token and replaces the flow's
//! response with the authenticated reply.

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method};
use reqwest::Client;

use crate::error::{Error, Result};
use crate::flow::{Flow, Response};
use crate::kerberos::spnego;

/// Builds the HTTP client used for retries. Redirects are never followed
/// automatically — a 3xx from the retried request is returned to the
/// client as-is, same as any other upstream response.
pub fn build_client() -> reqwest::Result<Client> {
    Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

/// Re-issues `flow.request` with a Kerberos SPNEGO token for `principal`
/// and replaces `flow.response` with the synthesized reply. Leaves the flow
/// untouched on any failure — the caller surfaces the original response.
pub async fn retry(client: &Client, flow: &mut Flow, principal: &str) -> Result<()> {
    let host = flow.request.host().unwrap_or_default().to_string();
    let negotiate = spnego::negotiate_header(principal, &host).await?;

    let mut headers = flow.request.headers.clone();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&negotiate).map_err(|_| Error::SpnegoExchangeFailed {
            principal: principal.to_string(),
            target: format!("HTTP@{host}"),
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "negotiate token is not a valid header value",
            )),
        })?,
    );
    if !headers.contains_key(header::ACCEPT_ENCODING) {
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static(""));
    }

    let response = send(
        client,
        &flow.request.method,
        flow.request.url.as_str(),
        &headers,
        flow.request.body.clone(),
    )
    .await?;

    flow.request.headers = headers;
    flow.set_response(response);
    Ok(())
}

async fn send(
    client: &Client,
    method: &Method,
    url: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let upstream = client
        .request(method.clone(), url)
        .headers(headers.clone())
        .body(body)
        .send()
        .await?;

    let status = upstream.status();
    let mut response_headers = upstream.headers().clone();
    let body = upstream.bytes().await?;

    response_headers.remove(header::WWW_AUTHENTICATE);
    response_headers.remove(header::TRANSFER_ENCODING);
    response_headers.remove(header::CONTENT_ENCODING);
    if body.is_empty() {
        response_headers.remove(header::CONTENT_LENGTH);
    } else {
        response_headers.insert(
            header::CONTENT_LENGTH,
            HeaderValue::from_str(&body.len().to_string()).expect("integer formats to ASCII"),
        );
    }

    Ok(Response {
        status,
        headers: response_headers,
        body,
    })
}
