//! Reverse proxy: forward one request to a fixed upstream URL and stream the answer back.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::TryStreamExt;

/// Not copied to the upstream request: the client library sets them for the new connection
/// and the buffered body.
const SKIPPED_REQUEST_HEADERS: [HeaderName; 4] = [
    header::HOST,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::CONNECTION,
];

/// Not copied back to the caller: framing is redone for the streamed body.
const SKIPPED_RESPONSE_HEADERS: [HeaderName; 2] = [header::TRANSFER_ENCODING, header::CONNECTION];

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Failed to create proxy request: {0}")]
    Build(String),
    #[error("Failed to read request body: {0}")]
    Body(String),
    #[error("Failed to send proxy request: {0}")]
    Upstream(reqwest::Error),
    #[error("Failed to build proxy response: {0}")]
    Response(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Forward `req` (method, headers, raw query, body) to `upstream` and relay status, headers,
/// and body. Never retries; failures become 500 (local) or 502 (upstream).
pub async fn forward(
    client: &reqwest::Client,
    upstream: &str,
    req: Request,
    max_body_bytes: usize,
) -> Response {
    match try_forward(client, upstream, req, max_body_bytes).await {
        Ok(res) => res,
        Err(e) => {
            log::warn!("proxy to {} failed: {}", upstream, e);
            e.into_response()
        }
    }
}

async fn try_forward(
    client: &reqwest::Client,
    upstream: &str,
    req: Request,
    max_body_bytes: usize,
) -> Result<Response, ProxyError> {
    let (parts, body) = req.into_parts();
    let mut url = reqwest::Url::parse(upstream).map_err(|e| ProxyError::Build(e.to_string()))?;
    url.set_query(parts.uri.query());

    let body = axum::body::to_bytes(body, max_body_bytes)
        .await
        .map_err(|e| ProxyError::Body(e.to_string()))?;

    let mut builder = client
        .request(parts.method, url)
        .headers(outbound_headers(&parts.headers));
    if !body.is_empty() {
        builder = builder.body(body);
    }
    let upstream_res = builder.send().await.map_err(|e| {
        if e.is_builder() {
            ProxyError::Build(e.to_string())
        } else {
            ProxyError::Upstream(e)
        }
    })?;

    let mut response = Response::builder().status(upstream_res.status());
    if let Some(headers) = response.headers_mut() {
        for (name, value) in upstream_res.headers() {
            if !SKIPPED_RESPONSE_HEADERS.contains(name) {
                headers.append(name.clone(), value.clone());
            }
        }
    }
    let stream = upstream_res.bytes_stream().map_err(std::io::Error::other);
    response
        .body(Body::from_stream(stream))
        .map_err(|e| ProxyError::Response(e.to_string()))
}

/// Every inbound header (all values, in order) minus the connection-specific ones.
fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if !SKIPPED_REQUEST_HEADERS.contains(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn outbound_headers_keep_repeated_values() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("gateway:8080"));
        inbound.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        inbound.append("x-hub-signature-256", HeaderValue::from_static("sha256=abc"));
        inbound.append("x-trace", HeaderValue::from_static("a"));
        inbound.append("x-trace", HeaderValue::from_static("b"));
        let out = outbound_headers(&inbound);
        assert!(out.get(header::HOST).is_none());
        assert!(out.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(out.get("x-hub-signature-256").unwrap(), "sha256=abc");
        let traces: Vec<_> = out.get_all("x-trace").iter().collect();
        assert_eq!(traces, vec!["a", "b"]);
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            ProxyError::Build("bad url".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProxyError::Body("too large".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn unreachable_upstream_is_bad_gateway() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let client = reqwest::Client::new();
        let req = Request::builder()
            .uri("/generate")
            .method("POST")
            .body(Body::from("{}"))
            .unwrap();
        let res = forward(&client, &format!("http://127.0.0.1:{}/generate", port), req, 1024).await;
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn invalid_upstream_url_is_internal_error() {
        let client = reqwest::Client::new();
        let req = Request::builder().uri("/webhook").body(Body::empty()).unwrap();
        let res = forward(&client, "not a url", req, 1024).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn oversized_body_is_internal_error() {
        let client = reqwest::Client::new();
        let req = Request::builder()
            .uri("/webhook")
            .method("POST")
            .body(Body::from(vec![b'x'; 64]))
            .unwrap();
        let res = forward(&client, "http://127.0.0.1:9/webhook", req, 16).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
