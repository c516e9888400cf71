//! Shared HTTP plumbing: JSON responses, query parsing and the accept loop

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use std::convert::Infallible;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::{debug, warn};

/// Response type produced by every handler
pub type HttpResponse = Response<Full<Bytes>>;

/// Serialize `body` as a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Full::new(Bytes::from(bytes)));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            warn!(error = %e, "failed to serialize response");
            let mut response = Response::new(Full::new(Bytes::from_static(
                b"{\"detail\":\"Internal Server Error\"}",
            )));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

/// Error response with a `{"detail": ...}` body
pub fn error_response(status: StatusCode, detail: impl Into<String>) -> HttpResponse {
    json_response(status, &serde_json::json!({ "detail": detail.into() }))
}

/// Path without a trailing slash (except for the root)
pub fn normalize_path(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

/// Look up and percent-decode a query string parameter
pub fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| {
            let value = value.replace('+', " ");
            percent_decode_str(&value).decode_utf8_lossy().into_owned()
        })
}

/// Accept connections forever, answering each request with `handler`
pub async fn serve<H, Fut>(listener: TcpListener, handler: H)
where
    H: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = HttpResponse> + Send + 'static,
{
    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "accept error");
                continue;
            }
        };

        let handler = handler.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req: Request<Incoming>| {
                let handler = handler.clone();
                debug!(%remote_addr, method = %req.method(), uri = %req.uri(), "request");
                async move { Ok::<_, Infallible>(handler(req).await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(%remote_addr, error = %e, "connection error");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_query_param() {
        let query = Some("group_number=3&other=a%20b");
        assert_eq!(query_param(query, "group_number").as_deref(), Some("3"));
        assert_eq!(query_param(query, "other").as_deref(), Some("a b"));
        assert_eq!(query_param(query, "missing"), None);
        assert_eq!(query_param(None, "group_number"), None);
        assert_eq!(query_param(Some("flag"), "flag").as_deref(), Some(""));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/predict/"), "/predict");
        assert_eq!(normalize_path("/data"), "/data");
    }

    #[tokio::test]
    async fn test_error_response_body() {
        let response = error_response(StatusCode::BAD_REQUEST, "Número de grupo inválido");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "Número de grupo inválido");
    }
}
