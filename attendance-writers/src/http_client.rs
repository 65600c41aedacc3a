//! Small shared helper for the fire-and-forget JSON POSTs made by the DB
//! writer, the ERP push queue, and the relay notifier. Modeled on
//! `strand-bui-backend-session`'s `make_request`: a fresh
//! `hyper_util::client::legacy::Client` per call, no connection pooling
//! beyond what the legacy client already does internally.

use bytes::Bytes;
use http_body_util::Full;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::error::{Error, Result};

pub type Body = Full<Bytes>;

fn client() -> Client<hyper_util::client::legacy::connect::HttpConnector, Body> {
    Client::builder(TokioExecutor::new()).build_http()
}

/// POSTs a JSON body to `url` and returns the response status, ignoring the
/// response body. Callers that need the body use [`post_json_collect`].
pub async fn post_json(url: &str, body: &serde_json::Value) -> Result<http::StatusCode> {
    let bytes = serde_json::to_vec(body)?;
    let req = hyper::Request::builder()
        .method(hyper::Method::POST)
        .uri(url)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(bytes)))?;
    let resp = client().request(req).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::RequestFailed {
            url: url.to_string(),
            status,
        });
    }
    Ok(status)
}

/// GETs `url`, ignoring the response body. Used by the relay notifier.
pub async fn get(url: &str) -> Result<http::StatusCode> {
    let req = hyper::Request::builder()
        .method(hyper::Method::GET)
        .uri(url)
        .body(Full::new(Bytes::new()))?;
    let resp = client().request(req).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::RequestFailed {
            url: url.to_string(),
            status,
        });
    }
    Ok(status)
}

/// Runs a future to completion on a fresh current-thread runtime. Each
/// writer owns one background thread, so a runtime per call keeps the
/// worker loop a plain blocking `for job in receiver` without threading a
/// shared tokio handle through every crate that wants to make an HTTP call.
pub fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to start writer HTTP runtime")
        .block_on(fut)
}
