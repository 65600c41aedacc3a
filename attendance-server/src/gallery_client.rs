//! HTTP-backed [`BackendGalleryClient`], grounded on the same
//! fresh-client-per-call `hyper`/`hyper-util` pattern as
//! `attendance_writers::http_client` (itself grounded on
//! `strand-bui-backend-session::make_request`). Hits `GET /gallery/templates`
//! per `spec.md` §6.

use std::sync::Arc;

use attendance_config::BackendConfig;
use attendance_recognizer::gallery_cache::BackendGalleryClient;
use attendance_recognizer::error::{Error, Result};
use attendance_types::gallery::GalleryEntry;
use attendance_types::{CompanyId, EmployeeId};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::Deserialize;

#[derive(Deserialize)]
struct TemplateRow {
    #[serde(rename = "employeeId")]
    employee_id: String,
    #[serde(rename = "employeeName", default)]
    employee_name: Option<String>,
    angle: String,
    embedding: Vec<f32>,
}

pub struct HttpGalleryClient {
    backend: Arc<BackendConfig>,
}

impl HttpGalleryClient {
    pub fn new(backend: BackendConfig) -> Self {
        HttpGalleryClient {
            backend: Arc::new(backend),
        }
    }

    async fn fetch(&self, company: Option<&CompanyId>) -> Result<Vec<GalleryEntry>> {
        let url = format!(
            "{}{}/gallery/templates",
            self.backend.base_url, self.backend.api_prefix
        );
        let mut req = hyper::Request::builder()
            .method("GET")
            .uri(&url)
            .body(Full::<Bytes>::new(Bytes::new()))
            .map_err(|e| gallery_fetch_error(company, e))?;
        if let Some(company) = company {
            let value = hyper::header::HeaderValue::from_str(company.as_str())
                .map_err(|e| gallery_fetch_error(Some(company), e))?;
            req.headers_mut().insert("x-company-id", value);
        }

        let client: Client<HttpConnector, Full<Bytes>> =
            Client::builder(TokioExecutor::new()).build_http();
        let resp = client
            .request(req)
            .await
            .map_err(|e| gallery_fetch_error(company, e))?;
        if !resp.status().is_success() {
            return Err(Error::GalleryFetch {
                company: company.map(|c| c.as_str().to_string()),
                message: format!("unexpected status {}", resp.status()),
            });
        }
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| gallery_fetch_error(company, e))?
            .to_bytes();
        let rows: Vec<TemplateRow> =
            serde_json::from_slice(&body).map_err(|e| gallery_fetch_error(company, e))?;
        Ok(rows
            .into_iter()
            .map(|row| GalleryEntry {
                employee_id: EmployeeId::new(row.employee_id.clone()),
                employee_name: row.employee_name.unwrap_or(row.employee_id),
                angle: row.angle,
                embedding: row.embedding,
            })
            .collect())
    }
}

fn gallery_fetch_error(company: Option<&CompanyId>, err: impl std::fmt::Display) -> Error {
    Error::GalleryFetch {
        company: company.map(|c| c.as_str().to_string()),
        message: err.to_string(),
    }
}

impl BackendGalleryClient for HttpGalleryClient {
    fn fetch_gallery(&self, company: Option<&CompanyId>) -> Result<Vec<GalleryEntry>> {
        crate::runtime::block_on(self.fetch(company))
    }
}
