#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Types(#[from] attendance_types::Error),
    #[error("{0}")]
    Hyper(#[from] hyper::Error),
    #[error("{0}")]
    HyperUtil(#[from] hyper_util::client::legacy::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Http(#[from] http::Error),
    #[error("request to {url} not successful: status {status}")]
    RequestFailed { url: String, status: http::StatusCode },
}

pub type Result<T> = std::result::Result<T, Error>;
