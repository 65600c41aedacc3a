#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Types(#[from] attendance_types::Error),
    #[error("backend gallery fetch failed for company {company:?}: {message}")]
    GalleryFetch {
        company: Option<String>,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
