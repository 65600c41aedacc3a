#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unknown stream type: {0}")]
    UnknownStreamType(String),
    #[error("track {0:?} not found")]
    UnknownTrack(crate::track::TrackId),
    #[error("empty gallery for company {0:?}")]
    EmptyGallery(Option<String>),
}

pub type Result<T> = std::result::Result<T, Error>;
