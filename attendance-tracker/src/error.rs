#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Types(#[from] attendance_types::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
