#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("invalid value for environment variable {name}: {value:?}")]
    BadEnvVar { name: &'static str, value: String },
    #[error("path expansion error: {0}")]
    ShellExpand(#[from] shellexpand::LookupError<std::env::VarError>),
}

pub type Result<T> = std::result::Result<T, Error>;
