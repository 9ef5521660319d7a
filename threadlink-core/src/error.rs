use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThreadLinkError {
    #[error("invalid uri: {0}")]
    InvalidUri(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("cannot determine home directory")]
    HomeDirectoryNotFound,

    #[error(
        "thread not found for session_id={session_id} (searched: {})",
        display_paths(.searched_roots)
    )]
    ThreadNotFound {
        session_id: String,
        searched_roots: Vec<PathBuf>,
    },

    #[error("thread file is empty: {path}")]
    EmptyThreadFile { path: PathBuf },

    #[error("thread file is not valid UTF-8: {path}")]
    NonUtf8ThreadFile { path: PathBuf },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sqlite error on {path}: {source}")]
    Sqlite {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("invalid json line in {path} at line {line}: {source}")]
    InvalidJsonLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ThreadLinkError>;

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
