use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, ThreadLinkError};

static SESSION_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid regex")
});

/// A thread to load: a Codex thread by id, or a file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadInput {
    Codex { session_id: String },
    File(PathBuf),
}

impl ThreadInput {
    pub fn parse(input: &str) -> Result<Self> {
        input.parse()
    }

    pub fn codex(session_id: impl Into<String>) -> Self {
        Self::Codex {
            session_id: session_id.into(),
        }
    }
}

/// Whether `value` has the shape of a Codex session id.
pub fn is_session_id(value: &str) -> bool {
    SESSION_ID_RE.is_match(value)
}

impl fmt::Display for ThreadInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Codex { session_id } => write!(f, "codex://{session_id}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl FromStr for ThreadInput {
    type Err = ThreadLinkError;

    fn from_str(input: &str) -> Result<Self> {
        let Some((scheme, target)) = input.split_once("://") else {
            if input.trim().is_empty() {
                return Err(ThreadLinkError::InvalidUri(input.to_string()));
            }
            return Ok(Self::File(PathBuf::from(input)));
        };

        if scheme == "file" {
            return Ok(Self::File(PathBuf::from(target)));
        }
        if scheme != "codex" {
            return Err(ThreadLinkError::UnsupportedScheme(scheme.to_string()));
        }

        let id = target.strip_prefix("threads/").unwrap_or(target);
        if id.contains('/') {
            return Err(ThreadLinkError::InvalidUri(input.to_string()));
        }
        if !is_session_id(id) {
            return Err(ThreadLinkError::InvalidSessionId(id.to_string()));
        }

        Ok(Self::codex(id.to_ascii_lowercase()))
    }
}
