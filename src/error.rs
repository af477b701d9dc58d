use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::artifact::ConversionError;
use crate::frontend::RequesterId;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{what} not found: `{}`", path.display())]
    NotFound { what: &'static str, path: PathBuf },
    #[error("malformed client source `{}`: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
    #[error("invalid template: {0}")]
    TemplateInvalid(String),
    #[error(transparent)]
    ConversionFailed(#[from] ConversionError),
    #[error("requester {0} is not on the allow-list")]
    Unauthorized(RequesterId),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn not_found(what: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            what,
            path: path.into(),
        }
    }

    pub(crate) fn template_invalid(reason: impl Into<String>) -> Self {
        Self::TemplateInvalid(reason.into())
    }
}
