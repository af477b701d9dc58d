//! Writing the filled timesheet to a transient directory.

mod converter;

pub use converter::*;

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Deserialize;
use tempfile::TempDir;

use crate::input::ClientIdentity;
use crate::template::TemplateDocument;
use crate::time::WeekWindow;
use crate::utils::{self, PathExt};
use crate::Result;

/// Extension of the filled spreadsheet.
pub const SPREADSHEET_EXTENSION: &str = "xlsx";

/// What happens when the conversion of a timesheet fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionPolicy {
    /// Deliver the spreadsheet instead.
    #[default]
    Fallback,
    /// Fail the request.
    Strict,
}

/// A finished timesheet inside the working directory of an [`ArtifactWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    client: ClientIdentity,
    week: WeekWindow,
    path: PathBuf,
}

impl GeneratedArtifact {
    #[must_use]
    pub fn new(client: ClientIdentity, week: WeekWindow, path: impl Into<PathBuf>) -> Self {
        Self {
            client,
            week,
            path: path.into(),
        }
    }

    #[must_use]
    pub const fn client(&self) -> &ClientIdentity {
        &self.client
    }

    #[must_use]
    pub const fn week(&self) -> &WeekWindow {
        &self.week
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.file_name_str().unwrap_or_default()
    }

    /// The mime type of the file, judged by its extension.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self.path.extension().and_then(|extension| extension.to_str()) {
            Some("pdf") => "application/pdf",
            Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Some("ods") => "application/vnd.oasis.opendocument.spreadsheet",
            _ => "application/octet-stream",
        }
    }
}

/// Owns a temporary directory holding the generated files.
///
/// The directory and everything inside of it is removed when the writer is
/// dropped.
#[derive(Debug)]
pub struct ArtifactWriter {
    working_dir: TempDir,
    preserve_dir: Option<PathBuf>,
}

impl ArtifactWriter {
    pub fn new() -> Result<Self> {
        let working_dir = TempDir::new()?;
        debug!("created working directory {}", working_dir.path().display());

        Ok(Self {
            working_dir,
            preserve_dir: None,
        })
    }

    /// The working directory is copied to `path`, if a conversion fails.
    pub fn preserve_dir(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.preserve_dir = Some(path.into());
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.working_dir.path()
    }

    /// Saves the document as `<client>.xlsx` and returns its path.
    pub fn save(&self, document: &TemplateDocument, client: &ClientIdentity) -> Result<PathBuf> {
        let path = self
            .working_dir
            .path()
            .join(client.file_name(SPREADSHEET_EXTENSION));

        document.save(&path)?;
        info!("saved timesheet to {}", path.display());

        Ok(path)
    }

    /// Converts the file at `path`, which has to be inside the working directory.
    pub fn convert(
        &self,
        converter: &dyn Converter,
        path: &Path,
        policy: ConversionPolicy,
    ) -> Result<PathBuf> {
        match converter.convert(path, self.working_dir.path()) {
            Ok(converted) => {
                info!("converted timesheet to {}", converted.display());
                Ok(converted)
            }
            Err(error) => {
                self.preserve();

                match policy {
                    ConversionPolicy::Strict => Err(error.into()),
                    ConversionPolicy::Fallback => {
                        warn!("conversion failed, delivering the spreadsheet: {}", error);
                        Ok(path.to_path_buf())
                    }
                }
            }
        }
    }

    fn preserve(&self) {
        let Some(target) = &self.preserve_dir else {
            return;
        };

        let result = utils::create_dir_all(target)
            .map_err(fs_extra::error::Error::from)
            .and_then(|()| {
                fs_extra::dir::copy(
                    self.working_dir.path(),
                    target,
                    &fs_extra::dir::CopyOptions {
                        overwrite: true,
                        skip_exist: false,
                        content_only: true,
                        ..Default::default()
                    },
                )
            });

        match result {
            Ok(_) => info!(
                "preserved the working directory in {}",
                target.display()
            ),
            Err(error) => warn!(
                "failed to copy `{}` to `{}`: {}",
                self.working_dir.path().display(),
                target.display(),
                error
            ),
        }
    }

    /// Removes the working directory, reporting errors that a drop would ignore.
    pub fn close(self) -> Result<()> {
        self.working_dir.close()?;
        Ok(())
    }
}
