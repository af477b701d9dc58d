mod error;
mod utils;

pub mod artifact;
pub mod frontend;
pub mod input;
pub mod template;
pub mod time;

pub use error::*;

use log::info;

use crate::artifact::{ArtifactWriter, Converter, GeneratedArtifact};
use crate::input::{ClientIdentity, Config};
use crate::time::{current_week, ReferenceTime};

/// Fills, saves and converts the timesheet of `client` as configured and hands
/// it to `deliver`.
///
/// The generated files only exist while `deliver` runs.
pub fn generate_timesheet<T>(
    config: &Config,
    client: &ClientIdentity,
    reference: ReferenceTime,
    deliver: impl FnOnce(&GeneratedArtifact) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    let converter = config.converter().map(|soffice| soffice as &dyn Converter);
    generate_timesheet_with(config, converter, client, reference, deliver)
}

/// Like [`generate_timesheet`], but with an explicit converter.
pub fn generate_timesheet_with<T>(
    config: &Config,
    converter: Option<&dyn Converter>,
    client: &ClientIdentity,
    reference: ReferenceTime,
    deliver: impl FnOnce(&GeneratedArtifact) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    // resolved once, so the file and the delivery agree on the week
    let date = reference.resolve();
    let week = current_week(date);

    let document = config.filler().fill(client, date)?;

    let mut writer = ArtifactWriter::new()?;
    if let Some(dir) = config.preserve_dir() {
        writer.preserve_dir(dir);
    }

    let mut path = writer.save(&document, client)?;
    if let Some(converter) = converter {
        path = writer.convert(converter, &path, config.on_failure())?;
    }

    let artifact = GeneratedArtifact::new(client.clone(), week, path);
    let result = deliver(&artifact)?;
    info!("delivered {}", artifact.file_name());

    writer.close()?;

    Ok(result)
}
