use std::path::{Path, PathBuf};

use anyhow::Context;
use log::info;

use crate::artifact::GeneratedArtifact;
use crate::utils;

/// Hands a finished timesheet to whoever requested it.
pub trait Delivery {
    fn deliver(&self, artifact: &GeneratedArtifact) -> anyhow::Result<()>;
}

impl<D: Delivery + ?Sized> Delivery for &D {
    fn deliver(&self, artifact: &GeneratedArtifact) -> anyhow::Result<()> {
        (**self).deliver(artifact)
    }
}

/// Copies the timesheet into a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryDelivery {
    directory: PathBuf,
}

impl DirectoryDelivery {
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Where the artifact ends up.
    #[must_use]
    pub fn destination(&self, artifact: &GeneratedArtifact) -> PathBuf {
        self.directory.join(artifact.file_name())
    }
}

impl Delivery for DirectoryDelivery {
    fn deliver(&self, artifact: &GeneratedArtifact) -> anyhow::Result<()> {
        utils::create_dir_all(&self.directory)?;

        let destination = self.destination(artifact);
        std::fs::copy(artifact.path(), &destination).with_context(|| {
            format!(
                "failed to copy `{}` to `{}`",
                artifact.path().display(),
                destination.display()
            )
        })?;

        info!("wrote {}", destination.display());
        Ok(())
    }
}

#[cfg(feature = "lettre")]
pub use mail::MailDelivery;

#[cfg(feature = "lettre")]
mod mail {
    use lettre::message::header::ContentType;
    use lettre::message::{Attachment, SinglePart};
    use lettre::Transport;

    use super::*;

    use crate::input::toml_input::Mail;
    use crate::time;

    /// Sends the timesheet as an attachment of a mail.
    #[derive(Debug, Clone)]
    pub struct MailDelivery {
        mail: Mail,
        recipient: String,
    }

    impl MailDelivery {
        #[must_use]
        pub fn new(mail: Mail, recipient: impl Into<String>) -> Self {
            Self {
                mail,
                recipient: recipient.into(),
            }
        }

        /// The subject with `{client}` and `{week}` replaced.
        #[must_use]
        pub fn subject(&self, artifact: &GeneratedArtifact) -> String {
            let week = artifact.week();
            self.mail
                .subject()
                .replace("{client}", artifact.client().as_str())
                .replace(
                    "{week}",
                    &format!(
                        "{} - {}",
                        time::format_short_date(&week.start()),
                        time::format_short_date(&week.end())
                    ),
                )
        }

        fn attachment(artifact: &GeneratedArtifact) -> anyhow::Result<SinglePart> {
            Ok(Attachment::new(artifact.file_name().to_string()).body(
                utils::read(artifact.path())?,
                ContentType::parse(artifact.content_type())?,
            ))
        }
    }

    impl Delivery for MailDelivery {
        fn deliver(&self, artifact: &GeneratedArtifact) -> anyhow::Result<()> {
            let subject = self.subject(artifact);

            let email = self
                .mail
                .builder()?
                .to(self
                    .recipient
                    .parse()
                    .with_context(|| format!("invalid recipient `{}`", self.recipient))?)
                .subject(&subject)
                .singlepart(Self::attachment(artifact)?)?;

            info!(
                "sending email to \"{}\" with subject \"{}\"",
                self.recipient, &subject
            );

            self.mail.to_transport()?.send(&email).with_context(|| {
                format!(
                    "failed to send email to \"{}\" with subject \"{}\"",
                    self.recipient, subject
                )
            })?;

            info!("sent email successfully");
            Ok(())
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use crate::date;
    use crate::time::current_week;

    #[test]
    fn test_directory_delivery() {
        let source = tempfile::tempdir().unwrap();
        let path = source.path().join("Jane Doe.xlsx");
        fs::write(&path, b"timesheet").unwrap();

        let target = tempfile::tempdir().unwrap();
        let delivery = DirectoryDelivery::new(target.path().join("out"));
        let artifact =
            GeneratedArtifact::new("Jane Doe".into(), current_week(date!(2024:05:15)), &path);

        delivery.deliver(&artifact).unwrap();

        assert_eq!(
            fs::read(target.path().join("out").join("Jane Doe.xlsx")).unwrap(),
            b"timesheet".to_vec()
        );
    }
}
