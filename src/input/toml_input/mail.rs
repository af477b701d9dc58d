use std::borrow::Cow;

use anyhow::Context;
use lettre::message::{Mailbox, MessageBuilder};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::SmtpTransport;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MailAddress<'a> {
    name: Cow<'a, str>,
    email: Cow<'a, str>,
}

impl<'a> MailAddress<'a> {
    pub fn new(name: impl Into<Cow<'a, str>>, email: impl Into<Cow<'a, str>>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl<'a> TryFrom<MailAddress<'a>> for Mailbox {
    type Error = anyhow::Error;

    fn try_from(MailAddress { name, email }: MailAddress<'a>) -> Result<Self, Self::Error> {
        let email = email
            .parse()
            .with_context(|| format!("`{}` is not a valid mail address", email))?;

        Ok(Self::new(Some(name.into_owned()), email))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Smtp {
    url: String,
    username: String,
    password: String,
    #[serde(default)]
    use_starttls: bool,
}

impl Smtp {
    pub fn to_transport(&self) -> anyhow::Result<SmtpTransport> {
        let relay = self.url.as_str();
        let transport = {
            if self.use_starttls {
                SmtpTransport::starttls_relay(relay)
            } else {
                SmtpTransport::relay(relay)
            }
        }
        .with_context(|| format!("invalid smtp relay `{}`", relay))?;

        Ok(transport
            .credentials(Credentials::new(
                self.username.clone(),
                self.password.clone(),
            ))
            .build())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Mail {
    from: MailAddress<'static>,
    smtp: Smtp,
    /// Default recipient of the timesheets.
    to: Option<String>,
    /// Subject of the mail, `{client}` and `{week}` are replaced.
    subject: Option<String>,
}

impl Mail {
    pub const DEFAULT_SUBJECT: &'static str = "Timesheet {client} {week}";

    pub fn builder(&self) -> anyhow::Result<MessageBuilder> {
        Ok(MessageBuilder::new().from(self.from.clone().try_into()?))
    }

    pub fn to_transport(&self) -> anyhow::Result<SmtpTransport> {
        self.smtp.to_transport()
    }

    #[must_use]
    pub fn recipient(&self) -> Option<&str> {
        self.to.as_deref()
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_deref().unwrap_or(Self::DEFAULT_SUBJECT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    const MAIL: &str = concat!(
        "from = { name = \"Office\", email = \"office@example.com\" }\n",
        "to = \"records@example.com\"\n",
        "[smtp]\n",
        "url = \"smtp.example.com\"\n",
        "username = \"office\"\n",
        "password = \"secret\"\n",
    );

    #[test]
    fn test_parse() {
        let mail: Mail = toml::from_str(MAIL).unwrap();

        assert_eq!(mail.from, MailAddress::new("Office", "office@example.com"));
        assert_eq!(mail.recipient(), Some("records@example.com"));
        assert_eq!(mail.subject(), Mail::DEFAULT_SUBJECT);
        assert!(mail.builder().is_ok());
    }

    #[test]
    fn test_invalid_address() {
        let address = MailAddress::new("Office", "not an address");

        assert!(Mailbox::try_from(address).is_err());
    }
}
