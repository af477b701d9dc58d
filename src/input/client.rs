use derive_more::Display;
use serde::Deserialize;

/// The name of a client, e.g. `Doe Jane`.
///
/// It is used to find the source file of the client and is written into the
/// identity field of the timesheet.
#[derive(Debug, Clone, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display("{_0}")]
pub struct ClientIdentity(String);

impl ClientIdentity {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the generated spreadsheet.
    #[must_use]
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.0, extension)
    }
}

impl From<&str> for ClientIdentity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ClientIdentity {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// How the client name is written into the identity cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityFormat {
    /// The name is written as is.
    Plain,
    /// A comma is inserted after the first word: `Doe Jane` becomes `Doe, Jane`.
    #[default]
    LastCommaFirst,
}

impl IdentityFormat {
    #[must_use]
    pub fn apply(&self, client: &ClientIdentity) -> String {
        let name = client.as_str().trim();

        match self {
            Self::Plain => name.to_string(),
            Self::LastCommaFirst => match name.split_once(char::is_whitespace) {
                Some((last, rest)) => format!("{}, {}", last, rest.trim_start()),
                None => name.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain() {
        assert_eq!(
            IdentityFormat::Plain.apply(&ClientIdentity::from("Jane Doe")),
            "Jane Doe".to_string()
        );
    }

    #[test]
    fn test_last_comma_first() {
        let format = IdentityFormat::LastCommaFirst;

        assert_eq!(format.apply(&"Doe Jane".into()), "Doe, Jane".to_string());
        assert_eq!(format.apply(&"Jane Doe".into()), "Jane, Doe".to_string());
        assert_eq!(
            format.apply(&"Doe  Mary Ann".into()),
            "Doe, Mary Ann".to_string()
        );
        // single names have nothing to split
        assert_eq!(format.apply(&"Cher".into()), "Cher".to_string());
    }

    #[test]
    fn test_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: IdentityFormat,
        }

        let wrapper: Wrapper = toml::from_str("format = \"plain\"").unwrap();
        assert_eq!(wrapper.format, IdentityFormat::Plain);

        let wrapper: Wrapper = toml::from_str("format = \"last_comma_first\"").unwrap();
        assert_eq!(wrapper.format, IdentityFormat::LastCommaFirst);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            ClientIdentity::from("Jane Doe").file_name("xlsx"),
            "Jane Doe.xlsx".to_string()
        );
    }
}
