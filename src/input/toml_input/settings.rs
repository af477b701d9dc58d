use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::artifact::{ConversionPolicy, Soffice};
use crate::input::IdentityFormat;
#[cfg(feature = "lettre")]
use crate::input::toml_input::Mail;
use crate::template::DEFAULT_SHEET;

fn default_sheet() -> String {
    DEFAULT_SHEET.to_string()
}

fn default_clients() -> PathBuf {
    PathBuf::from("clients")
}

const fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Template {
    path: Option<PathBuf>,
    #[serde(default = "default_sheet")]
    sheet: String,
}

impl Template {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn sheet(&self) -> &str {
        &self.sheet
    }
}

impl Default for Template {
    fn default() -> Self {
        Self {
            path: None,
            sheet: default_sheet(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Clients {
    #[serde(default = "default_clients")]
    directory: PathBuf,
}

impl Clients {
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Default for Clients {
    fn default() -> Self {
        Self {
            directory: default_clients(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Render {
    #[serde(default)]
    identity_format: IdentityFormat,
    #[serde(default = "yes")]
    include_totals: bool,
    #[serde(default = "yes")]
    include_branding: bool,
    /// A png file replacing the default logo.
    logo: Option<PathBuf>,
    /// Ask for the date of the week instead of using the current one.
    #[serde(default = "yes")]
    ask_date: bool,
}

impl Render {
    #[must_use]
    pub const fn identity_format(&self) -> IdentityFormat {
        self.identity_format
    }

    #[must_use]
    pub const fn include_totals(&self) -> bool {
        self.include_totals
    }

    #[must_use]
    pub const fn include_branding(&self) -> bool {
        self.include_branding
    }

    #[must_use]
    pub fn logo(&self) -> Option<&Path> {
        self.logo.as_deref()
    }

    #[must_use]
    pub const fn ask_date(&self) -> bool {
        self.ask_date
    }
}

impl Default for Render {
    fn default() -> Self {
        Self {
            identity_format: IdentityFormat::default(),
            include_totals: true,
            include_branding: true,
            logo: None,
            ask_date: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Convert {
    #[serde(default = "yes")]
    enabled: bool,
    program: Option<String>,
    format: Option<String>,
    /// Seconds after which the converter is killed.
    timeout: Option<u64>,
    #[serde(default)]
    on_failure: ConversionPolicy,
}

impl Convert {
    /// The converter to use, `None` if conversion is disabled.
    #[must_use]
    pub fn converter(&self) -> Option<Soffice> {
        if !self.enabled {
            return None;
        }

        Some(Soffice::new(
            self.program.as_deref().unwrap_or(Soffice::DEFAULT_PROGRAM),
            self.format.as_deref().unwrap_or(Soffice::DEFAULT_FORMAT),
            self.timeout
                .map_or(Soffice::DEFAULT_TIMEOUT, Duration::from_secs),
        ))
    }

    #[must_use]
    pub const fn on_failure(&self) -> ConversionPolicy {
        self.on_failure
    }
}

impl Default for Convert {
    fn default() -> Self {
        Self {
            enabled: true,
            program: None,
            format: None,
            timeout: None,
            on_failure: ConversionPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Access {
    #[serde(default)]
    users: Vec<u64>,
}

impl Access {
    #[must_use]
    pub fn users(&self) -> &[u64] {
        &self.users
    }
}

/// The contents of the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    template: Template,
    #[serde(default)]
    clients: Clients,
    #[serde(default)]
    render: Render,
    #[serde(default)]
    convert: Convert,
    #[serde(default)]
    access: Access,
    #[cfg(feature = "lettre")]
    mail: Option<Mail>,
}

impl Settings {
    #[must_use]
    pub const fn template(&self) -> &Template {
        &self.template
    }

    #[must_use]
    pub const fn clients(&self) -> &Clients {
        &self.clients
    }

    #[must_use]
    pub const fn render(&self) -> &Render {
        &self.render
    }

    #[must_use]
    pub const fn convert(&self) -> &Convert {
        &self.convert
    }

    #[must_use]
    pub const fn access(&self) -> &Access {
        &self.access
    }

    #[cfg(feature = "lettre")]
    #[must_use]
    pub fn mail(&self) -> Option<&Mail> {
        self.mail.as_ref()
    }
}
