use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::debug;

use crate::artifact::{ConversionPolicy, Soffice};
use crate::frontend::AccessList;
use crate::input::toml_input::Settings;
use crate::input::{ClientDirectory, IdentityFormat};
use crate::template::{Branding, FillOptions, Layout, TemplateFiller};
use crate::utils;

#[cfg(feature = "lettre")]
use crate::input::toml_input::Mail;

/// Environment variable overriding the template path.
pub const TEMPLATE_VAR: &str = "TEMPLATE";
/// Environment variable overriding the allow-list, e.g. `1,22,333`.
pub const USERS_VAR: &str = "USERS";

const DEFAULT_TEMPLATE: &str = "template.xlsx";

#[derive(Debug, Clone)]
pub struct Config {
    template: PathBuf,
    clients: ClientDirectory,
    fill_options: FillOptions,
    ask_date: bool,
    converter: Option<Soffice>,
    on_failure: ConversionPolicy,
    users: AccessList,
    output: PathBuf,
    preserve_dir: Option<PathBuf>,
    #[cfg(feature = "lettre")]
    mail: Option<Mail>,
}

#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    workspace: Option<PathBuf>,
    settings: Settings,
    template: Option<PathBuf>,
    users: Option<AccessList>,
    output: Option<PathBuf>,
    preserve_dir: Option<PathBuf>,
}

impl ConfigBuilder {
    fn new(settings: Settings) -> Self {
        Self {
            workspace: None,
            settings,
            template: None,
            users: None,
            output: None,
            preserve_dir: None,
        }
    }

    /// The directory relative paths of the settings are resolved against.
    pub fn workspace(&mut self, workspace: impl Into<PathBuf>) -> &mut Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn output(&mut self, output: impl Into<PathBuf>) -> &mut Self {
        self.output = Some(output.into());
        self
    }

    pub fn preserve_dir(&mut self, preserve_dir: impl Into<PathBuf>) -> &mut Self {
        self.preserve_dir = Some(preserve_dir.into());
        self
    }

    /// Replaces the template path of the settings.
    pub fn template(&mut self, template: impl Into<PathBuf>) -> &mut Self {
        self.template = Some(template.into());
        self
    }

    /// Replaces the allow-list of the settings.
    pub fn users(&mut self, users: AccessList) -> &mut Self {
        self.users = Some(users);
        self
    }

    /// Applies the `TEMPLATE` and `USERS` environment variables.
    pub fn env_overrides(&mut self) -> anyhow::Result<&mut Self> {
        self.overrides(|name| env::var(name).ok())
    }

    fn overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<&mut Self> {
        if let Some(template) = var(TEMPLATE_VAR).filter(|value| !value.is_empty()) {
            debug!("template overridden by ${}", TEMPLATE_VAR);
            self.template(template);
        }

        if let Some(users) = var(USERS_VAR) {
            let users = users
                .parse()
                .with_context(|| format!("${} must be a comma separated list of ids", USERS_VAR))?;
            debug!("allow-list overridden by ${}", USERS_VAR);
            self.users(users);
        }

        Ok(self)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.workspace {
            Some(workspace) if path.is_relative() => workspace.join(path),
            _ => path.to_path_buf(),
        }
    }

    #[must_use]
    pub fn build(self) -> Config {
        let settings = &self.settings;

        let template = self.template.clone().unwrap_or_else(|| {
            self.resolve(
                settings
                    .template()
                    .path()
                    .unwrap_or_else(|| Path::new(DEFAULT_TEMPLATE)),
            )
        });

        let render = settings.render();
        let branding = render.include_branding().then(|| {
            render
                .logo()
                .map_or(Branding::Embedded, |logo| Branding::File(self.resolve(logo)))
        });

        let output = self.output.clone().unwrap_or_else(|| {
            self.workspace
                .as_ref()
                .map_or_else(|| PathBuf::from("timesheets"), |workspace| workspace.join("timesheets"))
        });

        Config {
            template,
            clients: ClientDirectory::new(self.resolve(settings.clients().directory())),
            fill_options: FillOptions {
                sheet: settings.template().sheet().to_string(),
                layout: Layout::WEEKLY,
                identity_format: render.identity_format(),
                include_totals: render.include_totals(),
                branding,
            },
            ask_date: render.ask_date(),
            converter: settings.convert().converter(),
            on_failure: settings.convert().on_failure(),
            users: self
                .users
                .clone()
                .unwrap_or_else(|| settings.access().users().iter().copied().collect()),
            output,
            preserve_dir: self.preserve_dir.clone(),
            #[cfg(feature = "lettre")]
            mail: settings.mail().cloned(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn try_from_toml(settings: Settings) -> ConfigBuilder {
        ConfigBuilder::new(settings)
    }

    /// Reads the settings file, relative paths in it are resolved against the
    /// directory of the file.
    pub fn try_from_toml_file(path: impl AsRef<Path>) -> anyhow::Result<ConfigBuilder> {
        let path = path.as_ref();
        let settings: Settings = utils::toml_from_reader(
            File::open(path).with_context(|| format!("failed to open `{}`", path.display()))?,
        )
        .with_context(|| format!("failed to parse `{}`", path.display()))?;

        let workspace = dunce::canonicalize(path)?
            .parent()
            .ok_or_else(|| anyhow::anyhow!("`{}` should have a parent directory", path.display()))?
            .to_path_buf();

        let mut builder = Self::try_from_toml(settings);
        builder.workspace(workspace);

        Ok(builder)
    }

    #[must_use]
    pub fn template(&self) -> &Path {
        &self.template
    }

    #[must_use]
    pub const fn clients(&self) -> &ClientDirectory {
        &self.clients
    }

    #[must_use]
    pub const fn fill_options(&self) -> &FillOptions {
        &self.fill_options
    }

    #[must_use]
    pub fn identity_format(&self) -> IdentityFormat {
        self.fill_options.identity_format
    }

    #[must_use]
    pub fn filler(&self) -> TemplateFiller {
        TemplateFiller::new(
            self.template.clone(),
            self.clients.clone(),
            self.fill_options.clone(),
        )
    }

    /// Whether the requester picks the date of the week.
    #[must_use]
    pub const fn ask_date(&self) -> bool {
        self.ask_date
    }

    /// The converter for the spreadsheets, `None` if they are delivered as is.
    #[must_use]
    pub fn converter(&self) -> Option<&Soffice> {
        self.converter.as_ref()
    }

    #[must_use]
    pub const fn on_failure(&self) -> ConversionPolicy {
        self.on_failure
    }

    #[must_use]
    pub const fn users(&self) -> &AccessList {
        &self.users
    }

    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    #[must_use]
    pub fn preserve_dir(&self) -> Option<&Path> {
        self.preserve_dir.as_deref()
    }

    #[cfg(feature = "lettre")]
    #[must_use]
    pub fn mail(&self) -> Option<&Mail> {
        self.mail.as_ref()
    }
}
