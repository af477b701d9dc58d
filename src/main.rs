use std::env;
use std::ffi::OsStr;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use log::{error, info};

use timesheet_filler::frontend::{
    Conversation, Delivery, DirectoryDelivery, Event, Reply, RequesterId, TimesheetBackend,
};
use timesheet_filler::generate_timesheet;
use timesheet_filler::input::{ClientIdentity, Config};
use timesheet_filler::time::ReferenceTime;

fn set_env_if_absent<K: AsRef<OsStr>, V: AsRef<OsStr>>(var: K, default: impl FnOnce() -> V) {
    if env::var(var.as_ref()).is_err() {
        env::set_var(var, default());
    }
}

fn main() {
    set_env_if_absent("RUST_APP_LOG", || "info");
    color_backtrace::install();
    pretty_env_logger::init_custom_env("RUST_APP_LOG");

    if let Err(e) = run(Cli::parse()) {
        error!("{:?}", e);
        ::std::process::exit(1);
    }
}

#[derive(Debug, Parser)]
#[command(version, author, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, short, global = true, default_value = "timesheet.toml")]
    config: PathBuf,
    /// Keeps the working files of failed conversions in this directory.
    #[arg(long, global = true)]
    preserve_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Lists the clients that have a source spreadsheet.
    Clients,
    /// Makes the timesheet of a client and copies it to the output folder.
    Make {
        client: String,
        /// A day of the week, e.g. `2024-05-15`. Default: today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Path to the output folder. Default: `<config dir>/timesheets/`
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Makes the timesheet of a client and sends it by mail.
    #[cfg(feature = "lettre")]
    Send {
        client: String,
        /// A day of the week, e.g. `2024-05-15`. Default: today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// The recipient. Default: `to` of the mail config
        #[arg(long)]
        to: Option<String>,
    },
    /// Requests timesheets interactively: `/record` starts, every other line
    /// picks one of the offered options.
    Record {
        /// The id the requests are made as.
        #[arg(long)]
        requester: u64,
        /// Path to the output folder. Default: `<config dir>/timesheets/`
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn build_config(
    path: &Path,
    output: Option<&Path>,
    preserve_dir: Option<&Path>,
) -> anyhow::Result<Config> {
    let mut config = Config::try_from_toml_file(path)?;
    config.env_overrides()?;

    if let Some(output) = output {
        config.output(output);
    }

    if let Some(preserve_dir) = preserve_dir {
        config.preserve_dir(preserve_dir);
    }

    let config = config.build();

    info!("finished building config");

    Ok(config)
}

fn clients(config: &Config) -> anyhow::Result<()> {
    for client in config.clients().list_clients()? {
        println!("{}", client);
    }

    Ok(())
}

fn make(config: &Config, client: &ClientIdentity, date: Option<NaiveDate>) -> anyhow::Result<()> {
    let delivery = DirectoryDelivery::new(config.output());

    let path = generate_timesheet(config, client, ReferenceTime::from(date), |artifact| {
        delivery.deliver(artifact)?;
        Ok(delivery.destination(artifact))
    })?;

    println!("{}", path.display());
    Ok(())
}

#[cfg(feature = "lettre")]
fn send(
    config: &Config,
    client: &ClientIdentity,
    date: Option<NaiveDate>,
    recipient: Option<String>,
) -> anyhow::Result<()> {
    use timesheet_filler::frontend::MailDelivery;

    let mail = config
        .mail()
        .ok_or_else(|| anyhow::anyhow!("missing mail config in the config file"))?;

    let recipient = recipient
        .or_else(|| mail.recipient().map(ToString::to_string))
        .ok_or_else(|| anyhow::anyhow!("missing recipient, pass `--to` or set `mail.to`"))?;
    info!("recipient: \"{}\"", recipient);

    let delivery = MailDelivery::new(mail.clone(), recipient);
    generate_timesheet(config, client, ReferenceTime::from(date), |artifact| {
        delivery.deliver(artifact)
    })
}

fn print_reply(output: &mut impl Write, reply: &Reply) -> io::Result<()> {
    match reply {
        Reply::Text(text) => writeln!(output, "{}", text),
        Reply::Choose { prompt, options } => {
            writeln!(output, "{}:", prompt)?;
            for option in options {
                writeln!(output, "  {}", option)?;
            }
            Ok(())
        }
        Reply::Delivered(file_name) => writeln!(output, "sent {}", file_name),
    }
}

fn record(config: &Config, requester: RequesterId) -> anyhow::Result<()> {
    let backend = TimesheetBackend::new(config, DirectoryDelivery::new(config.output()));
    let mut conversation = Conversation::new(requester, config.ask_date());

    let stdout = io::stdout();
    let mut output = stdout.lock();

    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read from stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = if line.starts_with('/') {
            Event::Command(line.to_string())
        } else {
            Event::Pick(line.to_string())
        };

        let today = Local::now().date_naive();
        for reply in conversation.handle(event, config.users(), &backend, today) {
            print_reply(&mut output, &reply)?;
        }
        output.flush()?;
    }

    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let preserve_dir = cli.preserve_dir.as_deref();

    match cli.command {
        Command::Clients => clients(&build_config(&cli.config, None, preserve_dir)?),
        Command::Make {
            client,
            date,
            output,
        } => {
            let config = build_config(&cli.config, output.as_deref(), preserve_dir)?;
            make(&config, &ClientIdentity::from(client), date)
        }
        #[cfg(feature = "lettre")]
        Command::Send { client, date, to } => {
            let config = build_config(&cli.config, None, preserve_dir)?;
            send(&config, &ClientIdentity::from(client), date, to)
        }
        Command::Record { requester, output } => {
            let config = build_config(&cli.config, output.as_deref(), preserve_dir)?;
            record(&config, RequesterId::new(requester))
        }
    }
}
