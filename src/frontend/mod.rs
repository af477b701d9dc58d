//! The conversation that lets an operator request a timesheet.
//!
//! A conversation starts with the `record` command, asks for the client and,
//! if configured, for the date of the week, and ends with the delivery of the
//! timesheet. It does not depend on a particular chat transport: events go
//! in, replies come out.

mod access;
mod calendar;
mod delivery;

pub use access::*;
pub use calendar::*;
pub use delivery::*;

use chrono::NaiveDate;
use log::{error, info, warn};

use crate::input::{ClientIdentity, Config};
use crate::time::ReferenceTime;

/// The command that starts a conversation.
pub const ENTRY_COMMAND: &str = "record";

pub const CHOOSE_CLIENT: &str = "Choose client";
pub const UNKNOWN_COMMAND: &str = "Unknown command.";
pub const NO_CLIENTS: &str = "There are no clients.";
pub const FAILURE: &str = "Sorry, the timesheet could not be created.";

/// Something the requester did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A command like `/record`, the leading slash is optional.
    Command(String),
    /// One of the offered options was picked.
    Pick(String),
}

/// Something the requester is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Choose { prompt: String, options: Vec<String> },
    /// A timesheet has been sent, the file name of it.
    Delivered(String),
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// What the conversation needs from the rest of the application.
pub trait Backend {
    fn clients(&self) -> anyhow::Result<Vec<ClientIdentity>>;

    /// Creates and delivers the timesheet, returning the delivered file name.
    fn generate(&self, client: &ClientIdentity, reference: ReferenceTime)
        -> anyhow::Result<String>;
}

/// Generates timesheets as configured and hands them to a [`Delivery`].
#[derive(Debug)]
pub struct TimesheetBackend<'a, D> {
    config: &'a Config,
    delivery: D,
}

impl<'a, D: Delivery> TimesheetBackend<'a, D> {
    pub fn new(config: &'a Config, delivery: D) -> Self {
        Self { config, delivery }
    }
}

impl<D: Delivery> Backend for TimesheetBackend<'_, D> {
    fn clients(&self) -> anyhow::Result<Vec<ClientIdentity>> {
        Ok(self.config.clients().list_clients()?)
    }

    fn generate(
        &self,
        client: &ClientIdentity,
        reference: ReferenceTime,
    ) -> anyhow::Result<String> {
        crate::generate_timesheet(self.config, client, reference, |artifact| {
            self.delivery.deliver(artifact)?;
            Ok(artifact.file_name().to_string())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum State {
    #[default]
    Idle,
    ChoosingClient {
        clients: Vec<ClientIdentity>,
    },
    ChoosingDate {
        client: ClientIdentity,
        calendar: Calendar,
    },
}

/// The conversation with a single requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    requester: RequesterId,
    ask_date: bool,
    state: State,
}

impl Conversation {
    #[must_use]
    pub fn new(requester: RequesterId, ask_date: bool) -> Self {
        Self {
            requester,
            ask_date,
            state: State::Idle,
        }
    }

    #[must_use]
    pub const fn requester(&self) -> RequesterId {
        self.requester
    }

    /// Whether the conversation waits for a pick.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != State::Idle
    }

    /// Handles an event, `today` is where the calendar starts.
    pub fn handle(
        &mut self,
        event: Event,
        access: &AccessList,
        backend: &impl Backend,
        today: NaiveDate,
    ) -> Vec<Reply> {
        match event {
            Event::Command(command) => {
                if command.trim().trim_start_matches('/') == ENTRY_COMMAND {
                    self.start(access, backend)
                } else {
                    self.state = State::Idle;
                    vec![Reply::text(UNKNOWN_COMMAND)]
                }
            }
            Event::Pick(label) => match core::mem::take(&mut self.state) {
                State::Idle => {
                    warn!("{} picked `{}` outside of a conversation", self.requester, label);
                    Vec::new()
                }
                State::ChoosingClient { clients } => self.choose_client(clients, &label, backend, today),
                State::ChoosingDate {
                    client,
                    mut calendar,
                } => match calendar.pick(&label) {
                    Ok(Some(date)) => vec![self.generate(backend, &client, ReferenceTime::Date(date))],
                    Ok(None) => {
                        let reply = calendar_reply(&calendar);
                        self.state = State::ChoosingDate { client, calendar };
                        vec![reply]
                    }
                    Err(error) => {
                        warn!("{}", error);
                        let reply = calendar_reply(&calendar);
                        self.state = State::ChoosingDate { client, calendar };
                        vec![reply]
                    }
                },
            },
        }
    }

    fn start(&mut self, access: &AccessList, backend: &impl Backend) -> Vec<Reply> {
        self.state = State::Idle;

        if let Err(error) = access.authorize(self.requester) {
            info!("{}", error);
            return vec![Reply::Text(format!(
                "You are unregistered user {}",
                self.requester
            ))];
        }

        let clients = match backend.clients() {
            Ok(clients) => clients,
            Err(error) => {
                error!("failed to list the clients: {:?}", error);
                return vec![Reply::text(FAILURE)];
            }
        };

        if clients.is_empty() {
            return vec![Reply::text(NO_CLIENTS)];
        }

        let reply = client_reply(&clients);
        self.state = State::ChoosingClient { clients };
        vec![reply]
    }

    fn choose_client(
        &mut self,
        clients: Vec<ClientIdentity>,
        label: &str,
        backend: &impl Backend,
        today: NaiveDate,
    ) -> Vec<Reply> {
        let Some(client) = clients
            .iter()
            .find(|client| client.as_str() == label.trim())
            .cloned()
        else {
            warn!("`{}` is not a client", label);
            let reply = client_reply(&clients);
            self.state = State::ChoosingClient { clients };
            return vec![reply];
        };

        if !self.ask_date {
            return vec![self.generate(backend, &client, ReferenceTime::Now)];
        }

        let calendar = Calendar::new(today);
        let reply = calendar_reply(&calendar);
        self.state = State::ChoosingDate { client, calendar };
        vec![reply]
    }

    fn generate(
        &mut self,
        backend: &impl Backend,
        client: &ClientIdentity,
        reference: ReferenceTime,
    ) -> Reply {
        self.state = State::Idle;

        match backend.generate(client, reference) {
            Ok(file_name) => {
                info!("delivered {} to {}", file_name, self.requester);
                Reply::Delivered(file_name)
            }
            Err(error) => {
                error!("failed to create the timesheet of `{}`: {:?}", client, error);
                Reply::text(FAILURE)
            }
        }
    }
}

fn client_reply(clients: &[ClientIdentity]) -> Reply {
    Reply::Choose {
        prompt: CHOOSE_CLIENT.to_string(),
        options: clients.iter().map(ToString::to_string).collect(),
    }
}

fn calendar_reply(calendar: &Calendar) -> Reply {
    Reply::Choose {
        prompt: calendar.prompt(),
        options: calendar.options(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;

    use pretty_assertions::assert_eq;

    use crate::date;

    #[derive(Default)]
    struct FakeBackend {
        clients: Vec<ClientIdentity>,
        fail: bool,
        requests: RefCell<Vec<(ClientIdentity, ReferenceTime)>>,
    }

    impl FakeBackend {
        fn with_clients(clients: &[&str]) -> Self {
            Self {
                clients: clients.iter().map(|client| ClientIdentity::from(*client)).collect(),
                ..Self::default()
            }
        }
    }

    impl Backend for FakeBackend {
        fn clients(&self) -> anyhow::Result<Vec<ClientIdentity>> {
            Ok(self.clients.clone())
        }

        fn generate(
            &self,
            client: &ClientIdentity,
            reference: ReferenceTime,
        ) -> anyhow::Result<String> {
            self.requests.borrow_mut().push((client.clone(), reference));
            if self.fail {
                anyhow::bail!("converter crashed");
            }
            Ok(client.file_name("pdf"))
        }
    }

    fn today() -> NaiveDate {
        date!(2024:05:15)
    }

    fn access() -> AccessList {
        [1_u64].into_iter().collect()
    }

    fn command(name: &str) -> Event {
        Event::Command(name.to_string())
    }

    fn pick(label: &str) -> Event {
        Event::Pick(label.to_string())
    }

    #[test]
    fn test_record_with_date() {
        let backend = FakeBackend::with_clients(&["Doe Jane", "Roe Rick"]);
        let mut conversation = Conversation::new(RequesterId::new(1), true);

        assert_eq!(
            conversation.handle(command("/record"), &access(), &backend, today()),
            vec![Reply::Choose {
                prompt: CHOOSE_CLIENT.to_string(),
                options: vec!["Doe Jane".to_string(), "Roe Rick".to_string()],
            }]
        );

        let replies = conversation.handle(pick("Roe Rick"), &access(), &backend, today());
        assert!(matches!(&replies[..], [Reply::Choose { prompt, .. }] if prompt == "Select year"));

        conversation.handle(pick("2024"), &access(), &backend, today());
        conversation.handle(pick("Mar"), &access(), &backend, today());
        assert!(conversation.is_active());

        assert_eq!(
            conversation.handle(pick("3"), &access(), &backend, today()),
            vec![Reply::Delivered("Roe Rick.pdf".to_string())]
        );
        assert!(!conversation.is_active());
        assert_eq!(
            backend.requests.borrow().clone(),
            vec![(
                ClientIdentity::from("Roe Rick"),
                ReferenceTime::Date(date!(2024:03:03))
            )]
        );
    }

    #[test]
    fn test_record_without_date() {
        let backend = FakeBackend::with_clients(&["Doe Jane"]);
        let mut conversation = Conversation::new(RequesterId::new(1), false);

        conversation.handle(command("record"), &access(), &backend, today());

        assert_eq!(
            conversation.handle(pick("Doe Jane"), &access(), &backend, today()),
            vec![Reply::Delivered("Doe Jane.pdf".to_string())]
        );
        assert_eq!(backend.requests.borrow()[0].1, ReferenceTime::Now);
    }

    #[test]
    fn test_unregistered_user() {
        let backend = FakeBackend::with_clients(&["Doe Jane"]);
        let mut conversation = Conversation::new(RequesterId::new(42), true);

        assert_eq!(
            conversation.handle(command("/record"), &access(), &backend, today()),
            vec![Reply::Text("You are unregistered user 42".to_string())]
        );
        assert!(!conversation.is_active());
        assert!(conversation
            .handle(pick("Doe Jane"), &access(), &backend, today())
            .is_empty());
        assert!(backend.requests.borrow().is_empty());
    }

    #[test]
    fn test_unknown_command_ends_conversation() {
        let backend = FakeBackend::with_clients(&["Doe Jane"]);
        let mut conversation = Conversation::new(RequesterId::new(1), true);

        conversation.handle(command("/record"), &access(), &backend, today());
        assert!(conversation.is_active());

        assert_eq!(
            conversation.handle(command("/unknown"), &access(), &backend, today()),
            vec![Reply::Text(UNKNOWN_COMMAND.to_string())]
        );
        assert!(!conversation.is_active());
    }

    #[test]
    fn test_unknown_client_is_asked_again() {
        let backend = FakeBackend::with_clients(&["Doe Jane"]);
        let mut conversation = Conversation::new(RequesterId::new(1), true);

        conversation.handle(command("/record"), &access(), &backend, today());

        assert_eq!(
            conversation.handle(pick("Nobody"), &access(), &backend, today()),
            vec![Reply::Choose {
                prompt: CHOOSE_CLIENT.to_string(),
                options: vec!["Doe Jane".to_string()],
            }]
        );
        assert!(conversation.is_active());
    }

    #[test]
    fn test_invalid_day_is_asked_again() {
        let backend = FakeBackend::with_clients(&["Doe Jane"]);
        let mut conversation = Conversation::new(RequesterId::new(1), true);

        for event in [command("/record"), pick("Doe Jane"), pick("2024"), pick("Feb")] {
            conversation.handle(event, &access(), &backend, today());
        }

        let replies = conversation.handle(pick("30"), &access(), &backend, today());
        assert!(matches!(
            &replies[..],
            [Reply::Choose { prompt, options }] if prompt == "Select day" && options.len() == 29
        ));
    }

    #[test]
    fn test_failure_is_reported() {
        let backend = FakeBackend {
            fail: true,
            ..FakeBackend::with_clients(&["Doe Jane"])
        };
        let mut conversation = Conversation::new(RequesterId::new(1), false);

        conversation.handle(command("/record"), &access(), &backend, today());

        assert_eq!(
            conversation.handle(pick("Doe Jane"), &access(), &backend, today()),
            vec![Reply::Text(FAILURE.to_string())]
        );
        assert!(!conversation.is_active());
    }

    #[test]
    fn test_no_clients() {
        let backend = FakeBackend::default();
        let mut conversation = Conversation::new(RequesterId::new(1), true);

        assert_eq!(
            conversation.handle(command("/record"), &access(), &backend, today()),
            vec![Reply::Text(NO_CLIENTS.to_string())]
        );
        assert!(!conversation.is_active());
    }
}
