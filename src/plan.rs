use crate::error::{Error, Result};
use crate::format::format_request;
use crate::render;
use crate::session::{Action, MessageSequence, RequestNode, Session};
use crate::stats::PlanStatistics;
use crate::{FileOrder, Probability, TimeUnit};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const DEFAULT_MAX_USERS: u32 = 30_000;
pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_STRING_LENGTH: u32 = 64;
pub const DEFAULT_PROBABILITY: Probability = 100;
pub const DEFAULT_DELIMITER: char = ',';

/// Header values of the rendered document.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanConfig {
    pub dtd_location: String,
    pub log_level: String,
    pub version: String,
    pub dump_traffic: bool,
}

impl Default for PlanConfig {
    fn default() -> PlanConfig {
        PlanConfig {
            dtd_location: "/opt/local/share/tsung/tsung-1.0.dtd".to_owned(),
            log_level: "notice".to_owned(),
            version: "1.0".to_owned(),
            dump_traffic: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    pub host: String,
    pub use_controller_vm: bool,
    pub max_users: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrivalPhase {
    pub id: usize,
    pub duration: u64,
    pub duration_unit: TimeUnit,
    pub new_users: u64,
    pub new_users_unit: TimeUnit,
}

/// A CSV file Tsung reads variables from, one column per variable.
#[derive(Debug, Clone, PartialEq)]
pub struct FileServer {
    pub id: String,
    pub path: String,
    pub vars: Vec<String>,
    pub delimiter: char,
    pub order: FileOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RandomStringGenerator {
    pub name: String,
    pub length: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RandomNumberGenerator {
    pub name: String,
    pub start: i64,
    pub end: i64,
}

/// A file holding a complete multipart request body.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadableFile {
    pub name: String,
    pub path: String,
    pub boundary: String,
}

/// A load-test plan under construction.
///
/// Sessions and their actions render in the order they were added.
/// [`Plan::render`] takes the plan by value: a plan renders once.
#[derive(Debug, Default)]
pub struct Plan {
    config: PlanConfig,
    clients: Vec<Client>,
    servers: Vec<Server>,
    phases: Vec<ArrivalPhase>,
    file_servers: Vec<FileServer>,
    string_generators: Vec<RandomStringGenerator>,
    number_generators: Vec<RandomNumberGenerator>,
    uploadable_files: BTreeMap<String, UploadableFile>,
    sessions: Vec<Session>,
    sequence: MessageSequence,
}

impl Plan {
    pub fn new(config: PlanConfig) -> Plan {
        Plan {
            config,
            ..Plan::default()
        }
    }

    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn phases(&self) -> &[ArrivalPhase] {
        &self.phases
    }

    pub fn file_servers(&self) -> &[FileServer] {
        &self.file_servers
    }

    pub fn string_generators(&self) -> &[RandomStringGenerator] {
        &self.string_generators
    }

    pub fn number_generators(&self) -> &[RandomNumberGenerator] {
        &self.number_generators
    }

    pub fn uploadable_files(&self) -> &BTreeMap<String, UploadableFile> {
        &self.uploadable_files
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Adds a host to drive traffic from. `use_controller_vm` defaults to
    /// `true`, `max_users` to [`DEFAULT_MAX_USERS`].
    pub fn add_client(
        &mut self,
        host: impl Into<String>,
        use_controller_vm: Option<bool>,
        max_users: Option<u32>,
    ) -> Result<()> {
        let host = non_empty("host", host.into())?;
        let max_users = max_users.unwrap_or(DEFAULT_MAX_USERS);
        if max_users == 0 {
            return Err(Error::configuration("maxUsers", "must be greater than 0"));
        }
        self.clients.push(Client {
            host,
            use_controller_vm: use_controller_vm.unwrap_or(true),
            max_users,
        });
        Ok(())
    }

    /// Adds a server under test; the port defaults to 80.
    pub fn add_server(&mut self, host: impl Into<String>, port: Option<u16>) -> Result<()> {
        let host = non_empty("host", host.into())?;
        let port = port.unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(Error::configuration("port", "must be in 1..=65535"));
        }
        self.servers.push(Server { host, port });
        Ok(())
    }

    /// Adds a load phase. Phase ids count up from 1.
    pub fn add_phase(
        &mut self,
        duration: u64,
        duration_unit: TimeUnit,
        new_users: u64,
        new_users_unit: TimeUnit,
    ) -> Result<()> {
        if duration == 0 {
            return Err(Error::configuration("duration", "must be greater than 0"));
        }
        let id = self.phases.len() + 1;
        self.phases.push(ArrivalPhase {
            id,
            duration,
            duration_unit,
            new_users,
            new_users_unit,
        });
        Ok(())
    }

    pub fn add_file_server(
        &mut self,
        id: impl Into<String>,
        path: impl Into<String>,
        vars: Vec<String>,
        delimiter: Option<char>,
        order: Option<FileOrder>,
    ) -> Result<()> {
        let id = non_empty("id", id.into())?;
        if self.file_servers.iter().any(|f| f.id == id) {
            return Err(Error::configuration(
                "id",
                format!("file server {:?} is already registered", id),
            ));
        }
        if vars.is_empty() {
            return Err(Error::configuration(
                "vars",
                format!("file server {:?} declares no variables", id),
            ));
        }
        self.file_servers.push(FileServer {
            id,
            path: path.into(),
            vars,
            delimiter: delimiter.unwrap_or(DEFAULT_DELIMITER),
            order: order.unwrap_or_default(),
        });
        Ok(())
    }

    pub fn add_random_string_generator(
        &mut self,
        name: impl Into<String>,
        length: Option<u32>,
    ) -> Result<()> {
        let name = non_empty("name", name.into())?;
        let length = length.unwrap_or(DEFAULT_STRING_LENGTH);
        if length == 0 {
            return Err(Error::configuration("length", "must be greater than 0"));
        }
        self.string_generators
            .push(RandomStringGenerator { name, length });
        Ok(())
    }

    pub fn add_random_number_generator(
        &mut self,
        name: impl Into<String>,
        start: i64,
        end: i64,
    ) -> Result<()> {
        let name = non_empty("name", name.into())?;
        if start > end {
            return Err(Error::configuration(
                "start",
                format!("{} is greater than end {}", start, end),
            ));
        }
        self.number_generators
            .push(RandomNumberGenerator { name, start, end });
        Ok(())
    }

    /// Registers a multipart body requests can refer to by `name`. A later
    /// registration under the same name replaces the earlier one.
    pub fn add_uploadable_file(
        &mut self,
        name: impl Into<String>,
        path: impl Into<String>,
        boundary: impl Into<String>,
    ) -> Result<()> {
        let name = non_empty("name", name.into())?;
        let boundary = non_empty("boundary", boundary.into())?;
        let file = UploadableFile {
            name: name.clone(),
            path: path.into(),
            boundary,
        };
        if self.uploadable_files.insert(name.clone(), file).is_some() {
            warn!(name = %name, "replacing uploadable file");
        }
        Ok(())
    }

    /// Starts a new session; `probability` defaults to 100. Whether the
    /// probabilities of all sessions add up to 100 is left to the caller.
    pub fn add_session(
        &mut self,
        name: impl Into<String>,
        probability: Option<Probability>,
    ) -> Result<&mut Session> {
        let name = non_empty("name", name.into())?;
        let probability = probability.unwrap_or(DEFAULT_PROBABILITY);
        if probability > 100 {
            return Err(Error::configuration(
                "probability",
                format!("{} is not in 0..=100", probability),
            ));
        }
        self.sessions
            .push(Session::new(name, probability, self.sequence.clone()));
        match self.sessions.last_mut() {
            Some(session) => Ok(session),
            None => unreachable!("bug"),
        }
    }

    /// Formats every request and computes the statistics. Consumes the
    /// builder; nothing can be added afterwards.
    pub fn finalize(mut self) -> Result<FinalizedPlan> {
        let uploads = &self.uploadable_files;
        for session in &mut self.sessions {
            for action in session.actions_mut() {
                let transaction = match action {
                    Action::Transaction(transaction) => transaction,
                    Action::Think(_) => continue,
                };
                for node in transaction.requests_mut() {
                    match node {
                        RequestNode::Request(request) => {
                            let formatted = format_request(request, uploads)?;
                            request.set_formatted(formatted);
                        }
                        RequestNode::If(statement) => {
                            for request in statement.requests_mut() {
                                let formatted = format_request(request, uploads)?;
                                request.set_formatted(formatted);
                            }
                        }
                        RequestNode::Websocket(_) => {}
                    }
                }
            }
        }

        let statistics = PlanStatistics::from_sessions(&self.sessions);
        debug!(
            sessions = self.sessions.len(),
            requests_per_second = statistics.weighted_average_requests_per_second,
            "finalized plan"
        );
        Ok(FinalizedPlan {
            plan: self,
            statistics,
        })
    }

    /// Renders the plan as a Tsung XML document.
    pub fn render(self) -> Result<String> {
        Ok(render::render(&self.finalize()?))
    }
}

/// A plan whose requests are formatted and whose statistics are known.
#[derive(Debug)]
pub struct FinalizedPlan {
    pub plan: Plan,
    pub statistics: PlanStatistics,
}

fn non_empty(field: &'static str, value: String) -> Result<String> {
    if value.trim().is_empty() {
        Err(Error::configuration(field, "must not be empty"))
    } else {
        Ok(value)
    }
}
