//! JSON inputs of the `plan` command: the answers file (load shape) and
//! the data configuration (file servers, generators, uploads).
use crate::error::{Error, Result};
use crate::plan::Plan;
use crate::{FileOrder, TimeUnit};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Max users of the joined client when the command line names none.
pub const DEFAULT_CLI_MAX_USERS: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answers {
    /// Name of the suite to run.
    #[serde(default)]
    pub suite: Option<String>,
    #[serde(default)]
    pub clients: Vec<String>,
    /// `host:port` pairs.
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default)]
    pub phases: Vec<PhaseAnswer>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseAnswer {
    pub duration: u64,
    pub duration_unit: TimeUnit,
    pub arrival: u64,
    pub arrival_unit: TimeUnit,
}

impl Answers {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Answers> {
        load_json(path.as_ref())
    }

    /// Registers clients, servers and phases on `plan`. All clients are
    /// joined into one entry driven from the controller VM.
    pub fn apply(&self, plan: &mut Plan, max_users: u32) -> Result<()> {
        if !self.clients.is_empty() {
            plan.add_client(self.clients.join(","), Some(true), Some(max_users))?;
        }
        for server in &self.servers {
            let (host, port) = parse_server(server)?;
            plan.add_server(host, Some(port))?;
        }
        for phase in &self.phases {
            plan.add_phase(phase.duration, phase.duration_unit, phase.arrival, phase.arrival_unit)?;
        }
        debug!(
            clients = self.clients.len(),
            servers = self.servers.len(),
            phases = self.phases.len(),
            "applied answers"
        );
        Ok(())
    }
}

fn parse_server(server: &str) -> Result<(&str, u16)> {
    let parts: Vec<&str> = server.split(':').collect();
    if parts.len() != 2 || parts[0].is_empty() {
        return Err(Error::configuration(
            "servers",
            format!("expected host:port, got {:?}", server),
        ));
    }
    match parts[1].parse::<u16>() {
        Ok(port) if port != 0 => Ok((parts[0], port)),
        _ => Err(Error::configuration("servers", format!("invalid port in {:?}", server))),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataConfig {
    #[serde(default)]
    pub files: BTreeMap<String, FileEntry>,
    #[serde(default)]
    pub strings: BTreeMap<String, StringEntry>,
    #[serde(default)]
    pub numbers: BTreeMap<String, NumberEntry>,
    #[serde(default)]
    pub uploadable_files: BTreeMap<String, UploadEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileEntry {
    pub vars: Vec<String>,
    #[serde(default)]
    pub order: Option<FileOrder>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StringEntry {
    #[serde(default)]
    pub length: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NumberEntry {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadEntry {
    pub path: String,
    pub boundary: String,
}

impl DataConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<DataConfig> {
        load_json(path.as_ref())
    }

    /// Registers everything on `plan` in key order. File servers read
    /// `data/<id>.csv`.
    pub fn apply(&self, plan: &mut Plan) -> Result<()> {
        for (id, file) in &self.files {
            plan.add_file_server(
                id.as_str(),
                format!("data/{}.csv", id),
                file.vars.clone(),
                Some(','),
                file.order,
            )?;
        }
        for (name, string) in &self.strings {
            plan.add_random_string_generator(name.as_str(), string.length)?;
        }
        for (name, number) in &self.numbers {
            plan.add_random_number_generator(name.as_str(), number.start, number.end)?;
        }
        for (name, upload) in &self.uploadable_files {
            plan.add_uploadable_file(
                name.as_str(),
                upload.path.as_str(),
                upload.boundary.as_str(),
            )?;
        }
        Ok(())
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        line: source.line(),
        source,
    })
}
