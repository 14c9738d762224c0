//! Session scripts.
//!
//! A script describes what one simulated user does, for example:
//!
//! ```text
//! # Log in and open the dashboard.
//! transaction login {
//!     POST "/api/auth/login"
//!         form { "username": "%%_users_id%%", "password": "%%_users_password%%" }
//!         capture json me "$.id";
//!     websocket "{\"name\":\"authentication\"}";
//! }
//! think 5;
//! transaction dashboard {
//!     GET "/api/me";
//!     if me == "anonymous" {
//!         GET "/api/auth/strategies";
//!     }
//! }
//! think 2.5 fixed;
//! ```
use crate::error::{Error, Result};
use crate::session::{DynamicVariable, Request, RequestData, Session, Transaction};
use crate::parse::parse_script_text;
use crate::{Method, Seconds};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptAction {
    Transaction { name: String, nodes: Vec<ScriptNode> },
    Think { seconds: Seconds, random: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptNode {
    Request(ScriptRequest),
    Websocket(String),
    If {
        variable: String,
        expected: String,
        requests: Vec<ScriptRequest>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRequest {
    pub method: Method,
    pub url: String,
    pub data: RequestData,
    /// Overrides the default referer of the method.
    pub referer: Option<String>,
    pub captures: Vec<DynamicVariable>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub actions: Vec<ScriptAction>,
}

impl Script {
    pub fn parse(text: &str) -> Result<Script> {
        let actions = parse_script_text(text)?;
        Ok(Script { actions })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Script> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        match parse_script_text(&text) {
            Ok(actions) => Ok(Script { actions }),
            Err(Error::Parse { message, .. }) => Err(Error::Parse {
                what: format!("session script {}", path.display()),
                message,
            }),
            Err(e) => Err(e),
        }
    }

    /// Appends the script's actions to `session` through its builder API.
    pub fn apply(&self, session: &mut Session) -> Result<()> {
        for action in &self.actions {
            match action {
                ScriptAction::Think { seconds, random } => session.think(*seconds, Some(*random))?,
                ScriptAction::Transaction { name, nodes } => {
                    let transaction = session.add_transaction(name.as_str());
                    for node in nodes {
                        apply_node(transaction, node);
                    }
                }
            }
        }
        Ok(())
    }
}

fn apply_node(transaction: &mut Transaction, node: &ScriptNode) {
    match node {
        ScriptNode::Request(r) => {
            let request = transaction.add_request(r.method, r.url.as_str(), r.data.clone());
            apply_request(request, r);
        }
        ScriptNode::Websocket(raw) => {
            transaction.add_websocket_message(raw.as_str());
        }
        ScriptNode::If {
            variable,
            expected,
            requests,
        } => {
            let statement = transaction.add_if_statement(variable.as_str(), expected.as_str());
            for r in requests {
                let request = statement.add_request(r.method, r.url.as_str(), r.data.clone());
                apply_request(request, r);
            }
        }
    }
}

fn apply_request(request: &mut Request, script: &ScriptRequest) {
    if let Some(referer) = &script.referer {
        request.set_referer(referer.as_str());
    }
    for capture in &script.captures {
        request.add_dynamic_variable(
            capture.name.as_str(),
            capture.kind,
            capture.expression.as_str(),
        );
    }
}
