use crate::error::{Error, Result};
use crate::format::FormattedRequest;
use crate::{Method, Probability, Seconds};
use std::cell::Cell;
use std::rc::Rc;

/// Hands out WebSocket message sequence ids. One counter is shared by all
/// sessions of a plan, so ids keep increasing in construction order.
#[derive(Debug, Clone, Default)]
pub struct MessageSequence(Rc<Cell<u64>>);

impl MessageSequence {
    pub fn new() -> MessageSequence {
        MessageSequence::default()
    }

    fn next(&self) -> u64 {
        let id = self.0.get() + 1;
        self.0.set(id);
        id
    }
}

/// One simulated user's script.
#[derive(Debug, Clone)]
pub struct Session {
    name: String,
    probability: Probability,
    actions: Vec<Action>,
    sequence: MessageSequence,
}

impl Session {
    pub(crate) fn new(
        name: String,
        probability: Probability,
        sequence: MessageSequence,
    ) -> Session {
        Session {
            name,
            probability,
            actions: Vec::new(),
            sequence,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn probability(&self) -> Probability {
        self.probability
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub(crate) fn actions_mut(&mut self) -> &mut [Action] {
        &mut self.actions
    }

    pub fn add_transaction(&mut self, name: impl Into<String>) -> &mut Transaction {
        let transaction = Transaction {
            name: name.into(),
            requests: Vec::new(),
            sequence: self.sequence.clone(),
        };
        self.actions.push(Action::Transaction(transaction));
        match self.actions.last_mut() {
            Some(Action::Transaction(transaction)) => transaction,
            _ => unreachable!("bug"),
        }
    }

    /// Appends a pause. `is_random` defaults to `true`; an explicit `false`
    /// keeps the pause fixed.
    pub fn think(&mut self, seconds: Seconds, is_random: Option<bool>) -> Result<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(Error::configuration(
                "seconds",
                format!("think time must be a non-negative number, got {}", seconds),
            ));
        }
        self.actions.push(Action::Think(Think {
            seconds,
            random: is_random.unwrap_or(true),
        }));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    Transaction(Transaction),
    Think(Think),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Think {
    pub seconds: Seconds,
    pub random: bool,
}

/// A named group of requests, reported as one unit by Tsung.
#[derive(Debug, Clone)]
pub struct Transaction {
    name: String,
    requests: Vec<RequestNode>,
    sequence: MessageSequence,
}

impl Transaction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requests(&self) -> &[RequestNode] {
        &self.requests
    }

    pub(crate) fn requests_mut(&mut self) -> &mut [RequestNode] {
        &mut self.requests
    }

    pub fn add_request(
        &mut self,
        method: Method,
        url: impl Into<String>,
        data: RequestData,
    ) -> &mut Request {
        self.requests
            .push(RequestNode::Request(Request::new(method, url, data)));
        match self.requests.last_mut() {
            Some(RequestNode::Request(request)) => request,
            _ => unreachable!("bug"),
        }
    }

    pub fn add_websocket_message(&mut self, raw: impl Into<String>) -> &mut WebsocketMessage {
        let message = WebsocketMessage::new(raw.into(), self.sequence.next());
        self.requests.push(RequestNode::Websocket(message));
        match self.requests.last_mut() {
            Some(RequestNode::Websocket(message)) => message,
            _ => unreachable!("bug"),
        }
    }

    pub fn add_if_statement(
        &mut self,
        variable: impl Into<String>,
        expected: impl Into<String>,
    ) -> &mut IfStatement {
        self.requests.push(RequestNode::If(IfStatement {
            variable: variable.into(),
            expected: expected.into(),
            requests: Vec::new(),
        }));
        match self.requests.last_mut() {
            Some(RequestNode::If(statement)) => statement,
            _ => unreachable!("bug"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RequestNode {
    Request(Request),
    Websocket(WebsocketMessage),
    If(IfStatement),
}

/// Payload of a request: form fields, or the key of a registered
/// uploadable file holding a complete multipart body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestData {
    Form(Vec<(String, String)>),
    Upload(String),
}

impl RequestData {
    pub fn form<I, K, V>(pairs: I) -> RequestData
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        RequestData::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn upload(key: impl Into<String>) -> RequestData {
        RequestData::Upload(key.into())
    }
}

impl Default for RequestData {
    fn default() -> RequestData {
        RequestData::Form(Vec::new())
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    data: RequestData,
    referer: Option<String>,
    variables: Vec<DynamicVariable>,
    formatted: Option<FormattedRequest>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>, data: RequestData) -> Request {
        let referer = if method.is_query_only() {
            None
        } else {
            Some("/".to_owned())
        };
        Request {
            method,
            url: url.into(),
            data,
            referer,
            variables: Vec::new(),
            formatted: None,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn data(&self) -> &RequestData {
        &self.data
    }

    pub fn referer(&self) -> Option<&str> {
        self.referer.as_ref().map(String::as_str)
    }

    pub fn variables(&self) -> &[DynamicVariable] {
        &self.variables
    }

    /// Set once the plan is finalized.
    pub fn formatted(&self) -> Option<&FormattedRequest> {
        self.formatted.as_ref()
    }

    pub fn set_referer(&mut self, referer: impl Into<String>) -> &mut Request {
        self.referer = Some(referer.into());
        self
    }

    /// Captures part of the response into `name`. Names may repeat; the
    /// last capture at run time wins.
    pub fn add_dynamic_variable(
        &mut self,
        name: impl Into<String>,
        kind: VariableKind,
        expression: impl Into<String>,
    ) -> &mut Request {
        self.variables.push(DynamicVariable {
            name: name.into(),
            kind,
            expression: expression.into(),
        });
        self
    }

    pub(crate) fn set_formatted(&mut self, formatted: FormattedRequest) {
        self.formatted = Some(formatted);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Json,
    Xpath,
    Regexp,
    Re,
    Psql,
}

impl VariableKind {
    /// Name of the `dyn_variable` attribute holding the expression.
    pub fn attribute(self) -> &'static str {
        match self {
            VariableKind::Json => "jsonpath",
            VariableKind::Xpath => "xpath",
            VariableKind::Regexp => "regexp",
            VariableKind::Re => "re",
            VariableKind::Psql => "pgsql_expr",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DynamicVariable {
    pub name: String,
    pub kind: VariableKind,
    pub expression: String,
}

/// A socket.io style frame: `<type>:<id>::<payload>`, type `4` for JSON
/// payloads and `3` otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct WebsocketMessage {
    raw: String,
    sequence_id: u64,
    frame_type: char,
}

impl WebsocketMessage {
    fn new(raw: String, sequence_id: u64) -> WebsocketMessage {
        let frame_type = if serde_json::from_str::<serde_json::Value>(&raw).is_ok() {
            '4'
        } else {
            '3'
        };
        WebsocketMessage {
            raw,
            sequence_id,
            frame_type,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    pub fn frame_type(&self) -> char {
        self.frame_type
    }

    pub fn message(&self) -> String {
        format!("{}:{}::{}", self.frame_type, self.sequence_id, self.raw)
    }
}

/// Requests that only run when `variable` equals `expected`.
#[derive(Debug, Clone)]
pub struct IfStatement {
    variable: String,
    expected: String,
    requests: Vec<Request>,
}

impl IfStatement {
    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn expected(&self) -> &str {
        &self.expected
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub(crate) fn requests_mut(&mut self) -> &mut [Request] {
        &mut self.requests
    }

    pub fn add_request(
        &mut self,
        method: Method,
        url: impl Into<String>,
        data: RequestData,
    ) -> &mut Request {
        self.requests.push(Request::new(method, url, data));
        match self.requests.last_mut() {
            Some(request) => request,
            None => unreachable!("bug"),
        }
    }
}
