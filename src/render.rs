//! Tsung XML output.

use crate::plan::{FinalizedPlan, Plan};
use crate::session::{
    Action, IfStatement, Request, RequestNode, Session, Think, Transaction, WebsocketMessage,
};
use crate::stats::PlanStatistics;
use std::borrow::Cow;
use std::fmt;

const INDENT: &str = "  ";

pub fn render(plan: &FinalizedPlan) -> String {
    TsungXml(plan).to_string()
}

/// Displays a finalized plan as a Tsung document.
pub struct TsungXml<'a>(pub &'a FinalizedPlan);

impl<'a> fmt::Display for TsungXml<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let FinalizedPlan { plan, statistics } = self.0;
        let config = plan.config();

        writeln!(f, r#"<?xml version="1.0"?>"#)?;
        writeln!(f, r#"<!DOCTYPE tsung SYSTEM "{}">"#, escape(&config.dtd_location))?;
        write_statistics(f, statistics)?;
        writeln!(
            f,
            r#"<tsung loglevel="{}" version="{}" dumptraffic="{}">"#,
            escape(&config.log_level),
            escape(&config.version),
            config.dump_traffic
        )?;
        write_clients(f, plan)?;
        write_servers(f, plan)?;
        write_load(f, plan)?;
        write_options(f, plan)?;

        writeln!(f, "{}<sessions>", INDENT)?;
        for session in plan.sessions() {
            write_session(f, plan, session)?;
        }
        writeln!(f, "{}</sessions>", INDENT)?;
        writeln!(f, "</tsung>")
    }
}

fn write_statistics(f: &mut fmt::Formatter, statistics: &PlanStatistics) -> fmt::Result {
    writeln!(f, "<!--")?;
    writeln!(
        f,
        "  Weighted average requests per second: {}",
        statistics.weighted_average_requests_per_second
    )?;
    writeln!(
        f,
        "  Weighted average session length: {}s",
        statistics.weighted_average_session_length
    )?;
    writeln!(f, "  Max session length: {}s", statistics.max_session_length)?;
    writeln!(f, "  Transaction scores:")?;
    for score in &statistics.transaction_scores {
        writeln!(f, "    {}: {:.2}%", comment_safe(&score.name), score.score)?;
    }
    writeln!(f, "-->")
}

fn write_clients(f: &mut fmt::Formatter, plan: &Plan) -> fmt::Result {
    writeln!(f, "{}<clients>", INDENT)?;
    for client in plan.clients() {
        writeln!(
            f,
            r#"{0}{0}<client host="{1}" use_controller_vm="{2}" maxusers="{3}"/>"#,
            INDENT,
            escape(&client.host),
            client.use_controller_vm,
            client.max_users
        )?;
    }
    writeln!(f, "{}</clients>", INDENT)
}

fn write_servers(f: &mut fmt::Formatter, plan: &Plan) -> fmt::Result {
    writeln!(f, "{}<servers>", INDENT)?;
    for server in plan.servers() {
        writeln!(
            f,
            r#"{0}{0}<server host="{1}" port="{2}" type="tcp"/>"#,
            INDENT,
            escape(&server.host),
            server.port
        )?;
    }
    writeln!(f, "{}</servers>", INDENT)
}

fn write_load(f: &mut fmt::Formatter, plan: &Plan) -> fmt::Result {
    writeln!(f, "{}<load>", INDENT)?;
    for phase in plan.phases() {
        writeln!(
            f,
            r#"{0}{0}<arrivalphase phase="{1}" duration="{2}" unit="{3}">"#,
            INDENT,
            phase.id,
            phase.duration,
            phase.duration_unit.as_str()
        )?;
        writeln!(
            f,
            r#"{0}{0}{0}<users arrivalrate="{1}" unit="{2}"/>"#,
            INDENT,
            phase.new_users,
            phase.new_users_unit.as_str()
        )?;
        writeln!(f, "{0}{0}</arrivalphase>", INDENT)?;
    }
    writeln!(f, "{}</load>", INDENT)
}

fn write_options(f: &mut fmt::Formatter, plan: &Plan) -> fmt::Result {
    writeln!(f, "{}<options>", INDENT)?;
    for file in plan.file_servers() {
        writeln!(
            f,
            r#"{0}{0}<option name="file_server" id="{1}" value="{2}"/>"#,
            INDENT,
            escape(&file.id),
            escape(&file.path)
        )?;
    }
    writeln!(f, "{}</options>", INDENT)
}

fn write_session(f: &mut fmt::Formatter, plan: &Plan, session: &Session) -> fmt::Result {
    let level = 2;
    indent(f, level)?;
    writeln!(
        f,
        r#"<session name="{}" probability="{}" type="ts_http">"#,
        escape(session.name()),
        session.probability()
    )?;
    write_dynvars(f, plan, level + 1)?;
    for action in session.actions() {
        match action {
            Action::Transaction(transaction) => write_transaction(f, transaction, level + 1)?,
            Action::Think(think) => write_think(f, think, level + 1)?,
        }
    }
    indent(f, level)?;
    writeln!(f, "</session>")
}

/// Every session reads the plan's file servers and random generators.
fn write_dynvars(f: &mut fmt::Formatter, plan: &Plan, level: usize) -> fmt::Result {
    for file in plan.file_servers() {
        indent(f, level)?;
        writeln!(
            f,
            r#"<setdynvars sourcetype="file" fileid="{}" delimiter="{}" order="{}">"#,
            escape(&file.id),
            escape(&file.delimiter.to_string()),
            file.order.as_str()
        )?;
        for var in &file.vars {
            indent(f, level + 1)?;
            writeln!(f, r#"<var name="{}"/>"#, escape(var))?;
        }
        indent(f, level)?;
        writeln!(f, "</setdynvars>")?;
    }
    for generator in plan.string_generators() {
        indent(f, level)?;
        writeln!(f, r#"<setdynvars sourcetype="random_string" length="{}">"#, generator.length)?;
        indent(f, level + 1)?;
        writeln!(f, r#"<var name="{}"/>"#, escape(&generator.name))?;
        indent(f, level)?;
        writeln!(f, "</setdynvars>")?;
    }
    for generator in plan.number_generators() {
        indent(f, level)?;
        writeln!(
            f,
            r#"<setdynvars sourcetype="random_number" start="{}" end="{}">"#,
            generator.start, generator.end
        )?;
        indent(f, level + 1)?;
        writeln!(f, r#"<var name="{}"/>"#, escape(&generator.name))?;
        indent(f, level)?;
        writeln!(f, "</setdynvars>")?;
    }
    Ok(())
}

fn write_think(f: &mut fmt::Formatter, think: &Think, level: usize) -> fmt::Result {
    indent(f, level)?;
    writeln!(f, r#"<thinktime value="{}" random="{}"/>"#, think.seconds, think.random)
}

fn write_transaction(
    f: &mut fmt::Formatter,
    transaction: &Transaction,
    level: usize,
) -> fmt::Result {
    indent(f, level)?;
    writeln!(f, r#"<transaction name="{}">"#, escape(transaction.name()))?;
    for node in transaction.requests() {
        match node {
            RequestNode::Request(request) => write_request(f, request, level + 1)?,
            RequestNode::Websocket(message) => write_websocket(f, message, level + 1)?,
            RequestNode::If(statement) => write_if(f, statement, level + 1)?,
        }
    }
    indent(f, level)?;
    writeln!(f, "</transaction>")
}

fn write_if(f: &mut fmt::Formatter, statement: &IfStatement, level: usize) -> fmt::Result {
    indent(f, level)?;
    writeln!(
        f,
        r#"<if var="{}" eq="{}">"#,
        escape(statement.variable()),
        escape(statement.expected())
    )?;
    for request in statement.requests() {
        write_request(f, request, level + 1)?;
    }
    indent(f, level)?;
    writeln!(f, "</if>")
}

fn write_websocket(
    f: &mut fmt::Formatter,
    message: &WebsocketMessage,
    level: usize,
) -> fmt::Result {
    indent(f, level)?;
    writeln!(f, "<request>")?;
    indent(f, level + 1)?;
    writeln!(
        f,
        r#"<websocket type="message" frame="text">{}</websocket>"#,
        escape(&message.message())
    )?;
    indent(f, level)?;
    writeln!(f, "</request>")
}

fn write_request(f: &mut fmt::Formatter, request: &Request, level: usize) -> fmt::Result {
    let formatted = request.formatted();
    let substitute = formatted.map_or(false, |formatted| formatted.substitute);
    let url = formatted.map_or(request.url(), |formatted| formatted.url.as_str());

    indent(f, level)?;
    if substitute {
        writeln!(f, r#"<request subst="true">"#)?;
    } else {
        writeln!(f, "<request>")?;
    }
    for variable in request.variables() {
        indent(f, level + 1)?;
        writeln!(
            f,
            r#"<dyn_variable name="{}" {}="{}"/>"#,
            escape(&variable.name),
            variable.kind.attribute(),
            escape(&variable.expression)
        )?;
    }

    indent(f, level + 1)?;
    write!(
        f,
        r#"<http url="{}" method="{}" version="1.1""#,
        escape(url),
        request.method()
    )?;
    if let Some(formatted) = formatted {
        if let Some(body) = &formatted.body {
            write!(
                f,
                r#" contents="{}" content_type="application/x-www-form-urlencoded""#,
                escape(body)
            )?;
        }
        if let Some(upload) = &formatted.upload {
            write!(
                f,
                r#" contents_from_file="{}" content_type="{}""#,
                escape(&upload.path),
                escape(&upload.content_type)
            )?;
        }
    }
    match request.referer() {
        Some(referer) => {
            writeln!(f, ">")?;
            indent(f, level + 2)?;
            writeln!(f, r#"<http_header name="Referer" value="{}"/>"#, escape(referer))?;
            indent(f, level + 1)?;
            writeln!(f, "</http>")?;
        }
        None => writeln!(f, "/>")?,
    }

    indent(f, level)?;
    writeln!(f, "</request>")
}

fn indent(f: &mut fmt::Formatter, level: usize) -> fmt::Result {
    for _ in 0..level {
        f.write_str(INDENT)?;
    }
    Ok(())
}

/// Escapes a value for use in an attribute or text node.
pub fn escape(value: &str) -> Cow<'_, str> {
    if !value.contains(|c: char| match c {
        '&' | '<' | '>' | '"' | '\'' => true,
        _ => false,
    }) {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// `--` may not appear inside an XML comment.
fn comment_safe(value: &str) -> String {
    let mut safe = value.to_owned();
    while safe.contains("--") {
        safe = safe.replace("--", "- -");
    }
    safe
}
