use combine::combinator::{attempt, skip_until};
use combine::error::ParseError;
use combine::parser::char::{alpha_num, digit, spaces, string};
use combine::stream::state::State;
use combine::{
    any, between, eof, many, many1, none_of, one_of, optional, sep_by, skip_many, token, Parser,
    Stream,
};

use crate::error::{Error, Result};
use crate::script::{ScriptAction, ScriptNode, ScriptRequest};
use crate::session::{DynamicVariable, RequestData, VariableKind};
use crate::{Method, Seconds};

pub fn parse_suite_text(text: &str) -> Result<Vec<(String, Option<u32>)>> {
    parse_suite()
        .easy_parse(State::new(text))
        .map(|(entries, _)| entries)
        .map_err(|err| Error::Parse {
            what: "suite".to_owned(),
            message: err.to_string(),
        })
}

pub fn parse_script_text(text: &str) -> Result<Vec<ScriptAction>> {
    parse_script()
        .easy_parse(State::new(text))
        .map(|(actions, _)| actions)
        .map_err(|err| Error::Parse {
            what: "session script".to_owned(),
            message: err.to_string(),
        })
}

pub fn parse_line_comment<I>() -> impl Parser<Input = I, Output = ()>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    token('#').with(skip_until((token('\n').map(|_| ())).or(eof())))
}

pub fn spaces_with_comments<I>() -> impl Parser<Input = I, Output = ()>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    sep_by::<(), _, _>(spaces(), parse_line_comment())
}

fn inline_spaces<I>() -> impl Parser<Input = I, Output = ()>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    skip_many(one_of(" \t".chars()))
}

fn parse_num<I>() -> impl Parser<Input = I, Output = u32>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    many1::<String, _>(digit()).map(|digits| {
        digits.chars().fold(0u32, |n, d| {
            n.saturating_mul(10)
                .saturating_add(d.to_digit(10).unwrap_or(0))
        })
    })
}

fn parse_seconds<I>() -> impl Parser<Input = I, Output = Seconds>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    (
        many1::<String, _>(digit()),
        optional(token('.').with(many1::<String, _>(digit()))),
    )
        .map(|(whole, fraction)| {
            let text = match fraction {
                Some(fraction) => format!("{}.{}", whole, fraction),
                None => whole,
            };
            text.parse::<Seconds>().unwrap_or_default()
        })
}

fn identifier<I>() -> impl Parser<Input = I, Output = String>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    many1::<String, _>(alpha_num().or(one_of("_-.".chars())))
}

/// A double quoted string; `\` escapes the next character.
fn quoted<I>() -> impl Parser<Input = I, Output = String>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    between(
        token('"'),
        token('"'),
        many::<String, _>(none_of("\"\\".chars()).or(token('\\').with(any()))),
    )
}

// Suite files: one `name[,weight]` per line.

/// Trailing blanks and an optional comment, then a newline or the end of
/// input.
fn line_end<I>() -> impl Parser<Input = I, Output = ()>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    inline_spaces().with(
        parse_line_comment()
            .or(optional(token('\r')).with(token('\n')).map(|_| ()))
            .or(eof()),
    )
}

fn parse_suite_entry<I>() -> impl Parser<Input = I, Output = (String, Option<u32>)>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    (
        identifier().skip(inline_spaces()),
        optional(
            token(',')
                .skip(inline_spaces())
                .with(optional(parse_num())),
        ),
    )
        .skip(line_end())
        .map(|(name, weight)| (name, weight.and_then(|weight| weight)))
}

fn parse_suite<I>() -> impl Parser<Input = I, Output = Vec<(String, Option<u32>)>>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    spaces_with_comments()
        .with(many::<Vec<_>, _>(
            parse_suite_entry().skip(spaces_with_comments()),
        ))
        .skip(eof())
}

// Session scripts.

fn method<I>() -> impl Parser<Input = I, Output = Method>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    attempt(string("GET"))
        .map(|_| Method::Get)
        .or(attempt(string("HEAD")).map(|_| Method::Head))
        .or(attempt(string("POST")).map(|_| Method::Post))
        .or(attempt(string("PUT")).map(|_| Method::Put))
        .or(attempt(string("PATCH")).map(|_| Method::Patch))
        .or(attempt(string("DELETE")).map(|_| Method::Delete))
        .or(string("OPTIONS").map(|_| Method::Options))
}

fn variable_kind<I>() -> impl Parser<Input = I, Output = VariableKind>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    attempt(string("json"))
        .map(|_| VariableKind::Json)
        .or(attempt(string("xpath")).map(|_| VariableKind::Xpath))
        .or(attempt(string("regexp")).map(|_| VariableKind::Regexp))
        .or(attempt(string("re")).map(|_| VariableKind::Re))
        .or(string("psql").map(|_| VariableKind::Psql))
}

#[derive(Debug, PartialEq)]
enum RequestOption {
    Form(Vec<(String, String)>),
    Upload(String),
    Referer(String),
    Capture(DynamicVariable),
}

fn form_pair<I>() -> impl Parser<Input = I, Output = (String, String)>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    (
        quoted().skip(spaces()),
        token(':').skip(spaces()),
        quoted(),
    )
        .map(|(key, _, value)| (key, value))
}

fn form<I>() -> impl Parser<Input = I, Output = Vec<(String, String)>>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    string("form").skip(spaces()).with(between(
        token('{').skip(spaces()),
        token('}'),
        sep_by::<Vec<_>, _, _>(form_pair().skip(spaces()), token(',').skip(spaces())),
    ))
}

fn request_option<I>() -> impl Parser<Input = I, Output = RequestOption>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    form()
        .map(RequestOption::Form)
        .or(string("upload")
            .skip(spaces())
            .with(identifier())
            .map(RequestOption::Upload))
        .or(string("referer")
            .skip(spaces())
            .with(quoted())
            .map(RequestOption::Referer))
        .or((
            string("capture").skip(spaces()),
            variable_kind().skip(spaces()),
            identifier().skip(spaces()),
            quoted(),
        )
            .map(|(_, kind, name, expression)| {
                RequestOption::Capture(DynamicVariable {
                    name,
                    kind,
                    expression,
                })
            }))
}

fn parse_request<I>() -> impl Parser<Input = I, Output = ScriptRequest>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    (
        method().skip(spaces()),
        quoted().skip(spaces()),
        many::<Vec<_>, _>(request_option().skip(spaces())),
        token(';'),
    )
        .map(|(method, url, options, _)| {
            let mut request = ScriptRequest {
                method,
                url,
                data: RequestData::default(),
                referer: None,
                captures: Vec::new(),
            };
            for option in options {
                match option {
                    RequestOption::Form(pairs) => request.data = RequestData::Form(pairs),
                    RequestOption::Upload(key) => request.data = RequestData::Upload(key),
                    RequestOption::Referer(referer) => request.referer = Some(referer),
                    RequestOption::Capture(variable) => request.captures.push(variable),
                }
            }
            request
        })
}

fn parse_websocket<I>() -> impl Parser<Input = I, Output = ScriptNode>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    (
        string("websocket").skip(spaces()),
        quoted().skip(spaces()),
        token(';'),
    )
        .map(|(_, raw, _)| ScriptNode::Websocket(raw))
}

fn parse_if<I>() -> impl Parser<Input = I, Output = ScriptNode>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    (
        string("if").skip(spaces()),
        identifier().skip(spaces()),
        string("==").skip(spaces()),
        quoted().skip(spaces()),
        token('{').skip(spaces_with_comments()),
        many::<Vec<_>, _>(parse_request().skip(spaces_with_comments())),
        token('}'),
    )
        .map(|(_, variable, _, expected, _, requests, _)| ScriptNode::If {
            variable,
            expected,
            requests,
        })
}

fn parse_node<I>() -> impl Parser<Input = I, Output = ScriptNode>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    parse_request()
        .map(ScriptNode::Request)
        .or(parse_websocket())
        .or(parse_if())
}

fn parse_transaction<I>() -> impl Parser<Input = I, Output = ScriptAction>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    (
        attempt(string("transaction")).skip(spaces()),
        identifier().skip(spaces()),
        token('{').skip(spaces_with_comments()),
        many::<Vec<_>, _>(parse_node().skip(spaces_with_comments())),
        token('}'),
    )
        .map(|(_, name, _, nodes, _)| ScriptAction::Transaction { name, nodes })
}

fn parse_think<I>() -> impl Parser<Input = I, Output = ScriptAction>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    (
        attempt(string("think")).skip(spaces()),
        parse_seconds().skip(spaces()),
        optional(string("fixed").skip(spaces())),
        token(';'),
    )
        .map(|(_, seconds, fixed, _)| ScriptAction::Think {
            seconds,
            random: fixed.is_none(),
        })
}

fn parse_script<I>() -> impl Parser<Input = I, Output = Vec<ScriptAction>>
where
    I: Stream<Item = char>,
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    spaces_with_comments()
        .with(many::<Vec<_>, _>(
            parse_transaction()
                .or(parse_think())
                .skip(spaces_with_comments()),
        ))
        .skip(eof())
}
