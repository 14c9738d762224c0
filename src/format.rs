//! Turns a request's structured data into what Tsung sends on the wire.

use crate::error::{Error, Result};
use crate::plan::UploadableFile;
use crate::session::{Request, RequestData};
use std::collections::BTreeMap;
use url::form_urlencoded;

/// Marker that opens a placeholder such as `%%_user_id%%`.
pub const PLACEHOLDER_PREFIX: &str = "%%_";

#[derive(Debug, Clone, PartialEq)]
pub struct FormattedRequest {
    /// Tsung must substitute `%%_name%%` tokens in this request.
    pub substitute: bool,
    /// The request URL, with the query string appended for GET and HEAD.
    pub url: String,
    /// Form encoded body for the other methods.
    pub body: Option<String>,
    pub upload: Option<UploadBody>,
}

/// A prepared multipart body on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadBody {
    pub path: String,
    pub content_type: String,
}

/// Query strings are joined with `&` when the URL already carries a `?`.
pub fn format_request(
    request: &Request,
    uploads: &BTreeMap<String, UploadableFile>,
) -> Result<FormattedRequest> {
    let substitute = needs_substitution(request);
    let mut formatted = FormattedRequest {
        substitute,
        url: request.url().to_owned(),
        body: None,
        upload: None,
    };

    match request.data() {
        RequestData::Form(pairs) => {
            let content = encode_form(pairs, substitute);
            if request.method().is_query_only() {
                if !content.is_empty() {
                    let separator = if formatted.url.contains('?') { '&' } else { '?' };
                    formatted.url.push(separator);
                    formatted.url.push_str(&content);
                }
            } else {
                formatted.body = Some(content);
            }
        }
        RequestData::Upload(key) => {
            let file = uploads
                .get(key)
                .ok_or_else(|| Error::UnknownUploadableFile(key.clone()))?;
            formatted.upload = Some(UploadBody {
                path: file.path.clone(),
                content_type: format!("multipart/form-data; boundary={}", file.boundary),
            });
        }
    }

    Ok(formatted)
}

fn needs_substitution(request: &Request) -> bool {
    if request.url().contains(PLACEHOLDER_PREFIX) || !request.variables().is_empty() {
        return true;
    }
    match request.data() {
        RequestData::Form(pairs) => pairs
            .iter()
            .any(|(k, v)| k.contains(PLACEHOLDER_PREFIX) || v.contains(PLACEHOLDER_PREFIX)),
        RequestData::Upload(key) => key.contains(PLACEHOLDER_PREFIX),
    }
}

/// Form-encodes `pairs`. When substituting, the encoded `%%` of the
/// placeholders is put back; every other escape is left alone.
pub fn encode_form(pairs: &[(String, String)], substitute: bool) -> String {
    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish();
    if substitute {
        encoded.replace("%25%25", "%%")
    } else {
        encoded
    }
}
