//! Resource path and query string parsing.
//!
//! This is a syntactic pass only: it splits a request target into path segments
//! with their parenthesized arguments and decodes query options. Whether a segment
//! names an entity set, a property, or an operation is decided by the handler
//! against the model.

use crate::error::{ODataError, ODataResult};
use url::Url;

/// One path segment, e.g. `ESAllPrim(32767)` or `FICRTString()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub name: String,
    /// Parenthesized arguments, `None` when the segment has no parentheses.
    /// Each entry is `(Some(name), literal)` for `name=literal` or `(None, literal)`.
    pub arguments: Option<Vec<(Option<String>, String)>>,
}

impl PathSegment {
    pub fn is_system(&self) -> bool {
        self.name.starts_with('$')
    }
}

/// A parsed request target relative to the service root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePath {
    pub segments: Vec<PathSegment>,
    pub query: Vec<(String, String)>,
}

impl ResourcePath {
    /// Value of a query option, e.g. `$top` or a parameter alias `@p`.
    pub fn query_option(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// `$top`/`$skip` style non-negative integer option.
    pub fn numeric_option(&self, name: &str) -> ODataResult<Option<usize>> {
        self.query_option(name)
            .map(|raw| {
                raw.parse::<usize>().map_err(|_| {
                    ODataError::bad_request(format!("{} must be a non-negative integer", name))
                })
            })
            .transpose()
    }
}

/// Strip the service root from a request target.
///
/// Accepts an absolute URI under `base`, an absolute path under `base`'s path,
/// or a path already relative to the root.
pub fn relative_to_root<'a>(base: &Url, uri: &'a str) -> ODataResult<&'a str> {
    if let Some(rest) = uri.strip_prefix(base.as_str()) {
        return Ok(rest);
    }
    if uri.contains("://") {
        let service = base.as_str().trim_end_matches('/');
        return match uri.strip_prefix(service) {
            Some(rest) if rest.is_empty() || rest.starts_with('?') => Ok(rest),
            _ => Err(ODataError::not_found(uri.to_string())),
        };
    }
    if uri.starts_with('/') {
        let base_path = base.path();
        return uri
            .strip_prefix(base_path)
            .or_else(|| {
                uri.strip_prefix(base_path.trim_end_matches('/'))
                    .filter(|rest| rest.is_empty() || rest.starts_with('?'))
            })
            .ok_or_else(|| ODataError::not_found(uri.to_string()));
    }
    Ok(uri)
}

/// Parse a root-relative request target.
pub fn parse_resource_path(relative: &str) -> ODataResult<ResourcePath> {
    let (path, query) = match relative.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (relative, None),
    };
    let path = path.split('#').next().unwrap_or_default();

    let mut segments = Vec::new();
    if !path.is_empty() {
        for raw in split_outside_quotes(path, '/') {
            if raw.is_empty() {
                return Err(ODataError::bad_request(format!(
                    "empty path segment in '{}'",
                    relative
                )));
            }
            let decoded = decode(raw)?;
            if decoded == "." || decoded == ".." {
                return Err(ODataError::bad_request(format!(
                    "relative path segment '{}' in '{}'",
                    decoded, relative
                )));
            }
            segments.push(parse_segment(&decoded)?);
        }
    }

    let query = match query {
        Some(query) => parse_query(query)?,
        None => Vec::new(),
    };
    Ok(ResourcePath { segments, query })
}

fn parse_segment(raw: &str) -> ODataResult<PathSegment> {
    let Some(open) = raw.find('(') else {
        return Ok(PathSegment {
            name: raw.to_string(),
            arguments: None,
        });
    };
    let inner = raw[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| ODataError::bad_request(format!("unbalanced parentheses in '{}'", raw)))?;
    let name = raw[..open].to_string();
    if name.is_empty() {
        return Err(ODataError::bad_request(format!("missing name before '(' in '{}'", raw)));
    }

    let mut arguments = Vec::new();
    if !inner.trim().is_empty() {
        for argument in split_outside_quotes(inner, ',') {
            arguments.push(parse_argument(argument.trim(), raw)?);
        }
    }
    Ok(PathSegment {
        name,
        arguments: Some(arguments),
    })
}

fn parse_argument(argument: &str, segment: &str) -> ODataResult<(Option<String>, String)> {
    if argument.is_empty() {
        return Err(ODataError::bad_request(format!("empty argument in '{}'", segment)));
    }
    match split_outside_quotes(argument, '=').as_slice() {
        [literal] => Ok((None, literal.to_string())),
        [name, literal] if is_identifier(name.trim()) => {
            Ok((Some(name.trim().to_string()), literal.trim().to_string()))
        }
        _ => Err(ODataError::bad_request(format!(
            "malformed argument '{}' in '{}'",
            argument, segment
        ))),
    }
}

fn parse_query(query: &str) -> ODataResult<Vec<(String, String)>> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            Ok((decode(name)?, decode(value)?))
        })
        .collect()
}

fn decode(text: &str) -> ODataResult<String> {
    urlencoding::decode(text)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| ODataError::bad_request(format!("invalid percent-encoding: {}", e)))
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '@')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

/// Split on `separator` except inside single-quoted literals and parentheses.
fn split_outside_quotes(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut depth = 0usize;
    let mut start = 0;
    for (index, c) in text.char_indices() {
        match c {
            '\'' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => depth = depth.saturating_sub(1),
            c if c == separator && !in_quotes && depth == 0 => {
                parts.push(&text[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}
