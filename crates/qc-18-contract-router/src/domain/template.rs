//! # Config Templating
//!
//! Interpolates step configuration strings against the step context.
//!
//! Supported placeholders:
//!
//! | Form | Output |
//! |------|--------|
//! | `<%= path %>` | value at `path` |
//! | `<%- path %>` | value at `path`, HTML-escaped |
//! | `${path}` | value at `path` |
//!
//! `path` is a dotted property path; numeric segments index arrays.
//! Missing references fail with `UnresolvedTemplateReference`.

use crate::domain::entities::RouterStepConfig;
use crate::errors::RouterError;
use serde_json::Value;

/// Placeholder flavour found while scanning.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Interpolate,
    Escape,
    EsInterpolate,
}

impl Placeholder {
    const fn open_len(self) -> usize {
        match self {
            Self::Interpolate | Self::Escape => 3,
            Self::EsInterpolate => 2,
        }
    }

    const fn close(self) -> &'static str {
        match self {
            Self::Interpolate | Self::Escape => "%>",
            Self::EsInterpolate => "}",
        }
    }
}

/// Finds the next placeholder opening in `text`.
fn next_placeholder(text: &str) -> Option<(usize, Option<Placeholder>)> {
    let erb = text.find("<%");
    let es = text.find("${");

    match (erb, es) {
        (Some(e), Some(s)) if s < e => Some((s, Some(Placeholder::EsInterpolate))),
        (Some(e), _) => {
            let kind = match text[e + 2..].chars().next() {
                Some('=') => Some(Placeholder::Interpolate),
                Some('-') => Some(Placeholder::Escape),
                _ => None,
            };
            Some((e, kind))
        }
        (None, Some(s)) => Some((s, Some(Placeholder::EsInterpolate))),
        (None, None) => None,
    }
}

/// Renders a single template string.
pub fn render_template(template: &str, context: &Value) -> Result<String, RouterError> {
    let invalid = |reason: &str| RouterError::InvalidTemplate {
        template: template.to_string(),
        reason: reason.to_string(),
    };

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some((start, kind)) = next_placeholder(rest) {
        let Some(kind) = kind else {
            return Err(invalid("evaluate blocks are not supported"));
        };

        out.push_str(&rest[..start]);
        let body_start = start + kind.open_len();
        let Some(body_len) = rest[body_start..].find(kind.close()) else {
            return Err(invalid("unterminated placeholder"));
        };

        let reference = rest[body_start..body_start + body_len].trim();
        if reference.is_empty() {
            return Err(invalid("empty placeholder"));
        }

        let value = lookup(context, reference).ok_or_else(|| {
            RouterError::UnresolvedTemplateReference {
                template: template.to_string(),
                reference: reference.to_string(),
            }
        })?;
        let text = stringify(value).ok_or_else(|| invalid("reference resolves to an object"))?;

        if kind == Placeholder::Escape {
            out.push_str(&escape_html(&text));
        } else {
            out.push_str(&text);
        }

        rest = &rest[body_start + body_len + kind.close().len()..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Renders the templated fields of a step config into a new config.
///
/// `contracts`, `from` and `salt` are rendered; `depends` is copied as is.
/// The input config is never modified.
pub fn render_config(
    context: &Value,
    config: &RouterStepConfig,
) -> Result<RouterStepConfig, RouterError> {
    let contracts = config
        .contracts
        .iter()
        .map(|path| render_template(path, context))
        .collect::<Result<Vec<_>, _>>()?;

    let from = config
        .from
        .as_deref()
        .map(|from| render_template(from, context))
        .transpose()?;

    let salt = config
        .salt
        .as_deref()
        .map(|salt| render_template(salt, context))
        .transpose()?;

    Ok(RouterStepConfig {
        contracts,
        from,
        salt,
        depends: config.depends.clone(),
    })
}

fn lookup<'a>(context: &'a Value, reference: &str) -> Option<&'a Value> {
    reference.split('.').try_fold(context, |node, segment| {
        let segment = segment.trim();
        match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    })
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(format_number(n)),
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items
            .iter()
            .map(stringify)
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join(",")),
        Value::Object(_) => None,
    }
}

/// Integral floats render without a fractional part (`1.0` as `1`).
#[allow(clippy::float_cmp)]
fn format_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 => {
            // `-0.0` renders as `0`.
            format!("{}", f + 0.0)
        }
        _ => n.to_string(),
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================
