/*!
format.rs

Human-readable rendering of API responses (text output mode).

  - Single resource: boxed header + FIELD / VALUE table
    (id, type, href, state, then every `properties.*` entry)
  - Collection (`items` array): boxed header + ID / NAME / STATE table
  - No body: one confirmation line

Style decisions follow the environment:
  NO_COLOR  -> plain text
  NO_EMOJI  -> no emoji prefixes
  COLUMNS   -> table width (clamped 40..=220, default 100)

JSON output does not go through this module.
*/

use std::borrow::Cow;

use serde_json::Value;

use crate::cmd::catalog::{Resource, Verb};
use crate::wait::resource_state;

/* -------------------------------------------------------------------------- */
/* Style Options                                                              */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub use_color: bool,
    pub use_emoji: bool,
    pub term_width: usize,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self::detect()
    }
}

impl StyleOptions {
    pub fn detect() -> Self {
        let width = std::env::var("COLUMNS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|w| w.clamp(40, 220))
            .unwrap_or(100);

        StyleOptions {
            use_color: std::env::var_os("NO_COLOR").is_none(),
            use_emoji: std::env::var_os("NO_EMOJI").is_none(),
            term_width: width,
        }
    }

    /// No color, no emoji, fixed width.
    #[cfg(test)]
    pub fn plain() -> Self {
        StyleOptions {
            use_color: false,
            use_emoji: false,
            term_width: 100,
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Color / Emoji                                                              */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Primary,
    Secondary,
    Accent,
    Success,
    Warning,
    Error,
    Dim,
}

pub fn color(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    if !style.use_color {
        return text.as_ref().to_string();
    }
    let code = match role {
        Role::Primary => "38;5;45",
        Role::Secondary => "38;5;250",
        Role::Accent => "38;5;213",
        Role::Success => "38;5;82",
        Role::Warning => "38;5;214",
        Role::Error => "38;5;196",
        Role::Dim => "2",
    };
    format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
}

pub fn emoji(tag: &str, style: &StyleOptions) -> &'static str {
    if !style.use_emoji {
        return "";
    }
    match tag {
        "success" => "✔",
        "list" => "📜",
        "resource" => "📦",
        _ => "",
    }
}

/// Color a lifecycle state by how healthy it sounds.
fn state_color(state: &str, style: &StyleOptions) -> String {
    let role = match state.to_ascii_uppercase().as_str() {
        "AVAILABLE" | "ACTIVE" | "RUNNING" | "ENABLED" | "DEPLOYED" => Role::Success,
        "FAILED" | "ERROR" | "FAILED_CREATING" | "FAILED_UPDATING" => Role::Error,
        _ => Role::Warning,
    };
    color(role, state, style)
}

/* -------------------------------------------------------------------------- */
/* Response Rendering                                                         */
/* -------------------------------------------------------------------------- */

pub fn render(resource: &Resource, verb: Verb, body: Option<&Value>, style: &StyleOptions) -> String {
    let Some(body) = body else {
        return format!(
            "{} {} {} (request accepted)",
            emoji("success", style),
            resource.name,
            verb.past_tense()
        )
        .trim_start()
        .to_string();
    };
    match body.get("items").and_then(Value::as_array) {
        Some(items) => render_collection(resource, items, style),
        None => render_item(resource, body, style),
    }
}

fn render_item(resource: &Resource, body: &Value, style: &StyleOptions) -> String {
    let mut rows: Vec<Vec<String>> = Vec::new();
    for key in ["id", "type", "href"] {
        if let Some(v) = body.get(key) {
            rows.push(vec![key.to_string(), describe(v)]);
        }
    }
    if let Some(state) = resource_state(body) {
        rows.push(vec!["state".to_string(), state_color(state, style)]);
    }
    if let Some(props) = body.get("properties").and_then(Value::as_object) {
        for (k, v) in props {
            rows.push(vec![k.clone(), describe(v)]);
        }
    }

    let title = format!("{} {}", emoji("resource", style), resource.name);
    let subtitle = body.get("id").map(describe);
    format!(
        "{}\n{}",
        box_header(title.trim_start(), subtitle, style),
        table(&["FIELD", "VALUE"], &rows, style)
    )
}

fn render_collection(resource: &Resource, items: &[Value], style: &StyleOptions) -> String {
    let title = format!("{} {} ({})", emoji("list", style), resource.name, items.len());
    let header = box_header(title.trim_start(), None::<&str>, style);
    if items.is_empty() {
        return format!("{header}\n(none)");
    }
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|item| {
            vec![
                item.get("id").map(describe).unwrap_or_default(),
                display_name(item).unwrap_or_default(),
                resource_state(item)
                    .map(|s| state_color(s, style))
                    .unwrap_or_default(),
            ]
        })
        .collect();
    format!("{header}\n{}", table(&["ID", "NAME", "STATE"], &rows, style))
}

/// Whatever the API calls the resource's name.
fn display_name(item: &Value) -> Option<String> {
    let props = item.get("properties")?;
    ["name", "displayName", "zoneName", "certificateName"]
        .iter()
        .find_map(|k| props.get(*k))
        .map(describe)
}

fn describe(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/* -------------------------------------------------------------------------- */
/* Box Header / Table                                                         */
/* -------------------------------------------------------------------------- */

pub fn box_header(
    title: impl AsRef<str>,
    subtitle: Option<impl AsRef<str>>,
    style: &StyleOptions,
) -> String {
    let title = color(Role::Primary, title.as_ref(), style);
    let inner = match subtitle {
        Some(sub) => format!("{title}  {}", color(Role::Secondary, sub.as_ref(), style)),
        None => title,
    };
    let max_inner = style.term_width.saturating_sub(4).max(10);
    let inner = if display_width(&inner) > max_inner {
        truncate_ellipsis(&strip_ansi(&inner), max_inner)
    } else {
        inner
    };
    let width = display_width(&inner) + 2;
    format!(
        "┌{line}┐\n│ {inner} │\n└{line}┘",
        line = "─".repeat(width)
    )
}

pub fn table(headers: &[&str], rows: &[Vec<String>], style: &StyleOptions) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let col_count = headers.len();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(col_count) {
            widths[i] = widths[i].max(display_width(cell));
        }
    }

    // Shrink the widest columns until the table fits.
    let total: usize = widths.iter().sum::<usize>() + (col_count - 1) * 2;
    if total > style.term_width {
        let mut overflow = total - style.term_width;
        let mut ordered: Vec<usize> = (0..col_count).collect();
        ordered.sort_by(|a, b| widths[*b].cmp(&widths[*a]));
        for idx in ordered {
            if overflow == 0 {
                break;
            }
            let shrink = widths[idx].saturating_sub(4).min(overflow);
            widths[idx] -= shrink;
            overflow -= shrink;
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    let header: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| color(Role::Accent, pad_or_truncate(h, widths[i]), style))
        .collect();
    lines.push(header.join("  "));
    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    lines.push(color(Role::Dim, sep.join("  "), style));

    for row in rows {
        let cells: Vec<String> = (0..col_count)
            .map(|c| pad_or_truncate(row.get(c).map(String::as_str).unwrap_or(""), widths[c]))
            .collect();
        lines.push(cells.join("  ").trim_end().to_string());
    }
    lines.join("\n")
}

fn pad_or_truncate(s: &str, width: usize) -> String {
    let len = display_width(s);
    if len <= width {
        return format!("{s}{}", " ".repeat(width - len));
    }
    truncate_ellipsis(&strip_ansi(s), width)
}

pub fn truncate_ellipsis(s: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

/* -------------------------------------------------------------------------- */
/* ANSI / Width Utilities                                                      */
/* -------------------------------------------------------------------------- */

fn strip_ansi(s: &str) -> Cow<'_, str> {
    if !s.contains('\x1b') {
        return Cow::Borrowed(s);
    }
    let mut buf = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        buf.push(c);
    }
    Cow::Owned(buf)
}

fn display_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}
