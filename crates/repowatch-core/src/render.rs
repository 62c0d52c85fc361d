//! The announcement template mini-language.
//!
//! Templates are operator-authored strings with `%`-escapes, e.g. the
//! default `"[%s|%b|%a] %m"`. Rendering produces lines of [`Span`]s:
//! literal text interleaved with opaque color/emphasis markers. Turning
//! markers into actual control bytes (IRC `\x03`, ANSI, or nothing at
//! all) is the dispatcher's business, which keeps rendering pure and the
//! tests free of wire encodings.

use serde::Serialize;

use crate::repo::{CommitRecord, RepositoryConfig};

/// One piece of a rendered output line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Span {
    Text(String),
    /// `%(N)` or `%(N,M)`: set foreground, optionally background.
    Color { fg: u8, bg: Option<u8> },
    /// `%!`: toggle bold. Effect is ordering-dependent by design.
    Bold,
    /// `%r`: reset color and emphasis.
    Reset,
}

pub type Line = Vec<Span>;

/// Substitution values for one commit in one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatContext {
    pub short_name: String,
    pub display_name: String,
    pub branch: String,
    pub url: String,
    pub short_id: String,
    pub full_id: String,
    pub author_name: String,
    pub author_email: String,
    pub summary: String,
    pub link: String,
}

impl FormatContext {
    pub fn new(config: &RepositoryConfig, commit: &CommitRecord) -> Self {
        FormatContext {
            short_name: config.name.clone(),
            display_name: config.display_name.clone(),
            // Tail component only, so "origin/master" and "master" read the same.
            branch: config
                .branch
                .rsplit('/')
                .next()
                .unwrap_or(config.branch.as_str())
                .to_string(),
            url: config.url.clone(),
            short_id: commit.short_id.clone(),
            full_id: commit.id.clone(),
            author_name: commit.author_name.clone(),
            author_email: commit.author_email.clone(),
            summary: commit.summary.clone(),
            link: render_link(&config.link_template, &commit.short_id, &commit.id),
        }
    }
}

/// Render `template` against `ctx`. Each newline-delimited segment of the
/// template becomes one output line with leading whitespace stripped.
/// Unrecognized escapes pass through literally; a malformed template can
/// look ugly but never aborts a notification cycle.
pub fn render(template: &str, ctx: &FormatContext) -> Vec<Line> {
    template
        .split('\n')
        .map(|segment| render_segment(segment.trim_start(), ctx))
        .collect()
}

/// The commit-link template is a restricted render pass: only the two
/// identifier substitutions (`%c`, `%C`) and `%%` are available. It runs
/// once per commit, before the main render, to produce `%l`.
pub fn render_link(template: &str, short_id: &str, full_id: &str) -> String {
    let mut out = String::new();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('c') => out.push_str(short_id),
            Some('C') => out.push_str(full_id),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

fn render_segment(segment: &str, ctx: &FormatContext) -> Line {
    let mut spans: Line = Vec::new();
    let mut text = String::new();
    let mut chars = segment.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            text.push(c);
            continue;
        }
        match chars.next() {
            None => text.push('%'),
            Some('%') => text.push('%'),
            Some('!') => {
                flush(&mut spans, &mut text);
                spans.push(Span::Bold);
            }
            Some('r') => {
                flush(&mut spans, &mut text);
                spans.push(Span::Reset);
            }
            Some('(') => {
                let mut body = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ')' {
                        closed = true;
                        break;
                    }
                    body.push(c);
                }
                match (closed, parse_color(&body)) {
                    (true, Some((fg, bg))) => {
                        flush(&mut spans, &mut text);
                        spans.push(Span::Color { fg, bg });
                    }
                    (true, None) => {
                        // Literal pass-through of the whole malformed escape.
                        text.push_str("%(");
                        text.push_str(&body);
                        text.push(')');
                    }
                    (false, _) => {
                        text.push_str("%(");
                        text.push_str(&body);
                    }
                }
            }
            Some(token) => match substitute(token, ctx) {
                Some(value) => text.push_str(value),
                None => {
                    text.push('%');
                    text.push(token);
                }
            },
        }
    }
    flush(&mut spans, &mut text);
    spans
}

fn substitute(token: char, ctx: &FormatContext) -> Option<&str> {
    let value = match token {
        'a' => &ctx.author_name,
        'b' => &ctx.branch,
        'c' => &ctx.short_id,
        'C' => &ctx.full_id,
        'e' => &ctx.author_email,
        'l' => &ctx.link,
        'm' => &ctx.summary,
        'n' => &ctx.display_name,
        's' => &ctx.short_name,
        'u' => &ctx.url,
        _ => return None,
    };
    Some(value)
}

fn parse_color(body: &str) -> Option<(u8, Option<u8>)> {
    match body.split_once(',') {
        Some((fg, bg)) => Some((fg.parse().ok()?, Some(bg.parse().ok()?))),
        None => Some((body.parse().ok()?, None)),
    }
}

fn flush(spans: &mut Line, text: &mut String) {
    if !text.is_empty() {
        spans.push(Span::Text(std::mem::take(text)));
    }
}

/// Collapse a line to its visible text, dropping markers. Handy for
/// callers that deliver to marker-unaware surfaces, and for tests.
pub fn plain_text(line: &Line) -> String {
    line.iter()
        .filter_map(|span| match span {
            Span::Text(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}
