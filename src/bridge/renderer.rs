//! DGG -> Discord text rendering.
//!
//! Converts a raw DGG chat line into Discord markdown:
//! - bare links get an `https://` scheme so Discord embeds them
//! - DGG emote tokens are swapped for Discord emotes
//! - markdown control characters are escaped outside of links
//! - nsfw/nsfl lines are wrapped in a spoiler

use fancy_regex::Regex;
use indexmap::IndexMap;
use tracing::warn;

/// Insertion-ordered DGG emote token -> Discord emote token.
pub type EmoteMap = IndexMap<String, String>;

/// Markers that flag a message as sensitive.
const SENSITIVE_MARKERS: [&str; 2] = ["nsfw", "nsfl"];

/// Returns true if the text carries an nsfw/nsfl marker.
pub fn is_sensitive(text: &str) -> bool {
    let lower = text.to_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Word characters for whole-token matching.
pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A piece of a message between rendering passes.
#[derive(Debug)]
enum Span {
    /// Plain chat text, still subject to emote substitution and escaping.
    Text(String),
    /// Output that must be emitted as-is (links, substituted emotes).
    Verbatim(String),
}

/// A rendered chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    pub text: String,
    /// The line carries an nsfw/nsfl marker and is wrapped in a spoiler.
    pub sensitive: bool,
}

/// Renders DGG chat lines for Discord.
pub struct TextRenderer {
    url_pattern: Regex,
    markup_pattern: Regex,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self {
            url_pattern: Regex::new(r"(?:(?:https?|ftp)://)?[\w/\-?=%.]+\.[\w/\-&?=%.]+").unwrap(),
            markup_pattern: Regex::new(r"(?<!\\)([*_`|@])").unwrap(),
        }
    }

    /// Render a chat message as `**sender:** text`.
    pub fn render(&self, sender: &str, text: &str, emotes: &EmoteMap) -> String {
        self.render_line(sender, text, emotes).text
    }

    /// Render a chat message, also reporting whether it was spoilered.
    pub fn render_line(&self, sender: &str, text: &str, emotes: &EmoteMap) -> RenderedLine {
        let spans = self.split_links(text);

        let mut rendered = String::with_capacity(text.len() + 16);
        for span in substitute_emotes(spans, emotes) {
            match span {
                Span::Text(s) => rendered.push_str(&self.escape_markup(&s)),
                Span::Verbatim(s) => rendered.push_str(&s),
            }
        }

        let sensitive = is_sensitive(&rendered);
        if sensitive {
            rendered = format!("||{}||", rendered);
        }

        RenderedLine {
            text: format!("**{}:** {}", self.escape_markup(sender), rendered),
            sensitive,
        }
    }

    /// Backslash-escape Discord markdown characters that are not already escaped.
    pub fn escape_markup(&self, text: &str) -> String {
        self.markup_pattern.replace_all(text, "\\$1").to_string()
    }

    /// Split text into plain spans and normalized link spans.
    fn split_links(&self, text: &str) -> Vec<Span> {
        let mut spans = Vec::new();
        let mut last = 0;

        for m in self.url_pattern.find_iter(text) {
            let m = match m {
                Ok(m) => m,
                Err(e) => {
                    warn!("Link pattern failed on message: {}", e);
                    break;
                }
            };

            let token = m.as_str().trim_end_matches('.');
            if !is_link(token) {
                continue;
            }

            let end = m.start() + token.len();
            if m.start() > last {
                spans.push(Span::Text(text[last..m.start()].to_string()));
            }
            spans.push(Span::Verbatim(normalize_link(token)));
            last = end;
        }

        if last < text.len() {
            spans.push(Span::Text(text[last..].to_string()));
        }
        spans
    }
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace emote tokens in plain spans, one pass per map entry in insertion order.
fn substitute_emotes(mut spans: Vec<Span>, emotes: &EmoteMap) -> Vec<Span> {
    for (token, replacement) in emotes {
        if token.is_empty() {
            continue;
        }

        let mut next = Vec::with_capacity(spans.len());
        for span in spans {
            match span {
                Span::Text(s) => split_on_token(&s, token, replacement, &mut next),
                verbatim => next.push(verbatim),
            }
        }
        spans = next;
    }
    spans
}

/// Push the pieces of `text` around every whole-token occurrence of `token`.
fn split_on_token(text: &str, token: &str, replacement: &str, out: &mut Vec<Span>) {
    let mut last = 0;

    for (start, _) in text.match_indices(token) {
        if start < last {
            continue;
        }
        let end = start + token.len();
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        if before.is_some_and(is_word_char) || after.is_some_and(is_word_char) {
            continue;
        }

        if start > last {
            out.push(Span::Text(text[last..start].to_string()));
        }
        out.push(Span::Verbatim(replacement.to_string()));
        last = end;
    }

    if last < text.len() {
        out.push(Span::Text(text[last..].to_string()));
    }
}

/// Returns true if the token's host is a registrable domain under a known suffix.
fn is_link(token: &str) -> bool {
    let rest = token.split_once("://").map_or(token, |(_, rest)| rest);
    let host = rest
        .split(|c| c == '/' || c == '?' || c == '#' || c == ':')
        .next()
        .unwrap_or_default()
        .to_lowercase();

    psl::domain(host.as_bytes()).is_some_and(|domain| domain.suffix().is_known())
}

fn normalize_link(token: &str) -> String {
    if token.contains("://") {
        token.to_string()
    } else {
        format!("https://{}", token)
    }
}
