//! Punctuation and whitespace rewriting that keeps the voice engine from
//! inserting long, unnatural pauses.
//!
//! Only plain text goes through here; SSML is opaque to the pipeline.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;
use tracing::debug;

/// Upper bound on rewrite passes; every rule shrinks or stabilises the text,
/// so a fixed point is reached in two or three passes in practice.
const MAX_PASSES: usize = 8;

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").unwrap());
static PERIOD_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\n").unwrap());
static SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());
static LONG_ELLIPSIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{3,}").unwrap());
static SPACED_PERIODS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(?:[ \t]+\.)+").unwrap());
static COMMA_PERIOD: Lazy<Regex> = Lazy::new(|| Regex::new(r",[ \t]+\.").unwrap());
static DASH_PAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+(?:—|--)[ \t]+").unwrap());
static BARE_CONJUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w)[ \t]+(but|and)\b").unwrap());
static TERMINAL_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[!?.]{2,}").unwrap());

/// Rewrite `text` so the engine reads it with fewer artificial pauses.
///
/// Rules run in a fixed order and the whole sequence is repeated until the
/// text stops changing, which makes the transform idempotent. Letters and
/// digits are never added or removed.
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut current = text.to_string();
    for pass in 0..MAX_PASSES {
        let next = apply_rules(&current);
        if next == current {
            debug!("Fluency normalization settled after {pass} passes");
            break;
        }
        current = next;
    }
    debug!(
        "Fluency normalization: {} -> {} characters",
        text.len(),
        current.len()
    );
    current
}

fn apply_rules(text: &str) -> String {
    let text = BLANK_LINES.replace_all(text, "\n");
    let text = replace(text, &PERIOD_NEWLINE, ". ");
    let text = replace(text, &SPACE_RUNS, " ");
    let text = replace(text, &LONG_ELLIPSIS, "...");
    let text = replace(text, &SPACED_PERIODS, ".");
    let text = replace(text, &COMMA_PERIOD, ".");
    let text = replace(text, &DASH_PAUSE, ", ");
    let text = replace(text, &BARE_CONJUNCTION, "$1, $2");
    let text = TERMINAL_RUNS.replace_all(&text, |caps: &Captures<'_>| collapse_terminal(&caps[0]));
    text.into_owned()
}

fn replace<'a>(text: Cow<'a, str>, pattern: &Regex, replacement: &str) -> Cow<'a, str> {
    let changed = match pattern.replace_all(&text, replacement) {
        Cow::Owned(changed) => Some(changed),
        Cow::Borrowed(_) => None,
    };
    changed.map_or(text, Cow::Owned)
}

/// A run of terminal punctuation keeps only its last mark, except that an
/// ellipsis stays an ellipsis.
fn collapse_terminal(run: &str) -> String {
    if run.bytes().all(|b| b == b'.') && run.len() >= 3 {
        return "...".to_string();
    }
    run.chars().last().map(String::from).unwrap_or_default()
}
