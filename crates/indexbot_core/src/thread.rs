use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::markup::clean_links;
use crate::timestamp::{format_elapsed, format_signature_timestamp, scan_signature_timestamps};

/// Rendered in place of any value that needs a timestamp the thread lacks.
pub const UNKNOWN: &str = "Unknown";

static LEVEL_TWO_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^== *([^=].*?) *== *$").expect("level two header regex"));
static LEVEL_THREE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^=== *([^=].*?) *=== *$").expect("level three header regex"));

/// A section as it appears in the archive: heading text plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawThread {
    pub topic: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadSpan {
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
}

impl ThreadSpan {
    pub fn duration_secs(&self) -> i64 {
        (self.last - self.first).num_seconds()
    }
}

/// One indexed discussion. `span` is absent when the body carries no
/// parseable signature timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRecord {
    pub topic: String,
    pub link: String,
    pub replies: usize,
    pub span: Option<ThreadSpan>,
}

impl ThreadRecord {
    pub fn from_raw(page_title: &str, raw: &RawThread) -> Self {
        let stamps = scan_signature_timestamps(&raw.body);
        let span = stamps
            .iter()
            .min()
            .zip(stamps.iter().max())
            .map(|(first, last)| ThreadSpan {
                first: *first,
                last: *last,
            });
        let topic = raw.topic.trim().to_string();
        Self {
            link: format!("[[{page_title}#{}]]", clean_links(&topic)),
            topic,
            replies: raw.body.matches("(UTC)").count(),
            span,
        }
    }

    pub fn first_text(&self) -> String {
        self.span_text(|span| format_signature_timestamp(&span.first))
    }

    pub fn first_epoch_text(&self) -> String {
        self.span_text(|span| span.first.timestamp().to_string())
    }

    pub fn last_text(&self) -> String {
        self.span_text(|span| format_signature_timestamp(&span.last))
    }

    pub fn last_epoch_text(&self) -> String {
        self.span_text(|span| span.last.timestamp().to_string())
    }

    pub fn duration_text(&self) -> String {
        self.span_text(|span| format_elapsed(span.duration_secs()))
    }

    pub fn duration_secs_text(&self) -> String {
        self.span_text(|span| span.duration_secs().to_string())
    }

    fn span_text(&self, render: impl FnOnce(&ThreadSpan) -> String) -> String {
        self.span
            .as_ref()
            .map(render)
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}

/// Split a page into sections at level-2 headings, or at level-3 headings
/// when the page has no level-2 heading at all. Text above the first heading
/// is not part of any thread.
pub fn split_into_threads(text: &str) -> Vec<RawThread> {
    let threads = split_at(text, &LEVEL_TWO_HEADER);
    if threads.is_empty() {
        split_at(text, &LEVEL_THREE_HEADER)
    } else {
        threads
    }
}

/// Thread records for every section of `text`, linked against `page_title`.
pub fn extract_threads(page_title: &str, text: &str) -> Vec<ThreadRecord> {
    split_into_threads(text)
        .iter()
        .map(|raw| ThreadRecord::from_raw(page_title, raw))
        .collect()
}

fn split_at(text: &str, header: &Regex) -> Vec<RawThread> {
    let mut threads = Vec::new();
    let mut current: Option<RawThread> = None;
    for line in text.split('\n') {
        let line = line.trim_end_matches('\r');
        if let Some(captures) = header.captures(line) {
            threads.extend(current.take());
            current = Some(RawThread {
                topic: captures[1].to_string(),
                body: String::new(),
            });
        } else if let Some(thread) = current.as_mut() {
            thread.body.push_str(line);
            thread.body.push('\n');
        }
    }
    threads.extend(current);
    threads
}
