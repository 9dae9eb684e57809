//! Index templates and rendering of the index document.
//!
//! A template page holds its sections inside `<nowiki>` (or `<pre>`), each
//! introduced by a marker comment such as `<!-- ROW -->`. Row sections use
//! `%%name%%` placeholders that are filled from one [`ThreadRecord`].

use std::sync::LazyLock;

use regex::Regex;

use crate::thread::ThreadRecord;

/// Marks a page the bot may overwrite. Always the first line of a rendered index.
pub const SAFE_MARKER: &str = "<!-- HBC Archive Indexerbot can blank this -->";

static SECTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*(LEAD|HEADER|ALT ROW|ROW|FOOTER|END|TAIL)\s*-->\r?\n?")
        .expect("section marker regex")
});

const BUILTIN_HEADER: &str = "{| class=\"wikitable sortable\"\n\
! Topic !! Replies !! First comment !! Last comment !! Duration\n";
const BUILTIN_ROW: &str = "|-\n\
| %%topic%% <small>(%%link%%)</small> || %%replies%% || \
{{sort|%%firstepoch%%|%%first%%}} || {{sort|%%lastepoch%%|%%last%%}} || \
{{sort|%%durationsecs%%|%%duration%%}}\n";
const BUILTIN_FOOTER: &str = "|}\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub lead: String,
    pub header: String,
    pub row: String,
    pub alt_row: Option<String>,
    pub footer: String,
    pub end: String,
}

impl Template {
    /// Parse template page text. `None` when the page defines no ROW section.
    pub fn parse(text: &str) -> Option<Self> {
        let body = delimited(text, "<nowiki>", "</nowiki>")
            .or_else(|| delimited(text, "<pre>", "</pre>"))
            .unwrap_or(text);

        let markers: Vec<_> = SECTION_MARKER.captures_iter(body).collect();
        let mut template = Self {
            lead: String::new(),
            header: String::new(),
            row: String::new(),
            alt_row: None,
            footer: String::new(),
            end: String::new(),
        };
        let mut has_row = false;
        for (index, captures) in markers.iter().enumerate() {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let stop = markers
                .get(index + 1)
                .and_then(|next| next.get(0))
                .map_or(body.len(), |next| next.start());
            let fragment = body[whole.end()..stop].to_string();
            match name.as_str() {
                "LEAD" => template.lead = fragment,
                "HEADER" => template.header = fragment,
                "ROW" => {
                    template.row = fragment;
                    has_row = true;
                }
                "ALT ROW" => template.alt_row = Some(fragment),
                "FOOTER" => template.footer = fragment,
                _ => template.end = fragment,
            }
        }
        has_row.then_some(template)
    }

    /// Plain sortable table, used when no template page on the wiki parses.
    pub fn builtin() -> Self {
        Self {
            lead: String::new(),
            header: BUILTIN_HEADER.to_string(),
            row: BUILTIN_ROW.to_string(),
            alt_row: None,
            footer: BUILTIN_FOOTER.to_string(),
            end: String::new(),
        }
    }

    /// The complete index document, starting with [`SAFE_MARKER`].
    pub fn render(&self, records: &[ThreadRecord], provenance: &Provenance<'_>) -> String {
        let mut text = String::from(SAFE_MARKER);
        text.push_str(&self.lead);
        text.push_str(&provenance.note());
        text.push_str(&self.header);
        for (index, record) in records.iter().enumerate() {
            let row = match (&self.alt_row, index % 2) {
                (Some(alt_row), 1) => alt_row,
                _ => &self.row,
            };
            text.push_str(&fill_row(row, record));
        }
        text.push_str(&self.footer);
        text.push_str(&self.end);
        text
    }
}

/// Who asked for an index and which masks it covers.
#[derive(Debug, Clone, Copy)]
pub struct Provenance<'a> {
    pub talk_page: &'a str,
    pub masks: &'a [String],
    pub bot_user: &'a str,
}

impl Provenance<'_> {
    pub fn note(&self) -> String {
        let masks: Vec<&str> = self.masks.iter().map(|mask| mask.trim()).collect();
        format!(
            "Report generated based on a request from [[{talk}]]. It matches the following masks: {masks}\n\
             <br />\nIt was generated at ~~~~~ by [[User:{bot}|{bot}]].\n",
            talk = self.talk_page,
            masks = masks.join(" ,"),
            bot = self.bot_user,
        )
    }
}

/// Substitute every `%%name%%` placeholder in `row` from `record`.
pub fn fill_row(row: &str, record: &ThreadRecord) -> String {
    let values = [
        ("%%topic%%", record.topic.trim().to_string()),
        ("%%replies%%", record.replies.to_string()),
        ("%%link%%", record.link.clone()),
        ("%%first%%", record.first_text()),
        ("%%firstepoch%%", record.first_epoch_text()),
        ("%%last%%", record.last_text()),
        ("%%lastepoch%%", record.last_epoch_text()),
        ("%%duration%%", record.duration_text()),
        ("%%durationsecs%%", record.duration_secs_text()),
    ];
    values
        .iter()
        .fold(row.to_string(), |text, (placeholder, value)| {
            text.replace(placeholder, value)
        })
}

fn delimited<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let end = text[start..].find(close)? + start;
    Some(&text[start..end])
}
