//! The small subset of wikitext cleanup the indexer needs: parameter values and
//! section titles. This is not a wikitext parser.

use std::sync::LazyLock;

use regex::Regex;

static PLACEHOLDER_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(.*?)=<(#|yes|no|month|year|.*?)>").expect("placeholder value regex")
});
static WIKILINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[(.*?)\]\]").expect("wikilink regex"));
static PIPED_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[:?(.*?)\|(.*?)\]\]").expect("piped link regex"));
static PLAIN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[:?(.*?)\]\]").expect("plain link regex"));
static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"('''|'')(.*?)('''|'')").expect("emphasis regex"));
static DISABLED_PARTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)<!--.*?-->|<nowiki>.*?</nowiki>|<pre>.*?</pre>|<includeonly>.*?</includeonly>",
    )
    .expect("disabled parts regex")
});

/// Placeholders that are part of mask grammar and must survive cleaning.
const MASK_PLACEHOLDERS: [&str; 3] = ["#", "month", "year"];

/// Normalize one template parameter.
///
/// `name=<value>` collapses to `name=value` unless the value is a mask
/// placeholder. Only the first wikilink is unwrapped (every copy of that exact
/// link is replaced, other links are left alone).
pub fn clean(text: &str) -> String {
    let mut text = text.trim().to_string();
    if let Some(captures) = PLACEHOLDER_VALUE.captures(&text) {
        let token = &captures[2];
        if !MASK_PLACEHOLDERS.contains(&token) {
            text = format!("{}={}", &captures[1], token);
        }
    }
    let first_link = WIKILINK
        .captures(&text)
        .map(|captures| (captures[0].to_string(), captures[1].to_string()));
    if let Some((whole, inner)) = first_link {
        text = text.replace(&whole, &inner);
    }
    text
}

/// Turn a section title into a percent-encoded link fragment.
pub fn clean_links(title: &str) -> String {
    let mut text = title.to_string();
    text = replace_until_stable(&text, &PIPED_LINK, 2);
    text = replace_until_stable(&text, &PLAIN_LINK, 1);
    text = replace_until_stable(&text, &EMPHASIS, 2);
    text = text.replace("<nowiki>", "").replace("</nowiki>", "");
    urlencoding::encode(&text).replace("%2F", "/")
}

/// Remove comments and `<nowiki>`, `<pre>`, `<includeonly>` regions.
pub fn strip_disabled_parts(text: &str) -> String {
    DISABLED_PARTS.replace_all(text, "").into_owned()
}

fn replace_until_stable(text: &str, pattern: &Regex, group: usize) -> String {
    let mut text = text.to_string();
    loop {
        let found = pattern
            .captures(&text)
            .map(|captures| (captures[0].to_string(), captures[group].to_string()));
        match found {
            Some((whole, replacement)) if whole != replacement => {
                text = text.replace(&whole, &replacement);
            }
            _ => return text,
        }
    }
}
