use std::sync::LazyLock;

use regex::Regex;
use similar::{ChangeTag, TextDiff};

static SAFE_MARKER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!-- (HBC Archive Indexerbot|Legobot) can blank this -->")
        .expect("safe marker regex")
});
static GENERATED_AT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"generated at (.*?) by").expect("generated at regex"));

/// Whether the page text carries a marker that allows the bot to overwrite it.
pub fn has_safe_marker(text: &str) -> bool {
    SAFE_MARKER_PATTERN.is_match(text)
}

/// Put the generation stamp of a saved index back into its unsubstituted form
/// so it compares equal to a freshly rendered document.
pub fn normalize_generated_at(text: &str) -> String {
    GENERATED_AT
        .replace_all(text, "generated at ~~~~~ by")
        .into_owned()
}

/// Whether `new_text` differs from `old_text` by more than the generation
/// stamp or whitespace-only lines.
pub fn needs_update(old_text: &str, new_text: &str) -> bool {
    let old_text = normalize_generated_at(old_text);
    let old_lines: Vec<&str> = old_text.lines().collect();
    let new_lines: Vec<&str> = new_text.lines().collect();
    let diff = TextDiff::from_slices(old_lines.as_slice(), new_lines.as_slice());
    diff.iter_all_changes().any(|change| {
        change.tag() != ChangeTag::Equal && !change.value().trim().is_empty()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RENDERED: &str = "<!-- HBC Archive Indexerbot can blank this -->Report generated based on a \
request from [[Talk:Foo]]. It matches the following masks: Talk:Foo/Archive <#>\n<br />\n\
It was generated at ~~~~~ by [[User:Legobot|Legobot]].\n{|\n|-\n| Topic || 3\n|}\n";

    #[test]
    fn recognizes_both_marker_spellings() {
        assert!(has_safe_marker("<!-- HBC Archive Indexerbot can blank this -->"));
        assert!(has_safe_marker("intro\n<!-- Legobot can blank this -->\n"));
        assert!(!has_safe_marker("<!-- SomeoneElse can blank this -->"));
        assert!(!has_safe_marker("Hand-written index"));
    }

    #[test]
    fn saved_copy_of_the_same_render_needs_no_update() {
        let saved = RENDERED.replace("~~~~~", "03:14, 15 June 2021 (UTC)");
        assert!(!needs_update(&saved, RENDERED));
        assert!(!needs_update(RENDERED, RENDERED));
    }

    #[test]
    fn whitespace_only_changes_are_ignored() {
        let saved = format!("{RENDERED}\n\n   \n");
        assert!(!needs_update(&saved, RENDERED));
        assert!(!needs_update(RENDERED.trim_end(), RENDERED));
    }

    #[test]
    fn content_changes_need_update() {
        let changed = RENDERED.replace("| Topic || 3", "| Topic || 4");
        assert!(needs_update(RENDERED, &changed));
        let added = RENDERED.replace("|}\n", "|-\n| New || 1\n|}\n");
        assert!(needs_update(RENDERED, &added));
        assert!(needs_update("", RENDERED));
    }

    #[test]
    fn normalizes_the_generation_stamp() {
        assert_eq!(
            normalize_generated_at("It was generated at 01:02, 3 May 2020 (UTC) by [[User:X|X]]."),
            "It was generated at ~~~~~ by [[User:X|X]]."
        );
    }
}
