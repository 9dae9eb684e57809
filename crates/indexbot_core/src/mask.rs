//! Archive-name masks: `<#>` numbered, `<month>`/`<year>` dated, or literal titles.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::Month;
use regex::Regex;

use crate::client::WikiReadApi;
use crate::error::{ConfigError, PipelineError};
use crate::instructions::Instructions;
use crate::timestamp::month_alternation;

pub const NUMBER_TOKEN: &str = "<#>";
pub const MONTH_TOKEN: &str = "<month>";
pub const YEAR_TOKEN: &str = "<year>";

static DATE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<month>|<year>").expect("date token regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mask {
    Numbered {
        pattern: String,
        leading_zeros: u32,
    },
    Monthly {
        pattern: String,
        month: Month,
        year: i32,
    },
    Yearly {
        pattern: String,
        year: i32,
    },
    Literal(String),
    /// Stray angle brackets or a `<month>` with no `<year>`; expands to nothing.
    Malformed(String),
}

impl Mask {
    /// Classify `pattern`, pulling the start of dated sequences out of `first_archive`.
    pub fn parse(
        pattern: &str,
        leading_zeros: u32,
        first_archive: Option<&str>,
    ) -> Result<Self, ConfigError> {
        if pattern.contains(NUMBER_TOKEN) {
            return Ok(Self::Numbered {
                pattern: pattern.to_string(),
                leading_zeros,
            });
        }
        if pattern.contains(MONTH_TOKEN) {
            if !pattern.contains(YEAR_TOKEN) {
                return Ok(Self::Malformed(pattern.to_string()));
            }
            let (month, year) = dated_start(pattern, first_archive)?;
            let month = month.ok_or_else(|| mismatch(pattern, first_archive))?;
            return Ok(Self::Monthly {
                pattern: pattern.to_string(),
                month,
                year,
            });
        }
        if pattern.contains(YEAR_TOKEN) {
            let (_, year) = dated_start(pattern, first_archive)?;
            return Ok(Self::Yearly {
                pattern: pattern.to_string(),
                year,
            });
        }
        if pattern.contains('<') || pattern.contains('>') {
            return Ok(Self::Malformed(pattern.to_string()));
        }
        Ok(Self::Literal(pattern.to_string()))
    }

    /// Existing archive titles for this mask, in sequence order.
    ///
    /// Sequences stop at the first title that does not exist.
    pub fn expand<A: WikiReadApi + ?Sized>(&self, api: &mut A) -> anyhow::Result<Vec<String>> {
        let mut titles = Vec::new();
        match self {
            Self::Numbered {
                pattern,
                leading_zeros,
            } => {
                for number in 1.. {
                    let number = prefix_number(number, *leading_zeros);
                    let title = pattern.replace(NUMBER_TOKEN, &number);
                    if !api.page_exists(&title)? {
                        break;
                    }
                    titles.push(title);
                }
            }
            Self::Monthly {
                pattern,
                month,
                year,
            } => {
                let (mut month, mut year) = (*month, *year);
                loop {
                    let title = pattern
                        .replace(MONTH_TOKEN, month.name())
                        .replace(YEAR_TOKEN, &year.to_string());
                    if !api.page_exists(&title)? {
                        break;
                    }
                    titles.push(title);
                    (month, year) = next_month(month, year);
                }
            }
            Self::Yearly { pattern, year } => {
                for year in *year.. {
                    let title = pattern.replace(YEAR_TOKEN, &year.to_string());
                    if !api.page_exists(&title)? {
                        break;
                    }
                    titles.push(title);
                }
            }
            Self::Literal(title) => {
                if api.page_exists(title)? {
                    titles.push(title.clone());
                }
            }
            Self::Malformed(pattern) => {
                tracing::warn!(mask = %pattern, "skipping malformed mask");
            }
        }
        Ok(titles)
    }
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numbered { pattern, .. }
            | Self::Monthly { pattern, .. }
            | Self::Yearly { pattern, .. }
            | Self::Literal(pattern)
            | Self::Malformed(pattern) => f.write_str(pattern),
        }
    }
}

/// Every archive page the instruction set covers, followed by the talk page
/// itself when `indexhere` is set.
pub fn expand_masks<A: WikiReadApi + ?Sized>(
    api: &mut A,
    instructions: &Instructions,
) -> Result<Vec<String>, PipelineError> {
    let mut pages = Vec::new();
    for raw in &instructions.masks {
        let mask = Mask::parse(
            raw,
            instructions.leading_zeros,
            instructions.first_archive.as_deref(),
        )?;
        let titles = mask.expand(api)?;
        tracing::debug!(mask = %mask, count = titles.len(), "expanded mask");
        pages.extend(titles);
    }
    if instructions.index_here {
        pages.push(instructions.talk_page.clone());
    }
    Ok(pages)
}

/// `number` padded with `leading_zeros` extra digits of zero.
pub fn prefix_number(number: u32, leading_zeros: u32) -> String {
    let width = leading_zeros as usize + 1;
    format!("{number:0>width$}")
}

pub fn next_month(month: Month, year: i32) -> (Month, i32) {
    match month {
        Month::December => (Month::January, year + 1),
        other => (other.succ(), year),
    }
}

fn dated_start(
    pattern: &str,
    first_archive: Option<&str>,
) -> Result<(Option<Month>, i32), ConfigError> {
    let first_archive =
        first_archive.ok_or_else(|| ConfigError::MissingFirstArchive(pattern.to_string()))?;
    let matcher = start_matcher(pattern).map_err(|_| mismatch(pattern, Some(first_archive)))?;
    let captures = matcher
        .captures(first_archive)
        .ok_or_else(|| mismatch(pattern, Some(first_archive)))?;
    let year = captures
        .name("year")
        .and_then(|found| found.as_str().parse::<i32>().ok())
        .ok_or_else(|| mismatch(pattern, Some(first_archive)))?;
    let month = captures
        .name("month")
        .and_then(|found| Month::from_str(found.as_str()).ok());
    Ok((month, year))
}

/// Regex with the literal parts of `pattern` escaped and the first `<month>`
/// and `<year>` captured by name.
fn start_matcher(pattern: &str) -> Result<Regex, regex::Error> {
    let months = month_alternation();
    let mut expression = String::new();
    let mut last = 0;
    let (mut month_seen, mut year_seen) = (false, false);
    for token in DATE_TOKEN.find_iter(pattern) {
        expression.push_str(&regex::escape(&pattern[last..token.start()]));
        let fragment = if token.as_str() == MONTH_TOKEN {
            let named = !month_seen;
            month_seen = true;
            if named {
                format!("(?P<month>{months})")
            } else {
                format!("(?:{months})")
            }
        } else {
            let named = !year_seen;
            year_seen = true;
            if named {
                r"(?P<year>\d{4})".to_string()
            } else {
                r"\d{4}".to_string()
            }
        };
        expression.push_str(&fragment);
        last = token.end();
    }
    expression.push_str(&regex::escape(&pattern[last..]));
    Regex::new(&expression)
}

fn mismatch(pattern: &str, first_archive: Option<&str>) -> ConfigError {
    ConfigError::FirstArchiveMismatch {
        mask: pattern.to_string(),
        first_archive: first_archive.unwrap_or_default().to_string(),
    }
}
