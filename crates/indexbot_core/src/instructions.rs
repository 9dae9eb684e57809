use serde::Serialize;

use crate::config::IndexerSettings;
use crate::error::ConfigError;
use crate::markup::{clean, strip_disabled_parts};

/// Value users leave behind when copying the documentation example.
const TEMPLATE_PLACEHOLDER: &str = "template location";

/// Instruction set read from one talk page's opt-in template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instructions {
    pub talk_page: String,
    pub target: Option<String>,
    pub masks: Vec<String>,
    pub index_here: bool,
    pub template: String,
    pub leading_zeros: u32,
    pub first_archive: Option<String>,
}

impl Instructions {
    pub fn is_actionable(&self) -> bool {
        self.validate().is_ok()
    }

    /// The target page, provided both a target and at least one mask survived parsing.
    pub fn validate(&self) -> Result<&str, ConfigError> {
        let target = self.target.as_deref().ok_or(ConfigError::MissingTarget)?;
        if self.masks.is_empty() {
            return Err(ConfigError::MissingMask);
        }
        Ok(target)
    }
}

/// Parse the first opt-in template invocation on `talk_page`.
///
/// Only a page without the template at all is an error; missing `target` or
/// `mask` parameters produce a non-actionable instruction set instead.
pub fn parse_instructions(
    text: &str,
    talk_page: &str,
    settings: &IndexerSettings,
) -> Result<Instructions, ConfigError> {
    let invocation = format!("{{{{{}", settings.opt_in_template);
    let start = text
        .find(&invocation)
        .ok_or_else(|| ConfigError::MissingOptIn(settings.opt_in_template.clone()))?;
    let remainder = strip_disabled_parts(&text[start + invocation.len()..]);
    let blob = remainder.split("}}").next().unwrap_or_default();

    let mut target = None;
    let mut masks = Vec::new();
    let mut index_here = None;
    let mut template = None;
    let mut leading_zeros = None;
    let mut first_archive = None;

    for raw in blob.split('|') {
        let param = clean(raw);
        if let Some(value) = param.strip_prefix("target=") {
            target = Some(expand_relative(&clean(value), talk_page));
        } else if let Some(value) = mask_value(&param) {
            masks.push(expand_relative(&clean(value), talk_page));
        } else if let Some(value) = param.strip_prefix("indexhere=") {
            index_here = Some(clean(&value.to_lowercase()) == "yes");
        } else if let Some(value) = param.strip_prefix("template=") {
            template = Some(clean(&value.replace('\n', "")));
        } else if let Some(value) = param.strip_prefix("leading_zeros=") {
            if let Ok(parsed) = clean(value).parse::<u32>() {
                leading_zeros = Some(parsed);
            }
        } else if let Some(value) = param.strip_prefix("first_archive=") {
            first_archive = Some(expand_relative(&clean(value), talk_page));
        }
    }

    masks.retain(|mask| !mask.trim().is_empty());
    let template = present(template)
        .filter(|value| value != TEMPLATE_PLACEHOLDER)
        .unwrap_or_else(|| settings.default_template.clone());

    Ok(Instructions {
        talk_page: talk_page.to_string(),
        target: present(target),
        masks,
        index_here: index_here.unwrap_or(false),
        template,
        leading_zeros: leading_zeros.unwrap_or(0),
        first_archive: present(first_archive),
    })
}

/// `mask=` and the numbered `mask1=`, `mask2=`, ... spellings.
fn mask_value(param: &str) -> Option<&str> {
    let rest = param.strip_prefix("mask")?;
    rest.trim_start_matches(|ch: char| ch.is_ascii_digit())
        .strip_prefix('=')
}

/// `/Archive` and `./Archive` are subpages of the talk page.
fn expand_relative(value: &str, talk_page: &str) -> String {
    if let Some(rest) = value.strip_prefix("./") {
        format!("{talk_page}/{rest}")
    } else if value.starts_with('/') {
        format!("{talk_page}{value}")
    } else {
        value.to_string()
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TALK: &str = "User talk:Example";

    fn parse(text: &str) -> Instructions {
        parse_instructions(text, TALK, &IndexerSettings::default()).expect("parse")
    }

    #[test]
    fn parses_full_parameter_set() {
        let instructions = parse(
            "Hello\n{{User:HBC Archive Indexerbot/OptIn\n\
             |target=/Archive index\n\
             |mask=/Archive <#>\n\
             |mask=./Old archive\n\
             |leading_zeros=2\n\
             |indexhere=<yes>\n\
             |template=User:Example/index template\n\
             }}\n== Thread ==",
        );
        assert_eq!(
            instructions.target.as_deref(),
            Some("User talk:Example/Archive index")
        );
        assert_eq!(
            instructions.masks,
            vec![
                "User talk:Example/Archive <#>".to_string(),
                "User talk:Example/Old archive".to_string(),
            ]
        );
        assert_eq!(instructions.leading_zeros, 2);
        assert!(instructions.index_here);
        assert_eq!(instructions.template, "User:Example/index template");
        assert!(instructions.first_archive.is_none());
        assert!(instructions.is_actionable());
    }

    #[test]
    fn applies_defaults() {
        let instructions = parse(
            "{{User:HBC Archive Indexerbot/OptIn|target=Talk:Foo/Index|mask=Talk:Foo/Archive <#>\
             |template=template location|leading_zeros=lots|indexhere=no}}",
        );
        assert_eq!(instructions.leading_zeros, 0);
        assert!(!instructions.index_here);
        assert_eq!(
            instructions.template,
            "User:HBC Archive Indexerbot/default template"
        );
    }

    #[test]
    fn blank_values_are_dropped() {
        let instructions = parse(
            "{{User:HBC Archive Indexerbot/OptIn|target=  |mask=|template=\n|first_archive= }}",
        );
        assert!(instructions.target.is_none());
        assert!(instructions.masks.is_empty());
        assert!(instructions.first_archive.is_none());
        assert_eq!(
            instructions.template,
            "User:HBC Archive Indexerbot/default template"
        );
        assert_eq!(instructions.validate(), Err(ConfigError::MissingTarget));
    }

    #[test]
    fn missing_mask_is_not_actionable() {
        let instructions = parse("{{User:HBC Archive Indexerbot/OptIn|target=/Index}}");
        assert!(!instructions.is_actionable());
        assert_eq!(instructions.validate(), Err(ConfigError::MissingMask));
    }

    #[test]
    fn numbered_masks_and_comments() {
        let instructions = parse(
            "{{User:HBC Archive Indexerbot/OptIn\n|target=[[User talk:Example/Index]]\n\
             |mask1=/Archive <#>\n<!-- |mask=/Disabled -->\n|mask2=/Archive <month> <year>\n\
             |first_archive=/Archive January 2020}}",
        );
        assert_eq!(
            instructions.target.as_deref(),
            Some("User talk:Example/Index")
        );
        assert_eq!(
            instructions.masks,
            vec![
                "User talk:Example/Archive <#>".to_string(),
                "User talk:Example/Archive <month> <year>".to_string(),
            ]
        );
        assert_eq!(
            instructions.first_archive.as_deref(),
            Some("User talk:Example/Archive January 2020")
        );
    }

    #[test]
    fn page_without_template_is_a_config_error() {
        let error = parse_instructions("no config here", TALK, &IndexerSettings::default())
            .expect_err("must fail");
        assert!(matches!(error, ConfigError::MissingOptIn(_)));
    }

    #[test]
    fn relative_prefixes() {
        assert_eq!(expand_relative("/Index", "Title"), "Title/Index");
        assert_eq!(expand_relative("./Index", "Title"), "Title/Index");
        assert_eq!(expand_relative("Foo index", "Title"), "Foo index");
    }
}
