use std::fmt;

use anyhow::Result;
use chrono::{TimeDelta, Utc};
use serde::Serialize;

use crate::client::{WikiReadApi, WikiWriteApi, resolve_redirect_chain};
use crate::config::IndexerSettings;
use crate::error::{ConfigError, PipelineError};
use crate::instructions::Instructions;
use crate::mask::expand_masks;
use crate::template::{Provenance, Template};
use crate::thread::{ThreadRecord, extract_threads};
use crate::update::{has_safe_marker, needs_update};

/// Outcome of processing one talk page, as written to the run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReportLine {
    Indexed { talk_page: String, target: String },
    WouldIndex { talk_page: String, target: String },
    NoUpdateNeeded { talk_page: String },
    ConfigurationError { talk_page: String, reason: String },
    SafetyRefusal { talk_page: String, target: String },
    Failed { talk_page: String, reason: String },
}

impl ReportLine {
    pub fn configuration_error(talk_page: &str, error: &ConfigError) -> Self {
        Self::ConfigurationError {
            talk_page: talk_page.to_string(),
            reason: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Indexed { .. } | Self::WouldIndex { .. } | Self::NoUpdateNeeded { .. }
        )
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Indexed { talk_page, target } => {
                write!(f, "* Successfully indexed [[{talk_page}]] to [[{target}]].")
            }
            Self::WouldIndex { talk_page, target } => {
                write!(f, "* Would index [[{talk_page}]] to [[{target}]] (dry run).")
            }
            Self::NoUpdateNeeded { talk_page } => {
                write!(f, "* [[{talk_page}]] did not require a new update.")
            }
            Self::ConfigurationError { talk_page, reason } => write!(
                f,
                "* [[:{talk_page}]] has an incorrectly configured template ({reason})."
            ),
            Self::SafetyRefusal { target, .. } => {
                write!(f, "* [[:{target}]] does not have the safe string.")
            }
            Self::Failed { talk_page, reason } => {
                write!(f, "* Failed to index [[:{talk_page}]]: {reason}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    pub dry_run: bool,
}

/// Build and, when it changed, save the index for one instruction set.
///
/// Configuration problems come back as a [`ReportLine`]; only wiki failures
/// are returned as errors.
pub fn process_instructions<A: WikiWriteApi + ?Sized>(
    api: &mut A,
    settings: &IndexerSettings,
    instructions: &Instructions,
    options: &ProcessOptions,
) -> Result<ReportLine> {
    let talk_page = instructions.talk_page.as_str();
    match build_and_save(api, settings, instructions, options) {
        Ok(line) => Ok(line),
        Err(PipelineError::Config(error)) => {
            tracing::warn!(page = talk_page, %error, "configuration error");
            Ok(ReportLine::configuration_error(talk_page, &error))
        }
        Err(PipelineError::Wiki(error)) => Err(error.context(format!("indexing [[{talk_page}]]"))),
    }
}

fn build_and_save<A: WikiWriteApi + ?Sized>(
    api: &mut A,
    settings: &IndexerSettings,
    instructions: &Instructions,
    options: &ProcessOptions,
) -> Result<ReportLine, PipelineError> {
    let talk_page = instructions.talk_page.clone();
    let requested_target = instructions.validate()?;
    let target = resolve_redirect_chain(api, requested_target)?;
    let old_text = api
        .get_page_text(&target)?
        .ok_or_else(|| ConfigError::TargetMissing(target.clone()))?;

    if !has_safe_marker(&old_text) {
        tracing::warn!(page = %talk_page, index = %target, "target lacks the safe marker");
        return Ok(ReportLine::SafetyRefusal { talk_page, target });
    }
    warn_if_recently_edited(api, settings, &target)?;

    let pages = expand_masks(api, instructions)?;
    let template = resolve_template(api, settings, &instructions.template)?;
    let records = collect_threads(api, &pages)?;
    let provenance = Provenance {
        talk_page: &talk_page,
        masks: &instructions.masks,
        bot_user: &settings.bot_user,
    };
    let new_text = template.render(&records, &provenance);

    if !needs_update(&old_text, &new_text) {
        tracing::info!(page = %talk_page, index = %target, "index is current");
        return Ok(ReportLine::NoUpdateNeeded { talk_page });
    }
    if options.dry_run {
        tracing::info!(page = %talk_page, index = %target, threads = records.len(), "dry run");
        return Ok(ReportLine::WouldIndex { talk_page, target });
    }
    api.edit_page(&target, &new_text, &settings.edit_summary)?;
    tracing::info!(page = %talk_page, index = %target, threads = records.len(), "index saved");
    Ok(ReportLine::Indexed { talk_page, target })
}

/// Someone may still be working on the index by hand. Only a warning; the
/// update goes ahead.
fn warn_if_recently_edited<A: WikiReadApi + ?Sized>(
    api: &mut A,
    settings: &IndexerSettings,
    target: &str,
) -> Result<()> {
    if let Some(edited) = api.last_edit_time(target)? {
        let window = TimeDelta::try_hours(settings.recent_edit_hours).unwrap_or(TimeDelta::MAX);
        if Utc::now() - edited < window {
            tracing::warn!(
                index = target,
                edited = %edited,
                hours = settings.recent_edit_hours,
                "target was edited recently"
            );
        }
    }
    Ok(())
}

/// Requested template, then the configured default page, then the builtin table.
pub fn resolve_template<A: WikiReadApi + ?Sized>(
    api: &mut A,
    settings: &IndexerSettings,
    requested: &str,
) -> Result<Template> {
    if requested != settings.default_template {
        match api.get_page_text(requested)? {
            Some(text) => match Template::parse(&text) {
                Some(template) => return Ok(template),
                None => tracing::warn!(template = requested, "template has no ROW section"),
            },
            None => tracing::warn!(template = requested, "template page does not exist"),
        }
    }
    let default = api
        .get_page_text(&settings.default_template)?
        .and_then(|text| Template::parse(&text));
    Ok(default.unwrap_or_else(|| {
        tracing::warn!(
            template = %settings.default_template,
            "default template unusable, using builtin table"
        );
        Template::builtin()
    }))
}

/// Thread records from every archive, in archive order then page order.
/// Archives that vanished since mask expansion are skipped.
pub fn collect_threads<A: WikiReadApi + ?Sized>(
    api: &mut A,
    pages: &[String],
) -> Result<Vec<ThreadRecord>> {
    let mut records = Vec::new();
    for page in pages {
        let resolved = resolve_redirect_chain(api, page)?;
        let Some(text) = api.get_page_text(&resolved)? else {
            tracing::warn!(page = %page, "archive disappeared, skipping");
            continue;
        };
        let threads = extract_threads(page, &text);
        tracing::debug!(page = %page, threads = threads.len(), "parsed archive");
        records.extend(threads);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::mock::MockWiki;
    use crate::template::SAFE_MARKER;

    const TEMPLATE: &str = "<nowiki><!-- HEADER -->\n{|\n<!-- ROW -->\n|-\n\
                            | %%topic%% || %%replies%%\n<!-- FOOTER -->\n|}\n</nowiki>";

    fn settings() -> IndexerSettings {
        IndexerSettings::default()
    }

    fn instructions() -> Instructions {
        Instructions {
            talk_page: "Talk:Foo".to_string(),
            target: Some("Talk:Foo/Index".to_string()),
            masks: vec!["Talk:Foo/Archive <#>".to_string()],
            index_here: false,
            template: "Talk:Foo/Template".to_string(),
            leading_zeros: 0,
            first_archive: None,
        }
    }

    fn process_default(api: &mut MockWiki, set: &Instructions) -> Result<ReportLine> {
        process_instructions(api, &settings(), set, &ProcessOptions::default())
    }

    fn wiki() -> MockWiki {
        let mut api = MockWiki::default();
        api.add_page("Talk:Foo/Index", SAFE_MARKER);
        api.add_page("Talk:Foo/Template", TEMPLATE);
        api.add_page(
            "Talk:Foo/Archive 1",
            "== Alpha ==\nhi 10:00, 1 May 2020 (UTC)\nbye 11:00, 1 May 2020 (UTC)\n",
        );
        api.add_page("Talk:Foo/Archive 2", "== Beta ==\nquiet\n");
        api
    }

    #[test]
    fn indexes_archives_into_target() {
        let mut api = wiki();
        let line = process_default(&mut api, &instructions()).expect("process");
        assert_eq!(
            line,
            ReportLine::Indexed {
                talk_page: "Talk:Foo".to_string(),
                target: "Talk:Foo/Index".to_string(),
            }
        );
        assert_eq!(api.edits.len(), 1);
        let edit = &api.edits[0];
        assert_eq!(edit.title, "Talk:Foo/Index");
        assert_eq!(edit.summary, "BOT: Updating index");
        assert!(edit.content.starts_with(SAFE_MARKER));
        assert!(edit.content.contains("| Alpha || 2\n|-\n| Beta || 0\n|}\n"));
        assert!(edit.content.contains("masks: Talk:Foo/Archive <#>\n"));
    }

    #[test]
    fn second_run_is_idempotent() {
        let mut api = wiki();
        let options = ProcessOptions::default();
        process_instructions(&mut api, &settings(), &instructions(), &options).expect("first");
        let saved = api.pages["Talk:Foo/Index"].replace("~~~~~", "12:00, 2 May 2020 (UTC)");
        api.add_page("Talk:Foo/Index", &saved);

        let line = process_instructions(&mut api, &settings(), &instructions(), &options)
            .expect("second");
        assert_eq!(
            line,
            ReportLine::NoUpdateNeeded {
                talk_page: "Talk:Foo".to_string()
            }
        );
        assert_eq!(api.edits.len(), 1);
    }

    #[test]
    fn refuses_targets_without_marker() {
        let mut api = wiki();
        api.add_page("Talk:Foo/Index", "A hand-maintained index");
        let line = process_default(&mut api, &instructions()).expect("process");
        assert!(matches!(line, ReportLine::SafetyRefusal { .. }));
        assert_eq!(
            line.to_string(),
            "* [[:Talk:Foo/Index]] does not have the safe string."
        );
        assert!(api.edits.is_empty());
    }

    #[test]
    fn non_actionable_instructions_are_reported() {
        let mut api = wiki();
        let mut set = instructions();
        set.masks.clear();
        let line = process_default(&mut api, &set).expect("process");
        assert_eq!(
            line.to_string(),
            "* [[:Talk:Foo]] has an incorrectly configured template (missing |mask=)."
        );
        assert!(api.edits.is_empty());
        assert_eq!(api.request_count, 0);
    }

    #[test]
    fn missing_target_and_missing_first_archive_are_config_errors() {
        let mut api = wiki();
        let mut set = instructions();
        set.target = Some("Talk:Foo/Nowhere".to_string());
        let line = process_default(&mut api, &set).expect("process");
        assert_eq!(
            line,
            ReportLine::ConfigurationError {
                talk_page: "Talk:Foo".to_string(),
                reason: "target [[Talk:Foo/Nowhere]] does not exist".to_string(),
            }
        );

        let mut set = instructions();
        set.masks = vec!["Talk:Foo/<year>".to_string()];
        let line = process_default(&mut api, &set).expect("process");
        assert!(matches!(line, ReportLine::ConfigurationError { .. }));
        assert!(api.edits.is_empty());
    }

    #[test]
    fn target_redirects_are_followed() {
        let mut api = wiki();
        api.add_redirect("Talk:Foo/Old index", "Talk:Foo/Index");
        let mut set = instructions();
        set.target = Some("Talk:Foo/Old index".to_string());
        let line = process_default(&mut api, &set).expect("process");
        assert_eq!(
            line,
            ReportLine::Indexed {
                talk_page: "Talk:Foo".to_string(),
                target: "Talk:Foo/Index".to_string(),
            }
        );
        assert_eq!(api.edits[0].title, "Talk:Foo/Index");
    }

    #[test]
    fn dry_run_does_not_edit() {
        let mut api = wiki();
        let line = process_instructions(
            &mut api,
            &settings(),
            &instructions(),
            &ProcessOptions { dry_run: true },
        )
        .expect("process");
        assert!(matches!(line, ReportLine::WouldIndex { .. }));
        assert!(api.edits.is_empty());
    }

    #[test]
    fn wiki_failures_propagate() {
        let mut api = wiki();
        api.failing_titles.push("Talk:Foo/Archive 1".to_string());
        let error = process_default(&mut api, &instructions()).expect_err("must fail");
        assert!(format!("{error:#}").contains("indexing [[Talk:Foo]]"));
        assert!(api.edits.is_empty());
    }

    #[test]
    fn recent_edits_only_warn() {
        let mut api = wiki();
        api.edit_times.insert("Talk:Foo/Index".to_string(), Utc::now());
        let line = process_default(&mut api, &instructions()).expect("process");
        assert!(matches!(line, ReportLine::Indexed { .. }));
        let old = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).single().expect("instant");
        api.edit_times.insert("Talk:Foo/Index".to_string(), old);
        assert!(warn_if_recently_edited(&mut api, &settings(), "Talk:Foo/Index").is_ok());
    }

    #[test]
    fn template_fallback_chain() {
        let mut api = MockWiki::default();
        let settings = settings();
        let builtin = resolve_template(&mut api, &settings, "Talk:Foo/Missing").expect("template");
        assert_eq!(builtin, Template::builtin());

        api.add_page(&settings.default_template, "<nowiki><!-- ROW -->\n* %%link%%\n</nowiki>");
        api.add_page("Talk:Foo/Broken", "no sections");
        let default = resolve_template(&mut api, &settings, "Talk:Foo/Broken").expect("template");
        assert_eq!(default.row, "* %%link%%\n");
    }

    #[test]
    fn vanished_archives_are_skipped() {
        let mut api = wiki();
        let pages = vec![
            "Talk:Foo/Archive 1".to_string(),
            "Talk:Foo/Gone".to_string(),
            "Talk:Foo/Archive 2".to_string(),
        ];
        let records = collect_threads(&mut api, &pages).expect("collect");
        let topics: Vec<_> = records.iter().map(|record| record.topic.as_str()).collect();
        assert_eq!(topics, vec!["Alpha", "Beta"]);
    }
}
