use std::env;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

use crate::client::{
    MediaWikiClient, MediaWikiClientConfig, WikiDiscoveryApi, WikiReadApi, WikiWriteApi,
};
use crate::config::{IndexerConfig, IndexerSettings};
use crate::error::PipelineError;
use crate::instructions::{Instructions, parse_instructions};
use crate::mask::expand_masks;
use crate::pipeline::{ProcessOptions, ReportLine, collect_threads, process_instructions};

pub const LOG_EDIT_SUMMARY: &str = "BOT: Updating log";

static ENABLE_ALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"enable: *all").expect("enable all regex"));

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Talk pages to process. Empty means every page transcluding the opt-in template.
    pub pages: Vec<String>,
    pub dry_run: bool,
    pub publish_log: bool,
}

/// Report lines of one run, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunLog {
    lines: Vec<ReportLine>,
}

impl RunLog {
    pub fn push(&mut self, line: ReportLine) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    pub fn render(&self) -> String {
        let mut text = String::from("Run finished at ~~~~~\n");
        for line in &self.lines {
            text.push_str(&line.to_string());
            text.push('\n');
        }
        text
    }

    fn count(&self, predicate: impl Fn(&ReportLine) -> bool) -> usize {
        self.lines.iter().filter(|line| predicate(line)).count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub enabled: bool,
    pub dry_run: bool,
    pub processed: usize,
    pub indexed: usize,
    pub unchanged: usize,
    pub configuration_errors: usize,
    pub safety_refusals: usize,
    pub failures: usize,
    pub published_log: bool,
    pub request_count: usize,
    pub log: RunLog,
}

impl RunReport {
    fn new(options: &RunOptions, enabled: bool, log: RunLog) -> Self {
        Self {
            enabled,
            dry_run: options.dry_run,
            processed: log.lines().len(),
            indexed: log.count(|line| {
                matches!(line, ReportLine::Indexed { .. } | ReportLine::WouldIndex { .. })
            }),
            unchanged: log.count(|line| matches!(line, ReportLine::NoUpdateNeeded { .. })),
            configuration_errors: log
                .count(|line| matches!(line, ReportLine::ConfigurationError { .. })),
            safety_refusals: log.count(|line| matches!(line, ReportLine::SafetyRefusal { .. })),
            failures: log.count(|line| matches!(line, ReportLine::Failed { .. })),
            published_log: false,
            request_count: 0,
            log,
        }
    }
}

/// Run against the configured wiki. Credentials come from `WIKI_BOT_USER`
/// and `WIKI_BOT_PASS` and are only required when the run may write.
pub fn run_indexer(config: &IndexerConfig, options: &RunOptions) -> Result<RunReport> {
    let mut client = MediaWikiClient::new(MediaWikiClientConfig::from_config(config))?;
    let credentials = if options.dry_run {
        None
    } else {
        let username = env::var("WIKI_BOT_USER")
            .map_err(|_| anyhow::anyhow!("WIKI_BOT_USER is required unless --dry-run is set"))?;
        let password = env::var("WIKI_BOT_PASS")
            .map_err(|_| anyhow::anyhow!("WIKI_BOT_PASS is required unless --dry-run is set"))?;
        Some((username, password))
    };
    run_indexer_with_api(
        &mut client,
        &config.settings(),
        options,
        credentials
            .as_ref()
            .map(|(username, password)| (username.as_str(), password.as_str())),
    )
}

pub fn run_indexer_with_api<A: WikiWriteApi + WikiDiscoveryApi>(
    api: &mut A,
    settings: &IndexerSettings,
    options: &RunOptions,
    credentials: Option<(&str, &str)>,
) -> Result<RunReport> {
    if let Some((username, password)) = credentials {
        api.login(username, password)?;
    }

    if let Some(enable_page) = &settings.enable_page {
        let text = api.get_page_text(enable_page)?.unwrap_or_default();
        if !is_run_enabled(&text, settings.task_id) {
            tracing::warn!(page = %enable_page, task = settings.task_id, "run disabled on wiki");
            let mut report = RunReport::new(options, false, RunLog::default());
            report.request_count = api.request_count();
            return Ok(report);
        }
    }

    let pages = if options.pages.is_empty() {
        api.pages_transcluding(&settings.opt_in_template)
            .context("failed to list opted-in pages")?
    } else {
        options.pages.clone()
    };
    tracing::info!(pages = pages.len(), dry_run = options.dry_run, "starting run");

    let process = ProcessOptions {
        dry_run: options.dry_run,
    };
    let mut log = RunLog::default();
    for page in &pages {
        let line = process_page(api, settings, page, &process);
        if line.is_success() {
            tracing::info!(page = %page, result = %line, "processed page");
        } else {
            tracing::warn!(page = %page, result = %line, "page not indexed");
        }
        log.push(line);
    }

    let mut report = RunReport::new(options, true, log);
    if options.publish_log && !options.dry_run {
        if let Some(log_page) = &settings.log_page {
            api.edit_page(log_page, &report.log.render(), LOG_EDIT_SUMMARY)
                .with_context(|| format!("failed to publish run log to [[{log_page}]]"))?;
            report.published_log = true;
        }
    }
    report.request_count = api.request_count();
    Ok(report)
}

/// Process one talk page. Every outcome, including wiki failures, becomes a
/// report line so the rest of the run can continue.
pub fn process_page<A: WikiWriteApi + ?Sized>(
    api: &mut A,
    settings: &IndexerSettings,
    talk_page: &str,
    options: &ProcessOptions,
) -> ReportLine {
    match index_page(api, settings, talk_page, options) {
        Ok(line) => line,
        Err(error) => {
            let reason = format!("{error:#}");
            tracing::error!(page = %talk_page, error = %reason, "page failed");
            ReportLine::Failed {
                talk_page: talk_page.to_string(),
                reason,
            }
        }
    }
}

fn index_page<A: WikiWriteApi + ?Sized>(
    api: &mut A,
    settings: &IndexerSettings,
    talk_page: &str,
    options: &ProcessOptions,
) -> Result<ReportLine> {
    tracing::info!(page = %talk_page, "processing");
    let Some(text) = api.get_page_text(talk_page)? else {
        return Ok(ReportLine::Failed {
            talk_page: talk_page.to_string(),
            reason: "page does not exist".to_string(),
        });
    };
    let instructions = match parse_instructions(&text, talk_page, settings) {
        Ok(instructions) => instructions,
        Err(error) => return Ok(ReportLine::configuration_error(talk_page, &error)),
    };
    process_instructions(api, settings, &instructions, options)
}

/// What the bot would index for one talk page, without touching the target.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub talk_page: String,
    pub instructions: Option<Instructions>,
    pub problem: Option<String>,
    pub archives: Vec<String>,
    pub threads: usize,
}

pub fn inspect_page<A: WikiReadApi + ?Sized>(
    api: &mut A,
    settings: &IndexerSettings,
    talk_page: &str,
) -> Result<InspectReport> {
    let mut report = InspectReport {
        talk_page: talk_page.to_string(),
        instructions: None,
        problem: None,
        archives: Vec::new(),
        threads: 0,
    };
    let Some(text) = api.get_page_text(talk_page)? else {
        report.problem = Some("page does not exist".to_string());
        return Ok(report);
    };
    let instructions = match parse_instructions(&text, talk_page, settings) {
        Ok(instructions) => instructions,
        Err(error) => {
            report.problem = Some(error.to_string());
            return Ok(report);
        }
    };
    if let Err(error) = instructions.validate() {
        report.problem = Some(error.to_string());
    } else {
        match expand_masks(api, &instructions) {
            Ok(archives) => {
                report.threads = collect_threads(api, &archives)?.len();
                report.archives = archives;
            }
            Err(PipelineError::Config(error)) => report.problem = Some(error.to_string()),
            Err(PipelineError::Wiki(error)) => return Err(error),
        }
    }
    report.instructions = Some(instructions);
    Ok(report)
}

/// Inspect against the configured wiki. Read-only, so no login.
pub fn inspect(config: &IndexerConfig, talk_page: &str) -> Result<InspectReport> {
    let mut client = MediaWikiClient::new(MediaWikiClientConfig::from_config(config))?;
    inspect_page(&mut client, &config.settings(), talk_page)
}

/// The on-wiki kill switch: `enable: all`, or a block such as
/// `15: Archive indexer\nenable: true\n` for this task.
pub fn is_run_enabled(text: &str, task_id: u32) -> bool {
    let text = text.to_lowercase();
    if ENABLE_ALL.is_match(&text) {
        return true;
    }
    let pattern = format!(r"{task_id}: (.*?)\nenabled?: (true|.*?)\n");
    Regex::new(&pattern)
        .ok()
        .and_then(|task| task.captures(&text))
        .and_then(|captures| captures.get(2))
        .is_some_and(|state| state.as_str() == "true")
}
