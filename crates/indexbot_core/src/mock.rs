use std::collections::BTreeMap;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};

use crate::client::{WikiDiscoveryApi, WikiReadApi, WikiWriteApi};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedEdit {
    pub title: String,
    pub content: String,
    pub summary: String,
}

#[derive(Default)]
pub(crate) struct MockWiki {
    pub pages: BTreeMap<String, String>,
    pub redirects: BTreeMap<String, String>,
    pub edit_times: BTreeMap<String, DateTime<Utc>>,
    pub transclusions: Vec<String>,
    pub edits: Vec<RecordedEdit>,
    pub failing_titles: Vec<String>,
    pub logged_in: bool,
    pub request_count: usize,
}

impl MockWiki {
    pub fn add_page(&mut self, title: &str, text: &str) {
        self.pages.insert(title.to_string(), text.to_string());
    }

    pub fn add_redirect(&mut self, from: &str, to: &str) {
        self.redirects.insert(from.to_string(), to.to_string());
        self.pages
            .insert(from.to_string(), format!("#REDIRECT [[{to}]]"));
    }

    fn check_available(&self, title: &str) -> Result<()> {
        if self.failing_titles.iter().any(|item| item == title) {
            bail!("simulated network failure for {title}");
        }
        Ok(())
    }
}

impl WikiReadApi for MockWiki {
    fn page_exists(&mut self, title: &str) -> Result<bool> {
        self.request_count += 1;
        self.check_available(title)?;
        Ok(self.pages.contains_key(title))
    }

    fn get_page_text(&mut self, title: &str) -> Result<Option<String>> {
        self.request_count += 1;
        self.check_available(title)?;
        Ok(self.pages.get(title).cloned())
    }

    fn is_redirect(&mut self, title: &str) -> Result<bool> {
        self.request_count += 1;
        self.check_available(title)?;
        Ok(self.redirects.contains_key(title))
    }

    fn resolve_redirect(&mut self, title: &str) -> Result<String> {
        self.request_count += 1;
        Ok(self
            .redirects
            .get(title)
            .cloned()
            .unwrap_or_else(|| title.to_string()))
    }

    fn last_edit_time(&mut self, title: &str) -> Result<Option<DateTime<Utc>>> {
        self.request_count += 1;
        Ok(self.edit_times.get(title).copied())
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

impl WikiWriteApi for MockWiki {
    fn login(&mut self, _username: &str, _password: &str) -> Result<()> {
        self.request_count += 1;
        self.logged_in = true;
        Ok(())
    }

    fn edit_page(&mut self, title: &str, content: &str, summary: &str) -> Result<()> {
        self.request_count += 1;
        self.check_available(title)?;
        self.edits.push(RecordedEdit {
            title: title.to_string(),
            content: content.to_string(),
            summary: summary.to_string(),
        });
        self.pages.insert(title.to_string(), content.to_string());
        Ok(())
    }
}

impl WikiDiscoveryApi for MockWiki {
    fn pages_transcluding(&mut self, _template: &str) -> Result<Vec<String>> {
        self.request_count += 1;
        Ok(self.transclusions.clone())
    }
}
