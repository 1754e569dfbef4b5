//! Notification channels for accepted, new leads.
//!
//! Every channel sees a lead at most once per run. Failures are collected
//! and handed back; they never undo anything already committed.

pub mod discord;
pub mod email;
pub mod slack;

use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::lead::Lead;

pub use discord::DiscordNotifier;
pub use email::EmailDigest;
pub use slack::SlackNotifier;

fn default_digest_size() -> usize {
    10
}
fn default_retries() -> u8 {
    3
}
fn default_timeout_secs() -> u64 {
    5
}
fn default_discord_env() -> String {
    "DISCORD_WEBHOOK_URL".into()
}
fn default_slack_env() -> String {
    "SLACK_WEBHOOK_URL".into()
}

/// `[notify]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Per-lead alerts only for `score >= alert_threshold`; unset = every accepted lead.
    #[serde(default)]
    pub alert_threshold: Option<f32>,
    /// 0 disables the email digest.
    #[serde(default = "default_digest_size")]
    pub digest_size: usize,
    #[serde(default = "default_discord_env")]
    pub discord_webhook_env: String,
    #[serde(default = "default_slack_env")]
    pub slack_webhook_env: String,
    #[serde(default = "default_retries")]
    pub retries: u8,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            alert_threshold: None,
            digest_size: default_digest_size(),
            discord_webhook_env: default_discord_env(),
            slack_webhook_env: default_slack_env(),
            retries: default_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Per-lead channel.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, lead: &Lead) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Once-per-run summary channel.
#[async_trait::async_trait]
pub trait DigestSender: Send + Sync {
    async fn send_digest(&self, leads: &[Lead]) -> Result<()>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotifyFailure {
    pub channel: &'static str,
    /// `None` for digest failures.
    pub lead_id: Option<String>,
    pub error: String,
}

/// Fan-out over the configured channels plus an optional digest.
#[derive(Clone, Default)]
pub struct NotifierMux {
    channels: Vec<Arc<dyn Notifier>>,
    digest: Option<Arc<dyn DigestSender>>,
    alert_threshold: Option<f32>,
    digest_size: usize,
}

impl NotifierMux {
    pub fn new() -> Self {
        Self {
            digest_size: default_digest_size(),
            ..Default::default()
        }
    }

    pub fn with_channel(mut self, n: Arc<dyn Notifier>) -> Self {
        self.channels.push(n);
        self
    }

    pub fn with_digest(mut self, d: Arc<dyn DigestSender>) -> Self {
        self.digest = Some(d);
        self
    }

    pub fn with_alert_threshold(mut self, t: Option<f32>) -> Self {
        self.alert_threshold = t;
        self
    }

    pub fn with_digest_size(mut self, n: usize) -> Self {
        self.digest_size = n;
        self
    }

    /// Channels whose webhook env vars are set; log-only when none are.
    pub fn from_config(cfg: &NotifyConfig) -> Self {
        let mut mux = NotifierMux::new()
            .with_alert_threshold(cfg.alert_threshold)
            .with_digest_size(cfg.digest_size);

        if let Some(url) = env_nonempty(&cfg.discord_webhook_env) {
            mux = mux.with_channel(Arc::new(
                DiscordNotifier::new(url)
                    .with_timeout(cfg.timeout_secs)
                    .with_retries(cfg.retries),
            ));
        }
        if let Some(url) = env_nonempty(&cfg.slack_webhook_env) {
            mux = mux.with_channel(Arc::new(SlackNotifier::new(url).with_timeout(cfg.timeout_secs)));
        }
        if mux.channels.is_empty() {
            mux = mux.with_channel(Arc::new(LogNotifier));
        }

        if cfg.digest_size > 0 {
            match EmailDigest::from_env() {
                Ok(Some(d)) => mux = mux.with_digest(Arc::new(d)),
                Ok(None) => {}
                Err(e) => warn!(target: "notify", error = %e, "email digest disabled"),
            }
        }
        mux
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    fn should_alert(&self, lead: &Lead) -> bool {
        self.alert_threshold.map_or(true, |t| lead.score >= t)
    }

    /// Alert each lead on every channel, then send one digest.
    pub async fn dispatch(&self, leads: &[Lead]) -> Vec<NotifyFailure> {
        let mut failures = Vec::new();

        for lead in leads.iter().filter(|l| self.should_alert(l)) {
            for ch in &self.channels {
                if let Err(e) = ch.notify(lead).await {
                    warn!(target: "notify", channel = ch.name(), id = lead.short_id(), error = %e, "notify failed");
                    failures.push(NotifyFailure {
                        channel: ch.name(),
                        lead_id: Some(lead.id.clone()),
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        if let Some(d) = &self.digest {
            let top = top_by_score(leads, self.digest_size);
            if !top.is_empty() {
                if let Err(e) = d.send_digest(&top).await {
                    warn!(target: "notify", channel = d.name(), error = %e, "digest failed");
                    failures.push(NotifyFailure {
                        channel: d.name(),
                        lead_id: None,
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        failures
    }
}

/// Highest score first; ties keep input order.
pub fn top_by_score(leads: &[Lead], n: usize) -> Vec<Lead> {
    let mut sorted: Vec<Lead> = leads.to_vec();
    sorted.sort_by(|a, b| b.score.total_cmp(&a.score));
    sorted.truncate(n);
    sorted
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// One-line text used by the chat channels.
pub(crate) fn headline(lead: &Lead) -> String {
    let mut flags = Vec::new();
    if lead.location.remote {
        flags.push("remote");
    }
    if lead.location.hybrid {
        flags.push("hybrid");
    }
    let place = if lead.location.raw.is_empty() {
        "location n/a".to_string()
    } else {
        lead.location.raw.clone()
    };
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };
    format!(
        "{} @ {} | {}{} | {} | score {:.1}",
        lead.title, lead.company, place, flags, lead.category, lead.score
    )
}

/// Logs the lead; used when no chat channel is configured.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, lead: &Lead) -> Result<()> {
        info!(
            target: "notify",
            id = lead.short_id(),
            url = lead.url.as_deref().unwrap_or("-"),
            "{}",
            headline(lead)
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

// --- Test helper ---
/// Records every lead id it is asked to announce; optionally fails.
#[derive(Default)]
pub struct RecordingNotifier {
    pub calls: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, lead: &Lead) -> Result<()> {
        if let Ok(mut c) = self.calls.lock() {
            c.push(lead.id.clone());
        }
        if self.fail {
            anyhow::bail!("recording notifier set to fail");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead::RawPosting;
    use crate::normalize::normalize;

    fn lead(title: &str, score: f32) -> Lead {
        let mut l = normalize(&RawPosting::new("test", title).with_company("Acme")).unwrap();
        l.score = score;
        l
    }

    #[tokio::test]
    async fn alert_threshold_gates_per_lead_alerts() {
        let rec = Arc::new(RecordingNotifier::new());
        let mux = NotifierMux::new()
            .with_channel(rec.clone())
            .with_alert_threshold(Some(6.0));
        let leads = vec![lead("Backend Engineer", 8.0), lead("Data Engineer", 4.0)];
        let failures = mux.dispatch(&leads).await;
        assert!(failures.is_empty());
        assert_eq!(rec.ids(), vec![leads[0].id.clone()]);
    }

    #[tokio::test]
    async fn failures_are_collected_not_raised() {
        let ok = Arc::new(RecordingNotifier::new());
        let bad = Arc::new(RecordingNotifier::failing());
        let mux = NotifierMux::new().with_channel(bad).with_channel(ok.clone());
        let leads = vec![lead("Backend Engineer", 5.0)];
        let failures = mux.dispatch(&leads).await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].channel, "recording");
        assert_eq!(ok.ids().len(), 1);
    }

    #[test]
    fn top_by_score_orders_and_truncates() {
        let leads = vec![lead("A", 1.0), lead("B", 9.0), lead("C", 5.0)];
        let top = top_by_score(&leads, 2);
        assert_eq!(top.iter().map(|l| l.title.as_str()).collect::<Vec<_>>(), ["B", "C"]);
    }

    #[test]
    fn headline_mentions_flags() {
        let mut l = lead("Backend Engineer", 7.0);
        l.location = crate::normalize::parse_location("Remote - New York, NY");
        let h = headline(&l);
        assert!(h.contains("[remote]"));
        assert!(h.contains("score 7.0"));
    }
}
