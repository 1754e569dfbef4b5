use super::{headline, Notifier};
use crate::lead::Lead;
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const MAX_RETRIES: u8 = 10;
/// Backoff stops doubling after this many shifts (500ms << 6 = 32s).
const MAX_BACKOFF_SHIFT: u8 = 6;

/// Delay after failed attempt `attempt` (1-based): 500ms, 1s, 2s, ... capped.
fn backoff(attempt: u8) -> Duration {
    let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
    Duration::from_millis(500u64 << shift)
}

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.clamp(1, MAX_RETRIES);
        self
    }

    fn payload(lead: &Lead) -> DiscordWebhookPayload {
        let title = format!("{} @ {}", lead.title, lead.company);
        let mut description = format!("{}\n**Source:** {}", headline(lead), lead.source);
        if !lead.matched_keywords.is_empty() {
            description.push_str(&format!("\n**Matched:** {}", lead.matched_keywords.join(", ")));
        }
        if let Some(url) = &lead.url {
            description.push_str(&format!("\n{url}"));
        }
        DiscordWebhookPayload::embed(&title, &description, lead.url.clone())
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, lead: &Lead) -> Result<()> {
        let payload = Self::payload(lead);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("Discord webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("Discord webhook request failed: {e}"),
            };
            if attempt >= self.max_retries {
                return Err(err);
            }
            tokio::time::sleep(backoff(attempt)).await;
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn embed(title: &str, description: &str, url: Option<String>) -> Self {
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                title: title.chars().take(256).collect(),
                description: description.chars().take(4096).collect(),
                url,
            }],
        }
    }
}
