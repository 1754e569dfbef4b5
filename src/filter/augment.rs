//! Optional LLM second opinion for borderline leads.
//!
//! Provider abstraction + file cache + daily limit + per-run budget. Every
//! failure is an `AugmentError` that callers degrade to the keyword verdict.

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::ai::AiConfig;
use crate::error::AugmentError;
use crate::filter::FilterVerdict;
use crate::lead::Lead;
use crate::store::write_atomic;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a provider may change about a keyword verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Augmentation {
    pub score: f32,
    #[serde(default)]
    pub category: Option<String>,
}

/// Capability handed to the pipeline.
pub trait Augmenter: Send + Sync {
    fn augment<'a>(
        &'a self,
        lead: &'a Lead,
        verdict: &'a FilterVerdict,
        threshold: f32,
    ) -> BoxFuture<'a, Result<Augmentation, AugmentError>>;

    fn provider_name(&self) -> &'static str;

    /// `false` means the pipeline should not even ask.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Called once at the start of every run (resets per-run budgets).
    fn begin_run(&self) {}

    /// `augment` with failures folded into `None`.
    fn try_augment<'a>(
        &'a self,
        lead: &'a Lead,
        verdict: &'a FilterVerdict,
        threshold: f32,
    ) -> BoxFuture<'a, Option<Augmentation>> {
        Box::pin(async move {
            match self.augment(lead, verdict, threshold).await {
                Ok(a) => Some(a),
                Err(e) => {
                    debug!(target: "augment", id = lead.short_id(), error = %e, "augmentation unavailable");
                    None
                }
            }
        })
    }
}

pub type DynAugmenter = Arc<dyn Augmenter>;

/// Factory.
///
/// * `AI_TEST_MODE=mock` → deterministic mock behind the cache.
/// * `enabled == false` or missing key → disabled.
/// * otherwise the chat-completions provider behind the cache.
pub fn build_augmenter(cfg: &AiConfig) -> DynAugmenter {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(CachingAugmenter::new(
            MockProvider::default(),
            cfg.cache_dir.clone(),
            cfg.daily_limit,
            cfg.run_budget,
        ));
    }

    if !cfg.enabled {
        return Arc::new(DisabledAugmenter);
    }

    match ChatCompletionsProvider::from_config(cfg) {
        Ok(p) => Arc::new(CachingAugmenter::new(
            p,
            cfg.cache_dir.clone(),
            cfg.daily_limit,
            cfg.run_budget,
        )),
        Err(e) => {
            warn!(target: "augment", error = %e, "augmentation disabled");
            Arc::new(DisabledAugmenter)
        }
    }
}

/* ----------------------------
Providers
---------------------------- */

/// Low-level provider: one remote call for one prompt.
pub trait Provider: Send + Sync + 'static {
    fn fetch<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<Augmentation, AugmentError>>;
    fn name(&self) -> &'static str;
}

const SYSTEM_PROMPT: &str = "You grade job postings for a software engineer. \
Reply with JSON only: {\"score\": <number>, \"category\": \"<one lowercase word>\"}. \
Use the same scale as the keyword score given; a score at or above the threshold means relevant.";

/// OpenAI-style `/chat/completions` client (OpenAI, Groq, OpenRouter).
pub struct ChatCompletionsProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsProvider {
    pub fn from_config(cfg: &AiConfig) -> anyhow::Result<Self> {
        let key_env = cfg.key_env();
        let api_key = std::env::var(&key_env).unwrap_or_default();
        if api_key.trim().is_empty() {
            anyhow::bail!("Missing {key_env} env var");
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("job-lead-finder/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", cfg.endpoint_root()),
            api_key,
            model: cfg.model.clone(),
        })
    }
}

impl Provider for ChatCompletionsProvider {
    fn fetch<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<Augmentation, AugmentError>> {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: String,
            }

            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: SYSTEM_PROMPT,
                    },
                    Msg {
                        role: "user",
                        content: prompt,
                    },
                ],
                temperature: 0.0,
                max_tokens: 60,
            };

            let resp = self
                .http
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .map_err(|e| AugmentError::Unavailable(e.to_string()))?;

            if !resp.status().is_success() {
                return Err(AugmentError::Unavailable(format!("HTTP {}", resp.status())));
            }
            let body: Resp = resp
                .json()
                .await
                .map_err(|e| AugmentError::Malformed(e.to_string()))?;
            let content = body
                .choices
                .first()
                .map(|c| c.message.content.as_str())
                .unwrap_or("");
            parse_answer(content)
        })
    }

    fn name(&self) -> &'static str {
        "chat-completions"
    }
}

/// Always unavailable; used when augmentation is off.
pub struct DisabledAugmenter;

impl Augmenter for DisabledAugmenter {
    fn augment<'a>(
        &'a self,
        _lead: &'a Lead,
        _verdict: &'a FilterVerdict,
        _threshold: f32,
    ) -> BoxFuture<'a, Result<Augmentation, AugmentError>> {
        Box::pin(async { Err(AugmentError::Unavailable("disabled".into())) })
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Fixed answer for tests and local runs.
#[derive(Clone)]
pub struct MockProvider {
    pub fixed: Augmentation,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            fixed: Augmentation {
                score: 5.0,
                category: None,
            },
        }
    }
}

impl Provider for MockProvider {
    fn fetch<'a>(&'a self, _prompt: &'a str) -> BoxFuture<'a, Result<Augmentation, AugmentError>> {
        let out = self.fixed.clone();
        Box::pin(async move { Ok(out) })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/* ----------------------------
Caching wrapper
---------------------------- */

pub struct CachingAugmenter<P: Provider> {
    inner: P,
    cache_dir: PathBuf,
    daily_limit_max: u32,
    run_budget: u32,
    run_calls: AtomicU32,
    counter: Mutex<DailyCounter>,
}

impl<P: Provider> CachingAugmenter<P> {
    pub fn new(inner: P, cache_dir: PathBuf, daily_limit_max: u32, run_budget: u32) -> Self {
        if let Err(e) = fs::create_dir_all(&cache_dir) {
            warn!(target: "augment", dir = %cache_dir.display(), error = %e, "cannot create cache dir");
        }
        let counter = Mutex::new(load_daily_counter(&cache_dir).unwrap_or_default());
        Self {
            inner,
            cache_dir,
            daily_limit_max,
            run_budget,
            run_calls: AtomicU32::new(0),
            counter,
        }
    }

    /// Real calls made so far in the current run.
    pub fn run_calls(&self) -> u32 {
        self.run_calls.load(Ordering::SeqCst)
    }

    async fn augment_impl(
        &self,
        lead: &Lead,
        verdict: &FilterVerdict,
        threshold: f32,
    ) -> Result<Augmentation, AugmentError> {
        let prompt = build_prompt(lead, verdict, threshold);
        let key = cache_key(&prompt);

        // 1) Cache hits are free.
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            return Ok(hit);
        }

        // 2) Budgets (only real calls count).
        self.reserve_call()?;

        // 3) Real call.
        let fresh = self.inner.fetch(&prompt).await?;
        let json = serde_json::to_vec(&fresh).map_err(|e| AugmentError::Malformed(e.to_string()))?;
        if let Err(e) = write_atomic(&cache_path(&self.cache_dir, &key), &json) {
            debug!(target: "augment", error = %e, "cache write failed");
        }
        Ok(fresh)
    }

    fn reserve_call(&self) -> Result<(), AugmentError> {
        if self.run_calls.load(Ordering::SeqCst) >= self.run_budget {
            return Err(AugmentError::BudgetExhausted);
        }
        let mut g = self
            .counter
            .lock()
            .map_err(|_| AugmentError::Unavailable("daily counter poisoned".into()))?;
        if g.is_expired() {
            g.reset_to_today();
        }
        if g.count >= self.daily_limit_max {
            return Err(AugmentError::BudgetExhausted);
        }
        g.count = g.count.saturating_add(1);
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = save_daily_counter(&self.cache_dir, &g) {
            debug!(target: "augment", error = %e, "counter write failed");
        }
        Ok(())
    }
}

impl<P: Provider> Augmenter for CachingAugmenter<P> {
    fn augment<'a>(
        &'a self,
        lead: &'a Lead,
        verdict: &'a FilterVerdict,
        threshold: f32,
    ) -> BoxFuture<'a, Result<Augmentation, AugmentError>> {
        Box::pin(self.augment_impl(lead, verdict, threshold))
    }

    fn provider_name(&self) -> &'static str {
        self.inner.name()
    }

    fn begin_run(&self) {
        self.run_calls.store(0, Ordering::SeqCst);
    }
}

/* ----------------------------
Prompt + answer
---------------------------- */

const PROMPT_DESCRIPTION_CHARS: usize = 1_500;

fn build_prompt(lead: &Lead, verdict: &FilterVerdict, threshold: f32) -> String {
    let description: String = lead.description.chars().take(PROMPT_DESCRIPTION_CHARS).collect();
    format!(
        "Title: {}\nCompany: {}\nLocation: {}\nKeyword score: {:.2}\nThreshold: {:.2}\nKeyword category: {}\nDescription: {}",
        lead.title,
        lead.company,
        lead.location.raw,
        verdict.score,
        threshold,
        verdict.category,
        description
    )
}

/// Accepts bare JSON or JSON wrapped in prose / code fences.
pub fn parse_answer(content: &str) -> Result<Augmentation, AugmentError> {
    let start = content.find('{');
    let end = content.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &content[s..=e],
        _ => return Err(AugmentError::Malformed("no JSON object in answer".into())),
    };
    let aug: Augmentation =
        serde_json::from_str(json).map_err(|e| AugmentError::Malformed(e.to_string()))?;
    if !aug.score.is_finite() {
        return Err(AugmentError::Malformed("non-finite score".into()));
    }
    Ok(aug)
}

/* ----------------------------
File cache + daily counter
---------------------------- */

fn cache_key(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    digest.iter().take(16).map(|b| format!("{b:02x}")).collect()
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file(dir: &Path, key: &str) -> Option<Augmentation> {
    let s = fs::read_to_string(cache_path(dir, key)).ok()?;
    serde_json::from_str(&s).ok()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}

impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyCounter {
    fn is_expired(&self) -> bool {
        self.date != today()
    }
    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

fn today() -> String {
    chrono::Utc::now().date_naive().to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_daily_counter(dir: &Path) -> Option<DailyCounter> {
    let s = fs::read_to_string(counter_path(dir)).ok()?;
    serde_json::from_str(&s).ok()
}

fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> std::io::Result<()> {
    let s = serde_json::to_vec(dc)?;
    write_atomic(&counter_path(dir), &s)
}
