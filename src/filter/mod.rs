//! Tech-role filter: keyword/regex scoring, hard exclusions and ordered
//! category rules, all driven by configuration.
//!
//! Evaluation order (deterministic for identical input + config):
//! 1. hard exclusions short-circuit: non-Latin title, `hard_exclude` rules,
//!    geography allow-list → score 0, default category, rejected;
//! 2. positive rules: `weight × title_weight` when matched in the title,
//!    else `weight × description_weight` when matched in the description
//!    (each rule counts once);
//! 3. soft negative rules subtract their weight;
//! 4. category: first matching rule on the title, then on the description,
//!    `general` when nothing matches;
//! 5. `accept = score >= threshold`.

pub mod augment;

use anyhow::{bail, Context, Result};
use once_cell::sync::OnceCell;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::lead::{Lead, Location};
use crate::normalize::location::country_for;
use crate::normalize::DEFAULT_CATEGORY;

pub use augment::Augmentation;

/* ----------------------------
Config schema
---------------------------- */

fn default_threshold() -> f32 {
    4.0
}
fn default_title_weight() -> f32 {
    2.0
}
fn default_description_weight() -> f32 {
    1.0
}
fn default_band() -> f32 {
    1.0
}
fn default_rule_weight() -> f32 {
    1.0
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Multiplier for rules matched in the title.
    #[serde(default = "default_title_weight")]
    pub title_weight: f32,
    /// Multiplier for rules matched only in the description (lower than title).
    #[serde(default = "default_description_weight")]
    pub description_weight: f32,
    /// Scores within ±band of the threshold are eligible for augmentation.
    #[serde(default = "default_band")]
    pub borderline_band: f32,
    #[serde(default = "default_true")]
    pub reject_non_latin_titles: bool,
    #[serde(default)]
    pub positive: Vec<KeywordRule>,
    #[serde(default)]
    pub negative: Vec<KeywordRule>,
    /// Ordered; first match wins.
    #[serde(default)]
    pub categories: Vec<CategoryRule>,
    #[serde(default)]
    pub geo: GeoConfig,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            title_weight: default_title_weight(),
            description_weight: default_description_weight(),
            borderline_band: default_band(),
            reject_non_latin_titles: true,
            positive: Vec::new(),
            negative: Vec::new(),
            categories: Vec::new(),
            geo: GeoConfig::default(),
        }
    }
}

/// One keyword rule. Exactly one of `keyword` (literal, word-bounded) or
/// `pattern` (raw regex) must be set; both match case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default = "default_rule_weight")]
    pub weight: f32,
    /// Negative rules only: reject outright instead of subtracting.
    #[serde(default)]
    pub hard_exclude: bool,
    #[serde(default)]
    pub title_only: bool,
}

impl KeywordRule {
    pub fn keyword(kw: &str, weight: f32) -> Self {
        Self {
            keyword: Some(kw.to_string()),
            pattern: None,
            weight,
            hard_exclude: false,
            title_only: false,
        }
    }

    pub fn hard(kw: &str) -> Self {
        Self {
            hard_exclude: true,
            ..Self::keyword(kw, 0.0)
        }
    }

    fn label(&self) -> &str {
        self.keyword
            .as_deref()
            .or(self.pattern.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl CategoryRule {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    /// Empty = no geography gate.
    #[serde(default)]
    pub allowed_countries: Vec<String>,
    /// Leads whose country could not be parsed pass the gate.
    #[serde(default = "default_true")]
    pub allow_unknown: bool,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            allowed_countries: Vec::new(),
            allow_unknown: true,
        }
    }
}

/* ----------------------------
Verdict
---------------------------- */

#[derive(Debug, Clone, PartialEq)]
pub struct FilterVerdict {
    pub score: f32,
    pub category: String,
    pub accept: bool,
    pub matched: Vec<String>,
    /// Set when a hard exclusion fired; scoring was skipped.
    pub excluded_by: Option<String>,
    pub augmented: bool,
}

impl FilterVerdict {
    fn excluded(reason: String) -> Self {
        Self {
            score: 0.0,
            category: DEFAULT_CATEGORY.to_string(),
            accept: false,
            matched: Vec::new(),
            excluded_by: Some(reason),
            augmented: false,
        }
    }

    /// Copy the verdict onto the Lead it was computed for.
    pub fn apply_to(&self, lead: &mut Lead) {
        lead.score = self.score;
        lead.category = self.category.clone();
        lead.matched_keywords = self.matched.clone();
        lead.augmented = self.augmented;
    }
}

/* ----------------------------
Compiled filter
---------------------------- */

#[derive(Debug)]
struct CompiledRule {
    label: String,
    re: Regex,
    weight: f32,
    hard_exclude: bool,
    title_only: bool,
}

impl CompiledRule {
    fn matches(&self, title: &str, description: &str) -> bool {
        self.re.is_match(title) || (!self.title_only && self.re.is_match(description))
    }
}

#[derive(Debug)]
struct CompiledCategory {
    name: String,
    res: Vec<Regex>,
}

impl CompiledCategory {
    fn matches(&self, text: &str) -> bool {
        self.res.iter().any(|re| re.is_match(text))
    }
}

#[derive(Debug)]
pub struct TechFilter {
    cfg: FilterConfig,
    positive: Vec<CompiledRule>,
    negative: Vec<CompiledRule>,
    categories: Vec<CompiledCategory>,
    /// `geo.allowed_countries` resolved to the parser's canonical names.
    allowed_countries: Vec<&'static str>,
}

impl TechFilter {
    /// Validate and compile the rule lists once.
    pub fn new(cfg: FilterConfig) -> Result<Self> {
        for (name, v) in [
            ("threshold", cfg.threshold),
            ("title_weight", cfg.title_weight),
            ("description_weight", cfg.description_weight),
            ("borderline_band", cfg.borderline_band),
        ] {
            if !v.is_finite() {
                bail!("filter.{name} must be a finite number");
            }
        }
        if cfg.title_weight < 0.0 || cfg.description_weight < 0.0 || cfg.borderline_band < 0.0 {
            bail!("filter multipliers and borderline_band must be non-negative");
        }

        let positive = cfg
            .positive
            .iter()
            .map(|r| compile_rule(r, "positive"))
            .collect::<Result<Vec<_>>>()?;
        let negative = cfg
            .negative
            .iter()
            .map(|r| compile_rule(r, "negative"))
            .collect::<Result<Vec<_>>>()?;
        let allowed_countries = cfg
            .geo
            .allowed_countries
            .iter()
            .map(|c| match country_for(c.trim()) {
                Some(name) => Ok(name),
                None => bail!("filter.geo.allowed_countries: unknown country `{c}`"),
            })
            .collect::<Result<Vec<_>>>()?;
        let categories = cfg
            .categories
            .iter()
            .map(|c| {
                let mut res = Vec::with_capacity(c.keywords.len() + c.patterns.len());
                for kw in &c.keywords {
                    res.push(keyword_regex(kw).with_context(|| {
                        format!("category `{}` keyword `{kw}`", c.name)
                    })?);
                }
                for p in &c.patterns {
                    res.push(pattern_regex(p).with_context(|| {
                        format!("category `{}` pattern `{p}`", c.name)
                    })?);
                }
                Ok(CompiledCategory {
                    name: c.name.trim().to_ascii_lowercase(),
                    res,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            cfg,
            positive,
            negative,
            categories,
            allowed_countries,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.cfg
    }

    pub fn threshold(&self) -> f32 {
        self.cfg.threshold
    }

    /// Score, categorize and decide one Lead.
    pub fn evaluate(&self, lead: &Lead) -> FilterVerdict {
        let title = lead.title.as_str();
        let description = lead.description.as_str();

        // 1) Hard exclusions
        if self.cfg.reject_non_latin_titles && has_non_latin_script(title) {
            return FilterVerdict::excluded("non_latin_title".into());
        }
        if let Some(r) = self
            .negative
            .iter()
            .find(|r| r.hard_exclude && r.matches(title, description))
        {
            return FilterVerdict::excluded(format!("hard_exclude:{}", r.label));
        }
        if let Some(reason) = self.geo_block(&lead.location) {
            return FilterVerdict::excluded(reason);
        }

        // 2) Positive keywords
        let mut score = 0.0f32;
        let mut matched = Vec::new();
        for r in &self.positive {
            if r.re.is_match(title) {
                score += r.weight * self.cfg.title_weight;
                matched.push(r.label.clone());
            } else if !r.title_only && r.re.is_match(description) {
                score += r.weight * self.cfg.description_weight;
                matched.push(r.label.clone());
            }
        }

        // 3) Soft negatives
        for r in self.negative.iter().filter(|r| !r.hard_exclude) {
            if r.matches(title, description) {
                score -= r.weight;
                matched.push(format!("-{}", r.label));
            }
        }

        // 4) Category (title pass, then description pass)
        let category = self
            .categories
            .iter()
            .find(|c| c.matches(title))
            .or_else(|| self.categories.iter().find(|c| c.matches(description)))
            .map(|c| c.name.clone())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        FilterVerdict {
            score,
            category,
            accept: self.passes(score),
            matched,
            excluded_by: None,
            augmented: false,
        }
    }

    fn passes(&self, score: f32) -> bool {
        score >= self.cfg.threshold
    }

    /// Close enough to the threshold that a second opinion may flip it.
    /// Hard-excluded verdicts are never borderline.
    pub fn is_borderline(&self, verdict: &FilterVerdict) -> bool {
        verdict.excluded_by.is_none()
            && (verdict.score - self.cfg.threshold).abs() <= self.cfg.borderline_band
    }

    /// Fold an augmentation result into a keyword verdict. Hard exclusions are
    /// kept as-is; otherwise score/category are replaced and `accept` recomputed.
    pub fn apply_augmentation(&self, mut verdict: FilterVerdict, aug: &Augmentation) -> FilterVerdict {
        if verdict.excluded_by.is_some() {
            return verdict;
        }
        if aug.score.is_finite() {
            verdict.score = aug.score;
        }
        if let Some(cat) = aug.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            verdict.category = cat.to_ascii_lowercase();
        }
        verdict.accept = self.passes(verdict.score);
        verdict.augmented = true;
        verdict
    }

    fn geo_block(&self, loc: &Location) -> Option<String> {
        if self.allowed_countries.is_empty() {
            return None;
        }
        match loc.country.as_deref() {
            Some(c) if self.allowed_countries.iter().any(|a| *a == c) => None,
            Some(c) => Some(format!("geo:{c}")),
            None if self.cfg.geo.allow_unknown => None,
            None => Some("geo:unknown".into()),
        }
    }
}

fn compile_rule(rule: &KeywordRule, list: &str) -> Result<CompiledRule> {
    if rule.hard_exclude && list == "positive" {
        bail!(
            "positive rule `{}`: hard_exclude is only valid on negative rules",
            rule.label()
        );
    }
    if !rule.weight.is_finite() || rule.weight < 0.0 {
        bail!(
            "{list} rule `{}`: weight must be a finite non-negative number",
            rule.label()
        );
    }
    let re = match (&rule.keyword, &rule.pattern) {
        (Some(k), None) => keyword_regex(k),
        (None, Some(p)) => pattern_regex(p),
        _ => bail!("{list} rule must set exactly one of `keyword` or `pattern`"),
    }
    .with_context(|| format!("{list} rule `{}`", rule.label()))?;

    Ok(CompiledRule {
        label: rule.label().to_string(),
        re,
        weight: rule.weight,
        hard_exclude: rule.hard_exclude,
        title_only: rule.title_only,
    })
}

/// Literal keyword, case-insensitive, bounded by non-word chars or text edges
/// (so `c++` and `.net` behave like words too).
fn keyword_regex(kw: &str) -> Result<Regex> {
    let kw = kw.trim();
    if kw.is_empty() {
        bail!("empty keyword");
    }
    let escaped = regex::escape(kw);
    pattern_regex(&format!(r"(?:^|[^\w]){escaped}(?:[^\w]|$)"))
}

fn pattern_regex(p: &str) -> Result<Regex> {
    Ok(RegexBuilder::new(p).case_insensitive(true).build()?)
}

fn has_non_latin_script(s: &str) -> bool {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"[\p{Han}\p{Cyrillic}\p{Hiragana}\p{Katakana}\p{Hangul}]").unwrap())
        .is_match(s)
}
