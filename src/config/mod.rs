use crate::models::AreaEntry;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,

    #[serde(default)]
    pub parser: ParserConfig,

    #[serde(default)]
    pub areas: AreaTable,
}

/// Where the page comes from
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_page_url")]
    pub page_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Entry-parsing knobs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParserConfig {
    /// Heading tag delimiting the areas on the page.
    #[serde(default = "default_heading_tag")]
    pub heading_tag: String,

    /// Entries with fewer child nodes than this are skipped.
    #[serde(default = "default_min_children")]
    pub min_children: usize,

    #[serde(default = "default_max_anchor_depth")]
    pub max_anchor_depth: usize,

    /// One link per entry, no anchor indirection, single `link` column.
    #[serde(default)]
    pub single_link: bool,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_page_url() -> String {
    "http://psychjobsearch.wikidot.com".to_string()
}
fn default_user_agent() -> String {
    concat!("psychjobs/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_heading_tag() -> String {
    "h3".to_string()
}
fn default_min_children() -> usize {
    4
}
fn default_max_anchor_depth() -> usize {
    8
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            page_url: default_page_url(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            heading_tag: default_heading_tag(),
            min_children: default_min_children(),
            max_anchor_depth: default_max_anchor_depth(),
            single_link: false,
        }
    }
}

// ── Area table ───────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AreaError {
    #[error("unknown area code '{0}'")]
    UnknownCode(String),
}

/// Ordered code → heading label mapping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct AreaTable {
    entries: Vec<AreaEntry>,
}

impl Default for AreaTable {
    fn default() -> Self {
        Self::new(vec![
            AreaEntry::new("cog", "Cognitive"),
            AreaEntry::new("neuro", "Neuroscience & Biopsychology"),
            AreaEntry::new("quant", "Quantitative"),
            AreaEntry::new("open", "Open Area"),
            AreaEntry::new("clinic", "Clinical & Counseling"),
            AreaEntry::new("dev", "Developmental"),
            AreaEntry::new("ed", "Educational"),
            AreaEntry::new("health", "Health"),
            AreaEntry::new("eng", "Human Factors & Engineering Psychology"),
            AreaEntry::new("io", "I/O"),
            AreaEntry::new("school", "School"),
        ])
    }
}

impl AreaTable {
    pub fn new(entries: Vec<AreaEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[AreaEntry] {
        &self.entries
    }

    pub fn label(&self, code: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.label.as_str())
    }

    /// Map codes to labels, preserving order. No codes means every area.
    pub fn resolve<S: AsRef<str>>(&self, codes: &[S]) -> Result<Vec<String>, AreaError> {
        if codes.is_empty() {
            return Ok(self.entries.iter().map(|e| e.label.clone()).collect());
        }

        codes
            .iter()
            .map(|code| {
                let code = code.as_ref().trim();
                self.label(code)
                    .map(str::to_string)
                    .ok_or_else(|| AreaError::UnknownCode(code.to_string()))
            })
            .collect()
    }

    /// Code listing for the CLI help.
    pub fn help_text(&self) -> String {
        let mut out = String::from("Area codes are:\n\n");
        for e in &self.entries {
            out.push_str(&format!("  {}: {}\n", e.code, e.label));
        }
        out
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("PSYCHJOBS").separator("__"))
            .build()
            .context("Failed to read configuration")?;

        let app_cfg: AppConfig = cfg
            .try_deserialize()
            .context("Invalid configuration")?;
        app_cfg.validate()?;
        Ok(app_cfg)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.scraper.page_url)
            .with_context(|| format!("Invalid page_url {:?}", self.scraper.page_url))?;
        if self.parser.max_anchor_depth == 0 {
            anyhow::bail!("parser.max_anchor_depth must be at least 1");
        }
        if self.areas.entries().is_empty() {
            anyhow::bail!("No areas configured");
        }
        Ok(())
    }
}
