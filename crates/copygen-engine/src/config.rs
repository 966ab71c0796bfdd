use std::collections::BTreeSet;
use std::env;
use std::time::Duration;

use crate::error::{REASON_EMPTY_ITEMS, REASON_EMPTY_RESPONSE, REASON_INVALID_JSON};

pub const DEFAULT_PROVIDER: &str = "deepseek";
pub const DEFAULT_MODEL: &str = "deepseek-v3.2";
pub const DEFAULT_API_BASE: &str = "https://api.deepseek.com";
pub const DEFAULT_MOCK_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_FALLBACK_DELAY: Duration = Duration::from_millis(300);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_IMAGE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneratorMode {
    #[default]
    Cloud,
    /// Always answer with mock output; for offline and demo runs.
    Mock,
}

impl GeneratorMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cloud" => Some(GeneratorMode::Cloud),
            "mock" => Some(GeneratorMode::Mock),
            _ => None,
        }
    }
}

/// Switches and identifiers the orchestrator is constructed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub mode: GeneratorMode,
    pub mock_fallback: bool,
    pub recoverable_reasons: BTreeSet<String>,
    pub provider: String,
    pub model: String,
    pub mock_delay: Duration,
    pub fallback_delay: Duration,
    pub image_function: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            mode: GeneratorMode::Cloud,
            mock_fallback: true,
            recoverable_reasons: default_recoverable_reasons(),
            provider: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            mock_delay: DEFAULT_MOCK_DELAY,
            fallback_delay: DEFAULT_FALLBACK_DELAY,
            image_function: None,
        }
    }
}

impl GeneratorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(mode) = get("COPYGEN_MODE").as_deref().and_then(GeneratorMode::parse) {
            config.mode = mode;
        }
        if let Some(flag) = get("COPYGEN_MOCK_FALLBACK").as_deref().and_then(parse_flag) {
            config.mock_fallback = flag;
        }
        if let Some(provider) = get("COPYGEN_PROVIDER") {
            config.provider = provider;
        }
        if let Some(model) = get("COPYGEN_MODEL") {
            config.model = model;
        }
        if let Some(raw) = get("COPYGEN_RECOVERABLE_REASONS") {
            config.recoverable_reasons = raw
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .collect();
        }
        config.image_function = get("COPYGEN_IMAGE_FUNCTION");
        config
    }

    pub fn is_recoverable(&self, code: &str) -> bool {
        self.recoverable_reasons.contains(code)
    }

    /// Zero delays; used by tests and by callers that pace themselves.
    pub fn without_delays(mut self) -> Self {
        self.mock_delay = Duration::ZERO;
        self.fallback_delay = Duration::ZERO;
        self
    }
}

pub fn default_recoverable_reasons() -> BTreeSet<String> {
    [REASON_INVALID_JSON, REASON_EMPTY_ITEMS, REASON_EMPTY_RESPONSE]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Endpoints and credentials for the HTTP transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub functions_base: Option<String>,
    pub connect_timeout: Duration,
    pub image_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            functions_base: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            image_timeout: DEFAULT_IMAGE_TIMEOUT,
        }
    }
}

impl HttpConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(base) = get("COPYGEN_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        config.api_key = get("COPYGEN_API_KEY").or_else(|| get("DEEPSEEK_API_KEY"));
        config.functions_base =
            get("COPYGEN_FUNCTIONS_BASE").map(|base| base.trim_end_matches('/').to_string());
        if let Some(secs) = get("COPYGEN_IMAGE_TIMEOUT_SECS").and_then(|raw| raw.parse::<u64>().ok())
        {
            if secs > 0 {
                config.image_timeout = Duration::from_secs(secs);
            }
        }
        config
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
