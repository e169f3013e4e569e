use std::env::VarError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const OPENROUTER_DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_SITE_BASE_URL: &str = "https://www.dansedelphineletort.com";
const DEFAULT_SESSION_SECRET: &str = "change-me-please";
const DEFAULT_PROMO_MONTH: u32 = 9;
const DEFAULT_NUDGE_EVERY: u64 = 2;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No API key configured. Provide OPENAI_API_KEY or OPENROUTER_API_KEY.")]
    MissingCredentials,
    #[error("{0} contains invalid unicode")]
    NotUnicode(&'static str),
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Which completion provider the key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    OpenRouter,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OpenAI",
            Provider::OpenRouter => "OpenRouter",
        }
    }

    fn default_base(&self) -> &'static str {
        match self {
            Provider::OpenAi => OPENAI_API_BASE,
            Provider::OpenRouter => OPENROUTER_API_BASE,
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => OPENAI_DEFAULT_MODEL,
            Provider::OpenRouter => OPENROUTER_DEFAULT_MODEL,
        }
    }
}

/// When the "want to know more?" line is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtaPolicy {
    Always,
    EveryNth(u64),
}

impl CtaPolicy {
    pub fn fires(&self, message_count: u64) -> bool {
        match self {
            CtaPolicy::Always => true,
            CtaPolicy::EveryNth(n) => message_count > 0 && message_count % n == 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub provider: Provider,
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub fallback_model: Option<String>,
    pub timeout: Duration,
}

/// Everything read from the environment at startup. Built once and
/// shared read-only with the request handlers.
#[derive(Debug, Clone)]
pub struct Config {
    pub model: ModelSettings,
    pub faq_path: PathBuf,
    pub knowledge_dirs: Vec<PathBuf>,
    pub static_dir: PathBuf,
    pub site_base_url: String,
    pub session_secret: String,
    pub session_ttl: Duration,
    pub host: String,
    pub port: u16,
    pub promo_month: Option<u32>,
    pub cta_policy: CtaPolicy,
    pub nudge_every: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Result<String, VarError>,
    {
        let var = |key: &'static str| -> Result<Option<String>, ConfigError> {
            match lookup(key) {
                Ok(value) if value.trim().is_empty() => Ok(None),
                Ok(value) => Ok(Some(value.trim().to_string())),
                Err(VarError::NotPresent) => Ok(None),
                Err(VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode(key)),
            }
        };

        let (provider, api_key) = if let Some(key) = var("OPENAI_API_KEY")? {
            (Provider::OpenAi, key)
        } else if let Some(key) = var("OPENROUTER_API_KEY")? {
            (Provider::OpenRouter, key)
        } else {
            return Err(ConfigError::MissingCredentials);
        };

        let timeout_raw = var("REQUEST_TIMEOUT_SECS")?;
        let timeout_secs = parse_number::<u64>("REQUEST_TIMEOUT_SECS", timeout_raw)?.unwrap_or(20);
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "REQUEST_TIMEOUT_SECS",
                value: timeout_secs.to_string(),
                reason: "must be at least one second",
            });
        }

        let model = ModelSettings {
            provider,
            api_base: var("API_BASE")?
                .unwrap_or_else(|| provider.default_base().to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: var("MODEL_ID")?.unwrap_or_else(|| provider.default_model().to_string()),
            fallback_model: var("FALLBACK_MODEL_ID")?,
            timeout: Duration::from_secs(timeout_secs),
        };

        let knowledge_dirs = var("KNOWLEDGE_DIRS")?
            .unwrap_or_else(|| "data,personnalisées".to_string())
            .split(',')
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .collect();

        let session_secret = match var("SESSION_SECRET")? {
            Some(secret) => secret,
            None => {
                warn!(
                    target: "config",
                    msg = "SESSION_SECRET not set; using the development default"
                );
                DEFAULT_SESSION_SECRET.to_string()
            }
        };

        let session_ttl = Duration::from_secs(
            parse_number::<u64>("SESSION_TTL_SECS", var("SESSION_TTL_SECS")?)?.unwrap_or(86_400),
        );

        let port = parse_number::<u16>("PORT", var("PORT")?)?.unwrap_or(5000);

        let promo_month = parse_promo_month(var("PROMO_MONTH")?)?;

        let cta_policy = match parse_number::<u64>("CTA_EVERY", var("CTA_EVERY")?)? {
            None | Some(0) | Some(1) => CtaPolicy::Always,
            Some(n) => CtaPolicy::EveryNth(n),
        };

        let nudge_every = parse_number::<u64>("NUDGE_EVERY", var("NUDGE_EVERY")?)?
            .unwrap_or(DEFAULT_NUDGE_EVERY);

        Ok(Self {
            model,
            faq_path: PathBuf::from(
                var("FAQ_PATH")?.unwrap_or_else(|| "data/faq_danse.json".to_string()),
            ),
            knowledge_dirs,
            static_dir: PathBuf::from(var("STATIC_DIR")?.unwrap_or_else(|| "static".to_string())),
            site_base_url: var("SITE_BASE_URL")?
                .unwrap_or_else(|| DEFAULT_SITE_BASE_URL.to_string()),
            session_secret,
            session_ttl,
            host: var("HOST")?.unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            promo_month,
            cta_policy,
            nudge_every,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|raw| {
            raw.parse::<T>().map_err(|_| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: "expected a non-negative integer",
            })
        })
        .transpose()
}

fn parse_promo_month(value: Option<String>) -> Result<Option<u32>, ConfigError> {
    let Some(raw) = value else {
        return Ok(Some(DEFAULT_PROMO_MONTH));
    };
    if raw.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    match raw.parse::<u32>() {
        Ok(0) => Ok(None),
        Ok(month @ 1..=12) => Ok(Some(month)),
        _ => Err(ConfigError::Invalid {
            key: "PROMO_MONTH",
            value: raw,
            reason: "expected a month between 1 and 12, 0 or off",
        }),
    }
}
