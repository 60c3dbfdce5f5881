use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default number of messages retained per chat.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 150;

/// File name used when only a storage directory is configured.
pub const BUFFER_FILE_NAME: &str = "tldr_bot_data.json";

const DEFAULT_OPENAI_MODEL: &str = "gpt-5";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash-latest";
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Which language model backend produces the summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Gemini,
}

impl LlmProvider {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" | "" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(format!("LLM_PROVIDER: unsupported provider '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_token: String,
    pub llm_provider: LlmProvider,
    pub openai_api_key: Option<String>,
    pub openai_org_id: Option<String>,
    pub openai_model: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub buffer_store_path: PathBuf,
    pub max_buffer_size: usize,
    pub summarizer_timeout: Option<Duration>,
    pub poll_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let llm_provider = LlmProvider::parse(&env::var("LLM_PROVIDER").unwrap_or_default())?;

        let openai_api_key = env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = env::var("GEMINI_API_KEY").ok();
        match llm_provider {
            LlmProvider::OpenAi if openai_api_key.is_none() => {
                return Err("OPENAI_API_KEY: must be set when LLM_PROVIDER=openai".to_string());
            }
            LlmProvider::Gemini if gemini_api_key.is_none() => {
                return Err("GEMINI_API_KEY: must be set when LLM_PROVIDER=gemini".to_string());
            }
            _ => {}
        }

        Ok(Self {
            telegram_token: env::var("TELEGRAM_TOKEN")
                .map_err(|e| format!("TELEGRAM_TOKEN: {}", e))?,
            llm_provider,
            openai_api_key,
            openai_org_id: env::var("OPENAI_ORG_ID").ok(),
            openai_model: env::var("OPENAI_MODEL").ok(),
            gemini_api_key,
            gemini_model: env::var("GEMINI_MODEL").ok(),
            buffer_store_path: resolve_store_path(
                env::var("BUFFER_STORE_PATH").ok(),
                env::var("RENDER_DISK_MOUNT_PATH").ok(),
            ),
            max_buffer_size: parse_max_buffer_size(env::var("MAX_BUFFER_SIZE").ok().as_deref())?,
            summarizer_timeout: parse_timeout(env::var("SUMMARIZER_TIMEOUT_SECS").ok().as_deref())?,
            poll_timeout_secs: env::var("POLL_TIMEOUT_SECS")
                .ok()
                .map(|v| {
                    v.parse::<u64>()
                        .map_err(|e| format!("POLL_TIMEOUT_SECS: {}", e))
                })
                .transpose()?
                .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
        })
    }

    #[must_use]
    pub fn openai_model(&self) -> String {
        self.openai_model
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string())
    }

    #[must_use]
    pub fn gemini_model(&self) -> String {
        self.gemini_model
            .clone()
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string())
    }
}

/// An explicit file path wins; otherwise the file lives in the mounted disk
/// directory, or the working directory when nothing is mounted.
#[must_use]
pub fn resolve_store_path(explicit: Option<String>, mount_dir: Option<String>) -> PathBuf {
    if let Some(path) = explicit.filter(|p| !p.trim().is_empty()) {
        return PathBuf::from(path);
    }
    let dir = mount_dir
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| ".".to_string());
    PathBuf::from(dir).join(BUFFER_FILE_NAME)
}

pub fn parse_max_buffer_size(raw: Option<&str>) -> Result<usize, String> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_MAX_BUFFER_SIZE);
    };
    let size = raw
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("MAX_BUFFER_SIZE: {}", e))?;
    if size == 0 {
        return Err("MAX_BUFFER_SIZE: must be at least 1".to_string());
    }
    Ok(size)
}

pub fn parse_timeout(raw: Option<&str>) -> Result<Option<Duration>, String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(secs) => {
            let secs = secs
                .parse::<u64>()
                .map_err(|e| format!("SUMMARIZER_TIMEOUT_SECS: {}", e))?;
            Ok((secs > 0).then(|| Duration::from_secs(secs)))
        }
    }
}
