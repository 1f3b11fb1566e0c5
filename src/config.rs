use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub extraction_model: String,
    pub max_output_tokens: usize,
    pub prompt_char_limit: usize,
}

#[derive(Clone, Debug)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub ttl: Duration,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub ollama_base_url: String,
    pub fallback_response_path: Option<PathBuf>,
    pub max_upload_bytes: usize,
    pub models: ModelConfig,
    pub output: OutputConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            ollama_base_url: "http://127.0.0.1:11434".to_string(),
            fallback_response_path: None,
            max_upload_bytes: 25 * 1024 * 1024,
            models: ModelConfig {
                extraction_model: "qwen2.5:14b-instruct".to_string(),
                max_output_tokens: 1_500,
                prompt_char_limit: 4_000,
            },
            output: OutputConfig {
                dir: env::temp_dir().join("icf-output"),
                ttl: Duration::from_secs(3_600),
            },
        }
    }
}

impl AppConfig {
    /// Defaults overridden by whichever variables are set.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: env::var("ICF_BIND").unwrap_or(defaults.bind_addr),
            ollama_base_url: env::var("OLLAMA_BASE_URL").unwrap_or(defaults.ollama_base_url),
            fallback_response_path: env::var("FALLBACK_RESPONSE_PATH").ok().map(PathBuf::from),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            models: ModelConfig {
                extraction_model: env::var("EXTRACTION_MODEL")
                    .unwrap_or(defaults.models.extraction_model),
                max_output_tokens: parse_env(
                    "MAX_OUTPUT_TOKENS",
                    defaults.models.max_output_tokens,
                ),
                prompt_char_limit: parse_env(
                    "PROMPT_CHAR_LIMIT",
                    defaults.models.prompt_char_limit,
                ),
            },
            output: OutputConfig {
                dir: env::var("ICF_OUTPUT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.output.dir),
                ttl: env::var("ICF_OUTPUT_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.output.ttl),
            },
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:8000");
        assert_eq!(config.models.prompt_char_limit, 4_000);
        assert_eq!(config.output.ttl, Duration::from_secs(3_600));
        assert!(config.fallback_response_path.is_none());
    }
}
