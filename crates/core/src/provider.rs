use crate::error::{Result, ShortsmithError};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Provider {
    #[default]
    OpenRouter,
    Openai,
    Grok,
    Gemini,
}

pub struct ProviderConfig {
    pub api_url: &'static str,
    /// Environment variable that may replace `api_url`
    pub url_env_var: Option<&'static str>,
    pub model: &'static str,
    pub env_var: &'static str,
}

impl Provider {
    pub fn config(&self) -> ProviderConfig {
        match self {
            Provider::OpenRouter => ProviderConfig {
                api_url: "https://openrouter.ai/api/v1/chat/completions",
                url_env_var: Some("MODEL_BASE_URL"),
                model: "tngtech/deepseek-r1t2-chimera:free",
                env_var: "OPENROUTER_API",
            },
            Provider::Openai => ProviderConfig {
                api_url: "https://api.openai.com/v1/chat/completions",
                url_env_var: None,
                model: "gpt-5.1",
                env_var: "OPENAI_API_KEY",
            },
            Provider::Grok => ProviderConfig {
                api_url: "https://api.x.ai/v1/chat/completions",
                url_env_var: None,
                model: "grok-4-fast",
                env_var: "XAI_API_KEY",
            },
            Provider::Gemini => ProviderConfig {
                api_url: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
                url_env_var: None,
                model: "gemini-3-pro",
                env_var: "GEMINI_API_KEY",
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "OpenRouter",
            Provider::Openai => "OpenAI",
            Provider::Grok => "Grok",
            Provider::Gemini => "Gemini",
        }
    }
}

/// Values supplied on the command line; each one wins over the preset.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
}

/// Everything the generation client needs, resolved once at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    /// Ask the service for a bare JSON object (`response_format`)
    pub json_response: bool,
}

pub const DEFAULT_TEMPERATURE: f32 = 1.0;

impl GenerationConfig {
    /// Resolve from the process environment
    pub fn resolve(provider: &Provider, overrides: ConfigOverrides) -> Result<Self> {
        Self::resolve_with(provider, overrides, |var| std::env::var(var).ok())
    }

    pub fn resolve_with<F>(provider: &Provider, overrides: ConfigOverrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let preset = provider.config();
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let endpoint = non_empty(overrides.endpoint)
            .or_else(|| non_empty(preset.url_env_var.and_then(&env)))
            .unwrap_or_else(|| preset.api_url.to_string());

        let api_key = non_empty(overrides.api_key)
            .or_else(|| non_empty(env(preset.env_var)))
            .ok_or_else(|| ShortsmithError::MissingConfig {
                env_var: preset.env_var.to_string(),
            })?;

        let model = non_empty(overrides.model).unwrap_or_else(|| preset.model.to_string());

        Ok(Self {
            endpoint,
            api_key,
            model,
            temperature: overrides.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            json_response: true,
        })
    }
}
