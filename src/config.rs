use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub served_models: Vec<String>,
    pub engine: EngineConfig,
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
    #[serde(default)]
    pub sampling: SamplingDefaults,
    #[serde(default)]
    pub images: ImageSettings,
    #[serde(default)]
    pub react: ReactSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub api_base: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenizerConfig {
    #[serde(default)]
    pub path: Option<String>,
}

/// Used for any sampling field the request leaves out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingDefaults {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub repetition_penalty: f64,
}

impl Default for SamplingDefaults {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_p: 0.8,
            max_tokens: 1024,
            repetition_penalty: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiImagePolicy {
    /// Keep only the most recently supplied image.
    #[default]
    LastOnly,
    All,
    RejectMulti,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub multi_image_policy: MultiImagePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactSettings {
    /// Always use the ReAct reformatter, not only for requests carrying function messages.
    pub enabled: bool,
    pub default_system_prompt: String,
    /// Boilerplate stripped from assistant turns that go on to call a tool.
    pub dummy_thoughts: Vec<String>,
}

impl Default for ReactSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            default_system_prompt: "You are a helpful assistant.".to_string(),
            dummy_thoughts: vec![
                "\nThought: I now know the final answer.\nFinal answer: ".to_string(),
                "\nThought: 我会作答了。\nFinal answer: ".to_string(),
            ],
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Model ids advertised on `/v1/models`; falls back to the engine model.
    pub fn served_models(&self) -> Vec<String> {
        if self.served_models.is_empty() {
            vec![self.engine.model.clone()]
        } else {
            self.served_models.clone()
        }
    }
}
