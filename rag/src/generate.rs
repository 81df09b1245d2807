use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{RagError, Result};
use crate::http::HttpClient;

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
}

impl CompletionOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            model: cfg.chat_model.clone(),
            temperature: cfg.temperature,
        }
    }
}

/// A remote generation model: prompt in, raw text out. No retries here.
pub trait Completer: Send + Sync {
    fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Ollama `/api/generate`, non-streaming, constrained to JSON output.
pub struct OllamaCompleter {
    http: HttpClient,
    base_url: String,
}

impl OllamaCompleter {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(cfg: &Config, http: HttpClient) -> Self {
        Self::new(http, &cfg.ollama_url)
    }
}

impl Completer for OllamaCompleter {
    fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let req = GenerateRequest {
            model: &options.model,
            prompt,
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: options.temperature,
            },
        };
        let res = self
            .http
            .post_json::<GenerateResponse, _>(&url, &req)
            .map_err(|e| RagError::CompletionUnavailable(e.to_string()))?;
        res.response
            .ok_or_else(|| RagError::CompletionUnavailable("response field missing".to_string()))
    }
}
