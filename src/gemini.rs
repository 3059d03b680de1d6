use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;

const DEFAULT_GENERATE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";
const DEFAULT_MODEL: &str = "models/gemini-2.5-flash";

/// Anything that turns a prompt into generated text
#[allow(async_fn_in_trait)]
pub trait TextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Configuration for Gemini API
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub generate_url: String,
    pub model: String,
}

impl GeminiConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY").context("GEMINI_API_KEY not set")?;
        let generate_url =
            env::var("GEMINI_GENERATE_URL").unwrap_or_else(|_| DEFAULT_GENERATE_URL.to_string());
        let model = env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(GeminiConfig {
            api_key,
            generate_url,
            model,
        })
    }
}

/// Client for interacting with Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::new();
        GeminiClient { config, client }
    }

    /// Get the client configuration
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Generate text using the configured Gemini model
    pub async fn generate_text(
        &self,
        prompt: &str,
        temperature: f32,
        top_p: f32,
        top_k: i32,
        max_output_tokens: i32,
    ) -> Result<String> {
        let request = GenerateRequest {
            model: &self.config.model,
            contents: vec![Content::user(prompt)],
            generation_config: GenerationConfig {
                temperature,
                top_p,
                top_k,
                max_output_tokens,
            },
        };

        let url = format!("{}?key={}", self.config.generate_url, self.config.api_key);
        debug!(
            "Sending {} character prompt to {}",
            prompt.len(),
            self.config.model
        );

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "Gemini request failed: {} {}",
                status,
                error_text
            ));
        }

        let response_data: GenerateResponse = response.json().await?;
        response_data.into_text()
    }
}

impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_text(prompt, 0.2, 0.8, 40, 4096).await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    model: &'a str,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
    role: &'static str,
}

impl<'a> Content<'a> {
    fn user(text: &'a str) -> Self {
        Content {
            parts: vec![Part { text }],
            role: "user",
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Concatenate the text parts of the first candidate
    fn into_text(self) -> Result<String> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No response generated"))?;

        let text: String = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if text.is_empty() {
            return Err(anyhow::anyhow!("Gemini returned an empty candidate"));
        }

        Ok(text)
    }
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = GenerateRequest {
            model: DEFAULT_MODEL,
            contents: vec![Content::user("Summarize")],
            generation_config: GenerationConfig {
                temperature: 0.5,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 256,
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "Summarize");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 256);
        assert_eq!(value["generationConfig"]["topK"], 40);
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"parts": [{"text": "RISK LEVEL: "}, {"text": "HIGH"}], "role": "model"}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(response.into_text().unwrap(), "RISK LEVEL: HIGH");
    }

    #[test]
    fn test_response_without_candidates_is_an_error() {
        let response: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.into_text().is_err());

        let blocked: GenerateResponse =
            serde_json::from_value(json!({"candidates": [{"content": {}}]})).unwrap();
        assert!(blocked.into_text().is_err());
    }
}
