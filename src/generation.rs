//! Text-generation client.
//!
//! Speaks the OpenAI chat-completions wire format against the configured
//! `base_url`, which covers OpenAI itself plus the many local and hosted
//! servers that mirror the API. Single-shot like every other upstream call:
//! a transport or API failure aborts the request, while a 200 response with
//! missing or null content comes back as an empty string so the response
//! assembler can substitute its fallback message.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::GenerationConfig;

/// Run one completion for a single-user-message prompt.
///
/// # Errors
///
/// - `"disabled"` provider: always returns an error.
/// - `"openai"` provider: returns an error if the API key is missing or the
///   API responds with a non-success status.
pub async fn generate(config: &GenerationConfig, prompt: &str) -> Result<String> {
    match config.provider.as_str() {
        "openai" => generate_openai(config, prompt).await,
        "disabled" => bail!("Generation provider is disabled"),
        other => bail!("Unknown generation provider: {}", other),
    }
}

async fn generate_openai(config: &GenerationConfig, prompt: &str) -> Result<String> {
    let api_key =
        std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

    let model = config
        .model
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("generation.model required"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": model,
        "messages": [{ "role": "user", "content": prompt }],
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
    });

    let response = client
        .post(format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        ))
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Generation API error {}: {}", status, body_text);
    }

    let json: serde_json::Value = response.json().await?;
    Ok(extract_completion(&json))
}

/// Pull `choices[0].message.content` out of a chat-completions response,
/// degrading to empty on null or missing content.
fn extract_completion(json: &serde_json::Value) -> String {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string()
}
