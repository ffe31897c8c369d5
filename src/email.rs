//! Transactional email client.
//!
//! Fire-and-forget delivery over a Resend-compatible HTTP API, used by the
//! help-form endpoint to forward submissions to the support inbox. Selected
//! by `[email].provider`; `"disabled"` makes every send fail, which the
//! router surfaces as a 500.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::EmailConfig;

/// Send one plain-text email. Single-shot, no retry.
pub async fn send(
    config: &EmailConfig,
    subject: &str,
    text: &str,
    reply_to: Option<&str>,
) -> Result<()> {
    match config.provider.as_str() {
        "resend" => send_resend(config, subject, text, reply_to).await,
        "disabled" => bail!("Email provider is disabled"),
        other => bail!("Unknown email provider: {}", other),
    }
}

async fn send_resend(
    config: &EmailConfig,
    subject: &str,
    text: &str,
    reply_to: Option<&str>,
) -> Result<()> {
    let api_key =
        std::env::var("RESEND_API_KEY").map_err(|_| anyhow::anyhow!("RESEND_API_KEY not set"))?;

    let from = config
        .from
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("email.from required"))?;
    let to = config
        .to
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("email.to required"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let mut body = serde_json::json!({
        "from": from,
        "to": to,
        "subject": subject,
        "text": text,
    });
    if let Some(addr) = reply_to {
        body["reply_to"] = serde_json::Value::String(addr.to_string());
    }

    let response = client
        .post(format!("{}/emails", config.base_url.trim_end_matches('/')))
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Email API error {}: {}", status, body_text);
    }

    Ok(())
}
