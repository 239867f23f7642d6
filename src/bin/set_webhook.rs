//! One-shot webhook registration.
//!
//! Reads `BOT_TOKEN` and the public base URL (`PUBLIC_URL`, falling back to
//! `RENDER_EXTERNAL_URL`) and points Telegram's webhook at
//! `<base><WEBHOOK_PATH>`. With `--delete`: removes the webhook instead.

use anyhow::{Context, Result};
use serde_json::Value;

const API_BASE: &str = "https://api.telegram.org";

/// Join the public base URL and the webhook path without doubling slashes.
fn webhook_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn method_url(token: &str, method: &str) -> String {
    format!("{API_BASE}/bot{token}/{method}")
}

fn required_env(names: &[&str]) -> Result<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
        .with_context(|| format!("{} not set", names.join(" / ")))
}

async fn call(client: &reqwest::Client, url: &str, params: &[(&str, String)]) -> Result<Value> {
    let response = client
        .get(url)
        .query(params)
        .send()
        .await
        .context("Failed to reach Telegram")?;

    let status = response.status();
    let body: Value = response
        .json()
        .await
        .context("Failed to parse Telegram response")?;

    if !status.is_success() || body.get("ok") != Some(&Value::Bool(true)) {
        anyhow::bail!("Telegram API error ({}): {}", status, body);
    }
    Ok(body)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let token = required_env(&["BOT_TOKEN"])?;
    let client = reqwest::Client::new();

    if std::env::args().any(|a| a == "--delete") {
        let body = call(&client, &method_url(&token, "deleteWebhook"), &[]).await?;
        println!("Webhook removed: {body}");
        return Ok(());
    }

    let base = required_env(&["PUBLIC_URL", "RENDER_EXTERNAL_URL"])?;
    let path = std::env::var("WEBHOOK_PATH").unwrap_or_else(|_| "/webhook".to_string());
    let url = webhook_url(&base, &path);

    let mut params = vec![("url", url.clone())];
    if let Ok(secret) = std::env::var("WEBHOOK_SECRET") {
        params.push(("secret_token", secret));
    }

    println!("Setting webhook: {url}");
    let body = call(&client, &method_url(&token, "setWebhook"), &params).await?;
    println!("Response: {body}");

    Ok(())
}
