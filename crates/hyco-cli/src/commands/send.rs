//! `hyco send`: relayed HTTP requests.

use anyhow::{Context, Result};
use tracing::warn;

use hyco_client::HttpSender;
use hyco_core::RelayEndpoint;

const DEFAULT_POST_BODY: &str = r#"{"message":"hello"}"#;

/// Send one request with `method`, or a GET followed by a POST.
pub async fn run(endpoint: RelayEndpoint, method: Option<&str>, body: Option<&str>) -> Result<()> {
    let sender = HttpSender::new(endpoint).context("failed to create HTTP sender")?;

    if let Some(method) = method {
        return send_one(&sender, method, body).await;
    }

    let get = send_one(&sender, "GET", None).await;
    if let Err(e) = &get {
        warn!("{e:#}");
    }
    let post = send_one(&sender, "POST", Some(body.unwrap_or(DEFAULT_POST_BODY))).await;
    get.and(post)
}

async fn send_one(sender: &HttpSender, method: &str, body: Option<&str>) -> Result<()> {
    let response = sender
        .send(method, body)
        .await
        .with_context(|| format!("{method} on {} failed", sender.uri()))?;
    println!("{}", String::from_utf8_lossy(&response));
    Ok(())
}
