//! Optional reply suggestions from the monibot-ai edge function.
//!
//! The worker never depends on this collaborator being healthy: a
//! transport error, a non-OK status or an empty suggestion all mean "no
//! suggestion" and the template composer takes over.

use crate::prelude::*;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Tighter than the posting API timeout, a slow suggestion is not worth
/// stalling the cycle for.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Ai {
    http: reqwest::Client,
    url: String,
    key: String,
}

#[derive(Deserialize)]
struct SuggestionResponse {
    reply: Option<String>,
}

impl Ai {
    pub fn new(url: String, key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Cannot build http client")?;

        Ok(Self { http, url, key })
    }

    /// [`None`] means no suggestion. This fn never errors.
    pub async fn suggest_reply(&self, tx: &Tx) -> Option<String> {
        let response = self
            .http
            .post(format!("{}/functions/v1/monibot-ai", self.url))
            .bearer_auth(&self.key)
            .json(&json!({
                "action": "generate-reply",
                "prompt": prompt_for(tx),
                "context": misc::CHAIN,
            }))
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }

        let data: SuggestionResponse = response.json().await.ok()?;
        data.reply.filter(|reply| !reply.is_empty())
    }
}

fn prompt_for(tx: &Tx) -> String {
    let kind = if tx.kind == "grant" {
        "grant"
    } else {
        "peer-to-peer transfer"
    };

    match &tx.amount {
        Some(amount) => format!(
            "Write a short upbeat reply confirming a {} of {} AlphaUSD \
            settled on the Tempo testnet",
            kind, amount
        ),
        None => format!(
            "Write a short upbeat reply confirming a {} settled on the \
            Tempo testnet",
            kind
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_mentions_the_kind_and_amount_in_the_prompt() {
        let tx = Tx {
            kind: "grant".to_string(),
            amount: Some("25".to_string()),
            ..Default::default()
        };

        let prompt = prompt_for(&tx);

        assert!(prompt.contains("grant"));
        assert!(prompt.contains("25 AlphaUSD"));
    }

    #[test]
    fn it_prompts_without_an_amount() {
        let tx = Tx {
            kind: "p2p".to_string(),
            ..Default::default()
        };

        let prompt = prompt_for(&tx);

        assert!(prompt.contains("peer-to-peer transfer"));
        assert!(!prompt.contains("AlphaUSD settled"));
    }
}
