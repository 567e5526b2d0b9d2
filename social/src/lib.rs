//! Client for the social posting API (Twitter API v2).
//!
//! Authenticated with OAuth 2.0: the worker holds no long-lived credential,
//! it exchanges a stored refresh token for a fresh access/refresh pair at
//! boot. The rotated refresh token must be persisted by the caller as the
//! old one is single-use.

use anyhow::{bail, Context, Result};
use log::{error, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_URL: &str = "https://api.twitter.com";

/// The posting API is rate limited anyway, a hung call should not block the
/// poll loop for longer than this.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one reply attempt.
///
/// API-level non-success is a value here, not an error. [`Err`] is reserved
/// for transport faults: the caller records those with a reason while these
/// only bump the retry counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Posted,
    /// The API refused the reply outright, e.g. the target post is
    /// protected or deleted.
    Forbidden,
    /// Transient, the tx is picked up again on a later cycle.
    RateLimited,
    Failed,
}

pub struct Client {
    http: reqwest::Client,
    access_token: String,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    refresh_token: &'a str,
    client_id: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Serialize)]
struct ReplyRequest<'a> {
    text: &'a str,
    reply: ReplyTarget<'a>,
}

#[derive(Serialize)]
struct ReplyTarget<'a> {
    in_reply_to_tweet_id: &'a str,
}

impl Client {
    /// Exchanges the refresh token for a fresh access/refresh pair and
    /// returns the authenticated client plus the rotated refresh token.
    ///
    /// Each attempt is retried a few times with an exponential back-off
    /// before returning an error.
    pub async fn oauth2(
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<(Self, String)> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Cannot build http client")?;

        // 1st retry after 10ms
        // 2nd retry after 100ms
        // 3rd retry after 1s
        let token = misc::retry(
            || {
                exchange_refresh_token(
                    &http,
                    client_id,
                    client_secret,
                    refresh_token,
                )
            },
            3,
            10,
            10,
        )
        .await?;

        Ok((
            Self {
                http,
                access_token: token.access_token,
            },
            token.refresh_token,
        ))
    }

    /// Posts `text` as a reply to the given post.
    ///
    /// API-level failure maps to a [`Delivery`] variant and is logged here;
    /// only transport faults surface as errors.
    pub async fn post_reply(
        &self,
        tweet_id: &str,
        text: &str,
    ) -> Result<Delivery> {
        let response = self
            .http
            .post(format!("{}/2/tweets", API_URL))
            .bearer_auth(&self.access_token)
            .json(&ReplyRequest {
                text,
                reply: ReplyTarget {
                    in_reply_to_tweet_id: tweet_id,
                },
            })
            .send()
            .await
            .with_context(|| {
                format!("Cannot reach the posting API for post {}", tweet_id)
            })?;

        let status = response.status();
        let delivery = delivery_from_status(status);
        match delivery {
            Delivery::Posted => (),
            Delivery::Forbidden => {
                let body = response.text().await.unwrap_or_default();
                error!("403 Forbidden replying to {}: {}", tweet_id, body);
            }
            Delivery::RateLimited => {
                warn!("Rate limited, will retry next cycle");
            }
            Delivery::Failed => {
                let body = response.text().await.unwrap_or_default();
                error!("Reply to {} failed with {}: {}", tweet_id, status, body);
            }
        }

        Ok(delivery)
    }
}

async fn exchange_refresh_token(
    http: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<TokenResponse> {
    let response = http
        .post(format!("{}/2/oauth2/token", API_URL))
        .basic_auth(client_id, Some(client_secret))
        .form(&TokenRequest {
            grant_type: "refresh_token",
            refresh_token,
            client_id,
        })
        .send()
        .await
        .context("Cannot reach the token endpoint")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Token exchange failed with {}: {}", status, body);
    }

    response.json().await.context("Malformed token response")
}

fn delivery_from_status(status: StatusCode) -> Delivery {
    if status.is_success() {
        Delivery::Posted
    } else if status == StatusCode::FORBIDDEN {
        Delivery::Forbidden
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Delivery::RateLimited
    } else {
        Delivery::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_maps_status_to_delivery() {
        assert_eq!(delivery_from_status(StatusCode::OK), Delivery::Posted);
        assert_eq!(
            delivery_from_status(StatusCode::CREATED),
            Delivery::Posted
        );
        assert_eq!(
            delivery_from_status(StatusCode::FORBIDDEN),
            Delivery::Forbidden
        );
        assert_eq!(
            delivery_from_status(StatusCode::TOO_MANY_REQUESTS),
            Delivery::RateLimited
        );
        assert_eq!(
            delivery_from_status(StatusCode::BAD_REQUEST),
            Delivery::Failed
        );
        assert_eq!(
            delivery_from_status(StatusCode::INTERNAL_SERVER_ERROR),
            Delivery::Failed
        );
    }

    #[test]
    fn it_builds_reply_request_body() {
        let body = ReplyRequest {
            text: "Sent on Tempo",
            reply: ReplyTarget {
                in_reply_to_tweet_id: "1234567890",
            },
        };

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "text": "Sent on Tempo",
                "reply": { "in_reply_to_tweet_id": "1234567890" },
            }),
        );
    }

    #[test]
    fn it_builds_token_request_params() {
        let body = TokenRequest {
            grant_type: "refresh_token",
            refresh_token: "old-token",
            client_id: "client",
        };

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "grant_type": "refresh_token",
                "refresh_token": "old-token",
                "client_id": "client",
            }),
        );
    }
}
