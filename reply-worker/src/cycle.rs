//! One poll-process-reply pass over the unreplied tx backlog.
//!
//! The cycle is strictly sequential: txs are replied to one at a time in
//! creation order, and the loop in main only schedules the next cycle after
//! this one returns, so no two replies are ever in flight at once.

use crate::ai::Ai;
use crate::compose;
use crate::prelude::*;
use crate::templates::Templates;
use async_trait::async_trait;
use rand::Rng;
use social::Delivery;

/// Where unreplied txs come from and where their outcomes are recorded.
///
/// Implemented by the live db client; tests substitute an in-memory fake.
#[async_trait]
pub trait Store {
    /// Up to [`consts::FETCH_UNREPLIED_TXS_BATCH`] eligible txs, oldest
    /// first.
    async fn fetch_eligible(&self) -> Result<Vec<Tx>>;

    async fn mark_replied(&self, id: TxId) -> Result<()>;

    /// A reason is given for unexpected faults only; clean delivery
    /// failures leave the previously recorded reason alone.
    async fn record_failure(
        &self,
        id: TxId,
        retry_count: i32,
        reason: Option<&str>,
    ) -> Result<()>;
}

#[async_trait]
pub trait Poster {
    async fn post_reply(
        &self,
        tweet_id: &str,
        text: &str,
    ) -> Result<Delivery>;
}

#[async_trait]
impl Store for DbClient {
    async fn fetch_eligible(&self) -> Result<Vec<Tx>> {
        db::select_unreplied_txs(self, consts::FETCH_UNREPLIED_TXS_BATCH)
            .await
    }

    async fn mark_replied(&self, id: TxId) -> Result<()> {
        db::mark_tx_replied(self, id).await
    }

    async fn record_failure(
        &self,
        id: TxId,
        retry_count: i32,
        reason: Option<&str>,
    ) -> Result<()> {
        db::record_tx_failure(self, id, retry_count, reason).await
    }
}

/// A worker booted without a refresh token still polls, it just cannot
/// deliver: every attempt counts as a clean failure until the auth flow is
/// run and the process restarted.
#[async_trait]
impl Poster for Option<social::Client> {
    async fn post_reply(
        &self,
        tweet_id: &str,
        text: &str,
    ) -> Result<Delivery> {
        match self {
            Some(client) => client.post_reply(tweet_id, text).await,
            None => {
                warn!("Posting client not initialized, skipping reply");
                Ok(Delivery::Failed)
            }
        }
    }
}

/// Fetches one batch of unreplied txs and replies to each in turn,
/// returning how many replies were delivered.
///
/// Errors only when the initial fetch fails. Everything that goes wrong
/// with a single tx is recorded on that tx and the loop moves on.
pub async fn run_one_cycle<R: Rng>(
    store: &impl Store,
    poster: &impl Poster,
    ai: Option<&Ai>,
    templates: &mut Templates<R>,
) -> Result<usize> {
    let txs = store.fetch_eligible().await?;

    if txs.is_empty() {
        info!("No unreplied tempo txs");
        return Ok(0);
    }

    info!("Found {} unreplied tempo txs", txs.len());

    let mut processed = 0;
    for tx in &txs {
        match reply_to_tx(store, poster, ai, templates, tx).await {
            Ok(true) => processed += 1,
            Ok(false) => (),
            Err(err) => {
                error!("Reply to tx {} failed: {}", tx.id, err);

                let retries = tx.retry_count.unwrap_or(0) + 1;
                let reason = err.to_string();
                if let Err(db_err) = store
                    .record_failure(tx.id, retries, Some(&reason))
                    .await
                {
                    error!(
                        "Cannot record failure for tx {}: {}",
                        tx.id, db_err
                    );
                }
            }
        }
    }

    Ok(processed)
}

/// Returns whether the reply was delivered.
///
/// A clean non-delivery (any [`Delivery`] but [`Delivery::Posted`]) bumps
/// the retry counter and returns false. Errors bubble up to
/// [`run_one_cycle`] which records them with a reason.
async fn reply_to_tx<R: Rng>(
    store: &impl Store,
    poster: &impl Poster,
    ai: Option<&Ai>,
    templates: &mut Templates<R>,
    tx: &Tx,
) -> Result<bool> {
    let tweet_id = match &tx.tweet_id {
        Some(tweet_id) => tweet_id,
        None => {
            // the fetch filter excludes these
            warn!("Tx {} has no target post, skipping", tx.id);
            return Ok(false);
        }
    };

    // the template composer is the guaranteed fallback whenever the AI
    // collaborator is absent or has no suggestion
    let suggestion = match ai {
        Some(ai) => ai.suggest_reply(tx).await,
        None => None,
    };
    let reply = match suggestion {
        Some(reply) => reply,
        None => compose::compose(templates, compose::epoch_millis(), tx),
    };

    if reply.is_empty() {
        warn!("No reply generated for tx {}", tx.id);
        return Ok(false);
    }

    match poster.post_reply(tweet_id, &reply).await? {
        Delivery::Posted => {
            store.mark_replied(tx.id).await?;
            info!("Replied to post {}", tweet_id);
            Ok(true)
        }
        delivery => {
            warn!(
                "Reply to post {} not delivered: {:?}",
                tweet_id, delivery
            );

            let retries = tx.retry_count.unwrap_or(0) + 1;
            store.record_failure(tx.id, retries, None).await?;
            Ok(false)
        }
    }
}
