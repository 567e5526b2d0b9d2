//! Wraps around database queries.
//!
//! The tables are owned by the wider monibot deployment; this crate only
//! selects unreplied txs and writes back per-tx outcomes plus the posting
//! API refresh token.

mod models;

pub use models::Tx;

use anyhow::{Context, Result};
use itertools::Itertools;
use log::error;
use misc::TxId;
use tokio_postgres::{Client as DbClient, Row};

/// See the documentation for [`tokio_postgres::connect`] for details.
pub async fn connect(conn_conf: &str) -> Result<DbClient> {
    let tls = tokio_postgres::NoTls;
    let (client, conn) = tokio_postgres::connect(conn_conf, tls).await?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            error!("db connection error: {}", e);
        }
    });

    Ok(client)
}

/// Completed txs on the tempo chain which have a target post and no reply
/// yet, oldest first. Rows which a past run marked as replied are never
/// returned again.
pub async fn select_unreplied_txs(
    db: &DbClient,
    limit: usize,
) -> Result<Vec<Tx>> {
    let query = select_unreplied_txs_query(limit);

    let rows = db
        .query(&query, &[&misc::CHAIN])
        .await
        .context("Cannot select unreplied txs")?;

    rows.into_iter().map(tx_from_row).collect()
}

fn select_unreplied_txs_query(limit: usize) -> String {
    format!(
        "SELECT
            id, type, amount, recipient_pay_tag, tx_hash, tweet_id, retry_count
        FROM
            monibot_transactions
        WHERE
            chain = $1
            AND status = 'completed'
            AND replied = false
            AND tweet_id IS NOT NULL
        ORDER BY
            created_at
        ASC LIMIT {}",
        limit
    )
}

fn tx_from_row(row: Row) -> Result<Tx> {
    Ok(Tx {
        id: row.try_get("id").context("Cannot read column 'id' on tx")?,
        kind: row
            .try_get("type")
            .context("Cannot read column 'type' on tx")?,
        amount: row
            .try_get("amount")
            .context("Cannot read column 'amount' on tx")?,
        recipient_pay_tag: row
            .try_get("recipient_pay_tag")
            .context("Cannot read column 'recipient_pay_tag' on tx")?,
        tx_hash: row
            .try_get("tx_hash")
            .context("Cannot read column 'tx_hash' on tx")?,
        tweet_id: row
            .try_get("tweet_id")
            .context("Cannot read column 'tweet_id' on tx")?,
        retry_count: row
            .try_get("retry_count")
            .context("Cannot read column 'retry_count' on tx")?,
    })
}

/// The one-way transition: once replied is set the tx falls out of
/// [`select_unreplied_txs`] for good.
pub async fn mark_tx_replied(db: &DbClient, id: TxId) -> Result<()> {
    db.execute(
        "UPDATE monibot_transactions SET replied = true WHERE id = $1",
        &[&id],
    )
    .await
    .with_context(|| format!("Cannot mark tx {} as replied", id))?;

    Ok(())
}

/// Writes the bumped retry counter and, for unexpected faults, the reason.
/// Clean delivery failures pass [`None`] and leave any previous reason in
/// place.
pub async fn record_tx_failure(
    db: &DbClient,
    id: TxId,
    retry_count: i32,
    error_reason: Option<&str>,
) -> Result<()> {
    let query = record_tx_failure_query(error_reason.is_some());

    let execute = match error_reason {
        Some(reason) => {
            db.execute(&query, &[&retry_count, &reason, &id]).await
        }
        None => db.execute(&query, &[&retry_count, &id]).await,
    };

    execute.with_context(|| {
        format!("Cannot record failed reply for tx {}", id)
    })?;

    Ok(())
}

fn record_tx_failure_query(with_reason: bool) -> String {
    let mut assignments = vec!["retry_count = $1"];
    if with_reason {
        assignments.push("error_reason = $2");
    }

    format!(
        "UPDATE monibot_transactions SET {} WHERE id = ${}",
        assignments.iter().join(", "),
        assignments.len() + 1,
    )
}

pub async fn select_setting(
    db: &DbClient,
    key: &str,
) -> Result<Option<String>> {
    let rows = db
        .query("SELECT value FROM bot_settings WHERE key = $1", &[&key])
        .await
        .with_context(|| format!("Cannot select setting '{}'", key))?;

    rows.first()
        .map(|row| {
            row.try_get("value")
                .context("Cannot read column 'value' on setting")
        })
        .transpose()
}

pub async fn upsert_setting(
    db: &DbClient,
    key: &str,
    value: &str,
) -> Result<()> {
    db.execute(
        "INSERT INTO bot_settings (key, value) VALUES ($1, $2)
        ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        &[&key, &value],
    )
    .await
    .with_context(|| format!("Cannot upsert setting '{}'", key))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_builds_select_unreplied_txs_query() {
        let query = select_unreplied_txs_query(5);

        // each filter of the eligibility invariant must be present
        assert!(query.contains("chain = $1"));
        assert!(query.contains("status = 'completed'"));
        assert!(query.contains("replied = false"));
        assert!(query.contains("tweet_id IS NOT NULL"));
        assert!(query.contains("ORDER BY\n            created_at"));
        assert!(query.ends_with("ASC LIMIT 5"));
    }

    #[test]
    fn it_builds_record_tx_failure_query() {
        assert_eq!(
            &record_tx_failure_query(false),
            "UPDATE monibot_transactions SET retry_count = $1 WHERE id = $2",
        );

        assert_eq!(
            &record_tx_failure_query(true),
            "UPDATE monibot_transactions SET retry_count = $1, \
            error_reason = $2 WHERE id = $3",
        );
    }
}
