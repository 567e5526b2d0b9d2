//! Contains various ubiquitously used constructs.

/// Primary key of a row in the `monibot_transactions` table.
pub type TxId = i64;

/// The only chain this worker replies for.
pub const CHAIN: &str = "tempo";

use anyhow::Result;
use futures::Future;
use tokio::time::{sleep, Duration};

pub async fn retry<T, F>(
    mut job: impl FnMut() -> F,
    max_retries: usize,
    mut wait_ms: u64,
    exponential_backoff_multiplier: u64,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    assert_ne!(max_retries, 0);
    assert_ne!(exponential_backoff_multiplier, 0);

    let mut retries = max_retries;
    loop {
        match job().await {
            Err(_) if retries > 0 => {
                retries -= 1;
                sleep(Duration::from_millis(wait_ms)).await;
                wait_ms *= exponential_backoff_multiplier;
            }
            res => return res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::Cell;

    #[tokio::test]
    async fn it_retries_until_job_succeeds() {
        let calls = Cell::new(0);

        let res = retry(
            || {
                calls.set(calls.get() + 1);
                let attempt = calls.get();
                async move {
                    if attempt < 3 {
                        Err(anyhow!("try again"))
                    } else {
                        Ok(attempt)
                    }
                }
            },
            3,
            1,
            1,
        )
        .await;

        assert_eq!(res.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn it_gives_up_after_max_retries() {
        let calls = Cell::new(0);

        let res: Result<()> = retry(
            || {
                calls.set(calls.get() + 1);
                async { Err(anyhow!("nope")) }
            },
            2,
            1,
            1,
        )
        .await;

        assert!(res.is_err());
        // initial attempt plus two retries
        assert_eq!(calls.get(), 3);
    }
}
