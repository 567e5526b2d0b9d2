mod ai;
mod compose;
mod conf;
mod cycle;
mod http;
mod prelude;
mod templates;

use crate::ai::Ai;
use crate::http::StatusReport;
use crate::prelude::*;
use crate::templates::Templates;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{sleep, sleep_until, Instant};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    env_logger::init(); // set up with env RUST_LOG

    let conf = Conf::from_env().context("Cannot read env vars")?;

    let db = conf.db().await?;
    let poster = boot_poster(&conf, &db).await;
    let ai = boot_ai(&conf)?;

    let mut templates = Templates::new(SmallRng::from_entropy());

    let status = Arc::new(StatusReport::default());
    tokio::spawn(http::start(conf.clone(), Arc::clone(&status)));

    info!("Tempo reply worker is live");

    let restart_at = Instant::now() + conf.restart_after;
    let mut sigterm = signal(SignalKind::terminate())
        .context("Cannot install SIGTERM handler")?;

    loop {
        let o = Ordering::SeqCst;
        status.cycle_count.fetch_add(1, o);
        status.last_poll_epoch_s.store(compose::epoch_millis() / 1000, o);

        match cycle::run_one_cycle(&db, &poster, ai.as_ref(), &mut templates)
            .await
        {
            Ok(processed) => {
                status.processed_count.fetch_add(processed as u64, o);
            }
            Err(err) => {
                // a fetch fault aborts the cycle, never the process
                error!("Poll cycle failed: {}", err);
                status.error_count.fetch_add(1, o);
            }
        }

        tokio::select! {
            _ = sleep(conf.poll_interval) => (),
            _ = sleep_until(restart_at) => {
                info!(
                    "Auto-restart uptime reached after {} cycles, exiting \
                    for a clean respawn",
                    status.cycle_count.load(o),
                );
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("SIGINT received, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Exchanges the refresh token stored in the settings table for a fresh
/// client and persists the rotated token.
///
/// A missing token or a failed exchange is not fatal: the worker comes up
/// without a posting client and every delivery attempt counts as a clean
/// failure until the auth flow is re-run.
async fn boot_poster(conf: &Conf, db: &DbClient) -> Option<social::Client> {
    let refresh_token = match db::select_setting(
        db,
        consts::REFRESH_TOKEN_SETTING,
    )
    .await
    {
        Ok(Some(token)) => token,
        Ok(None) => {
            warn!("No OAuth2 refresh token in settings");
            warn!("Run the auth flow to store a refresh token first");
            return None;
        }
        Err(err) => {
            warn!("Cannot read the stored refresh token: {}", err);
            return None;
        }
    };

    match social::Client::oauth2(
        &conf.twitter_client_id,
        &conf.twitter_client_secret,
        &refresh_token,
    )
    .await
    {
        Ok((client, rotated_token)) => {
            // the old token is single-use, losing the rotated one here
            // means re-running the auth flow after the next restart
            if let Err(err) = db::upsert_setting(
                db,
                consts::REFRESH_TOKEN_SETTING,
                &rotated_token,
            )
            .await
            {
                warn!("Cannot store the rotated refresh token: {}", err);
            }

            info!("Posting client initialized, token refreshed");
            Some(client)
        }
        Err(err) => {
            warn!("Posting client init failed: {}", err);
            None
        }
    }
}

fn boot_ai(conf: &Conf) -> Result<Option<Ai>> {
    match (&conf.ai_url, &conf.ai_key) {
        (Some(url), Some(key)) => {
            info!("AI reply suggestions enabled");
            Ok(Some(Ai::new(url.clone(), key.clone())?))
        }
        _ => {
            info!("AI not configured - using template replies only");
            Ok(None)
        }
    }
}
