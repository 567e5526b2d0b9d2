use crate::prelude::*;
use std::{env, net::SocketAddr};
use tokio::time::Duration;

pub mod consts {
    /// At most this many unreplied txs are fetched and replied to in one
    /// cycle. The posting API is rate limited, small batches keep a cycle
    /// short.
    pub const FETCH_UNREPLIED_TXS_BATCH: usize = 5;

    /// Settings table key under which the posting API refresh token lives.
    pub const REFRESH_TOKEN_SETTING: &str = "twitter_oauth2_refresh_token";

    pub mod defaults {
        use tokio::time::Duration;

        pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

        /// The process exits cleanly after this long and lets the
        /// supervisor respawn it.
        pub const RESTART_AFTER: Duration = Duration::from_secs(90 * 60);
    }
}

#[derive(Clone, Debug)]
pub struct Conf {
    /// e.g. `"host=localhost user=postgres"`, see
    /// [`tokio_postgres::config::Config`] on the specific format
    pub db_conn_conf: String,
    /// OAuth2 app credentials for the posting API. The refresh token is not
    /// an env var, it rotates through the settings table.
    pub twitter_client_id: String,
    pub twitter_client_secret: String,
    /// Base url of the AI edge function. Replies fall back to templates
    /// when unset.
    pub ai_url: Option<String>,
    pub ai_key: Option<String>,
    pub poll_interval: Duration,
    pub restart_after: Duration,
    /// What's the address that the http health server should bound to.
    /// Defaults to "127.0.0.1:3003"
    pub http_addr: SocketAddr,
}

impl Conf {
    pub fn from_env() -> Result<Self> {
        let db_conn_conf = env::var("DB_CONN_CONF").context("Db conn conf")?;

        let twitter_client_id =
            env::var("TWITTER_CLIENT_ID").context("Twitter client id")?;
        let twitter_client_secret = env::var("TWITTER_CLIENT_SECRET")
            .context("Twitter client secret")?;

        let ai_url = env::var("AI_URL").ok();
        let ai_key = env::var("AI_KEY").ok();

        let poll_interval = env::var("POLL_INTERVAL_MS")
            .ok()
            .map(|s| s.parse::<u64>())
            .transpose()
            .context("Poll interval")?
            .map(Duration::from_millis)
            .unwrap_or(consts::defaults::POLL_INTERVAL);
        info!("Poll interval: {:?}", poll_interval);

        let restart_after = env::var("RESTART_AFTER_MINS")
            .ok()
            .map(|s| s.parse::<u64>())
            .transpose()
            .context("Restart after")?
            .map(|mins| Duration::from_secs(mins * 60))
            .unwrap_or(consts::defaults::RESTART_AFTER);

        let http_addr = env::var("HTTP_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3003".to_string())
            .parse()
            .context("Invalid http addr")?;

        Ok(Self {
            db_conn_conf,
            twitter_client_id,
            twitter_client_secret,
            ai_url,
            ai_key,
            poll_interval,
            restart_after,
            http_addr,
        })
    }

    pub async fn db(&self) -> Result<DbClient> {
        db::connect(&self.db_conn_conf).await
    }
}
