pub use crate::conf::{consts, Conf};
pub use anyhow::{anyhow, bail, Context, Result};
pub use db::Tx;
pub use log::{error, info, warn};
pub use misc::TxId;
pub use tokio_postgres::Client as DbClient;
