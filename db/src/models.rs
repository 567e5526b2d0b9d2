use misc::TxId;

/// Row of the `monibot_transactions` table, reduced to the columns the
/// worker reads. Columns that are only filtered on (chain, status, replied,
/// created_at) are not mapped.
#[derive(Debug, Clone, Default)]
pub struct Tx {
    pub id: TxId,
    /// `"grant"` selects the grant template pool, anything else counts as a
    /// peer-to-peer transfer.
    pub kind: String,
    /// Decimal quantity as stored text, parsed at composition time.
    pub amount: Option<String>,
    pub recipient_pay_tag: Option<String>,
    pub tx_hash: Option<String>,
    /// The post to reply to. Rows without one are never selected.
    pub tweet_id: Option<String>,
    /// Bumped on every failed delivery, never reset. NULL counts as zero.
    pub retry_count: Option<i32>,
}
