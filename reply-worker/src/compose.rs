//! Builds the reply text for one tx.

use crate::prelude::*;
use crate::templates::{Category, Templates};
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Linked from replies when the tx hash points at a real explorer entry.
const EXPLORER_URL: &str = "https://explore.tempo.xyz";

/// Placeholder hashes written by the transfer pipeline when a tx never
/// reached the chain. No explorer link for those.
const NO_EXPLORER_PREFIXES: &[&str] = &["skip_", "failed_"];

/// Builds the reply for one tx: a template base plus amount, recipient tag
/// and explorer link when known, plus a short suffix which makes every
/// reply unique.
///
/// Never fails. A tx with malformed data degrades to an error-pool
/// template so the cycle still has something to post.
pub fn compose<R: Rng>(
    templates: &mut Templates<R>,
    now_ms: u64,
    tx: &Tx,
) -> String {
    match try_compose(templates, now_ms, tx) {
        Ok(reply) => reply,
        Err(err) => {
            warn!("Reply generation for tx {} failed: {}", tx.id, err);
            templates.select(Category::Error)
        }
    }
}

fn try_compose<R: Rng>(
    templates: &mut Templates<R>,
    now_ms: u64,
    tx: &Tx,
) -> Result<String> {
    let mut reply = templates.select(Category::of_tx_kind(&tx.kind));

    if let Some(amount) = &tx.amount {
        let amount: f64 = amount
            .parse()
            .with_context(|| format!("Malformed amount '{}'", amount))?;
        reply.push_str(&format!(" (${:.2} αUSD)", amount));
    }

    if let Some(tag) = &tx.recipient_pay_tag {
        reply.push_str(&format!(". monitag: {}", tag));
    }

    match &tx.tx_hash {
        Some(hash) if has_explorer_entry(hash) => {
            reply.push_str(&format!("\n🔗 {}/tx/{}", EXPLORER_URL, hash));
        }
        _ => (),
    }

    // the posting API rejects duplicate posts, the suffix keeps repeated
    // templates byte-distinct
    reply.push_str(&format!(" ⚡{}", uniqueness_suffix(now_ms)));

    Ok(reply)
}

pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

fn has_explorer_entry(hash: &str) -> bool {
    !NO_EXPLORER_PREFIXES
        .iter()
        .any(|prefix| hash.starts_with(prefix))
}

/// Last four base-36 digits of the millisecond clock.
fn uniqueness_suffix(now_ms: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let mut n = now_ms;
    let mut encoded = Vec::new();
    loop {
        encoded.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    encoded.reverse();

    let tail = encoded.len().saturating_sub(4);
    encoded[tail..].iter().map(|b| *b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{ERROR_TEMPLATES, GRANT_TEMPLATES, P2P_TEMPLATES};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    const NOW_MS: u64 = 1_660_000_000_000;

    fn templates() -> Templates<SmallRng> {
        Templates::new(SmallRng::seed_from_u64(7))
    }

    fn p2p_tx() -> Tx {
        Tx {
            id: 1,
            kind: "p2p".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn it_formats_the_amount_with_two_decimals() {
        let mut tx = p2p_tx();
        tx.amount = Some("12.5".to_string());

        let reply = compose(&mut templates(), NOW_MS, &tx);

        assert!(reply.contains("($12.50 αUSD)"), "got: {}", reply);
    }

    #[test]
    fn it_links_the_explorer_for_real_hashes() {
        let mut tx = p2p_tx();
        tx.tx_hash = Some("0xdeadbeef".to_string());

        let reply = compose(&mut templates(), NOW_MS, &tx);

        assert!(
            reply.contains("\n🔗 https://explore.tempo.xyz/tx/0xdeadbeef"),
            "got: {}",
            reply
        );
    }

    #[test]
    fn it_skips_the_explorer_link_for_placeholder_hashes() {
        for hash in ["skip_abc", "failed_abc"] {
            let mut tx = p2p_tx();
            tx.tx_hash = Some(hash.to_string());

            let reply = compose(&mut templates(), NOW_MS, &tx);

            assert!(!reply.contains(EXPLORER_URL), "got: {}", reply);
        }
    }

    #[test]
    fn it_appends_the_recipient_tag() {
        let mut tx = p2p_tx();
        tx.recipient_pay_tag = Some("@alice".to_string());

        let reply = compose(&mut templates(), NOW_MS, &tx);

        assert!(reply.contains(". monitag: @alice"), "got: {}", reply);
    }

    #[test]
    fn it_degrades_to_an_error_template_on_a_malformed_amount() {
        let mut tx = p2p_tx();
        tx.amount = Some("around ten".to_string());

        let reply = compose(&mut templates(), NOW_MS, &tx);

        assert!(ERROR_TEMPLATES.contains(&reply.as_str()), "got: {}", reply);
    }

    #[test]
    fn it_draws_the_base_from_the_kind_pool() {
        let grant = Tx {
            kind: "grant".to_string(),
            ..p2p_tx()
        };
        let reply = compose(&mut templates(), NOW_MS, &grant);
        assert!(GRANT_TEMPLATES.iter().any(|t| reply.starts_with(t)));

        let reply = compose(&mut templates(), NOW_MS, &p2p_tx());
        assert!(P2P_TEMPLATES.iter().any(|t| reply.starts_with(t)));
    }

    #[test]
    fn it_encodes_the_uniqueness_suffix_in_base36() {
        assert_eq!(uniqueness_suffix(0), "0");
        assert_eq!(uniqueness_suffix(35), "z");
        assert_eq!(uniqueness_suffix(36), "10");
        // only the last four digits are kept
        assert_eq!(uniqueness_suffix(36_u64.pow(4)), "0000");
        assert_eq!(uniqueness_suffix(36_u64.pow(4) + 1), "0001");
    }

    #[test]
    fn it_makes_replies_unique_across_time() {
        let tx = p2p_tx();

        // same rng seed, so the same template base both times
        let first = compose(&mut templates(), NOW_MS, &tx);
        let second = compose(&mut templates(), NOW_MS + 1, &tx);

        assert_ne!(first, second);
    }
}
