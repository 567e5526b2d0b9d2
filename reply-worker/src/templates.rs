//! Reply templates and the rolling history which keeps consecutive replies
//! from sounding alike.
//!
//! The selector is owned by the poll loop and passed down per cycle, there
//! is no global state. Tests inject a seeded rng to make the draw sequence
//! deterministic.

use rand::Rng;
use std::collections::VecDeque;

pub const GRANT_TEMPLATES: &[&str] = &[
    "Transfer confirmed on Tempo. AlphaUSD delivered instantly",
    "Grant processed on Tempo. Check your balance",
    "Payment complete. Your AlphaUSD just landed via Tempo",
    "Done on Tempo. Funds in your wallet now",
    "Tempo delivery complete. AlphaUSD transferred",
    "Grant sent on Tempo testnet. Zero fees, instant settlement",
    "AlphaUSD delivered. Powered by Tempo's native fee sponsorship",
    "Tempo grant processed. Your testnet funds are ready",
];

pub const P2P_TEMPLATES: &[&str] = &[
    "Sent on Tempo. AlphaUSD transferred successfully",
    "Payment complete on Tempo. Recipient notified",
    "Transfer done. AlphaUSD moved via Tempo network",
    "Processed on Tempo. Payment delivered instantly",
    "Tempo transfer confirmed. Zero gas fees",
    "P2P complete on Tempo. AlphaUSD in recipient's wallet",
];

pub const ERROR_TEMPLATES: &[&str] = &[
    "Transfer couldn't be processed right now. Try again shortly",
    "Something went wrong on our end. We're looking into it",
];

/// How many recently emitted replies are remembered for the similarity
/// check.
const MAX_HISTORY: usize = 50;

/// How many draws before giving up on finding a dissimilar template.
const MAX_DRAWS: usize = 5;

/// A draw is rejected when it shares more than this fraction of words with
/// any remembered reply.
const SIMILARITY_THRESHOLD: f64 = 0.7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Grant,
    PeerToPeer,
    /// Only drawn from when composing a reply fails internally.
    Error,
}

impl Category {
    pub fn of_tx_kind(kind: &str) -> Self {
        if kind == "grant" {
            Self::Grant
        } else {
            Self::PeerToPeer
        }
    }

    fn pool(self) -> &'static [&'static str] {
        match self {
            Self::Grant => GRANT_TEMPLATES,
            Self::PeerToPeer => P2P_TEMPLATES,
            Self::Error => ERROR_TEMPLATES,
        }
    }
}

pub struct Templates<R> {
    rng: R,
    /// The most recently emitted templates, oldest first.
    history: VecDeque<String>,
}

impl<R: Rng> Templates<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            history: VecDeque::with_capacity(MAX_HISTORY),
        }
    }

    /// Draws a template from the category's pool, avoiding those which read
    /// like a recently emitted reply.
    pub fn select(&mut self, category: Category) -> String {
        self.select_from_pool(category.pool())
    }

    /// Up to [`MAX_DRAWS`] uniform draws; the first one which is not too
    /// similar to any remembered reply wins and is remembered itself.
    ///
    /// If every draw is rejected the last resort is a repeat: one more
    /// uniform draw which skips the similarity check and is not added to
    /// the history.
    fn select_from_pool(&mut self, pool: &'static [&'static str]) -> String {
        for _ in 0..MAX_DRAWS {
            let candidate = pool[self.rng.gen_range(0..pool.len())];

            let too_similar = self.history.iter().any(|seen| {
                similarity(seen, candidate) > SIMILARITY_THRESHOLD
            });

            if !too_similar {
                self.history.push_back(candidate.to_string());
                if self.history.len() > MAX_HISTORY {
                    self.history.pop_front();
                }
                return candidate.to_string();
            }
        }

        pool[self.rng.gen_range(0..pool.len())].to_string()
    }
}

/// Word overlap between two replies: how many words of `seen` also appear
/// in `candidate`, relative to the longer of the two.
fn similarity(seen: &str, candidate: &str) -> f64 {
    let seen_words: Vec<_> = seen.split_whitespace().collect();
    let candidate_words: Vec<_> = candidate.split_whitespace().collect();

    let longer = seen_words.len().max(candidate_words.len());
    if longer == 0 {
        return 0.0;
    }

    let common = seen_words
        .iter()
        .filter(|word| candidate_words.contains(word))
        .count();

    common as f64 / longer as f64
}
