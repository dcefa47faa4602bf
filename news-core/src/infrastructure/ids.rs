use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};

const SUFFIX_LEN: usize = 6;
const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Issues `art-{millis}-{suffix}` ids. The millisecond part never repeats or
/// goes backwards within one generator, even if the clock does.
#[derive(Debug, Default)]
pub struct ArticleIdGenerator {
    last_millis: AtomicI64,
}

impl ArticleIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self, now: DateTime<Utc>) -> String {
        let wanted = now.timestamp_millis();
        let prev = self
            .last_millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(wanted.max(last + 1))
            })
            .unwrap_or(wanted);
        let millis = wanted.max(prev + 1);
        format!("art-{}-{}", millis, random_suffix())
    }
}

fn random_suffix() -> String {
    let mut n = OsRng.next_u64();
    let mut out = String::with_capacity(SUFFIX_LEN);
    for _ in 0..SUFFIX_LEN {
        out.push(ALPHABET[(n % 36) as usize] as char);
        n /= 36;
    }
    out
}
