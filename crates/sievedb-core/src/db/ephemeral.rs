//! Module: db::ephemeral
//! Responsibility: naming and lifecycle of the scratch keys a query
//! evaluation stores intermediate and final results under. Every key
//! minted here carries the evaluating query's token and dies by TTL.
//! Does not own: set algebra or sorting; evaluation drives those.

use crate::{
    key::KeySpace,
    obs::sink::{self, MetricsEvent},
    store::{KvBackend, KvError},
};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Process-unique token. Two evaluations never share scratch keys, even
/// for identical pipelines.
pub(crate) fn next_token() -> u64 {
    NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
}

///
/// Scratch
/// Scratch-key namespace for one evaluation of one query.
///

pub(crate) struct Scratch<'a, B: KvBackend> {
    backend: &'a B,
    keys: &'a KeySpace,
    model: &'a str,
    ttl_secs: u64,
    token: u64,
}

impl<'a, B: KvBackend> Scratch<'a, B> {
    pub(crate) const fn new(
        backend: &'a B,
        keys: &'a KeySpace,
        model: &'a str,
        ttl_secs: u64,
        token: u64,
    ) -> Self {
        Self {
            backend,
            keys,
            model,
            ttl_secs,
            token,
        }
    }

    #[must_use]
    pub(crate) fn intersection_key(&self, inputs: &[String]) -> String {
        self.keys.ephemeral('i', inputs, self.token)
    }

    #[must_use]
    pub(crate) fn difference_key(&self, inputs: &[String]) -> String {
        self.keys.ephemeral('d', inputs, self.token)
    }

    #[must_use]
    pub(crate) fn sort_key(&self, source: &str) -> String {
        self.keys.ephemeral('s', &[source.to_string()], self.token)
    }

    /// Put a freshly stored scratch key on the TTL clock. Returns false
    /// when there is nothing at the key (an empty result deletes it).
    pub(crate) fn arm(&self, key: &str) -> Result<bool, KvError> {
        let armed = self.backend.expire(key, self.ttl_secs)?;
        if armed {
            sink::record(MetricsEvent::EphemeralArmed {
                model: self.model,
                ttl_secs: self.ttl_secs,
            });
        }

        Ok(armed)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;

    #[test]
    fn test_tokens_are_unique() {
        let a = next_token();
        let b = next_token();
        assert_ne!(a, b);
    }

    #[test]
    fn test_scratch_keys_carry_token_and_operator() {
        let kv = MemoryBackend::new();
        let keys = KeySpace::new("Article");
        let scratch = Scratch::new(&kv, &keys, "Article", 60, 9);

        let inputs = vec!["Article:#all".to_string()];
        let inter = scratch.intersection_key(&inputs);
        let diff = scratch.difference_key(&inputs);

        assert!(inter.starts_with("~Article:i:"));
        assert!(inter.ends_with(".9"));
        assert_ne!(inter, diff);
    }

    #[test]
    fn test_arm_sets_ttl_only_on_existing_keys() {
        let kv = MemoryBackend::new();
        let keys = KeySpace::new("Article");
        let scratch = Scratch::new(&kv, &keys, "Article", 60, 1);

        kv.sadd("~Article:i:live", "1").expect("sadd");
        assert!(scratch.arm("~Article:i:live").expect("arm"));
        assert_eq!(kv.ttl("~Article:i:live").expect("ttl"), Some(60));

        assert!(!scratch.arm("~Article:i:empty").expect("arm missing"));
    }
}
