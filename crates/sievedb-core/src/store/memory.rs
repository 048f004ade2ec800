//! Module: store::memory
//! Deterministic in-memory backend used by the test suites. Iteration is
//! BTree-backed so results are reproducible, expiry runs off a logical
//! clock advanced explicitly, and expired keys are purged lazily on
//! touch (plus eagerly on clock advance).

use crate::store::{Batch, Command, KvBackend, KvError, ScoreRange, SortSpec, Window};
use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
};

///
/// Entry
///

#[derive(Clone, Debug)]
enum Entry {
    Hash(BTreeMap<String, String>),
    List(Vec<String>),
    Set(BTreeSet<String>),
    Sorted(BTreeMap<String, f64>),
    Text(String),
}

#[derive(Clone, Debug)]
struct Keyed {
    entry: Entry,
    expires_at_ms: Option<u64>,
}

impl Keyed {
    const fn new(entry: Entry) -> Self {
        Self {
            entry,
            expires_at_ms: None,
        }
    }
}

///
/// State
///

#[derive(Debug, Default)]
struct State {
    keys: BTreeMap<String, Keyed>,
    now_ms: u64,
}

impl State {
    fn purge_if_expired(&mut self, key: &str) {
        let expired = self
            .keys
            .get(key)
            .is_some_and(|k| k.expires_at_ms.is_some_and(|at| at <= self.now_ms));
        if expired {
            self.keys.remove(key);
        }
    }

    fn live(&mut self, key: &str) -> Option<&mut Keyed> {
        self.purge_if_expired(key);
        self.keys.get_mut(key)
    }

    fn wrong_kind(key: &str, expected: &'static str) -> KvError {
        KvError::WrongKind {
            key: key.to_string(),
            expected,
        }
    }

    fn set_mut(&mut self, key: &str) -> Result<&mut BTreeSet<String>, KvError> {
        self.purge_if_expired(key);
        let keyed = self
            .keys
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Entry::Set(BTreeSet::new())));
        match &mut keyed.entry {
            Entry::Set(set) => Ok(set),
            _ => Err(Self::wrong_kind(key, "set")),
        }
    }

    fn set_ref(&mut self, key: &str) -> Result<Option<&BTreeSet<String>>, KvError> {
        self.purge_if_expired(key);
        match self.keys.get(key) {
            None => Ok(None),
            Some(keyed) => match &keyed.entry {
                Entry::Set(set) => Ok(Some(set)),
                _ => Err(Self::wrong_kind(key, "set")),
            },
        }
    }

    fn sorted_mut(&mut self, key: &str) -> Result<&mut BTreeMap<String, f64>, KvError> {
        self.purge_if_expired(key);
        let keyed = self
            .keys
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Entry::Sorted(BTreeMap::new())));
        match &mut keyed.entry {
            Entry::Sorted(sorted) => Ok(sorted),
            _ => Err(Self::wrong_kind(key, "sorted set")),
        }
    }

    fn sorted_ref(&mut self, key: &str) -> Result<Option<&BTreeMap<String, f64>>, KvError> {
        self.purge_if_expired(key);
        match self.keys.get(key) {
            None => Ok(None),
            Some(keyed) => match &keyed.entry {
                Entry::Sorted(sorted) => Ok(Some(sorted)),
                _ => Err(Self::wrong_kind(key, "sorted set")),
            },
        }
    }

    fn hash_mut(&mut self, key: &str) -> Result<&mut BTreeMap<String, String>, KvError> {
        self.purge_if_expired(key);
        let keyed = self
            .keys
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Entry::Hash(BTreeMap::new())));
        match &mut keyed.entry {
            Entry::Hash(hash) => Ok(hash),
            _ => Err(Self::wrong_kind(key, "hash")),
        }
    }

    fn hash_ref(&mut self, key: &str) -> Result<Option<&BTreeMap<String, String>>, KvError> {
        self.purge_if_expired(key);
        match self.keys.get(key) {
            None => Ok(None),
            Some(keyed) => match &keyed.entry {
                Entry::Hash(hash) => Ok(Some(hash)),
                _ => Err(Self::wrong_kind(key, "hash")),
            },
        }
    }

    fn list_mut(&mut self, key: &str) -> Result<&mut Vec<String>, KvError> {
        self.purge_if_expired(key);
        let keyed = self
            .keys
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Entry::List(Vec::new())));
        match &mut keyed.entry {
            Entry::List(list) => Ok(list),
            _ => Err(Self::wrong_kind(key, "list")),
        }
    }

    fn list_ref(&mut self, key: &str) -> Result<Option<&Vec<String>>, KvError> {
        self.purge_if_expired(key);
        match self.keys.get(key) {
            None => Ok(None),
            Some(keyed) => match &keyed.entry {
                Entry::List(list) => Ok(Some(list)),
                _ => Err(Self::wrong_kind(key, "list")),
            },
        }
    }

    fn store_result(&mut self, dest: &str, entry: Option<Entry>) {
        // STORE destinations are replaced wholesale; an empty result
        // removes the key, matching store semantics.
        self.keys.remove(dest);
        if let Some(entry) = entry {
            self.keys.insert(dest.to_string(), Keyed::new(entry));
        }
    }

    /// Resolve a sort weight pattern for one member: `*` takes the
    /// member's place, `->` dereferences a hash field. Missing data
    /// weighs nothing.
    fn resolve_weight(&mut self, pattern: &str, member: &str) -> Option<String> {
        let resolved = pattern.replacen('*', member, 1);
        if let Some((key, field)) = resolved.split_once("->") {
            let (key, field) = (key.to_string(), field.to_string());
            self.live(&key).and_then(|keyed| match &keyed.entry {
                Entry::Hash(hash) => hash.get(&field).cloned(),
                _ => None,
            })
        } else {
            self.live(&resolved).and_then(|keyed| match &keyed.entry {
                Entry::Text(text) => Some(text.clone()),
                _ => None,
            })
        }
    }
}

///
/// MemoryBackend
///
/// Reference backend. Single-threaded by design, like the engine: the
/// state sits in a `RefCell` and every operation is one borrow.
///

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RefCell<State>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the logical clock and drop everything that expired.
    pub fn advance(&self, ms: u64) {
        let mut state = self.state.borrow_mut();
        state.now_ms = state.now_ms.saturating_add(ms);
        let now = state.now_ms;
        state
            .keys
            .retain(|_, keyed| keyed.expires_at_ms.is_none_or(|at| at > now));
    }

    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.state.borrow().now_ms
    }

    /// Live keys, for test assertions about what survives expiry.
    #[must_use]
    pub fn live_keys(&self) -> Vec<String> {
        let state = self.state.borrow();
        state
            .keys
            .iter()
            .filter(|(_, keyed)| keyed.expires_at_ms.is_none_or(|at| at > state.now_ms))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl KvBackend for MemoryBackend {
    fn sadd(&self, key: &str, member: &str) -> Result<bool, KvError> {
        let mut state = self.state.borrow_mut();
        Ok(state.set_mut(key)?.insert(member.to_string()))
    }

    fn srem(&self, key: &str, member: &str) -> Result<bool, KvError> {
        let mut state = self.state.borrow_mut();
        match state.live(key) {
            None => Ok(false),
            Some(keyed) => match &mut keyed.entry {
                Entry::Set(set) => Ok(set.remove(member)),
                _ => Err(State::wrong_kind(key, "set")),
            },
        }
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>, KvError> {
        let mut state = self.state.borrow_mut();
        Ok(state
            .set_ref(key)?
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn scard(&self, key: &str) -> Result<usize, KvError> {
        let mut state = self.state.borrow_mut();
        Ok(state.set_ref(key)?.map_or(0, BTreeSet::len))
    }

    fn sismember(&self, key: &str, member: &str) -> Result<bool, KvError> {
        let mut state = self.state.borrow_mut();
        Ok(state.set_ref(key)?.is_some_and(|set| set.contains(member)))
    }

    fn sinterstore(&self, dest: &str, sources: &[String]) -> Result<usize, KvError> {
        let mut state = self.state.borrow_mut();

        let mut sets = Vec::with_capacity(sources.len());
        for source in sources {
            sets.push(state.set_ref(source)?.cloned().unwrap_or_default());
        }
        let mut result = sets.first().cloned().unwrap_or_default();
        for set in sets.iter().skip(1) {
            result.retain(|member| set.contains(member));
        }

        let size = result.len();
        state.store_result(dest, (size > 0).then_some(Entry::Set(result)));
        Ok(size)
    }

    fn sdiffstore(&self, dest: &str, sources: &[String]) -> Result<usize, KvError> {
        let mut state = self.state.borrow_mut();

        let mut sets = Vec::with_capacity(sources.len());
        for source in sources {
            sets.push(state.set_ref(source)?.cloned().unwrap_or_default());
        }
        let mut result = sets.first().cloned().unwrap_or_default();
        for set in sets.iter().skip(1) {
            result.retain(|member| !set.contains(member));
        }

        let size = result.len();
        state.store_result(dest, (size > 0).then_some(Entry::Set(result)));
        Ok(size)
    }

    fn zadd(&self, key: &str, member: &str, score: f64) -> Result<bool, KvError> {
        let mut state = self.state.borrow_mut();
        Ok(state
            .sorted_mut(key)?
            .insert(member.to_string(), score)
            .is_none())
    }

    fn zrem(&self, key: &str, member: &str) -> Result<bool, KvError> {
        let mut state = self.state.borrow_mut();
        match state.live(key) {
            None => Ok(false),
            Some(keyed) => match &mut keyed.entry {
                Entry::Sorted(sorted) => Ok(sorted.remove(member).is_some()),
                _ => Err(State::wrong_kind(key, "sorted set")),
            },
        }
    }

    fn zrange_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        window: Option<Window>,
    ) -> Result<Vec<String>, KvError> {
        let mut state = self.state.borrow_mut();

        let mut scored: Vec<(f64, String)> = state
            .sorted_ref(key)?
            .map(|sorted| {
                sorted
                    .iter()
                    .filter(|(_, score)| range.admits(**score))
                    .map(|(member, score)| (*score, member.clone()))
                    .collect()
            })
            .unwrap_or_default();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let members: Vec<String> = scored.into_iter().map(|(_, member)| member).collect();
        Ok(match window {
            Some(window) => window.apply(members),
            None => members,
        })
    }

    fn sort_store(&self, source: &str, dest: &str, spec: &SortSpec) -> Result<usize, KvError> {
        let mut state = self.state.borrow_mut();

        let members: Vec<String> = {
            state.purge_if_expired(source);
            match state.keys.get(source) {
                None => Vec::new(),
                Some(keyed) => match &keyed.entry {
                    Entry::Set(set) => set.iter().cloned().collect(),
                    Entry::List(list) => list.clone(),
                    _ => return Err(State::wrong_kind(source, "set or list")),
                },
            }
        };

        let mut ordered = if spec.alpha {
            let mut keyed: Vec<(String, String)> = Vec::with_capacity(members.len());
            for member in members {
                let weight = match &spec.by {
                    None => member.clone(),
                    Some(pattern) => state.resolve_weight(pattern, &member).unwrap_or_default(),
                };
                keyed.push((weight, member));
            }
            keyed.sort();
            keyed.into_iter().map(|(_, member)| member).collect()
        } else {
            let mut keyed: Vec<(f64, String)> = Vec::with_capacity(members.len());
            for member in members {
                let raw = match &spec.by {
                    None => Some(member.clone()),
                    Some(pattern) => state.resolve_weight(pattern, &member),
                };
                let weight = match raw {
                    None => 0.0,
                    Some(raw) => raw.parse::<f64>().map_err(|_| KvError::SortNotNumeric {
                        key: source.to_string(),
                    })?,
                };
                keyed.push((weight, member));
            }
            keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            keyed
                .into_iter()
                .map(|(_, member)| member)
                .collect::<Vec<_>>()
        };

        if spec.desc {
            ordered.reverse();
        }
        if let Some(window) = spec.window {
            ordered = window.apply(ordered);
        }

        let size = ordered.len();
        state.store_result(dest, (size > 0).then_some(Entry::List(ordered)));
        Ok(size)
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), KvError> {
        let mut state = self.state.borrow_mut();
        state
            .hash_mut(key)?
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    fn hget(&self, key: &str, field: &str) -> Result<Option<String>, KvError> {
        let mut state = self.state.borrow_mut();
        Ok(state
            .hash_ref(key)?
            .and_then(|hash| hash.get(field).cloned()))
    }

    fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>, KvError> {
        let mut state = self.state.borrow_mut();
        Ok(state.hash_ref(key)?.cloned().unwrap_or_default())
    }

    fn hdel(&self, key: &str, field: &str) -> Result<bool, KvError> {
        let mut state = self.state.borrow_mut();
        match state.live(key) {
            None => Ok(false),
            Some(keyed) => match &mut keyed.entry {
                Entry::Hash(hash) => Ok(hash.remove(field).is_some()),
                _ => Err(State::wrong_kind(key, "hash")),
            },
        }
    }

    fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64, KvError> {
        let mut state = self.state.borrow_mut();
        let hash = state.hash_mut(key)?;
        let current = match hash.get(field) {
            None => 0,
            Some(raw) => raw.parse::<i64>().map_err(|_| KvError::WrongKind {
                key: key.to_string(),
                expected: "integer",
            })?,
        };
        let next = current.saturating_add(delta);
        hash.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    fn rpush(&self, key: &str, values: &[String]) -> Result<usize, KvError> {
        let mut state = self.state.borrow_mut();
        let list = state.list_mut(key)?;
        list.extend(values.iter().cloned());
        Ok(list.len())
    }

    fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, KvError> {
        let mut state = self.state.borrow_mut();
        let Some(list) = state.list_ref(key)? else {
            return Ok(Vec::new());
        };

        let len = i64::try_from(list.len()).unwrap_or(i64::MAX);
        let resolve = |i: i64| if i < 0 { len + i } else { i };
        let start = resolve(start).max(0);
        let stop = resolve(stop).min(len - 1);
        if start > stop {
            return Ok(Vec::new());
        }

        #[allow(clippy::cast_sign_loss)]
        let (start, stop) = (start as usize, stop as usize);

        Ok(list[start..=stop].to_vec())
    }

    fn llen(&self, key: &str) -> Result<usize, KvError> {
        let mut state = self.state.borrow_mut();
        Ok(state.list_ref(key)?.map_or(0, Vec::len))
    }

    fn incr(&self, key: &str) -> Result<u64, KvError> {
        let mut state = self.state.borrow_mut();
        state.purge_if_expired(key);
        let keyed = state
            .keys
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Entry::Text("0".to_string())));
        let Entry::Text(text) = &mut keyed.entry else {
            return Err(State::wrong_kind(key, "integer"));
        };
        let next = text
            .parse::<u64>()
            .map_err(|_| KvError::WrongKind {
                key: key.to_string(),
                expected: "integer",
            })?
            .saturating_add(1);
        *text = next.to_string();
        Ok(next)
    }

    fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, KvError> {
        let mut state = self.state.borrow_mut();
        let now = state.now_ms;
        match state.live(key) {
            None => Ok(false),
            Some(keyed) => {
                keyed.expires_at_ms = Some(now.saturating_add(ttl_secs.saturating_mul(1_000)));
                Ok(true)
            }
        }
    }

    fn ttl(&self, key: &str) -> Result<Option<u64>, KvError> {
        let mut state = self.state.borrow_mut();
        let now = state.now_ms;
        Ok(state
            .live(key)
            .and_then(|keyed| keyed.expires_at_ms)
            .map(|at| at.saturating_sub(now) / 1_000))
    }

    fn exists(&self, key: &str) -> Result<bool, KvError> {
        let mut state = self.state.borrow_mut();
        Ok(state.live(key).is_some())
    }

    fn del(&self, key: &str) -> Result<bool, KvError> {
        let mut state = self.state.borrow_mut();
        state.purge_if_expired(key);
        Ok(state.keys.remove(key).is_some())
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ScoreBound;

    #[test]
    fn test_set_ops() {
        let kv = MemoryBackend::new();
        assert!(kv.sadd("s", "a").expect("sadd"));
        assert!(!kv.sadd("s", "a").expect("sadd duplicate"));
        assert!(kv.sadd("s", "b").expect("sadd"));

        assert_eq!(kv.smembers("s").expect("smembers"), vec!["a", "b"]);
        assert_eq!(kv.scard("s").expect("scard"), 2);
        assert!(kv.sismember("s", "a").expect("sismember"));
        assert!(kv.srem("s", "a").expect("srem"));
        assert!(!kv.srem("s", "a").expect("srem gone"));
        assert!(!kv.srem("missing", "a").expect("srem missing key"));
    }

    #[test]
    fn test_wrong_kind_is_an_error() {
        let kv = MemoryBackend::new();
        kv.sadd("s", "a").expect("sadd");

        assert!(matches!(
            kv.hset("s", "f", "v"),
            Err(KvError::WrongKind { .. })
        ));
        assert!(matches!(kv.incr("s"), Err(KvError::WrongKind { .. })));
    }

    #[test]
    fn test_sinterstore_and_sdiffstore() {
        let kv = MemoryBackend::new();
        for m in ["a", "b", "c"] {
            kv.sadd("x", m).expect("sadd");
        }
        for m in ["b", "c", "d"] {
            kv.sadd("y", m).expect("sadd");
        }

        let n = kv
            .sinterstore("both", &["x".to_string(), "y".to_string()])
            .expect("sinterstore");
        assert_eq!(n, 2);
        assert_eq!(kv.smembers("both").expect("smembers"), vec!["b", "c"]);

        let n = kv
            .sdiffstore("only_x", &["x".to_string(), "y".to_string()])
            .expect("sdiffstore");
        assert_eq!(n, 1);
        assert_eq!(kv.smembers("only_x").expect("smembers"), vec!["a"]);
    }

    #[test]
    fn test_empty_store_result_removes_dest() {
        let kv = MemoryBackend::new();
        kv.sadd("x", "a").expect("sadd");
        kv.sadd("dest", "stale").expect("sadd");

        let n = kv
            .sinterstore("dest", &["x".to_string(), "missing".to_string()])
            .expect("sinterstore");
        assert_eq!(n, 0);
        assert!(!kv.exists("dest").expect("exists"));
    }

    #[test]
    fn test_zrange_by_score_orders_and_windows() {
        let kv = MemoryBackend::new();
        kv.zadd("z", "one", 1.0).expect("zadd");
        kv.zadd("z", "three", 3.0).expect("zadd");
        kv.zadd("z", "two", 2.0).expect("zadd");

        let all = kv
            .zrange_by_score("z", ScoreRange::new(ScoreBound::Open, ScoreBound::Open), None)
            .expect("zrange");
        assert_eq!(all, vec!["one", "two", "three"]);

        let windowed = kv
            .zrange_by_score("z", ScoreRange::at_least(2.0), Some(Window::new(1, 5)))
            .expect("zrange");
        assert_eq!(windowed, vec!["three"]);
    }

    #[test]
    fn test_sort_store_numeric_members() {
        let kv = MemoryBackend::new();
        for m in ["10", "2", "33"] {
            kv.sadd("ids", m).expect("sadd");
        }

        let n = kv
            .sort_store("ids", "out", &SortSpec::default())
            .expect("sort");
        assert_eq!(n, 3);
        assert_eq!(kv.lrange("out", 0, -1).expect("lrange"), vec!["2", "10", "33"]);
    }

    #[test]
    fn test_sort_store_by_hash_weight() {
        let kv = MemoryBackend::new();
        for m in ["1", "2", "3"] {
            kv.sadd("ids", m).expect("sadd");
        }
        kv.hset("Row:1", "score", "30").expect("hset");
        kv.hset("Row:2", "score", "10").expect("hset");
        kv.hset("Row:3", "score", "20").expect("hset");

        let spec = SortSpec {
            by: Some("Row:*->score".to_string()),
            ..SortSpec::default()
        };
        kv.sort_store("ids", "out", &spec).expect("sort");
        assert_eq!(kv.lrange("out", 0, -1).expect("lrange"), vec!["2", "3", "1"]);

        let desc = SortSpec {
            by: Some("Row:*->score".to_string()),
            desc: true,
            window: Some(Window::new(0, 2)),
            ..SortSpec::default()
        };
        kv.sort_store("ids", "out", &desc).expect("sort desc");
        assert_eq!(kv.lrange("out", 0, -1).expect("lrange"), vec!["1", "3"]);
    }

    #[test]
    fn test_sort_store_alpha_weight() {
        let kv = MemoryBackend::new();
        for m in ["1", "2", "3"] {
            kv.sadd("ids", m).expect("sadd");
        }
        kv.hset("Row:1", "title", "pear").expect("hset");
        kv.hset("Row:2", "title", "apple").expect("hset");
        kv.hset("Row:3", "title", "mango").expect("hset");

        let spec = SortSpec {
            by: Some("Row:*->title".to_string()),
            alpha: true,
            ..SortSpec::default()
        };
        kv.sort_store("ids", "out", &spec).expect("sort alpha");
        assert_eq!(kv.lrange("out", 0, -1).expect("lrange"), vec!["2", "3", "1"]);
    }

    #[test]
    fn test_sort_store_missing_weight_counts_as_zero() {
        let kv = MemoryBackend::new();
        for m in ["1", "2"] {
            kv.sadd("ids", m).expect("sadd");
        }
        kv.hset("Row:2", "score", "5").expect("hset");

        let spec = SortSpec {
            by: Some("Row:*->score".to_string()),
            ..SortSpec::default()
        };
        kv.sort_store("ids", "out", &spec).expect("sort");
        // member 1 has no weight, sorts as zero ahead of member 2
        assert_eq!(kv.lrange("out", 0, -1).expect("lrange"), vec!["1", "2"]);
    }

    #[test]
    fn test_sort_store_rejects_non_numeric_members() {
        let kv = MemoryBackend::new();
        kv.sadd("ids", "pear").expect("sadd");

        assert!(matches!(
            kv.sort_store("ids", "out", &SortSpec::default()),
            Err(KvError::SortNotNumeric { .. })
        ));
    }

    #[test]
    fn test_hash_ops() {
        let kv = MemoryBackend::new();
        kv.hset("h", "a", "1").expect("hset");
        kv.hset("h", "b", "2").expect("hset");

        assert_eq!(kv.hget("h", "a").expect("hget"), Some("1".to_string()));
        assert_eq!(kv.hget("h", "missing").expect("hget"), None);
        assert_eq!(kv.hgetall("h").expect("hgetall").len(), 2);
        assert!(kv.hdel("h", "a").expect("hdel"));
        assert!(!kv.hdel("h", "a").expect("hdel gone"));

        assert_eq!(kv.hincrby("h", "views", 2).expect("hincrby"), 2);
        assert_eq!(kv.hincrby("h", "views", 3).expect("hincrby"), 5);
        assert_eq!(kv.hincrby("h", "views", -6).expect("hincrby"), -1);
    }

    #[test]
    fn test_list_ops_and_lrange_indices() {
        let kv = MemoryBackend::new();
        let values: Vec<String> = ["a", "b", "c"].iter().map(ToString::to_string).collect();
        assert_eq!(kv.rpush("l", &values).expect("rpush"), 3);

        assert_eq!(kv.lrange("l", 0, -1).expect("lrange"), vec!["a", "b", "c"]);
        assert_eq!(kv.lrange("l", 1, 1).expect("lrange"), vec!["b"]);
        assert_eq!(kv.lrange("l", -2, -1).expect("lrange"), vec!["b", "c"]);
        assert_eq!(kv.lrange("l", 5, 9).expect("lrange"), Vec::<String>::new());
        assert_eq!(kv.lrange("missing", 0, -1).expect("lrange"), Vec::<String>::new());

        assert_eq!(kv.llen("l").expect("llen"), 3);
        assert_eq!(kv.llen("missing").expect("llen"), 0);
    }

    #[test]
    fn test_incr_sequences() {
        let kv = MemoryBackend::new();
        assert_eq!(kv.incr("seq").expect("incr"), 1);
        assert_eq!(kv.incr("seq").expect("incr"), 2);
        assert_eq!(kv.incr("seq").expect("incr"), 3);
    }

    #[test]
    fn test_expire_and_logical_clock() {
        let kv = MemoryBackend::new();
        kv.sadd("s", "a").expect("sadd");

        assert!(kv.expire("s", 60).expect("expire"));
        assert!(!kv.expire("missing", 60).expect("expire missing"));
        assert_eq!(kv.ttl("s").expect("ttl"), Some(60));
        assert_eq!(kv.ttl("missing").expect("ttl missing"), None);

        kv.advance(59_999);
        assert!(kv.exists("s").expect("still alive"));

        kv.advance(1);
        assert!(!kv.exists("s").expect("expired"));
        assert!(kv.smembers("s").expect("smembers").is_empty());
        assert!(kv.live_keys().is_empty());
    }

    #[test]
    fn test_write_revives_expired_key_fresh() {
        let kv = MemoryBackend::new();
        kv.sadd("s", "old").expect("sadd");
        kv.expire("s", 1).expect("expire");
        kv.advance(1_000);

        kv.sadd("s", "new").expect("sadd after expiry");
        assert_eq!(kv.smembers("s").expect("smembers"), vec!["new"]);
        assert_eq!(kv.ttl("s").expect("ttl"), None);
    }

    #[test]
    fn test_apply_batch_in_order() {
        let kv = MemoryBackend::new();
        let mut batch = Batch::new();
        batch.sadd("s", "a");
        batch.sadd("s", "b");
        batch.srem("s", "a");
        batch.zadd("z", "m", 2.5);

        kv.apply(&batch).expect("apply");
        assert_eq!(kv.smembers("s").expect("smembers"), vec!["b"]);
    }

    #[test]
    fn test_apply_aborts_on_failure() {
        let kv = MemoryBackend::new();
        kv.sadd("set_key", "a").expect("sadd");

        let mut batch = Batch::new();
        batch.sadd("s", "a");
        batch.hset("set_key", "f", "v"); // wrong kind, fails here
        batch.sadd("s", "b");

        let err = kv.apply(&batch).expect_err("aborted");
        match err {
            KvError::BatchAborted { index, .. } => assert_eq!(index, 1),
            other => panic!("unexpected error: {other}"),
        }
        // first command applied, third never ran
        assert_eq!(kv.smembers("s").expect("smembers"), vec!["a"]);
    }

    #[test]
    fn test_run_covers_every_command() {
        let kv = MemoryBackend::new();
        let commands = vec![
            Command::SAdd {
                key: "s".to_string(),
                member: "m".to_string(),
            },
            Command::ZAdd {
                key: "z".to_string(),
                member: "m".to_string(),
                score: 1.0,
            },
            Command::HSet {
                key: "h".to_string(),
                field: "f".to_string(),
                value: "v".to_string(),
            },
            Command::RPush {
                key: "l".to_string(),
                values: vec!["a".to_string()],
            },
            Command::Expire {
                key: "s".to_string(),
                ttl_secs: 10,
            },
            Command::SRem {
                key: "s".to_string(),
                member: "m".to_string(),
            },
            Command::ZRem {
                key: "z".to_string(),
                member: "m".to_string(),
            },
            Command::HDel {
                key: "h".to_string(),
                field: "f".to_string(),
            },
            Command::Del {
                key: "l".to_string(),
            },
        ];

        for command in &commands {
            kv.run(command).expect("run");
        }
        assert!(!kv.exists("l").expect("deleted"));
    }
}
