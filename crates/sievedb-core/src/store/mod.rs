//! Module: store
//! Responsibility: the capability surface the engine requires from a
//! key-value store, the batched write command set, and the in-memory
//! reference backend.
//! Does not own: key naming, schema, or index semantics.

pub mod memory;

pub use memory::MemoryBackend;

use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// KvError
///

#[remain::sorted]
#[derive(Debug, ThisError)]
pub enum KvError {
    /// A batch stopped at the failing command. Earlier commands stay
    /// applied; there is no rollback.
    #[error("batch aborted at command {index}: {source}")]
    BatchAborted {
        index: usize,
        #[source]
        source: Box<KvError>,
    },

    #[error("i/o failure: {message}")]
    Io { message: String },

    #[error("sort weights for key '{key}' are not numeric")]
    SortNotNumeric { key: String },

    #[error("wrong entry kind at key '{key}': expected {expected}")]
    WrongKind { key: String, expected: &'static str },
}

///
/// ScoreBound
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScoreBound {
    Excl(f64),
    Incl(f64),
    Open,
}

///
/// ScoreRange
/// Score interval for range-index reads. Both ends independent, so the
/// five range operators all map onto one shape.
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreRange {
    pub min: ScoreBound,
    pub max: ScoreBound,
}

impl ScoreRange {
    #[must_use]
    pub const fn new(min: ScoreBound, max: ScoreBound) -> Self {
        Self { min, max }
    }

    /// `score >= bound`
    #[must_use]
    pub const fn at_least(bound: f64) -> Self {
        Self::new(ScoreBound::Incl(bound), ScoreBound::Open)
    }

    /// `score > bound`
    #[must_use]
    pub const fn above(bound: f64) -> Self {
        Self::new(ScoreBound::Excl(bound), ScoreBound::Open)
    }

    /// `score <= bound`
    #[must_use]
    pub const fn at_most(bound: f64) -> Self {
        Self::new(ScoreBound::Open, ScoreBound::Incl(bound))
    }

    /// `score < bound`
    #[must_use]
    pub const fn below(bound: f64) -> Self {
        Self::new(ScoreBound::Open, ScoreBound::Excl(bound))
    }

    /// `low <= score <= high`
    #[must_use]
    pub const fn between(low: f64, high: f64) -> Self {
        Self::new(ScoreBound::Incl(low), ScoreBound::Incl(high))
    }

    #[must_use]
    pub fn admits(&self, score: f64) -> bool {
        let above_min = match self.min {
            ScoreBound::Open => true,
            ScoreBound::Incl(min) => score >= min,
            ScoreBound::Excl(min) => score > min,
        };
        let below_max = match self.max {
            ScoreBound::Open => true,
            ScoreBound::Incl(max) => score <= max,
            ScoreBound::Excl(max) => score < max,
        };

        above_min && below_max
    }
}

///
/// Window
/// Pagination window: skip `offset` entries, keep at most `count`.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Window {
    pub offset: usize,
    pub count: usize,
}

impl Window {
    #[must_use]
    pub const fn new(offset: usize, count: usize) -> Self {
        Self { offset, count }
    }

    #[must_use]
    pub fn apply<T>(self, mut items: Vec<T>) -> Vec<T> {
        if self.offset >= items.len() {
            return Vec::new();
        }
        items.drain(..self.offset);
        items.truncate(self.count);

        items
    }
}

///
/// SortSpec
/// Store-side sort parameters. With no `by` pattern, members sort by
/// their own numeric value. A `by` pattern is resolved per member:
/// `*` is replaced by the member and `->` dereferences a hash field.
///

#[derive(Clone, Debug, Default)]
pub struct SortSpec {
    pub by: Option<String>,
    pub alpha: bool,
    pub desc: bool,
    pub window: Option<Window>,
}

///
/// Command
/// One write inside a batched round trip.
///

#[remain::sorted]
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Del { key: String },
    Expire { key: String, ttl_secs: u64 },
    HDel { key: String, field: String },
    HSet { key: String, field: String, value: String },
    RPush { key: String, values: Vec<String> },
    SAdd { key: String, member: String },
    SRem { key: String, member: String },
    ZAdd { key: String, member: String, score: f64 },
    ZRem { key: String, member: String },
}

///
/// Batch
///
/// Ordered write list applied in one round trip. Batching buys
/// transmission efficiency, not atomicity: a failure aborts the
/// remainder and earlier writes stay applied.
///

#[derive(Clone, Debug, Default)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn del(&mut self, key: impl Into<String>) {
        self.push(Command::Del { key: key.into() });
    }

    pub fn expire(&mut self, key: impl Into<String>, ttl_secs: u64) {
        self.push(Command::Expire {
            key: key.into(),
            ttl_secs,
        });
    }

    pub fn hdel(&mut self, key: impl Into<String>, field: impl Into<String>) {
        self.push(Command::HDel {
            key: key.into(),
            field: field.into(),
        });
    }

    pub fn hset(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.push(Command::HSet {
            key: key.into(),
            field: field.into(),
            value: value.into(),
        });
    }

    pub fn rpush(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.push(Command::RPush {
            key: key.into(),
            values,
        });
    }

    pub fn sadd(&mut self, key: impl Into<String>, member: impl Into<String>) {
        self.push(Command::SAdd {
            key: key.into(),
            member: member.into(),
        });
    }

    pub fn srem(&mut self, key: impl Into<String>, member: impl Into<String>) {
        self.push(Command::SRem {
            key: key.into(),
            member: member.into(),
        });
    }

    pub fn zadd(&mut self, key: impl Into<String>, member: impl Into<String>, score: f64) {
        self.push(Command::ZAdd {
            key: key.into(),
            member: member.into(),
            score,
        });
    }

    pub fn zrem(&mut self, key: impl Into<String>, member: impl Into<String>) {
        self.push(Command::ZRem {
            key: key.into(),
            member: member.into(),
        });
    }
}

///
/// KvBackend
///
/// Everything the engine needs from the store: sets and set algebra
/// with store-to-key, sorted sets with score ranges, store-side sort,
/// hashes, lists, counters, and key expiry. Synchronous request/response;
/// cancellation and timeouts belong to the connection, not this trait.
///

pub trait KvBackend {
    // -- sets
    fn sadd(&self, key: &str, member: &str) -> Result<bool, KvError>;
    fn srem(&self, key: &str, member: &str) -> Result<bool, KvError>;
    fn smembers(&self, key: &str) -> Result<Vec<String>, KvError>;
    fn scard(&self, key: &str) -> Result<usize, KvError>;
    fn sismember(&self, key: &str, member: &str) -> Result<bool, KvError>;

    /// Intersect `sources` into `dest`, replacing it. Returns the size.
    /// An empty result deletes `dest`.
    fn sinterstore(&self, dest: &str, sources: &[String]) -> Result<usize, KvError>;

    /// Subtract later `sources` from the first, storing into `dest`.
    fn sdiffstore(&self, dest: &str, sources: &[String]) -> Result<usize, KvError>;

    // -- sorted sets
    fn zadd(&self, key: &str, member: &str, score: f64) -> Result<bool, KvError>;
    fn zrem(&self, key: &str, member: &str) -> Result<bool, KvError>;

    /// Members within the score range, ascending by (score, member).
    fn zrange_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        window: Option<Window>,
    ) -> Result<Vec<String>, KvError>;

    // -- store-side sort
    /// Sort `source`'s members per `spec`, store the ordered result as a
    /// list at `dest` (replacing it), and return the stored length. An
    /// empty result deletes `dest`.
    fn sort_store(&self, source: &str, dest: &str, spec: &SortSpec) -> Result<usize, KvError>;

    // -- hashes
    fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), KvError>;
    fn hget(&self, key: &str, field: &str) -> Result<Option<String>, KvError>;
    fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>, KvError>;
    fn hdel(&self, key: &str, field: &str) -> Result<bool, KvError>;
    fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64, KvError>;

    // -- lists
    fn rpush(&self, key: &str, values: &[String]) -> Result<usize, KvError>;

    /// Inclusive range; negative indices count from the end.
    fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, KvError>;

    fn llen(&self, key: &str) -> Result<usize, KvError>;

    // -- counters and key lifecycle
    fn incr(&self, key: &str) -> Result<u64, KvError>;

    /// Arm `key` to expire after `ttl_secs`. False if the key is absent.
    fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, KvError>;

    /// Remaining seconds, or `None` when absent or persistent.
    fn ttl(&self, key: &str) -> Result<Option<u64>, KvError>;

    fn exists(&self, key: &str) -> Result<bool, KvError>;
    fn del(&self, key: &str) -> Result<bool, KvError>;

    /// Execute one batched command.
    fn run(&self, command: &Command) -> Result<(), KvError> {
        match command {
            Command::Del { key } => {
                self.del(key)?;
            }
            Command::Expire { key, ttl_secs } => {
                self.expire(key, *ttl_secs)?;
            }
            Command::HDel { key, field } => {
                self.hdel(key, field)?;
            }
            Command::HSet { key, field, value } => {
                self.hset(key, field, value)?;
            }
            Command::RPush { key, values } => {
                self.rpush(key, values)?;
            }
            Command::SAdd { key, member } => {
                self.sadd(key, member)?;
            }
            Command::SRem { key, member } => {
                self.srem(key, member)?;
            }
            Command::ZAdd { key, member, score } => {
                self.zadd(key, member, *score)?;
            }
            Command::ZRem { key, member } => {
                self.zrem(key, member)?;
            }
        }

        Ok(())
    }

    /// Apply a write batch in order, aborting at the first failure.
    fn apply(&self, batch: &Batch) -> Result<(), KvError> {
        for (index, command) in batch.commands().iter().enumerate() {
            self.run(command).map_err(|source| KvError::BatchAborted {
                index,
                source: Box::new(source),
            })?;
        }

        Ok(())
    }
}

///
/// TESTS
///
