//! Module: key
//! Responsibility: deterministic key naming for every structure the engine
//! writes, plus escaping of caller-supplied value segments.
//! Does not own: storage access or schema validation.
//! Boundary: the only place key text is composed; no other module formats keys.

use crate::types::RecordId;
use xxhash_rust::xxh3::xxh3_64;

/// Bytes escaped inside value segments.
/// `:` delimits segments, `*` appears in sort weight patterns, `#` marks
/// system segments, `~` prefixes ephemeral keys, `%` introduces escapes.
const RESERVED: &[u8] = b":%*#~";

/// Whether a model or field name may be embedded in keys verbatim.
#[must_use]
pub fn is_clean_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| !RESERVED.contains(&b) && !b.is_ascii_control())
}

/// Percent-escape a value segment so it can never collide with key
/// structure. Escaping `%` itself keeps the mapping injective; non-ASCII
/// text passes through untouched.
#[must_use]
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() {
            let b = c as u8;
            if RESERVED.contains(&b) || b.is_ascii_control() {
                out.push('%');
                out.push_str(&format!("{b:02X}"));
                continue;
            }
        }
        out.push(c);
    }

    out
}

fn digest(inputs: &[String]) -> u64 {
    let mut buf = Vec::new();
    for input in inputs {
        buf.extend_from_slice(input.as_bytes());
        buf.push(0);
    }

    xxh3_64(&buf)
}

///
/// KeySpace
/// Key namespace for one registered model. Layout:
///
/// ```text
/// {model}:{id}                 record row (hash)
/// {model}:{id}:{field}         list field storage
/// {model}:#all                 membership set
/// {model}:#seq                 id sequence counter
/// {model}:{id}:#idx            pointer set (attribute/element index keys)
/// {model}:{id}:#zidx           range pointer set
/// {model}:{field}:{value}      attribute index
/// {model}:{field}:#e:{value}   element index (list fields)
/// {model}:{field}:#z           range index (sorted set)
/// {model}:{field}:#u           unique lookup hash
/// {model}:*->{field}           sort weight pattern
/// ~{model}:{op}:{hash}.{token} ephemeral set or list
/// ```
///
/// Value segments are escaped; `#` segments cannot be produced by any
/// escaped value, so system keys never collide with attribute keys.
///

#[derive(Clone, Debug)]
pub struct KeySpace {
    model: String,
}

impl KeySpace {
    pub(crate) fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    #[must_use]
    pub fn record(&self, id: RecordId) -> String {
        format!("{}:{id}", self.model)
    }

    #[must_use]
    pub fn list_field(&self, id: RecordId, field: &str) -> String {
        format!("{}:{id}:{field}", self.model)
    }

    #[must_use]
    pub fn membership(&self) -> String {
        format!("{}:#all", self.model)
    }

    #[must_use]
    pub fn sequence(&self) -> String {
        format!("{}:#seq", self.model)
    }

    #[must_use]
    pub fn pointer_set(&self, id: RecordId) -> String {
        format!("{}:{id}:#idx", self.model)
    }

    #[must_use]
    pub fn range_pointer_set(&self, id: RecordId) -> String {
        format!("{}:{id}:#zidx", self.model)
    }

    #[must_use]
    pub fn attribute_index(&self, field: &str, storage: &str) -> String {
        format!("{}:{field}:{}", self.model, escape(storage))
    }

    #[must_use]
    pub fn element_index(&self, field: &str, storage: &str) -> String {
        format!("{}:{field}:#e:{}", self.model, escape(storage))
    }

    #[must_use]
    pub fn range_index(&self, field: &str) -> String {
        format!("{}:{field}:#z", self.model)
    }

    #[must_use]
    pub fn unique_lookup(&self, field: &str) -> String {
        format!("{}:{field}:#u", self.model)
    }

    /// Weight pattern for store-side sort: `*` is replaced by each member
    /// id and `->` dereferences a row hash field.
    #[must_use]
    pub fn sort_weight(&self, field: &str) -> String {
        format!("{}:*->{field}", self.model)
    }

    /// Name an ephemeral key from its composing inputs, an operator
    /// marker, and the evaluating query's token. The digest bounds key
    /// length; the token keeps concurrent evaluations collision-free.
    #[must_use]
    pub fn ephemeral(&self, op: char, inputs: &[String], token: u64) -> String {
        format!("~{}:{op}:{:016x}.{token}", self.model, digest(inputs))
    }
}

///
/// TESTS
///
