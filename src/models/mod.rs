//! Core data models for the filesystem-backed object store.
//!
//! These entities are the rows of the two kinds of metadata tables: the
//! root-level bucket table and the per-bucket object table. They map onto CSV
//! columns via `serde`, with timestamps stored at second precision.

pub mod bucket;
pub mod object;

use chrono::{DateTime, SubsecRound, Utc};

/// Current time truncated to whole seconds, the precision every table stores.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// `serde` adapter for table timestamps, encoded as `YYYY-MM-DDTHH-MM-SS` (UTC).
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|err| serde::de::Error::custom(format!("bad timestamp `{raw}`: {err}")))
    }
}
