//! Per-run tags.
//!
//! A tag is a millisecond UTC timestamp, bumped when needed so that every tag
//! issued in this process is unique and sorts after any tag already in the
//! graph.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

static LAST_ISSUED: AtomicI64 = AtomicI64::new(0);

/// Opaque, strictly monotonic identifier of one sync invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunTag(i64);

impl RunTag {
    /// Issue a new tag greater than every tag issued so far and than `floor`.
    pub fn issue(floor: Option<RunTag>) -> Self {
        let now = Utc::now().timestamp_millis();
        let floor = floor.map_or(i64::MIN, |t| t.0.saturating_add(1));

        let mut last = LAST_ISSUED.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(last.saturating_add(1)).max(floor);
            match LAST_ISSUED.compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => return RunTag(candidate),
                Err(current) => last = current,
            }
        }
    }

    pub fn from_millis(millis: i64) -> Self {
        RunTag(millis)
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// The wall-clock instant the tag encodes.
    pub fn timestamp(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }
}

impl fmt::Display for RunTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
