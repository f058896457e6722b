// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2025 Michael Dippery <michael@monkey-robot.com>

//! All things time-related.

pub use chrono::{DateTime, TimeDelta, Utc};

/// Tells time and returns the time.
///
/// Generally you will want to retrieve time using [`SystemClock`],
/// but in tests you may want to implement a `Clock` with a fixed time.
pub trait Clock {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;

    /// Time elapsed since `start`.
    fn since(&self, start: DateTime<Utc>) -> TimeDelta {
        self.now() - start
    }
}

/// Interacts with the system clock to get the current time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Marks a thing that knows when it was created.
pub trait HasAge {
    /// The date the item was created, in UTC.
    fn created_utc(&self) -> DateTime<Utc>;

    /// The calendar date the item was created, as `YYYY-MM-DD` in UTC.
    fn created_date(&self) -> String {
        self.created_utc().format("%Y-%m-%d").to_string()
    }
}

/// Converts a Unix timestamp, as returned by the Reddit API, into a UTC date.
///
/// Reddit reports timestamps as floating-point seconds; fractional seconds
/// are discarded. Timestamps that cannot be represented fall back to the
/// Unix epoch.
pub fn from_timestamp(timestamp: f64) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp.trunc() as i64, 0).unwrap_or_default()
}
