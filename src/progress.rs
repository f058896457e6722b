// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2025 Michael Dippery <michael@monkey-robot.com>

//! Progress reports for long fetches.
//!
//! Reports are plain lines on standard error, such as
//! `Progress: 100/1000 posts fetched (~9m remaining)...`, rather than a
//! redrawn progress bar, so they read the same in a terminal, a log file,
//! or a pipe. The remaining-time estimate is a simple rate extrapolation
//! from an injected [`Clock`].

use crate::clock::{Clock, DateTime, SystemClock, Utc};
use crate::listing::{PaginationState, Reporter};
use log::debug;
use std::io::{self, Stderr, Write};

/// Periodically tells the user how far along a fetch is.
///
/// A line is written every `every` records. When the total number of
/// records is known, the report includes a rough estimate of the time
/// remaining, based on the rate so far.
#[derive(Debug)]
pub struct Progress<C = SystemClock, W = Stderr> {
    clock: C,
    out: W,
    every: usize,
    total: Option<usize>,
    noun: &'static str,
    started: DateTime<Utc>,
}

impl Progress {
    /// Reports progress on standard error.
    pub fn stderr(every: usize, total: Option<usize>, noun: &'static str) -> Self {
        Self::new(SystemClock, io::stderr(), every, total, noun)
    }
}

impl<C: Clock, W: Write> Progress<C, W> {
    /// Reports progress to `out`, timing it with `clock`.
    pub fn new(clock: C, out: W, every: usize, total: Option<usize>, noun: &'static str) -> Self {
        let started = clock.now();
        Self {
            clock,
            out,
            every: every.max(1),
            total,
            noun,
            started,
        }
    }

    /// Measures elapsed time from `started` instead of from creation.
    pub fn started_at(mut self, started: DateTime<Utc>) -> Self {
        self.started = started;
        self
    }

    /// Notes that `fetched` records have been pulled so far, writing a
    /// report if one is due.
    pub fn record(&mut self, fetched: usize) {
        if fetched == 0 || fetched % self.every != 0 {
            return;
        }
        let line = self.line(fetched);
        if let Err(err) = writeln!(self.out, "{line}") {
            debug!("could not report progress: {err}");
        }
    }

    fn line(&self, fetched: usize) -> String {
        match self.total {
            Some(total) => format!(
                "Progress: {fetched}/{total} {} fetched (~{}m remaining)...",
                self.noun,
                self.minutes_remaining(fetched, total)
            ),
            None => format!("Progress: {fetched} {} fetched...", self.noun),
        }
    }

    fn minutes_remaining(&self, fetched: usize, total: usize) -> i64 {
        let elapsed = self.clock.since(self.started).num_milliseconds();
        if elapsed <= 0 || fetched == 0 {
            return 0;
        }
        let remaining = total.saturating_sub(fetched) as f64;
        let ms_per_record = elapsed as f64 / fetched as f64;
        (remaining * ms_per_record / 60_000.0).floor() as i64
    }

    /// The underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<C: Clock, W: Write> Reporter for Progress<C, W> {
    fn fetched(&mut self, state: &PaginationState) {
        self.record(state.fetched());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TimeDelta;
    use crate::test_utils::FrozenClock;
    use pretty_assertions::assert_eq;

    fn output(progress: Progress<FrozenClock, Vec<u8>>) -> String {
        String::from_utf8(progress.into_inner()).unwrap()
    }

    #[test]
    fn it_reports_every_n_records() {
        let mut progress = Progress::new(FrozenClock::default(), Vec::new(), 5, None, "subreddits");
        for n in 1..=12 {
            progress.record(n);
        }
        assert_eq!(
            output(progress),
            "Progress: 5 subreddits fetched...\nProgress: 10 subreddits fetched...\n"
        );
    }

    #[test]
    fn it_estimates_time_remaining() {
        let now = DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let clock = FrozenClock::new(now);
        let started = now - TimeDelta::seconds(60);
        let mut progress =
            Progress::new(clock, Vec::new(), 10, Some(1000), "posts").started_at(started);
        progress.record(100);
        assert_eq!(
            output(progress),
            "Progress: 100/1000 posts fetched (~9m remaining)...\n"
        );
    }

    #[test]
    fn it_estimates_nothing_before_time_has_passed() {
        let mut progress = Progress::new(FrozenClock::default(), Vec::new(), 10, Some(50), "posts");
        progress.record(10);
        assert_eq!(output(progress), "Progress: 10/50 posts fetched (~0m remaining)...\n");
    }

    #[test]
    fn it_stays_quiet_between_reports() {
        let mut progress = Progress::new(FrozenClock::default(), Vec::new(), 10, Some(50), "posts");
        progress.record(0);
        progress.record(9);
        assert_eq!(output(progress), "");
    }
}
