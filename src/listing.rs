// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2025 Michael Dippery <michael@monkey-robot.com>

//! Walks a subreddit's top posts, filtering them as they arrive.
//!
//! A [`Walker`] pulls posts one at a time from a [`ListingSource`] and
//! yields only those whose titles match an optional [`TitleFilter`]. Posts
//! are judged as soon as they are pulled, so memory use is bounded by the
//! source's page size rather than by the total number of posts. Posts are
//! yielded in exactly the order the source returns them.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use redscout::conf::Credentials;
//! use redscout::filter::TitleFilter;
//! use redscout::listing::{Limit, Walker};
//! use redscout::reddit::{RedditClient, TimeWindow};
//!
//! let client = RedditClient::new(Credentials::from_env()?)?;
//! let limit = Limit::new(50);
//! let source = client.top_posts("learnpython", TimeWindow::Month, limit.get());
//! let mut walker = Walker::new(source, limit).filter(Some(TitleFilter::new("tutorial")?));
//! while let Some(post) = walker.next().await? {
//!     println!("{}", post.title);
//! }
//! # Ok(())
//! # }
//! ```

use crate::filter::{Searchable, TitleFilter};
use crate::interrupt::Interrupt;
use crate::reddit::{Error, ListingSource, Post};
use log::{debug, info};

/// Most posts Reddit will ever return for a single listing.
pub const MAX_LIMIT: usize = 1000;

/// The maximum number of posts to pull from a listing.
///
/// Reddit will not return more than [`MAX_LIMIT`] posts for any listing,
/// so larger requests are clamped, not rejected. The limit remembers
/// whether it was clamped so the caller can say so.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limit {
    value: usize,
    requested: usize,
}

impl Limit {
    /// Creates a limit from the number of posts the caller asked for.
    ///
    /// # Examples
    ///
    /// ```
    /// use redscout::listing::Limit;
    /// let limit = Limit::new(5000);
    /// assert_eq!(limit.get(), 1000);
    /// assert!(limit.was_clamped());
    /// ```
    pub fn new(requested: usize) -> Self {
        let value = requested.clamp(1, MAX_LIMIT);
        Self { value, requested }
    }

    /// The effective limit.
    pub fn get(&self) -> usize {
        self.value
    }

    /// The number of posts originally requested.
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// True if the requested number exceeded what Reddit allows.
    pub fn was_clamped(&self) -> bool {
        self.requested > MAX_LIMIT
    }
}

impl Default for Limit {
    fn default() -> Self {
        Self::new(MAX_LIMIT)
    }
}

/// Why a walk ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The source had no more posts.
    Exhausted,

    /// The walker pulled as many posts as its limit allows.
    LimitReached,

    /// The walk was interrupted by the user.
    Interrupted,

    /// The source reported an error.
    Failed,
}

/// Running totals for one walk over a listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaginationState {
    fetched: usize,
    matched: usize,
    rank: usize,
    stop: Option<StopReason>,
}

impl PaginationState {
    /// Number of posts pulled from the source so far.
    ///
    /// This is also the 1-based rank of the most recently pulled post.
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// Number of posts that matched the filter and were yielded.
    pub fn matched(&self) -> usize {
        self.matched
    }

    /// The source rank of the most recently yielded post, starting at 1,
    /// or 0 if nothing has been yielded yet.
    pub fn last_rank(&self) -> usize {
        self.rank
    }

    /// Why the walk ended, or `None` if it is still in progress.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop
    }

    /// True if the walk ended because the user interrupted it.
    pub fn was_interrupted(&self) -> bool {
        self.stop == Some(StopReason::Interrupted)
    }
}

/// Something that wants to hear about every post pulled from the source,
/// matching or not.
pub trait Reporter {
    /// Called after each post is pulled, before it is filtered.
    fn fetched(&mut self, state: &PaginationState);
}

impl Reporter for () {
    fn fetched(&mut self, _: &PaginationState) {}
}

/// Pulls posts from a listing, yielding those that match a filter.
///
/// A walker is single-use: once it stops it never yields again, and a new
/// walk starts over from the first page.
#[derive(Debug)]
pub struct Walker<L, R = ()> {
    source: L,
    limit: Limit,
    filter: Option<TitleFilter>,
    interrupt: Interrupt,
    reporter: R,
    state: PaginationState,
}

impl<L: ListingSource<Item = Post>> Walker<L> {
    /// Creates a walker that pulls at most `limit` posts from `source`.
    pub fn new(source: L, limit: Limit) -> Self {
        Self {
            source,
            limit,
            filter: None,
            interrupt: Interrupt::default(),
            reporter: (),
            state: PaginationState::default(),
        }
    }
}

impl<L: ListingSource<Item = Post>, R: Reporter> Walker<L, R> {
    /// Only yield posts whose titles match `filter`.
    pub fn filter(mut self, filter: Option<TitleFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Stop early when `interrupt` is tripped.
    pub fn interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Tell `reporter` about every post pulled from the source.
    pub fn reporter<R2: Reporter>(self, reporter: R2) -> Walker<L, R2> {
        Walker {
            source: self.source,
            limit: self.limit,
            filter: self.filter,
            interrupt: self.interrupt,
            reporter,
            state: self.state,
        }
    }

    /// The walker's limit.
    pub fn limit(&self) -> Limit {
        self.limit
    }

    /// Running totals for the walk.
    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    /// The next matching post, or `None` when the walk is over.
    ///
    /// The walk ends when the source is exhausted, the limit is reached,
    /// or the interrupt is tripped; the interrupt is checked between posts.
    /// If the source fails, the error is returned and the walk ends, but
    /// everything yielded before the failure remains valid.
    pub async fn next(&mut self) -> Result<Option<Post>, Error> {
        loop {
            if self.state.stop.is_some() {
                return Ok(None);
            }
            if self.interrupt.is_tripped() {
                info!("interrupted after {} posts", self.state.fetched);
                self.state.stop = Some(StopReason::Interrupted);
                return Ok(None);
            }
            if self.state.fetched >= self.limit.get() {
                self.state.stop = Some(StopReason::LimitReached);
                return Ok(None);
            }

            let post = match self.source.next_item().await {
                Ok(Some(post)) => post,
                Ok(None) => {
                    self.state.stop = Some(StopReason::Exhausted);
                    return Ok(None);
                }
                Err(err) => {
                    self.state.stop = Some(StopReason::Failed);
                    return Err(err);
                }
            };

            self.state.fetched += 1;
            self.reporter.fetched(&self.state);

            let matches = self.filter.as_ref().is_none_or(|filter| post.matches(filter));
            if matches {
                self.state.matched += 1;
                self.state.rank = self.state.fetched;
                return Ok(Some(post));
            }
            debug!("post {} did not match: {}", post.id, post.title);
        }
    }

    /// Walks to the end, collecting every matching post.
    ///
    /// A source failure does not discard the posts collected before it;
    /// the error is returned alongside them.
    pub async fn walk(mut self) -> Walk {
        let mut posts = Vec::new();
        let error = loop {
            match self.next().await {
                Ok(Some(post)) => posts.push(post),
                Ok(None) => break None,
                Err(err) => break Some(err),
            }
        };
        Walk {
            posts,
            state: self.state,
            error,
        }
    }
}

/// The result of walking a listing to the end.
#[derive(Debug)]
pub struct Walk {
    /// Matching posts, in source order.
    pub posts: Vec<Post>,

    /// Final totals.
    pub state: PaginationState,

    /// The error that ended the walk early, if any.
    pub error: Option<Error>,
}
