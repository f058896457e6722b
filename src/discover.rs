// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2025 Michael Dippery <michael@monkey-robot.com>

//! Discovers subreddits by search, popularity, age, or recommendation.

use crate::clock::Clock;
use crate::interrupt::Interrupt;
use crate::progress::Progress;
use crate::reddit::service::Service;
use crate::reddit::{Error, ListingSource, RedditClient, Subreddit};
use clap::ValueEnum;
use log::{info, warn};
use std::cmp::Reverse;
use std::io::Write;

/// Number of subreddits fetched by default.
pub const DEFAULT_LIMIT: usize = 25;

/// How subreddits are discovered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Method {
    /// Subreddits matching a search query.
    Search(String),

    /// The most popular subreddits.
    Popular,

    /// Newly created subreddits.
    New,

    /// Subreddits similar to the given subreddits.
    Recommend(Vec<String>),
}

impl Method {
    /// Parses a comma-separated list of seed subreddits for recommendations.
    ///
    /// # Examples
    ///
    /// ```
    /// use redscout::discover::Method;
    /// assert_eq!(
    ///     Method::recommend("rust, golang,,zig"),
    ///     Method::Recommend(vec!["rust".into(), "golang".into(), "zig".into()])
    /// );
    /// ```
    pub fn recommend(seeds: &str) -> Self {
        let seeds = seeds
            .split(',')
            .map(str::trim)
            .filter(|seed| !seed.is_empty())
            .map(String::from)
            .collect();
        Method::Recommend(seeds)
    }

    /// Heading for a list of subreddits found with this method.
    pub fn heading(&self) -> String {
        match self {
            Method::Search(query) => format!("Subreddit Search Results for: \"{query}\""),
            Method::Popular => "Popular Subreddits".to_string(),
            Method::New => "Newly Created Subreddits".to_string(),
            Method::Recommend(_) => "Recommended Subreddits".to_string(),
        }
    }

    /// Status line announcing what is about to be fetched.
    pub fn announcement(&self, limit: usize) -> String {
        match self {
            Method::Search(query) => format!("Searching for subreddits matching: \"{query}\"..."),
            Method::Popular => format!("Fetching {limit} popular subreddits..."),
            Method::New => format!("Fetching {limit} newly created subreddits..."),
            Method::Recommend(seeds) => {
                format!("Getting recommendations based on: {}...", seeds.join(", "))
            }
        }
    }
}

/// Order in which discovered subreddits are listed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    /// The order Reddit returned them in.
    #[default]
    Relevance,
    SubscribersDesc,
    SubscribersAsc,
    ActivityDesc,
    ActivityAsc,
    CreatedDesc,
    CreatedAsc,
    /// Alphabetically, ignoring case.
    Name,
}

impl SortOrder {
    /// Sorts `subreddits` in place. Ties keep their original order.
    pub fn sort(&self, subreddits: &mut [Subreddit]) {
        match self {
            SortOrder::Relevance => {}
            SortOrder::SubscribersDesc => subreddits.sort_by_key(|s| Reverse(s.subscribers)),
            SortOrder::SubscribersAsc => subreddits.sort_by_key(|s| s.subscribers),
            SortOrder::ActivityDesc => subreddits.sort_by_key(|s| Reverse(s.active_users)),
            SortOrder::ActivityAsc => subreddits.sort_by_key(|s| s.active_users),
            SortOrder::CreatedDesc => subreddits.sort_by_key(|s| Reverse(s.created_utc)),
            SortOrder::CreatedAsc => subreddits.sort_by_key(|s| s.created_utc),
            SortOrder::Name => subreddits.sort_by_key(|s| s.name.to_lowercase()),
        }
    }
}

/// Criteria a discovered subreddit must meet to be shown.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubredditFilter {
    min_subscribers: Option<u64>,
    max_subscribers: Option<u64>,
    min_activity: Option<u64>,
    exclude_nsfw: bool,
}

impl SubredditFilter {
    pub fn min_subscribers(mut self, n: Option<u64>) -> Self {
        self.min_subscribers = n;
        self
    }

    pub fn max_subscribers(mut self, n: Option<u64>) -> Self {
        self.max_subscribers = n;
        self
    }

    pub fn min_activity(mut self, n: Option<u64>) -> Self {
        self.min_activity = n;
        self
    }

    pub fn exclude_nsfw(mut self, exclude_nsfw: bool) -> Self {
        self.exclude_nsfw = exclude_nsfw;
        self
    }

    /// True if `subreddit` meets every criterion.
    pub fn accepts(&self, subreddit: &Subreddit) -> bool {
        self.min_subscribers.is_none_or(|n| subreddit.subscribers >= n)
            && self.max_subscribers.is_none_or(|n| subreddit.subscribers <= n)
            && self.min_activity.is_none_or(|n| subreddit.active_users >= n)
            && !(self.exclude_nsfw && subreddit.over_18)
    }
}

/// Subreddits found by one discovery run.
#[derive(Debug)]
pub struct Discovery {
    pub method: Method,
    /// Subreddits that passed the filter, in display order.
    pub subreddits: Vec<Subreddit>,
    /// Number of subreddits fetched before filtering.
    pub fetched: usize,
    /// True if the user interrupted the fetch.
    pub interrupted: bool,
}

impl Discovery {
    /// True if filtering removed any of the fetched subreddits.
    pub fn is_filtered(&self) -> bool {
        self.fetched != self.subreddits.len()
    }
}

/// Finds subreddits using a [`RedditClient`].
#[derive(Debug)]
pub struct Discoverer<'a, S> {
    client: &'a RedditClient<S>,
    limit: usize,
    filter: SubredditFilter,
    sort: SortOrder,
    interrupt: Interrupt,
}

impl<'a, S: Service> Discoverer<'a, S> {
    /// Creates a discoverer that fetches up to `limit` subreddits.
    pub fn new(client: &'a RedditClient<S>, limit: usize) -> Self {
        Self {
            client,
            limit,
            filter: SubredditFilter::default(),
            sort: SortOrder::default(),
            interrupt: Interrupt::default(),
        }
    }

    pub fn filter(mut self, filter: SubredditFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Fetches subreddits using `method`, then filters and sorts them.
    ///
    /// Fails if nothing could be fetched at all. If the fetch fails or is
    /// interrupted partway, the subreddits fetched so far are kept.
    pub async fn discover<C: Clock, W: Write>(
        &self,
        method: Method,
        progress: &mut Progress<C, W>,
    ) -> Result<Discovery, Error> {
        let (fetched, interrupted) = match &method {
            Method::Search(query) => {
                let source = self.client.search_subreddits(query, self.limit);
                self.collect(source, progress).await?
            }
            Method::Popular => {
                let source = self.client.popular_subreddits(self.limit);
                self.collect(source, progress).await?
            }
            Method::New => {
                let source = self.client.new_subreddits(self.limit);
                self.collect(source, progress).await?
            }
            Method::Recommend(seeds) => {
                let source = self.client.recommended_subreddits(seeds.clone(), self.limit);
                self.collect(source, progress).await?
            }
        };

        let total = fetched.len();
        let mut subreddits: Vec<Subreddit> =
            fetched.into_iter().filter(|s| self.filter.accepts(s)).collect();
        self.sort.sort(&mut subreddits);
        info!("kept {} of {total} subreddits", subreddits.len());

        Ok(Discovery {
            method,
            subreddits,
            fetched: total,
            interrupted,
        })
    }

    async fn collect<L, C, W>(
        &self,
        mut source: L,
        progress: &mut Progress<C, W>,
    ) -> Result<(Vec<Subreddit>, bool), Error>
    where
        L: ListingSource<Item = Subreddit>,
        C: Clock,
        W: Write,
    {
        let mut subreddits = Vec::new();
        loop {
            if self.interrupt.is_tripped() {
                return Ok((subreddits, true));
            }
            match source.next_item().await {
                Ok(Some(subreddit)) => {
                    subreddits.push(subreddit);
                    progress.record(subreddits.len());
                }
                Ok(None) => return Ok((subreddits, false)),
                Err(err) if subreddits.is_empty() => return Err(err),
                Err(err) => {
                    warn!("stopped after {} subreddits: {err}", subreddits.len());
                    return Ok((subreddits, false));
                }
            }
        }
    }
}
