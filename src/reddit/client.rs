// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2025 Michael Dippery <michael@monkey-robot.com>

//! Clients for reading data from the Reddit API.
//!
//! [`RedditClient`] is the remote source behind every command. It exposes
//! Reddit's listings as pull-based [`ListingSource`]s that fetch one page
//! at a time, and comment threads as a [`CommentSource`] whose "load more
//! comments" placeholders can be expanded on demand.

use crate::conf::Credentials;
use crate::http::HTTPError;
use crate::reddit::service::{RedditService, Service};
use crate::reddit::thing::{
    self, CommentSlot, FromThing, MoreComments, Page, Post, Subreddit, parse_more_children,
    parse_recommendations, parse_thread,
};
use clap::ValueEnum;
use log::{debug, info, warn};
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Most items Reddit will return in a single listing request.
pub const PAGE_SIZE: usize = 100;

/// Most comment IDs Reddit will expand in a single `morechildren` request.
const MORE_CHILDREN_BATCH: usize = 100;

/// Default pause between consecutive page requests.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(1);

/// A client error.
#[derive(Debug, Error)]
pub enum Error {
    /// The subreddit or post does not exist, or is private, banned, or
    /// quarantined. Retrying will not help.
    #[error("{0} is unavailable: it may not exist, or it may be private, banned, or quarantined")]
    SourceUnavailable(String),

    /// Reddit did not accept the configured credentials.
    #[error("Authentication failed: {0}")]
    Auth(HTTPError),

    /// Reddit could not be reached, even after retrying.
    #[error("Could not reach Reddit: {0}")]
    Transient(HTTPError),

    /// Reddit returned a response we did not expect.
    #[error("Service error: {0}")]
    Service(HTTPError),

    /// An error parsing data.
    #[error("Parse error: {0}")]
    Parse(#[from] thing::Error),
}

impl Error {
    /// Classifies an HTTP error that occurred while requesting `resource`.
    pub fn classify(err: HTTPError, resource: impl Into<String>) -> Self {
        if matches!(err, HTTPError::Token(_)) {
            return Error::Auth(err);
        }
        match err.status() {
            Some(status)
                if status.is_redirection()
                    || status == StatusCode::FORBIDDEN
                    || status == StatusCode::NOT_FOUND
                    || status == StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS =>
            {
                Error::SourceUnavailable(resource.into())
            }
            Some(StatusCode::UNAUTHORIZED) => Error::Auth(err),
            _ if err.is_transient() => Error::Transient(err),
            _ => Error::Service(err),
        }
    }

    /// True if the requested subreddit or post cannot be retrieved at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::SourceUnavailable(_))
    }
}

/// Recency window used when ranking "top" posts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum TimeWindow {
    Hour,
    Day,
    #[default]
    Week,
    Month,
    Year,
    All,
}

impl TimeWindow {
    /// Value of the `t` query parameter for this window.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Hour => "hour",
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
            TimeWindow::Month => "month",
            TimeWindow::Year => "year",
            TimeWindow::All => "all",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lazily-fetched, ordered sequence of records.
///
/// Each call to [`ListingSource::next_item()`] returns the next record in
/// the order the remote service ranks them, fetching another page only
/// when the previous one has been used up.
pub trait ListingSource {
    /// The type of record produced by the source.
    type Item;

    /// The next record, or `None` once the listing is exhausted.
    fn next_item(&mut self) -> impl Future<Output = Result<Option<Self::Item>, Error>>;
}

/// A source of comment threads.
pub trait CommentSource {
    /// Retrieves a post and the first installment of its comment forest.
    fn thread(
        &self,
        post_id: &str,
    ) -> impl Future<Output = Result<(Post, Vec<CommentSlot>), Error>>;

    /// Replaces a "load more comments" placeholder with the comments it
    /// stands for.
    ///
    /// The returned slots are siblings that take the placeholder's place;
    /// they may themselves contain further placeholders.
    fn expand(
        &self,
        post_id: &str,
        more: &MoreComments,
    ) -> impl Future<Output = Result<Vec<CommentSlot>, Error>>;
}

/// Reads data from the Reddit API.
#[derive(Debug)]
pub struct RedditClient<S = RedditService> {
    service: S,
    page_delay: Duration,
}

impl RedditClient<RedditService> {
    /// Creates a new client that talks to the Reddit API using `credentials`.
    pub fn new(credentials: Credentials) -> Result<Self, Error> {
        let service = RedditService::new(credentials).map_err(Error::Service)?;
        Ok(Self::with_service(service))
    }
}

impl<S: Service> RedditClient<S> {
    /// Creates a new client that uses `service` to retrieve data.
    pub fn with_service(service: S) -> Self {
        Self {
            service,
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }

    /// Sets the pause between consecutive page requests.
    pub fn page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    /// The underlying service.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Top posts in `subreddit` for the given time `window`, fetching at
    /// most `limit` posts in total.
    pub fn top_posts(&self, subreddit: &str, window: TimeWindow, limit: usize) -> Paginator<'_, S, Post> {
        Paginator::new(
            self,
            format!("/r/{subreddit}/top"),
            vec![("t", window.as_str().to_string())],
            format!("r/{subreddit}"),
            limit,
        )
    }

    /// Subreddits matching `query`.
    pub fn search_subreddits(&self, query: &str, limit: usize) -> Paginator<'_, S, Subreddit> {
        Paginator::new(
            self,
            "/subreddits/search".to_string(),
            vec![("q", query.to_string())],
            "subreddit search".to_string(),
            limit,
        )
    }

    /// The most popular subreddits.
    pub fn popular_subreddits(&self, limit: usize) -> Paginator<'_, S, Subreddit> {
        Paginator::new(
            self,
            "/subreddits/popular".to_string(),
            vec![],
            "popular subreddits".to_string(),
            limit,
        )
    }

    /// Newly created subreddits.
    pub fn new_subreddits(&self, limit: usize) -> Paginator<'_, S, Subreddit> {
        Paginator::new(
            self,
            "/subreddits/new".to_string(),
            vec![],
            "new subreddits".to_string(),
            limit,
        )
    }

    /// Subreddits Reddit recommends to readers of `seeds`.
    pub fn recommended_subreddits(&self, seeds: Vec<String>, limit: usize) -> Recommendations<'_, S> {
        Recommendations {
            client: self,
            seeds,
            names: None,
            remaining: limit,
        }
    }

    async fn fetch(&self, path: &str, query: &[(&str, String)], resource: &str) -> Result<String, Error> {
        self.service
            .get(path, query)
            .await
            .map_err(|err| Error::classify(err, resource))
    }

    async fn about(&self, subreddit: &str) -> Result<Subreddit, Error> {
        let resource = format!("r/{subreddit}");
        let data = self.fetch(&format!("/r/{subreddit}/about"), &[], &resource).await?;
        Ok(Subreddit::parse_about(&data)?)
    }
}

impl<S: Service> CommentSource for RedditClient<S> {
    async fn thread(&self, post_id: &str) -> Result<(Post, Vec<CommentSlot>), Error> {
        let resource = format!("post {post_id}");
        let data = self.fetch(&format!("/comments/{post_id}"), &[], &resource).await?;
        Ok(parse_thread(&data)?)
    }

    async fn expand(&self, post_id: &str, more: &MoreComments) -> Result<Vec<CommentSlot>, Error> {
        if more.is_continuation() {
            return self.continue_thread(post_id, more).await;
        }

        let batch = more.children.len().min(MORE_CHILDREN_BATCH);
        let (ids, leftover) = more.children.split_at(batch);
        debug!(
            "expanding {} of {} hidden comments under {}",
            ids.len(),
            more.children.len(),
            more.parent_id
        );

        let query = [
            ("api_type", "json".to_string()),
            ("link_id", format!("t3_{post_id}")),
            ("children", ids.join(",")),
            ("limit_children", "false".to_string()),
        ];
        let resource = format!("post {post_id}");
        let data = self.fetch("/api/morechildren", &query, &resource).await?;
        let mut slots = parse_more_children(&data, &more.parent_id)?;

        if !leftover.is_empty() {
            slots.push(CommentSlot::More(MoreComments {
                id: more.id.clone(),
                parent_id: more.parent_id.clone(),
                count: leftover.len() as u64,
                children: leftover.to_vec(),
            }));
        }
        Ok(slots)
    }
}

impl<S: Service> RedditClient<S> {
    /// Expands a "continue this thread" placeholder by fetching the
    /// sub-thread rooted at the placeholder's parent comment.
    async fn continue_thread(&self, post_id: &str, more: &MoreComments) -> Result<Vec<CommentSlot>, Error> {
        let Some(parent) = more.parent_id.strip_prefix("t1_") else {
            return Ok(Vec::new());
        };
        debug!("continuing thread below comment {parent}");

        let query = [("comment", parent.to_string())];
        let resource = format!("post {post_id}");
        let data = self.fetch(&format!("/comments/{post_id}"), &query, &resource).await?;
        let (_, roots) = parse_thread(&data)?;

        let replies = roots.into_iter().find_map(|slot| match slot {
            CommentSlot::Comment(comment) if comment.id == parent => Some(comment.replies),
            _ => None,
        });
        Ok(replies.unwrap_or_default())
    }
}

/// Walks a paginated Reddit listing one record at a time.
///
/// Pages of up to [`PAGE_SIZE`] records are fetched lazily using Reddit's
/// `after` cursor, so at most one page is held in memory. The paginator
/// never requests more than its limit in total.
#[derive(Debug)]
pub struct Paginator<'a, S, T> {
    client: &'a RedditClient<S>,
    path: String,
    params: Vec<(&'static str, String)>,
    resource: String,
    remaining: usize,
    after: Option<String>,
    buffer: VecDeque<T>,
    pages: usize,
    received: usize,
    exhausted: bool,
}

impl<'a, S: Service, T: FromThing> Paginator<'a, S, T> {
    fn new(
        client: &'a RedditClient<S>,
        path: String,
        params: Vec<(&'static str, String)>,
        resource: String,
        limit: usize,
    ) -> Self {
        Self {
            client,
            path,
            params,
            resource,
            remaining: limit,
            after: None,
            buffer: VecDeque::new(),
            pages: 0,
            received: 0,
            exhausted: false,
        }
    }

    /// Number of pages requested so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    async fn fetch_page(&mut self) -> Result<(), Error> {
        if self.pages > 0 && !self.client.page_delay.is_zero() {
            tokio::time::sleep(self.client.page_delay).await;
        }

        let batch = self.remaining.min(PAGE_SIZE);
        let mut query = self.params.clone();
        query.push(("limit", batch.to_string()));
        if let Some(after) = &self.after {
            query.push(("after", after.clone()));
            query.push(("count", self.received.to_string()));
        }

        let data = self.client.fetch(&self.path, &query, &self.resource).await?;
        let page = Page::<T>::parse(&data)?;
        self.pages += 1;

        let mut items = page.items;
        items.truncate(self.remaining);
        info!(
            "fetched page {} of {} ({} records)",
            self.pages,
            self.resource,
            items.len()
        );

        self.remaining -= items.len();
        self.received += items.len();
        self.exhausted = page.after.is_none() || items.is_empty();
        self.after = page.after;
        self.buffer.extend(items);
        Ok(())
    }
}

impl<S: Service, T: FromThing> ListingSource for Paginator<'_, S, T> {
    type Item = T;

    async fn next_item(&mut self) -> Result<Option<T>, Error> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            if self.exhausted || self.remaining == 0 {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }
}

/// Subreddits recommended for a set of seed subreddits.
///
/// The recommendation endpoint only returns names, so each subreddit's
/// details are looked up as it is pulled. Subreddits that turn out to be
/// unavailable are skipped.
#[derive(Debug)]
pub struct Recommendations<'a, S> {
    client: &'a RedditClient<S>,
    seeds: Vec<String>,
    names: Option<VecDeque<String>>,
    remaining: usize,
}

impl<S: Service> ListingSource for Recommendations<'_, S> {
    type Item = Subreddit;

    async fn next_item(&mut self) -> Result<Option<Subreddit>, Error> {
        if self.names.is_none() {
            let seeds = self.seeds.join(",");
            let data = self
                .client
                .fetch(
                    &format!("/api/recommend/sr/{seeds}"),
                    &[("omit", String::new())],
                    "subreddit recommendations",
                )
                .await?;
            self.names = Some(parse_recommendations(&data)?.into());
        }

        while self.remaining > 0 {
            let Some(name) = self.names.as_mut().and_then(VecDeque::pop_front) else {
                break;
            };
            match self.client.about(&name).await {
                Ok(subreddit) => {
                    self.remaining -= 1;
                    return Ok(Some(subreddit));
                }
                Err(err) if err.is_unavailable() => warn!("skipping r/{name}: {err}"),
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }
}

/// Extracts a bare post ID from an ID, a `t3_` fullname, or a post URL.
///
/// # Examples
///
/// ```
/// use redscout::reddit::client::post_id;
/// assert_eq!(post_id("abc123"), "abc123");
/// assert_eq!(post_id("t3_abc123"), "abc123");
/// assert_eq!(
///     post_id("https://www.reddit.com/r/rust/comments/abc123/some_title/"),
///     "abc123"
/// );
/// ```
pub fn post_id(input: &str) -> String {
    let input = input.trim();
    if let Some((_, rest)) = input.split_once("/comments/") {
        return rest.split('/').next().unwrap_or(rest).to_string();
    }
    input.strip_prefix("t3_").unwrap_or(input).to_string()
}
