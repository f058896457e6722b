// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2025 Michael Dippery <michael@monkey-robot.com>

//! A "thing" in the Reddit sense.
//!
//! Historically in the Reddit API and its old source code, a "Thing" was
//! any element of the Reddit system: users, posts, comments, etc. Every
//! thing is delivered as a `{"kind": ..., "data": {...}}` envelope, and
//! collections of things arrive as paginated "listings". This module turns
//! those envelopes into plain Rust structures.
//!
//! Parsing is forgiving at the record level: a single malformed record in a
//! listing is logged and skipped rather than failing the whole page.

use crate::clock::{self, DateTime, HasAge, Utc};
use crate::filter::Searchable;
use crate::text::convert_html_entities;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Body text Reddit uses for deleted comments.
pub const DELETED: &str = "[deleted]";

/// An error parsing a response from the Reddit API.
#[derive(Debug, Error)]
pub enum Error {
    /// The response is not the JSON structure it should be.
    #[error("Could not parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The response is valid JSON but is missing something essential.
    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

/// Result of parsing API data.
pub type Result<T> = std::result::Result<T, Error>;

/// Whether a post is a self (text) post or a link to somewhere else.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostKind {
    /// A self post with (possibly empty) body text.
    Text,

    /// A link to an external page, image, or video.
    Link,
}

impl PostKind {
    /// Short lowercase label for the kind of post.
    pub fn label(&self) -> &'static str {
        match self {
            PostKind::Text => "text",
            PostKind::Link => "link",
        }
    }
}

/// A Reddit post, also known as a submission or, in API parlance, a link.
#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    pub id: String,
    pub title: String,
    /// `None` if the author deleted their account.
    pub author: Option<String>,
    pub score: i64,
    pub num_comments: u64,
    pub created_utc: DateTime<Utc>,
    pub kind: PostKind,
    /// Body of a self post; always `None` for links.
    pub selftext: Option<String>,
    pub url: String,
    pub permalink: String,
    pub subreddit: String,
    pub over_18: bool,
    pub spoiler: bool,
}

impl Post {
    /// Reddit's "fullname" for the post, such as `t3_abc123`.
    pub fn fullname(&self) -> String {
        format!("t3_{}", self.id)
    }

    /// The author's name, or `[deleted]` if the account no longer exists.
    pub fn author_name(&self) -> &str {
        self.author.as_deref().unwrap_or(DELETED)
    }

    /// True if this is a self post.
    pub fn is_self(&self) -> bool {
        self.kind == PostKind::Text
    }

    /// Display flags for the post, such as `NSFW` and `SPOILER`.
    pub fn flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.over_18 {
            flags.push("NSFW");
        }
        if self.spoiler {
            flags.push("SPOILER");
        }
        flags
    }
}

impl Searchable for Post {
    fn search_text(&self) -> &str {
        &self.title
    }
}

impl HasAge for Post {
    fn created_utc(&self) -> DateTime<Utc> {
        self.created_utc
    }
}

/// A comment exactly as the API delivered it, possibly with unexpanded
/// placeholders among its replies.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteComment {
    pub id: String,
    /// Fullname of the parent, either a comment (`t1_`) or the post (`t3_`).
    pub parent_id: String,
    /// `None` if the comment or its author was deleted.
    pub author: Option<String>,
    pub score: i64,
    /// Comment text, or `[deleted]`/`[removed]` for deleted comments.
    pub body: String,
    pub created_utc: DateTime<Utc>,
    pub replies: Vec<CommentSlot>,
}

impl RemoteComment {
    /// Reddit's "fullname" for the comment, such as `t1_abc123`.
    pub fn fullname(&self) -> String {
        format!("t1_{}", self.id)
    }
}

/// A "load more comments" placeholder standing in for comments that were
/// not included in a response.
#[derive(Clone, Debug, PartialEq)]
pub struct MoreComments {
    pub id: String,
    /// Fullname of the thing the hidden comments reply to.
    pub parent_id: String,
    /// Number of hidden comments, as estimated by Reddit.
    pub count: u64,
    /// Identifiers of the hidden comments.
    ///
    /// Empty for "continue this thread" placeholders, which can only be
    /// expanded by fetching the parent's sub-thread.
    pub children: Vec<String>,
}

impl MoreComments {
    /// True if this placeholder stands for a deeper sub-thread rather than
    /// a list of sibling comments.
    pub fn is_continuation(&self) -> bool {
        self.children.is_empty()
    }
}

/// A position in a comment forest: either a realized comment or a
/// placeholder that must be expanded with a follow-up request.
#[derive(Clone, Debug, PartialEq)]
pub enum CommentSlot {
    Comment(RemoteComment),
    More(MoreComments),
}

/// A subreddit, as returned by subreddit searches and listings.
#[derive(Clone, Debug, PartialEq)]
pub struct Subreddit {
    pub name: String,
    pub title: String,
    pub description: String,
    pub subscribers: u64,
    pub active_users: u64,
    pub created_utc: Option<DateTime<Utc>>,
    pub over_18: bool,
    pub quarantined: bool,
    pub url: String,
}

impl Subreddit {
    /// Display flags for the subreddit, such as `NSFW` and `QUARANTINED`.
    pub fn flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.over_18 {
            flags.push("NSFW");
        }
        if self.quarantined {
            flags.push("QUARANTINED");
        }
        flags
    }

    /// Parses the response of `/r/<name>/about`.
    pub fn parse_about(data: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(data)?;
        if envelope.kind != Self::KIND {
            return Err(Error::Unexpected(format!(
                "expected a subreddit, got '{}'",
                envelope.kind
            )));
        }
        Self::from_data(envelope.data)
    }
}

/// One page of a paginated listing.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page, or `None` if this is the last page.
    pub after: Option<String>,
}

impl<T: FromThing> Page<T> {
    /// Parses a listing response into a page of items.
    ///
    /// Records of other kinds are ignored; malformed records are skipped
    /// with a warning.
    pub fn parse(data: &str) -> Result<Self> {
        let listing: Listing = serde_json::from_str(data)?;
        let after = listing.data.after;
        let items = parse_children(listing.data.children);
        Ok(Page { items, after })
    }
}

/// A kind of thing that can be extracted from a listing.
pub trait FromThing: Sized {
    /// The `kind` tag that identifies this type of thing.
    const KIND: &'static str;

    /// Converts the `data` member of an envelope.
    fn from_data(data: Value) -> Result<Self>;
}

impl FromThing for Post {
    const KIND: &'static str = "t3";

    fn from_data(data: Value) -> Result<Self> {
        let raw: RawLink = serde_json::from_value(data)?;
        let kind = if raw.is_self {
            PostKind::Text
        } else {
            PostKind::Link
        };
        let selftext = raw
            .selftext
            .filter(|_| raw.is_self)
            .map(|text| convert_html_entities(&text));
        Ok(Post {
            id: raw.id,
            title: convert_html_entities(&raw.title),
            author: author(raw.author),
            score: raw.score,
            num_comments: raw.num_comments,
            created_utc: clock::from_timestamp(raw.created_utc),
            kind,
            selftext,
            url: raw.url.unwrap_or_default(),
            permalink: format!("https://reddit.com{}", raw.permalink),
            subreddit: raw.subreddit,
            over_18: raw.over_18,
            spoiler: raw.spoiler,
        })
    }
}

impl FromThing for Subreddit {
    const KIND: &'static str = "t5";

    fn from_data(data: Value) -> Result<Self> {
        let raw: RawSubreddit = serde_json::from_value(data)?;
        let created_utc = raw
            .created_utc
            .filter(|ts| *ts > 0.0)
            .map(clock::from_timestamp);
        Ok(Subreddit {
            url: format!("https://reddit.com/r/{}", raw.display_name),
            name: raw.display_name,
            title: convert_html_entities(&raw.title.unwrap_or_default()),
            description: convert_html_entities(&raw.public_description.unwrap_or_default()),
            subscribers: raw.subscribers.unwrap_or(0),
            active_users: raw.active_user_count.unwrap_or(0),
            created_utc,
            over_18: raw.over18.unwrap_or(false),
            quarantined: raw.quarantine.unwrap_or(false),
        })
    }
}

impl HasAge for RemoteComment {
    fn created_utc(&self) -> DateTime<Utc> {
        self.created_utc
    }
}

/// Parses the response of `/comments/<id>`: the post itself followed by
/// its comment forest.
pub fn parse_thread(data: &str) -> Result<(Post, Vec<CommentSlot>)> {
    let listings: Vec<Listing> = serde_json::from_str(data)?;
    let mut listings = listings.into_iter();

    let post = listings
        .next()
        .and_then(|listing| parse_children::<Post>(listing.data.children).into_iter().next())
        .ok_or_else(|| Error::Unexpected("thread does not contain a post".to_string()))?;
    let comments = listings
        .next()
        .map(|listing| parse_slots(listing.data.children))
        .unwrap_or_default();

    Ok((post, comments))
}

/// Parses the response of `/api/morechildren`.
///
/// Reddit returns the expanded comments as a flat list in which every
/// comment names its parent; they are nested back into a forest whose
/// roots are the direct replies to `parent_id`. Order is preserved.
pub fn parse_more_children(data: &str, parent_id: &str) -> Result<Vec<CommentSlot>> {
    let response: MoreChildrenResponse = serde_json::from_str(data)?;
    if let Some(errors) = response.json.errors.filter(|errors| !errors.is_empty()) {
        return Err(Error::Unexpected(format!("morechildren failed: {errors:?}")));
    }
    let things = response.json.data.map(|data| data.things).unwrap_or_default();

    let mut by_parent: HashMap<String, Vec<CommentSlot>> = HashMap::new();
    let mut total = 0;
    for slot in parse_slots(things) {
        let parent = match &slot {
            CommentSlot::Comment(comment) => comment.parent_id.clone(),
            CommentSlot::More(more) => more.parent_id.clone(),
        };
        by_parent.entry(parent).or_default().push(slot);
        total += 1;
    }

    let forest = nest(parent_id, &mut by_parent);
    if !by_parent.is_empty() {
        let orphans: usize = by_parent.values().map(Vec::len).sum();
        warn!("dropping {orphans} of {total} expanded comments with unknown parents");
    }
    Ok(forest)
}

/// Parses the response of `/api/recommend/sr/<names>` into subreddit names.
pub fn parse_recommendations(data: &str) -> Result<Vec<String>> {
    let recommendations: Vec<Recommendation> = serde_json::from_str(data)?;
    Ok(recommendations.into_iter().map(|r| r.sr_name).collect())
}

fn nest(parent_id: &str, by_parent: &mut HashMap<String, Vec<CommentSlot>>) -> Vec<CommentSlot> {
    let mut slots = by_parent.remove(parent_id).unwrap_or_default();
    for slot in slots.iter_mut() {
        if let CommentSlot::Comment(comment) = slot {
            let replies = nest(&comment.fullname(), by_parent);
            comment.replies.extend(replies);
        }
    }
    slots
}

fn parse_children<T: FromThing>(children: Vec<Value>) -> Vec<T> {
    children
        .into_iter()
        .filter_map(|child| match serde_json::from_value::<Envelope>(child) {
            Ok(envelope) if envelope.kind == T::KIND => match T::from_data(envelope.data) {
                Ok(item) => Some(item),
                Err(err) => {
                    warn!("skipping malformed {} record: {err}", T::KIND);
                    None
                }
            },
            Ok(envelope) => {
                debug!("ignoring '{}' record in {} listing", envelope.kind, T::KIND);
                None
            }
            Err(err) => {
                warn!("skipping malformed listing entry: {err}");
                None
            }
        })
        .collect()
}

fn parse_slots(children: Vec<Value>) -> Vec<CommentSlot> {
    children
        .into_iter()
        .filter_map(|child| match parse_slot(child) {
            Ok(slot) => slot,
            Err(err) => {
                warn!("skipping malformed comment: {err}");
                None
            }
        })
        .collect()
}

fn parse_slot(child: Value) -> Result<Option<CommentSlot>> {
    let envelope: Envelope = serde_json::from_value(child)?;
    match envelope.kind.as_str() {
        "t1" => {
            let raw: RawComment = serde_json::from_value(envelope.data)?;
            let replies = match raw.replies {
                Value::Object(_) => {
                    let listing: Listing = serde_json::from_value(raw.replies)?;
                    parse_slots(listing.data.children)
                }
                _ => Vec::new(),
            };
            let body = raw
                .body
                .filter(|body| !body.is_empty())
                .map(|body| convert_html_entities(&body))
                .unwrap_or_else(|| DELETED.to_string());
            Ok(Some(CommentSlot::Comment(RemoteComment {
                id: raw.id,
                parent_id: raw.parent_id,
                author: author(raw.author),
                score: raw.score,
                body,
                created_utc: clock::from_timestamp(raw.created_utc),
                replies,
            })))
        }
        "more" => {
            let raw: RawMore = serde_json::from_value(envelope.data)?;
            Ok(Some(CommentSlot::More(MoreComments {
                id: raw.id,
                parent_id: raw.parent_id,
                count: raw.count,
                children: raw.children,
            })))
        }
        other => {
            debug!("ignoring '{other}' record in comment forest");
            Ok(None)
        }
    }
}

fn author(name: Option<String>) -> Option<String> {
    name.filter(|name| !name.is_empty() && name != DELETED)
}

#[derive(Debug, Deserialize)]
struct Envelope {
    kind: String,
    data: Value,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    after: Option<String>,
    #[serde(default)]
    children: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    id: String,
    title: String,
    author: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
    created_utc: f64,
    #[serde(default)]
    is_self: bool,
    selftext: Option<String>,
    url: Option<String>,
    permalink: String,
    #[serde(default)]
    subreddit: String,
    #[serde(default)]
    over_18: bool,
    #[serde(default)]
    spoiler: bool,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: String,
    parent_id: String,
    author: Option<String>,
    #[serde(default)]
    score: i64,
    body: Option<String>,
    created_utc: f64,
    #[serde(default)]
    replies: Value,
}

#[derive(Debug, Deserialize)]
struct RawMore {
    id: String,
    parent_id: String,
    #[serde(default)]
    count: u64,
    #[serde(default)]
    children: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawSubreddit {
    display_name: String,
    title: Option<String>,
    public_description: Option<String>,
    subscribers: Option<u64>,
    active_user_count: Option<u64>,
    created_utc: Option<f64>,
    over18: Option<bool>,
    quarantine: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct MoreChildrenResponse {
    json: MoreChildrenBody,
}

#[derive(Debug, Deserialize)]
struct MoreChildrenBody {
    errors: Option<Vec<Value>>,
    data: Option<MoreChildrenData>,
}

#[derive(Debug, Deserialize)]
struct MoreChildrenData {
    #[serde(default)]
    things: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Recommendation {
    sr_name: String,
}
