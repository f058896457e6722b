// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2025 Michael Dippery <michael@monkey-robot.com>

//! Renders posts, comment threads, and subreddits for output.
//!
//! Everything can be drawn as plain text with [`Viewable`]; listings and
//! comment threads can also be serialized as JSON for other programs.

use crate::clock::HasAge;
use crate::discover::Discovery;
use crate::filter::TitleFilter;
use crate::reddit::thing::DELETED;
use crate::reddit::{Post, Subreddit, TimeWindow};
use crate::text::{compact_count, truncate};
use crate::thread::{CommentNode, CommentThread, ThreadResult};
use indoc::formatdoc;
use itertools::Itertools;
use serde::Serialize;

/// Longest subreddit description shown in text output.
const DESCRIPTION_WIDTH: usize = 150;

/// Marks an item that can be converted into a string for display on a terminal.
pub trait Viewable {
    /// Converts the item into a string for display on a terminal.
    fn view(&self) -> String;
}

fn flag_str(flags: &[&str]) -> String {
    if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    }
}

/// A post printed as soon as it is found.
#[derive(Debug)]
pub struct StreamEntry<'a> {
    pub post: &'a Post,
    /// 1-based position among matching posts.
    pub number: usize,
    pub limit: usize,
}

impl Viewable for StreamEntry<'_> {
    fn view(&self) -> String {
        let post = self.post;
        let mut lines = vec![
            format!(
                "[{}/{}] {} | Score: {} | Comments: {} | u/{}",
                self.number,
                self.limit,
                post.created_date(),
                post.score,
                post.num_comments,
                post.author_name()
            ),
            format!(
                "         [{}] {}{} ({})",
                post.id,
                post.title,
                flag_str(&post.flags()),
                post.kind.label()
            ),
        ];
        if !post.is_self() || post.url != post.permalink {
            lines.push(format!("         {}", post.url));
        }
        lines.push(String::new());
        lines.join("\n")
    }
}

/// The full result of listing a subreddit's top posts.
#[derive(Debug)]
pub struct ListingReport<'a> {
    pub subreddit: &'a str,
    pub window: TimeWindow,
    pub limit: usize,
    pub filter: Option<&'a TitleFilter>,
    pub fetched: usize,
    pub posts: &'a [Post],
}

impl ListingReport<'_> {
    /// The report as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let json = ListingJson {
            subreddit: self.subreddit,
            time_filter: self.window.as_str(),
            limit: self.limit,
            title_filter: self.filter.map(TitleFilter::pattern),
            total_fetched: self.fetched,
            total_matched: self.posts.len(),
            posts: self.posts.iter().map(PostJson::from).collect(),
        };
        serde_json::to_string_pretty(&json)
    }
}

impl Viewable for ListingReport<'_> {
    fn view(&self) -> String {
        let mut lines = vec![format!(
            "Subreddit: r/{} (Top {} posts from {})",
            self.subreddit, self.limit, self.window
        )];
        match self.filter {
            Some(filter) => lines.push(format!(
                "Title filter: \"{}\" (showing {} of {} posts)",
                filter.pattern(),
                self.posts.len(),
                self.fetched
            )),
            None => lines.push(format!("Total posts: {}", self.posts.len())),
        }
        lines.push(String::new());

        if self.posts.is_empty() {
            lines.push("No posts found matching criteria.".to_string());
        }
        for (i, post) in self.posts.iter().enumerate() {
            lines.push(formatdoc! {"
                {}. {} | Score: {} | Comments: {} | u/{}
                   [{}] {}{}
                   Type: {} | {}
                ",
                i + 1,
                post.created_date(),
                post.score,
                post.num_comments,
                post.author_name(),
                post.id,
                post.title,
                flag_str(&post.flags()),
                post.kind.label(),
                post.url,
            });
        }
        lines.join("\n")
    }
}

#[derive(Serialize)]
struct ListingJson<'a> {
    subreddit: &'a str,
    time_filter: &'a str,
    limit: usize,
    title_filter: Option<&'a str>,
    total_fetched: usize,
    total_matched: usize,
    posts: Vec<PostJson<'a>>,
}

#[derive(Serialize)]
struct PostJson<'a> {
    id: &'a str,
    title: &'a str,
    author: &'a str,
    score: i64,
    num_comments: u64,
    created_utc: i64,
    created_date: String,
    post_type: &'static str,
    over_18: bool,
    spoiler: bool,
    url: &'a str,
    permalink: &'a str,
    selftext: Option<&'a str>,
}

impl<'a> From<&'a Post> for PostJson<'a> {
    fn from(post: &'a Post) -> Self {
        Self {
            id: &post.id,
            title: &post.title,
            author: post.author_name(),
            score: post.score,
            num_comments: post.num_comments,
            created_utc: post.created_utc.timestamp(),
            created_date: post.created_date(),
            post_type: post.kind.label(),
            over_18: post.over_18,
            spoiler: post.spoiler,
            url: &post.url,
            permalink: &post.permalink,
            selftext: post.selftext.as_deref(),
        }
    }
}

impl Viewable for CommentThread {
    fn view(&self) -> String {
        let post = &self.post;
        let mut lines = vec![formatdoc! {"
            Post: {title}
            Source: [{title}]({permalink}) by u/{author} ({score} upvotes)
            Subreddit: r/{subreddit} | Type: {kind} | Total Comments: {total}
            Original URL: {url}",
            title = post.title,
            permalink = post.permalink,
            author = post.author_name(),
            score = post.score,
            subreddit = post.subreddit,
            kind = post.kind.label(),
            total = post.num_comments,
            url = post.url,
        }];
        if let Some(depth) = self.limits.depth_limit() {
            lines.push(format!("Max Depth: {depth}"));
        }
        if let Some(count) = self.limits.comment_limit() {
            lines.push(format!("Max Comments: {count}"));
        }
        if let Some(content) = post.selftext.as_deref().filter(|s| !s.is_empty()) {
            lines.push(String::new());
            lines.push("Post Content:".to_string());
            lines.push("-".repeat(20));
            lines.push(content.to_string());
        }
        lines.push(String::new());

        if self.comments.is_empty() {
            lines.push("No comments found.".to_string());
        } else {
            lines.push(format!(
                "Comments ({} top-level, {} total fetched):",
                self.top_level_comments(),
                self.total_comments()
            ));
            lines.push("=".repeat(50));
            for (i, comment) in self.comments.iter().enumerate() {
                comment_lines(comment, Some(i + 1), &mut lines);
            }
        }
        lines.join("\n")
    }
}

fn comment_lines(comment: &CommentNode, number: Option<usize>, lines: &mut Vec<String>) {
    let indent = "  ".repeat(comment.depth);
    let author = comment.author.as_deref().unwrap_or(DELETED);
    let label = match number {
        Some(n) if comment.depth == 0 => format!("Comment {n}"),
        _ => "Reply".to_string(),
    };
    lines.push(format!(
        "\n{indent}{label} by {author} (Score: {}, Depth: {}):",
        comment.score, comment.depth
    ));
    lines.push(format!("{indent}{}", "-".repeat(40)));
    lines.push(textwrap::indent(&comment.body, &indent).trim_end_matches('\n').to_string());
    for reply in &comment.replies {
        comment_lines(reply, None, lines);
    }
}

#[derive(Serialize)]
struct ThreadJson<'a> {
    post_id: &'a str,
    post_title: &'a str,
    post_content: Option<&'a str>,
    post_type: &'static str,
    post_score: i64,
    post_url: &'a str,
    post_author: &'a str,
    post_permalink: &'a str,
    post_subreddit: &'a str,
    post_created_utc: i64,
    total_comments: u64,
    comments_fetched: usize,
    max_depth: Option<usize>,
    max_comments: Option<usize>,
    top_level_comments: Vec<CommentJson<'a>>,
}

impl<'a> From<&'a CommentThread> for ThreadJson<'a> {
    fn from(thread: &'a CommentThread) -> Self {
        let post = &thread.post;
        Self {
            post_id: &post.id,
            post_title: &post.title,
            post_content: post.selftext.as_deref(),
            post_type: post.kind.label(),
            post_score: post.score,
            post_url: &post.url,
            post_author: post.author_name(),
            post_permalink: &post.permalink,
            post_subreddit: &post.subreddit,
            post_created_utc: post.created_utc.timestamp(),
            total_comments: post.num_comments,
            comments_fetched: thread.total_comments(),
            max_depth: thread.limits.depth_limit(),
            max_comments: thread.limits.comment_limit(),
            top_level_comments: thread.comments.iter().map(CommentJson::from).collect(),
        }
    }
}

#[derive(Serialize)]
struct CommentJson<'a> {
    id: &'a str,
    author: Option<&'a str>,
    score: i64,
    body: &'a str,
    created_utc: i64,
    depth: usize,
    replies: Vec<CommentJson<'a>>,
}

impl<'a> From<&'a CommentNode> for CommentJson<'a> {
    fn from(node: &'a CommentNode) -> Self {
        Self {
            id: &node.id,
            author: node.author.as_deref(),
            score: node.score,
            body: &node.body,
            created_utc: node.created_utc.timestamp(),
            depth: node.depth,
            replies: node.replies.iter().map(CommentJson::from).collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum ThreadResultJson<'a> {
    Thread(ThreadJson<'a>),
    Failure { post_id: &'a str, error: String },
}

impl<'a> From<&'a ThreadResult> for ThreadResultJson<'a> {
    fn from(result: &'a ThreadResult) -> Self {
        match &result.result {
            Ok(thread) => ThreadResultJson::Thread(ThreadJson::from(thread)),
            Err(err) => ThreadResultJson::Failure {
                post_id: &result.post_id,
                error: err.to_string(),
            },
        }
    }
}

/// Comment threads for one or more posts.
#[derive(Debug)]
pub struct ThreadsReport<'a>(pub &'a [ThreadResult]);

impl ThreadsReport<'_> {
    /// The threads as pretty-printed JSON: a single object for one post,
    /// or an array with one entry per post.
    pub fn to_json(&self) -> serde_json::Result<String> {
        match self.0 {
            [only] => serde_json::to_string_pretty(&ThreadResultJson::from(only)),
            many => {
                let entries: Vec<_> = many.iter().map(ThreadResultJson::from).collect();
                serde_json::to_string_pretty(&entries)
            }
        }
    }
}

impl Viewable for ThreadsReport<'_> {
    fn view(&self) -> String {
        let n = self.0.len();
        self.0
            .iter()
            .enumerate()
            .map(|(i, result)| {
                let body = match &result.result {
                    Ok(thread) => thread.view(),
                    Err(err) => format!("Post: {}\nError: {err}", result.post_id),
                };
                if i == 0 {
                    body
                } else {
                    let rule = "=".repeat(80);
                    format!("\n{rule}\nPOST {} OF {n}\n{rule}\n\n{body}", i + 1)
                }
            })
            .join("\n")
    }
}

impl Viewable for Subreddit {
    fn view(&self) -> String {
        let active = if self.active_users > 0 {
            format!(" | Active: {}", compact_count(self.active_users))
        } else {
            String::new()
        };
        let created = self
            .created_utc
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        let mut lines = vec![
            format!("r/{}{}", self.name, flag_str(&self.flags())),
            format!(
                "   Subscribers: {}{active} | Created: {created}",
                compact_count(self.subscribers)
            ),
        ];
        if !self.title.is_empty() {
            lines.push(format!("   Title: {}", self.title));
        }
        if !self.description.is_empty() {
            lines.push(format!(
                "   Description: {}",
                truncate(&self.description, DESCRIPTION_WIDTH)
            ));
        }
        lines.push(format!("   URL: {}", self.url));
        lines.join("\n")
    }
}

impl Viewable for Discovery {
    fn view(&self) -> String {
        let mut lines = vec![
            self.method.heading(),
            format!("Found {} subreddits", self.subreddits.len()),
        ];
        if self.is_filtered() {
            lines.push(format!(
                "(showing {} of {} after filtering)",
                self.subreddits.len(),
                self.fetched
            ));
        }
        lines.push(String::new());

        if self.subreddits.is_empty() {
            lines.push("No subreddits found matching criteria.".to_string());
        }
        for (i, subreddit) in self.subreddits.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, subreddit.view()));
            lines.push(String::new());
        }
        lines.join("\n")
    }
}
