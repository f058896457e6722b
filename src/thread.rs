// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2025 Michael Dippery <michael@monkey-robot.com>

//! Builds comment trees for posts.
//!
//! Reddit rarely returns a post's whole comment forest at once. Parts of it
//! are replaced by "load more comments" placeholders that must be expanded
//! with follow-up requests. A [`Builder`] walks the forest depth-first, in
//! the order Reddit returns it, expanding placeholders as it reaches them
//! and stopping at the configured depth and size limits.

use crate::clock::{DateTime, HasAge, Utc};
use crate::interrupt::Interrupt;
use crate::reddit::{CommentSlot, CommentSource, Error, Post, RemoteComment};
use log::{debug, info, warn};
use std::collections::VecDeque;

/// Depth and size limits for a comment tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeLimits {
    max_depth: Option<usize>,
    max_comments: Option<usize>,
}

impl TreeLimits {
    /// Limits that allow the entire comment forest.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Keeps only comments at most `max_depth` levels below the post.
    ///
    /// Top-level comments are at depth 0, so a depth of 0 keeps only
    /// top-level comments.
    pub fn max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Keeps at most `max_comments` comments in the whole tree.
    pub fn max_comments(mut self, max_comments: Option<usize>) -> Self {
        self.max_comments = max_comments;
        self
    }

    /// Keeps only top-level comments if `top_level_only` is true.
    ///
    /// This is the same as setting the maximum depth to 0, and overrides
    /// any other maximum depth.
    pub fn top_level_only(self, top_level_only: bool) -> Self {
        if top_level_only {
            self.max_depth(Some(0))
        } else {
            self
        }
    }

    /// The deepest level that may be included, if any.
    pub fn depth_limit(&self) -> Option<usize> {
        self.max_depth
    }

    /// The most comments that may be included, if limited.
    pub fn comment_limit(&self) -> Option<usize> {
        self.max_comments
    }

    /// True if only top-level comments are included.
    pub fn is_top_level_only(&self) -> bool {
        self.max_depth == Some(0)
    }

    fn allows_depth(&self, depth: usize) -> bool {
        self.max_depth.is_none_or(|max| depth <= max)
    }

    fn allows_count(&self, count: usize) -> bool {
        self.max_comments.is_none_or(|max| count < max)
    }
}

/// A comment in a fully realized tree.
#[derive(Clone, Debug, PartialEq)]
pub struct CommentNode {
    pub id: String,
    /// `None` if the comment or its author was deleted.
    pub author: Option<String>,
    pub score: i64,
    pub body: String,
    pub created_utc: DateTime<Utc>,
    /// Distance from the post; top-level comments are at depth 0.
    pub depth: usize,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    fn new(comment: RemoteComment, depth: usize) -> (Self, Vec<CommentSlot>) {
        let node = Self {
            id: comment.id,
            author: comment.author,
            score: comment.score,
            body: comment.body,
            created_utc: comment.created_utc,
            depth,
            replies: Vec::new(),
        };
        (node, comment.replies)
    }

    /// Number of comments in this subtree, including this one.
    pub fn subtree_size(&self) -> usize {
        1 + self.replies.iter().map(CommentNode::subtree_size).sum::<usize>()
    }
}

impl HasAge for CommentNode {
    fn created_utc(&self) -> DateTime<Utc> {
        self.created_utc
    }
}

/// A post and its comment tree.
#[derive(Clone, Debug, PartialEq)]
pub struct CommentThread {
    pub post: Post,
    /// Top-level comments, in the order Reddit returned them.
    pub comments: Vec<CommentNode>,
    /// The limits the tree was built with.
    pub limits: TreeLimits,
    total: usize,
    failed_expansions: usize,
    truncated: bool,
    interrupted: bool,
}

impl CommentThread {
    /// Total number of comments in the tree, at every depth.
    pub fn total_comments(&self) -> usize {
        self.total
    }

    /// Number of top-level comments.
    pub fn top_level_comments(&self) -> usize {
        self.comments.len()
    }

    /// Number of "load more comments" placeholders that could not be
    /// expanded.
    pub fn failed_expansions(&self) -> usize {
        self.failed_expansions
    }

    /// True if the comment limit was reached before the whole forest was
    /// read.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// True if placeholders were left unexpanded because the user
    /// interrupted the build.
    pub fn was_interrupted(&self) -> bool {
        self.interrupted
    }
}

/// Running totals for a single build.
#[derive(Debug, Default)]
struct Progress {
    total: usize,
    failed_expansions: usize,
    truncated: bool,
    interrupted: bool,
}

/// Builds comment trees from a [`CommentSource`].
#[derive(Debug)]
pub struct Builder<'a, C> {
    source: &'a C,
    limits: TreeLimits,
    interrupt: Interrupt,
}

impl<'a, C: CommentSource> Builder<'a, C> {
    /// Creates a builder that reads comments from `source`.
    pub fn new(source: &'a C, limits: TreeLimits) -> Self {
        Self {
            source,
            limits,
            interrupt: Interrupt::default(),
        }
    }

    /// Stop early when `interrupt` is tripped.
    ///
    /// Between posts, the remaining posts are skipped. Within a post, no
    /// further placeholders are expanded; comments already loaded are kept.
    pub fn interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Builds the comment tree for a single post.
    ///
    /// Fails only if the post itself cannot be retrieved. Placeholders that
    /// cannot be expanded are logged and skipped, and the rest of the tree
    /// is still returned.
    pub async fn build(&self, post_id: &str) -> Result<CommentThread, Error> {
        let (post, slots) = self.source.thread(post_id).await?;
        let mut progress = Progress::default();
        let comments = self.realize(&post.id, slots, 0, &mut progress).await;

        if progress.truncated {
            info!(
                "stopped reading comments on {} after {} comments",
                post.id, progress.total
            );
        }
        if progress.interrupted {
            info!("interrupted while loading comments on {}", post.id);
        }
        if progress.failed_expansions > 0 {
            warn!(
                "{} groups of comments on {} could not be loaded",
                progress.failed_expansions, post.id
            );
        }

        Ok(CommentThread {
            post,
            comments,
            limits: self.limits,
            total: progress.total,
            failed_expansions: progress.failed_expansions,
            truncated: progress.truncated,
            interrupted: progress.interrupted,
        })
    }

    /// Builds comment trees for several posts, one after the other.
    ///
    /// Each post succeeds or fails on its own; a failure is recorded in the
    /// results and the next post is built as usual. If the interrupt is
    /// tripped, posts that have not been started are left out.
    pub async fn build_many<S: AsRef<str>>(&self, post_ids: &[S]) -> Vec<ThreadResult> {
        let mut results = Vec::with_capacity(post_ids.len());
        for (i, post_id) in post_ids.iter().enumerate() {
            if self.interrupt.is_tripped() {
                info!("interrupted after {i} of {} posts", post_ids.len());
                break;
            }
            let post_id = post_id.as_ref();
            info!("fetching comments for post {post_id} ({}/{})", i + 1, post_ids.len());
            let result = self.build(post_id).await;
            if let Err(err) = &result {
                warn!("could not fetch comments for {post_id}: {err}");
            }
            results.push(ThreadResult {
                post_id: post_id.to_string(),
                result,
            });
        }
        results
    }

    /// Turns a sequence of sibling slots into comment nodes at `depth`,
    /// expanding placeholders in place.
    async fn realize(
        &self,
        post_id: &str,
        slots: Vec<CommentSlot>,
        depth: usize,
        progress: &mut Progress,
    ) -> Vec<CommentNode> {
        let mut nodes = Vec::new();
        let mut queue = VecDeque::from(slots);

        while let Some(slot) = queue.pop_front() {
            if !self.limits.allows_count(progress.total) {
                progress.truncated = true;
                break;
            }

            match slot {
                CommentSlot::Comment(comment) => {
                    progress.total += 1;
                    let (mut node, replies) = CommentNode::new(comment, depth);
                    if self.limits.allows_depth(depth + 1) && !replies.is_empty() {
                        node.replies =
                            Box::pin(self.realize(post_id, replies, depth + 1, progress)).await;
                    }
                    nodes.push(node);
                }
                CommentSlot::More(more) => {
                    if self.interrupt.is_tripped() {
                        progress.interrupted = true;
                        continue;
                    }
                    debug!("expanding {} hidden comments at depth {depth}", more.count);
                    match self.source.expand(post_id, &more).await {
                        Ok(expanded) => {
                            for slot in expanded.into_iter().rev() {
                                queue.push_front(slot);
                            }
                        }
                        Err(err) => {
                            warn!("could not load more comments under {}: {err}", more.parent_id);
                            progress.failed_expansions += 1;
                        }
                    }
                }
            }
        }

        nodes
    }
}

/// The outcome of building one post's comment tree as part of a batch.
#[derive(Debug)]
pub struct ThreadResult {
    /// The post ID as it was requested.
    pub post_id: String,
    pub result: Result<CommentThread, Error>,
}
