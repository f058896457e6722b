// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2025 Michael Dippery <michael@monkey-robot.com>

//! redscout is a command-line tool for exploring Reddit from the terminal.
//! It lists a subreddit's top posts, optionally keeping only those whose
//! titles match a regular expression; fetches complete comment trees for
//! posts, expanding Reddit's "load more comments" placeholders along the
//! way; and discovers subreddits by keyword, popularity, age, or
//! similarity to subreddits you already know.
//!
//! # Examples
//!
//! Stream the top posts from r/learnpython in the past month whose titles
//! mention tutorials:
//!
//! ```bash
//! redscout top learnpython -t month --filter-title tutorial
//! ```
//!
//! Fetch the top 100 posts of all time as JSON:
//!
//! ```bash
//! redscout top rust -t all -n 100 --format json
//! ```
//!
//! Fetch the comment tree for a post, by ID or URL, going no deeper than
//! two levels of replies:
//!
//! ```bash
//! redscout comments 1abcde2 --max-depth 2
//! ```
//!
//! Search for subreddits about a topic, biggest first:
//!
//! ```bash
//! redscout subreddits --search "machine learning" --sort subscribers-desc
//! ```
//!
//! Find subreddits similar to ones you already read:
//!
//! ```bash
//! redscout subreddits --recommend rust,golang --exclude-nsfw
//! ```
//!
//! Get usage and help for the tool:
//!
//! ```bash
//! redscout --help
//! ```
//!
//! Pressing Ctrl-C during a long fetch stops it cleanly; whatever was
//! fetched up to that point is still printed.
//!
//! # Reddit API Setup
//!
//! redscout uses Reddit's OAuth API, which requires an application
//! registration:
//!
//! 1. Create a "script" application at <https://www.reddit.com/prefs/apps>.
//! 2. Store its client ID in `$REDDIT_CLIENT_ID` and its secret in
//!    `$REDDIT_CLIENT_SECRET`:
//!
//!    ```bash
//!    $ export REDDIT_CLIENT_ID='client id'
//!    $ export REDDIT_CLIENT_SECRET='client secret'
//!    ```
//!
//! 3. Optionally set `$REDDIT_USER_AGENT` to identify your copy of the tool.
//!
//! # License
//!
//! redscout is licensed under the terms of the [Apache License 2.0]. Please
//! see the LICENSE file accompanying this source code or visit the previous
//! link for more information on licensing.
//!
//! [Apache License 2.0]: https://www.apache.org/licenses/LICENSE-2.0

pub mod cli;
pub mod clock;
pub mod conf;
pub mod discover;
pub mod filter;
pub mod http;
pub mod interrupt;
pub mod listing;
pub mod progress;
pub mod reddit;
pub mod text;
pub mod thread;
pub mod view;

#[cfg(test)]
mod test_utils;
