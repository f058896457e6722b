// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2025 Michael Dippery <michael@monkey-robot.com>

//! Drives the command-line program.

use crate::conf::{ConfigError, Credentials};
use crate::discover::{self, Discoverer, Method, SortOrder, SubredditFilter};
use crate::filter::{FilterError, TitleFilter};
use crate::interrupt::Interrupt;
use crate::listing::{Limit, MAX_LIMIT, PaginationState, Walker};
use crate::progress::Progress;
use crate::reddit::client::{DEFAULT_PAGE_DELAY, post_id};
use crate::reddit::{self, RedditClient, TimeWindow};
use crate::thread::{Builder, ThreadResult, TreeLimits};
use crate::view::{ListingReport, StreamEntry, ThreadsReport, Viewable};
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use log::{debug, warn};
use std::time::Duration;
use thiserror::Error;

/// A program error.
#[derive(Debug, Error)]
pub enum Error {
    /// Credentials are missing or unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The title filter is not a valid regular expression.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// The command line is well-formed but makes no sense.
    #[error("{0}")]
    Usage(String),

    /// Reddit could not provide what was asked for.
    #[error(transparent)]
    Source(#[from] reddit::Error),

    /// Results could not be serialized.
    #[error("Could not format output: {0}")]
    Output(#[from] serde_json::Error),

    /// Every requested post failed.
    #[error("No posts could be fetched successfully.")]
    NoPosts,

    /// Discovery came up empty.
    #[error("No subreddits found.")]
    NoSubreddits,
}

impl Error {
    /// Process exit code for this error.
    ///
    /// Problems with the command line or environment exit with 2; failures
    /// while talking to Reddit exit with 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Config(_) | Error::Filter(_) | Error::Usage(_) => 2,
            _ => 1,
        }
    }
}

/// Program configuration.
#[derive(Debug, Parser)]
#[command(version)]
#[command(about = "Lists top subreddit posts, fetches comment trees, and discovers subreddits", long_about = None)]
pub struct Config {
    #[command(flatten)]
    verbosity: Verbosity<WarnLevel>,

    /// Pause between page requests, in milliseconds
    #[arg(long, global = true, value_name = "MS", default_value_t = DEFAULT_PAGE_DELAY.as_millis() as u64)]
    page_delay_ms: u64,

    #[command(subcommand)]
    command: Command,
}

impl Config {
    pub fn verbosity(&self) -> Verbosity<WarnLevel> {
        self.verbosity
    }

    fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List a subreddit's top posts
    Top(TopConfig),

    /// Fetch comments, including nested replies, for one or more posts
    Comments(CommentsConfig),

    /// Discover and search subreddits
    Subreddits(SubredditsConfig),
}

/// Output formats for post listings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ListingFormat {
    /// Print each post as soon as it is found.
    #[default]
    Stream,

    /// Print a summary once every post has been fetched.
    Text,

    /// Print JSON once every post has been fetched.
    Json,
}

/// Output formats for comment threads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum CommentFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug)]
struct TopConfig {
    /// Subreddit name, without the r/ prefix
    subreddit: String,

    /// Time window for top posts
    #[arg(short = 't', long = "time", value_enum, default_value_t)]
    window: TimeWindow,

    /// Number of posts to fetch (Reddit returns at most 1000)
    #[arg(short = 'n', long, default_value_t = MAX_LIMIT as u64, value_parser = clap::value_parser!(u64).range(1..))]
    limit: u64,

    /// Only show posts whose titles match REGEX
    #[arg(long = "filter-title", value_name = "REGEX")]
    filter_title: Option<String>,

    /// Match the title filter case-sensitively
    #[arg(long, default_value_t = false, requires = "filter_title")]
    case_sensitive: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: ListingFormat,
}

impl TopConfig {
    fn filter(&self) -> Result<Option<TitleFilter>, FilterError> {
        self.filter_title
            .as_deref()
            .map(|pattern| TitleFilter::with_case_sensitivity(pattern, self.case_sensitive))
            .transpose()
    }

    fn limit(&self) -> Limit {
        Limit::new(usize::try_from(self.limit).unwrap_or(usize::MAX))
    }
}

#[derive(Args, Debug)]
struct CommentsConfig {
    /// Reddit post IDs or URLs
    #[arg(required = true, value_name = "POST_ID")]
    post_ids: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: CommentFormat,

    /// Maximum comment depth to fetch; top-level comments are at depth 0
    #[arg(long)]
    max_depth: Option<usize>,

    /// Maximum number of comments to fetch per post
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_comments: Option<u64>,

    /// Fetch only top-level comments (same as --max-depth 0)
    #[arg(long, default_value_t = false)]
    top_level_only: bool,
}

impl CommentsConfig {
    fn limits(&self) -> TreeLimits {
        let max_comments = self
            .max_comments
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX));
        TreeLimits::unlimited()
            .max_depth(self.max_depth)
            .max_comments(max_comments)
            .top_level_only(self.top_level_only)
    }

    fn post_ids(&self) -> Vec<String> {
        self.post_ids.iter().map(|id| post_id(id)).collect()
    }
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct MethodConfig {
    /// Search subreddits by keyword or topic
    #[arg(long, value_name = "QUERY")]
    search: Option<String>,

    /// List popular subreddits
    #[arg(long)]
    popular: bool,

    /// List newly created subreddits
    #[arg(long)]
    new: bool,

    /// Recommend subreddits similar to a comma-separated list of subreddits
    #[arg(long, value_name = "SUBREDDITS")]
    recommend: Option<String>,
}

impl MethodConfig {
    fn method(&self) -> Result<Method, Error> {
        if let Some(query) = &self.search {
            return Ok(Method::Search(query.clone()));
        }
        if let Some(seeds) = &self.recommend {
            return match Method::recommend(seeds) {
                Method::Recommend(seeds) if seeds.is_empty() => Err(Error::Usage(
                    "--recommend needs at least one subreddit name".to_string(),
                )),
                method => Ok(method),
            };
        }
        if self.new {
            Ok(Method::New)
        } else {
            Ok(Method::Popular)
        }
    }
}

#[derive(Args, Debug)]
struct SubredditsConfig {
    #[command(flatten)]
    method: MethodConfig,

    /// Number of subreddits to fetch
    #[arg(short = 'n', long, default_value_t = discover::DEFAULT_LIMIT as u64, value_parser = clap::value_parser!(u64).range(1..))]
    limit: u64,

    /// Only show subreddits with at least N subscribers
    #[arg(long, value_name = "N")]
    min_subscribers: Option<u64>,

    /// Only show subreddits with at most N subscribers
    #[arg(long, value_name = "N")]
    max_subscribers: Option<u64>,

    /// Only show subreddits with at least N active users
    #[arg(long, value_name = "N")]
    min_activity: Option<u64>,

    /// Leave out NSFW subreddits
    #[arg(long, default_value_t = false)]
    exclude_nsfw: bool,

    /// Sort results
    #[arg(long, value_enum, default_value_t)]
    sort: SortOrder,
}

impl SubredditsConfig {
    fn filter(&self) -> SubredditFilter {
        SubredditFilter::default()
            .min_subscribers(self.min_subscribers)
            .max_subscribers(self.max_subscribers)
            .min_activity(self.min_activity)
            .exclude_nsfw(self.exclude_nsfw)
    }

    fn limit(&self) -> usize {
        usize::try_from(self.limit).unwrap_or(usize::MAX)
    }
}

/// Runs the command-line program.
#[derive(Debug)]
pub struct Runner {
    config: Config,
}

impl Runner {
    /// Create a new program runner using the given `config`.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the command-line program using its stored configuration options.
    ///
    /// Configuration and filter errors are reported before anything is
    /// requested from Reddit.
    pub async fn run(&self) -> Result<(), Error> {
        match &self.config.command {
            Command::Top(config) => self.run_top(config).await,
            Command::Comments(config) => self.run_comments(config).await,
            Command::Subreddits(config) => self.run_subreddits(config).await,
        }
    }

    fn client(&self) -> Result<RedditClient, Error> {
        let credentials = Credentials::from_env()?;
        debug!("using credentials {credentials:?}");
        let client = RedditClient::new(credentials)?.page_delay(self.config.page_delay());
        Ok(client)
    }

    async fn run_top(&self, config: &TopConfig) -> Result<(), Error> {
        let filter = config.filter()?;
        let limit = config.limit();
        let client = self.client()?;

        if limit.was_clamped() {
            warn!("limit of {} clamped to {}", limit.requested(), limit.get());
            eprintln!("Warning: Reddit API limits results to ~1000 posts. Setting limit to 1000.");
        }
        let filter_msg = filter
            .as_ref()
            .map(|f| format!(" with title filter: \"{}\"", f.pattern()))
            .unwrap_or_default();
        eprintln!(
            "Fetching top {} posts from r/{} ({}){filter_msg}...",
            limit.get(),
            config.subreddit,
            config.window
        );

        let interrupt = Interrupt::on_ctrl_c();
        let source = client.top_posts(&config.subreddit, config.window, limit.get());
        let walker = Walker::new(source, limit)
            .filter(filter.clone())
            .interrupt(interrupt);

        if config.format == ListingFormat::Stream {
            eprintln!("Streaming results (progress on stderr):");
            println!();

            let mut walker = walker;
            let error = loop {
                match walker.next().await {
                    Ok(Some(post)) => {
                        let entry = StreamEntry {
                            post: &post,
                            number: walker.state().matched(),
                            limit: limit.get(),
                        };
                        println!("{}", entry.view());
                    }
                    Ok(None) => break None,
                    Err(err) => break Some(err),
                }
            };
            let state = walker.state().clone();
            settle(&state, error)?;
            eprintln!(
                "Completed: Found {} matching posts out of {} total fetched.",
                state.matched(),
                state.fetched()
            );
            return Ok(());
        }

        let progress = Progress::stderr(10, Some(limit.get()), "posts");
        let walk = walker.reporter(progress).walk().await;
        settle(&walk.state, walk.error)?;

        let report = ListingReport {
            subreddit: &config.subreddit,
            window: config.window,
            limit: limit.get(),
            filter: filter.as_ref(),
            fetched: walk.state.fetched(),
            posts: &walk.posts,
        };
        match config.format {
            ListingFormat::Json => println!("{}", report.to_json()?),
            _ => println!("{}", report.view()),
        }
        Ok(())
    }

    async fn run_comments(&self, config: &CommentsConfig) -> Result<(), Error> {
        let limits = config.limits();
        let post_ids = config.post_ids();
        let client = self.client()?;

        if post_ids.len() > 1 {
            let depth = limits
                .depth_limit()
                .map(|d| format!("depth {d}"))
                .unwrap_or_else(|| "unlimited depth".to_string());
            let count = limits
                .comment_limit()
                .map(|n| format!("max {n}"))
                .unwrap_or_else(|| "unlimited".to_string());
            eprintln!(
                "Fetching {} posts ({depth}, {count} comments)...",
                post_ids.len()
            );
        }

        let interrupt = Interrupt::on_ctrl_c();
        let results = Builder::new(&client, limits)
            .interrupt(interrupt.clone())
            .build_many(&post_ids)
            .await;

        if interrupt.is_tripped() {
            eprintln!(
                "\nInterrupted! Fetched {} of {} posts.",
                results.len(),
                post_ids.len()
            );
        }
        for ThreadResult { post_id, result } in &results {
            if let Err(err) = result {
                eprintln!("Error fetching post {post_id}: {err}");
            }
        }
        let results = all_failed(results, interrupt.is_tripped())?;
        if results.is_empty() {
            return Ok(());
        }

        let report = ThreadsReport(&results);
        match config.format {
            CommentFormat::Json => println!("{}", report.to_json()?),
            CommentFormat::Text => println!("{}", report.view()),
        }
        Ok(())
    }

    async fn run_subreddits(&self, config: &SubredditsConfig) -> Result<(), Error> {
        let method = config.method.method()?;
        let client = self.client()?;
        eprintln!("{}", method.announcement(config.limit()));

        let mut progress = Progress::stderr(5, None, "subreddits");
        let discovery = Discoverer::new(&client, config.limit())
            .filter(config.filter())
            .sort(config.sort)
            .interrupt(Interrupt::on_ctrl_c())
            .discover(method, &mut progress)
            .await?;

        if discovery.interrupted {
            eprintln!("\nInterrupted! Fetched {} subreddits.", discovery.fetched);
        }
        if discovery.fetched == 0 {
            return Err(Error::NoSubreddits);
        }
        println!("{}", discovery.view());
        Ok(())
    }
}

/// Decides whether a walk that ended with `error` still produced usable
/// results.
fn settle(state: &PaginationState, error: Option<reddit::Error>) -> Result<(), Error> {
    if let Some(err) = error {
        if state.fetched() == 0 {
            return Err(err.into());
        }
        warn!("stopped after {} posts: {err}", state.fetched());
        eprintln!("Error during fetching: {err}");
    }
    if state.was_interrupted() {
        eprintln!(
            "\nInterrupted! Fetched {} posts, {} matched.",
            state.fetched(),
            state.matched()
        );
    }
    Ok(())
}

/// Passes `results` through unless none of them succeeded.
///
/// A lone failed post reports its own error; otherwise the batch as a whole
/// is reported as a failure. A batch that was `interrupted` before any post
/// finished is empty, not failed.
fn all_failed(results: Vec<ThreadResult>, interrupted: bool) -> Result<Vec<ThreadResult>, Error> {
    if results.iter().any(|r| r.result.is_ok()) || (interrupted && results.is_empty()) {
        return Ok(results);
    }
    let mut results = results;
    match (results.len(), results.pop()) {
        (1, Some(ThreadResult { result: Err(err), .. })) => Err(err.into()),
        _ => Err(Error::NoPosts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("redscout").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    fn parse_err(args: &[&str]) -> clap::Error {
        Config::try_parse_from(std::iter::once("redscout").chain(args.iter().copied()))
            .expect_err("arguments should not parse")
    }

    mod config {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn it_verifies_the_command_definition() {
            use clap::CommandFactory;
            Config::command().debug_assert();
        }

        #[test]
        fn it_defaults_the_page_delay() {
            let config = parse(&["top", "rust"]);
            assert_eq!(config.page_delay(), Duration::from_secs(1));
            let config = parse(&["top", "rust", "--page-delay-ms", "250"]);
            assert_eq!(config.page_delay(), Duration::from_millis(250));
        }
    }

    mod top {
        use super::*;
        use pretty_assertions::assert_eq;

        fn top(args: &[&str]) -> TopConfig {
            let mut full = vec!["top"];
            full.extend_from_slice(args);
            match parse(&full).command {
                Command::Top(config) => config,
                other => panic!("expected top, got {other:?}"),
            }
        }

        #[test]
        fn it_uses_sensible_defaults() {
            let config = top(&["learnpython"]);
            assert_eq!(config.window, TimeWindow::Week);
            assert_eq!(config.limit().get(), 1000);
            assert_eq!(config.format, ListingFormat::Stream);
            assert!(config.filter().unwrap().is_none());
        }

        #[test]
        fn it_clamps_large_limits() {
            let limit = top(&["learnpython", "--limit", "5000"]).limit();
            assert_eq!(limit.get(), 1000);
            assert!(limit.was_clamped());
        }

        #[test]
        fn it_rejects_a_zero_limit() {
            let err = parse_err(&["top", "learnpython", "--limit", "0"]);
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        }

        #[test]
        fn it_compiles_a_case_insensitive_filter() {
            let config = top(&["learnpython", "-t", "month", "--filter-title", "tutorial"]);
            let filter = config.filter().unwrap().unwrap();
            assert!(filter.is_match("A TUTORIAL"));
            assert_eq!(config.window, TimeWindow::Month);
        }

        #[test]
        fn it_compiles_a_case_sensitive_filter() {
            let config = top(&["rust", "--filter-title", "Rust", "--case-sensitive"]);
            let filter = config.filter().unwrap().unwrap();
            assert!(!filter.is_match("rust"));
        }

        #[test]
        fn it_reports_invalid_filters() {
            let config = top(&["rust", "--filter-title", "("]);
            let err = Error::from(config.filter().unwrap_err());
            assert_eq!(err.exit_code(), 2);
            assert!(err.to_string().starts_with("Invalid regex pattern '('"));
        }
    }

    mod comments {
        use super::*;
        use pretty_assertions::assert_eq;

        fn comments(args: &[&str]) -> CommentsConfig {
            let mut full = vec!["comments"];
            full.extend_from_slice(args);
            match parse(&full).command {
                Command::Comments(config) => config,
                other => panic!("expected comments, got {other:?}"),
            }
        }

        #[test]
        fn it_requires_a_post() {
            let err = parse_err(&["comments"]);
            assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        }

        #[test]
        fn it_accepts_ids_and_urls() {
            let config = comments(&["abc", "t3_def", "https://reddit.com/r/rust/comments/ghi/x/"]);
            assert_eq!(config.post_ids(), vec!["abc", "def", "ghi"]);
        }

        #[test]
        fn it_builds_tree_limits() {
            let limits = comments(&["abc", "--max-depth", "2", "--max-comments", "50"]).limits();
            assert_eq!(limits.depth_limit(), Some(2));
            assert_eq!(limits.comment_limit(), Some(50));
        }

        #[test]
        fn it_treats_top_level_only_as_depth_zero() {
            let limits = comments(&["abc", "--max-depth", "2", "--top-level-only"]).limits();
            assert!(limits.is_top_level_only());
        }

        #[test]
        fn it_rejects_a_zero_comment_limit() {
            let err = parse_err(&["comments", "abc", "--max-comments", "0"]);
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        }
    }

    mod subreddits {
        use super::*;
        use pretty_assertions::assert_eq;

        fn subreddits(args: &[&str]) -> SubredditsConfig {
            let mut full = vec!["subreddits"];
            full.extend_from_slice(args);
            match parse(&full).command {
                Command::Subreddits(config) => config,
                other => panic!("expected subreddits, got {other:?}"),
            }
        }

        #[test]
        fn it_requires_exactly_one_method() {
            let err = parse_err(&["subreddits"]);
            assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
            let err = parse_err(&["subreddits", "--popular", "--new"]);
            assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
        }

        #[test]
        fn it_selects_a_method() {
            let method = |args: &[&str]| subreddits(args).method.method().unwrap();
            assert_eq!(method(&["--search", "python"]), Method::Search("python".into()));
            assert_eq!(method(&["--popular"]), Method::Popular);
            assert_eq!(method(&["--new"]), Method::New);
            assert_eq!(
                method(&["--recommend", "rust, golang"]),
                Method::Recommend(vec!["rust".into(), "golang".into()])
            );
        }

        #[test]
        fn it_rejects_empty_recommendations() {
            let err = subreddits(&["--recommend", " , "]).method.method().unwrap_err();
            assert_eq!(err.exit_code(), 2);
        }

        #[test]
        fn it_builds_filters() {
            let config = subreddits(&[
                "--popular",
                "--min-subscribers",
                "100",
                "--exclude-nsfw",
                "--sort",
                "subscribers-desc",
            ]);
            assert_eq!(config.limit(), 25);
            assert_eq!(config.sort, SortOrder::SubscribersDesc);
            assert_eq!(
                config.filter(),
                SubredditFilter::default()
                    .min_subscribers(Some(100))
                    .exclude_nsfw(true)
            );
        }
    }

    mod errors {
        use super::*;
        use pretty_assertions::assert_eq;
        use crate::http::HTTPError;
        use crate::reddit::thing;
        use reqwest::StatusCode;

        fn failed(post_id: &str) -> ThreadResult {
            ThreadResult {
                post_id: post_id.to_string(),
                result: Err(reddit::Error::SourceUnavailable(format!("post {post_id}"))),
            }
        }

        #[test]
        fn it_maps_errors_to_exit_codes() {
            assert_eq!(Error::Config(ConfigError::Missing("REDDIT_CLIENT_ID")).exit_code(), 2);
            assert_eq!(Error::Usage("nope".into()).exit_code(), 2);
            let source = reddit::Error::Transient(HTTPError::Http(StatusCode::BAD_GATEWAY));
            assert_eq!(Error::from(source).exit_code(), 1);
            assert_eq!(Error::NoPosts.exit_code(), 1);
            assert_eq!(Error::NoSubreddits.exit_code(), 1);
            let parse = reddit::Error::Parse(thing::Error::Unexpected("?".into()));
            assert_eq!(Error::from(parse).exit_code(), 1);
        }

        #[test]
        fn it_fails_a_walk_that_fetched_nothing() {
            let err = reddit::Error::SourceUnavailable("r/secret".into());
            let result = settle(&PaginationState::default(), Some(err));
            assert!(matches!(result, Err(Error::Source(_))));
        }

        #[test]
        fn it_accepts_a_walk_without_errors() {
            assert!(settle(&PaginationState::default(), None).is_ok());
        }

        #[test]
        fn it_reports_a_single_failed_post_directly() {
            let err = all_failed(vec![failed("gone")], false).unwrap_err();
            assert!(err.to_string().starts_with("post gone is unavailable"));
        }

        #[test]
        fn it_reports_a_failed_batch() {
            let err = all_failed(vec![failed("a"), failed("b")], false).unwrap_err();
            assert!(matches!(err, Error::NoPosts));
        }

        #[test]
        fn it_fails_an_empty_batch() {
            assert!(matches!(all_failed(vec![], false), Err(Error::NoPosts)));
        }

        #[test]
        fn it_accepts_a_batch_interrupted_before_any_post() {
            let results = all_failed(vec![], true).unwrap();
            assert!(results.is_empty());
        }

        #[test]
        fn it_still_fails_an_interrupted_batch_whose_posts_failed() {
            let err = all_failed(vec![failed("a"), failed("b")], true).unwrap_err();
            assert!(matches!(err, Error::NoPosts));
        }
    }
}
