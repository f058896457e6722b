use crate::clock::{self, Clock, DateTime, Utc};
use crate::http::{HTTPError, HTTPResult};
use crate::reddit::service::Service;
use crate::reddit::{
    CommentSlot, CommentSource, Error, ListingSource, MoreComments, Post, PostKind, RemoteComment,
};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::Range;
use std::sync::Mutex;

pub fn do_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct FrozenClock {
    datetime: DateTime<Utc>,
}

impl FrozenClock {
    pub fn new(datetime: DateTime<Utc>) -> Self {
        FrozenClock { datetime }
    }
}

impl Default for FrozenClock {
    fn default() -> Self {
        let datetime = DateTime::parse_from_rfc3339("2025-05-23T10:13:00-07:00")
            .expect("invalid date supplied")
            .with_timezone(&Utc);
        Self::new(datetime)
    }
}

impl Clock for FrozenClock {
    fn now(&self) -> DateTime<Utc> {
        self.datetime
    }
}

/// A service that answers from canned responses instead of the network.
///
/// Responses are keyed by path plus query string, with parameters in the
/// order the client sends them. Unknown requests fail with a 404.
#[derive(Debug, Default)]
pub struct TestService {
    responses: HashMap<String, String>,
    failures: HashMap<String, StatusCode>,
    requests: Mutex<Vec<String>>,
}

impl TestService {
    pub fn respond(mut self, path: &str, query: &[(&str, &str)], body: String) -> Self {
        let query: Vec<(&str, String)> = query.iter().map(|(k, v)| (*k, v.to_string())).collect();
        self.responses.insert(request_key(path, &query), body);
        self
    }

    pub fn fail(mut self, path: &str, status: StatusCode) -> Self {
        self.failures.insert(path.to_string(), status);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("poisoned request log").clone()
    }
}

impl Service for TestService {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> HTTPResult<String> {
        let key = request_key(path, query);
        self.requests.lock().expect("poisoned request log").push(key.clone());

        if let Some(status) = self.failures.get(path) {
            return Err(HTTPError::Http(*status));
        }
        self.responses
            .get(&key)
            .cloned()
            .ok_or(HTTPError::Http(StatusCode::NOT_FOUND))
    }
}

fn request_key(path: &str, query: &[(&str, String)]) -> String {
    if query.is_empty() {
        path.to_string()
    } else {
        let query: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{path}?{}", query.join("&"))
    }
}

pub fn post_json(id: &str, title: &str, score: i64) -> Value {
    json!({
        "kind": "t3",
        "data": {
            "id": id,
            "title": title,
            "author": "mipadi",
            "score": score,
            "num_comments": 12,
            "created_utc": 1744177355.0,
            "is_self": true,
            "selftext": "Some body text",
            "url": format!("https://www.reddit.com/r/learnpython/comments/{id}/title/"),
            "permalink": format!("/r/learnpython/comments/{id}/title/"),
            "subreddit": "learnpython",
            "over_18": false,
            "spoiler": false,
        }
    })
}

pub fn posts_json(ids: Range<usize>, after: Option<&str>) -> String {
    let posts = ids
        .map(|i| post_json(&format!("p{i}"), &format!("Post number {i}"), i as i64))
        .collect();
    listing_json(posts, after)
}

pub fn comment_json(id: &str, parent: &str, body: &str, replies: Vec<Value>) -> Value {
    let replies = if replies.is_empty() {
        json!("")
    } else {
        serde_json::from_str::<Value>(&listing_json(replies, None)).expect("invalid listing")
    };
    json!({
        "kind": "t1",
        "data": {
            "id": id,
            "parent_id": parent,
            "author": "mipadi",
            "score": 3,
            "body": body,
            "created_utc": 1744177355.0,
            "replies": replies,
        }
    })
}

pub fn more_json(id: &str, parent: &str, children: &[&str]) -> Value {
    json!({
        "kind": "more",
        "data": {
            "id": id,
            "parent_id": parent,
            "count": children.len(),
            "children": children,
        }
    })
}

pub fn listing_json(children: Vec<Value>, after: Option<&str>) -> String {
    json!({
        "kind": "Listing",
        "data": {
            "after": after,
            "children": children,
        }
    })
    .to_string()
}

pub fn subreddit_json(name: &str, subscribers: u64, active: u64, nsfw: bool) -> Value {
    json!({
        "kind": "t5",
        "data": {
            "display_name": name,
            "title": format!("The {name} community"),
            "public_description": format!("All about {name}."),
            "subscribers": subscribers,
            "active_user_count": active,
            "created_utc": 1300000000.0,
            "over18": nsfw,
            "quarantine": false,
        }
    })
}

pub fn thread_json(post: Value, comments: Vec<Value>) -> String {
    let post = serde_json::from_str::<Value>(&listing_json(vec![post], None)).expect("invalid listing");
    let comments = serde_json::from_str::<Value>(&listing_json(comments, None)).expect("invalid listing");
    json!([post, comments]).to_string()
}

pub fn fixture_post(id: &str, title: &str) -> Post {
    Post {
        id: id.to_string(),
        title: title.to_string(),
        author: Some("mipadi".to_string()),
        score: 10,
        num_comments: 4,
        created_utc: clock::from_timestamp(1744177355.0),
        kind: PostKind::Text,
        selftext: Some("Some body text".to_string()),
        url: format!("https://www.reddit.com/r/learnpython/comments/{id}/title/"),
        permalink: format!("https://reddit.com/r/learnpython/comments/{id}/title/"),
        subreddit: "learnpython".to_string(),
        over_18: false,
        spoiler: false,
    }
}

/// Top posts of a month in r/learnpython, fifty of them, seven of which
/// mention tutorials in some capitalization.
pub fn learnpython_fixture() -> Vec<Post> {
    let tutorials: HashMap<usize, &str> = [
        (3, "Best tutorial for decorators?"),
        (8, "TUTORIAL: async from scratch"),
        (12, "A tutorial on list comprehensions"),
        (20, "Is this Tutorial outdated?"),
        (31, "Video tutorials vs books"),
        (40, "Finished my first tutorial!"),
        (49, "tutorial hell is real"),
    ]
    .into_iter()
    .collect();

    (1..=50)
        .map(|i| {
            let title = match tutorials.get(&i) {
                Some(title) => title.to_string(),
                None if i % 2 == 0 => format!("Learning Python, week {i}"),
                None => format!("Question about dictionaries #{i}"),
            };
            fixture_post(&format!("lp{i}"), &title)
        })
        .collect()
}

/// A listing source backed by a vector, optionally failing partway.
#[derive(Debug)]
pub struct VecSource<T> {
    items: VecDeque<T>,
    failure: Option<(usize, Error)>,
    pulled: usize,
}

impl<T> VecSource<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into(),
            failure: None,
            pulled: 0,
        }
    }

    pub fn failing(error: Error) -> Self {
        Self::new(Vec::new()).fail_after(0, error)
    }

    pub fn fail_after(mut self, pulled: usize, error: Error) -> Self {
        self.failure = Some((pulled, error));
        self
    }
}

impl<T> ListingSource for VecSource<T> {
    type Item = T;

    async fn next_item(&mut self) -> Result<Option<T>, Error> {
        if self.failure.as_ref().is_some_and(|(n, _)| *n == self.pulled) {
            let (_, error) = self.failure.take().expect("failure vanished");
            return Err(error);
        }
        self.pulled += 1;
        Ok(self.items.pop_front())
    }
}

pub fn remote(id: &str, parent: &str, body: &str, replies: Vec<CommentSlot>) -> CommentSlot {
    CommentSlot::Comment(RemoteComment {
        id: id.to_string(),
        parent_id: parent.to_string(),
        author: Some(format!("user_{id}")),
        score: 1,
        body: body.to_string(),
        created_utc: clock::from_timestamp(1744177355.0),
        replies,
    })
}

pub fn more(id: &str, parent: &str, children: &[&str]) -> CommentSlot {
    CommentSlot::More(MoreComments {
        id: id.to_string(),
        parent_id: parent.to_string(),
        count: children.len() as u64,
        children: children.iter().map(|c| c.to_string()).collect(),
    })
}

/// A comment source backed by in-memory forests.
///
/// Placeholders are expanded by their ID; expansions that were never
/// registered, or that were registered as failures, return an error.
#[derive(Debug, Default)]
pub struct ForestSource {
    threads: HashMap<String, (Post, Vec<CommentSlot>)>,
    expansions: HashMap<String, Vec<CommentSlot>>,
    broken: HashSet<String>,
    expanded: Mutex<Vec<String>>,
}

impl ForestSource {
    pub fn post(mut self, post_id: &str, comments: Vec<CommentSlot>) -> Self {
        let post = fixture_post(post_id, &format!("Thread {post_id}"));
        self.threads.insert(post_id.to_string(), (post, comments));
        self
    }

    pub fn expansion(mut self, more_id: &str, slots: Vec<CommentSlot>) -> Self {
        self.expansions.insert(more_id.to_string(), slots);
        self
    }

    pub fn broken(mut self, more_id: &str) -> Self {
        self.broken.insert(more_id.to_string());
        self
    }

    pub fn expanded(&self) -> Vec<String> {
        self.expanded.lock().expect("poisoned expansion log").clone()
    }
}

impl CommentSource for ForestSource {
    async fn thread(&self, post_id: &str) -> Result<(Post, Vec<CommentSlot>), Error> {
        self.threads
            .get(post_id)
            .cloned()
            .ok_or_else(|| Error::SourceUnavailable(format!("post {post_id}")))
    }

    async fn expand(&self, _post_id: &str, more: &MoreComments) -> Result<Vec<CommentSlot>, Error> {
        self.expanded
            .lock()
            .expect("poisoned expansion log")
            .push(more.id.clone());
        if self.broken.contains(&more.id) {
            return Err(Error::Transient(HTTPError::Http(StatusCode::SERVICE_UNAVAILABLE)));
        }
        self.expansions
            .get(&more.id)
            .cloned()
            .ok_or_else(|| Error::Service(HTTPError::Http(StatusCode::NOT_FOUND)))
    }
}
