#![allow(dead_code)]

use async_trait::async_trait;
use rust_xlsxwriter::Workbook;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use threadsheet::{
    ApiClient, ApiRequest, FetchCaps, HttpError, InputCells, RetryPolicy, Throttle, Transport,
};

pub type Reply = Result<Value, HttpError>;

/// Scripted transport keyed by `ApiRequest::describe()`.
///
/// Replies for a key are served in order; the last one repeats. Unknown keys
/// answer 418 so a missing route shows up as a hard failure.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, request: &ApiRequest, reply: Reply) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(request.describe())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, request: &ApiRequest) -> usize {
        let key = request.describe();
        self.calls().iter().filter(|c| **c == key).count()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, request: &ApiRequest) -> Result<Value, HttpError> {
        let key = request.describe();
        self.calls.lock().unwrap().push(key.clone());
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&key) {
            Some(q) if q.len() > 1 => q.pop_front().unwrap(),
            Some(q) => q.front().cloned().unwrap(),
            None => Err(HttpError::Status(418)),
        }
    }
}

pub fn throttled() -> Reply {
    Err(HttpError::Throttled { retry_after: None })
}

pub fn client(fake: FakeTransport, attempts: u32) -> ApiClient<FakeTransport> {
    ApiClient::new(
        fake,
        Throttle::per_minute(100_000),
        RetryPolicy::immediate(attempts),
        FetchCaps::default(),
    )
}

/// Input cells as if read from a sheet starting at row 1.
pub fn urls(cells: &[&str]) -> InputCells {
    cells.iter().map(|c| c.to_string()).collect::<Vec<_>>().into()
}

pub fn listing(children: Vec<Value>) -> Value {
    json!({"kind": "Listing", "data": {"children": children}})
}

pub fn post_data(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "author": "op_user",
        "selftext": "post body\nsecond line",
        "score": 42,
        "created_utc": 1700000000.0,
        "permalink": format!("/r/rust/comments/{id}/some_slug/"),
        "subreddit": "rust",
        "num_comments": 2,
        "removed_by_category": null
    })
}

pub fn post_listing(id: &str, title: &str) -> Value {
    listing(vec![json!({"kind": "t3", "data": post_data(id, title)})])
}

pub fn comment(id: &str, parent: &str, body: &str, replies: Vec<Value>) -> Value {
    let replies = if replies.is_empty() {
        json!("")
    } else {
        listing(replies)
    };
    json!({"kind": "t1", "data": {
        "id": id,
        "parent_id": parent,
        "author": format!("user_{id}"),
        "body": body,
        "score": 7,
        "created_utc": 1700000100.0,
        "replies": replies
    }})
}

pub fn more(parent: &str, ids: &[&str]) -> Value {
    json!({"kind": "more", "data": {
        "parent_id": parent, "children": ids, "count": ids.len(), "id": ids.first().copied().unwrap_or("_")
    }})
}

pub fn continue_thread(parent: &str) -> Value {
    json!({"kind": "more", "data": {"parent_id": parent, "children": [], "count": 0, "id": "_"}})
}

/// `/comments/<id>` body: `[post listing, comment listing]`.
pub fn comments_response(post_id: &str, title: &str, children: Vec<Value>) -> Value {
    json!([post_listing(post_id, title), listing(children)])
}

pub fn more_children_response(things: Vec<Value>) -> Value {
    json!({"json": {"errors": [], "data": {"things": things}}})
}

/// Route a live post with the given top-level comment things.
pub fn with_thread(fake: FakeTransport, id: &str, title: &str, children: Vec<Value>) -> FakeTransport {
    fake.on(&ApiRequest::post_info(id), Ok(post_listing(id, title)))
        .on(
            &ApiRequest::comments(id, &FetchCaps::default()),
            Ok(comments_response(id, title, children)),
        )
}

/// Write a one-column input workbook; empty strings leave the cell blank.
pub fn write_input(path: &Path, cells: &[&str]) {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    for (i, c) in cells.iter().enumerate() {
        if !c.is_empty() {
            ws.write_string(i as u32, 0, *c).unwrap();
        }
    }
    wb.save(path).unwrap();
}

/// All rows of a sheet as strings, header included.
pub fn read_sheet(path: &Path, sheet: &str) -> Vec<Vec<String>> {
    use calamine::{open_workbook, Reader, Xlsx};
    let mut wb: Xlsx<_> = open_workbook(path).unwrap();
    let range = wb.worksheet_range(sheet).unwrap();
    range
        .rows()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect()
}
