#[path = "common/mod.rs"]
mod common;

use common::*;
use threadsheet::fetch::fetch_thread;
use threadsheet::models::PostReference;
use serde_json::Value;
use std::time::{Duration, Instant};
use threadsheet::api::MORE_CHUNK;
use threadsheet::{ApiClient, ApiRequest, Error, FetchCaps, HttpError, RetryPolicy, Throttle};

fn reference(id: &str) -> PostReference {
    PostReference {
        raw: format!("https://redd.it/{id}"),
        id: id.to_string(),
    }
}

fn order(tree: &threadsheet::models::CommentTree) -> Vec<(&str, usize)> {
    tree.depth_first().map(|c| (c.id.as_str(), c.depth)).collect()
}

/// Two 429s then a good answer: the caller only sees the good answer.
#[tokio::test]
async fn throttling_is_retried_transparently() {
    let req = ApiRequest::post_info("abc");
    let fake = FakeTransport::new()
        .on(&req, throttled())
        .on(&req, throttled())
        .on(&req, Ok(post_listing("abc", "hello")));
    let client = client(fake, 3);

    let post = client.fetch_post(&reference("abc")).await.unwrap();
    assert_eq!(post.title.as_deref(), Some("hello"));
    assert!(!post.deleted);
    assert_eq!(client.transport().calls_to(&req), 3);
}

#[tokio::test]
async fn throttling_beyond_budget_is_rate_limited() {
    let req = ApiRequest::post_info("abc");
    let fake = FakeTransport::new().on(&req, throttled());
    let client = client(fake, 3);

    let err = client.fetch_post(&reference("abc")).await.unwrap_err();
    assert!(matches!(err, Error::RateLimited { attempts: 3, .. }), "{err:?}");
    assert_eq!(client.transport().calls_to(&req), 3);
}

#[tokio::test]
async fn transient_errors_share_the_retry_policy() {
    let req = ApiRequest::post_info("abc");
    let fake = FakeTransport::new()
        .on(&req, Err(HttpError::Status(503)))
        .on(&req, Err(HttpError::Network("connection reset".into())))
        .on(&req, Ok(post_listing("abc", "ok")));
    let client = client(fake, 3);
    assert!(client.fetch_post(&reference("abc")).await.is_ok());

    let fake = FakeTransport::new().on(&req, Err(HttpError::Network("timeout".into())));
    let client = common::client(fake, 2);
    let err = client.fetch_post(&reference("abc")).await.unwrap_err();
    assert!(matches!(err, Error::TransientNetwork { attempts: 2, .. }), "{err:?}");
}

#[tokio::test]
async fn forbidden_is_not_retried() {
    let req = ApiRequest::post_info("abc");
    let fake = FakeTransport::new().on(&req, Err(HttpError::Status(403)));
    let client = client(fake, 5);
    let err = client.fetch_post(&reference("abc")).await.unwrap_err();
    assert!(matches!(err, Error::Http { status: 403, .. }));
    assert_eq!(client.transport().calls_to(&req), 1);
}

#[tokio::test]
async fn missing_post_is_data_not_error() {
    let fake = FakeTransport::new()
        .on(&ApiRequest::post_info("gone1"), Err(HttpError::Status(404)))
        .on(&ApiRequest::post_info("gone2"), Ok(listing(vec![])));
    let client = client(fake, 3);

    for id in ["gone1", "gone2"] {
        let thread = fetch_thread(&client, &reference(id)).await.unwrap();
        assert!(thread.post.deleted);
        assert_eq!(thread.post.id, id);
        assert!(thread.comments.is_empty());
    }
    // no comment calls for posts that are gone
    assert_eq!(client.transport().calls().len(), 2);
}

#[tokio::test]
async fn failed_post_fetch_skips_comments() {
    let fake = FakeTransport::new().on(&ApiRequest::post_info("abc"), Err(HttpError::Status(403)));
    let client = client(fake, 2);
    assert!(fetch_thread(&client, &reference("abc")).await.is_err());
    let comments = ApiRequest::comments("abc", &FetchCaps::default());
    assert_eq!(client.transport().calls_to(&comments), 0);
}

#[tokio::test]
async fn more_placeholders_are_resolved_in_place() {
    let fake = with_thread(
        FakeTransport::new(),
        "p",
        "title",
        vec![
            comment("c1", "t3_p", "first", vec![]),
            more("t3_p", &["c2", "c3"]),
        ],
    )
    .on(
        &ApiRequest::more_children("p", &["c2".into(), "c3".into()]),
        Ok(more_children_response(vec![
            comment("c2", "t3_p", "second", vec![]),
            comment("c3", "t1_c2", "reply", vec![]),
        ])),
    );
    let client = client(fake, 2);

    let thread = fetch_thread(&client, &reference("p")).await.unwrap();
    assert!(thread.partial.is_none());
    assert_eq!(
        order(&thread.comments),
        vec![("c1", 0), ("c2", 0), ("c3", 1)]
    );
}

#[tokio::test]
async fn continue_thread_grafts_the_sub_thread() {
    let fake = with_thread(
        FakeTransport::new(),
        "p",
        "title",
        vec![comment(
            "c1",
            "t3_p",
            "root",
            vec![comment("c2", "t1_c1", "child", vec![continue_thread("t1_c2")])],
        )],
    )
    .on(
        &ApiRequest::thread("p", "c2", 8),
        Ok(comments_response(
            "p",
            "title",
            vec![comment(
                "c2",
                "t1_c1",
                "child",
                vec![comment("c3", "t1_c2", "grandchild", vec![])],
            )],
        )),
    );
    let client = client(fake, 2);

    let thread = fetch_thread(&client, &reference("p")).await.unwrap();
    assert_eq!(
        order(&thread.comments),
        vec![("c1", 0), ("c2", 1), ("c3", 2)]
    );
}

/// A failing "more" call keeps the post and whatever comments came first.
#[tokio::test]
async fn comment_failure_yields_partial_thread() {
    let fake = with_thread(
        FakeTransport::new(),
        "p",
        "title",
        vec![
            comment("c1", "t3_p", "first", vec![]),
            more("t3_p", &["c2"]),
        ],
    )
    .on(&ApiRequest::more_children("p", &["c2".into()]), throttled());
    let client = client(fake, 2);

    let thread = fetch_thread(&client, &reference("p")).await.unwrap();
    assert_eq!(thread.post.title.as_deref(), Some("title"));
    assert_eq!(thread.comments.len(), 1);
    assert!(matches!(thread.partial, Some(Error::RateLimited { .. })));
}

#[tokio::test]
async fn comment_cap_stops_more_resolution() {
    let caps = FetchCaps {
        max_comments: 2,
        max_depth: 8,
    };
    let fake = FakeTransport::new().on(
        &ApiRequest::comments("p", &caps),
        Ok(comments_response(
            "p",
            "title",
            vec![
                comment("c1", "t3_p", "a", vec![]),
                comment("c2", "t3_p", "b", vec![]),
                more("t3_p", &["c3"]),
            ],
        )),
    );
    let client = ApiClient::new(
        fake,
        Throttle::per_minute(100_000),
        RetryPolicy::immediate(2),
        caps,
    );

    let fetched = client.fetch_comments(&reference("p")).await;
    assert!(fetched.truncated);
    assert!(fetched.interrupted.is_none());
    assert_eq!(fetched.tree.len(), 2);
    let more_req = ApiRequest::more_children("p", &["c3".into()]);
    assert_eq!(client.transport().calls_to(&more_req), 0);
}

/// 150 hidden ids under the post, answered by two `morechildren` calls.
fn wide_thread(caps: &FetchCaps) -> (FakeTransport, Vec<String>) {
    let ids: Vec<String> = (0..150).map(|i| format!("m{i}")).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let answer = |chunk: &[String]| -> Value {
        more_children_response(chunk.iter().map(|id| comment(id, "t3_p", "x", vec![])).collect())
    };
    let mut fake = FakeTransport::new().on(
        &ApiRequest::comments("p", caps),
        Ok(comments_response("p", "title", vec![more("t3_p", &id_refs)])),
    );
    for chunk in ids.chunks(MORE_CHUNK) {
        fake = fake.on(&ApiRequest::more_children("p", chunk), Ok(answer(chunk)));
    }
    (fake, ids)
}

#[tokio::test]
async fn long_more_lists_are_fetched_in_chunks() {
    let caps = FetchCaps::default();
    let (fake, ids) = wide_thread(&caps);
    let client = ApiClient::new(fake, Throttle::per_minute(100_000), RetryPolicy::immediate(2), caps);

    let fetched = client.fetch_comments(&reference("p")).await;
    assert!(fetched.interrupted.is_none());
    assert!(!fetched.truncated);
    assert_eq!(fetched.tree.len(), 150);
    let got: Vec<&str> = fetched.tree.depth_first().map(|c| c.id.as_str()).collect();
    assert_eq!(got.first(), Some(&"m0"));
    assert_eq!(got.last(), Some(&"m149"));

    let first = ApiRequest::more_children("p", &ids[..MORE_CHUNK]);
    let second = ApiRequest::more_children("p", &ids[MORE_CHUNK..]);
    assert_eq!(client.transport().calls_to(&first), 1);
    assert_eq!(client.transport().calls_to(&second), 1);
}

#[tokio::test]
async fn comment_cap_is_checked_between_chunks() {
    let caps = FetchCaps {
        max_comments: MORE_CHUNK,
        max_depth: 8,
    };
    let (fake, ids) = wide_thread(&caps);
    let client = ApiClient::new(fake, Throttle::per_minute(100_000), RetryPolicy::immediate(2), caps);

    let fetched = client.fetch_comments(&reference("p")).await;
    assert!(fetched.truncated);
    assert_eq!(fetched.tree.len(), MORE_CHUNK);
    let second = ApiRequest::more_children("p", &ids[MORE_CHUNK..]);
    assert_eq!(client.transport().calls_to(&second), 0);
}

/// A Retry-After on one call holds back every other holder of the throttle.
#[tokio::test]
async fn server_hint_pauses_every_caller() {
    let req = ApiRequest::post_info("abc");
    let fake = FakeTransport::new()
        .on(
            &req,
            Err(HttpError::Throttled {
                retry_after: Some(Duration::from_millis(300)),
            }),
        )
        .on(&req, Ok(post_listing("abc", "hello")));
    let throttle = Throttle::per_minute(100_000);
    let policy = RetryPolicy {
        attempts: 2,
        base: Duration::ZERO,
        multiplier: 1.0,
        max: Duration::from_secs(1),
        jitter: 0.0,
    };
    let client = ApiClient::new(fake, throttle.clone(), policy, FetchCaps::default());

    let abc = reference("abc");
    let started = Instant::now();
    let (post, other_waited) = tokio::join!(client.fetch_post(&abc), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let t = Instant::now();
        throttle.gate().await;
        t.elapsed()
    });

    assert_eq!(post.unwrap().title.as_deref(), Some("hello"));
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(other_waited >= Duration::from_millis(200), "{other_waited:?}");
}

#[tokio::test]
async fn server_hint_is_capped_by_policy() {
    let req = ApiRequest::post_info("abc");
    let fake = FakeTransport::new()
        .on(
            &req,
            Err(HttpError::Throttled {
                retry_after: Some(Duration::from_secs(u64::MAX / 2)),
            }),
        )
        .on(&req, Ok(post_listing("abc", "hello")));
    let client = client(fake, 2);

    let post = tokio::time::timeout(Duration::from_secs(5), client.fetch_post(&reference("abc")))
        .await
        .expect("hint should be capped");
    assert!(post.is_ok());
}
