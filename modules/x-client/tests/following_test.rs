// Exercises XClient against a scripted local server.
//
// Each page is keyed by the pagination token that requests it ("" for the
// first page). A key can carry a queue of one-shot responses (429s, 500s)
// that are served before the page itself. Pages carry a reset header of
// "now" unless the script overrides it.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use tokio::time::Instant;
use x_client::{FollowingPage, PageMeta, PublicMetrics, UserProfile, XClient, MAX_RESET_WAIT};

#[derive(Clone, Copy)]
enum Scripted {
    RateLimited { remaining: u64 },
    ServerError,
}

#[derive(Clone, Copy)]
enum PageReset {
    SecondsAhead(f64),
    Raw(&'static str),
}

#[derive(Default)]
struct Script {
    pages: HashMap<String, FollowingPage>,
    interrupts: HashMap<String, VecDeque<Scripted>>,
    page_reset: Option<PageReset>,
    requests: Vec<Request>,
}

#[derive(Debug, Clone)]
struct Request {
    user_id: String,
    token: Option<String>,
    max_results: Option<String>,
    user_fields: Option<String>,
    authorization: Option<String>,
    at: Instant,
}

type Shared = Arc<Mutex<Script>>;

async fn following(
    State(script): State<Shared>,
    Path(user_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut script = script.lock().unwrap();
    let token = params.get("pagination_token").cloned();
    script.requests.push(Request {
        user_id,
        token: token.clone(),
        max_results: params.get("max_results").cloned(),
        user_fields: params.get("user.fields").cloned(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        at: Instant::now(),
    });

    let key = token.unwrap_or_default();
    let reset = Utc::now().timestamp().to_string();

    if let Some(next) = script.interrupts.get_mut(&key).and_then(|q| q.pop_front()) {
        return match next {
            Scripted::RateLimited { remaining } => (
                StatusCode::TOO_MANY_REQUESTS,
                [
                    ("x-ratelimit-remaining", remaining.to_string()),
                    ("x-ratelimit-reset", reset),
                ],
                "Too Many Requests",
            )
                .into_response(),
            Scripted::ServerError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "upstream broke").into_response()
            }
        };
    }

    let page_reset = match script.page_reset {
        Some(PageReset::SecondsAhead(secs)) => {
            (Utc::now().timestamp_millis() as f64 / 1000.0 + secs).to_string()
        }
        Some(PageReset::Raw(raw)) => raw.to_string(),
        None => reset,
    };

    match script.pages.get(&key) {
        Some(page) => (
            [
                ("x-ratelimit-remaining", "14".to_string()),
                ("x-ratelimit-reset", page_reset),
            ],
            Json(page.clone()),
        )
            .into_response(),
        None => (StatusCode::BAD_REQUEST, "unknown token").into_response(),
    }
}

fn profile(id: &str) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        username: format!("user_{id}"),
        name: format!("User {id}"),
        public_metrics: PublicMetrics {
            followers_count: 100,
            following_count: 10,
        },
    }
}

/// Three pages: "" -> "t2" -> "t3", two profiles each.
fn three_pages() -> Script {
    let mut script = Script::default();
    let chain = [("", Some("t2")), ("t2", Some("t3")), ("t3", None)];
    for (i, (key, next)) in chain.iter().enumerate() {
        script.pages.insert(
            key.to_string(),
            FollowingPage {
                data: vec![profile(&format!("{i}a")), profile(&format!("{i}b"))],
                meta: PageMeta {
                    next_token: next.map(str::to_string),
                    result_count: Some(2),
                },
            },
        );
    }
    script
}

async fn serve(script: Script) -> (String, Shared) {
    let shared: Shared = Arc::new(Mutex::new(script));
    let app = Router::new()
        .route("/users/{id}/following", get(following))
        .with_state(shared.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), shared)
}

fn client(base_url: &str) -> XClient {
    XClient::new("secret-token")
        .with_base_url(base_url)
        .with_page_size(2)
        .with_transport_backoff(Duration::ZERO)
}

fn tokens(shared: &Shared) -> Vec<Option<String>> {
    shared.lock().unwrap().requests.iter().map(|r| r.token.clone()).collect()
}

#[tokio::test]
async fn pages_until_no_next_token() {
    let (url, shared) = serve(three_pages()).await;

    let fetch = client(&url).fetch_following("4646461997", None).await;

    assert!(!fetch.exhausted);
    assert_eq!(fetch.pages, 3);
    assert_eq!(fetch.profiles.len(), 6);
    assert_eq!(fetch.resume_token, None);
    assert_eq!(
        tokens(&shared),
        vec![None, Some("t2".to_string()), Some("t3".to_string())]
    );

    let first = shared.lock().unwrap().requests[0].clone();
    assert_eq!(first.user_id, "4646461997");
    assert_eq!(first.max_results.as_deref(), Some("2"));
    assert_eq!(first.user_fields.as_deref(), Some("id,name,username,public_metrics"));
    assert_eq!(first.authorization.as_deref(), Some("Bearer secret-token"));
}

#[tokio::test]
async fn starts_from_supplied_page_token() {
    let (url, shared) = serve(three_pages()).await;

    let fetch = client(&url).fetch_following("1", Some("t2")).await;

    assert!(!fetch.exhausted);
    assert_eq!(fetch.pages, 2);
    let ids: Vec<_> = fetch.profiles.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["1a", "1b", "2a", "2b"]);
    assert_eq!(tokens(&shared)[0].as_deref(), Some("t2"));
}

#[tokio::test]
async fn rate_limit_with_quota_left_retries_same_page() {
    let mut script = three_pages();
    script.interrupts.insert(
        "t2".to_string(),
        VecDeque::from([Scripted::RateLimited { remaining: 5 }]),
    );
    let (url, shared) = serve(script).await;

    let fetch = client(&url).fetch_following("1", None).await;

    assert!(!fetch.exhausted);
    assert_eq!(fetch.profiles.len(), 6);
    assert_eq!(
        tokens(&shared),
        vec![
            None,
            Some("t2".to_string()),
            Some("t2".to_string()),
            Some("t3".to_string())
        ]
    );
}

#[tokio::test]
async fn daily_cap_returns_accumulated_profiles_and_in_flight_token() {
    let mut script = three_pages();
    script.interrupts.insert(
        "t2".to_string(),
        VecDeque::from([Scripted::RateLimited { remaining: 0 }]),
    );
    let (url, _shared) = serve(script).await;

    let fetch = client(&url).fetch_following("1", None).await;

    assert!(fetch.exhausted);
    assert_eq!(fetch.pages, 1);
    assert_eq!(fetch.profiles.len(), 2);
    assert_eq!(fetch.resume_token.as_deref(), Some("t2"));
}

#[tokio::test]
async fn other_error_status_ends_fetch() {
    let mut script = three_pages();
    script
        .interrupts
        .insert("t3".to_string(), VecDeque::from([Scripted::ServerError]));
    let (url, shared) = serve(script).await;

    let fetch = client(&url).fetch_following("1", None).await;

    assert!(fetch.exhausted);
    assert_eq!(fetch.profiles.len(), 4);
    assert_eq!(fetch.resume_token.as_deref(), Some("t3"));
    // No retry after a non-429 failure.
    assert_eq!(tokens(&shared).len(), 3);
}

#[tokio::test]
async fn transport_failures_are_retried_a_bounded_number_of_times() {
    // Grab a free port, then close it so every connect is refused.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let fetch = client(&format!("http://{addr}"))
        .with_max_transport_retries(2)
        .fetch_following("1", Some("t9"))
        .await;

    assert!(fetch.exhausted);
    assert!(fetch.profiles.is_empty());
    assert_eq!(fetch.pages, 0);
    assert_eq!(fetch.resume_token.as_deref(), Some("t9"));
}

fn request_gaps(shared: &Shared) -> Vec<Duration> {
    let script = shared.lock().unwrap();
    script
        .requests
        .windows(2)
        .map(|pair| pair[1].at.duration_since(pair[0].at))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn waits_for_reset_before_requesting_next_page() {
    let mut script = three_pages();
    script.page_reset = Some(PageReset::SecondsAhead(5.0));
    let (url, shared) = serve(script).await;

    let fetch = client(&url).fetch_following("1", None).await;

    assert!(!fetch.exhausted);
    assert_eq!(fetch.pages, 3);
    let gaps = request_gaps(&shared);
    assert_eq!(gaps.len(), 2);
    for gap in gaps {
        assert!(gap >= Duration::from_millis(4900), "next page requested after {gap:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn last_page_does_not_wait_for_reset() {
    let mut script = three_pages();
    script.page_reset = Some(PageReset::SecondsAhead(60.0));
    let (url, _shared) = serve(script).await;

    let started = Instant::now();
    let fetch = client(&url).fetch_following("1", Some("t3")).await;

    assert_eq!(fetch.pages, 1);
    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn far_future_reset_is_capped_instead_of_panicking() {
    let mut script = three_pages();
    script.page_reset = Some(PageReset::Raw("1e30"));
    let (url, shared) = serve(script).await;

    let fetch = client(&url).fetch_following("1", None).await;

    assert!(!fetch.exhausted);
    assert_eq!(fetch.profiles.len(), 6);
    for gap in request_gaps(&shared) {
        assert!(gap >= MAX_RESET_WAIT);
    }
}

#[tokio::test(start_paused = true)]
async fn non_numeric_reset_is_ignored() {
    let mut script = three_pages();
    script.page_reset = Some(PageReset::Raw("inf"));
    let (url, _shared) = serve(script).await;

    let fetch = client(&url).fetch_following("1", None).await;

    assert!(!fetch.exhausted);
    assert_eq!(fetch.profiles.len(), 6);
}
