use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tetl::{CancelToken, Credentials, LookupError, PostLookup, PostRemover, TwitterClient};

/// Local HTTP server answering one connection per canned response, in order.
struct Stub {
    base: String,
    /// Request heads (request line + headers), lowercased.
    requests: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl Stub {
    fn start(responses: Vec<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();
        let handle = thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut head = String::new();
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                        break;
                    }
                    head.push_str(&line);
                }
                seen.lock().unwrap().push(head.to_lowercase());
                stream.write_all(response.as_bytes()).unwrap();
                stream.flush().unwrap();
            }
        });
        Self { base, requests, handle }
    }

    /// Wait for every canned response to be served and return the recorded requests.
    fn finish(self) -> Vec<String> {
        self.handle.join().unwrap();
        let requests = self.requests.lock().unwrap().clone();
        requests
    }
}

fn http(status: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut out = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for (k, v) in headers {
        out.push_str(&format!("{k}: {v}\r\n"));
    }
    out.push_str("\r\n");
    out.push_str(body);
    out
}

const STATUS_JSON: &str = r#"{
    "id_str": "100",
    "created_at": "Wed Oct 10 20:19:24 +0000 2018",
    "full_text": "is this &amp; that \"ok\"?",
    "favorite_count": 7,
    "retweet_count": 2,
    "entities": {"urls": [{"expanded_url": "https://example.com/q"}]},
    "user": {"screen_name": "someone"}
}"#;

fn client(base: &str) -> TwitterClient {
    let creds = Credentials {
        api_token: "app-token".to_string(),
        user_token: Some("user-token".to_string()),
        api_base: base.to_string(),
    };
    TwitterClient::new(&creds).unwrap().with_rate_limit_waits(1, Duration::ZERO)
}

#[test]
fn resolve_decodes_a_status() {
    let stub = Stub::start(vec![http("200 OK", &[], STATUS_JSON)]);
    let op = client(&stub.base).resolve("100").unwrap();
    assert_eq!(op.author, "someone");
    assert_eq!(op.post.id, "100");
    assert_eq!(op.post.created_at, "2018-10-10T20:19:24+00:00");
    assert_eq!(op.post.text, "is this & that 'ok'?");
    assert_eq!(op.post.likes, 7);
    assert_eq!(op.post.shares, 2);
    assert_eq!(op.post.urls, "https://example.com/q");

    let requests = stub.finish();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("get /1.1/statuses/show.json?id=100&tweet_mode=extended "), "{}", requests[0]);
    assert!(requests[0].contains("authorization: bearer app-token"), "{}", requests[0]);
}

#[test]
fn missing_and_protected_posts_are_not_found() {
    let stub = Stub::start(vec![http("404 Not Found", &[], "{}"), http("403 Forbidden", &[], "{}")]);
    let c = client(&stub.base);
    let gone = c.resolve("1").unwrap_err();
    assert!(gone.is_not_found(), "{gone:?}");
    let private = c.resolve("2").unwrap_err();
    assert!(private.is_not_found(), "{private:?}");
    assert_eq!(stub.finish().len(), 2);
}

#[test]
fn other_statuses_are_reported_as_http_errors() {
    let stub = Stub::start(vec![http("500 Internal Server Error", &[], "{}")]);
    let err = client(&stub.base).resolve("1").unwrap_err();
    assert!(matches!(err, LookupError::Http { status: 500, .. }), "{err:?}");
    assert!(!err.is_not_found());
    stub.finish();
}

#[test]
fn rate_limit_is_waited_out_then_retried() {
    let stub = Stub::start(vec![
        http("429 Too Many Requests", &[("x-rate-limit-reset", "0")], "{}"),
        http("200 OK", &[], STATUS_JSON),
    ]);
    let op = client(&stub.base).resolve("100").unwrap();
    assert_eq!(op.post.id, "100");
    assert_eq!(stub.finish().len(), 2);
}

#[test]
fn repeated_rate_limit_gives_up() {
    let stub = Stub::start(vec![
        http("429 Too Many Requests", &[("x-rate-limit-reset", "0")], "{}"),
        http("429 Too Many Requests", &[("x-rate-limit-reset", "0")], "{}"),
    ]);
    let err = client(&stub.base).resolve("100").unwrap_err();
    assert!(matches!(err, LookupError::RateLimited { .. }), "{err:?}");
    assert_eq!(stub.finish().len(), 2);
}

/// A cancelled run does not sit out the rate-limit window.
#[test]
fn rate_limit_wait_stops_on_cancel() {
    let stub = Stub::start(vec![http("429 Too Many Requests", &[("x-rate-limit-reset", "9999999999")], "{}")]);
    let cancel = CancelToken::new();
    cancel.cancel();
    let c = client(&stub.base).with_rate_limit_waits(3, Duration::from_secs(60)).with_cancel(cancel);

    let started = Instant::now();
    let err = c.resolve("100").unwrap_err();
    assert!(matches!(err, LookupError::Cancelled), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(stub.finish().len(), 1);
}

#[test]
fn remove_uses_the_user_token() {
    let stub = Stub::start(vec![http("200 OK", &[], r#"{"data":{"deleted":true}}"#)]);
    client(&stub.base).remove("55").unwrap();
    let requests = stub.finish();
    assert!(requests[0].starts_with("delete /2/tweets/55 "), "{}", requests[0]);
    assert!(requests[0].contains("authorization: bearer user-token"), "{}", requests[0]);
}

#[test]
fn remove_without_user_token_is_not_configured() {
    let creds = Credentials {
        api_token: "app-token".to_string(),
        user_token: None,
        api_base: "http://127.0.0.1:9".to_string(),
    };
    let err = TwitterClient::new(&creds).unwrap().remove("55").unwrap_err();
    assert!(matches!(err, LookupError::NotConfigured("TWITTER_USER_TOKEN")), "{err:?}");
}
