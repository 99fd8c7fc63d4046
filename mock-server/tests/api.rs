use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, MockState, RecordedRequest, ScriptedResponse};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "text/plain")
        .body(body.to_string())
        .unwrap()
}

// --- echo ---

#[tokio::test]
async fn empty_script_echoes_request() {
    let state = MockState::new();
    let resp = app(state.clone())
        .oneshot(request("POST", "/v1/items?a=1", "payload"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echoed: RecordedRequest = body_json(resp).await;
    assert_eq!(echoed.method, "POST");
    assert_eq!(echoed.path, "/v1/items");
    assert_eq!(echoed.query.as_deref(), Some("a=1"));
    assert_eq!(echoed.body, "payload");
    assert_eq!(echoed.header("content-type"), Some("text/plain"));
    assert_eq!(state.requests(), vec![echoed]);
}

// --- script ---

#[tokio::test]
async fn scripted_responses_replay_in_order() {
    let state = MockState::new();
    state.push(ScriptedResponse::status(503).with_body("busy"));
    state.push(
        ScriptedResponse::status(200)
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"ok":true}"#),
    );

    let first = app(state.clone())
        .oneshot(request("GET", "/items", ""))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_bytes(first).await, "busy");

    let second = app(state.clone())
        .oneshot(request("GET", "/items", ""))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(
        second.headers().get(http::header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(body_bytes(second).await, r#"{"ok":true}"#);
    assert_eq!(state.requests().len(), 2);
}

#[tokio::test]
async fn script_route_queues_responses() {
    let state = MockState::new();
    let resp = app(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/_mock/script")
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(r#"[{"status":429},{"status":401,"body":"denied"}]"#.to_string())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app(state.clone())
        .oneshot(request("GET", "/anything", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

    let resp = app(state.clone())
        .oneshot(request("GET", "/anything", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_bytes(resp).await, "denied");
}

#[tokio::test]
async fn script_route_rejects_malformed_json() {
    let resp = app(MockState::new())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/_mock/script")
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(r#"[{"code":200}]"#.to_string())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- request log ---

#[tokio::test]
async fn requests_route_lists_recorded_requests() {
    let state = MockState::new();
    app(state.clone())
        .oneshot(request("DELETE", "/items/7", ""))
        .await
        .unwrap();

    let resp = app(state)
        .oneshot(Request::builder().uri("/_mock/requests").body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let requests: Vec<RecordedRequest> = body_json(resp).await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "DELETE");
    assert_eq!(requests[0].path, "/items/7");
}
