//! Verify preparation and classification against JSON test vectors stored in
//! `test-vectors/`.
//!
//! Each prepare vector describes a command, and the request expected on the
//! wire; each classify vector maps a status (plus optional headers and body)
//! onto the expected outcome.

use std::cell::RefCell;

use apicall_core::{
    classify_status, ApiError, Command, Headers, HttpMethod, HttpRequest, HttpResponse,
    RequestOptions, TransportError,
};

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        "PATCH" => HttpMethod::Patch,
        "HEAD" => HttpMethod::Head,
        "OPTIONS" => HttpMethod::Options,
        other => panic!("unknown method: {other}"),
    }
}

fn pairs(value: &serde_json::Value) -> Vec<(String, String)> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|h| {
                    let arr = h.as_array().unwrap();
                    (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
                })
                .collect()
        })
        .unwrap_or_default()
}

fn variant_name(err: &ApiError) -> &'static str {
    match err {
        ApiError::Redirect(_) => "Redirect",
        ApiError::Authorization(_) => "Authorization",
        ApiError::RateLimit(_) => "RateLimit",
        ApiError::Client(_) => "Client",
        ApiError::Server(_) => "Server",
        ApiError::Transmission(_) => "Transmission",
    }
}

// ---------------------------------------------------------------------------
// Prepare
// ---------------------------------------------------------------------------

#[test]
fn prepare_test_vectors() {
    let raw = include_str!("../../test-vectors/prepare.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected_req = &case["expected_request"];

        let mut options = RequestOptions::default();
        for (n, v) in pairs(&case["options_header"]) {
            options = options.with_header(n, v);
        }
        let mut command = Command::new(
            parse_method(case["method"].as_str().unwrap()),
            case["url"].as_str().unwrap(),
        )
        .options(options);
        if let Some(params) = case["params"].as_object() {
            for (n, v) in params {
                command = command.param(n.as_str(), v.as_str().unwrap());
            }
        }
        for (n, v) in pairs(&case["query"]) {
            command = command.query(n, v);
        }
        for (n, v) in pairs(&case["header"]) {
            command = command.header(n, v);
        }
        if let Some(body) = case["body"].as_str() {
            command = command.body(body);
        }

        let sent: RefCell<Option<HttpRequest>> = RefCell::new(None);
        let transport = |request: &HttpRequest| -> Result<HttpResponse, TransportError> {
            *sent.borrow_mut() = Some(request.clone());
            Ok(HttpResponse {
                status: 200,
                headers: Headers::new(),
                body: Vec::new(),
            })
        };
        command.execute(&transport).unwrap();
        let req = sent.into_inner().unwrap();

        assert_eq!(req.method, parse_method(case["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.url, expected_req["url"].as_str().unwrap(), "{name}: url");

        let headers: Vec<(String, String)> = req
            .headers
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        assert_eq!(headers, pairs(&expected_req["headers"]), "{name}: headers");

        let body = req.body.map(|b| String::from_utf8(b).unwrap());
        assert_eq!(body.as_deref(), expected_req["body"].as_str(), "{name}: body");
    }
}

// ---------------------------------------------------------------------------
// Classify
// ---------------------------------------------------------------------------

#[test]
fn classify_test_vectors() {
    let raw = include_str!("../../test-vectors/classify.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let status = case["status"].as_u64().unwrap() as u16;
        let headers: Headers = pairs(&case["headers"]).into_iter().collect();
        let body = case["body"].as_str().unwrap_or_default().as_bytes();

        let outcome = classify_status(status, &headers, body);
        let expected = case["expected"].as_str().unwrap();
        match outcome {
            Ok(()) => assert_eq!(expected, "Success", "{name}: outcome"),
            Err(err) => {
                assert_eq!(variant_name(&err), expected, "{name}: outcome");
                assert_eq!(err.status(), Some(status), "{name}: status");
                assert_eq!(err.details().body, body, "{name}: body");
                if let Some(fragment) = case["message_contains"].as_str() {
                    assert!(err.to_string().contains(fragment), "{name}: message");
                }
            }
        }
    }
}
