//! Process-wide defaults live in a global, so they get their own test binary.

use std::cell::RefCell;

use apicall_core::{
    Command, Headers, HttpMethod, HttpRequest, HttpResponse, RequestOptions, TransportError,
};

#[test]
fn commands_copy_defaults_installed_at_startup() {
    let defaults = RequestOptions::from_json(r#"{"retries":2,"header":{"User-Agent":"apicall-test"}}"#)
        .unwrap();
    RequestOptions::install_defaults(defaults).unwrap();

    let rejected = RequestOptions::install_defaults(RequestOptions::default().with_retries(9));
    assert_eq!(rejected.map_err(|o| o.retries), Err(9));

    let command = Command::new(HttpMethod::Get, "http://localhost/items");
    assert_eq!(command.request_options().retries, 2);

    // A command's copy can change without touching the process defaults.
    let mut overridden = Command::new(HttpMethod::Get, "http://localhost/items")
        .options(RequestOptions::process_defaults().with_header("User-Agent", "custom"));
    assert_eq!(RequestOptions::process_defaults().header.get("user-agent"), Some("apicall-test"));

    let seen = RefCell::new(Vec::new());
    let transport = |request: &HttpRequest| -> Result<HttpResponse, TransportError> {
        seen.borrow_mut().push(request.headers.clone());
        Ok(HttpResponse {
            status: 204,
            headers: Headers::new(),
            body: Vec::new(),
        })
    };
    overridden.execute(&transport).unwrap();
    Command::new(HttpMethod::Get, "http://localhost/items")
        .execute(&transport)
        .unwrap();

    let seen = seen.into_inner();
    assert_eq!(seen[0].get("user-agent"), Some("custom"));
    assert_eq!(seen[1].get("user-agent"), Some("apicall-test"));
}
