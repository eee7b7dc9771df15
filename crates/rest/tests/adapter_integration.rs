//! Adapter integration tests.
//!
//! Drives [`RestAdapter`] end to end against the in-memory fake transport:
//! - record-level create, read, get, update and destroy
//! - 404 handling for keyed reads and lookups
//! - query-scoped bulk update and destroy
//! - body size limits and transport failures

mod common;

use http::Method;
use http::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use restmap_rest::{AdapterConfig, AdapterError, Query, Record, RestAdapter, Value};
use rust_decimal::Decimal;

use common::fixtures::{self, book_model, tag_model};
use common::harness::{CannedResponse, FakeTransport, json_adapter, xml_adapter};

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_merges_returned_fields() {
    let (adapter, transport) = xml_adapter();
    transport.respond(
        Method::POST,
        "/books.xml",
        CannedResponse::xml(201, fixtures::DUNE_XML),
    );

    let record = Record::new().with("title", "Dune").with("year", 1965);
    let created = adapter.create(&book_model(), &record).await.unwrap();

    assert_eq!(created.get("id"), Some(&Value::Integer(1)));
    assert_eq!(created.get("author"), Some(&Value::from("Frank Herbert")));
    assert_eq!(created.get("title"), Some(&Value::from("Dune")));

    let sent = transport.last_request();
    assert_eq!(sent.method, Method::POST);
    assert_eq!(sent.uri, "http://localhost:4000/books.xml");
    assert_eq!(sent.header(CONTENT_TYPE), Some("application/xml"));
    assert!(sent.body_text().contains("<title>Dune</title>"));
}

#[tokio::test]
async fn test_create_takes_key_from_location() {
    let (adapter, transport) = json_adapter();
    transport.respond(
        Method::POST,
        "/books.json",
        CannedResponse::status(201).header(LOCATION, "http://localhost:4000/books/17.json"),
    );

    let record = Record::new().with("title", "Children of Dune");
    let created = adapter.create(&book_model(), &record).await.unwrap();
    assert_eq!(created.get("id"), Some(&Value::Integer(17)));
    assert_eq!(created.get("title"), Some(&Value::from("Children of Dune")));
}

#[tokio::test]
async fn test_create_reports_validation_errors() {
    let (adapter, transport) = xml_adapter();
    transport.respond(
        Method::POST,
        "/books.xml",
        CannedResponse::xml(
            422,
            "<errors><error>Title can't be blank</error><error>Year is invalid</error></errors>",
        ),
    );

    let err = adapter
        .create(&book_model(), &Record::new().with("year", 1965))
        .await
        .unwrap_err();
    match err {
        AdapterError::ResourceInvalid { errors } => {
            assert_eq!(errors, vec!["Title can't be blank", "Year is invalid"])
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_create_returns_declared_kinds() {
    let (adapter, transport) = json_adapter();
    transport.respond(
        Method::POST,
        "/books.json",
        CannedResponse::status(201).header(LOCATION, "/books/3.json"),
    );

    let record = Record::new().with("title", "Dune").with("rating", 4).with("price", 10);
    let created = adapter.create(&book_model(), &record).await.unwrap();
    assert_eq!(created.get("id"), Some(&Value::Integer(3)));
    assert_eq!(created.get("rating"), Some(&Value::Float(4.0)));
    assert_eq!(created.get("price"), Some(&Value::Decimal(Decimal::from(10))));

    let sent = transport.last_request().body_text();
    assert!(sent.contains(r#""price":"10""#));
    assert!(sent.contains(r#""rating":4.0"#));
}

#[tokio::test]
async fn test_invalid_record_never_reaches_transport() {
    let (adapter, transport) = xml_adapter();
    let err = adapter
        .create(&book_model(), &Record::new().with("isbn", "0441013597"))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::InvalidRecord { .. }));
    assert_eq!(transport.request_count(), 0);
}

// ============================================================================
// Read
// ============================================================================

#[tokio::test]
async fn test_read_collection() {
    let (adapter, transport) = xml_adapter();
    transport.respond(
        Method::GET,
        "/books.xml",
        CannedResponse::xml(200, fixtures::BOOKS_XML),
    );

    let query = Query::new().filter("year", restmap_rest::Operator::Gt, 900);
    let books = adapter.read(&book_model(), &query).await.unwrap();
    assert_eq!(books.len(), 2);
    assert_eq!(books[0].get("title"), Some(&Value::from("Dune")));

    let sent = transport.last_request();
    assert_eq!(sent.uri, "http://localhost:4000/books.xml?year%5Bgt%5D=900");
    assert_eq!(sent.header(ACCEPT), Some("application/xml"));
}

#[tokio::test]
async fn test_keyed_read_not_found_is_empty() {
    let (adapter, transport) = xml_adapter();
    transport.respond(Method::GET, "/books/99.xml", CannedResponse::status(404));

    let books = adapter
        .read(&book_model(), &Query::new().eq("id", 99))
        .await
        .unwrap();
    assert!(books.is_empty());
}

#[tokio::test]
async fn test_unkeyed_read_not_found_is_an_error() {
    let (adapter, transport) = xml_adapter();
    transport.respond(Method::GET, "/books.xml", CannedResponse::status(404));

    let err = adapter
        .read(&book_model(), &Query::new().eq("title", "Dune"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_get() {
    let (adapter, transport) = xml_adapter();
    transport.respond(
        Method::GET,
        "/books/1.xml",
        CannedResponse::xml(200, fixtures::DUNE_XML),
    );
    transport.respond(Method::GET, "/books/2.xml", CannedResponse::status(404));

    let model = book_model();
    let found = adapter.get(&model, &Value::Integer(1)).await.unwrap();
    assert_eq!(
        found.and_then(|r| r.get("title").cloned()),
        Some(Value::from("Dune"))
    );
    assert!(adapter.get(&model, &Value::Integer(2)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_server_error() {
    let (adapter, transport) = json_adapter();
    transport.respond(
        Method::GET,
        "/books/1.json",
        CannedResponse::json(503, r#"{"error": "maintenance"}"#),
    );

    match adapter.get(&book_model(), &Value::Integer(1)).await {
        Err(AdapterError::Server { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("unexpected: {:?}", other),
    }
}

// ============================================================================
// Update and destroy
// ============================================================================

#[tokio::test]
async fn test_update() {
    let (adapter, transport) = json_adapter();
    transport.respond(Method::PUT, "/books/1.json", CannedResponse::status(204));

    let record = fixtures::dune().with("title", "Dune (Deluxe)");
    let updated = adapter.update(&book_model(), &record).await.unwrap();
    assert_eq!(updated, record);

    let sent = transport.last_request();
    assert_eq!(sent.method, Method::PUT);
    assert!(sent.body_text().contains(r#""title":"Dune (Deluxe)""#));
}

#[tokio::test]
async fn test_update_returns_declared_kinds() {
    let (adapter, transport) = xml_adapter();
    transport.respond(Method::PUT, "/books/1.xml", CannedResponse::status(204));

    let record = Record::new().with("id", 1).with("rating", 3);
    let updated = adapter.update(&book_model(), &record).await.unwrap();
    assert_eq!(updated, Record::new().with("id", 1).with("rating", 3.0));
}

#[tokio::test]
async fn test_update_conflict() {
    let (adapter, transport) = json_adapter();
    transport.respond(
        Method::PUT,
        "/books/1.json",
        CannedResponse::json(409, r#"{"errors": ["record was modified"]}"#),
    );

    let err = adapter
        .update(&book_model(), &fixtures::dune())
        .await
        .unwrap_err();
    match err {
        AdapterError::Conflict { message } => assert_eq!(message, "record was modified"),
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_destroy() {
    let (adapter, transport) = xml_adapter();
    transport.respond(Method::DELETE, "/tags/sci-fi.xml", CannedResponse::status(200));

    adapter
        .destroy(&tag_model(), &Value::from("sci-fi"))
        .await
        .unwrap();
    assert_eq!(transport.last_request().method, Method::DELETE);
}

#[tokio::test]
async fn test_destroy_missing_record() {
    let (adapter, transport) = xml_adapter();
    transport.respond(Method::DELETE, "/books/5.xml", CannedResponse::status(404));

    let err = adapter
        .destroy(&book_model(), &Value::Integer(5))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::NotFound));
}

// ============================================================================
// Bulk operations
// ============================================================================

#[tokio::test]
async fn test_update_matching() {
    let (adapter, transport) = xml_adapter();
    transport
        .respond(Method::GET, "/books.xml", CannedResponse::xml(200, fixtures::BOOKS_XML))
        .respond(Method::PUT, "/books/1.xml", CannedResponse::status(200))
        .respond(Method::PUT, "/books/2.xml", CannedResponse::status(200));

    let changes = Record::new().with("available", false);
    let count = adapter
        .update_matching(&book_model(), &Query::new(), &changes)
        .await
        .unwrap();
    assert_eq!(count, 2);

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].uri, "http://localhost:4000/books/1.xml");
    assert!(
        requests[2]
            .body_text()
            .contains("<available type=\"boolean\">false</available>")
    );
}

#[tokio::test]
async fn test_update_matching_rejects_key_changes() {
    let (adapter, transport) = xml_adapter();
    let err = adapter
        .update_matching(&book_model(), &Query::new(), &Record::new().with("id", 3))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::InvalidRecord { .. }));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_destroy_matching_stops_at_first_failure() {
    let (adapter, transport) = json_adapter();
    transport
        .respond(Method::GET, "/books.json", CannedResponse::json(200, fixtures::BOOKS_JSON))
        .respond(Method::DELETE, "/books/1.json", CannedResponse::status(500));

    let err = adapter
        .destroy_matching(&book_model(), &Query::new().eq("title", "Dune"))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Server { status: 500, .. }));
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn test_destroy_matching() {
    let (adapter, transport) = json_adapter();
    transport
        .respond(Method::GET, "/books.json", CannedResponse::json(200, fixtures::BOOKS_JSON))
        .respond(Method::DELETE, "/books/1.json", CannedResponse::status(204))
        .respond(Method::DELETE, "/books/2.json", CannedResponse::status(204));

    let count = adapter
        .destroy_matching(&book_model(), &Query::new())
        .await
        .unwrap();
    assert_eq!(count, 2);
}

// ============================================================================
// Limits and failures
// ============================================================================

#[tokio::test]
async fn test_response_too_large() {
    let (adapter, transport) = xml_adapter();
    let adapter = adapter.with_max_body_size(16);
    transport.respond(
        Method::GET,
        "/books.xml",
        CannedResponse::xml(200, fixtures::BOOKS_XML),
    );

    let err = adapter
        .read(&book_model(), &Query::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::ResponseTooLarge { limit: 16, .. }));
}

#[tokio::test]
async fn test_transport_rejects_oversized_body() {
    let (adapter, transport) = xml_adapter();
    transport.fail_too_large(4096, 1024);

    let err = adapter
        .read(&book_model(), &Query::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AdapterError::ResponseTooLarge { size: 4096, limit: 1024 }
    ));
}

#[tokio::test]
async fn test_transport_failure() {
    let (adapter, transport) = xml_adapter();
    transport.fail_with("connection refused");

    let err = adapter
        .get(&book_model(), &Value::Integer(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Transport(_)));
}

#[tokio::test]
async fn test_from_config() {
    let config = AdapterConfig {
        endpoint: "rest://localhost:4000/".to_string(),
        format: Some(restmap_rest::Format::Json),
        ..AdapterConfig::for_testing()
    };
    let transport = FakeTransport::new();
    transport.respond(
        Method::GET,
        "/books.json",
        CannedResponse::json(200, fixtures::BOOKS_JSON),
    );

    let adapter = RestAdapter::from_config(&config, transport).unwrap();
    let books = adapter.read(&book_model(), &Query::new()).await.unwrap();
    assert_eq!(books.len(), 2);
    assert_eq!(
        adapter.transport().last_request().header(ACCEPT),
        Some("application/json")
    );
}
