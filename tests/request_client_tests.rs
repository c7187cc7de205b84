//! Integration Tests for the Request Client
//!
//! UNIT UNDER TEST: RequestClient against a real HTTP server (wiremock)
//!
//! BUSINESS RESPONSIBILITY:
//!   - Perform HTTP requests and deserialize success bodies
//!   - Classify non-2xx statuses into taxonomy errors
//!   - Surface the fixed user-facing message for each status
//!   - Capture every failure through the global logger
//!   - Notify the UI exactly once per failure, and never throw
//!
//! TEST COVERAGE:
//!   - Success deserialization and empty-body handling
//!   - Status classification: 400, 401, 403, 404, 409, 500, 503
//!   - Transport failure handling with the connectivity message
//!   - Notifier invocation and logger capture side effects

use guardrail::{
    logger, AppError, ErrorCategory, ErrorSeverity, Method, Notifier, RequestClient,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Mutex;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

#[derive(Debug, Deserialize, PartialEq)]
struct Product {
    id: u32,
    name: String,
}

/// Notifier recording every message it is asked to show.
#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().expect("lock").push(message.to_string());
    }
}

async fn server_returning(status: u16, test_path: &str) -> (MockServer, RequestClient) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(test_path))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    let client = RequestClient::new(server.uri());
    (server, client)
}

/// Whether the global logger holds a capture for `request_path` with the
/// given category. Matching on the unique path keeps tests independent of
/// captures made by other tests in this binary.
fn captured_with_category(request_path: &str, category: ErrorCategory) -> bool {
    logger::global().errors().iter().any(|entry| {
        entry.category == category
            && entry.metadata.context.get("path").and_then(|v| v.as_str())
                == Some(request_path)
    })
}

// ============================================================================
// Success path
// ============================================================================

#[tokio::test]
async fn test_successful_get_deserializes_body() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products/7"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 7, "name": "Widget"})),
        )
        .mount(&server)
        .await;
    let client = RequestClient::new(server.uri());

    // Act
    let outcome = client.get::<Product>("/products/7", None).await;

    // Assert
    assert!(outcome.success, "2xx responses must succeed");
    assert_eq!(
        outcome.data,
        Some(Product {
            id: 7,
            name: "Widget".to_string()
        })
    );
    assert!(outcome.error.is_none());
    assert!(outcome.message.is_none());
}

#[tokio::test]
async fn test_empty_success_body_yields_no_data() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/products/7"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    let client = RequestClient::new(server.uri());

    // Act
    let outcome = client.delete::<serde_json::Value>("/products/7", None).await;

    // Assert
    assert!(outcome.success, "204 is a success without a body");
    assert!(outcome.data.is_none());
}

#[tokio::test]
async fn test_post_sends_json_body() {
    // Arrange
    let server = MockServer::start().await;
    let body = json!({"name": "Widget"});
    Mock::given(method("POST"))
        .and(path("/products"))
        .and(body_json(&body))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Widget"})),
        )
        .mount(&server)
        .await;
    let client = RequestClient::new(server.uri());

    // Act
    let outcome = client.post::<Product>("/products", &body, None).await;

    // Assert
    assert!(outcome.success, "Matched body means the JSON was sent");
    assert_eq!(outcome.data.map(|p| p.id), Some(1));
}

// ============================================================================
// Status classification
// ============================================================================

#[tokio::test]
async fn test_404_yields_not_found_with_fixed_message() {
    // Test verifies the full 404 contract: outcome shape, fixed message,
    // taxonomy error, and logger capture

    // Arrange
    let (_server, client) = server_returning(404, "/products/missing-one").await;
    let notifier = RecordingNotifier::default();

    // Act
    let outcome = client
        .get::<serde_json::Value>("/products/missing-one", Some(&notifier))
        .await;

    // Assert
    assert!(!outcome.success);
    assert_eq!(outcome.message.as_deref(), Some("Resource not found."));
    assert!(
        matches!(outcome.error, Some(AppError::NotFound { .. })),
        "404 must synthesize a not-found taxonomy error"
    );
    assert_eq!(
        notifier.messages(),
        vec!["Resource not found.".to_string()],
        "Notifier fires exactly once with the fixed message"
    );
    assert!(
        captured_with_category("/products/missing-one", ErrorCategory::NotFound),
        "The failure must be captured with category not_found"
    );
}

#[tokio::test]
async fn test_400_yields_validation_with_backend_message() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts/bad-query"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"message": "title must not be empty"})),
        )
        .mount(&server)
        .await;
    let client = RequestClient::new(server.uri());

    // Act
    let outcome = client.get::<serde_json::Value>("/posts/bad-query", None).await;

    // Assert
    assert_eq!(
        outcome.message.as_deref(),
        Some("Invalid request. Please check your input.")
    );
    match outcome.error {
        Some(AppError::Validation { message, .. }) => {
            assert_eq!(
                message, "title must not be empty",
                "Backend detail is preserved internally"
            );
        }
        other => panic!("Expected a validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_401_and_403_yield_auth_errors() {
    // Arrange
    let (_s1, unauthorized) = server_returning(401, "/admin/settings-auth").await;
    let (_s2, forbidden) = server_returning(403, "/admin/settings-perm").await;

    // Act
    let no_session = unauthorized
        .get::<serde_json::Value>("/admin/settings-auth", None)
        .await;
    let no_permission = forbidden
        .get::<serde_json::Value>("/admin/settings-perm", None)
        .await;

    // Assert
    assert_eq!(
        no_session.message.as_deref(),
        Some("You must be logged in to perform this action.")
    );
    assert!(matches!(
        no_session.error,
        Some(AppError::Authentication { .. })
    ));
    assert_eq!(
        no_permission.message.as_deref(),
        Some("You don't have permission to perform this action.")
    );
    assert!(matches!(
        no_permission.error,
        Some(AppError::Authorization { .. })
    ));
}

#[tokio::test]
async fn test_409_yields_conflict_message_with_network_kind() {
    // Arrange
    let (_server, client) = server_returning(409, "/products/conflicted").await;

    // Act
    let outcome = client
        .get::<serde_json::Value>("/products/conflicted", None)
        .await;

    // Assert
    assert_eq!(
        outcome.message.as_deref(),
        Some("A conflict occurred. The resource may have changed.")
    );
    match outcome.error {
        Some(AppError::Network { status_code, .. }) => {
            assert_eq!(status_code, Some(409));
        }
        other => panic!("Expected a network error carrying the status, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_errors_escalate_severity_for_503() {
    // Arrange
    let (_s1, broken) = server_returning(500, "/blog/render-broken").await;
    let (_s2, down) = server_returning(503, "/blog/render-down").await;

    // Act
    let internal = broken.get::<serde_json::Value>("/blog/render-broken", None).await;
    let unavailable = down.get::<serde_json::Value>("/blog/render-down", None).await;

    // Assert
    assert_eq!(
        internal.message.as_deref(),
        Some("Server error. Please try again later.")
    );
    assert_eq!(
        unavailable.message.as_deref(),
        Some("Service temporarily unavailable. Please try again later.")
    );
    let unavailable_error = unavailable.error.expect("error present");
    assert_eq!(
        unavailable_error.severity(),
        ErrorSeverity::Critical,
        "503 means the service is down"
    );
    assert!(
        unavailable_error.is_retryable(),
        "Server errors stay retryable for the retry engine"
    );
}

// ============================================================================
// Transport failures
// ============================================================================

#[tokio::test]
async fn test_connection_failure_yields_connectivity_message() {
    // Arrange - a server that is no longer there
    let server = MockServer::start().await;
    let dead_uri = server.uri();
    drop(server);
    let client = RequestClient::new(dead_uri);
    let notifier = RecordingNotifier::default();

    // Act
    let outcome = client
        .get::<serde_json::Value>("/products/transport-dead", Some(&notifier))
        .await;

    // Assert
    assert!(!outcome.success);
    assert_eq!(
        outcome.message.as_deref(),
        Some("Network error. Please check your connection.")
    );
    match outcome.error {
        Some(AppError::Network { status_code, .. }) => {
            assert_eq!(status_code, None, "No response means no status");
        }
        other => panic!("Expected a network error, got {other:?}"),
    }
    assert_eq!(notifier.messages().len(), 1);
    assert!(
        captured_with_category("/products/transport-dead", ErrorCategory::Network),
        "Transport failures must be captured too"
    );
}

#[tokio::test]
async fn test_malformed_success_body_fails_safely() {
    // Test verifies a 200 with garbage JSON still resolves to an outcome

    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products/garbled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;
    let client = RequestClient::new(server.uri());

    // Act
    let outcome = client.get::<Product>("/products/garbled", None).await;

    // Assert
    assert!(!outcome.success);
    assert!(outcome.message.is_some(), "A user-facing message is still derived");
    assert!(outcome.error.is_some());
}

// ============================================================================
// Method wrappers
// ============================================================================

#[tokio::test]
async fn test_method_wrappers_use_their_verbs() {
    // Arrange
    let server = MockServer::start().await;
    for verb in ["PUT", "PATCH"] {
        Mock::given(method(verb))
            .and(path("/products/9"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 9, "name": "x"})),
            )
            .mount(&server)
            .await;
    }
    let client = RequestClient::new(server.uri());
    let body = json!({"name": "x"});

    // Act & Assert
    assert!(client.put::<Product>("/products/9", &body, None).await.success);
    assert!(client.patch::<Product>("/products/9", &body, None).await.success);
    assert!(
        client
            .request::<Product>(Method::Get, "/products/9", None, None)
            .await
            .error
            .is_some(),
        "No GET mock mounted, so the generic entry point classifies the 404"
    );
}
