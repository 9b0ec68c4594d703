use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flockscan::config::{ApiConfig, EnrichmentConfig};

/// Query id used by all mock servers. Tests pass this through
/// `query_id::resolve` or directly when constructing a client.
pub const TEST_QUERY_ID: &str = "testQid123";

/// Builds the GraphQL response body for an about-profile lookup.
pub fn about_body(location: &str) -> serde_json::Value {
    serde_json::json!({
        "data": {
            "user_result_by_screen_name": {
                "result": {
                    "about_profile": {
                        "account_based_in": location
                    }
                }
            }
        }
    })
}

/// Creates a mock GraphQL server that answers about-profile lookups
/// per handle. Each `(handle, location)` pair gets its own mock matched
/// on the `variables` query parameter.
pub async fn mock_about_server(handles: &[(&str, &str)]) -> MockServer {
    let server = MockServer::start().await;

    for (handle, location) in handles {
        let variables = serde_json::json!({ "screenName": handle }).to_string();
        Mock::given(method("GET"))
            .and(path(format!(
                "/i/api/graphql/{}/AboutAccountQuery",
                TEST_QUERY_ID
            )))
            .and(query_param("variables", variables.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(about_body(location)))
            .mount(&server)
            .await;
    }

    server
}

/// Creates a mock GraphQL server that answers every about-profile
/// lookup with the same location.
pub async fn mock_uniform_about_server(location: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!(
            "/i/api/graphql/{}/AboutAccountQuery",
            TEST_QUERY_ID
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(about_body(location)))
        .mount(&server)
        .await;

    server
}

/// Creates a mock server that returns the given HTTP error status for
/// every request.
pub async fn mock_error_server(status: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;

    server
}

/// API config pointing at a mock server.
pub fn test_api_config(server: &MockServer) -> ApiConfig {
    ApiConfig {
        base_url: server.uri(),
        bearer_token: "test-bearer".to_string(),
        request_timeout_secs: 5,
        query_id: String::new(),
    }
}

/// Enrichment config with a near-zero request delay so tests run fast.
pub fn test_enrichment_config(batch_size: usize) -> EnrichmentConfig {
    EnrichmentConfig {
        batch_size,
        request_delay_ms: 1,
    }
}
