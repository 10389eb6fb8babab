//! Full stack against mocked Google endpoints: router -> fetcher -> HTTP client.

use std::sync::Arc;
use std::time::Duration;

use ga4_pageviews::server::build_app;
use ga4_pageviews::{AnalyticsClient, AnalyticsConfig, PageviewFetcher, ServiceAccountKey};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = include_str!("fixtures/test-key.pem");

async fn google_mock() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "e2e-token",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1alpha/properties/111"))
        .and(header("authorization", "Bearer e2e-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "properties/111",
            "displayName": "Docs Site"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1beta/properties/111:runReport"))
        .and(header("authorization", "Bearer e2e-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [{ "metricValues": [{ "value": "25000" }] }],
            "rowCount": 1
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1alpha/properties/222"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": 403,
                "message": "User does not have sufficient permissions for this property.",
                "status": "PERMISSION_DENIED"
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1beta/properties/222:runReport"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": 403,
                "message": "User does not have sufficient permissions for this property.",
                "status": "PERMISSION_DENIED"
            }
        })))
        .mount(&server)
        .await;

    server
}

async fn spawn_app(google: &MockServer) -> String {
    let key = ServiceAccountKey {
        client_email: "reporter@example.iam.gserviceaccount.com".to_string(),
        private_key: TEST_KEY.to_string(),
        private_key_id: None,
        token_uri: None,
    };
    let client = AnalyticsClient::with_config(
        key,
        AnalyticsConfig {
            data_url: google.uri(),
            admin_url: google.uri(),
            token_uri: Some(format!("{}/token", google.uri())),
            timeout: Duration::from_secs(5),
        },
    )
    .unwrap();

    let app = build_app(PageviewFetcher::new(Arc::new(client)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_batch_against_mocked_google() {
    let google = google_mock().await;
    let base = spawn_app(&google).await;

    let response = reqwest::get(format!("{}/api/pageviews?ids=111, 222", base))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total"], 25000);

    let properties = body["properties"].as_array().unwrap();
    assert_eq!(properties.len(), 2);
    assert_eq!(properties[0]["propertyId"], "111");
    assert_eq!(properties[0]["propertyName"], "Docs Site");
    assert_eq!(properties[0]["pageviewsFormatted"], "25,000");
    assert_eq!(properties[1]["propertyId"], "222");
    assert_eq!(properties[1]["propertyName"], "Property 222");
    assert_eq!(properties[1]["pageviews"], Value::Null);
    assert_eq!(
        properties[1]["error"],
        "User does not have sufficient permissions for this property."
    );
}

#[tokio::test]
async fn test_single_property_forbidden() {
    let google = google_mock().await;
    let base = spawn_app(&google).await;

    let ok = reqwest::get(format!("{}/api/pageviews/111", base))
        .await
        .unwrap();
    assert_eq!(ok.status().as_u16(), 200);
    assert_eq!(ok.json::<Value>().await.unwrap(), json!({ "pageviews": 25000 }));

    let denied = reqwest::get(format!("{}/api/pageviews/222", base))
        .await
        .unwrap();
    assert_eq!(denied.status().as_u16(), 403);
    assert_eq!(
        denied.json::<Value>().await.unwrap(),
        json!({ "error": "Authentication error. Please check the service account permissions." })
    );
}
