//! HTTP routes for the pageviews API.

use axum::{
    Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::FetchError;
use crate::fetcher::PageviewFetcher;
use crate::types::BatchResponse;

const MISSING_IDS_QUERY: &str =
    "Property IDs are required. Use the \"ids\" query parameter with comma-separated values.";
const EMPTY_IDS: &str = "At least one property ID is required";
const MISSING_IDS_BODY: &str = "Property IDs array is required in request body";

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    fetcher: PageviewFetcher,
}

/// Build the Axum application with routes and middleware
pub fn build_app(fetcher: PageviewFetcher) -> Router {
    let state = AppState { fetcher };

    Router::new()
        .route("/", get(api_info))
        .route("/healthcheck", get(health_check))
        .route("/api/pageviews", get(batch_from_query).post(batch_from_body))
        .route("/api/pageviews/:property_id", get(single_property))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn api_info() -> Json<Value> {
    Json(json!({
        "name": "GA4 Pageviews API",
        "description": "API to fetch pageviews from Google Analytics 4",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            {
                "path": "/api/pageviews/:propertyId",
                "description": "Get pageviews for a specific GA4 property",
                "method": "GET",
                "params": { "propertyId": "GA4 property ID (required)" }
            },
            {
                "path": "/api/pageviews?ids=id1,id2,id3",
                "description": "Get pageviews for multiple GA4 properties using GET",
                "method": "GET",
                "query": { "ids": "Comma-separated list of GA4 property IDs (required)" }
            },
            {
                "path": "/api/pageviews",
                "description": "Get pageviews for multiple GA4 properties using POST",
                "method": "POST",
                "body": { "propertyIds": "Array of GA4 property IDs (required)" }
            },
            {
                "path": "/healthcheck",
                "description": "Simple health check endpoint",
                "method": "GET"
            }
        ]
    }))
}

/// Legacy single-property endpoint: responds with `{ "pageviews": n }` only
async fn single_property(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let property_id = property_id.trim();
    if property_id.is_empty() {
        return Err(ApiError::BadRequest("Property ID is required".to_string()));
    }

    tracing::info!("Fetching pageviews for property: {}", property_id);
    let result = state.fetcher.fetch_one(property_id).await;

    if let Some(failure) = result.failure {
        return Err(failure.into());
    }

    Ok(Json(json!({ "pageviews": result.pageviews.unwrap_or(0) })))
}

#[derive(Deserialize)]
struct BatchQuery {
    ids: Option<String>,
}

async fn batch_from_query(
    State(state): State<AppState>,
    Query(query): Query<BatchQuery>,
) -> Result<Json<BatchResponse>, ApiError> {
    let raw = query
        .ids
        .filter(|ids| !ids.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(MISSING_IDS_QUERY.to_string()))?;

    let property_ids = split_ids(&raw);
    if property_ids.is_empty() {
        return Err(ApiError::BadRequest(EMPTY_IDS.to_string()));
    }

    tracing::info!(
        "Fetching pageviews for properties: {}",
        property_ids.join(", ")
    );
    fetch_batch(&state, &property_ids).await
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest {
    #[serde(default)]
    property_ids: Option<Vec<PropertyIdValue>>,
}

/// Ids may arrive as JSON strings or bare numbers
#[derive(Deserialize)]
#[serde(untagged)]
enum PropertyIdValue {
    Text(String),
    Number(serde_json::Number),
}

impl PropertyIdValue {
    fn into_id(self) -> String {
        match self {
            PropertyIdValue::Text(s) => s.trim().to_string(),
            PropertyIdValue::Number(n) => n.to_string(),
        }
    }
}

async fn batch_from_body(
    State(state): State<AppState>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let property_ids: Vec<String> = match body {
        Ok(Json(BatchRequest {
            property_ids: Some(ids),
        })) => ids
            .into_iter()
            .map(PropertyIdValue::into_id)
            .filter(|id| !id.is_empty())
            .collect(),
        Ok(_) => Vec::new(),
        Err(rejection) => {
            tracing::debug!("Rejected batch body: {}", rejection);
            Vec::new()
        }
    };

    if property_ids.is_empty() {
        return Err(ApiError::BadRequest(MISSING_IDS_BODY.to_string()));
    }

    tracing::info!(
        "Fetching pageviews for properties (POST): {}",
        property_ids.join(", ")
    );
    fetch_batch(&state, &property_ids).await
}

async fn fetch_batch(
    state: &AppState,
    property_ids: &[String],
) -> Result<Json<BatchResponse>, ApiError> {
    let results = state.fetcher.fetch_many(property_ids).await;
    Ok(Json(BatchResponse::new(results)))
}

/// Split a comma-separated id list, trimming whitespace and dropping empty entries
pub fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// API error types
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    InvalidPropertyId,
    Forbidden,
    Internal,
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Validation(_) => ApiError::InvalidPropertyId,
            FetchError::Authorization(_) => ApiError::Forbidden,
            FetchError::Upstream(_) => ApiError::Internal,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InvalidPropertyId => (
                StatusCode::BAD_REQUEST,
                "Invalid property ID format".to_string(),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Authentication error. Please check the service account permissions.".to_string(),
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fetcher::tests::FakeAnalytics;

    async fn spawn_app(fake: FakeAnalytics) -> String {
        spawn_fetcher(PageviewFetcher::new(Arc::new(fake))).await
    }

    async fn spawn_fetcher(fetcher: PageviewFetcher) -> String {
        let app = build_app(fetcher);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn get_json(url: &str) -> (StatusCode, Value) {
        let response = reqwest::get(url).await.unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }

    async fn post_json(url: &str, body: &str) -> (StatusCode, Value) {
        let response = reqwest::Client::new()
            .post(url)
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }

    #[test]
    fn test_split_ids() {
        assert_eq!(split_ids("1, 2 ,3"), vec!["1", "2", "3"]);
        assert_eq!(split_ids(" 42 "), vec!["42"]);
        assert!(split_ids(" , ,").is_empty());
    }

    #[tokio::test]
    async fn test_health_and_info() {
        let base = spawn_app(FakeAnalytics::new()).await;

        let (status, body) = get_json(&format!("{}/healthcheck", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));

        let (status, body) = get_json(&format!("{}/", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "GA4 Pageviews API");
        assert_eq!(body["endpoints"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_single_property_zero_rows() {
        let base = spawn_app(FakeAnalytics::new().with_empty_report("999")).await;

        let (status, body) = get_json(&format!("{}/api/pageviews/999", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "pageviews": 0 }));
    }

    #[tokio::test]
    async fn test_single_property_error_mapping() {
        let base = spawn_app(
            FakeAnalytics::new()
                .with_report_error("bad", FetchError::Validation("invalid".into()))
                .with_report_error("denied", FetchError::Authorization("denied".into()))
                .with_report_error("down", FetchError::Upstream("unavailable".into())),
        )
        .await;

        let (status, body) = get_json(&format!("{}/api/pageviews/bad", base)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid property ID format" }));

        let (status, body) = get_json(&format!("{}/api/pageviews/denied", base)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body,
            json!({ "error": "Authentication error. Please check the service account permissions." })
        );

        let (status, body) = get_json(&format!("{}/api/pageviews/down", base)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }

    #[tokio::test]
    async fn test_batch_get_partial_failure() {
        let base = spawn_app(
            FakeAnalytics::new()
                .with_name("1", "Blog")
                .with_pageviews("1", "500")
                .with_report_error("2", FetchError::Upstream("backend unavailable".into())),
        )
        .await;

        let (status, body) = get_json(&format!("{}/api/pageviews?ids=1,2", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "properties": [
                    {
                        "propertyId": "1",
                        "propertyName": "Blog",
                        "pageviews": 500,
                        "pageviewsFormatted": "500"
                    },
                    {
                        "propertyId": "2",
                        "propertyName": "Property 2",
                        "pageviews": null,
                        "pageviewsFormatted": null,
                        "error": "backend unavailable"
                    }
                ],
                "total": 500
            })
        );
    }

    #[tokio::test]
    async fn test_batch_get_validation() {
        let base = spawn_app(FakeAnalytics::new()).await;

        let (status, body) = get_json(&format!("{}/api/pageviews", base)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], MISSING_IDS_QUERY);

        let (status, body) = get_json(&format!("{}/api/pageviews?ids=", base)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], MISSING_IDS_QUERY);

        let (status, body) = get_json(&format!("{}/api/pageviews?ids=,%20,", base)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], EMPTY_IDS);
    }

    #[tokio::test]
    async fn test_batch_post() {
        let base = spawn_app(
            FakeAnalytics::new()
                .with_pageviews("10", "1200")
                .with_pageviews("20", "34"),
        )
        .await;
        let url = format!("{}/api/pageviews", base);

        let (status, body) = post_json(&url, r#"{"propertyIds": ["10", 20]}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1234);
        assert_eq!(body["properties"][0]["propertyId"], "10");
        assert_eq!(body["properties"][0]["pageviewsFormatted"], "1,200");
        assert_eq!(body["properties"][1]["propertyId"], "20");
    }

    #[tokio::test]
    async fn test_batch_with_concurrency_cap() {
        let fake = FakeAnalytics::new()
            .with_pageviews("1", "100")
            .with_pageviews("2", "200")
            .with_pageviews("3", "300")
            .with_delay("1", std::time::Duration::from_millis(30));
        let fetcher = PageviewFetcher::new(Arc::new(fake)).with_max_concurrency(Some(2));
        let base = spawn_fetcher(fetcher).await;

        let (status, body) = get_json(&format!("{}/api/pageviews?ids=1,2,3", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 600);
        let order: Vec<&str> = body["properties"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["propertyId"].as_str().unwrap())
            .collect();
        assert_eq!(order, vec!["1", "2", "3"]);

        let (status, body) =
            post_json(&format!("{}/api/pageviews", base), r#"{"propertyIds": ["3", "1"]}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 400);
        assert_eq!(body["properties"][0]["propertyId"], "3");
    }

    #[tokio::test]
    async fn test_batch_post_validation() {
        let base = spawn_app(FakeAnalytics::new()).await;
        let url = format!("{}/api/pageviews", base);

        for body in ["{}", r#"{"propertyIds": []}"#, r#"{"propertyIds": "123"}"#, "not json"] {
            let (status, response) = post_json(&url, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
            assert_eq!(response, json!({ "error": MISSING_IDS_BODY }));
        }
    }
}
