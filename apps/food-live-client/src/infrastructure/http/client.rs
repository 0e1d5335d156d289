//! REST API client.
//!
//! Every endpoint answers with a `{success, data}` envelope. Requests go
//! through [`ApiClient::send_authenticated`]: a 401 triggers one session
//! refresh (shared by all concurrent callers) and a single retry.

use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::error::ApiError;
use super::single_flight::SingleFlight;
use crate::domain::feed::{FoodDetail, FoodId, FoodPage, User};
use crate::infrastructure::config::ApiSettings;

/// Catalog page size used when the caller has no preference.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

/// Client for the food feed REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    jar: Arc<Jar>,
    refresh: Arc<SingleFlight<bool>>,
}

impl ApiClient {
    /// Build a client with a fresh cookie jar.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot carry paths or the HTTP
    /// client cannot be built.
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        Self::with_jar(settings, Arc::new(Jar::default()))
    }

    /// Build a client on an existing cookie jar.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_jar(settings: &ApiSettings, jar: Arc<Jar>) -> Result<Self, ApiError> {
        if settings.base_url.cannot_be_a_base() {
            return Err(ApiError::Network(format!(
                "base URL cannot carry paths: {}",
                settings.base_url
            )));
        }

        let http = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
            jar,
            refresh: Arc::new(SingleFlight::new()),
        })
    }

    /// Cookie jar shared with other transports.
    #[must_use]
    pub fn jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    // -------------------------------------------------------------------------
    // Endpoints
    // -------------------------------------------------------------------------

    /// Fetch one catalog page.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-success status or a
    /// rejected envelope.
    pub async fn list_foods(
        &self,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<FoodPage, ApiError> {
        let mut url = self.endpoint(&["foods"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            if let Some(cursor) = cursor {
                query.append_pair("cursor", cursor);
            }
        }
        tracing::debug!(%url, "Fetching food list");
        let response = self.send_authenticated(|http| http.get(url.clone())).await?;
        decode(response).await
    }

    /// Fetch the detail snapshot of one food.
    ///
    /// # Errors
    ///
    /// See [`list_foods`](Self::list_foods).
    pub async fn food_detail(&self, id: &FoodId) -> Result<FoodDetail, ApiError> {
        let url = self.endpoint(&["foods", id.as_str(), "details"]);
        tracing::debug!(food_id = %id, "Fetching food detail");
        let response = self.send_authenticated(|http| http.get(url.clone())).await?;
        decode(response).await
    }

    /// Fetch the signed-in user.
    ///
    /// # Errors
    ///
    /// [`ApiError::Unauthorized`] when there is no valid session, otherwise
    /// see [`list_foods`](Self::list_foods).
    pub async fn me(&self) -> Result<User, ApiError> {
        let url = self.endpoint(&["users", "me"]);
        let response = self.send_authenticated(|http| http.get(url.clone())).await?;
        decode(response).await
    }

    /// End the session.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or a non-success status.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let url = self.endpoint(&["auth", "logout"]);
        let response = self.send_authenticated(|http| http.post(url.clone())).await?;
        check_status(response).await.map(drop)
    }

    // -------------------------------------------------------------------------
    // Session refresh
    // -------------------------------------------------------------------------

    /// Send a request, refreshing the session once on 401.
    ///
    /// `build` is called again for the retry. Concurrent callers hitting 401
    /// together wait on the same refresh.
    ///
    /// # Errors
    ///
    /// [`ApiError::Unauthorized`] if the refresh fails or the retry is still
    /// rejected, [`ApiError::Network`] if a request cannot be sent.
    pub async fn send_authenticated<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = build(&self.http).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!(url = %response.url(), "Session expired, refreshing");
        if !self.refresh_session().await {
            return Err(ApiError::Unauthorized);
        }

        let retried = build(&self.http).send().await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        Ok(retried)
    }

    /// Refresh the session cookie. Returns whether the server accepted it.
    pub async fn refresh_session(&self) -> bool {
        let http = self.http.clone();
        let url = self.endpoint(&["auth", "refresh"]);

        self.refresh
            .run(move || async move {
                match http.post(url).send().await {
                    Ok(response) if response.status().is_success() => {
                        tracing::info!("Session refreshed");
                        true
                    }
                    Ok(response) => {
                        tracing::warn!(status = %response.status(), "Session refresh rejected");
                        false
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Session refresh failed");
                        false
                    }
                }
            })
            .await
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked at construction
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

// =============================================================================
// Response Handling
// =============================================================================

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = check_status(response).await?.text().await?;
    let envelope: Envelope<T> = serde_json::from_str(&body)?;

    if !envelope.success {
        return Err(ApiError::Rejected(
            envelope
                .message
                .unwrap_or_else(|| "request was not successful".to_string()),
        ));
    }
    envelope
        .data
        .ok_or_else(|| ApiError::Decode("envelope has no data".to_string()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> ApiClient {
        let settings = ApiSettings {
            base_url: Url::parse(&format!("{}/api/v1", server.uri())).unwrap(),
            timeout: Duration::from_secs(5),
        };
        ApiClient::new(&settings).unwrap()
    }

    fn user_body() -> serde_json::Value {
        json!({ "success": true, "data": { "id": "u1", "username": "alice" } })
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let settings = ApiSettings {
            base_url: Url::parse("https://feed.example/api/v1").unwrap(),
            timeout: Duration::from_secs(1),
        };
        let client = ApiClient::new(&settings).unwrap();

        let url = client.endpoint(&["foods", "f 1", "details"]);
        assert_eq!(url.as_str(), "https://feed.example/api/v1/foods/f%201/details");
    }

    #[tokio::test]
    async fn list_foods_sends_limit_and_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/foods"))
            .and(query_param("limit", "20"))
            .and(query_param("cursor", "c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "items": [
                        { "id": "f1", "name": "Ramen", "mood": "cozy", "isAvailable": true }
                    ],
                    "nextCursor": "c2",
                    "prevCursor": null
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client_for(&server)
            .list_foods(Some("c1"), DEFAULT_PAGE_SIZE)
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Ramen");
        assert_eq!(page.next_cursor.as_deref(), Some("c2"));
        assert_eq!(page.prev_cursor, None);
    }

    #[tokio::test]
    async fn food_detail_parses_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/foods/f1/details"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "id": "f1",
                    "name": "Ramen",
                    "mood": "cozy",
                    "isAvailable": true,
                    "averageRating": 4.5,
                    "comments": [{
                        "id": "c1",
                        "content": "great",
                        "createdAt": "2024-05-01T12:00:00Z",
                        "user": { "id": "u2", "username": "bob" }
                    }],
                    "ratings": [{ "rating": 5, "user": { "id": "u2", "username": "bob" } }]
                }
            })))
            .mount(&server)
            .await;

        let detail = client_for(&server)
            .food_detail(&FoodId::from("f1"))
            .await
            .unwrap();

        assert_eq!(detail.id().as_str(), "f1");
        assert_eq!(detail.average_rating, Some(4.5));
        assert_eq!(detail.comments[0].user.username, "bob");
        assert_eq!(detail.ratings[0].rating, 5);
    }

    #[tokio::test]
    async fn unsuccessful_envelope_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/me"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": false, "message": "banned" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).me().await.unwrap_err();
        assert_eq!(err, ApiError::Rejected("banned".to_string()));
    }

    #[tokio::test]
    async fn server_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/foods/missing/details"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such food"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .food_detail(&FoodId::from("missing"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                status: 404,
                body: "no such food".to_string()
            }
        );
    }

    #[tokio::test]
    async fn unauthorized_request_is_retried_after_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/me"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("set-cookie", "session=fresh; Path=/"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/me"))
            .and(header("cookie", "session=fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_body()))
            .expect(1)
            .mount(&server)
            .await;

        let user = client_for(&server).me().await.unwrap();
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn concurrent_unauthorized_requests_share_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/me"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_body()))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let (a, b) = tokio::join!(client.me(), client.me());

        assert_eq!(a.unwrap().id, "u1");
        assert_eq!(b.unwrap().id, "u1");
    }

    #[tokio::test]
    async fn failed_refresh_surfaces_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/me"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/refresh"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).me().await.unwrap_err();
        assert_eq!(err, ApiError::Unauthorized);
    }

    #[tokio::test]
    async fn logout_posts_without_decoding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/logout"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).logout().await.unwrap();
    }
}
