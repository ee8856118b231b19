use std::{str::FromStr, time::Duration};

use crate::{ApiResponseOrError, Credentials, OpenAiError};
use anyhow::Result;
use reqwest::{
    header::{HeaderName, HeaderValue, AUTHORIZATION},
    multipart::Form,
    Client, Method, RequestBuilder, Response,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Default delay between two status checks while polling, the same default the
/// official client libraries use.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Clone)]
pub struct OpenAiClient {
    credentials: Credentials,
    client: Client,
    poll_interval: Duration,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OpenAiClient({})", self.credentials.base_url())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiErrorWrapper {
    error: OpenAiError,
}

impl OpenAiClient {
    pub fn new(credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .default_headers(
                [
                    (
                        AUTHORIZATION,
                        HeaderValue::from_str(&format!("Bearer {}", credentials.api_key()))?,
                    ),
                    (
                        HeaderName::from_str("OpenAI-Beta")?,
                        HeaderValue::from_str("assistants=v2")?,
                    ),
                ]
                .into_iter()
                .collect(),
            )
            .build()?;

        Ok(Self {
            credentials,
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Waits one poll interval. Used between status checks of long-running objects.
    pub(crate) async fn poll_delay(&self) {
        if !self.poll_interval.is_zero() {
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn send<F>(&self, method: Method, route: String, build: F) -> ApiResponseOrError<Response>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let url = format!("{}{}", self.credentials.base_url(), route);
        log::debug!("OpenAI Request[{}] {}", method, url);

        let request = build(self.client.request(method.clone(), url.clone()));
        let response = request.send().await?;

        log::debug!(
            "OpenAI Response[{}] {} {url}",
            method,
            response.status().as_str()
        );
        Ok(response)
    }

    async fn parse<T>(response: Response) -> ApiResponseOrError<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(serde_json::from_str::<T>(&body)?);
        }

        match serde_json::from_str::<OpenAiErrorWrapper>(&body) {
            Ok(wrapper) => Err(wrapper.error),
            Err(_) => Err(OpenAiError::new(
                format!("{status}: {body}"),
                "unknown".to_string(),
            )),
        }
    }

    pub async fn request<S, R, T>(
        &self,
        method: Method,
        route: R,
        body: Option<S>,
    ) -> ApiResponseOrError<T>
    where
        R: Into<String>,
        S: Serialize,
        T: DeserializeOwned,
    {
        let response = self
            .send(method, route.into(), |request| match body {
                Some(body) => request.json(&body),
                None => request,
            })
            .await?;

        Self::parse(response).await
    }

    pub async fn get<R, T>(&self, route: R) -> ApiResponseOrError<T>
    where
        R: Into<String>,
        T: DeserializeOwned,
    {
        self.request::<(), R, T>(Method::GET, route, None).await
    }

    pub async fn get_with_query<R, T>(&self, route: R, query: &[(&str, &str)]) -> ApiResponseOrError<T>
    where
        R: Into<String>,
        T: DeserializeOwned,
    {
        let response = self
            .send(Method::GET, route.into(), |request| request.query(query))
            .await?;

        Self::parse(response).await
    }

    pub async fn post<S, R, T>(&self, route: R, body: S) -> ApiResponseOrError<T>
    where
        R: Into<String>,
        S: Serialize,
        T: DeserializeOwned,
    {
        self.request(Method::POST, route, Some(body)).await
    }

    pub async fn post_multipart<R, T>(&self, route: R, form: Form) -> ApiResponseOrError<T>
    where
        R: Into<String>,
        T: DeserializeOwned,
    {
        let response = self
            .send(Method::POST, route.into(), |request| request.multipart(form))
            .await?;

        Self::parse(response).await
    }

    /// Fetches every page of a list endpoint, following `last_id` while the
    /// service reports `has_more`. `query` is sent with each page request.
    pub async fn list<R, T>(&self, route: R, query: &[(&str, &str)]) -> ApiResponseOrError<Vec<T>>
    where
        R: Into<String>,
        T: DeserializeOwned,
    {
        let route = route.into();
        let mut data = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut params: Vec<(&str, &str)> = query.to_vec();
            if let Some(after) = after.as_deref() {
                params.push(("after", after));
            }

            let page: List<T> = self.get_with_query(route.as_str(), &params).await?;
            data.extend(page.data);

            match page.last_id {
                Some(last_id) if page.has_more => after = Some(last_id),
                _ => break,
            }
        }

        Ok(data)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct List<T> {
    pub first_id: Option<String>,
    pub last_id: Option<String>,
    pub data: Vec<T>,
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::{json, Value};

    use super::*;

    fn client_for(server: &mockito::ServerGuard) -> OpenAiClient {
        let credentials = Credentials::new("sk-test", format!("{}/v1/", server.url()));
        OpenAiClient::new(credentials)
            .unwrap()
            .with_poll_interval(Duration::ZERO)
    }

    #[tokio::test]
    async fn sends_auth_and_beta_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/ping")
            .match_header("authorization", "Bearer sk-test")
            .match_header("openai-beta", "assistants=v2")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = client_for(&server);
        let _: Value = client.get("ping").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn api_error_body_is_decoded() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/assistants")
            .with_status(401)
            .with_body(
                json!({
                    "error": {
                        "message": "Incorrect API key provided",
                        "type": "invalid_request_error",
                        "param": null,
                        "code": "invalid_api_key"
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let error = client
            .post::<_, _, Value>("assistants", json!({}))
            .await
            .unwrap_err();

        assert_eq!(error.error_type, "invalid_request_error");
        assert_eq!(error.code.as_deref(), Some("invalid_api_key"));
        assert_eq!(error.to_string(), "Incorrect API key provided");
    }

    #[tokio::test]
    async fn non_json_error_body_is_unknown() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/ping")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let client = client_for(&server);
        let error = client.get::<_, Value>("ping").await.unwrap_err();

        assert_eq!(error.error_type, "unknown");
        assert!(error.message.contains("bad gateway"));
    }

    #[tokio::test]
    async fn list_follows_pages() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/v1/items")
            .match_query(Matcher::Exact("order=desc".into()))
            .with_status(200)
            .with_body(
                json!({
                    "object": "list",
                    "data": [{"id": "a"}, {"id": "b"}],
                    "first_id": "a",
                    "last_id": "b",
                    "has_more": true
                })
                .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/v1/items")
            .match_query(Matcher::Exact("order=desc&after=b".into()))
            .with_status(200)
            .with_body(
                json!({
                    "object": "list",
                    "data": [{"id": "c"}],
                    "first_id": "c",
                    "last_id": "c",
                    "has_more": false
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let items: Vec<Value> = client.list("items", &[("order", "desc")]).await.unwrap();

        let ids: Vec<&str> = items.iter().filter_map(|item| item["id"].as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        first.assert_async().await;
        second.assert_async().await;
    }
}
