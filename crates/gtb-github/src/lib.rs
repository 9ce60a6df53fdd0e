//! GitHub adapter (OAuth app + REST v3).
//!
//! Implements the `gtb-core` `HostingApi` port over `reqwest`. Payloads are
//! relayed as GitHub sends them; only the fields the bot uses are decoded.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT},
    Method, RequestBuilder, StatusCode, Url,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;

use gtb_core::{
    config::Config,
    errors::Error,
    hosting::HostingApi,
    model::{HostingProfile, NewRepository, RepoContent, Repository},
    utils::truncate_chars,
    Result,
};

const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 5;
const API_VERSION: &str = "2022-11-28";

#[derive(Clone, Debug)]
pub struct GitHubConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub api_base: String,
    pub oauth_base: String,
    pub timeout: Duration,
}

impl GitHubConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            client_id: cfg.github_client_id.clone(),
            client_secret: cfg.github_client_secret.clone(),
            redirect_uri: cfg.github_redirect_uri.clone(),
            scopes: cfg.github_scopes.clone(),
            api_base: cfg.github_api_base.clone(),
            oauth_base: cfg.github_oauth_base.clone(),
            timeout: cfg.github_timeout,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GitHubClient {
    cfg: GitHubConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl GitHubClient {
    pub fn new(cfg: GitHubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(API_VERSION),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("gtb-telegram-bot"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;

        Ok(Self { cfg, http })
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url> {
        build_url(&self.cfg.api_base, segments)
    }

    fn authed(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
        self.http.request(method, url).bearer_auth(token)
    }

    async fn send_json<T: DeserializeOwned>(&self, op: &str, req: RequestBuilder) -> Result<T> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(op, %status, "GitHub call failed");
            return Err(upstream_error(status, &body));
        }
        resp.json::<T>()
            .await
            .map_err(|e| Error::upstream(Some(status.as_u16()), format!("{op}: bad JSON: {e}")))
    }
}

#[async_trait]
impl HostingApi for GitHubClient {
    fn authorize_url(&self, state: &str) -> Result<String> {
        let base = format!(
            "{}/login/oauth/authorize",
            self.cfg.oauth_base.trim_end_matches('/')
        );
        let url = Url::parse_with_params(
            &base,
            &[
                ("client_id", self.cfg.client_id.as_str()),
                ("scope", self.cfg.scopes.join(" ").as_str()),
                ("redirect_uri", self.cfg.redirect_uri.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| Error::Config(format!("invalid GitHub OAuth base: {e}")))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<String> {
        let url = format!(
            "{}/login/oauth/access_token",
            self.cfg.oauth_base.trim_end_matches('/')
        );
        let req = self
            .http
            .post(url)
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", self.cfg.client_id.as_str()),
                ("client_secret", self.cfg.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.cfg.redirect_uri.as_str()),
            ]);
        let body: TokenResponse = self.send_json("token exchange", req).await?;
        token_from_response(body)
    }

    async fn fetch_profile(&self, token: &str) -> Result<HostingProfile> {
        let url = self.api_url(&["user"])?;
        self.send_json("get user", self.authed(Method::GET, url, token))
            .await
    }

    async fn list_repositories(&self, token: &str) -> Result<Vec<Repository>> {
        let mut out = Vec::new();
        for page in 1..=MAX_PAGES {
            let mut url = self.api_url(&["user", "repos"])?;
            url.query_pairs_mut()
                .append_pair("per_page", &PER_PAGE.to_string())
                .append_pair("sort", "updated")
                .append_pair("page", &page.to_string());

            let batch: Vec<Repository> = self
                .send_json("list repos", self.authed(Method::GET, url, token))
                .await?;
            let last = batch.len() < PER_PAGE;
            out.extend(batch);
            if last {
                break;
            }
        }
        Ok(out)
    }

    async fn create_repository(&self, token: &str, repo: &NewRepository) -> Result<Repository> {
        let url = self.api_url(&["user", "repos"])?;
        let req = self.authed(Method::POST, url, token).json(&json!({
            "name": repo.name,
            "description": repo.description,
            "private": repo.private,
            "auto_init": true,
        }));
        self.send_json("create repo", req).await
    }

    async fn delete_repository(&self, token: &str, full_name: &str) -> Result<()> {
        let (owner, name) = split_full_name(full_name)?;
        let url = self.api_url(&["repos", owner, name])?;
        let resp = self.authed(Method::DELETE, url, token).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(upstream_error(status, &body))
    }

    async fn list_contents(
        &self,
        token: &str,
        full_name: &str,
        path: &str,
    ) -> Result<Vec<RepoContent>> {
        let (owner, name) = split_full_name(full_name)?;
        let mut segments = vec!["repos", owner, name, "contents"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        let url = self.api_url(&segments)?;

        let v: serde_json::Value = self
            .send_json("list contents", self.authed(Method::GET, url, token))
            .await?;
        parse_contents(v)
    }
}

fn build_url(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url =
        Url::parse(base).map_err(|e| Error::Config(format!("invalid GitHub API base: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| Error::Config(format!("GitHub API base cannot be a base: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn split_full_name(full_name: &str) -> Result<(&str, &str)> {
    match full_name.trim().split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => Err(Error::MissingParameter("repository owner/name")),
    }
}

fn token_from_response(body: TokenResponse) -> Result<String> {
    match body.access_token.filter(|t| !t.trim().is_empty()) {
        Some(token) => Ok(token),
        None => {
            let reason = body
                .error_description
                .or(body.error)
                .unwrap_or_else(|| "no access token returned".to_string());
            Err(Error::AuthExchange(reason))
        }
    }
}

/// GitHub error bodies carry `message`; fall back to a trimmed raw body.
fn upstream_error(status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            let msg = v.get("message")?.as_str()?.to_string();
            let detail = v
                .get("errors")
                .and_then(|e| e.as_array())
                .and_then(|errs| errs.first())
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str());
            Some(match detail {
                Some(d) => format!("{msg}: {d}"),
                None => msg,
            })
        })
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                truncate_chars(trimmed, 200)
            }
        });
    Error::upstream(Some(status.as_u16()), message)
}

/// A contents call returns an array for directories and an object for files.
fn parse_contents(v: serde_json::Value) -> Result<Vec<RepoContent>> {
    let entries = match v {
        serde_json::Value::Array(_) => serde_json::from_value::<Vec<RepoContent>>(v)?,
        other => vec![serde_json::from_value::<RepoContent>(other)?],
    };
    Ok(entries)
}


#[cfg(test)]
mod wire_tests {
    use super::*;
    use serde_json::Value;
    use wiremock::{
        matchers::{body_partial_json, body_string_contains, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn client_for(server: &MockServer) -> GitHubClient {
        GitHubClient::new(GitHubConfig {
            client_id: "Iv1.abc".to_string(),
            client_secret: "s3cret".to_string(),
            redirect_uri: "https://bot.example.com/auth/github/callback".to_string(),
            scopes: vec!["repo".to_string()],
            api_base: server.uri(),
            oauth_base: server.uri(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn repo_page(start: usize, len: usize) -> Value {
        Value::Array(
            (start..start + len)
                .map(|i| {
                    json!({
                        "name": format!("r{i}"),
                        "full_name": format!("octocat/r{i}"),
                        "html_url": format!("https://github.com/octocat/r{i}"),
                        "private": false
                    })
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn listing_follows_pages_until_a_short_one() {
        let server = MockServer::start().await;
        for (page, body) in [("1", repo_page(0, PER_PAGE)), ("2", repo_page(100, 3))] {
            Mock::given(method("GET"))
                .and(path("/user/repos"))
                .and(query_param("page", page))
                .and(query_param("per_page", "100"))
                .and(query_param("sort", "updated"))
                .and(header("authorization", "Bearer gho_x"))
                .and(header("x-github-api-version", API_VERSION))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .expect(1)
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/user/repos"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let repos = client_for(&server).list_repositories("gho_x").await.unwrap();
        assert_eq!(repos.len(), 103);
        assert_eq!(repos[0].full_name, "octocat/r0");
        assert_eq!(repos[102].name, "r102");
    }

    #[tokio::test]
    async fn listing_stops_at_the_page_cap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/repos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repo_page(0, PER_PAGE)))
            .expect(MAX_PAGES as u64)
            .mount(&server)
            .await;

        let repos = client_for(&server).list_repositories("gho_x").await.unwrap();
        assert_eq!(repos.len(), PER_PAGE * MAX_PAGES);
    }

    #[tokio::test]
    async fn code_exchange_posts_form_and_asks_for_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .and(header("accept", "application/json"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("client_id=Iv1.abc"))
            .and(body_string_contains("client_secret=s3cret"))
            .and(body_string_contains("code=c0de"))
            .and(body_string_contains("redirect_uri=https%3A%2F%2Fbot.example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "gho_x",
                "token_type": "bearer",
                "scope": "repo"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .and(body_string_contains("code=stale"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "bad_verification_code",
                "error_description": "The code passed is incorrect or expired."
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.exchange_code("c0de").await.unwrap(), "gho_x");
        match client.exchange_code("stale").await {
            Err(Error::AuthExchange(msg)) => assert!(msg.contains("incorrect or expired")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn profile_is_fetched_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer gho_x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 583231,
                "login": "octocat",
                "name": "The Octocat",
                "public_repos": 8
            })))
            .mount(&server)
            .await;

        let profile = client_for(&server).fetch_profile("gho_x").await.unwrap();
        assert_eq!(profile.id, 583231);
        assert_eq!(profile.login, "octocat");
    }

    #[tokio::test]
    async fn create_sends_auto_init_and_relays_validation_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/user/repos"))
            .and(header("authorization", "Bearer gho_x"))
            .and(body_partial_json(json!({
                "name": "demo",
                "description": "my demo",
                "private": true,
                "auto_init": true
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "name": "demo",
                "full_name": "octocat/demo",
                "html_url": "https://github.com/octocat/demo",
                "private": true,
                "description": "my demo"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/user/repos"))
            .and(body_partial_json(json!({ "name": "taken" })))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "message": "Repository creation failed.",
                "errors": [{ "resource": "Repository", "field": "name", "message": "name already exists on this account" }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let created = client
            .create_repository(
                "gho_x",
                &NewRepository {
                    name: "demo".into(),
                    description: "my demo".into(),
                    private: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(created.full_name, "octocat/demo");
        assert!(created.private);

        let err = client
            .create_repository(
                "gho_x",
                &NewRepository {
                    name: "taken".into(),
                    description: String::new(),
                    private: false,
                },
            )
            .await
            .unwrap_err();
        match err {
            Error::Upstream { status, message } => {
                assert_eq!(status, Some(422));
                assert!(message.contains("name already exists"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_targets_owner_and_repo_path() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/repos/octocat/demo"))
            .and(header("authorization", "Bearer gho_x"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/repos/octocat/ghost"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "message": "Not Found",
                "documentation_url": "https://docs.github.com/rest/repos/repos#delete-a-repository"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.delete_repository("gho_x", "octocat/demo").await.unwrap();
        match client.delete_repository("gho_x", "octocat/ghost").await {
            Err(Error::Upstream { status, message }) => {
                assert_eq!(status, Some(404));
                assert_eq!(message, "Not Found");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn contents_path_is_appended_segment_by_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/demo/contents/src/bin"))
            .and(header("authorization", "Bearer gho_x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "main.rs", "path": "src/bin/main.rs", "type": "file", "size": 42 }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let entries = client_for(&server)
            .list_contents("gho_x", "octocat/demo", "/src/bin/")
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "src/bin/main.rs");
    }
}
