//! Hosting provider port (GitHub today).

use async_trait::async_trait;

use crate::{
    model::{HostingProfile, NewRepository, RepoContent, Repository},
    Result,
};

/// Everything the bot needs from the source-hosting provider.
///
/// Implementations map transport failures and non-2xx replies to
/// `Error::Upstream`, and a token exchange that yields no token to
/// `Error::AuthExchange`.
#[async_trait]
pub trait HostingApi: Send + Sync {
    /// Authorization redirect URL carrying `state` verbatim.
    fn authorize_url(&self, state: &str) -> Result<String>;

    /// Exchange an authorization code for a bearer token.
    async fn exchange_code(&self, code: &str) -> Result<String>;

    async fn fetch_profile(&self, token: &str) -> Result<HostingProfile>;

    /// Repositories of the token owner, most recently updated first.
    async fn list_repositories(&self, token: &str) -> Result<Vec<Repository>>;

    async fn create_repository(&self, token: &str, repo: &NewRepository) -> Result<Repository>;

    async fn delete_repository(&self, token: &str, full_name: &str) -> Result<()>;

    async fn list_contents(
        &self,
        token: &str,
        full_name: &str,
        path: &str,
    ) -> Result<Vec<RepoContent>>;
}

/// In-memory double for tests, here and in the adapter crates (`test-util` feature).
#[cfg(any(test, feature = "test-util"))]
pub mod fake {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use super::*;
    use crate::{errors::Error, model::ContentKind};

    /// In-memory GitHub double that counts calls per endpoint.
    pub struct FakeHosting {
        pub token: String,
        pub repos: Mutex<Vec<Repository>>,
        pub exchanges: AtomicUsize,
        pub lists: AtomicUsize,
        pub creates: AtomicUsize,
        pub deletes: AtomicUsize,
    }

    impl FakeHosting {
        pub fn new(token: &str) -> Self {
            Self {
                token: token.to_string(),
                repos: Mutex::new(vec![repo("alpha"), repo("beta")]),
                exchanges: AtomicUsize::new(0),
                lists: AtomicUsize::new(0),
                creates: AtomicUsize::new(0),
                deletes: AtomicUsize::new(0),
            }
        }

        pub fn list_calls(&self) -> usize {
            self.lists.load(Ordering::SeqCst)
        }

        pub fn exchange_calls(&self) -> usize {
            self.exchanges.load(Ordering::SeqCst)
        }
    }

    pub fn repo(name: &str) -> Repository {
        Repository {
            name: name.to_string(),
            full_name: format!("octocat/{name}"),
            html_url: format!("https://github.com/octocat/{name}"),
            private: false,
            description: None,
            updated_at: None,
        }
    }

    #[async_trait]
    impl HostingApi for FakeHosting {
        fn authorize_url(&self, state: &str) -> Result<String> {
            Ok(format!(
                "https://github.test/login/oauth/authorize?client_id=cid&state={state}"
            ))
        }

        async fn exchange_code(&self, code: &str) -> Result<String> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            if code == "bad" {
                return Err(Error::AuthExchange(
                    "The code passed is incorrect or expired.".to_string(),
                ));
            }
            Ok(self.token.clone())
        }

        async fn fetch_profile(&self, token: &str) -> Result<HostingProfile> {
            if token != self.token {
                return Err(Error::upstream(Some(401), "Bad credentials"));
            }
            Ok(HostingProfile {
                id: 583231,
                login: "octocat".to_string(),
                name: Some("The Octocat".to_string()),
            })
        }

        async fn list_repositories(&self, _token: &str) -> Result<Vec<Repository>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            Ok(self.repos.lock().unwrap().clone())
        }

        async fn create_repository(
            &self,
            _token: &str,
            new: &NewRepository,
        ) -> Result<Repository> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            let mut r = repo(&new.name);
            r.private = new.private;
            r.description = Some(new.description.clone()).filter(|d| !d.is_empty());
            self.repos.lock().unwrap().insert(0, r.clone());
            Ok(r)
        }

        async fn delete_repository(&self, _token: &str, full_name: &str) -> Result<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            let mut repos = self.repos.lock().unwrap();
            let before = repos.len();
            repos.retain(|r| r.full_name != full_name);
            if repos.len() == before {
                return Err(Error::upstream(Some(404), "Not Found"));
            }
            Ok(())
        }

        async fn list_contents(
            &self,
            _token: &str,
            _full_name: &str,
            _path: &str,
        ) -> Result<Vec<RepoContent>> {
            let entry = |name: &str, kind| RepoContent {
                name: name.to_string(),
                path: name.to_string(),
                kind,
                size: 0,
                html_url: None,
            };
            Ok(vec![
                entry("README.md", ContentKind::File),
                entry("src", ContentKind::Dir),
                entry("Cargo.toml", ContentKind::File),
                entry("docs", ContentKind::Dir),
            ])
        }
    }
}
