//! GitHub OAuth authorization-code flow.
//!
//! Per chat: `Unlinked -> AuthorizationPending -> Linked`. There is no way back
//! to `Unlinked`; re-authorizing overwrites the token and stays `Linked`.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::{
    accounts::AccountDirectory,
    domain::ChatIdentity,
    errors::Error,
    formatting::escape_html,
    hosting::HostingApi,
    messaging::port::MessagingPort,
    model::UserRecord,
    snapshot::{oauth_key, repos_key},
    utils::now_ms,
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkageState {
    Unlinked,
    AuthorizationPending,
    Linked,
}

pub struct LinkageService {
    accounts: Arc<AccountDirectory>,
    hosting: Arc<dyn HostingApi>,
    notifier: Option<Arc<dyn MessagingPort>>,
}

impl LinkageService {
    pub fn new(accounts: Arc<AccountDirectory>, hosting: Arc<dyn HostingApi>) -> Self {
        Self {
            accounts,
            hosting,
            notifier: None,
        }
    }

    /// Send a chat message once an account gets linked.
    pub fn with_notifier(mut self, messenger: Arc<dyn MessagingPort>) -> Self {
        self.notifier = Some(messenger);
        self
    }

    /// Authorization URL for `chat`. The chat identity travels as the OAuth `state`.
    ///
    /// The pending marker written here is diagnostic only; the callback does not read it.
    pub fn begin_authorization(&self, chat: &ChatIdentity) -> Result<String> {
        if chat.is_empty() {
            return Err(Error::MissingParameter("chat identity"));
        }
        let url = self.hosting.authorize_url(chat.as_str())?;
        self.accounts.snapshot().write(
            &oauth_key(chat),
            json!({ "state": chat.as_str(), "requestedAt": now_ms() }),
        );
        tracing::info!(%chat, "authorization started");
        Ok(url)
    }

    pub async fn complete_authorization(
        &self,
        code: &str,
        chat: &ChatIdentity,
    ) -> Result<UserRecord> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::MissingParameter("code"));
        }
        if chat.is_empty() {
            return Err(Error::MissingParameter("state"));
        }

        let token = self.hosting.exchange_code(code).await?;
        if token.trim().is_empty() {
            return Err(Error::AuthExchange("no access token returned".to_string()));
        }
        let profile = self.hosting.fetch_profile(&token).await?;

        let now = Utc::now();
        let record = self
            .accounts
            .upsert_with(chat, now, |u| u.link(&profile, token, now))
            .await?;
        // The cached list belongs to the previous token, possibly another account.
        self.accounts.snapshot().remove(&repos_key(chat));
        tracing::info!(%chat, login = %profile.login, "GitHub account linked");

        self.notify_linked(chat, &profile.login).await;
        Ok(record)
    }

    pub async fn linkage_state(&self, chat: &ChatIdentity) -> Result<LinkageState> {
        if let Some(u) = self.accounts.get_user(chat).await? {
            if u.is_linked() {
                return Ok(LinkageState::Linked);
            }
        }
        if self.accounts.snapshot().read(&oauth_key(chat)).is_some() {
            return Ok(LinkageState::AuthorizationPending);
        }
        Ok(LinkageState::Unlinked)
    }

    async fn notify_linked(&self, chat: &ChatIdentity, login: &str) {
        let Some(messenger) = &self.notifier else {
            return;
        };
        let Some(chat_id) = chat.as_chat_id() else {
            tracing::debug!(%chat, "not a Telegram chat; skipping link notification");
            return;
        };
        let html = format!(
            "✅ GitHub account <b>{}</b> linked.\n\nTry /repos to list your repositories.",
            escape_html(login)
        );
        if let Err(e) = messenger.send_html(chat_id, &html).await {
            tracing::warn!(%chat, "link notification failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::ChatId,
        hosting::fake::FakeHosting,
        messaging::port::fake::FakeMessenger,
        snapshot::{tests::tmp_path, user_key, SnapshotStore},
        store::{MemoryUserStore, UserStore},
    };

    struct Harness {
        linkage: LinkageService,
        accounts: Arc<AccountDirectory>,
        store: Arc<MemoryUserStore>,
        snapshot: Arc<SnapshotStore>,
        hosting: Arc<FakeHosting>,
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(self.snapshot.path());
        }
    }

    fn harness(prefix: &str, messenger: Option<Arc<FakeMessenger>>) -> Harness {
        let store = Arc::new(MemoryUserStore::new());
        let snapshot = Arc::new(SnapshotStore::new(tmp_path(prefix)));
        let accounts = Arc::new(AccountDirectory::new(store.clone(), snapshot.clone()));
        let hosting = Arc::new(FakeHosting::new("gho_token"));
        let mut linkage = LinkageService::new(accounts.clone(), hosting.clone());
        if let Some(m) = messenger {
            linkage = linkage.with_notifier(m);
        }
        Harness {
            linkage,
            accounts,
            store,
            snapshot,
            hosting,
        }
    }

    #[tokio::test]
    async fn completed_authorization_is_visible_in_both_stores() {
        let h = harness("gtb-link-ok", None);
        let chat = ChatIdentity::new("1001");

        h.linkage
            .complete_authorization("good", &chat)
            .await
            .unwrap();

        let cached: UserRecord =
            serde_json::from_value(h.snapshot.read(&user_key(&chat)).unwrap()).unwrap();
        assert!(cached.normalized().is_linked());

        let durable = h.store.find(&chat).await.unwrap().unwrap();
        assert!(durable.is_linked());
        assert_eq!(durable.token(), Some("gho_token"));
        assert_eq!(durable.hosting_username.as_deref(), Some("octocat"));

        let via_directory = h.accounts.get_user(&chat).await.unwrap().unwrap();
        assert!(via_directory.is_linked());
        assert!(!via_directory.token().unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn begin_twice_embeds_same_state_without_touching_records() {
        let h = harness("gtb-link-begin", None);
        let chat = ChatIdentity::new("1002");

        let a = h.linkage.begin_authorization(&chat).unwrap();
        let b = h.linkage.begin_authorization(&chat).unwrap();

        assert!(a.contains("state=1002"));
        assert!(b.contains("state=1002"));
        assert!(h.store.is_empty());
        assert_eq!(
            h.linkage.linkage_state(&chat).await.unwrap(),
            LinkageState::AuthorizationPending
        );
    }

    #[tokio::test]
    async fn empty_code_fails_before_any_network_call() {
        let h = harness("gtb-link-nocode", None);
        let err = h
            .linkage
            .complete_authorization("", &ChatIdentity::new("1003"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter("code")));
        assert_eq!(h.hosting.exchange_calls(), 0);

        let err = h
            .linkage
            .complete_authorization("good", &ChatIdentity::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter(_)));
        assert_eq!(h.hosting.exchange_calls(), 0);
    }

    #[tokio::test]
    async fn rejected_code_is_an_exchange_error_and_stores_nothing() {
        let h = harness("gtb-link-bad", None);
        let chat = ChatIdentity::new("1004");
        let err = h
            .linkage
            .complete_authorization("bad", &chat)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthExchange(_)));
        assert!(h.store.is_empty());
        assert_eq!(
            h.linkage.linkage_state(&chat).await.unwrap(),
            LinkageState::Unlinked
        );
    }

    #[tokio::test]
    async fn notification_is_sent_to_the_linked_chat() {
        let messenger = Arc::new(FakeMessenger::default());
        let h = harness("gtb-link-notify", Some(messenger.clone()));
        h.linkage
            .complete_authorization("good", &ChatIdentity::new("77"))
            .await
            .unwrap();

        let sent = messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ChatId(77));
        assert!(sent[0].1.contains("octocat"));
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_linkage() {
        let messenger = Arc::new(FakeMessenger::failing());
        let h = harness("gtb-link-notify-fail", Some(messenger));
        let chat = ChatIdentity::new("78");

        let record = h
            .linkage
            .complete_authorization("good", &chat)
            .await
            .unwrap();
        assert!(record.is_linked());
        assert_eq!(
            h.linkage.linkage_state(&chat).await.unwrap(),
            LinkageState::Linked
        );
    }

    #[tokio::test]
    async fn relinking_keeps_terms_and_overwrites_token() {
        let h = harness("gtb-link-relink", None);
        let chat = ChatIdentity::new("1005");
        h.accounts.agree_to_terms(&chat).await.unwrap();

        h.linkage
            .complete_authorization("good", &chat)
            .await
            .unwrap();
        let again = h
            .linkage
            .complete_authorization("good", &chat)
            .await
            .unwrap();

        assert!(again.has_agreed_to_terms);
        assert!(again.is_linked());
        assert_eq!(h.store.len(), 1);
    }
}
