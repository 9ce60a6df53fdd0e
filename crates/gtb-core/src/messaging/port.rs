use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{InlineKeyboard, MessagingCapabilities},
    Result,
};

/// Outbound messenger port.
///
/// The Telegram adapter implements it; core services only see this trait.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;
    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()>;

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod fake {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    };

    use super::*;
    use crate::{domain::MessageId, errors::Error};

    /// Records everything sent; `failing()` makes every send error out.
    #[derive(Default)]
    pub struct FakeMessenger {
        next_id: Mutex<i32>,
        pub sends: Mutex<Vec<(ChatId, String)>>,
        pub keyboards: Mutex<Vec<(ChatId, InlineKeyboard)>>,
        pub answers: Mutex<Vec<(String, Option<String>)>>,
        pub fail: AtomicBool,
    }

    impl FakeMessenger {
        pub fn failing() -> Self {
            let m = Self::default();
            m.fail.store(true, Ordering::SeqCst);
            m
        }

        pub fn sent(&self) -> Vec<(ChatId, String)> {
            self.sends.lock().unwrap().clone()
        }

        pub fn keyboards(&self) -> Vec<(ChatId, InlineKeyboard)> {
            self.keyboards.lock().unwrap().clone()
        }

        pub fn answered(&self) -> Vec<(String, Option<String>)> {
            self.answers.lock().unwrap().clone()
        }

        fn alloc(&self, chat_id: ChatId) -> MessageRef {
            let mut guard = self.next_id.lock().unwrap();
            *guard += 1;
            MessageRef {
                chat_id,
                message_id: MessageId(*guard),
            }
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                supports_html: true,
                supports_edit: true,
                supports_inline_keyboards: true,
                max_message_len: 4096,
            }
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::External("telegram error: bot was blocked".into()));
            }
            self.sends.lock().unwrap().push((chat_id, html.to_string()));
            Ok(self.alloc(chat_id))
        }

        async fn edit_html(&self, _msg: MessageRef, _html: &str) -> Result<()> {
            Ok(())
        }

        async fn send_inline_keyboard(
            &self,
            chat_id: ChatId,
            html: &str,
            keyboard: InlineKeyboard,
        ) -> Result<MessageRef> {
            let sent = self.send_html(chat_id, html).await?;
            self.keyboards.lock().unwrap().push((chat_id, keyboard));
            Ok(sent)
        }

        async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
            self.answers
                .lock()
                .unwrap()
                .push((callback_id.to_string(), text.map(str::to_string)));
            Ok(())
        }
    }
}
