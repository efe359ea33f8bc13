//! Command dispatcher - events to searches and replies / 命令分发器

use std::sync::Arc;

use crate::error::BotError;
use crate::refresh::{RefreshOutcome, SnapshotRefresher};
use crate::search::{navigation, Formatter, NavButton, NavigationToken, SearchEngine, SearchQuery};

use super::command::{Command, HELP_TEXT, UNKNOWN_HINT};
use super::{ChatTransport, EditOutcome, Event};

pub const REFRESH_STARTED: &str = "⏳ Descargando la base de datos...";
pub const REFRESH_DONE: &str = "✅ Base de datos actualizada.";
pub const REFRESH_BUSY: &str = "⏳ Ya hay una actualización en curso.";
pub const BUTTON_EXPIRED: &str = "⌛ Este botón ya no es válido. Repite la búsqueda.";

pub struct Dispatcher {
    transport: Arc<dyn ChatTransport>,
    engine: Arc<SearchEngine>,
    formatter: Formatter,
    refresher: Arc<SnapshotRefresher>,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        engine: Arc<SearchEngine>,
        formatter: Formatter,
        refresher: Arc<SnapshotRefresher>,
    ) -> Self {
        Self {
            transport,
            engine,
            formatter,
            refresher,
        }
    }

    /// Handle one interaction end to end / 处理单个事件
    ///
    /// Transport failures are logged here, nothing propagates.
    pub async fn handle(&self, event: Event) {
        let result = match event {
            Event::Text { chat_id, text } => self.on_text(chat_id, &text).await,
            Event::Callback {
                callback_id,
                target,
                data,
            } => self.on_callback(&callback_id, target, &data).await,
        };

        if let Err(e) = result {
            tracing::warn!("Failed to deliver reply: {:#}", e);
        }
    }

    async fn on_text(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        let command = match Command::parse(text) {
            Ok(command) => command,
            Err(e) => return self.transport.send_message(chat_id, &e.user_message(), &[]).await,
        };

        match command {
            Command::Help => self.transport.send_message(chat_id, HELP_TEXT, &[]).await,
            Command::Unknown(name) => {
                tracing::debug!("Unknown command /{}", name);
                self.transport.send_message(chat_id, UNKNOWN_HINT, &[]).await
            }
            Command::Refresh => self.on_refresh(chat_id).await,
            Command::Search(query) => {
                if let Err(e) = self.transport.send_typing(chat_id).await {
                    tracing::debug!("Typing indicator failed: {:#}", e);
                }
                let (text, buttons) = self.run_search(&query, 0).await;
                self.transport.send_message(chat_id, &text, &buttons).await
            }
        }
    }

    async fn on_refresh(&self, chat_id: i64) -> anyhow::Result<()> {
        if self.refresher.is_running() {
            return self.transport.send_message(chat_id, REFRESH_BUSY, &[]).await;
        }
        self.transport.send_message(chat_id, REFRESH_STARTED, &[]).await?;

        let reply = match self.refresher.refresh().await {
            Ok(RefreshOutcome::Updated { .. }) => REFRESH_DONE.to_string(),
            Ok(RefreshOutcome::AlreadyRunning) => REFRESH_BUSY.to_string(),
            // Already logged by the refresher
            Err(e) => e.user_message(),
        };
        self.transport.send_message(chat_id, &reply, &[]).await
    }

    async fn on_callback(&self, callback_id: &str, target: Option<(i64, i64)>, data: &str) -> anyhow::Result<()> {
        let token = match NavigationToken::decode(data) {
            Ok(token) => token,
            Err(e) => {
                tracing::debug!("Rejected navigation token {:?}: {}", data, e);
                return self.transport.answer_callback(callback_id, Some(BUTTON_EXPIRED)).await;
            }
        };
        let Some((chat_id, message_id)) = target else {
            return self.transport.answer_callback(callback_id, Some(BUTTON_EXPIRED)).await;
        };

        // Stop the client-side spinner first
        self.transport.answer_callback(callback_id, None).await?;

        let (text, buttons) = self.run_search(&token.query, token.page_index).await;
        match self.transport.edit_message(chat_id, message_id, &text, &buttons).await {
            Ok(EditOutcome::Edited) => Ok(()),
            Ok(EditOutcome::Unchanged) => {
                tracing::debug!("Message {} unchanged, edit skipped", message_id);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to edit message {}: {:#}", message_id, e);
                Ok(())
            }
        }
    }

    /// Search and render the reply text with its controls / 执行搜索并渲染回复
    async fn run_search(&self, query: &SearchQuery, page_index: u32) -> (String, Vec<NavButton>) {
        match self.engine.search(query, page_index).await {
            Ok(page) => (self.formatter.render_page(&page), navigation(&page)),
            Err(BotError::NoMatch) => (self.formatter.not_found(query), Vec::new()),
            Err(e) => {
                if e.is_operator_error() {
                    tracing::error!("Search {:?} failed: {}", query, e);
                }
                (e.user_message(), Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::command::USAGE_PERSONA;
    use crate::config::ColumnMap;
    use crate::store::tests::build_snapshot;
    use crate::store::RecordStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Send { chat_id: i64, text: String, buttons: Vec<NavButton> },
        Edit { message_id: i64, text: String, buttons: Vec<NavButton> },
        Answer { text: Option<String> },
        Typing,
    }

    #[derive(Default)]
    struct FakeTransport {
        calls: Mutex<Vec<Call>>,
        unchanged: bool,
    }

    impl FakeTransport {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        fn sent_texts(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Send { text, .. } => Some(text),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl ChatTransport for FakeTransport {
        async fn send_message(&self, chat_id: i64, text: &str, buttons: &[NavButton]) -> anyhow::Result<()> {
            self.calls.lock().push(Call::Send {
                chat_id,
                text: text.to_string(),
                buttons: buttons.to_vec(),
            });
            Ok(())
        }

        async fn edit_message(
            &self,
            _chat_id: i64,
            message_id: i64,
            text: &str,
            buttons: &[NavButton],
        ) -> anyhow::Result<EditOutcome> {
            self.calls.lock().push(Call::Edit {
                message_id,
                text: text.to_string(),
                buttons: buttons.to_vec(),
            });
            Ok(if self.unchanged { EditOutcome::Unchanged } else { EditOutcome::Edited })
        }

        async fn answer_callback(&self, _callback_id: &str, text: Option<&str>) -> anyhow::Result<()> {
            self.calls.lock().push(Call::Answer {
                text: text.map(str::to_string),
            });
            Ok(())
        }

        async fn send_typing(&self, _chat_id: i64) -> anyhow::Result<()> {
            self.calls.lock().push(Call::Typing);
            Ok(())
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        transport: Arc<FakeTransport>,
        dispatcher: Dispatcher,
    }

    async fn harness(rows: usize, transport: FakeTransport) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("padron.db");
        let data: Vec<(i64, String)> = (0..rows).map(|i| (i as i64 + 1, format!("Mitre {}", i))).collect();
        let rows: Vec<(i64, &str, &str, &str, &str, &str)> = data
            .iter()
            .map(|(id, addr)| (*id, "Gomez", "Ana", addr.as_str(), "F", "1990"))
            .collect();
        if !rows.is_empty() {
            build_snapshot(&path, &rows).await;
        }

        let store = Arc::new(RecordStore::new(path, "maestra"));
        let engine = Arc::new(SearchEngine::new(store.clone(), ColumnMap::default(), 5));
        let refresher = Arc::new(SnapshotRefresher::new(store, "", Duration::from_secs(5)).unwrap());
        let transport = Arc::new(transport);
        let dispatcher = Dispatcher::new(
            transport.clone(),
            engine,
            Formatter::new(ColumnMap::default(), 4096),
            refresher,
        );
        Harness {
            _dir: dir,
            transport,
            dispatcher,
        }
    }

    fn text(chat_id: i64, text: &str) -> Event {
        Event::Text {
            chat_id,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_search_sends_first_page_with_next_button() {
        let h = harness(12, FakeTransport::default()).await;
        h.dispatcher.handle(text(7, "/apellido gomez")).await;

        let calls = h.transport.calls();
        assert_eq!(calls[0], Call::Typing);
        match &calls[1] {
            Call::Send { chat_id, text, buttons } => {
                assert_eq!(*chat_id, 7);
                assert!(text.contains("(Pág 1/3)"));
                assert_eq!(buttons.len(), 1);
                assert_eq!(buttons[0].token, "1|s|a|gomez|1");
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_callback_edits_in_place() {
        let h = harness(12, FakeTransport::default()).await;
        h.dispatcher
            .handle(Event::Callback {
                callback_id: "cb".into(),
                target: Some((7, 99)),
                data: "1|s|a|gomez|2".into(),
            })
            .await;

        let calls = h.transport.calls();
        assert_eq!(calls[0], Call::Answer { text: None });
        match &calls[1] {
            Call::Edit { message_id, text, buttons } => {
                assert_eq!(*message_id, 99);
                assert!(text.contains("(Pág 3/3)"));
                assert_eq!(buttons.len(), 1);
                assert_eq!(buttons[0].token, "1|s|a|gomez|1");
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unchanged_edit_is_silent() {
        let transport = FakeTransport {
            unchanged: true,
            ..Default::default()
        };
        let h = harness(3, transport).await;
        h.dispatcher
            .handle(Event::Callback {
                callback_id: "cb".into(),
                target: Some((7, 99)),
                data: "1|s|a|gomez|0".into(),
            })
            .await;
        assert!(h.transport.sent_texts().is_empty());
        assert_eq!(h.transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_bad_token_answers_expired() {
        let h = harness(3, FakeTransport::default()).await;
        h.dispatcher
            .handle(Event::Callback {
                callback_id: "cb".into(),
                target: Some((7, 99)),
                data: "pag_apellido_gomez_1".into(),
            })
            .await;
        assert_eq!(
            h.transport.calls(),
            vec![Call::Answer {
                text: Some(BUTTON_EXPIRED.to_string())
            }]
        );
    }

    #[tokio::test]
    async fn test_user_facing_errors() {
        let h = harness(3, FakeTransport::default()).await;
        h.dispatcher.handle(text(1, "/persona Gomez")).await;
        h.dispatcher.handle(text(1, "/persona Perez Luis")).await;
        h.dispatcher.handle(text(1, "/start")).await;
        h.dispatcher.handle(text(1, "/borrar")).await;

        let texts = h.transport.sent_texts();
        assert_eq!(texts[0], USAGE_PERSONA);
        assert_eq!(texts[1], "❌ Nadie con Apellido 'Perez' y Nombre 'Luis'.");
        assert_eq!(texts[2], HELP_TEXT);
        assert_eq!(texts[3], UNKNOWN_HINT);
    }

    #[tokio::test]
    async fn test_store_unavailable_and_failed_refresh() {
        let h = harness(0, FakeTransport::default()).await;
        h.dispatcher.handle(text(1, "30123456")).await;
        h.dispatcher.handle(text(1, "/actualizar")).await;

        let texts = h.transport.sent_texts();
        assert_eq!(texts[0], BotError::StoreUnavailable.user_message());
        assert_eq!(texts[1], REFRESH_STARTED);
        assert_eq!(texts[2], BotError::DownloadFailure(String::new()).user_message());
    }
}
