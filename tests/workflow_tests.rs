use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tldr::ai::Summarizer;
use tldr::core::{AppendOutcome, BufferStore, ChatId, MemoryPersistence, Message};
use tldr::errors::BotError;
use tldr::telegram::escape_markdown_v2;
use tldr::transport::{ChatTransport, MessageHandle, TextFormat};
use tldr::worker::{
    CANONICAL_FAILURE_MESSAGE, Dispatcher, INSUFFICIENT_HISTORY_MESSAGE, Orchestrator,
    SummaryOutcome,
};

const CHAT: ChatId = ChatId(-1001);

enum Behaviour {
    Reply(&'static str),
    Fail,
    Panic,
    Hang,
    /// Append a message to the chat while the "model" is working.
    AppendDuringCall(Arc<BufferStore>),
}

struct FakeSummarizer {
    behaviour: Behaviour,
    prompts: StdMutex<Vec<String>>,
}

impl FakeSummarizer {
    fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            prompts: StdMutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, prompt: &str) -> Result<String, BotError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.behaviour {
            Behaviour::Reply(text) => Ok((*text).to_string()),
            Behaviour::Fail => Err(BotError::OpenAIError("model unavailable".to_string())),
            Behaviour::Panic => panic!("model client bug"),
            Behaviour::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Behaviour::AppendDuringCall(store) => {
                store
                    .append(CHAT, Message::new(Utc::now(), "Dave", "late message"))
                    .await?;
                Ok("- summary".to_string())
            }
        }
    }
}

#[derive(Default)]
struct FakeTransport {
    notices: StdMutex<Vec<(ChatId, String)>>,
    retracted: StdMutex<Vec<MessageHandle>>,
    sent: StdMutex<Vec<(ChatId, String, TextFormat)>>,
    /// Every transport call in order: "notify", "send", "retract".
    calls: StdMutex<Vec<&'static str>>,
    /// Reject MarkdownV2 posts the way Telegram rejects oversized messages.
    reject_markdown: AtomicBool,
}

impl FakeTransport {
    fn notices(&self) -> Vec<(ChatId, String)> {
        self.notices.lock().unwrap().clone()
    }

    fn retracted(&self) -> Vec<MessageHandle> {
        self.retracted.lock().unwrap().clone()
    }

    fn sent(&self) -> Vec<(ChatId, String, TextFormat)> {
        self.sent.lock().unwrap().clone()
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn notify(&self, chat_id: ChatId, text: &str) -> Result<MessageHandle, BotError> {
        self.calls.lock().unwrap().push("notify");
        let mut notices = self.notices.lock().unwrap();
        notices.push((chat_id, text.to_string()));
        Ok(MessageHandle {
            chat_id,
            message_id: notices.len() as i64,
        })
    }

    async fn retract(&self, handle: MessageHandle) -> Result<(), BotError> {
        self.calls.lock().unwrap().push("retract");
        self.retracted.lock().unwrap().push(handle);
        Ok(())
    }

    async fn send(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageHandle, BotError> {
        self.calls.lock().unwrap().push("send");
        if format == TextFormat::MarkdownV2 && self.reject_markdown.load(Ordering::SeqCst) {
            return Err(BotError::ApiError(
                "sendMessage failed (400): Bad Request: message is too long".to_string(),
            ));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((chat_id, text.to_string(), format));
        Ok(MessageHandle {
            chat_id,
            message_id: 1000 + sent.len() as i64,
        })
    }

    fn escape(&self, text: &str) -> String {
        escape_markdown_v2(text)
    }
}

struct Harness {
    store: Arc<BufferStore>,
    persistence: Arc<MemoryPersistence>,
    transport: Arc<FakeTransport>,
}

impl Harness {
    async fn new() -> Self {
        let persistence = Arc::new(MemoryPersistence::new());
        let store = Arc::new(BufferStore::load(persistence.clone(), 150).await.unwrap());
        Self {
            store,
            persistence,
            transport: Arc::new(FakeTransport::default()),
        }
    }

    fn orchestrator(&self, summarizer: Arc<FakeSummarizer>) -> Orchestrator {
        Orchestrator::new(self.store.clone(), summarizer, self.transport.clone())
    }

    async fn seed(&self, messages: &[(&str, &str)]) -> Vec<Message> {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut seeded = Vec::new();
        for (i, (author, text)) in messages.iter().enumerate() {
            let message = Message::new(base + ChronoDuration::seconds(i as i64), *author, *text);
            self.store.append(CHAT, message.clone()).await.unwrap();
            seeded.push(message);
        }
        seeded
    }
}

const GREETING: &[(&str, &str)] = &[("Alice", "hi"), ("Bob", "yo"), ("Alice", "what's up")];

#[tokio::test]
async fn test_successful_summary_reports_count_and_clears_buffer() {
    let harness = Harness::new().await;
    harness.seed(GREETING).await;
    let summarizer = FakeSummarizer::new(Behaviour::Reply("- Alice and Bob greeted each other"));

    let outcome = harness.orchestrator(summarizer.clone()).summarize(CHAT).await;

    let SummaryOutcome::Summarized {
        message_count,
        text,
    } = &outcome
    else {
        panic!("expected a summary, got {outcome:?}");
    };
    assert_eq!(*message_count, 3);
    assert!(text.contains("3 messages"), "unexpected text: {text}");
    assert!(text.contains("\\- Alice and Bob greeted each other"));
    assert_eq!(outcome.text_format(), TextFormat::MarkdownV2);
    assert_eq!(
        harness.transport.sent(),
        vec![(CHAT, text.clone(), TextFormat::MarkdownV2)]
    );
    assert!(harness.store.snapshot(CHAT).await.is_empty());
    assert!(harness.persistence.saved_image().await[&CHAT].is_empty());
}

#[tokio::test]
async fn test_rejected_summary_post_keeps_history_and_apologizes() {
    let harness = Harness::new().await;
    let seeded = harness.seed(GREETING).await;
    harness.transport.reject_markdown.store(true, Ordering::SeqCst);

    let outcome = harness
        .orchestrator(FakeSummarizer::new(Behaviour::Reply("- a very long recap")))
        .summarize(CHAT)
        .await;

    match &outcome {
        SummaryOutcome::Failed { reason } => {
            assert!(reason.contains("message is too long"), "{reason}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(harness.store.snapshot(CHAT).await, seeded);
    assert_eq!(harness.persistence.saved_image().await[&CHAT], seeded);
    assert_eq!(
        harness.transport.sent(),
        vec![(
            CHAT,
            CANONICAL_FAILURE_MESSAGE.to_string(),
            TextFormat::Plain
        )]
    );
    // Summary attempt, apology, then the notice comes down.
    assert_eq!(
        harness.transport.calls(),
        vec!["notify", "send", "send", "retract"]
    );
}

#[tokio::test]
async fn test_prompt_lists_messages_oldest_first() {
    let harness = Harness::new().await;
    harness.seed(GREETING).await;
    let summarizer = FakeSummarizer::new(Behaviour::Reply("- ok"));

    harness.orchestrator(summarizer.clone()).summarize(CHAT).await;

    let prompts = summarizer.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Alice: hi\nBob: yo\nAlice: what's up"));
}

#[tokio::test]
async fn test_short_history_is_declined_without_calling_model() {
    for count in 0..3 {
        let harness = Harness::new().await;
        let seeded = harness.seed(&GREETING[..count]).await;
        let summarizer = FakeSummarizer::new(Behaviour::Reply("- unused"));

        let outcome = harness.orchestrator(summarizer.clone()).summarize(CHAT).await;

        assert_eq!(outcome, SummaryOutcome::InsufficientHistory { available: count });
        assert_eq!(outcome.reply_text(), INSUFFICIENT_HISTORY_MESSAGE);
        assert!(summarizer.prompts().is_empty());
        assert!(harness.transport.notices().is_empty());
        assert_eq!(
            harness.transport.sent(),
            vec![(
                CHAT,
                INSUFFICIENT_HISTORY_MESSAGE.to_string(),
                TextFormat::Plain
            )]
        );
        assert_eq!(harness.store.snapshot(CHAT).await, seeded);
    }
}

#[tokio::test]
async fn test_failed_summary_leaves_buffer_identical() {
    let harness = Harness::new().await;
    harness.seed(GREETING).await;
    let before = serde_json::to_vec(&harness.store.snapshot(CHAT).await).unwrap();

    let outcome = harness
        .orchestrator(FakeSummarizer::new(Behaviour::Fail))
        .summarize(CHAT)
        .await;

    assert!(matches!(outcome, SummaryOutcome::Failed { .. }));
    assert_eq!(outcome.reply_text(), CANONICAL_FAILURE_MESSAGE);
    assert_eq!(outcome.text_format(), TextFormat::Plain);
    assert_eq!(
        harness.transport.calls(),
        vec!["notify", "send", "retract"]
    );
    let after = serde_json::to_vec(&harness.store.snapshot(CHAT).await).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_blank_summary_counts_as_failure() {
    let harness = Harness::new().await;
    let seeded = harness.seed(GREETING).await;

    let outcome = harness
        .orchestrator(FakeSummarizer::new(Behaviour::Reply("  \n ")))
        .summarize(CHAT)
        .await;

    assert!(matches!(outcome, SummaryOutcome::Failed { .. }));
    assert_eq!(harness.store.snapshot(CHAT).await, seeded);
}

#[tokio::test]
async fn test_panicking_summarizer_is_contained() {
    let harness = Harness::new().await;
    let seeded = harness.seed(GREETING).await;

    let outcome = harness
        .orchestrator(FakeSummarizer::new(Behaviour::Panic))
        .summarize(CHAT)
        .await;

    assert!(matches!(outcome, SummaryOutcome::Failed { .. }));
    assert_eq!(harness.store.snapshot(CHAT).await, seeded);
    assert_eq!(harness.transport.retracted().len(), 1);
}

#[tokio::test]
async fn test_timeout_fails_without_clearing() {
    let harness = Harness::new().await;
    let seeded = harness.seed(GREETING).await;

    let outcome = harness
        .orchestrator(FakeSummarizer::new(Behaviour::Hang))
        .with_timeout(Some(Duration::from_millis(50)))
        .summarize(CHAT)
        .await;

    match outcome {
        SummaryOutcome::Failed { reason } => assert!(reason.contains("Timed out"), "{reason}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(harness.store.snapshot(CHAT).await, seeded);
}

#[tokio::test]
async fn test_processing_notice_is_posted_and_retracted() {
    for behaviour in [Behaviour::Reply("- fine"), Behaviour::Fail] {
        let harness = Harness::new().await;
        harness.seed(GREETING).await;

        harness
            .orchestrator(FakeSummarizer::new(behaviour))
            .summarize(CHAT)
            .await;

        let notices = harness.transport.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].0, CHAT);
        assert!(notices[0].1.contains("Summarizing the last 3 messages"));
        assert_eq!(
            harness.transport.retracted(),
            vec![MessageHandle {
                chat_id: CHAT,
                message_id: 1
            }]
        );
    }
}

#[tokio::test]
async fn test_cancelled_summary_still_retracts_notice_and_keeps_buffer() {
    let harness = Harness::new().await;
    let seeded = harness.seed(GREETING).await;
    let orchestrator = Arc::new(harness.orchestrator(FakeSummarizer::new(Behaviour::Hang)));

    let task = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.summarize(CHAT).await }
    });

    // Wait until the notice is up, then tear the workflow down mid-call.
    while harness.transport.notices().is_empty() {
        tokio::task::yield_now().await;
    }
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    for _ in 0..100 {
        if !harness.transport.retracted().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(harness.transport.retracted().len(), 1);
    assert_eq!(harness.store.snapshot(CHAT).await, seeded);
}

#[tokio::test]
async fn test_message_arriving_mid_summary_is_dropped_by_clear() {
    let harness = Harness::new().await;
    harness.seed(GREETING).await;
    let summarizer = FakeSummarizer::new(Behaviour::AppendDuringCall(harness.store.clone()));

    let outcome = harness.orchestrator(summarizer.clone()).summarize(CHAT).await;

    assert!(matches!(
        outcome,
        SummaryOutcome::Summarized {
            message_count: 3,
            ..
        }
    ));
    assert!(!summarizer.prompts()[0].contains("late message"));
    assert!(harness.store.snapshot(CHAT).await.is_empty());
}

#[tokio::test]
async fn test_dispatcher_routes_events() {
    let harness = Harness::new().await;
    let summarizer = FakeSummarizer::new(Behaviour::Reply("- recap"));
    let dispatcher = Dispatcher::new(
        harness.store.clone(),
        Arc::new(harness.orchestrator(summarizer)),
    );

    dispatcher.on_startup(CHAT).await.unwrap();
    assert_eq!(harness.store.chat_count().await, 1);

    let now = Utc::now();
    assert_eq!(
        dispatcher.on_text(CHAT, "Alice", "", now).await.unwrap(),
        AppendOutcome::Rejected
    );
    for (author, text) in GREETING {
        dispatcher.on_text(CHAT, author, text, now).await.unwrap();
    }
    assert_eq!(harness.store.len(CHAT).await, 3);

    let outcome = dispatcher.on_summarize_command(CHAT).await;
    assert!(outcome.reply_text().contains("3 messages"));
    assert!(harness.store.is_empty(CHAT).await);

    let outcome = dispatcher.on_summarize_command(CHAT).await;
    assert_eq!(outcome, SummaryOutcome::InsufficientHistory { available: 0 });
}

#[tokio::test]
async fn test_summary_survives_failed_clear_persistence() {
    let harness = Harness::new().await;
    harness.seed(GREETING).await;
    harness.persistence.set_fail_saves(true);

    let outcome = harness
        .orchestrator(FakeSummarizer::new(Behaviour::Reply("- recap")))
        .summarize(CHAT)
        .await;

    assert!(matches!(outcome, SummaryOutcome::Summarized { .. }));
    assert!(harness.store.snapshot(CHAT).await.is_empty());
}
