use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc::{self, UnboundedReceiver};

use super::*;
use crate::backend::MockBackend;
use crate::models::Role;
use crate::stream::{ChunkStream, MemoryChunkStream};

fn chunks(items: &[&str]) -> BoxChunkStream {
    Box::new(MemoryChunkStream::new(
        items.iter().map(|s| s.as_bytes().to_vec()).collect::<Vec<_>>(),
    ))
}

/// Sends one chunk, then hangs until dropped.
struct HangingStream {
    sent: bool,
    dropped: Arc<AtomicBool>,
}

#[async_trait]
impl ChunkStream for HangingStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.sent {
            self.sent = true;
            return Ok(Some(b"aGVsbG8=\n".to_vec()));
        }
        futures::future::pending().await
    }
}

impl Drop for HangingStream {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

fn expect_context(backend: &mut MockBackend) {
    backend
        .expect_context_string()
        .returning(|| Box::pin(async { Ok("3 / 4096 tokens used".to_string()) }));
}

fn setup(backend: MockBackend) -> (Controller, UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel::<Event>();
    let controller = Controller::new(Arc::new(backend), Arc::new(tx))
        .with_max_input_length(16)
        .with_swipe_delay(Duration::ZERO);
    (controller, rx)
}

fn collect_events(rx: &mut UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = vec![];
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_submit() {
    let mut backend = MockBackend::new();
    backend.expect_submit().times(1).returning(|prompt| {
        Box::pin(async move {
            assert_eq!(prompt, "Hello");
            Ok(chunks(&["SGkg", "dGhlcmUh\n"]))
        })
    });
    expect_context(&mut backend);

    let (controller, mut rx) = setup(backend);
    controller.submit("  Hello \n").await.expect("failed to submit");

    let messages = controller.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role(), &Role::User);
    assert_eq!(messages[0].content(), "Hello");
    assert_eq!(messages[1].role(), &Role::Bot);
    assert_eq!(messages[1].content(), "Hi there!");
    assert_eq!(controller.is_generating(), false);

    let events = collect_events(&mut rx);
    assert!(matches!(events.first(), Some(Event::GenerationStarted)));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, Event::MessageUpdated { text, .. } if text == "Hi there!"))
    );
    assert!(events.iter().any(|e| matches!(e, Event::GenerationFinished)));
    assert!(matches!(events.last(), Some(Event::ContextString(s)) if s == "3 / 4096 tokens used"));
}

#[tokio::test]
async fn test_submit_skips_malformed_units() {
    let mut backend = MockBackend::new();
    backend
        .expect_submit()
        .times(1)
        .returning(|_| Box::pin(async { Ok(chunks(&["!!!\n", "aGVsbG8=\n"])) }));
    expect_context(&mut backend);

    let (controller, _rx) = setup(backend);
    controller.submit("Hi").await.expect("failed to submit");

    assert_eq!(controller.last_bot_message().as_deref(), Some("hello"));
}

#[tokio::test]
async fn test_submit_empty_prompt_triggers_bot_message() {
    let mut backend = MockBackend::new();
    backend.expect_submit().times(0);
    backend.expect_trigger().times(1).returning(|prefix| {
        Box::pin(async move {
            assert!(prefix.is_none());
            Ok(chunks(&["aGVsbG8="]))
        })
    });
    expect_context(&mut backend);

    let (controller, _rx) = setup(backend);
    controller.submit("   ").await.expect("failed to submit");

    let messages = controller.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].is_bot(), true);
    assert_eq!(messages[0].content(), "hello");
}

#[tokio::test]
async fn test_submit_rejects_long_input() {
    let mut backend = MockBackend::new();
    backend.expect_submit().times(0);

    let (controller, _rx) = setup(backend);
    let err = controller
        .submit("this prompt is far too long")
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ControllerError>(),
        Some(ControllerError::InputTooLong { max: 16 })
    ));
    assert_eq!(controller.messages().len(), 0);
    assert_eq!(controller.is_generating(), false);
}

#[tokio::test]
async fn test_submit_failure_resets_generation() {
    let mut backend = MockBackend::new();
    backend
        .expect_submit()
        .times(1)
        .returning(|_| Box::pin(async { Err(eyre::eyre!("bad response from /submit: 500")) }));
    expect_context(&mut backend);

    let (controller, _rx) = setup(backend);
    let err = controller.submit("Hello").await.unwrap_err();

    assert_eq!(err.to_string(), "submitting prompt");
    assert_eq!(controller.is_generating(), false);
}

#[tokio::test]
async fn test_submit_while_generating_cancels() {
    let mut backend = MockBackend::new();
    backend.expect_submit().times(0);
    backend
        .expect_cancel()
        .times(1)
        .returning(|| Box::pin(async { Ok(()) }));

    let (controller, _rx) = setup(backend);
    let ticket = controller.generation().try_begin().expect("failed to begin");

    controller.submit("Hello").await.expect("failed to submit");
    assert_eq!(controller.is_generating(), false);
    assert_eq!(ticket.token().is_cancelled(), true);
}

#[tokio::test]
async fn test_new_bot_message_with_prefix() {
    let mut backend = MockBackend::new();
    backend.expect_trigger().times(1).returning(|prefix| {
        Box::pin(async move {
            assert_eq!(prefix.as_deref(), Some("Once upon"));
            Ok(chunks(&["IGEgdGltZQ=="]))
        })
    });
    expect_context(&mut backend);

    let (controller, mut rx) = setup(backend);
    controller
        .new_bot_message(Some("Once upon".to_string()))
        .await
        .expect("failed to trigger");

    let messages = controller.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content(), "Once upon a time");

    let events = collect_events(&mut rx);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, Event::MessageAdded(m) if m.content() == "Once upon"))
    );
}

#[tokio::test]
async fn test_new_bot_message_refused_while_generating() {
    let mut backend = MockBackend::new();
    backend.expect_trigger().times(0);

    let (controller, _rx) = setup(backend);
    let _ticket = controller.generation().try_begin().expect("failed to begin");

    controller
        .new_bot_message(None)
        .await
        .expect("failed to trigger");
    assert_eq!(controller.is_generating(), true);
}

#[tokio::test]
async fn test_new_bot_message_busy_check_comes_first() {
    let mut backend = MockBackend::new();
    backend.expect_trigger().times(0);

    let (controller, _rx) = setup(backend);
    let _ticket = controller.generation().try_begin().expect("failed to begin");

    controller
        .new_bot_message(Some("a prefix far beyond the limit".to_string()))
        .await
        .expect("refusal is not an error");
    assert_eq!(controller.messages().len(), 0);
}

#[tokio::test]
async fn test_cancel_while_streaming() {
    let dropped = Arc::new(AtomicBool::new(false));
    let stream_dropped = Arc::clone(&dropped);

    let mut backend = MockBackend::new();
    backend.expect_submit().times(1).returning(move |_| {
        let dropped = Arc::clone(&stream_dropped);
        Box::pin(async move {
            Ok(Box::new(HangingStream {
                sent: false,
                dropped,
            }) as BoxChunkStream)
        })
    });
    backend
        .expect_cancel()
        .times(1)
        .returning(|| Box::pin(async { Ok(()) }));
    expect_context(&mut backend);

    let (controller, _rx) = setup(backend);
    let controller = Arc::new(controller);

    let worker = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.submit("Hello").await })
    };

    let start = std::time::Instant::now();
    while controller.last_bot_message().as_deref() != Some("hello") {
        assert!(start.elapsed() < Duration::from_secs(5), "reply never arrived");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    controller.cancel().await.expect("failed to cancel");
    worker
        .await
        .expect("worker panicked")
        .expect("failed to submit");

    let messages = controller.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content(), "Hello");
    assert_eq!(controller.is_generating(), false);
    assert_eq!(dropped.load(Ordering::SeqCst), true);
}

#[tokio::test]
async fn test_cancel_failure_keeps_generation() {
    let mut backend = MockBackend::new();
    backend
        .expect_cancel()
        .times(1)
        .returning(|| Box::pin(async { Err(eyre::eyre!("connection refused")) }));

    let (controller, _rx) = setup(backend);
    let ticket = controller.generation().try_begin().expect("failed to begin");

    assert!(controller.cancel().await.is_err());
    assert_eq!(controller.is_generating(), true);
    assert_eq!(ticket.token().is_cancelled(), false);
}

#[tokio::test]
async fn test_cancel_after_generation_finished_keeps_reply() {
    let mut backend = MockBackend::new();
    backend
        .expect_submit()
        .times(1)
        .returning(|_| Box::pin(async { Ok(chunks(&["Zmlyc3Q=\n"])) }));
    backend.expect_cancel().times(1).returning(|| {
        Box::pin(async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        })
    });
    expect_context(&mut backend);

    let (controller, mut rx) = setup(backend);
    let controller = Arc::new(controller);
    controller.submit("Hello").await.expect("failed to submit");
    let ticket = controller.generation().try_begin().expect("failed to begin");
    collect_events(&mut rx);

    let cancel = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.cancel().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(controller.generation().end(&ticket), true);
    cancel
        .await
        .expect("cancel panicked")
        .expect("failed to cancel");

    let messages = controller.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content(), "first");
    let events = collect_events(&mut rx);
    assert!(!events.iter().any(|e| matches!(e, Event::MessageRemoved(_))));
}

#[tokio::test]
async fn test_cancel_when_idle() {
    let mut backend = MockBackend::new();
    backend.expect_cancel().times(0);

    let (controller, _rx) = setup(backend);
    controller.cancel().await.expect("failed to cancel");
}

#[tokio::test]
async fn test_remove_last() {
    let mut backend = MockBackend::new();
    backend.expect_conversation().times(1).returning(|| {
        Box::pin(async {
            Ok(vec![
                Message::new(Role::System, "You are helpful."),
                Message::new_user("Hello"),
                Message::new_bot("Hi!"),
            ])
        })
    });
    backend
        .expect_remove_last()
        .times(1)
        .returning(|| Box::pin(async { Ok(()) }));
    expect_context(&mut backend);

    let (controller, _rx) = setup(backend);
    controller
        .load_conversation()
        .await
        .expect("failed to load conversation");
    assert_eq!(controller.messages().len(), 2);

    controller.remove_last().await.expect("failed to remove");
    let messages = controller.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content(), "Hello");
}

#[tokio::test]
async fn test_remove_last_on_empty_transcript() {
    let mut backend = MockBackend::new();
    backend.expect_remove_last().times(0);

    let (controller, _rx) = setup(backend);
    controller.remove_last().await.expect("failed to remove");
}

#[tokio::test]
async fn test_reset() {
    let mut backend = MockBackend::new();
    backend
        .expect_submit()
        .returning(|_| Box::pin(async { Ok(chunks(&["aGk=\n"])) }));
    backend
        .expect_reset()
        .times(1)
        .returning(|| Box::pin(async { Ok(()) }));
    backend.expect_cancel().times(0);
    expect_context(&mut backend);

    let (controller, mut rx) = setup(backend);
    controller.submit("Hello").await.expect("failed to submit");
    assert_eq!(controller.messages().len(), 2);

    controller.reset().await.expect("failed to reset");
    assert_eq!(controller.messages().len(), 0);

    let events = collect_events(&mut rx);
    assert!(events.iter().any(|e| matches!(e, Event::ConversationCleared)));
}

#[tokio::test]
async fn test_swipe_when_idle() {
    let mut backend = MockBackend::new();
    let mut seq = mockall::Sequence::new();
    backend
        .expect_submit()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Box::pin(async { Ok(chunks(&["Zmlyc3Q=\n"])) }));
    backend
        .expect_remove_last()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Box::pin(async { Ok(()) }));
    backend
        .expect_trigger()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Box::pin(async { Ok(chunks(&["c2Vjb25k\n"])) }));
    expect_context(&mut backend);

    let (controller, _rx) = setup(backend);
    controller.submit("Hello").await.expect("failed to submit");
    assert_eq!(controller.last_bot_message().as_deref(), Some("first"));

    controller.swipe(None).await.expect("failed to swipe");

    let messages = controller.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content(), "Hello");
    assert_eq!(messages[1].content(), "second");
}

#[tokio::test]
async fn test_swipe_while_generating() {
    let mut backend = MockBackend::new();
    let mut seq = mockall::Sequence::new();
    backend.expect_remove_last().times(0);
    backend
        .expect_cancel()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Box::pin(async { Ok(()) }));
    backend
        .expect_trigger()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Box::pin(async { Ok(chunks(&["c2Vjb25k\n"])) }));
    expect_context(&mut backend);

    let (controller, _rx) = setup(backend);
    let ticket = controller.generation().try_begin().expect("failed to begin");

    controller.swipe(None).await.expect("failed to swipe");

    assert_eq!(ticket.token().is_cancelled(), true);
    assert_eq!(controller.is_generating(), false);
    assert_eq!(controller.last_bot_message().as_deref(), Some("second"));
}

#[tokio::test]
async fn test_summarize() {
    let mut backend = MockBackend::new();
    backend
        .expect_summarize()
        .times(1)
        .returning(|| Box::pin(async { Ok("A greeting.".to_string()) }));

    let (controller, mut rx) = setup(backend);
    let summary = controller.summarize().await.expect("failed to summarize");

    assert_eq!(summary.as_deref(), Some("A greeting."));
    assert_eq!(controller.is_generating(), false);
    let events = collect_events(&mut rx);
    assert!(matches!(events.last(), Some(Event::Summary(s)) if s == "A greeting."));
}

#[tokio::test]
async fn test_summarize_refused_while_generating() {
    let mut backend = MockBackend::new();
    backend.expect_summarize().times(0);

    let (controller, _rx) = setup(backend);
    let _ticket = controller.generation().try_begin().expect("failed to begin");

    let summary = controller.summarize().await.expect("failed to summarize");
    assert!(summary.is_none());
}

#[tokio::test]
async fn test_refresh_context_skipped_while_generating() {
    let mut backend = MockBackend::new();
    backend.expect_context_string().times(0);

    let (controller, mut rx) = setup(backend);
    let _ticket = controller.generation().try_begin().expect("failed to begin");

    controller.refresh_context().await;
    assert_eq!(collect_events(&mut rx).len(), 0);
}

#[tokio::test]
async fn test_refresh_context_error_is_not_fatal() {
    let mut backend = MockBackend::new();
    backend
        .expect_context_string()
        .times(1)
        .returning(|| Box::pin(async { Err(eyre::eyre!("connection refused")) }));

    let (controller, mut rx) = setup(backend);
    controller.refresh_context().await;
    assert_eq!(collect_events(&mut rx).len(), 0);
}

#[tokio::test]
async fn test_attach_files() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let first = dir.path().join("main.rs");
    let second = dir.path().join("notes.txt");
    std::fs::write(&first, "fn main() {}").expect("failed to write file");
    std::fs::write(&second, "remember the milk").expect("failed to write file");

    let (controller, _rx) = setup(MockBackend::new());
    let attached = controller
        .attach_files(&[first, second])
        .await
        .expect("failed to attach files");

    assert_eq!(
        attached,
        "```\nfn main() {}\n```\n\n```\nremember the milk\n```\n\n"
    );

    let missing = dir.path().join("missing.txt");
    assert!(controller.attach_files(&[missing]).await.is_err());
}
