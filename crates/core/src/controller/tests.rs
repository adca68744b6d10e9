use std::time::Duration;

use counsel_model::{ErrorKind, FitCategory, Message, Role, Topic};
use counsel_test_service::{
    HistoryMode, MemorySessionStore, PresetReply, ScriptedChatEndpoint,
};
use tokio::time::{sleep, timeout};

use crate::suggestions::initial_suggestions;
use crate::{
    Controller, ControllerBuilder, ControllerConfigBuilder, Operation, Rejected,
    Snapshot, Status, UserContext,
};

const WAIT: Duration = Duration::from_secs(10);

fn mit() -> Topic {
    Topic::new("mit", "MIT").with_category(FitCategory::Reach)
}

fn build(endpoint: &ScriptedChatEndpoint, store: &MemorySessionStore) -> Controller {
    let config = ControllerConfigBuilder::new()
        .with_request_timeout(Duration::from_secs(5))
        .with_save_retry(Duration::from_millis(10), Duration::from_millis(300))
        .build();
    ControllerBuilder::new(endpoint.clone(), store.clone(), UserContext::new("u-1"))
        .with_config(config)
        .build()
}

async fn wait_until(
    controller: &Controller,
    predicate: impl FnMut(&Snapshot) -> bool,
) -> Snapshot {
    timeout(WAIT, controller.wait_for(predicate))
        .await
        .unwrap()
        .unwrap()
}

async fn settle(controller: &Controller) -> Snapshot {
    wait_until(controller, Snapshot::is_settled).await
}

fn contents(snapshot: &Snapshot) -> Vec<(Role, &str)> {
    snapshot
        .conversation
        .messages
        .iter()
        .map(|msg| (msg.role(), msg.content()))
        .collect()
}

#[tokio::test]
async fn test_send_appends_question_then_answer() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(PresetReply::answer("Hi, how can I help?"));
    endpoint.set_delay(Duration::from_millis(50));
    let store = MemorySessionStore::default();

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller.send("  Hello  ").await.unwrap();

    let snapshot = controller.snapshot();
    assert_eq!(contents(&snapshot), vec![(Role::User, "Hello")]);
    assert_eq!(snapshot.status, Status::Pending(Operation::Sending));

    let snapshot = settle(&controller).await;
    assert_eq!(
        contents(&snapshot),
        vec![(Role::User, "Hello"), (Role::Assistant, "Hi, how can I help?")]
    );
    assert_eq!(snapshot.status, Status::Idle);
    assert_eq!(
        snapshot.conversation.conversation_id.as_deref(),
        Some("conv-1")
    );
    assert_eq!(snapshot.conversation.title.as_deref(), Some("Hello"));

    let request = &endpoint.requests()[0];
    assert_eq!(request.user_identifier, "u-1");
    assert_eq!(request.topic_id, "mit");
    assert_eq!(request.question, "Hello");
    assert!(request.conversation_history.is_empty());
}

#[tokio::test]
async fn test_failed_send_shows_notice() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(PresetReply::rejected("out of credits"));
    let store = MemorySessionStore::default();

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller.send("Hello").await.unwrap();

    let snapshot = wait_until(&controller, |s| !s.is_pending()).await;
    assert_eq!(
        contents(&snapshot),
        vec![
            (Role::User, "Hello"),
            (
                Role::Assistant,
                "Sorry, I couldn't answer that: out of credits"
            ),
        ]
    );
    let Status::Failed(failure) = &snapshot.status else {
        panic!("unexpected status: {:?}", snapshot.status);
    };
    assert_eq!(failure.kind(), ErrorKind::Rejected);

    // Failed exchanges are not saved.
    assert!(store.saves().is_empty());
}

#[tokio::test]
async fn test_failed_exchange_stays_local() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(PresetReply::answer("About 4%.").with_failures(1));
    let store = MemorySessionStore::default();

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller.send("Deadlines?").await.unwrap();
    let snapshot = wait_until(&controller, |s| !s.is_pending()).await;
    assert!(matches!(snapshot.status, Status::Failed(_)));
    // Nothing was answered yet, so the opening questions are still offered.
    assert_eq!(
        snapshot.suggestions,
        initial_suggestions(Some(FitCategory::Reach))
    );

    controller.send("Acceptance rate?").await.unwrap();
    let snapshot = settle(&controller).await;
    let shown = contents(&snapshot);
    assert_eq!(shown.len(), 4);
    assert_eq!(shown[0], (Role::User, "Deadlines?"));
    assert_eq!(shown[1].0, Role::Assistant);
    assert_eq!(shown[3], (Role::Assistant, "About 4%."));

    // The failed exchange is neither context nor stored.
    let requests = endpoint.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].conversation_history.is_empty());
    let saves = store.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(
        saves[0].messages,
        vec![
            Message::user("Acceptance rate?"),
            Message::assistant("About 4%.")
        ]
    );
    assert_eq!(saves[0].title.as_deref(), Some("Acceptance rate?"));
}

#[tokio::test]
async fn test_blank_input_is_ignored() {
    let endpoint = ScriptedChatEndpoint::default();
    let store = MemorySessionStore::default();
    let controller = build(&endpoint, &store);

    assert_eq!(controller.send("Hello").await, Err(Rejected::NoTopic));

    controller.open(mit()).await.unwrap();
    assert_eq!(controller.send("").await, Err(Rejected::EmptyInput));
    assert_eq!(controller.send("   ").await, Err(Rejected::EmptyInput));
    assert_eq!(
        controller.select_suggestion("\n\t").await,
        Err(Rejected::EmptyInput)
    );

    let snapshot = controller.snapshot();
    assert!(snapshot.conversation.messages.is_empty());
    assert_eq!(snapshot.status, Status::Idle);
    assert_eq!(endpoint.request_count(), 0);
}

#[tokio::test]
async fn test_gate_rejects_second_send() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(PresetReply::answer("First answer."));
    endpoint.add_reply(PresetReply::answer("Second answer."));
    endpoint.set_delay(Duration::from_millis(100));
    let store = MemorySessionStore::default();

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller.send("First").await.unwrap();
    assert_eq!(
        controller.send("Second").await,
        Err(Rejected::Busy(Operation::Sending))
    );
    assert_eq!(
        controller.load_conversation("conv-1").await,
        Err(Rejected::Busy(Operation::Sending))
    );

    let snapshot = wait_until(&controller, |s| !s.is_pending()).await;
    assert_eq!(
        contents(&snapshot),
        vec![(Role::User, "First"), (Role::Assistant, "First answer.")]
    );
    // The rejected question never reached the endpoint.
    assert_eq!(endpoint.request_count(), 1);

    controller.send("Second").await.unwrap();
    let snapshot = wait_until(&controller, |s| !s.is_pending()).await;
    assert_eq!(snapshot.conversation.messages.len(), 4);

    let requests = endpoint.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].conversation_history.len(), 2);
}

#[tokio::test]
async fn test_auto_save_payload_grows() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(PresetReply::answer("About 4%."));
    endpoint.add_reply(PresetReply::answer("Early action helps a bit."));
    let store = MemorySessionStore::default();

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller.send("What's the acceptance rate?").await.unwrap();
    settle(&controller).await;
    controller.send("Should I apply early?").await.unwrap();
    settle(&controller).await;

    let saves = store.saves();
    assert_eq!(saves.len(), 2);
    assert!(saves[1].messages.starts_with(&saves[0].messages));
    assert_eq!(saves[1].messages.len(), 4);
    assert_eq!(saves[0].conversation_id, None);
    assert_eq!(saves[1].conversation_id.as_deref(), Some("conv-1"));
    assert_eq!(saves[0].topic_display_name, "MIT");
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_saves_in_flight_are_coalesced() {
    let endpoint = ScriptedChatEndpoint::default();
    for answer in ["One.", "Two.", "Three."] {
        endpoint.add_reply(PresetReply::answer(answer));
    }
    let store = MemorySessionStore::default();
    store.set_delay(Duration::from_millis(200));

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    for question in ["1?", "2?", "3?"] {
        controller.send(question).await.unwrap();
        wait_until(&controller, |s| !s.is_pending()).await;
    }
    let snapshot = settle(&controller).await;
    assert_eq!(snapshot.conversation.messages.len(), 6);

    // The first save was in flight while the other two were queued, and
    // those two merged into one save that reuses the new identifier.
    let saves = store.saves();
    assert_eq!(saves.len(), 2);
    assert_eq!(saves[1].conversation_id.as_deref(), Some("conv-1"));
    assert_eq!(saves[1].messages.len(), 6);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_save_retries_transient_failures() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(PresetReply::answer("Sure."));
    let store = MemorySessionStore::default();
    store.fail_next_saves(2);

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller.send("Can you help?").await.unwrap();

    let snapshot = settle(&controller).await;
    assert_eq!(store.saves().len(), 3);
    assert_eq!(store.len(), 1);
    assert_eq!(
        snapshot.conversation.conversation_id.as_deref(),
        Some("conv-1")
    );
}

#[tokio::test]
async fn test_save_failure_is_swallowed() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(PresetReply::answer("Sure."));
    let store = MemorySessionStore::default();
    store.set_unavailable(true);

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller.send("Can you help?").await.unwrap();

    let snapshot = settle(&controller).await;
    assert_eq!(snapshot.status, Status::Idle);
    assert_eq!(snapshot.conversation.messages.len(), 2);
    assert_eq!(snapshot.conversation.conversation_id, None);
    assert!(store.saves().len() > 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_load_replaces_conversation() {
    let endpoint = ScriptedChatEndpoint::default();
    let store = MemorySessionStore::default();
    let id = store.seed(
        "u-1",
        "mit",
        "Essays",
        vec![Message::user("Help with essays"), Message::assistant("Sure.")],
    );

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller.load_conversation(id.clone()).await.unwrap();
    assert_eq!(
        controller.snapshot().status,
        Status::Pending(Operation::Loading)
    );

    let snapshot = wait_until(&controller, |s| !s.is_pending()).await;
    assert_eq!(snapshot.conversation.conversation_id, Some(id));
    assert_eq!(snapshot.conversation.title.as_deref(), Some("Essays"));
    assert_eq!(
        contents(&snapshot),
        vec![(Role::User, "Help with essays"), (Role::Assistant, "Sure.")]
    );
}

#[tokio::test]
async fn test_load_failure_keeps_conversation() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(PresetReply::answer("Sure."));
    let store = MemorySessionStore::default();

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller.send("Can you help?").await.unwrap();
    let before = settle(&controller).await;

    assert_eq!(
        controller.load_conversation("  ").await,
        Err(Rejected::MissingIdentifier)
    );
    controller.load_conversation("conv-404").await.unwrap();
    let after = wait_until(&controller, |s| !s.is_pending()).await;
    assert_eq!(after.conversation, before.conversation);
    assert_eq!(after.status, Status::Idle);
}

#[tokio::test]
async fn test_start_new_wins_over_load() {
    let endpoint = ScriptedChatEndpoint::default();
    let store = MemorySessionStore::default();
    let id = store.seed(
        "u-1",
        "mit",
        "Essays",
        vec![Message::user("Help with essays"), Message::assistant("Sure.")],
    );
    store.set_delay(Duration::from_millis(50));

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller.load_conversation(id).await.unwrap();
    controller.start_new().await.unwrap();

    let snapshot = controller.snapshot();
    assert!(snapshot.conversation.messages.is_empty());
    assert_eq!(snapshot.conversation.conversation_id, None);
    assert_eq!(snapshot.status, Status::Idle);

    // A late load result must not resurrect the conversation.
    sleep(Duration::from_millis(150)).await;
    let snapshot = controller.snapshot();
    assert!(snapshot.conversation.messages.is_empty());
    assert_eq!(snapshot.conversation.conversation_id, None);
    assert_eq!(snapshot.conversation.topic_id, "mit");
}

#[tokio::test]
async fn test_open_abandons_pending_question() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(PresetReply::answer("Too late."));
    endpoint.set_delay(Duration::from_millis(100));
    let store = MemorySessionStore::default();

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller.send("Hello").await.unwrap();
    controller
        .open(Topic::new("stanford", "Stanford"))
        .await
        .unwrap();

    sleep(Duration::from_millis(200)).await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.topic.map(|t| t.id), Some("stanford".to_owned()));
    assert!(snapshot.conversation.messages.is_empty());
    assert_eq!(snapshot.status, Status::Idle);
    assert!(store.saves().is_empty());
}

#[tokio::test]
async fn test_remove_active_conversation() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(PresetReply::answer("Sure."));
    let store = MemorySessionStore::default();

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller.send("Can you help?").await.unwrap();
    let snapshot = wait_until(&controller, |s| {
        s.is_settled() && s.summaries.len() == 1
    })
    .await;
    let id = snapshot.conversation.conversation_id.unwrap();
    assert_eq!(snapshot.summaries[0].conversation_id, id);

    controller.remove(id.clone()).await.unwrap();
    assert_eq!(
        controller.snapshot().status,
        Status::Pending(Operation::Removing)
    );
    let snapshot = wait_until(&controller, |s| {
        s.is_settled() && s.conversation.conversation_id.is_none()
    })
    .await;
    assert!(snapshot.conversation.messages.is_empty());
    assert!(snapshot.summaries.iter().all(|s| s.conversation_id != id));
    assert!(store.is_empty());
    assert_eq!(store.deletes(), vec![id]);
}

#[tokio::test]
async fn test_remove_other_conversation() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(PresetReply::answer("Sure."));
    let store = MemorySessionStore::default();
    let old = store.seed("u-1", "mit", "Old notes", vec![Message::user("Hi")]);

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller.send("Can you help?").await.unwrap();
    wait_until(&controller, |s| s.is_settled() && s.summaries.len() == 2).await;

    controller.remove(old.clone()).await.unwrap();
    let snapshot = wait_until(&controller, |s| {
        s.is_settled() && s.summaries.len() == 1
    })
    .await;
    assert_eq!(snapshot.conversation.messages.len(), 2);
    assert!(snapshot.conversation.conversation_id.is_some());
    assert_ne!(snapshot.summaries[0].conversation_id, old);
}

#[tokio::test]
async fn test_saved_conversation_is_listed_at_once() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(PresetReply::answer("Sure."));
    let store = MemorySessionStore::default();
    store.seed("u-1", "mit", "Old notes", vec![Message::user("Hi")]);

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    wait_until(&controller, |s| s.summaries.len() == 1).await;

    // The listing that follows the save is still on its way.
    store.set_delay(Duration::from_millis(200));
    controller.send("Can you help?").await.unwrap();
    let snapshot = settle(&controller).await;
    assert_eq!(snapshot.summaries.len(), 2);
    let newest = &snapshot.summaries[0];
    assert_eq!(
        Some(newest.conversation_id.as_str()),
        snapshot.conversation.conversation_id.as_deref()
    );
    assert_eq!(newest.title, "Can you help?");
    assert_eq!(newest.message_count, 2);
}

#[tokio::test]
async fn test_list_of_previous_topic_is_dropped() {
    let endpoint = ScriptedChatEndpoint::default();
    let store = MemorySessionStore::default();
    store.seed("u-1", "mit", "Essays", vec![Message::user("Hi")]);
    store.set_delay(Duration::from_millis(100));

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller
        .open(Topic::new("stanford", "Stanford"))
        .await
        .unwrap();

    sleep(Duration::from_millis(300)).await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.topic.map(|t| t.id), Some("stanford".to_owned()));
    assert!(snapshot.summaries.is_empty());
}

#[tokio::test]
async fn test_list_failure_keeps_previous_list() {
    let endpoint = ScriptedChatEndpoint::default();
    let store = MemorySessionStore::default();
    let id = store.seed("u-1", "mit", "Essays", vec![Message::user("Hi")]);

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    wait_until(&controller, |s| s.summaries.len() == 1).await;

    store.set_unavailable(true);
    controller.refresh_history().await.unwrap();
    sleep(Duration::from_millis(100)).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.summaries.len(), 1);
    assert_eq!(snapshot.summaries[0].conversation_id, id);
    assert_eq!(snapshot.status, Status::Idle);
}

#[tokio::test]
async fn test_suggestion_scenario() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(
        PresetReply::answer("MIT admits about 4% of applicants.")
            .with_follow_ups(["How can I stand out?", "Is early action binding?"]),
    );
    let store = MemorySessionStore::default();

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    let snapshot = controller.snapshot();
    assert!(snapshot.conversation.messages.is_empty());
    assert_eq!(
        snapshot.suggestions,
        initial_suggestions(Some(FitCategory::Reach))
    );

    controller
        .select_suggestion("What's the acceptance rate?")
        .await
        .unwrap();
    let snapshot = wait_until(&controller, |s| !s.is_pending()).await;
    assert_eq!(
        contents(&snapshot),
        vec![
            (Role::User, "What's the acceptance rate?"),
            (Role::Assistant, "MIT admits about 4% of applicants."),
        ]
    );
    assert!(!snapshot.is_pending());
    assert_eq!(
        snapshot.suggestions,
        vec!["How can I stand out?", "Is early action binding?"]
    );
}

#[tokio::test]
async fn test_server_history_replaces_local() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(PresetReply::answer("One."));
    endpoint.add_reply(
        PresetReply::answer("Two.").with_history(HistoryMode::KeepLast(2)),
    );
    let store = MemorySessionStore::default();

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller.send("First?").await.unwrap();
    wait_until(&controller, |s| !s.is_pending()).await;
    controller.send("Second?").await.unwrap();
    let snapshot = wait_until(&controller, |s| !s.is_pending()).await;

    assert_eq!(
        contents(&snapshot),
        vec![(Role::User, "Second?"), (Role::Assistant, "Two.")]
    );
}

#[tokio::test]
async fn test_retry_after_failure() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(PresetReply::answer("Finally.").with_failures(1));
    let store = MemorySessionStore::default();

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    assert_eq!(controller.retry().await, Err(Rejected::NothingToRetry));

    controller.send("Hello").await.unwrap();
    let snapshot = wait_until(&controller, |s| !s.is_pending()).await;
    assert!(matches!(snapshot.status, Status::Failed(_)));
    assert_eq!(snapshot.conversation.messages.len(), 2);

    controller.retry().await.unwrap();
    let snapshot = settle(&controller).await;
    assert_eq!(
        contents(&snapshot),
        vec![(Role::User, "Hello"), (Role::Assistant, "Finally.")]
    );
    assert_eq!(snapshot.status, Status::Idle);

    let requests = endpoint.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
    assert_eq!(controller.retry().await, Err(Rejected::NothingToRetry));
}

#[tokio::test(start_paused = true)]
async fn test_request_timeout() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(PresetReply::answer("Sorry for the wait."));
    endpoint.set_delay(Duration::from_secs(120));
    let store = MemorySessionStore::default();

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller.send("Hello").await.unwrap();

    let snapshot = controller.wait_for(|s| !s.is_pending()).await.unwrap();
    let Status::Failed(failure) = &snapshot.status else {
        panic!("unexpected status: {:?}", snapshot.status);
    };
    assert_eq!(failure.kind(), ErrorKind::Timeout);
    assert_eq!(
        contents(&snapshot).last(),
        Some(&(Role::Assistant, "The request timed out. Please try again."))
    );

    endpoint.set_delay(Duration::from_millis(10));
    controller.retry().await.unwrap();
    let snapshot = controller.wait_for(|s| !s.is_pending()).await.unwrap();
    assert_eq!(
        contents(&snapshot),
        vec![(Role::User, "Hello"), (Role::Assistant, "Sorry for the wait.")]
    );
}

#[tokio::test]
async fn test_rename_round_trip() {
    let endpoint = ScriptedChatEndpoint::default();
    let store = MemorySessionStore::default();
    let id = store.seed(
        "u-1",
        "mit",
        "Untitled",
        vec![Message::user("Hi"), Message::assistant("Hello!")],
    );

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    wait_until(&controller, |s| s.summaries.len() == 1).await;

    assert_eq!(
        controller.rename(id.clone(), "   ").await,
        Err(Rejected::EmptyInput)
    );
    controller.rename(id.clone(), "My Notes").await.unwrap();
    let snapshot = wait_until(&controller, |s| {
        s.is_settled() && s.summaries.iter().any(|s| s.title == "My Notes")
    })
    .await;
    assert_eq!(snapshot.summaries[0].conversation_id, id);

    let stored = store.get(&id).unwrap();
    assert_eq!(stored.title.as_deref(), Some("My Notes"));
    assert_eq!(stored.messages.len(), 2);
    // The active conversation is untouched.
    assert!(snapshot.conversation.messages.is_empty());
}

#[tokio::test]
async fn test_rename_active_conversation() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(PresetReply::answer("Sure."));
    let store = MemorySessionStore::default();

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller.send("Can you help with my essay?").await.unwrap();
    let snapshot = settle(&controller).await;
    let id = snapshot.conversation.conversation_id.unwrap();

    controller.rename(id.clone(), "Essay plan").await.unwrap();
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.conversation.title.as_deref(), Some("Essay plan"));
    assert_eq!(snapshot.status, Status::Pending(Operation::Renaming));

    wait_until(&controller, |s| {
        s.is_settled() && s.summaries.iter().any(|s| s.title == "Essay plan")
    })
    .await;
    let stored = store.get(&id).unwrap();
    assert_eq!(stored.title.as_deref(), Some("Essay plan"));
    assert_eq!(stored.messages.len(), 2);
}

#[tokio::test]
async fn test_failed_rename_restores_title() {
    let endpoint = ScriptedChatEndpoint::default();
    endpoint.add_reply(PresetReply::answer("Sure."));
    let store = MemorySessionStore::default();

    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();
    controller.send("Can you help with my essay?").await.unwrap();
    let snapshot = settle(&controller).await;
    let id = snapshot.conversation.conversation_id.unwrap();

    store.set_unavailable(true);
    controller.rename(id.clone(), "Essay plan").await.unwrap();
    assert_eq!(
        controller.snapshot().conversation.title.as_deref(),
        Some("Essay plan")
    );

    let snapshot = settle(&controller).await;
    assert_eq!(snapshot.status, Status::Idle);
    assert_eq!(
        snapshot.conversation.title.as_deref(),
        Some("Can you help with my essay?")
    );
    let stored = store.get(&id).unwrap();
    assert_eq!(stored.title.as_deref(), Some("Can you help with my essay?"));
}

#[tokio::test]
async fn test_close_stops_controller() {
    let endpoint = ScriptedChatEndpoint::default();
    let store = MemorySessionStore::default();
    let controller = build(&endpoint, &store);
    controller.open(mit()).await.unwrap();

    controller.close();
    let result = timeout(WAIT, controller.wait_for(|_| false)).await.unwrap();
    assert_eq!(result, Err(Rejected::Stopped));
    assert_eq!(controller.send("Hello").await, Err(Rejected::Stopped));
}
