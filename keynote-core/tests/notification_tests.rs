//! End-to-end delivery of keyspace notifications through the in-memory broker

use keynote_core::testing::{
    channel_dispatcher, collect_messages, create_test_config, next_message_within,
    pattern_messages, MemoryBroker, MemoryTransport, TEST_URI_KEY,
};
use keynote_core::{KeyspaceEntrypoint, Message, Subscription};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

const TIMEOUT: Duration = Duration::from_millis(200);
const QUIET: Duration = Duration::from_millis(50);

type TestEntrypoint = KeyspaceEntrypoint<MemoryTransport, UnboundedSender<Message>>;

/// Start a listener for `subscription` and consume its acknowledgements
async fn listen(
    broker: &MemoryBroker,
    subscription: Subscription,
) -> (TestEntrypoint, UnboundedReceiver<Message>, Vec<Message>) {
    let config = create_test_config(Some("KEA"), 2.0);
    let setup = subscription.setup(&config).unwrap();
    // unresolved databases become the single database of the URI
    let expected_acks = match setup.spec.databases() {
        Some(databases) => databases.len() * (setup.spec.events().len() + setup.spec.keys().len()),
        None => setup.spec.events().len() + setup.spec.keys().len(),
    };
    let (tx, mut rx) = channel_dispatcher();
    let mut entrypoint = KeyspaceEntrypoint::from_setup(broker.transport(), setup, tx);
    entrypoint.start();

    let acks = collect_messages(&mut rx, expected_acks, TIMEOUT).await;
    (entrypoint, rx, acks)
}

fn ack(channel: &str, count: u64) -> Message {
    Message::subscribe_ack(channel, count)
}

mod listen_all {
    use super::*;

    fn subscription() -> Subscription {
        Subscription::new(TEST_URI_KEY)
            .events("*")
            .keys("*")
            .database_selectors("*")
            .unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_acknowledgements() {
        let broker = MemoryBroker::new();
        let (mut entrypoint, _rx, acks) = listen(&broker, subscription()).await;

        assert_eq!(
            acks,
            vec![ack("__keyevent@*__:*", 1), ack("__keyspace@*__:*", 2)]
        );
        entrypoint.stop().await;
    }

    #[tokio::test]
    async fn test_simple_events() {
        let broker = MemoryBroker::new();
        let (mut entrypoint, mut rx, _) = listen(&broker, subscription()).await;

        for event in ["set", "hset"] {
            broker.notify(0, event, "foo");
            let messages = collect_messages(&mut rx, 2, TIMEOUT).await;
            assert_eq!(
                messages,
                vec![
                    Message::pattern_message("__keyspace@*__:*", "__keyspace@0__:foo", event),
                    Message::pattern_message(
                        "__keyevent@*__:*",
                        format!("__keyevent@0__:{}", event),
                        "foo"
                    ),
                ]
            );
        }
        entrypoint.stop().await;
    }

    #[tokio::test]
    async fn test_expire_then_expired() {
        let broker = MemoryBroker::new();
        let (mut entrypoint, mut rx, _) = listen(&broker, subscription()).await;

        broker.expire(0, "foo");
        broker.expired(0, "foo");
        let messages = collect_messages(&mut rx, 4, TIMEOUT).await;
        let events: Vec<_> = messages.iter().filter_map(Message::event).collect();
        assert_eq!(events, vec!["expire", "expire", "expired", "expired"]);
        assert!(messages.iter().all(|m| m.key() == Some("foo")));

        entrypoint.stop().await;
    }
}

mod listen_events {
    use super::*;

    #[tokio::test]
    async fn test_set_on_default_database() {
        let broker = MemoryBroker::new();
        let (mut entrypoint, mut rx, acks) = listen(
            &broker,
            Subscription::new(TEST_URI_KEY).events("set").databases([0u32]),
        )
        .await;
        assert_eq!(acks, vec![ack("__keyevent@0__:set", 1)]);

        broker.set(0, "foo");
        assert_eq!(
            next_message_within(&mut rx, TIMEOUT).await,
            Some(Message::pattern_message(
                "__keyevent@0__:set",
                "__keyevent@0__:set",
                "foo"
            ))
        );
        entrypoint.stop().await;
    }

    #[tokio::test]
    async fn test_multiple_events() {
        let broker = MemoryBroker::new();
        let (mut entrypoint, mut rx, acks) = listen(
            &broker,
            Subscription::new(TEST_URI_KEY).events(["set", "hset"]),
        )
        .await;
        assert_eq!(
            acks,
            vec![ack("__keyevent@0__:set", 1), ack("__keyevent@0__:hset", 2)]
        );

        broker.set(0, "foo");
        broker.hset(0, "one");
        let messages = collect_messages(&mut rx, 2, TIMEOUT).await;
        assert_eq!(
            messages,
            vec![
                Message::pattern_message("__keyevent@0__:set", "__keyevent@0__:set", "foo"),
                Message::pattern_message("__keyevent@0__:hset", "__keyevent@0__:hset", "one"),
            ]
        );
        entrypoint.stop().await;
    }

    #[tokio::test]
    async fn test_ignores_other_events() {
        let broker = MemoryBroker::new();
        let (mut entrypoint, mut rx, _) =
            listen(&broker, Subscription::new(TEST_URI_KEY).events("hset")).await;

        broker.set(0, "foo");
        assert_eq!(next_message_within(&mut rx, QUIET).await, None);
        entrypoint.stop().await;
    }
}

mod listen_keys {
    use super::*;

    #[tokio::test]
    async fn test_multiple_keys() {
        let broker = MemoryBroker::new();
        let (mut entrypoint, mut rx, acks) =
            listen(&broker, Subscription::new(TEST_URI_KEY).keys(["foo", "bar"])).await;
        assert_eq!(
            acks,
            vec![ack("__keyspace@0__:foo", 1), ack("__keyspace@0__:bar", 2)]
        );

        broker.set(0, "foo");
        broker.del(0, "bar");
        broker.set(0, "baz");
        let messages = collect_messages(&mut rx, 3, QUIET).await;
        assert_eq!(
            messages,
            vec![
                Message::pattern_message("__keyspace@0__:foo", "__keyspace@0__:foo", "set"),
                Message::pattern_message("__keyspace@0__:bar", "__keyspace@0__:bar", "del"),
            ]
        );
        entrypoint.stop().await;
    }

    #[tokio::test]
    async fn test_key_patterns() {
        let broker = MemoryBroker::new();
        let (mut entrypoint, mut rx, _) =
            listen(&broker, Subscription::new(TEST_URI_KEY).keys("user:*")).await;

        broker.set(0, "user:42");
        broker.set(0, "session:42");
        let messages = collect_messages(&mut rx, 2, QUIET).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].key(), Some("user:42"));
        entrypoint.stop().await;
    }
}

mod listen_databases {
    use super::*;

    #[tokio::test]
    async fn test_database_from_uri() {
        let broker = MemoryBroker::new();
        let mut config = create_test_config(None, 2.0);
        config
            .redis_uris
            .insert(TEST_URI_KEY.to_string(), "redis://localhost:6379/3".to_string());
        let setup = Subscription::new(TEST_URI_KEY)
            .events("*")
            .keys("*")
            .setup(&config)
            .unwrap();
        let (tx, mut rx) = channel_dispatcher();
        let mut entrypoint = KeyspaceEntrypoint::from_setup(broker.transport(), setup, tx);
        entrypoint.start();

        assert_eq!(
            collect_messages(&mut rx, 2, TIMEOUT).await,
            vec![ack("__keyevent@3__:*", 1), ack("__keyspace@3__:*", 2)]
        );
        entrypoint.stop().await;
    }

    #[tokio::test]
    async fn test_explicit_database() {
        let broker = MemoryBroker::new();
        let (mut entrypoint, mut rx, acks) = listen(
            &broker,
            Subscription::new(TEST_URI_KEY).events("*").keys("*").databases([1u32]),
        )
        .await;
        assert_eq!(
            acks,
            vec![ack("__keyevent@1__:*", 1), ack("__keyspace@1__:*", 2)]
        );

        broker.set(1, "foo");
        assert_eq!(
            collect_messages(&mut rx, 2, TIMEOUT).await,
            vec![
                Message::pattern_message("__keyspace@1__:*", "__keyspace@1__:foo", "set"),
                Message::pattern_message("__keyevent@1__:*", "__keyevent@1__:set", "foo"),
            ]
        );
        entrypoint.stop().await;
    }

    #[tokio::test]
    async fn test_ignores_other_databases() {
        let broker = MemoryBroker::new();
        let (mut entrypoint, mut rx, _) = listen(
            &broker,
            Subscription::new(TEST_URI_KEY).events("*").keys("*").databases([0u32]),
        )
        .await;

        broker.set(1, "foo");
        assert_eq!(next_message_within(&mut rx, QUIET).await, None);
        entrypoint.stop().await;
    }

    #[tokio::test]
    async fn test_each_database_matches_its_own_pattern() {
        let broker = MemoryBroker::new();
        let (mut entrypoint, mut rx, acks) = listen(
            &broker,
            Subscription::new(TEST_URI_KEY).keys("foo").databases([0u32, 1]),
        )
        .await;
        assert_eq!(
            acks,
            vec![ack("__keyspace@0__:foo", 1), ack("__keyspace@1__:foo", 2)]
        );

        broker.set(1, "foo");
        let messages = collect_messages(&mut rx, 2, QUIET).await;
        assert_eq!(
            messages,
            vec![Message::pattern_message(
                "__keyspace@1__:foo",
                "__keyspace@1__:foo",
                "set"
            )]
        );
        assert_eq!(messages[0].channel_info().map(|info| info.database), Some(1));
        entrypoint.stop().await;
    }
}

#[tokio::test]
async fn test_notifications_need_server_setting() {
    let broker = MemoryBroker::new();
    let config = create_test_config(None, 2.0);
    let setup = Subscription::new(TEST_URI_KEY)
        .events("*")
        .setup(&config)
        .unwrap();
    let (tx, mut rx) = channel_dispatcher();
    let mut entrypoint = KeyspaceEntrypoint::from_setup(broker.transport(), setup, tx);
    entrypoint.start();
    next_message_within(&mut rx, TIMEOUT).await.unwrap();

    broker.set(0, "foo");
    assert_eq!(next_message_within(&mut rx, QUIET).await, None);
    assert!(broker.config_log().is_empty());
    entrypoint.stop().await;
}

#[tokio::test]
async fn test_bound_handler_receives_messages() {
    let broker = MemoryBroker::new();
    let config = create_test_config(Some("KEA"), 2.0);
    let (tx, mut rx) = channel_dispatcher();

    let mut entrypoint = Subscription::new(TEST_URI_KEY)
        .events("del")
        .bind(&config, broker.transport(), move |message: Message| {
            let tx = tx.clone();
            async move {
                tx.send(message)?;
                Ok::<(), anyhow::Error>(())
            }
        })
        .unwrap();
    entrypoint.start();

    assert_eq!(
        next_message_within(&mut rx, TIMEOUT).await,
        Some(ack("__keyevent@0__:del", 1))
    );
    broker.del(0, "foo");
    let messages = collect_messages(&mut rx, 1, TIMEOUT).await;
    assert_eq!(pattern_messages(&messages).len(), 1);
    assert_eq!(messages[0].key(), Some("foo"));

    entrypoint.stop().await;
}
