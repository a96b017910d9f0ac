//! Connections driven by their own tasks over the in-memory transport

use std::time::Duration;

use fe2o3_amqp_reactor::{
    connection::Error,
    transport::memory,
    types::{
        definitions::{self, LinkError},
        frame::FrameBody,
    },
    Container, ConnectionOptions, EventKind,
};
use futures_util::StreamExt;
use tokio::{sync::mpsc, time::timeout};
use tokio_test::{assert_err, assert_ok};

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn message_crosses_the_transport_and_the_sender_closes() {
    let server = Container::default();
    let (tx, mut rx) = mpsc::unbounded_channel();
    server.on(EventKind::Message, move |ctx| {
        if let Some(message) = ctx.message() {
            let _ = tx.send(message.body.clone());
        }
    });
    let (connector, acceptor) = memory::listener();
    let listener = server.listen(acceptor, ConnectionOptions::default());

    let client = Container::default();
    client.once(EventKind::Sendable, |ctx| {
        ctx.sender_mut().unwrap().send("hello").unwrap();
    });
    client.on(EventKind::Accepted, |ctx| {
        ctx.connection_mut().close(None);
    });

    let transport = connector.connect().await.unwrap();
    let mut connection = client.connect(ConnectionOptions::default());
    connection.open_sender("queue").unwrap();
    let mut handle = client.spawn(connection, transport);

    let body = timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert!(body == "hello");

    let result = timeout(TIMEOUT, handle.join()).await.unwrap();
    assert_ok!(result);
    listener.close();
}

#[tokio::test]
async fn handle_executes_and_closes() {
    let server = Container::default();
    let (tx, mut rx) = mpsc::unbounded_channel();
    server.on(EventKind::ReceiverOpen, move |ctx| {
        let name = ctx.receiver().map(|l| l.name().to_string());
        let _ = tx.send(name);
    });
    let (connector, acceptor) = memory::listener();
    let listener = server.listen(acceptor, ConnectionOptions::default());

    let client = Container::default();
    let transport = connector.connect().await.unwrap();
    let mut handle = client.spawn(client.connect(ConnectionOptions::default()), transport);
    assert_eq!(client.connection_count(), 1);

    assert_ok!(
        handle
            .execute(|connection| {
                connection
                    .open_sender(
                        fe2o3_amqp_reactor::LinkOptions::builder()
                            .name("from-handle")
                            .target("queue"),
                    )
                    .unwrap();
            })
            .await
    );
    let name = timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(name.as_deref(), Some("from-handle"));

    let result = timeout(TIMEOUT, handle.close(None)).await.unwrap();
    assert_ok!(result);
    assert!(handle.is_closed());
    assert_eq!(client.connection_count(), 0);
    listener.close();
}

#[tokio::test]
async fn unhandled_error_stops_the_event_loop() {
    let server = Container::default();
    server.on(EventKind::SenderOpen, |ctx| {
        let error = definitions::Error::new(LinkError::DetachForced, None, None);
        ctx.sender_mut().unwrap().close(error);
    });
    let (connector, acceptor) = memory::listener();
    let listener = server.listen(acceptor, ConnectionOptions::default());

    let client = Container::default();
    let transport = connector.connect().await.unwrap();
    let mut connection = client.connect(ConnectionOptions::default());
    connection.open_receiver("queue").unwrap();
    let mut handle = client.spawn(connection, transport);

    let result = timeout(TIMEOUT, handle.join()).await.unwrap();
    let err = assert_err!(result);
    match err {
        Error::Unhandled(error) => assert_eq!(error.condition, "amqp:link:detach-forced"),
        other => panic!("expected an unhandled error, found {:?}", other),
    }
    listener.close();
}

#[tokio::test]
async fn dropped_transport_disconnects() {
    let client = Container::default();
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on(EventKind::Disconnected, move |ctx| {
        let _ = tx.send(ctx.connection().is_closed());
    });

    let (local, mut remote) = memory::pair();
    let mut handle = client.spawn(client.connect(ConnectionOptions::default()), local);

    let frame = timeout(TIMEOUT, remote.next()).await.unwrap().unwrap();
    assert!(matches!(assert_ok!(frame).body, FrameBody::Open(_)));
    drop(remote);

    assert_eq!(timeout(TIMEOUT, rx.recv()).await.unwrap(), Some(true));
    let result = timeout(TIMEOUT, handle.join()).await.unwrap();
    assert_ok!(result);
}
