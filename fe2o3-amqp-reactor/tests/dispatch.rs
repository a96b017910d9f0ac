//! Handler resolution, error escalation and protocol errors

mod common;

use common::{connect, pump, Recorder};
use fe2o3_amqp_reactor::{
    connection::Error,
    types::{
        definitions::{self, AmqpError, LinkError},
        frame::{Frame, FrameBody},
        performatives::{Begin, Flow, Open},
        states::ConnectionState,
    },
    Container, ConnectionOptions, EventKind,
};

fn detach_forced() -> definitions::Error {
    definitions::Error::new(
        LinkError::DetachForced,
        "no consumers allowed".to_string(),
        None,
    )
}

/// A server that closes every sender the peer asks for with [`detach_forced`]
fn refusing_server() -> Container {
    let server = Container::default();
    server.on(EventKind::SenderOpen, |ctx| {
        ctx.sender_mut().unwrap().close(detach_forced());
    });
    server
}

#[test]
fn most_specific_scope_wins() {
    let client = Container::default();
    let fired = Recorder::new();
    let recorder = fired.clone();
    client.on(EventKind::SenderOpen, move |_| recorder.push("container"));

    let server = Container::default();
    let (mut a, mut b) = connect(&client, &server);

    let recorder = fired.clone();
    a.on(EventKind::SenderOpen, move |_| recorder.push("connection"));
    let recorder = fired.clone();
    let link = a
        .open_sender("queue")
        .unwrap()
        .on(EventKind::SenderOpen, move |_| recorder.push("link"))
        .id();
    let recorder = fired.clone();
    a.session_mut(link.session)
        .unwrap()
        .on(EventKind::SenderOpen, move |_| recorder.push("session"));

    assert!(pump(&mut a, &mut b).is_empty());
    assert_eq!(fired.take(), vec!["link"]);
}

#[test]
fn unhandled_scopes_fall_through_to_the_container() {
    let client = Container::default();
    let fired = Recorder::new();
    let recorder = fired.clone();
    client.on(EventKind::SenderOpen, move |ctx| {
        recorder.push(ctx.sender().unwrap().name().to_string())
    });
    let server = Container::default();

    let (mut a, mut b) = connect(&client, &server);
    a.open_sender(
        fe2o3_amqp_reactor::LinkOptions::builder()
            .name("first")
            .target("queue"),
    )
    .unwrap();
    assert!(pump(&mut a, &mut b).is_empty());

    // A second connection of the same container reaches the same handler
    let (mut c, mut d) = connect(&client, &server);
    c.open_sender(
        fe2o3_amqp_reactor::LinkOptions::builder()
            .name("second")
            .target("queue"),
    )
    .unwrap();
    assert!(pump(&mut c, &mut d).is_empty());

    assert_eq!(fired.take(), vec!["first", "second"]);
}

#[test]
fn all_handlers_of_a_scope_fire_and_once_handlers_fire_once() {
    let client = Container::default();
    let server = Container::default();
    let fired = Recorder::new();

    let (mut a, mut b) = connect(&client, &server);
    let recorder = fired.clone();
    a.on(EventKind::SessionOpen, move |_| recorder.push("on"));
    let recorder = fired.clone();
    a.once(EventKind::SessionOpen, move |_| recorder.push("once"));

    a.open_session().unwrap();
    a.open_session().unwrap();
    assert!(pump(&mut a, &mut b).is_empty());

    assert_eq!(fired.take(), vec!["on", "once", "on"]);
}

#[test]
fn link_error_fires_before_close_with_the_peer_error() {
    let client = Container::default();
    let server = refusing_server();
    let fired = Recorder::new();

    let (mut a, mut b) = connect(&client, &server);
    let recorder = fired.clone();
    a.on(EventKind::ReceiverError, move |ctx| {
        recorder.push((ctx.kind(), ctx.error().cloned()))
    });
    let recorder = fired.clone();
    a.on(EventKind::ReceiverClose, move |ctx| {
        let error = ctx.receiver().unwrap().error().cloned();
        recorder.push((ctx.kind(), error))
    });

    let id = a.open_receiver("queue").unwrap().id();
    assert!(pump(&mut a, &mut b).is_empty());

    let fired = fired.take();
    assert_eq!(fired.len(), 2);
    assert_eq!(fired[0].0, EventKind::ReceiverError);
    assert_eq!(fired[1].0, EventKind::ReceiverClose);
    for (_, error) in &fired {
        let error = error.as_ref().unwrap();
        assert_eq!(error.condition, "amqp:link:detach-forced");
        assert_eq!(error.description.as_deref(), Some("no consumers allowed"));
    }
    assert!(a.fatal_error().is_none());
    assert!(a.is_open());
    // Detached on both ends and forgotten
    assert!(a.link(id).is_none());
}

#[test]
fn unhandled_link_error_escalates_to_the_container_error_handler() {
    let client = Container::default();
    let escalated = Recorder::new();
    let recorder = escalated.clone();
    client.on(EventKind::Error, move |ctx| {
        recorder.push((ctx.kind(), ctx.error().cloned()));
    });
    let server = refusing_server();

    let (mut a, mut b) = connect(&client, &server);
    a.open_receiver("queue").unwrap();
    assert!(pump(&mut a, &mut b).is_empty());

    let escalated = escalated.take();
    assert_eq!(escalated.len(), 1);
    assert_eq!(escalated[0].0, EventKind::Error);
    assert_eq!(escalated[0].1, Some(detach_forced()));
    assert!(a.fatal_error().is_none());
    assert!(a.is_open());
}

#[test]
fn unhandled_error_is_fatal_to_its_connection_only() {
    let client = Container::default();
    let server = refusing_server();

    let (mut a, mut b) = connect(&client, &server);
    let (mut c, mut d) = connect(&client, &server);
    assert!(pump(&mut c, &mut d).is_empty());

    a.open_receiver("queue").unwrap();
    pump(&mut a, &mut b);

    assert_eq!(a.fatal_error(), Some(&detach_forced()));
    assert!(a.is_closed());
    assert!(b.is_closed());
    assert_eq!(a.local().close.error, Some(detach_forced()));

    assert!(c.is_open());
    assert!(d.is_open());
}

#[test]
fn closing_with_an_error_fails_pending_endpoints() {
    let client = Container::default();
    let server = Container::default();
    let fired = Recorder::new();

    let (mut a, mut b) = connect(&client, &server);
    for kind in [EventKind::SenderError, EventKind::SessionError] {
        let recorder = fired.clone();
        a.on(kind, move |ctx| recorder.push((ctx.kind(), ctx.error().cloned())));
    }

    a.open_sender("queue").unwrap();
    let error = definitions::Error::new(AmqpError::ResourceDeleted, None, None);
    a.close(error.clone());
    pump(&mut a, &mut b);

    let fired = fired.take();
    assert_eq!(
        fired,
        vec![
            (EventKind::SenderError, Some(error.clone())),
            (EventKind::SessionError, Some(error)),
        ]
    );
    assert!(a.is_closed());
}

#[test]
fn clean_close_raises_no_errors() {
    let client = Container::default();
    let errors = Recorder::new();
    let recorder = errors.clone();
    client.on(EventKind::Error, move |ctx| recorder.push(ctx.kind()));
    let closed = Recorder::new();
    let recorder = closed.clone();
    client.on(EventKind::ConnectionClose, move |ctx| {
        recorder.push(ctx.error().is_none())
    });
    let server = Container::default();

    let (mut a, mut b) = connect(&client, &server);
    a.open_sender("queue").unwrap();
    assert!(pump(&mut a, &mut b).is_empty());

    a.close(None);
    assert!(pump(&mut a, &mut b).is_empty());

    assert_eq!(errors.len(), 0);
    assert_eq!(closed.take(), vec![true]);
    assert_eq!(a.state(), ConnectionState::End);
    assert_eq!(b.state(), ConnectionState::End);
}

#[test]
fn session_close_reaches_the_peer() {
    let client = Container::default();
    let server = Container::default();
    let fired = Recorder::new();
    let recorder = fired.clone();
    server.on(EventKind::SessionClose, move |ctx| {
        recorder.push(ctx.session().map(|s| s.is_closed()))
    });

    let (mut a, mut b) = connect(&client, &server);
    let link = a.open_sender("queue").unwrap().id();
    assert!(pump(&mut a, &mut b).is_empty());

    a.session_mut(link.session).unwrap().close(None);
    assert!(pump(&mut a, &mut b).is_empty());

    assert_eq!(fired.take(), vec![Some(false)]);
    assert!(a.session(link.session).is_none());
    assert!(a.is_open());
    // A new link goes to a new session
    let next = a.open_sender("queue").unwrap().id();
    assert_ne!(next.session, link.session);
}

#[test]
fn frames_on_unknown_channels_close_the_connection() {
    let server = Container::default();
    let mut b = server.accept(ConnectionOptions::default());
    b.handle_frame(Frame::new(0u16, Open::default())).unwrap();

    let err = b.handle_frame(Frame::new(5u16, Flow::default())).unwrap_err();
    match err {
        Error::Protocol(error) => assert_eq!(error.condition, "amqp:not-allowed"),
        other => panic!("expected a protocol error, found {:?}", other),
    }

    let frames = b.drain_frames();
    assert!(matches!(frames[0].body, FrameBody::Open(_)));
    match &frames[1].body {
        FrameBody::Close(close) => assert_eq!(
            close.error.as_ref().map(|e| e.condition.as_str()),
            Some("amqp:not-allowed")
        ),
        other => panic!("expected close, found {:?}", other),
    }
    assert_eq!(b.state(), ConnectionState::Discarding);
}

#[test]
fn frames_before_open_are_illegal() {
    let server = Container::default();
    let mut b = server.accept(ConnectionOptions::default());

    let err = b.handle_frame(Frame::new(0u16, Begin::default())).unwrap_err();
    assert!(
        matches!(err, Error::Protocol(ref error) if error.condition == "amqp:illegal-state")
    );
    let frames = b.drain_frames();
    assert_eq!(frames.len(), 2);
    assert!(matches!(frames[1].body, FrameBody::Close(_)));
}
