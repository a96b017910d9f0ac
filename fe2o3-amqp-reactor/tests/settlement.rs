//! Settlement of deliveries under the different settle modes

mod common;

use common::{connect, pump, Recorder};
use fe2o3_amqp_reactor::{
    link::Sendable,
    types::{
        definitions::{self, AmqpError, DeliveryTag, ReceiverSettleMode, SenderSettleMode},
        messaging::DeliveryState,
    },
    Container, ContainerOptions, EventKind, LinkOptions,
};

fn sending_client(messages: &'static [&'static str]) -> (Container, Recorder<DeliveryTag>) {
    let client = Container::default();
    let sent = Recorder::new();
    let recorder = sent.clone();
    client.once(EventKind::Sendable, move |ctx| {
        let sender = ctx.sender_mut().expect("sendable on a sender");
        for body in messages {
            recorder.push(sender.send(*body).expect("credit available"));
        }
    });
    (client, sent)
}

fn manual_server() -> Container {
    Container::new(
        ContainerOptions::builder().receiver_options(LinkOptions::builder().autoaccept(false)),
    )
}

#[test]
fn unsettled_sender_waits_for_an_explicit_accept() {
    let (client, sent) = sending_client(&["settle-me"]);
    let settled = Recorder::new();
    let recorder = settled.clone();
    client.on(EventKind::Settled, move |ctx| {
        recorder.push(ctx.event().delivery_tag().cloned().unwrap());
    });

    let server = manual_server();
    let observed = Recorder::new();
    let recorder = observed.clone();
    server.on(EventKind::Message, move |ctx| {
        let delivery = ctx.delivery().unwrap();
        assert!(ctx.message().unwrap().body == "settle-me");
        recorder.push((
            ctx.event().link_id().unwrap(),
            delivery.tag().clone(),
            delivery.remote_settled(),
        ));
    });

    let (mut a, mut b) = connect(&client, &server);
    a.open_sender(
        LinkOptions::builder()
            .target("queue")
            .sender_settle_mode(SenderSettleMode::Unsettled),
    )
    .unwrap();
    assert!(pump(&mut a, &mut b).is_empty());

    let observed = observed.take();
    assert_eq!(observed.len(), 1);
    let (link, tag, remote_settled) = observed[0].clone();
    assert!(!remote_settled);
    assert_eq!(settled.len(), 0);

    b.link_mut(link)
        .unwrap()
        .delivery_mut(&tag)
        .unwrap()
        .accept();
    assert!(pump(&mut a, &mut b).is_empty());

    assert_eq!(settled.take(), sent.take());
    // The receiver forgets a delivery once it has settled it
    assert!(b.link(link).unwrap().delivery(&tag).is_none());
}

#[test]
fn presettled_sender_settles_at_the_receiver() {
    let (client, _sent) = sending_client(&["fire-and-forget"]);
    let accepted = Recorder::new();
    let recorder = accepted.clone();
    client.on(EventKind::Accepted, move |_| recorder.push(()));
    let client_settled = Recorder::new();
    let recorder = client_settled.clone();
    client.on(EventKind::Settled, move |_| recorder.push(()));

    let server = Container::default();
    let remote_settled = Recorder::new();
    let recorder = remote_settled.clone();
    server.on(EventKind::Message, move |ctx| {
        recorder.push(ctx.delivery().unwrap().remote_settled());
    });
    let server_settled = Recorder::new();
    let recorder = server_settled.clone();
    server.on(EventKind::Settled, move |_| recorder.push(()));

    let (mut a, mut b) = connect(&client, &server);
    let id = a
        .open_sender(
            LinkOptions::builder()
                .target("queue")
                .sender_settle_mode(SenderSettleMode::Settled),
        )
        .unwrap()
        .id();
    assert!(pump(&mut a, &mut b).is_empty());

    assert_eq!(remote_settled.take(), vec![true]);
    assert_eq!(server_settled.len(), 1);
    assert_eq!(accepted.len(), 0);
    assert_eq!(client_settled.len(), 0);
    assert_eq!(a.link(id).unwrap().deliveries().count(), 0);
}

#[test]
fn mixed_mode_uses_the_per_message_override() {
    let client = Container::default();
    client.once(EventKind::Sendable, |ctx| {
        let sender = ctx.sender_mut().unwrap();
        sender
            .send(Sendable::builder().message("settled").settled(true))
            .unwrap();
        sender.send("unsettled").unwrap();
    });

    let server = manual_server();
    let observed = Recorder::new();
    let recorder = observed.clone();
    server.on(EventKind::Message, move |ctx| {
        recorder.push(ctx.delivery().unwrap().remote_settled());
    });

    let (mut a, mut b) = connect(&client, &server);
    a.open_sender("queue").unwrap();
    assert!(pump(&mut a, &mut b).is_empty());

    assert_eq!(observed.take(), vec![true, false]);
}

#[test]
fn second_mode_keeps_the_sender_unsettled_until_the_receiver_settles() {
    let (client, sent) = sending_client(&["twice"]);
    let settled = Recorder::new();
    let recorder = settled.clone();
    client.on(EventKind::Settled, move |_| recorder.push(()));

    let server = Container::default();
    let received = Recorder::new();
    let recorder = received.clone();
    server.on(EventKind::Message, move |ctx| {
        recorder.push((
            ctx.event().link_id().unwrap(),
            ctx.event().delivery_tag().cloned().unwrap(),
        ));
    });

    let (mut a, mut b) = connect(&client, &server);
    let id = a
        .open_sender(
            LinkOptions::builder()
                .target("queue")
                .sender_settle_mode(SenderSettleMode::Unsettled)
                .receiver_settle_mode(ReceiverSettleMode::Second),
        )
        .unwrap()
        .id();
    assert!(pump(&mut a, &mut b).is_empty());

    // Auto-accepted without settling
    let tag = sent.take().pop().unwrap();
    let delivery = a.link(id).unwrap().delivery(&tag).unwrap();
    assert!(!delivery.remote_settled());
    assert!(delivery.remote_state().map(|s| s.is_accepted()).unwrap_or(false));
    assert_eq!(settled.len(), 0);

    let (link, rtag) = received.take().pop().unwrap();
    let incoming = b.link_mut(link).unwrap().delivery_mut(&rtag).unwrap();
    assert!(!incoming.local_settled());
    incoming.update(true, None);
    assert!(pump(&mut a, &mut b).is_empty());

    assert_eq!(settled.len(), 1);
    assert!(a.link(id).unwrap().delivery(&tag).is_none());
}

#[test]
fn acknowledgements_may_arrive_out_of_order() {
    let (client, sent) = sending_client(&["one", "two", "three"]);
    let settled = Recorder::new();
    let recorder = settled.clone();
    client.on(EventKind::Settled, move |ctx| {
        recorder.push(ctx.delivery().unwrap().tag().clone());
    });

    let server = manual_server();
    let received = Recorder::new();
    let recorder = received.clone();
    server.on(EventKind::Message, move |ctx| {
        recorder.push((
            ctx.event().link_id().unwrap(),
            ctx.event().delivery_tag().cloned().unwrap(),
        ));
    });

    let (mut a, mut b) = connect(&client, &server);
    a.open_sender("queue").unwrap();
    assert!(pump(&mut a, &mut b).is_empty());

    let sent = sent.take();
    let received = received.take();
    assert_eq!(received.len(), 3);

    for index in [2, 0, 1] {
        let (link, tag) = &received[index];
        b.link_mut(*link)
            .unwrap()
            .delivery_mut(tag)
            .unwrap()
            .accept();
        assert!(pump(&mut a, &mut b).is_empty());
    }

    assert_eq!(
        settled.take(),
        vec![sent[2].clone(), sent[0].clone(), sent[1].clone()]
    );
}

#[test]
fn rejection_reaches_the_sender_with_its_error() {
    let (client, _sent) = sending_client(&["poison"]);
    let rejected = Recorder::new();
    let recorder = rejected.clone();
    client.on(EventKind::Rejected, move |ctx| {
        let state = ctx.delivery().unwrap().remote_state().cloned();
        recorder.push(state);
    });
    let accepted = Recorder::new();
    let recorder = accepted.clone();
    client.on(EventKind::Accepted, move |_| recorder.push(()));

    let server = Container::default();
    server.on(EventKind::Message, |ctx| {
        let error = definitions::Error::new(
            AmqpError::DecodeError,
            "cannot parse".to_string(),
            None,
        );
        ctx.delivery_mut().unwrap().reject(error);
    });

    let (mut a, mut b) = connect(&client, &server);
    a.open_sender("queue").unwrap();
    assert!(pump(&mut a, &mut b).is_empty());

    assert_eq!(accepted.len(), 0);
    let states = rejected.take();
    assert_eq!(states.len(), 1);
    match &states[0] {
        Some(DeliveryState::Rejected(rejected)) => {
            let error = rejected.error.as_ref().unwrap();
            assert_eq!(error.condition, "amqp:decode-error");
            assert_eq!(error.description.as_deref(), Some("cannot parse"));
        }
        other => panic!("expected rejected, found {:?}", other),
    }
}

#[test]
fn released_and_modified_fire_their_own_events() {
    let (client, _sent) = sending_client(&["a", "b"]);
    let outcomes = Recorder::new();
    for kind in [EventKind::Released, EventKind::Modified, EventKind::Accepted] {
        let recorder = outcomes.clone();
        client.on(kind, move |ctx| recorder.push(ctx.kind()));
    }

    let server = Container::default();
    server.on(EventKind::Message, |ctx| {
        let body_is_a = ctx.message().unwrap().body == "a";
        let delivery = ctx.delivery_mut().unwrap();
        if body_is_a {
            delivery.release();
        } else {
            delivery.modify(true, false);
        }
    });

    let (mut a, mut b) = connect(&client, &server);
    a.open_sender("queue").unwrap();
    assert!(pump(&mut a, &mut b).is_empty());

    assert_eq!(
        outcomes.take(),
        vec![EventKind::Released, EventKind::Modified]
    );
}

#[test]
fn settled_fires_once_per_delivery_in_every_mode_combination() {
    use ReceiverSettleMode::{First, Second};
    use SenderSettleMode::{Mixed, Settled, Unsettled};

    let modes = [
        (Unsettled, First),
        (Unsettled, Second),
        (Settled, First),
        (Settled, Second),
        (Mixed, First),
        (Mixed, Second),
    ];
    for (snd, rcv) in modes {
        let (client, sent) = sending_client(&["one", "two"]);
        let client_settled = Recorder::new();
        let recorder = client_settled.clone();
        client.on(EventKind::Settled, move |_| recorder.push(()));

        let server = Container::default();
        let received = Recorder::new();
        let recorder = received.clone();
        server.on(EventKind::Message, move |ctx| {
            recorder.push((
                ctx.event().link_id().unwrap(),
                ctx.event().delivery_tag().cloned().unwrap(),
            ));
        });
        let server_settled = Recorder::new();
        let recorder = server_settled.clone();
        server.on(EventKind::Settled, move |_| recorder.push(()));

        let (mut a, mut b) = connect(&client, &server);
        let id = a
            .open_sender(
                LinkOptions::builder()
                    .target("queue")
                    .sender_settle_mode(snd)
                    .receiver_settle_mode(rcv),
            )
            .unwrap()
            .id();
        assert!(pump(&mut a, &mut b).is_empty());

        let received = received.take();
        assert_eq!(received.len(), 2, "{:?} {:?}", snd, rcv);
        // Auto-accept leaves settling to the application in mode second
        if rcv == Second && snd != Settled {
            for (link, tag) in &received {
                b.link_mut(*link)
                    .unwrap()
                    .delivery_mut(tag)
                    .unwrap()
                    .update(true, None);
            }
            assert!(pump(&mut a, &mut b).is_empty());
        }

        assert_eq!(sent.len(), 2);
        assert_eq!(
            client_settled.len() + server_settled.len(),
            2,
            "{:?} {:?}",
            snd,
            rcv
        );
        assert_eq!(a.link(id).unwrap().deliveries().count(), 0, "{:?} {:?}", snd, rcv);
        let (receiver, _) = received[0];
        assert_eq!(b.link(receiver).unwrap().deliveries().count(), 0, "{:?} {:?}", snd, rcv);
    }
}
