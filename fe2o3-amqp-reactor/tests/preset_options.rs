//! Preset link options of containers and connections, and credit

mod common;

use std::sync::Arc;

use common::{connect, pump, Recorder};
use fe2o3_amqp_reactor::{
    types::primitives::{Multiple, Symbol},
    Container, ContainerOptions, ConnectionOptions, EventKind, LinkOptions,
};

#[test]
fn preset_applies_to_every_sender() {
    let client = Container::new(
        ContainerOptions::builder().sender_options(LinkOptions::builder().offered_capabilities("xyz")),
    );
    let server = Container::default();
    let seen = Recorder::new();
    let recorder = seen.clone();
    server.on(EventKind::ReceiverOpen, move |ctx| {
        let link = ctx.receiver().unwrap();
        recorder.push((link.name().to_string(), link.offered_capabilities().cloned()));
    });

    let (mut a, mut b) = connect(&client, &server);
    a.open_sender(()).unwrap();
    a.open_sender(()).unwrap();
    assert!(pump(&mut a, &mut b).is_empty());

    let seen = seen.take();
    assert_eq!(seen.len(), 2);
    assert_ne!(seen[0].0, seen[1].0);
    for (_, offered) in &seen {
        assert_eq!(offered.as_ref(), Some(&Multiple::from(Symbol::from("xyz"))));
    }
}

#[test]
fn overrides_win_and_properties_merge() {
    let preset = LinkOptions::builder()
        .add_property("shared", "preset")
        .add_property("preset-only", 1i64)
        .max_message_size(10)
        .build();
    let client = Container::new(ContainerOptions::builder().sender_options(preset.clone()));
    let server = Container::default();
    let seen = Recorder::new();
    let recorder = seen.clone();
    server.on(EventKind::ReceiverOpen, move |ctx| {
        let link = ctx.receiver().unwrap();
        recorder.push((link.properties().cloned().unwrap(), link.max_message_size()));
    });

    let (mut a, mut b) = connect(&client, &server);
    a.open_sender(
        LinkOptions::builder()
            .target("queue")
            .add_property("shared", "override")
            .add_property("override-only", true),
    )
    .unwrap();
    assert!(pump(&mut a, &mut b).is_empty());

    let (properties, max_message_size) = seen.take().pop().unwrap();
    assert_eq!(properties.len(), 3);
    assert!(properties["shared"] == "override");
    assert!(properties["preset-only"] == 1i64);
    assert!(properties["override-only"] == true);
    assert_eq!(max_message_size, Some(10));

    // The stored preset is untouched
    assert_eq!(
        client.options().sender_options.as_deref(),
        Some(&preset)
    );
    assert_eq!(a.options().sender_options.as_deref(), Some(&preset));
}

#[test]
fn opening_a_link_inside_a_handler_leaves_the_preset_alone() {
    let client = Container::new(
        ContainerOptions::builder().sender_options(LinkOptions::builder().target("foo")),
    );
    let names = Recorder::new();
    let recorder = names.clone();
    client.once(EventKind::SenderOpen, move |ctx| {
        let first = ctx.sender().unwrap();
        recorder.push(first.name().to_string());
        let second = ctx
            .connection_mut()
            .open_sender(LinkOptions::builder().target("bar"))
            .unwrap();
        recorder.push(second.name().to_string());
        recorder.push(
            second
                .local()
                .attach
                .target
                .as_ref()
                .and_then(|t| t.address.clone())
                .unwrap(),
        );
    });
    let server = Container::default();

    let (mut a, mut b) = connect(&client, &server);
    a.open_sender(()).unwrap();
    assert!(pump(&mut a, &mut b).is_empty());

    let names = names.take();
    assert_eq!(names.len(), 3);
    assert_ne!(names[0], names[1]);
    assert_eq!(names[2], "bar");
    let preset_target = client
        .options()
        .sender_options
        .as_ref()
        .and_then(|o| o.target.as_ref())
        .and_then(|t| t.address.as_deref());
    assert_eq!(preset_target, Some("foo"));
}

#[test]
fn connection_presets_replace_container_presets() {
    let client = Container::new(
        ContainerOptions::builder().sender_options(LinkOptions::builder().max_message_size(1)),
    );
    let server = Container::default();
    let seen = Recorder::new();
    let recorder = seen.clone();
    server.on(EventKind::ReceiverOpen, move |ctx| {
        recorder.push(ctx.receiver().unwrap().max_message_size());
    });

    let mut a = client.connect(
        ConnectionOptions::builder().sender_options(LinkOptions::builder().max_message_size(2)),
    );
    let mut b = server.accept(ConnectionOptions::default());
    a.open_sender("queue").unwrap();
    assert!(pump(&mut a, &mut b).is_empty());

    assert_eq!(seen.take(), vec![Some(2)]);

    // Changing the preset of a live connection applies to later links
    a.options_mut().sender_options = Some(Arc::new(LinkOptions::builder().max_message_size(3).build()));
    a.open_sender("queue").unwrap();
    assert!(pump(&mut a, &mut b).is_empty());
    assert_eq!(seen.take(), vec![Some(3)]);
}

#[test]
fn credit_window_of_peer_opened_receivers() {
    let client = Container::default();
    let server = Container::new(
        ContainerOptions::builder().receiver_options(LinkOptions::builder().credit_window(5)),
    );

    let (mut a, mut b) = connect(&client, &server);
    let id = a.open_sender("queue").unwrap().id();
    assert!(pump(&mut a, &mut b).is_empty());

    assert_eq!(a.link(id).unwrap().credit(), 5);
}

#[test]
fn receiver_tops_up_credit_at_half_the_window() {
    let client = Container::default();
    client.on(EventKind::Sendable, |ctx| {
        let sender = ctx.sender_mut().unwrap();
        // Keep one credit back so the receiver has to top up
        while sender.credit() > 1 && sender.delivery_count() < 18 {
            sender.send("spend").unwrap();
        }
    });
    let server = Container::new(
        ContainerOptions::builder().receiver_options(LinkOptions::builder().credit_window(10)),
    );
    let received = Recorder::new();
    let recorder = received.clone();
    server.on(EventKind::Message, move |ctx| {
        recorder.push(ctx.event().link_id().unwrap())
    });

    let (mut a, mut b) = connect(&client, &server);
    let id = a.open_sender("queue").unwrap().id();
    assert!(pump(&mut a, &mut b).is_empty());

    // Every top up is sent before the sender runs out, so all 18 get through
    let received = received.take();
    assert_eq!(received.len(), 18);
    let receiver = b.link(received[0]).unwrap();
    let sender = a.link(id).unwrap();
    assert_eq!(receiver.delivery_count(), 18);
    assert_eq!(sender.delivery_count(), 18);
    assert_eq!(sender.credit(), receiver.credit());
    assert!(receiver.credit() > 10 / 2);
}

#[test]
fn zero_credit_window_leaves_credit_to_the_application() {
    let client = Container::default();
    let sendable = Recorder::new();
    let recorder = sendable.clone();
    client.on(EventKind::Sendable, move |ctx| {
        recorder.push(ctx.sender().unwrap().credit())
    });
    let server = Container::default();
    let opened = Recorder::new();
    let recorder = opened.clone();
    server.on(EventKind::ReceiverOpen, move |ctx| {
        recorder.push(ctx.event().link_id().unwrap());
    });

    let (mut a, mut b) = connect(&client, &server);
    a.open_sender("queue").unwrap();
    let server_receiver = ContainerOptions::builder()
        .receiver_options(LinkOptions::builder().credit_window(0))
        .build();
    b.options_mut().receiver_options = server_receiver.receiver_options;
    assert!(pump(&mut a, &mut b).is_empty());
    assert_eq!(sendable.len(), 0);

    let link = opened.take().pop().unwrap();
    b.link_mut(link).unwrap().add_credit(3);
    assert!(pump(&mut a, &mut b).is_empty());
    assert_eq!(sendable.take(), vec![3]);
}
