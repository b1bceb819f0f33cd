//! Unit tests for the message bus.

use ms_core::{DriverId, NodeId, Tick, TurningPathId};

use crate::{Message, MessageBus, Recipient};

fn request(driver: u32) -> Message {
    Message::RequestIntArrTime {
        driver: DriverId(driver),
        turning_path: TurningPathId(0),
        requested_sec: 10.0,
    }
}

#[test]
fn instantaneous_messages_deliver_same_tick() {
    let mut bus = MessageBus::new();
    let to = Recipient::Intersection(NodeId(1));
    bus.post(Recipient::Driver(DriverId(0)), to, request(0));

    bus.begin_delivery(Tick(0));
    let msgs = bus.drain(to);
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].from, Recipient::Driver(DriverId(0)));
}

#[test]
fn posts_during_delivery_land_in_next_batch() {
    let mut bus = MessageBus::new();
    let a = Recipient::Driver(DriverId(0));
    let b = Recipient::Driver(DriverId(1));
    bus.post(a, b, Message::ReplyIntArrTime { granted_sec: 1.0 });

    bus.begin_delivery(Tick(0));
    // Handler for b posts back to a while the batch is frozen.
    bus.post(b, a, Message::ReplyIntArrTime { granted_sec: 2.0 });
    assert!(bus.drain(a).is_empty(), "reply must not arrive mid-batch");
    assert_eq!(bus.drain(b).len(), 1);

    // Next tick the reply surfaces.
    bus.begin_delivery(Tick(1));
    assert_eq!(bus.drain(a).len(), 1);
}

#[test]
fn deferred_messages_wait_n_ticks() {
    let mut bus = MessageBus::new();
    let to = Recipient::Driver(DriverId(2));
    bus.post_deferred(
        Recipient::Intersection(NodeId(0)),
        to,
        Message::ReplyIntArrTime { granted_sec: 5.0 },
        Tick(0),
        3,
    );

    for t in 0..3u64 {
        bus.begin_delivery(Tick(t));
        assert!(bus.drain(to).is_empty(), "too early at tick {t}");
    }
    bus.begin_delivery(Tick(3));
    assert_eq!(bus.drain(to).len(), 1);
    assert_eq!(bus.deferred_len(), 0);
}

#[test]
fn recipients_drain_in_deterministic_order() {
    let mut bus = MessageBus::new();
    let from = Recipient::Intersection(NodeId(9));
    // Post in shuffled order.
    for id in [5u32, 1, 3] {
        bus.post(
            from,
            Recipient::Driver(DriverId(id)),
            Message::ReplyIntArrTime { granted_sec: 0.0 },
        );
    }
    bus.begin_delivery(Tick(0));
    let order = bus.recipients();
    assert_eq!(
        order,
        vec![
            Recipient::Driver(DriverId(1)),
            Recipient::Driver(DriverId(3)),
            Recipient::Driver(DriverId(5)),
        ]
    );
}

#[test]
fn per_recipient_fifo_is_preserved() {
    let mut bus = MessageBus::new();
    let to = Recipient::Intersection(NodeId(0));
    for d in 0..4u32 {
        bus.post(Recipient::Driver(DriverId(d)), to, request(d));
    }
    bus.begin_delivery(Tick(0));
    let msgs = bus.drain(to);
    let senders: Vec<Recipient> = msgs.iter().map(|e| e.from).collect();
    assert_eq!(
        senders,
        (0..4u32)
            .map(|d| Recipient::Driver(DriverId(d)))
            .collect::<Vec<_>>()
    );
}
