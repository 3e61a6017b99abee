use std::thread;
use std::time::{Duration, Instant};

use glam::Vec3;

use replica::{
    EntityId, PeerId, ReplicationMessage, Snapshot, Transport, TransportError, UdpTransport,
};

const HOST: PeerId = PeerId(1);
const GUEST: PeerId = PeerId(2);

fn wait_for_messages(
    transport: &mut UdpTransport,
    timeout_ms: u64,
) -> Option<Vec<(PeerId, ReplicationMessage)>> {
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        let received = transport.receive().unwrap();
        if !received.is_empty() {
            return Some(received);
        }
        thread::sleep(Duration::from_millis(1));
    }
    None
}

fn linked_pair() -> (UdpTransport, UdpTransport) {
    let mut host = UdpTransport::bind("127.0.0.1:0", HOST).unwrap();
    let mut guest = UdpTransport::bind("127.0.0.1:0", GUEST).unwrap();
    host.add_peer(GUEST, guest.local_addr());
    guest.add_peer(HOST, host.local_addr());
    (host, guest)
}

#[test]
fn relay_crosses_loopback() {
    let (mut host, mut guest) = linked_pair();

    let mut snapshot = Snapshot::at_rest(Vec3::new(1.0, 2.0, 3.0), 90.0);
    snapshot.timestamp = 4.25;
    let relay = ReplicationMessage::relay(EntityId(5), &snapshot);
    guest.send(HOST, &relay).unwrap();

    let received = wait_for_messages(&mut host, 500).expect("no relay received");
    assert_eq!(received, vec![(GUEST, relay)]);

    let stats = host.stats();
    assert_eq!(stats.packets_received, 1);
    assert!(stats.bytes_received > 0);
    assert_eq!(guest.stats().packets_sent, 1);
}

#[test]
fn unknown_destination_is_refused() {
    let (mut host, _guest) = linked_pair();
    let message = ReplicationMessage::LifecycleAck { sequence: 1 };
    assert!(matches!(
        host.send(PeerId(9), &message),
        Err(TransportError::UnknownPeer(PeerId(9)))
    ));
}

#[test]
fn unregistered_sender_is_dropped() {
    let (mut host, _guest) = linked_pair();
    let mut stranger = UdpTransport::bind("127.0.0.1:0", GUEST).unwrap();
    stranger.add_peer(HOST, host.local_addr());

    let message = ReplicationMessage::LifecycleAck { sequence: 1 };
    stranger.send(HOST, &message).unwrap();

    assert!(wait_for_messages(&mut host, 100).is_none());
    assert_eq!(host.stats().packets_invalid, 1);
}
