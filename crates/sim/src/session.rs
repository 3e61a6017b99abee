use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use glam::Vec3;

use replica::{
    Clock, EntityClass, EntityConfig, EntityId, FramePacer, LinkConditions, ManualClock, Peer,
    PeerEvent, PeerId, SessionTopology, SimulatedNetwork, Snapshot, SystemClock, Transport,
    UdpTransport,
};

use crate::config::SessionConfig;
use crate::simulation::{ScriptedWalker, WalkerScript};

const HOST: PeerId = PeerId(1);

/// Every peer of a session living in one process, driven frame by frame.
pub struct ReplicationSession {
    config: SessionConfig,
    manual_clock: Option<Rc<ManualClock>>,
    peers: Vec<Peer>,
    frame: u64,
}

impl ReplicationSession {
    pub fn simulated(config: SessionConfig) -> Result<Self> {
        let clock = Rc::new(ManualClock::new(0.0));
        let network = SimulatedNetwork::new(clock.clone(), config.seed);
        network.set_default_link(config.link.clone());
        let transports = peer_ids(&config)
            .map(|peer| Box::new(network.connect(peer)) as Box<dyn Transport>)
            .collect();
        let mut session = Self::assemble(config, clock.clone(), transports)?;
        session.manual_clock = Some(clock);
        Ok(session)
    }

    pub fn udp(config: SessionConfig) -> Result<Self> {
        let mut sockets = Vec::new();
        for peer in peer_ids(&config) {
            let socket = UdpTransport::bind("127.0.0.1:0", peer)
                .with_context(|| format!("binding socket for {}", peer))?;
            log::info!("{} listening on {}", peer, socket.local_addr());
            sockets.push(socket);
        }

        let book: Vec<_> = sockets
            .iter()
            .map(|socket| (socket.local_peer(), socket.local_addr()))
            .collect();
        for socket in &mut sockets {
            for &(peer, addr) in &book {
                if peer != socket.local_peer() {
                    socket.add_peer(peer, addr);
                }
            }
        }

        if config.link != LinkConditions::ideal() {
            log::warn!("link conditions only apply to the simulated network");
        }
        let transports = sockets
            .into_iter()
            .map(|socket| Box::new(socket) as Box<dyn Transport>)
            .collect();
        Self::assemble(config, Rc::new(SystemClock::new()), transports)
    }

    fn assemble(
        config: SessionConfig,
        clock: Rc<dyn Clock>,
        transports: Vec<Box<dyn Transport>>,
    ) -> Result<Self> {
        let everyone: Vec<PeerId> = peer_ids(&config).collect();
        let mut peers = Vec::with_capacity(transports.len());
        for transport in transports {
            let local = transport.local_peer();
            let topology = if local == HOST {
                SessionTopology::with_peers(HOST, HOST, everyone.iter().copied())
            } else {
                SessionTopology::new(local, HOST)
            };
            peers.push(Peer::new(
                topology,
                transport,
                clock.clone(),
                config.timestamp_policy,
            )?);
        }

        Ok(Self {
            config,
            manual_clock: None,
            peers,
            frame: 0,
        })
    }

    /// The host spawns one entity per peer. Odd peers get secondary
    /// (owner-write) entities, even peers primary (host-write) ones.
    pub fn spawn_entities(&mut self) -> Result<()> {
        let Some(host) = self.peers.iter_mut().find(|peer| peer.is_host()) else {
            anyhow::bail!("session has no host");
        };
        for peer in peer_ids(&self.config) {
            let class = if peer.0 % 2 == 1 {
                EntityClass::Secondary
            } else {
                EntityClass::Primary
            };
            let config = EntityConfig::for_class(class);
            log::info!(
                "{} for {}: {:?}, {} every {:.3}s",
                entity_for(peer),
                peer,
                class,
                config.authority_mode,
                config.publish_interval_seconds
            );
            let start = Vec3::new(peer.0 as f32 * 3.0, 0.0, 0.0);
            host.spawn(entity_for(peer), peer, config, Snapshot::at_rest(start, 0.0))?;
        }
        Ok(())
    }

    pub fn dt(&self) -> f32 {
        1.0 / self.config.frame_rate.max(1) as f32
    }

    pub fn tick_once(&mut self, dt: f32) {
        if let Some(clock) = &self.manual_clock {
            clock.advance(dt as f64);
        }

        for peer in &mut self.peers {
            peer.update(dt);

            let events: Vec<PeerEvent> = peer.drain_events().collect();
            for event in events {
                handle_event(peer, event);
            }
        }

        self.frame += 1;
        let report_every =
            (self.config.report_interval_secs * self.config.frame_rate as f32).round() as u64;
        if report_every > 0 && self.frame % report_every == 0 {
            self.report();
        }
    }

    pub fn run_simulated(&mut self) {
        let frames = (self.config.duration_secs * self.config.frame_rate as f32).round() as u64;
        let dt = self.dt();
        for _ in 0..frames {
            self.tick_once(dt);
        }
    }

    pub fn run_realtime(&mut self) {
        let mut pacer = FramePacer::new(self.config.frame_rate);
        let duration = Duration::from_secs_f32(self.config.duration_secs.max(0.0));
        let start = Instant::now();
        let mut last = start;

        while start.elapsed() < duration {
            let now = Instant::now();
            pacer.accumulate((now - last).as_secs_f32());
            last = now;

            while let Some(dt) = pacer.next_frame() {
                self.tick_once(dt);
            }
            thread::sleep(Duration::from_millis(1));
        }

        if pacer.frames_dropped() > 0 {
            log::warn!("fell behind and dropped {} frames", pacer.frames_dropped());
        }
    }

    /// Logs where each owner has its entity and how far observers trail.
    pub fn report(&self) {
        for owner in &self.peers {
            for shown in owner.present().into_iter().filter(|p| p.owned) {
                let divergence = self
                    .peers
                    .iter()
                    .filter(|peer| peer.local_peer() != owner.local_peer())
                    .filter_map(|peer| {
                        peer.present()
                            .into_iter()
                            .find(|p| p.entity_id == shown.entity_id)
                    })
                    .map(|p| p.position.distance(shown.position))
                    .fold(0.0f32, f32::max);

                log::info!(
                    "{} by {}: ({:.2}, {:.2}, {:.2}) yaw {:.0}, observers within {:.3}",
                    shown.entity_id,
                    owner.local_peer(),
                    shown.position.x,
                    shown.position.y,
                    shown.position.z,
                    shown.rotation,
                    divergence
                );
            }
        }
    }

    pub fn log_stats(&self) {
        for peer in &self.peers {
            let stats = peer.network_stats();
            log::info!(
                "{}: sent {} ({} bytes), received {} ({} bytes), lost {} ({:.1}%), reordered {}, invalid {}",
                peer.local_peer(),
                stats.packets_sent,
                stats.bytes_sent,
                stats.packets_received,
                stats.bytes_received,
                stats.packets_lost,
                stats.packet_loss_percent(),
                stats.packets_reordered,
                stats.packets_invalid
            );
        }
    }
}

fn peer_ids(config: &SessionConfig) -> impl Iterator<Item = PeerId> {
    (HOST.0..=HOST.0 + config.guests).map(PeerId)
}

fn entity_for(peer: PeerId) -> EntityId {
    EntityId(peer.0)
}

fn handle_event(peer: &mut Peer, event: PeerEvent) {
    match event {
        PeerEvent::EntitySpawned {
            entity_id,
            owner,
            owned,
        } => {
            log::debug!("{} sees {} spawned for {}", peer.local_peer(), entity_id, owner);
            if owned {
                let start = peer
                    .store()
                    .get(entity_id)
                    .map(|snapshot| snapshot.position)
                    .unwrap_or_default();
                let walker = ScriptedWalker::new(start, WalkerScript::for_seed(entity_id.0));
                if let Err(err) = peer.attach_simulator(entity_id, Box::new(walker)) {
                    log::error!("{}: cannot drive {}: {}", peer.local_peer(), entity_id, err);
                }
            }
        }
        PeerEvent::EntityDespawned { entity_id } => {
            log::info!("{}: {} despawned", peer.local_peer(), entity_id);
        }
        PeerEvent::OwnershipChanged {
            entity_id, owner, ..
        } => {
            log::info!("{}: {} now owned by {}", peer.local_peer(), entity_id, owner);
        }
        PeerEvent::WriteRejected {
            entity_id,
            from,
            error,
        } => {
            log::debug!(
                "{}: write to {} from {} rejected: {}",
                peer.local_peer(),
                entity_id,
                from,
                error
            );
        }
        PeerEvent::ChannelUnavailable { peer: remote } => {
            log::debug!("{}: channel to {} unavailable", peer.local_peer(), remote);
        }
        PeerEvent::Error { message } => {
            log::error!("{}: {}", peer.local_peer(), message);
        }
    }
}
