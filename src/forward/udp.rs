//! Rate-limited UDP telemetry uplink.
//!
//! `forward` never blocks the collector: snapshots land in the pipeline's
//! own single-slot mailbox (oldest-wins, like every mailbox in the system)
//! and a dedicated pump drains it on a fixed gate interval. When no new
//! telemetry arrives, a keep-alive re-send bounds the silence the remote
//! endpoint can observe.

use std::net::SocketAddr;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::config::UdpConfig;
use crate::core::error::{GatewayError, Result};
use crate::core::mailbox::{mailbox, MailboxReceiver, MailboxSender};
use crate::core::telemetry::Telemetry;
use crate::forward::wire::{self, TELEMETRY_PACKET_LEN};
use crate::forward::Forwarder;

/// Collector-facing half of the pipeline.
pub struct UdpForwarder {
    tx: MailboxSender<Telemetry>,
}

/// Socket-owning half of the pipeline; runs as its own worker.
pub struct UdpPump {
    socket: UdpSocket,
    rx: MailboxReceiver<Telemetry>,
    gate_interval: std::time::Duration,
    min_send_delay: std::time::Duration,
}

impl UdpForwarder {
    /// Resolve the endpoint, build the socket and split the pipeline into
    /// its forwarder and pump halves.
    ///
    /// The socket's OS write buffer is sized to two packets: the pipeline
    /// never has more than one packet in flight per gate tick, so anything
    /// larger only hides backpressure.
    pub fn connect(config: &UdpConfig) -> Result<(UdpForwarder, UdpPump)> {
        use std::net::ToSocketAddrs;

        let remote = format!("{}:{}", config.server, config.port);
        let remote: SocketAddr = remote
            .to_socket_addrs()
            .map_err(|err| {
                GatewayError::connection(format!("unable to resolve {remote}: {err}"))
            })?
            .next()
            .ok_or_else(|| GatewayError::connection(format!("no address for {remote}")))?;

        let socket = bind_udp(&remote)?;
        socket.connect(&remote.into()).map_err(|err| {
            GatewayError::connection(format!("unable to connect UDP socket to {remote}: {err}"))
        })?;
        let socket = UdpSocket::from_std(socket.into())?;

        let (tx, rx) = mailbox();
        Ok((
            UdpForwarder { tx },
            UdpPump {
                socket,
                rx,
                gate_interval: config.gate_interval(),
                min_send_delay: config.min_send_delay(),
            },
        ))
    }
}

fn bind_udp(remote: &SocketAddr) -> Result<socket2::Socket> {
    use socket2::{Domain, Protocol, Socket, Type};

    let domain = Domain::for_address(*remote);
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_send_buffer_size(TELEMETRY_PACKET_LEN * 2)?;
    socket.set_nonblocking(true)?;

    let local: SocketAddr = if remote.is_ipv4() {
        "0.0.0.0:0".parse().expect("static addr")
    } else {
        "[::]:0".parse().expect("static addr")
    };
    socket.bind(&local.into())?;
    Ok(socket)
}

#[async_trait]
impl Forwarder for UdpForwarder {
    fn name(&self) -> &'static str {
        "udp"
    }

    async fn forward(&mut self, _previous: &Telemetry, current: &Telemetry) -> Result<()> {
        // hand a copy to the pump; when a snapshot is already queued the
        // newer one is dropped, matching the mailbox discipline everywhere
        self.tx.offer(*current);
        Ok(())
    }
}

impl UdpPump {
    /// Run the send loop until shutdown.
    ///
    /// Each gate tick sends at most one packet: a fresh sample if the
    /// mailbox holds one, or, when the keep-alive timer has fired and the
    /// last send is at least `min_send_delay` old, the last-sent snapshot
    /// again as a heartbeat. Nothing is ever sent before the first sample
    /// arrives.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> GatewayError {
        let mut gate = tokio::time::interval(self.gate_interval);
        let mut keepalive = tokio::time::interval(self.min_send_delay / 2);
        let mut last_sent: Option<Instant> = None;
        let mut last_packet: Option<Telemetry> = None;

        loop {
            tokio::select! {
                _ = shutdown.changed() => return GatewayError::Cancelled,
                _ = gate.tick() => {
                    if let Some(telemetry) = self.rx.try_recv() {
                        self.send(&telemetry).await;
                        last_sent = Some(Instant::now());
                        last_packet = Some(telemetry);
                    } else if keepalive.tick().now_or_never().is_some() {
                        let (Some(sent_at), Some(telemetry)) = (last_sent, last_packet) else {
                            continue;
                        };
                        if sent_at.elapsed() < self.min_send_delay {
                            continue;
                        }
                        debug!("re-sending last snapshot as keep-alive");
                        self.send(&telemetry).await;
                        last_sent = Some(Instant::now());
                    }
                }
            }
        }
    }

    async fn send(&self, telemetry: &Telemetry) {
        let packet = wire::encode_telemetry(telemetry);
        if let Err(err) = self.socket.send(&packet).await {
            error!(%err, "unable to forward telemetry to server");
        }
    }
}
