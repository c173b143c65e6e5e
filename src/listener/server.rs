//! Termination-on-disconnect TCP server
//!
//! Accepts any connection and watches it for closure. The first close
//! observed on any connection ends `serve`, and the caller ends the process.
//! No bytes are ever written; inbound bytes are drained and discarded.

use crate::error::ProbeError;
use crate::listener::state::ListenerState;

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Read buffer for draining inbound bytes
const DRAIN_BUFFER_SIZE: usize = 1024;

/// How a watched connection ended
///
/// Both kinds trigger termination; the distinction is only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer shut down its write side (EOF)
    PeerClosed,
    /// The connection failed, e.g. reset by peer
    Errored(io::ErrorKind),
}

/// Close notification sent by a connection's close-observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    pub connection_id: u64,
    pub peer: SocketAddr,
    pub reason: CloseReason,
}

/// TCP listener whose connections act as a kill switch
pub struct TerminationListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: ListenerState,
    close_tx: mpsc::UnboundedSender<CloseEvent>,
    close_rx: mpsc::UnboundedReceiver<CloseEvent>,
}

impl TerminationListener {
    /// Bind on all interfaces
    ///
    /// Tries the dual-stack IPv6 wildcard first and falls back to IPv4-only
    /// when the host has no IPv6. A port already taken or a permission
    /// failure is reported as is.
    pub async fn bind(port: u16) -> Result<Self, ProbeError> {
        match Self::bind_addr(SocketAddr::from((Ipv6Addr::UNSPECIFIED, port))).await {
            Err(ProbeError::Bind { source, .. }) if !is_port_conflict(&source) => {
                debug!(port, error = %source, "IPv6 wildcard unavailable, binding IPv4 only");
                Self::bind_addr(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await
            }
            result => result,
        }
    }

    /// Bind on a specific address
    ///
    /// Port 0 lets the OS pick; `local_port` reports the port actually bound.
    pub async fn bind_addr(addr: SocketAddr) -> Result<Self, ProbeError> {
        let bind_error = |source| ProbeError::Bind {
            port: addr.port(),
            source,
        };

        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;
        let (close_tx, close_rx) = mpsc::unbounded_channel();

        info!(addr = %local_addr, "Listener bound");

        Ok(Self {
            listener,
            local_addr,
            state: ListenerState::new(local_addr.port()),
            close_tx,
            close_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn local_port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Shared state (for diagnostics and tests)
    pub fn state(&self) -> ListenerState {
        self.state.clone()
    }

    /// One-line notice printed once the socket is bound
    pub fn startup_notice(&self) -> String {
        format!("close a connection on port {} to terminate", self.local_port())
    }

    /// Accept connections until one of them closes
    ///
    /// Returns the first close event observed. Close events take priority
    /// over pending accepts. Accept failures are logged and skipped.
    pub async fn serve(mut self) -> CloseEvent {
        loop {
            tokio::select! {
                biased;

                Some(event) = self.close_rx.recv() => {
                    self.state.set_terminated();
                    info!(
                        port = self.state.port(),
                        connection_id = event.connection_id,
                        peer = %event.peer,
                        reason = ?event.reason,
                        open = self.state.open_connections(),
                        "Connection closed; terminating"
                    );
                    return event;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let connection_id = self.state.record_accept();
                            debug!(connection_id, peer = %peer, "Connection accepted");
                            tokio::spawn(observe_close(
                                connection_id,
                                stream,
                                peer,
                                self.close_tx.clone(),
                                self.state.clone(),
                            ));
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }
    }
}

/// Close-observer for a single connection
async fn observe_close(
    connection_id: u64,
    mut stream: TcpStream,
    peer: SocketAddr,
    close_tx: mpsc::UnboundedSender<CloseEvent>,
    state: ListenerState,
) {
    let mut buf = [0u8; DRAIN_BUFFER_SIZE];

    let reason = loop {
        match stream.read(&mut buf).await {
            Ok(0) => break CloseReason::PeerClosed,
            Ok(bytes) => {
                trace!(connection_id, bytes, "Discarding inbound bytes");
            }
            Err(e) => break CloseReason::Errored(e.kind()),
        }
    };

    state.record_close();
    debug!(connection_id, peer = %peer, ?reason, "Connection ended");

    // First close already won
    if !state.is_listening() {
        return;
    }

    let _ = close_tx.send(CloseEvent {
        connection_id,
        peer,
        reason,
    });
}

fn is_port_conflict(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::AddrInUse | io::ErrorKind::PermissionDenied
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::ListenerPhase;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::time::timeout;

    const DEADLINE: Duration = Duration::from_secs(5);

    async fn loopback_listener() -> TerminationListener {
        TerminationListener::bind_addr("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn notice_names_the_bound_port() {
        let listener = loopback_listener().await;
        let port = listener.local_port();
        assert_ne!(port, 0);
        assert!(listener.startup_notice().contains(&port.to_string()));
    }

    #[tokio::test]
    async fn immediate_close_triggers_termination() {
        let listener = loopback_listener().await;
        let addr = listener.local_addr();
        let state = listener.state();
        let serving = tokio::spawn(listener.serve());

        let client = TcpStream::connect(addr).await.unwrap();
        let client_addr = client.local_addr().unwrap();
        drop(client);

        let event = timeout(DEADLINE, serving).await.unwrap().unwrap();
        assert_eq!(event.peer, client_addr);
        assert_eq!(event.reason, CloseReason::PeerClosed);
        assert_eq!(event.connection_id, 1);
        assert_eq!(state.phase(), ListenerPhase::Terminated);
    }

    #[tokio::test]
    async fn bytes_are_discarded_until_close() {
        let listener = loopback_listener().await;
        let addr = listener.local_addr();
        let serving = tokio::spawn(listener.serve());

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"anything at all\r\n").await.unwrap();
        client.shutdown().await.unwrap();

        let event = timeout(DEADLINE, serving).await.unwrap().unwrap();
        assert_eq!(event.reason, CloseReason::PeerClosed);
    }

    #[tokio::test]
    async fn any_single_close_wins_while_others_stay_open() {
        let listener = loopback_listener().await;
        let addr = listener.local_addr();
        let state = listener.state();
        let serving = tokio::spawn(listener.serve());

        let first = TcpStream::connect(addr).await.unwrap();
        let middle = TcpStream::connect(addr).await.unwrap();
        let last = TcpStream::connect(addr).await.unwrap();
        let middle_addr = middle.local_addr().unwrap();
        drop(middle);

        let event = timeout(DEADLINE, serving).await.unwrap().unwrap();
        assert_eq!(event.peer, middle_addr);
        assert!(state.accepted() >= 1);

        drop(first);
        drop(last);
    }

    #[tokio::test]
    #[allow(deprecated)]
    async fn reset_connection_also_triggers_termination() {
        let listener = loopback_listener().await;
        let addr = listener.local_addr();
        let state = listener.state();
        let serving = tokio::spawn(listener.serve());

        let client = TcpStream::connect(addr).await.unwrap();
        let client_addr = client.local_addr().unwrap();

        // Make sure the server side is watching before the reset
        timeout(DEADLINE, async {
            while state.accepted() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        // Zero linger turns the close into an RST
        client.set_linger(Some(Duration::ZERO)).unwrap();
        drop(client);

        let event = timeout(DEADLINE, serving).await.unwrap().unwrap();
        assert_eq!(event.peer, client_addr);
        assert!(
            matches!(
                event.reason,
                CloseReason::PeerClosed | CloseReason::Errored(_)
            ),
            "unexpected reason {:?}",
            event.reason
        );
        assert_eq!(state.phase(), ListenerPhase::Terminated);
    }

    #[tokio::test]
    async fn wildcard_bind_accepts_ipv4_clients() {
        let listener = TerminationListener::bind(0).await.unwrap();
        let port = listener.local_port();
        assert_eq!(listener.state().port(), port);
        let serving = tokio::spawn(listener.serve());

        drop(TcpStream::connect(("127.0.0.1", port)).await.unwrap());

        let event = timeout(DEADLINE, serving).await.unwrap().unwrap();
        assert_eq!(event.reason, CloseReason::PeerClosed);
    }

    #[test]
    fn only_conflicts_skip_the_ipv4_fallback() {
        assert!(is_port_conflict(&io::Error::from(io::ErrorKind::AddrInUse)));
        assert!(is_port_conflict(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(!is_port_conflict(&io::Error::from(io::ErrorKind::AddrNotAvailable)));
    }

    #[tokio::test]
    async fn occupied_port_is_a_bind_error() {
        let holder = TcpListener::bind("0.0.0.0:0").await.unwrap();
        let port = holder.local_addr().unwrap().port();

        let err = match TerminationListener::bind(port).await {
            Ok(_) => panic!("second bind on {port} should fail"),
            Err(e) => e,
        };
        assert!(err.is_bind_error());
        assert_eq!(err.component(), "listener");
        assert!(err.to_string().contains(&port.to_string()));
    }
}
