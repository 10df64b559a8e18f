//! Per-connection handling: ready-gating, dialing, and bidirectional streaming
//!
//! Modelled on the teacher's `tunnel::handle_connection`/`spawn_forwarder`
//! shape (split stream, two spawned copy tasks, `select!` on whichever
//! finishes first, explicit half-close of each pump's own destination), with
//! the target dialed directly over TCP instead of through a container exec.

use crate::readiness::ensure_ready;
use crate::registry::ChallengeRegistry;
use cproxy_driver::ComposeDriver;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

const PUMP_CHUNK_SIZE: usize = 8 * 1024;

/// Handle one accepted client connection end-to-end. Never returns an error:
/// every failure path is contained here, logged, and resolved by closing the
/// client socket.
pub async fn handle(
    stream: TcpStream,
    local_port: u16,
    registry: Arc<ChallengeRegistry>,
    driver: Arc<dyn ComposeDriver>,
) {
    let Some(descriptor) = registry.get(local_port) else {
        tracing::warn!(port = local_port, "no challenge registered for this port");
        return;
    };

    if !ensure_ready(driver.as_ref(), &descriptor).await {
        tracing::warn!(challenge = %descriptor.display_name, "readiness gate failed; closing client");
        return;
    }

    let (ip, internal_port) = {
        let state = descriptor.services[&descriptor.main_service].lock().await;
        if !state.accepts_connections {
            tracing::warn!(
                challenge = %descriptor.display_name,
                "main service stopped accepting connections between ensure_ready and dial"
            );
            return;
        }
        let Some(ip) = state.ip_address else {
            tracing::warn!(challenge = %descriptor.display_name, "main service has no known address");
            return;
        };
        (ip, descriptor.internal_port)
    };

    let target = match TcpStream::connect((ip, internal_port)).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(challenge = %descriptor.display_name, error = %e, "dial to target failed");
            return;
        }
    };

    Session::new(stream, target).run().await;
}

/// Owns both socket halves and both pump tasks for one session. `run`
/// unconditionally closes both writers and aborts/awaits both handles,
/// regardless of which pump finished first.
struct Session {
    client: TcpStream,
    target: TcpStream,
}

impl Session {
    fn new(client: TcpStream, target: TcpStream) -> Self {
        Self { client, target }
    }

    async fn run(self) {
        let (client_read, client_write) = self.client.into_split();
        let (target_read, target_write) = self.target.into_split();

        let mut client_to_target = tokio::spawn(pump(client_read, target_write));
        let mut target_to_client = tokio::spawn(pump(target_read, client_write));

        tokio::select! {
            r = &mut client_to_target => {
                target_to_client.abort();
                let _ = target_to_client.await;
                log_pump_result("client->target", r);
            }
            r = &mut target_to_client => {
                client_to_target.abort();
                let _ = client_to_target.await;
                log_pump_result("target->client", r);
            }
        }
    }
}

fn log_pump_result(direction: &str, result: Result<std::io::Result<u64>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::debug!(direction, error = %e, "pump ended"),
        Err(e) if e.is_cancelled() => {}
        Err(e) => tracing::debug!(direction, error = %e, "pump task join error"),
    }
}

/// Copy bytes from `read_half` to `write_half`, then close `write_half` so
/// the peer observes EOF (half-close propagation). Each pump owns and closes
/// only its own destination; it never touches the other direction's socket.
async fn pump<R, W>(mut read_half: R, mut write_half: W) -> std::io::Result<u64>
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; PUMP_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = match tokio::io::AsyncReadExt::read(&mut read_half, &mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                let _ = write_half.shutdown().await;
                return Err(e);
            }
        };
        if let Err(e) = write_half.write_all(&buf[..n]).await {
            let _ = write_half.shutdown().await;
            return Err(e);
        }
        total += n as u64;
    }
    let _ = write_half.shutdown().await;
    Ok(total)
}
