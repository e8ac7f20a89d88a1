//! The device server: accepts one client at a time, performs the `ACK`
//! handshake, and dispatches frames to the command interpreter
//! (spec §4.3).

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use regctl_protocol::{Message, tokens};
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::{TcpListener, TcpStream, ToSocketAddrs},
    sync::watch,
    task::JoinHandle,
};

use crate::{error::DeviceError, memory::DeviceMemory};

/// A shared, test-visible handle onto the device's register memory (spec
/// §8 scenario 6: "patch it via test hook").
#[derive(Clone)]
pub struct MemoryHandle(Arc<Mutex<DeviceMemory>>);

impl MemoryHandle {
    /// Sets `error_state` directly, bypassing the command interpreter.
    pub fn set_error_state_for_test(&self, value: u8) {
        self.0.lock().unwrap().set_error_state_for_test(value);
    }
}

/// A running device simulator instance. Owns the listener and the single
/// background task that runs the accept/read/dispatch loop.
pub struct Server {
    local_addr: SocketAddr,
    memory: MemoryHandle,
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl Server {
    /// Binds a listener and starts the accept loop on a background task.
    /// This is `device_init` followed by server start (spec §3, §4.3).
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::BindFailed`] if the address cannot be bound.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, DeviceError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(DeviceError::BindFailed)?;
        let local_addr = listener
            .local_addr()
            .map_err(DeviceError::BindFailed)?;

        let memory = Arc::new(Mutex::new(DeviceMemory::new()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(&memory), shutdown_rx));

        log::info!("device simulator listening on {local_addr}");

        Ok(Self {
            local_addr,
            memory: MemoryHandle(memory),
            shutdown_tx,
            accept_task,
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn memory(&self) -> MemoryHandle {
        self.memory.clone()
    }

    /// Signals the accept loop to stop and closes the listener, then joins
    /// the background task (spec §4.3 "Shutdown").
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::TaskJoinFailed`] if the accept task panicked.
    pub async fn stop(self) -> Result<(), DeviceError> {
        let _ = self.shutdown_tx.send(true);
        self.accept_task
            .await
            .map_err(|_| DeviceError::TaskJoinFailed)
    }
}

async fn accept_loop(
    listener: TcpListener,
    memory: Arc<Mutex<DeviceMemory>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    log::info!("device simulator shutting down");
                    break;
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        log::debug!("accepted client {peer}");
                        // At most one client at a time (spec §3): run this
                        // client to completion before accepting the next.
                        serve_client(stream, &memory).await;
                    }
                    Err(err) => {
                        log::warn!("accept failed: {err}");
                    }
                }
            }
        }
    }
}

async fn serve_client(mut stream: TcpStream, memory: &Arc<Mutex<DeviceMemory>>) {
    if let Err(err) = stream.write_all(tokens::ACK).await {
        log::warn!("failed to send ACK: {err}");
        return;
    }

    let mut buf = [0u8; 255];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => {
                log::debug!("client closed connection");
                return;
            }
            Ok(n) => n,
            Err(err) => {
                log::warn!("client read failed: {err}");
                return;
            }
        };

        let payload = &buf[..n];
        if payload == tokens::EXIT {
            log::debug!("client requested exit");
            return;
        }

        let response = dispatch_payload(payload, memory);
        if let Err(err) = stream.write_all(response.format().as_bytes()).await {
            log::warn!("failed to send response: {err}");
            return;
        }
    }
}

fn dispatch_payload(payload: &[u8], memory: &Arc<Mutex<DeviceMemory>>) -> Message {
    // A payload that is not valid UTF-8 cannot be six hex characters
    // either, so it takes the same "syntactically invalid" path.
    let frame = std::str::from_utf8(payload).unwrap_or("");
    memory.lock().unwrap().dispatch_frame(frame)
}
