//! An in-process test harness: spawns a device simulator bound to an
//! ephemeral port in the background and hands back a live handle, in the
//! launch/wait/teardown shape of the teacher's own integration-test
//! helpers (bind a listener, run it on a background task, explicit stop).

use std::net::SocketAddr;

use anyhow::Context as _;
use regctl_device::{MemoryHandle, Server};
use regctl_driver::DriverSession;

/// A running device simulator under test. Must be torn down with
/// [`stop`](Self::stop); there is no `Drop` teardown because stopping the
/// accept loop is itself an async operation.
pub struct DeviceHandle {
    server: Server,
}

impl DeviceHandle {
    /// The ephemeral address the simulator is listening on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// A handle onto the simulator's register memory, for test hooks that
    /// bypass the command interpreter (spec §8 scenario 6).
    #[must_use]
    pub fn memory(&self) -> MemoryHandle {
        self.server.memory()
    }

    /// Creates a new driver session already connected to this simulator.
    pub async fn connected_driver(&self) -> anyhow::Result<DriverSession> {
        let session = DriverSession::new(None);
        let addr = self.addr();
        session
            .connect(&addr.ip().to_string(), addr.port())
            .await
            .map_err(|err| anyhow::anyhow!("connect failed: {err}"))?;
        Ok(session)
    }

    /// Signals the accept loop to stop and joins the background task.
    pub async fn stop(self) -> anyhow::Result<()> {
        self.server.stop().await.context("stop device simulator")
    }
}

/// Binds a device simulator to `127.0.0.1:0` and starts its accept loop on
/// a background task.
pub async fn spawn_device() -> anyhow::Result<DeviceHandle> {
    let server = Server::bind("127.0.0.1:0")
        .await
        .context("bind device simulator")?;
    Ok(DeviceHandle { server })
}
