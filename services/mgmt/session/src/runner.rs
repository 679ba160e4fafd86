//! Socket loop and the handle used to reach a running driver.
//!
//! The driver is owned by one task. Received datagrams and requests from
//! other tasks are serialized through a single `select!` loop, so every
//! handler runs to completion before the next message is looked at.

use crate::driver::Driver;
use crate::error::MgmtError;
use mgmt_wire::{Address, PeerAddress};
use std::sync::Arc;
use tokio::net::UnixDatagram;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Work executed on the driver task
pub type DriverRequest = Box<dyn FnOnce(&mut Driver) + Send>;

/// Cloneable handle to a running driver
#[derive(Clone, Debug)]
pub struct DriverHandle {
    tx: mpsc::Sender<DriverRequest>,
}

impl DriverHandle {
    /// Create a handle and the receiver the driver loop consumes
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DriverRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Run `f` on the driver task and return its result
    pub async fn call<R, F>(&self, f: F) -> Result<R, MgmtError>
    where
        R: Send + 'static,
        F: FnOnce(&mut Driver) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request: DriverRequest = Box::new(move |driver| {
            let _ = reply_tx.send(f(driver));
        });

        self.tx
            .send(request)
            .await
            .map_err(|_| MgmtError::DriverClosed)?;
        reply_rx.await.map_err(|_| MgmtError::DriverClosed)
    }

    /// Power a controller on or off
    pub async fn set_powered(&self, index: u16, powered: bool) -> Result<(), MgmtError> {
        self.call(move |driver| driver.set_powered(index, powered))
            .await?
    }

    /// Register a service UUID
    pub async fn add_uuid(&self, index: u16, uuid: Uuid, svc_hint: u8) -> Result<(), MgmtError> {
        self.call(move |driver| driver.add_uuid(index, uuid, svc_hint))
            .await?
    }

    /// Unregister a service UUID
    pub async fn remove_uuid(&self, index: u16, uuid: Uuid) -> Result<(), MgmtError> {
        self.call(move |driver| driver.remove_uuid(index, uuid)).await?
    }

    /// Controller identity address
    pub async fn read_bdaddr(&self, index: u16) -> Result<Address, MgmtError> {
        self.call(move |driver| driver.read_bdaddr(index)).await?
    }

    /// Snapshot of the open connections
    pub async fn get_conn_list(&self, index: u16) -> Result<Vec<PeerAddress>, MgmtError> {
        self.call(move |driver| driver.get_conn_list(index)).await?
    }

    /// Registered controller indices
    pub async fn controllers(&self) -> Result<Vec<u16>, MgmtError> {
        self.call(|driver| driver.registry().indices().collect())
            .await
    }
}

impl Driver {
    /// Drive the management socket until it fails or a fatal error occurs.
    ///
    /// Requests are served between datagrams. Once every [`DriverHandle`] is
    /// dropped only the socket keeps the loop alive.
    pub async fn run(
        mut self,
        socket: Arc<UnixDatagram>,
        mut requests: mpsc::Receiver<DriverRequest>,
    ) -> Result<(), MgmtError> {
        self.start()?;

        let mut buf = vec![0u8; self.config.recv_buffer_size];
        let mut requests_open = true;

        loop {
            tokio::select! {
                received = socket.recv(&mut buf) => {
                    let n = received.map_err(|e| {
                        error!("Unable to read from management socket: {}", e);
                        MgmtError::TransportRead(e)
                    })?;
                    self.process(&buf[..n])?;
                }

                request = requests.recv(), if requests_open => {
                    match request {
                        Some(request) => request(&mut self),
                        None => {
                            debug!("All driver handles dropped");
                            requests_open = false;
                        }
                    }
                }
            }
        }
    }

    /// Spawn the driver loop on the current runtime
    pub fn spawn(
        self,
        socket: Arc<UnixDatagram>,
        capacity: usize,
    ) -> (DriverHandle, JoinHandle<Result<(), MgmtError>>) {
        let (handle, requests) = DriverHandle::channel(capacity);
        info!("Spawning management driver task");
        let task = tokio::spawn(self.run(socket, requests));
        (handle, task)
    }
}
