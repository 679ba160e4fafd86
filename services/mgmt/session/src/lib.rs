//! Event/command dispatcher for the Bluetooth management channel.
//!
//! This crate turns the stateless codec in `mgmt-wire` into a running
//! driver: it negotiates the protocol version, discovers controllers,
//! brings each one up, reacts to every kernel event and exposes typed
//! operations to the adapter layer.
//!
//! ## Features
//!
//! - **Dispatch**: every decoded event and command completion is routed to
//!   its handler in arrival order
//! - **Bring-up**: a newly read controller is registered with the adapter
//!   model and configured (name, class, pairable, SSP, LE)
//! - **UUID sequencing**: one outstanding add/remove UUID command per
//!   controller, with class and power-on changes held back meanwhile
//! - **Runner**: a single task owning the driver, fed by the socket and by
//!   [`DriverHandle`] requests
//!
//! ## Example
//!
//! ```rust,no_run
//! use mgmt_session::{connect_datagram, AdapterManager, Driver, DriverConfig};
//! use std::sync::Arc;
//!
//! # async fn example(manager: Arc<dyn AdapterManager>) -> anyhow::Result<()> {
//! let socket = Arc::new(connect_datagram("/run/btmgmt.sock")?);
//! let driver = Driver::new(DriverConfig::default(), socket.clone(), manager);
//! let (handle, task) = driver.spawn(socket, 64);
//!
//! handle.set_powered(0, true).await?;
//! task.await??;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
mod commands;
mod complete;
pub mod driver;
pub mod error;
mod events;
pub mod runner;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types
pub use adapter::{AdapterManager, AppliedSettings, DeviceFound, PinCode};
pub use driver::{Driver, DriverConfig};
pub use error::MgmtError;
pub use runner::{DriverHandle, DriverRequest};
pub use transport::{connect_datagram, MgmtSocket};
