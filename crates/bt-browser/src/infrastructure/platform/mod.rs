//! Platform radio adapters.
//!
//! The application talks to the radio only through the
//! [`crate::application::discovery::DiscoveryEngine`] and
//! [`crate::application::connection::StreamConnector`] traits.
//!
//! - **`simulated`** – A radio described by the config file, used by the
//!   binary.  Callbacks arrive through the event channel after a delay.
//! - **`mock`** – Recording doubles for tests.  They never produce callbacks.

pub mod mock;
pub mod simulated;
