//! Application layer of the browser.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (the registry and its value types in `bt-browser-core`) and the
//! infrastructure (radio, files, console).  Code here decides *what happens*
//! when an event arrives, but never talks to the OS itself: the radio is
//! reached through traits, so tests can swap in recording doubles.
//!
//! # Sub-modules
//!
//! - **`browser`**    – The state machine that owns everything and receives
//!   every event.
//! - **`discovery`**  – Runs a scan cycle: device discovery, then service
//!   discovery one device at a time.
//! - **`connection`** – Opens a stream to a selected service and keeps one
//!   receive outstanding.
//! - **`listbox`**    – Cursor over the flattened (device, service) rows.
//! - **`notify`**     – User-visible notices and the listener broadcaster.
//! - **`events`**     – The event type of the event loop.

pub mod browser;
pub mod connection;
pub mod discovery;
pub mod events;
pub mod listbox;
pub mod notify;
