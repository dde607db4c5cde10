//! Background status polling for submitted transfers.
//!
//! Each poll runs as its own task owned by a [`PollHandle`]. Polling stops
//! when the transfer settles, when the time budget runs out or when the handle
//! cancels it.

pub mod transfer;

pub use transfer::{PollHandle, PollOutcome, PollReport, PollerConfig, StatusPoller};
