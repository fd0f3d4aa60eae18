//! SUMO's Traffic Control Interface
//!
//! A minimal client for the handful of calls the controller needs, plus a
//! launcher that starts SUMO and attaches to it.

mod client;
mod codec;
pub mod constants;
mod launcher;

pub use client::{TraciClient, CONNECT_RETRY_WAIT};
pub use codec::{encode_message, ensure_type, read_message, Command, Response};
pub use launcher::{find_sumo_binary, free_port, SumoLaunch, SumoSession};
