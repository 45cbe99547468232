//! Step relay: fans recorded browser steps out to every connected viewer and
//! drives one-shot browser automation over HTTP.

pub mod api;
pub mod automation;
pub mod browser;
pub mod config;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod routes;
pub mod state;
pub mod types;
pub mod ws;
