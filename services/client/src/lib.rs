//! MockPrep Client Library Crate
//!
//! HTTP adapters for the core ports (backend gateway, auth provider, file
//! storage), configuration, logging setup and the shared application state.
//! The `mockprep` binary is a thin terminal front end over this library.

pub mod auth;
pub mod config;
pub mod gateway;
pub mod state;
pub mod storage;
pub mod telemetry;
