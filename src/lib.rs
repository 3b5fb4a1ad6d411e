//! Playlist form controller for a Spotify playlist maker, and the server it
//! talks to.
//!
//! The controller modules build for both the browser (`wasm32`) and native
//! targets; the server modules are native only.

pub mod bulk;
pub mod client;
pub mod controller;
pub mod page;
pub mod runtime;
pub mod types;

#[cfg(not(target_arch = "wasm32"))]
pub mod config;
#[cfg(not(target_arch = "wasm32"))]
pub mod server;
#[cfg(not(target_arch = "wasm32"))]
pub mod session;
#[cfg(not(target_arch = "wasm32"))]
pub mod spotify;

#[cfg(target_arch = "wasm32")]
mod web;
