//! Video Reels — a minimal short-video sharing demo.
//!
//! Server side: an axum HTTP API over a flat upload directory plus a JSON
//! metadata ledger (`store`, `handlers`). Client side: a terminal feed
//! viewer driving the feed state machine with a sliding preload window
//! (`feed`, `preload`, `player`, `viewer`) and an upload flow
//! (`server_api`).

pub mod config;
pub mod error;
pub mod feed;
pub mod handlers;
pub mod models;
pub mod player;
pub mod preload;
pub mod probe;
pub mod server_api;
pub mod store;
pub mod system_info;
pub mod viewer;
