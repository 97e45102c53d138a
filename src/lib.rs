//! nutrisync document server.
//!
//! The server keeps one document per user and exposes it over HTTP for the
//! sync clients in `nutrisync-core`.

pub mod server;
