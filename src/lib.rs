//! Remote-seeded user-data initialization.
//!
//! The first time a web-hosted session runs in a fresh profile, local user
//! data (settings, keybindings, snippets, global state, extensions) is seeded
//! from the user's remote sync store. The bootstrap is best effort and runs
//! at most once per resource kind per process.

pub mod api;
pub mod domain;
pub mod environment;
pub mod initialization;
pub mod lifecycle;
pub mod session;
pub mod storage;
