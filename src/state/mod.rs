//! Client-side session state.
//!
//! DESIGN
//! ======
//! `session` holds the observable snapshot, `storage` the durable credential
//! record, and `auth` the store that moves between them.

pub mod auth;
pub mod session;
pub mod storage;
