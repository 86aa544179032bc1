//! # exam-admin
//!
//! Admin client for the examination platform. Owns the authenticated-session
//! lifecycle, the bearer-token request pipeline, the route guard that gates
//! protected screens, and the cached read bindings those screens use.
//!
//! The `exam-admin` binary wires these together into a command-line console;
//! any other shell (desktop, web) can reuse the same [`app::AdminApp`].

pub mod admin;
pub mod app;
pub mod config;
pub mod net;
pub mod resource;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
