//! Networking modules for the admin REST API.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` sends requests, `credential` holds the installed bearer token,
//! `interceptor` decorates requests and handles `401`s, `account` covers the
//! public registration and password-reset flows, and `types` defines the
//! shared wire schema.

pub mod account;
pub mod api;
pub mod credential;
pub mod interceptor;
pub mod types;
