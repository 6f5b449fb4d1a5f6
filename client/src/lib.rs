//! Headless client sync layer for the virtual tabletop.
//!
//! SYSTEM CONTEXT
//! ==============
//! This crate holds the local projection of one joined map and the logic that
//! keeps it converged with the server: a pure reconciler over typed change
//! events, outbound request-frame builders for every mutation entry point, and
//! the debounce/backoff plumbing for drag sync and reconnects. It is
//! independent of any UI framework; a host shell owns the socket and the
//! render loop and calls into this crate from both.

pub mod reconcile;
pub mod session;
pub mod sync;
