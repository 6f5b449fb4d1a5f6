//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation and broadcast plumbing.

pub mod character;
pub mod combat;
pub mod fog;
pub mod map;
pub mod persistence;
pub mod token;
