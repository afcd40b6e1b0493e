//! Campus Access Control
//!
//! Scoped authorization in front of the enrollment engine.
//!
//! # Architecture
//!
//! - **Scope resolver**: role + organizational anchor → yes/no per resource
//! - **Authorization gate**: resolves the matching scope, then calls the engine
//!
//! A denied call returns `Forbidden` and leaves no trace in the engine.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod error;
pub mod gate;
pub mod scope;

pub use error::{Error, Result};
pub use gate::AuthorizationGate;
pub use scope::{Actor, Role, ScopeResolver};
