#![deny(missing_docs)]
#![warn(clippy::unwrap_used)]

//! `weaver` is the weave runtime library. Given a flattened IR program it
//! allocates one rendezvous channel per port, spawns one thread per primitive
//! worker and one per delivery connection, and runs the network until the
//! program reports an exit code or quiesces.

/// port channels and the worker-side port bundles
pub mod channels;

/// builds and runs a program: channel allocation, worker spawning, shutdown
pub mod coordinator;

/// contains [errors::Error] that other modules in this crate will `use errors::*;`
/// to get access to everything `error_chain` creates.
pub mod errors;

/// the builtin primitive worker factories and their registry
pub mod funcs;

/// the delivery network: pipe, fan-in and fan-out tasks plus interceptors
pub mod network;

/// the cancellation signal shared by every task
pub mod signal;
