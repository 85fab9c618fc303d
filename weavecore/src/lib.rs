#![deny(missing_docs)]
#![warn(clippy::unwrap_used)]

//! `weavecore` defines the core structs and traits used by the weave compiler
//! (`weavec`) and the weave runtime (`weaver`): the type system, the source
//! tree model produced by the parser, the flattened intermediate
//! representation executed by the runtime, and the message values that travel
//! over port channels.

/// loading of source trees from the text formats they can be stored in, keyed by file extension
pub mod deserializers;

/// contains [errors::Error] that other modules in this crate will `use errors::*;`
/// to get access to everything `error_chain` creates.
pub mod errors;

/// defines the data structures describing weave programs at every stage of compilation
pub mod model;
