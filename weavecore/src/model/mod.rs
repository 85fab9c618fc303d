/// `component` defines a reusable graph template with an interface, child nodes and a network
pub mod component;
/// `connection` defines the wiring between sender ports and receiver ports of nodes
pub mod connection;
/// `constant` defines compile-time constant values and references between them
pub mod constant;
/// `entity` defines the kinds of named definitions a source file can contain
pub mod entity;
/// `interface` defines the ports exposed by a component or entity
pub mod interface;
/// `ir` defines the flat intermediate representation executed by the runtime
pub mod ir;
/// `message` defines the immutable values exchanged over port channels
pub mod message;
/// `meta` defines source locations and ranges used in diagnostics
pub mod meta;
/// `module` defines the source tree (packages, files) and the entity resolution scope
pub mod module;
/// `name` defines the `Name` type used to name entities, nodes and ports
pub mod name;
/// `types` defines the type expression and type definition model
pub mod types;
