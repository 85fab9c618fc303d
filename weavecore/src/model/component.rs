use std::collections::BTreeMap;

use serde_derive::{Deserialize, Serialize};

use crate::model::connection::Connection;
use crate::model::entity::EntityRef;
use crate::model::interface::Interface;
use crate::model::meta::SourceRange;
use crate::model::name::Name;
use crate::model::types::TypeExpr;

/// The directive binding a component to a primitive runtime function.
/// Its arguments are either one function name, or `<typeArg> <funcName>` pairs
/// selected by the stringified first type argument of the node.
pub const EXTERN_DIRECTIVE: &str = "extern";

/// The directive binding a constant's message to a node, read by the runtime
/// function when it is created
pub const BIND_DIRECTIVE: &str = "bind";

/// Compile-time annotations attached to a component or node, by directive name
pub type Directives = BTreeMap<Name, Vec<String>>;

/// A reusable graph template: an interface, child nodes and the network wiring them
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// The component's typed interface
    #[serde(default)]
    pub interface: Interface,
    /// Compile-time annotations such as `extern`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub directives: Directives,
    /// The child nodes, by instance name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nodes: BTreeMap<Name, Node>,
    /// The network of connections between node ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub net: Vec<Connection>,
    /// Where the component was defined
    #[serde(default, skip_serializing_if = "crate::model::connection::range_is_default")]
    pub meta: SourceRange,
}

impl Component {
    /// Return the arguments of the component's `extern` directive, if it has one.
    /// A component with this directive is a leaf bound to a primitive function.
    pub fn extern_args(&self) -> Option<&Vec<String>> {
        self.directives.get(EXTERN_DIRECTIVE)
    }
}

/// An instance of a component or interface inside another component
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// The component or interface instantiated by this node
    pub component: EntityRef,
    /// Type arguments for the target's type parameters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_args: Vec<TypeExpr>,
    /// For nodes whose children reference interfaces: the concrete nodes to
    /// substitute for them, by child node name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deps: BTreeMap<Name, Node>,
    /// Compile-time annotations such as `bind`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub directives: Directives,
    /// Where the node was declared
    #[serde(default, skip_serializing_if = "crate::model::connection::range_is_default")]
    pub meta: SourceRange,
}

impl Node {
    /// Create a node instantiating `component` with no type arguments
    pub fn new(component: EntityRef) -> Self {
        Node {
            component,
            type_args: vec![],
            deps: BTreeMap::new(),
            directives: Directives::new(),
            meta: SourceRange::default(),
        }
    }

    /// Return the single argument of the node's `bind` directive, if present
    pub fn bind_arg(&self) -> Option<&String> {
        self.directives.get(BIND_DIRECTIVE).and_then(|args| args.first())
    }
}
