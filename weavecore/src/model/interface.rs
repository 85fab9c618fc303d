use serde_derive::{Deserialize, Serialize};

use crate::model::name::Name;
use crate::model::types::{TypeExpr, TypeParam};

/// An interface: type parameters plus the input and output ports a component
/// implementing it must expose
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    /// Type parameters the port types can refer to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<TypeParam>,
    /// The input and output ports
    #[serde(default)]
    pub io: Io,
}

/// The input and output ports of an interface, in declaration order
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Io {
    /// The input ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<Port>,
    /// The output ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<Port>,
}

/// A named, typed message endpoint on an interface
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// The port name, unique within its direction
    pub name: Name,
    /// The type of messages the port carries
    #[serde(rename = "type")]
    pub type_expr: TypeExpr,
    /// Whether the port is an array port with indexed slots
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_array: bool,
}

impl Port {
    /// Create a new scalar port
    pub fn new(name: &str, type_expr: TypeExpr) -> Self {
        Port {
            name: name.to_string(),
            type_expr,
            is_array: false,
        }
    }
}

impl Io {
    /// Find an input port by name
    pub fn input(&self, name: &str) -> Option<&Port> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Find an output port by name
    pub fn output(&self, name: &str) -> Option<&Port> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

/// Find the first duplicated port name in a direction's port list
pub fn duplicate_port_name(ports: &[Port]) -> Option<&Name> {
    for (index, port) in ports.iter().enumerate() {
        if ports[..index].iter().any(|other| other.name == port.name) {
            return Some(&port.name);
        }
    }
    None
}
