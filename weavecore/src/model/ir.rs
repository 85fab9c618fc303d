use std::fmt;

use serde_derive::{Deserialize, Serialize};

use crate::model::message::Message;
use crate::model::name::Name;

/// A complete flattened program: the connections of the delivery network plus
/// the primitive function calls to spawn as workers
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Receiver to senders wiring, one entry per receiving port
    pub connections: Vec<Connection>,
    /// One entry per leaf worker
    pub funcs: Vec<FuncCall>,
}

/// One receiving port and the sending ports feeding it. More than one sender
/// makes the receiver a fan-in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// The receiving port
    pub receiver: PortAddr,
    /// The sending ports, never empty
    pub senders: Vec<PortAddr>,
}

/// A primitive function call: the worker a leaf node becomes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuncCall {
    /// The name of the primitive function in the runtime registry
    #[serde(rename = "ref")]
    pub func: Name,
    /// The worker's ports
    pub io: FuncPorts,
    /// The message bound to the call by a `bind` directive, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<Message>,
}

/// The input and output port addresses of a function call
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FuncPorts {
    /// The input ports, one entry per array slot
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<PortAddr>,
    /// The output ports, one entry per array slot
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<PortAddr>,
}

/// The address of one port of one worker in the flattened graph. The path
/// encodes the worker's position in the original component tree, ending in a
/// synthetic `in` or `out` segment for the side the port is on.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortAddr {
    /// Hierarchical path of the worker, e.g. `root/reader/out`
    pub path: String,
    /// The port name
    pub port: Name,
    /// The slot index, 0 for scalar ports
    #[serde(default, skip_serializing_if = "is_zero")]
    pub idx: u8,
    /// Whether the port is a slot of an array port
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_array: bool,
}

fn is_zero(idx: &u8) -> bool {
    *idx == 0
}

impl PortAddr {
    /// Address of a scalar port
    pub fn new(path: &str, port: &str) -> Self {
        PortAddr {
            path: path.to_string(),
            port: port.to_string(),
            idx: 0,
            is_array: false,
        }
    }

    /// Address of one slot of an array port
    pub fn slot(path: &str, port: &str, idx: u8) -> Self {
        PortAddr {
            path: path.to_string(),
            port: port.to_string(),
            idx,
            is_array: true,
        }
    }
}

impl fmt::Display for PortAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // the synthetic in/out segment is noise in diagnostics
        let path = self
            .path
            .strip_suffix("/in")
            .or_else(|| self.path.strip_suffix("/out"))
            .unwrap_or(&self.path);

        if self.is_array {
            write!(f, "{}:{}[{}]", path, self.port, self.idx)
        } else {
            write!(f, "{}:{}", path, self.port)
        }
    }
}

#[cfg(test)]
mod test {
    use super::PortAddr;

    #[test]
    fn display_strips_out_segment() {
        assert_eq!(PortAddr::new("root/reader/out", "v").to_string(), "root/reader:v");
    }

    #[test]
    fn display_strips_in_segment() {
        assert_eq!(PortAddr::new("root/adder/in", "a").to_string(), "root/adder:a");
    }

    #[test]
    fn display_array_slot() {
        assert_eq!(
            PortAddr::slot("root/merge/in", "v", 1).to_string(),
            "root/merge:v[1]"
        );
    }

    #[test]
    fn serde_skips_defaults() {
        let json = serde_json::to_string(&PortAddr::new("root/in", "sig"))
            .expect("Could not serialize");
        assert_eq!(json, "{\"path\":\"root/in\",\"port\":\"sig\"}");
    }
}
