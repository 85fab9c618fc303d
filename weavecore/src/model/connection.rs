use std::fmt;

use serde_derive::{Deserialize, Serialize};

use crate::model::entity::EntityRef;
use crate::model::meta::SourceRange;
use crate::model::name::Name;

/// Skip-serializing helper for defaulted source ranges
pub fn range_is_default(range: &SourceRange) -> bool {
    *range == SourceRange::default()
}

/// A connection in a component's network, from one sender to one or more receivers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Where the messages come from
    pub sender: SenderSide,
    /// Where the messages go to
    pub receiver: ReceiverSide,
    /// Where the connection was declared, preserved through desugaring for diagnostics
    #[serde(default, skip_serializing_if = "range_is_default")]
    pub meta: SourceRange,
}

/// The sending end of a connection: a port address or a constant reference,
/// optionally projected through struct field selectors
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SenderSide {
    /// The sending port, if the sender is a node port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<PortAddr>,
    /// The constant to emit, if the sender is a constant
    #[serde(default, rename = "const", skip_serializing_if = "Option::is_none")]
    pub const_ref: Option<EntityRef>,
    /// Struct field selectors projecting into the sent value
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selectors: Vec<Name>,
}

impl SenderSide {
    /// A sender side that is a plain port address
    pub fn from_addr(addr: PortAddr) -> Self {
        SenderSide {
            addr: Some(addr),
            ..Default::default()
        }
    }

    /// A sender side that emits a constant
    pub fn from_const(const_ref: EntityRef) -> Self {
        SenderSide {
            const_ref: Some(const_ref),
            ..Default::default()
        }
    }
}

impl fmt::Display for SenderSide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.addr, &self.const_ref) {
            (Some(addr), _) => write!(f, "{addr}")?,
            (None, Some(const_ref)) => write!(f, "${const_ref}")?,
            (None, None) => write!(f, "?")?,
        }
        for selector in &self.selectors {
            write!(f, ".{selector}")?;
        }
        Ok(())
    }
}

/// The receiving end of a connection: either a set of port addresses, or a
/// "then" chain whose follow-on senders are implicit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiverSide {
    /// Deliver to each of these ports
    Addrs(Vec<PortAddr>),
    /// Deliver to the first port, then continue from that node's outport
    Then(ThenLink),
}

/// One link of a "then" chain: `a -> b:in -> c:in` is a link with first `b:in`
/// and rest the chain `c:in`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThenLink {
    /// The receiver of this link
    pub first: PortAddr,
    /// The rest of the chain, sent from the receiver node's outport
    pub rest: Box<ReceiverSide>,
}

impl ReceiverSide {
    /// A receiver side delivering to a single port
    pub fn to_addr(addr: PortAddr) -> Self {
        ReceiverSide::Addrs(vec![addr])
    }
}

/// The address of one port of one node: node name, port name and an optional
/// slot index. The index must be present on array ports and absent on others.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortAddr {
    /// The node the port belongs to. The synthetic names `in` and `out` refer
    /// to the enclosing component's own ports.
    pub node: Name,
    /// The port name
    pub port: Name,
    /// The slot index for array ports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idx: Option<u8>,
}

impl PortAddr {
    /// Address of a scalar port
    pub fn new(node: &str, port: &str) -> Self {
        PortAddr {
            node: node.to_string(),
            port: port.to_string(),
            idx: None,
        }
    }

    /// Address of one slot of an array port
    pub fn slot(node: &str, port: &str, idx: u8) -> Self {
        PortAddr {
            node: node.to_string(),
            port: port.to_string(),
            idx: Some(idx),
        }
    }
}

impl fmt::Display for PortAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.idx {
            Some(idx) => write!(f, "{}:{}[{}]", self.node, self.port, idx),
            None => write!(f, "{}:{}", self.node, self.port),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::model::entity::EntityRef;

    use super::{PortAddr, ReceiverSide, SenderSide, ThenLink};

    #[test]
    fn display_scalar_addr() {
        assert_eq!(PortAddr::new("reader", "v").to_string(), "reader:v");
    }

    #[test]
    fn display_slot_addr() {
        assert_eq!(PortAddr::slot("merge", "v", 2).to_string(), "merge:v[2]");
    }

    #[test]
    fn display_const_sender_with_selectors() {
        let mut sender = SenderSide::from_const(EntityRef::local("user"));
        sender.selectors = vec!["address".into(), "city".into()];
        assert_eq!(sender.to_string(), "$user.address.city");
    }

    #[test]
    fn then_chain_roundtrip() {
        let receiver = ReceiverSide::Then(ThenLink {
            first: PortAddr::new("print", "v"),
            rest: Box::new(ReceiverSide::to_addr(PortAddr::new("out", "v"))),
        });
        let json = serde_json::to_string(&receiver).expect("Could not serialize");
        let back: ReceiverSide = serde_json::from_str(&json).expect("Could not deserialize");
        assert_eq!(back, receiver);
    }
}
