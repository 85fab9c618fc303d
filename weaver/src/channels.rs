use std::cell::Cell;
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

use weavecore::model::ir::PortAddr;
use weavecore::model::message::Message;

use crate::errors::*;
use crate::signal::Signal;

/// How long a blocked receive waits before re-checking the cancellation
/// signal. Receivers must keep polling: a blocked send only unblocks once its
/// receiving end observes cancellation and drops out.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A message travelling through a port channel, tagged with the emission
/// index its sender assigned to it. Indexes restore ordering at fan-in.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedMsg {
    /// The payload
    pub msg: Message,
    /// Monotonically increasing per sender, assigned at emission
    pub index: u64,
}

/// The worker-side reading end of one port channel
#[derive(Debug)]
pub struct InPort {
    addr: PortAddr,
    port: Receiver<IndexedMsg>,
}

impl InPort {
    /// Wrap the reading end of a channel
    pub fn new(addr: PortAddr, port: Receiver<IndexedMsg>) -> Self {
        InPort { addr, port }
    }

    /// The address this port is known by in the IR
    pub fn addr(&self) -> &PortAddr {
        &self.addr
    }

    /// Receive the next message. Returns `None` once the signal is cancelled
    /// or every sender is gone; the worker body should return then.
    pub fn recv(&self, signal: &Signal) -> Option<Message> {
        loop {
            if signal.is_cancelled() {
                return None;
            }
            match self.port.recv_timeout(POLL_INTERVAL) {
                Ok(indexed) => return Some(indexed.msg),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

/// The worker-side writing end of one port channel. Assigns each outgoing
/// message the next emission index.
#[derive(Debug)]
pub struct OutPort {
    addr: PortAddr,
    port: SyncSender<IndexedMsg>,
    next_index: Cell<u64>,
}

impl OutPort {
    /// Wrap the writing end of a channel
    pub fn new(addr: PortAddr, port: SyncSender<IndexedMsg>) -> Self {
        OutPort {
            addr,
            port,
            next_index: Cell::new(0),
        }
    }

    /// The address this port is known by in the IR
    pub fn addr(&self) -> &PortAddr {
        &self.addr
    }

    /// Send a message, blocking until the delivery network takes it. Returns
    /// false once the signal is cancelled or the network side is gone; the
    /// worker body should return then. A send blocked mid-handoff unblocks on
    /// cancellation because the receiving task drops its channel end.
    pub fn send(&self, msg: Message, signal: &Signal) -> bool {
        if signal.is_cancelled() {
            return false;
        }

        let index = self.next_index.get();
        self.next_index.set(index + 1);

        self.port.send(IndexedMsg { msg, index }).is_ok() && !signal.is_cancelled()
    }
}

/// The input ports of one worker, consumed by its factory during port lookup
#[derive(Debug, Default)]
pub struct InPorts(Vec<InPort>);

impl InPorts {
    /// Bundle a worker's input ports
    pub fn new(ports: Vec<InPort>) -> Self {
        InPorts(ports)
    }

    /// Take the single channel of scalar port `name`. A lookup on an array
    /// port with this method is an error.
    pub fn take(&mut self, name: &str) -> Result<InPort> {
        take_port(&mut self.0, name, |port| &port.addr)
    }

    /// Take the ordered slot channels of array port `name`. A lookup on a
    /// scalar port with this method is an error.
    pub fn take_array(&mut self, name: &str) -> Result<Vec<InPort>> {
        take_array(&mut self.0, name, |port| &port.addr)
    }
}

/// The output ports of one worker, consumed by its factory during port lookup
#[derive(Debug, Default)]
pub struct OutPorts(Vec<OutPort>);

impl OutPorts {
    /// Bundle a worker's output ports
    pub fn new(ports: Vec<OutPort>) -> Self {
        OutPorts(ports)
    }

    /// Take the single channel of scalar port `name`
    pub fn take(&mut self, name: &str) -> Result<OutPort> {
        take_port(&mut self.0, name, |port| &port.addr)
    }

    /// Take the ordered slot channels of array port `name`
    pub fn take_array(&mut self, name: &str) -> Result<Vec<OutPort>> {
        take_array(&mut self.0, name, |port| &port.addr)
    }
}

/// The ports a worker is created with, bound to their channel endpoints
#[derive(Debug, Default)]
pub struct FuncIO {
    /// The worker's input ports
    pub inputs: InPorts,
    /// The worker's output ports
    pub outputs: OutPorts,
}

fn take_port<P>(ports: &mut Vec<P>, name: &str, addr: impl Fn(&P) -> &PortAddr) -> Result<P> {
    let position = ports
        .iter()
        .position(|port| addr(port).port == name)
        .ok_or_else(|| format!("Port '{name}' not found"))?;
    if addr(&ports[position]).is_array {
        bail!("Port '{name}' is an array port, expected a scalar port");
    }
    Ok(ports.remove(position))
}

fn take_array<P>(
    ports: &mut Vec<P>,
    name: &str,
    addr: impl Fn(&P) -> &PortAddr,
) -> Result<Vec<P>> {
    if ports
        .iter()
        .any(|port| addr(port).port == name && !addr(port).is_array)
    {
        bail!("Port '{name}' is a scalar port, expected an array port");
    }

    let mut slots: Vec<P> = vec![];
    let mut position = 0;
    while position < ports.len() {
        if addr(&ports[position]).port == name {
            slots.push(ports.remove(position));
        } else {
            position += 1;
        }
    }
    if slots.is_empty() {
        bail!("Array port '{name}' not found");
    }
    slots.sort_by_key(|port| addr(port).idx);
    Ok(slots)
}
