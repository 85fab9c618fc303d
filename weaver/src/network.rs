use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::trace;

use weavecore::model::ir;
use weavecore::model::message::Message;

use crate::channels::{IndexedMsg, POLL_INTERVAL};
use crate::errors::*;
use crate::signal::Signal;

/// How long a fan-in backs off between sweeps while nothing has arrived yet
const SWEEP_BACKOFF: Duration = Duration::from_micros(100);

/// Hooks invoked around every message delivery. Implementations must be
/// side-effect-only and must not block.
pub trait Interceptor: Send + Sync {
    /// Called when a message leaves `sender` towards `receiver`, before
    /// delivery. Returning `Some` substitutes the payload.
    fn sent(&self, sender: &ir::PortAddr, receiver: &ir::PortAddr, msg: &Message)
        -> Option<Message>;

    /// Called after the message was successfully handed to `receiver`
    fn received(&self, sender: &ir::PortAddr, receiver: &ir::PortAddr, msg: &Message);
}

/// The interceptor used when no tracing is wanted
pub struct Noop;

impl Interceptor for Noop {
    fn sent(&self, _: &ir::PortAddr, _: &ir::PortAddr, _: &Message) -> Option<Message> {
        None
    }

    fn received(&self, _: &ir::PortAddr, _: &ir::PortAddr, _: &Message) {}
}

/// An interceptor that logs every delivery event
pub struct Trace;

impl Interceptor for Trace {
    fn sent(
        &self,
        sender: &ir::PortAddr,
        receiver: &ir::PortAddr,
        msg: &Message,
    ) -> Option<Message> {
        trace!("sent: {sender} -> {receiver} {msg}");
        None
    }

    fn received(&self, sender: &ir::PortAddr, receiver: &ir::PortAddr, msg: &Message) {
        trace!("received: {sender} -> {receiver} {msg}");
    }
}

/// The network-side reading end of a sender's port channel
struct NetSender {
    addr: ir::PortAddr,
    port: Receiver<IndexedMsg>,
}

/// The network-side writing end of a receiver's port channel
struct NetReceiver {
    addr: ir::PortAddr,
    port: SyncSender<IndexedMsg>,
}

/// One delivery task: a receiver and the senders feeding it
struct NetConnection {
    receiver: NetReceiver,
    senders: Vec<NetSender>,
}

/// A sender wired to several receivers: its messages are value-copied into
/// one forwarding channel per receiving connection
struct FanOut {
    source: NetSender,
    sinks: Vec<SyncSender<IndexedMsg>>,
}

/// The delivery network: one task per connection moving messages from senders
/// to receivers, preserving per-sender order
pub struct Network {
    connections: Vec<NetConnection>,
    fan_outs: Vec<FanOut>,
    drains: Vec<NetSender>,
    interceptor: Arc<dyn Interceptor>,
}

impl Network {
    /// Wire the delivery network up from the IR connection table and the
    /// channel ends the coordinator allocated. Every channel end must be used
    /// by exactly one task; senders shared between connections are split
    /// through a fan-out first. Sender ends left unwired are drained so their
    /// workers never block on an unused outport.
    pub fn new(
        connections: &[ir::Connection],
        mut sender_ends: HashMap<ir::PortAddr, Receiver<IndexedMsg>>,
        mut receiver_ends: HashMap<ir::PortAddr, SyncSender<IndexedMsg>>,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<Network> {
        let mut sender_uses: HashMap<&ir::PortAddr, usize> = HashMap::new();
        for connection in connections {
            for sender in &connection.senders {
                *sender_uses.entry(sender).or_insert(0) += 1;
            }
        }

        let mut fan_outs: HashMap<ir::PortAddr, FanOut> = HashMap::new();
        let mut built = vec![];

        for connection in connections {
            if connection.senders.is_empty() {
                bail!("Connection into '{}' has no senders", connection.receiver);
            }

            let port = receiver_ends.remove(&connection.receiver).ok_or_else(|| {
                format!(
                    "Receiver '{}' has no channel or is wired twice",
                    connection.receiver
                )
            })?;
            let receiver = NetReceiver {
                addr: connection.receiver.clone(),
                port,
            };

            let mut senders = vec![];
            for addr in &connection.senders {
                let port = if sender_uses.get(addr).copied().unwrap_or(0) > 1 {
                    if !fan_outs.contains_key(addr) {
                        let source_port = sender_ends.remove(addr).ok_or_else(|| {
                            format!("Sender '{addr}' has no channel or is wired twice")
                        })?;
                        fan_outs.insert(
                            addr.clone(),
                            FanOut {
                                source: NetSender {
                                    addr: addr.clone(),
                                    port: source_port,
                                },
                                sinks: vec![],
                            },
                        );
                    }
                    let (sink, forwarded) = mpsc::sync_channel(0);
                    if let Some(fan_out) = fan_outs.get_mut(addr) {
                        fan_out.sinks.push(sink);
                    }
                    forwarded
                } else {
                    sender_ends.remove(addr).ok_or_else(|| {
                        format!("Sender '{addr}' has no channel or is wired twice")
                    })?
                };
                senders.push(NetSender {
                    addr: addr.clone(),
                    port,
                });
            }

            built.push(NetConnection { receiver, senders });
        }

        // outports nothing listens to are consumed so their workers can run
        let drains = sender_ends
            .into_iter()
            .map(|(addr, port)| NetSender { addr, port })
            .collect();

        Ok(Network {
            connections: built,
            fan_outs: fan_outs.into_values().collect(),
            drains,
            interceptor,
        })
    }

    /// Spawn one thread per fan-out, drain and connection. The threads run
    /// until the signal is cancelled or their channels disconnect.
    pub fn spawn(self, signal: &Signal) -> Vec<JoinHandle<()>> {
        let mut handles = vec![];

        for fan_out in self.fan_outs {
            let task_signal = signal.clone();
            handles.push(thread::spawn(move || run_fan_out(fan_out, &task_signal)));
        }

        for drain in self.drains {
            let task_signal = signal.clone();
            handles.push(thread::spawn(move || run_drain(drain, &task_signal)));
        }

        for connection in self.connections {
            let interceptor = self.interceptor.clone();
            let task_signal = signal.clone();
            handles.push(thread::spawn(move || {
                if connection.senders.len() == 1 {
                    let mut senders = connection.senders;
                    let sender = senders.remove(0);
                    pipe(connection.receiver, sender, &interceptor, &task_signal);
                } else {
                    fan_in(
                        connection.receiver,
                        connection.senders,
                        &interceptor,
                        &task_signal,
                    );
                }
            }));
        }

        handles
    }
}

/// Receive one indexed message, preempted by cancellation and disconnection
pub(crate) fn recv_indexed(port: &Receiver<IndexedMsg>, signal: &Signal) -> Option<IndexedMsg> {
    loop {
        if signal.is_cancelled() {
            return None;
        }
        match port.recv_timeout(POLL_INTERVAL) {
            Ok(indexed) => return Some(indexed),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
}

/// Deliver one indexed message, blocking until the receiving side takes it.
/// A blocked delivery unblocks on cancellation because the receiving worker
/// polls the signal and drops its channel end.
pub(crate) fn send_indexed(
    port: &SyncSender<IndexedMsg>,
    msg: IndexedMsg,
    signal: &Signal,
) -> bool {
    if signal.is_cancelled() {
        return false;
    }
    port.send(msg).is_ok() && !signal.is_cancelled()
}

/// Move messages from one sender to one receiver in order
fn pipe(receiver: NetReceiver, sender: NetSender, interceptor: &Arc<dyn Interceptor>, signal: &Signal) {
    loop {
        let mut indexed = match recv_indexed(&sender.port, signal) {
            Some(indexed) => indexed,
            None => return,
        };

        if let Some(replacement) = interceptor.sent(&sender.addr, &receiver.addr, &indexed.msg) {
            indexed.msg = replacement;
        }

        let delivered = indexed.msg.clone();
        if !send_indexed(&receiver.port, indexed, signal) {
            return;
        }
        interceptor.received(&sender.addr, &receiver.addr, &delivered);
    }
}

/// Merge messages from several senders into one receiver. Each round sweeps
/// every sender non-blockingly, keeps sweeping for at least one full pass per
/// sender after the first hit, then delivers the buffered batch sorted by
/// emission index. Within one sender order is FIFO end to end; across senders
/// each batch is delivered in ascending index order.
fn fan_in(
    receiver: NetReceiver,
    senders: Vec<NetSender>,
    interceptor: &Arc<dyn Interceptor>,
    signal: &Signal,
) {
    loop {
        let mut buf: Vec<(usize, IndexedMsg)> = vec![];
        let mut sweeps = 0;

        loop {
            if !buf.is_empty() && sweeps >= senders.len() {
                break;
            }

            let mut gone = 0;
            for (position, sender) in senders.iter().enumerate() {
                match sender.port.try_recv() {
                    Ok(mut indexed) => {
                        if let Some(replacement) =
                            interceptor.sent(&sender.addr, &receiver.addr, &indexed.msg)
                        {
                            indexed.msg = replacement;
                        }
                        buf.push((position, indexed));
                    }
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => gone += 1,
                }
            }

            if signal.is_cancelled() {
                return;
            }

            if buf.is_empty() {
                if gone == senders.len() {
                    return;
                }
                // a send may happen exactly while we miss a sweep, so the
                // sweep count only starts once something arrived
                sweeps = 0;
                thread::sleep(SWEEP_BACKOFF);
            } else {
                sweeps += 1;
                thread::yield_now();
            }
        }

        buf.sort_by_key(|(_, indexed)| indexed.index);

        for (position, indexed) in buf {
            let delivered = indexed.msg.clone();
            if !send_indexed(&receiver.port, indexed, signal) {
                return;
            }
            interceptor.received(&senders[position].addr, &receiver.addr, &delivered);
        }
    }
}

/// Copy each message from a shared sender into every receiving connection
fn run_fan_out(fan_out: FanOut, signal: &Signal) {
    loop {
        let indexed = match recv_indexed(&fan_out.source.port, signal) {
            Some(indexed) => indexed,
            None => return,
        };
        for sink in &fan_out.sinks {
            if !send_indexed(sink, indexed.clone(), signal) {
                return;
            }
        }
    }
}

/// Consume and discard everything an unwired outport emits
fn run_drain(drain: NetSender, signal: &Signal) {
    while recv_indexed(&drain.port, signal).is_some() {}
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::sync::mpsc;
    use std::sync::Arc;

    use weavecore::model::ir;
    use weavecore::model::message::Message;

    use crate::channels::IndexedMsg;
    use crate::signal::Signal;

    use super::{Interceptor, Network, Noop};

    fn addr(path: &str) -> ir::PortAddr {
        ir::PortAddr::new(path, "v")
    }

    fn indexed(value: i64, index: u64) -> IndexedMsg {
        IndexedMsg {
            msg: Message::Int(value),
            index,
        }
    }

    #[test]
    fn pipe_preserves_fifo_order() {
        let sender_addr = addr("root/a/out");
        let receiver_addr = addr("root/b/in");

        let (source_tx, source_rx) = mpsc::sync_channel(0);
        let (dest_tx, dest_rx) = mpsc::sync_channel(0);

        let connections = vec![ir::Connection {
            receiver: receiver_addr.clone(),
            senders: vec![sender_addr.clone()],
        }];
        let mut sender_ends = HashMap::new();
        sender_ends.insert(sender_addr, source_rx);
        let mut receiver_ends = HashMap::new();
        receiver_ends.insert(receiver_addr, dest_tx);

        let network = Network::new(&connections, sender_ends, receiver_ends, Arc::new(Noop))
            .expect("Could not build network");
        let signal = Signal::new();
        let handles = network.spawn(&signal);

        let writer = std::thread::spawn(move || {
            for value in 0..50 {
                source_tx
                    .send(indexed(value, value as u64))
                    .expect("Could not send");
            }
        });

        let received: Vec<i64> = (0..50)
            .map(|_| {
                dest_rx
                    .recv()
                    .expect("Could not receive")
                    .msg
                    .as_int()
                    .expect("Not an int")
            })
            .collect();
        assert_eq!(received, (0..50).collect::<Vec<i64>>());

        writer.join().expect("Writer panicked");
        signal.cancel();
        for handle in handles {
            handle.join().expect("Network task panicked");
        }
    }

    #[test]
    fn fan_in_preserves_per_sender_order() {
        let s1 = addr("root/s1/out");
        let s2 = addr("root/s2/out");
        let receiver_addr = addr("root/r/in");

        let (tx1, rx1) = mpsc::sync_channel(0);
        let (tx2, rx2) = mpsc::sync_channel(0);
        let (dest_tx, dest_rx) = mpsc::sync_channel(0);

        let connections = vec![ir::Connection {
            receiver: receiver_addr.clone(),
            senders: vec![s1.clone(), s2.clone()],
        }];
        let mut sender_ends = HashMap::new();
        sender_ends.insert(s1, rx1);
        sender_ends.insert(s2, rx2);
        let mut receiver_ends = HashMap::new();
        receiver_ends.insert(receiver_addr, dest_tx);

        let network = Network::new(&connections, sender_ends, receiver_ends, Arc::new(Noop))
            .expect("Could not build network");
        let signal = Signal::new();
        let handles = network.spawn(&signal);

        let writer1 = std::thread::spawn(move || {
            for (index, value) in [1i64, 2, 3].iter().enumerate() {
                tx1.send(indexed(*value, index as u64)).expect("Could not send");
            }
        });
        let writer2 = std::thread::spawn(move || {
            for (index, value) in [10i64, 20, 30].iter().enumerate() {
                tx2.send(indexed(*value, index as u64)).expect("Could not send");
            }
        });

        let received: Vec<i64> = (0..6)
            .map(|_| {
                dest_rx
                    .recv()
                    .expect("Could not receive")
                    .msg
                    .as_int()
                    .expect("Not an int")
            })
            .collect();

        let low: Vec<i64> = received.iter().copied().filter(|v| *v < 10).collect();
        let high: Vec<i64> = received.iter().copied().filter(|v| *v >= 10).collect();
        assert_eq!(low, vec![1, 2, 3], "sender 1 order not preserved");
        assert_eq!(high, vec![10, 20, 30], "sender 2 order not preserved");

        writer1.join().expect("Writer 1 panicked");
        writer2.join().expect("Writer 2 panicked");
        signal.cancel();
        for handle in handles {
            handle.join().expect("Network task panicked");
        }
    }

    #[test]
    fn shared_sender_fans_out_to_all_receivers() {
        let sender_addr = addr("root/a/out");
        let r1 = addr("root/b/in");
        let r2 = addr("root/c/in");

        let (source_tx, source_rx) = mpsc::sync_channel(0);
        let (dest1_tx, dest1_rx) = mpsc::sync_channel(0);
        let (dest2_tx, dest2_rx) = mpsc::sync_channel(0);

        let connections = vec![
            ir::Connection {
                receiver: r1.clone(),
                senders: vec![sender_addr.clone()],
            },
            ir::Connection {
                receiver: r2.clone(),
                senders: vec![sender_addr.clone()],
            },
        ];
        let mut sender_ends = HashMap::new();
        sender_ends.insert(sender_addr, source_rx);
        let mut receiver_ends = HashMap::new();
        receiver_ends.insert(r1, dest1_tx);
        receiver_ends.insert(r2, dest2_tx);

        let network = Network::new(&connections, sender_ends, receiver_ends, Arc::new(Noop))
            .expect("Could not build network");
        let signal = Signal::new();
        let handles = network.spawn(&signal);

        let writer = std::thread::spawn(move || {
            for value in 0..5 {
                source_tx
                    .send(indexed(value, value as u64))
                    .expect("Could not send");
            }
        });

        let got1: Vec<i64> = (0..5)
            .map(|_| dest1_rx.recv().expect("r1 recv").msg.as_int().expect("int"))
            .collect();
        let got2: Vec<i64> = (0..5)
            .map(|_| dest2_rx.recv().expect("r2 recv").msg.as_int().expect("int"))
            .collect();
        assert_eq!(got1, (0..5).collect::<Vec<i64>>());
        assert_eq!(got2, (0..5).collect::<Vec<i64>>());

        writer.join().expect("Writer panicked");
        signal.cancel();
        for handle in handles {
            handle.join().expect("Network task panicked");
        }
    }

    struct Bump;

    impl Interceptor for Bump {
        fn sent(
            &self,
            _: &ir::PortAddr,
            _: &ir::PortAddr,
            msg: &Message,
        ) -> Option<Message> {
            msg.as_int().map(|value| Message::Int(value + 1))
        }

        fn received(&self, _: &ir::PortAddr, _: &ir::PortAddr, _: &Message) {}
    }

    #[test]
    fn interceptor_substitutes_payload() {
        let sender_addr = addr("root/a/out");
        let receiver_addr = addr("root/b/in");

        let (source_tx, source_rx) = mpsc::sync_channel(0);
        let (dest_tx, dest_rx) = mpsc::sync_channel(0);

        let connections = vec![ir::Connection {
            receiver: receiver_addr.clone(),
            senders: vec![sender_addr.clone()],
        }];
        let mut sender_ends = HashMap::new();
        sender_ends.insert(sender_addr, source_rx);
        let mut receiver_ends = HashMap::new();
        receiver_ends.insert(receiver_addr, dest_tx);

        let network = Network::new(&connections, sender_ends, receiver_ends, Arc::new(Bump))
            .expect("Could not build network");
        let signal = Signal::new();
        let handles = network.spawn(&signal);

        source_tx.send(indexed(41, 0)).expect("Could not send");
        let got = dest_rx.recv().expect("Could not receive");
        assert_eq!(got.msg, Message::Int(42));

        signal.cancel();
        drop(source_tx);
        for handle in handles {
            handle.join().expect("Network task panicked");
        }
    }

    #[test]
    fn missing_receiver_channel_is_an_error() {
        let connections = vec![ir::Connection {
            receiver: addr("root/b/in"),
            senders: vec![addr("root/a/out")],
        }];
        assert!(Network::new(
            &connections,
            HashMap::new(),
            HashMap::new(),
            Arc::new(Noop)
        )
        .is_err());
    }
}
