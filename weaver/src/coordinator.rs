use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread;

use log::{debug, error};

use weavecore::model::ir;
use weavecore::model::message::Message;

use crate::channels::{FuncIO, InPort, InPorts, IndexedMsg, OutPort, OutPorts};
use crate::errors::*;
use crate::funcs::Registry;
use crate::network::{recv_indexed, send_indexed, Interceptor, Network};
use crate::signal::Signal;

/// The root outport a program writes its exit status to
pub const CODE_PORT: &str = "code";

/// The path of the root component's own inports
const ROOT_IN: &str = "root/in";

/// The path of the root component's own outports
const ROOT_OUT: &str = "root/out";

/// Owns a program run: allocates one channel per port, spawns the workers and
/// the delivery network, watches the root outports for the exit status and
/// joins every task before returning.
pub struct Coordinator {
    registry: Registry,
    interceptor: Arc<dyn Interceptor>,
}

impl Coordinator {
    /// Create a coordinator executing functions from `registry`, with
    /// `interceptor` hooked around every delivery
    pub fn new(registry: Registry, interceptor: Arc<dyn Interceptor>) -> Self {
        Coordinator {
            registry,
            interceptor,
        }
    }

    /// Run `program` to completion and return its exit code: the first
    /// integer received on the root `code` outport, or 0 when the program
    /// quiesces or reports on another root outport
    pub fn run(&self, program: &ir::Program) -> Result<i32> {
        self.run_with_signal(program, &Signal::new())
    }

    /// [Coordinator::run] with an externally owned cancellation signal, so an
    /// embedder can stop the network from outside
    pub fn run_with_signal(&self, program: &ir::Program, signal: &Signal) -> Result<i32> {
        // one channel per unique port address: the worker keeps one end, the
        // delivery network the other
        let mut worker_ins: HashMap<ir::PortAddr, Receiver<IndexedMsg>> = HashMap::new();
        let mut worker_outs: HashMap<ir::PortAddr, SyncSender<IndexedMsg>> = HashMap::new();
        let mut sender_ends: HashMap<ir::PortAddr, Receiver<IndexedMsg>> = HashMap::new();
        let mut receiver_ends: HashMap<ir::PortAddr, SyncSender<IndexedMsg>> = HashMap::new();

        for call in &program.funcs {
            for addr in &call.io.inputs {
                if worker_ins.contains_key(addr) {
                    bail!("Input port '{addr}' is declared by more than one worker");
                }
                let (tx, rx) = mpsc::sync_channel(0);
                worker_ins.insert(addr.clone(), rx);
                receiver_ends.insert(addr.clone(), tx);
            }
            for addr in &call.io.outputs {
                if worker_outs.contains_key(addr) {
                    bail!("Output port '{addr}' is declared by more than one worker");
                }
                let (tx, rx) = mpsc::sync_channel(0);
                worker_outs.insert(addr.clone(), tx);
                sender_ends.insert(addr.clone(), rx);
            }
        }

        // ports appearing in connections but on no worker are boundary ports:
        // the root's own inports are primed with a start message and its
        // outports watched for the exit status. Any other dangling boundary
        // port stays silent (unfed inport) or is consumed (unread outport).
        let mut watched: Vec<(ir::PortAddr, Receiver<IndexedMsg>)> = vec![];
        let mut starters: Vec<SyncSender<IndexedMsg>> = vec![];
        let mut silent: Vec<SyncSender<IndexedMsg>> = vec![];
        for connection in &program.connections {
            if !receiver_ends.contains_key(&connection.receiver) {
                let (tx, rx) = mpsc::sync_channel(0);
                receiver_ends.insert(connection.receiver.clone(), tx);
                watched.push((connection.receiver.clone(), rx));
            }
            for sender in &connection.senders {
                if !sender_ends.contains_key(sender) {
                    let (tx, rx) = mpsc::sync_channel(0);
                    sender_ends.insert(sender.clone(), rx);
                    if sender.path == ROOT_IN {
                        starters.push(tx);
                    } else {
                        silent.push(tx);
                    }
                }
            }
        }

        // create the workers before spawning anything: a factory failure
        // (e.g. missing port) must abort the run before the network starts
        let mut bodies = vec![];
        for call in &program.funcs {
            let creator = self
                .registry
                .get(&call.func)
                .ok_or_else(|| format!("Function '{}' not found in the registry", call.func))?;

            let mut inputs = vec![];
            for addr in &call.io.inputs {
                let rx = worker_ins
                    .remove(addr)
                    .ok_or_else(|| format!("No channel allocated for input '{addr}'"))?;
                inputs.push(InPort::new(addr.clone(), rx));
            }
            let mut outputs = vec![];
            for addr in &call.io.outputs {
                let tx = worker_outs
                    .remove(addr)
                    .ok_or_else(|| format!("No channel allocated for output '{addr}'"))?;
                outputs.push(OutPort::new(addr.clone(), tx));
            }

            let io = FuncIO {
                inputs: InPorts::new(inputs),
                outputs: OutPorts::new(outputs),
            };
            let body = creator
                .create(io, call.msg.clone())
                .chain_err(|| format!("Could not create worker for function '{}'", call.func))?;
            bodies.push((call.func.clone(), body));
        }

        let network = Network::new(
            &program.connections,
            sender_ends,
            receiver_ends,
            self.interceptor.clone(),
        )?;

        debug!(
            "Starting {} worker(s) and {} connection(s)",
            bodies.len(),
            program.connections.len()
        );

        let mut worker_handles = vec![];
        for (name, body) in bodies {
            let worker_signal = signal.clone();
            worker_handles.push(thread::spawn(move || {
                let panic_signal = worker_signal.clone();
                if panic::catch_unwind(AssertUnwindSafe(move || body(worker_signal))).is_err() {
                    error!("Worker '{name}' panicked, cancelling the network");
                    panic_signal.cancel();
                }
            }));
        }

        let mut service_handles = network.spawn(signal);

        for starter in starters {
            let start_signal = signal.clone();
            service_handles.push(thread::spawn(move || {
                send_indexed(
                    &starter,
                    IndexedMsg {
                        msg: Message::Bool(true),
                        index: 0,
                    },
                    &start_signal,
                );
            }));
        }

        let (exit_tx, exit_rx) = mpsc::channel::<i32>();
        let has_code_port = watched
            .iter()
            .any(|(addr, _)| addr.path == ROOT_OUT && addr.port == CODE_PORT);

        let mut watcher_handles = vec![];
        for (addr, rx) in watched {
            let is_root_out = addr.path == ROOT_OUT;
            let watch_signal = signal.clone();
            let watch_tx = exit_tx.clone();
            watcher_handles.push(thread::spawn(move || {
                while let Some(indexed) = recv_indexed(&rx, &watch_signal) {
                    if !is_root_out {
                        // a dangling boundary outport: consume and discard
                        continue;
                    }
                    if addr.port == CODE_PORT {
                        let code = indexed.msg.as_int().unwrap_or(0) as i32;
                        let _ = watch_tx.send(code);
                        return;
                    }
                    if !has_code_port {
                        // any root output ends a program that has no code port
                        let _ = watch_tx.send(0);
                        return;
                    }
                    // keep consuming so upstream workers never block
                }
            }));
        }

        // quiescence: every worker returning on its own also ends the run
        let reaper_tx = exit_tx.clone();
        let reaper = thread::spawn(move || {
            for handle in worker_handles {
                let _ = handle.join();
            }
            let _ = reaper_tx.send(0);
        });
        drop(exit_tx);

        let code = exit_rx.recv().unwrap_or(0);
        debug!("Program finished with exit code {code}");

        signal.cancel();
        // unfed boundary inports were silent for the whole run
        drop(silent);
        let _ = reaper.join();
        for handle in service_handles {
            let _ = handle.join();
        }
        for handle in watcher_handles {
            let _ = handle.join();
        }

        Ok(code)
    }
}
