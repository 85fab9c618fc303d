use std::collections::HashMap;
use std::sync::Arc;

use weavecore::model::message::Message;
use weavecore::model::name::Name;

use crate::channels::FuncIO;
use crate::errors::Result;
use crate::signal::Signal;

/// `add` reads `a` then `b` and emits their integer sum
pub mod add;
/// `constant` emits its bound message forever
pub mod constant;
/// `field` projects configured fields out of struct messages
pub mod field;
/// `lock` gates a value stream on a signal stream
pub mod lock;
/// `parse_int` parses strings into integers, with an error branch
pub mod parse_int;
/// `print` writes messages to standard output and passes them through
pub mod print;
/// `print_err` writes messages to standard error and passes them through
pub mod print_err;
/// `read` reads one line from standard input per signal
pub mod read;
/// `string_at` indexes into a string with negative indexing support
pub mod string_at;
/// `void` consumes and discards
pub mod void;

/// The running half of a worker: spawned in its own thread, loops until the
/// signal is cancelled or its channels disconnect
pub type FuncBody = Box<dyn FnOnce(Signal) + Send>;

/// A primitive worker factory. `create` performs port resolution, which makes
/// any missing-port error fatal before the worker is spawned, and returns the
/// body to run.
pub trait FuncCreator: Send + Sync {
    /// Resolve the ports this function needs out of `io` and return its body.
    /// `msg` carries the message bound to the call by a `bind` directive.
    fn create(&self, io: FuncIO, msg: Option<Message>) -> Result<FuncBody>;
}

/// The table the runtime looks worker functions up in, by IR reference name
pub type Registry = HashMap<Name, Arc<dyn FuncCreator>>;

/// The registry of builtin primitive functions
pub fn registry() -> Registry {
    let mut registry: Registry = HashMap::new();
    registry.insert("Add".into(), Arc::new(add::Add));
    registry.insert("Const".into(), Arc::new(constant::Constant));
    registry.insert("Field".into(), Arc::new(field::Field));
    registry.insert("Lock".into(), Arc::new(lock::Lock));
    registry.insert("ParseInt".into(), Arc::new(parse_int::ParseInt));
    registry.insert("Print".into(), Arc::new(print::Print));
    registry.insert("PrintErr".into(), Arc::new(print_err::PrintErr));
    registry.insert("Read".into(), Arc::new(read::Read));
    registry.insert("StringAt".into(), Arc::new(string_at::StringAt));
    registry.insert("Void".into(), Arc::new(void::Void));
    registry
}
