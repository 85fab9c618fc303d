use weavecore::model::message::Message;

use crate::channels::FuncIO;
use crate::errors::Result;
use crate::funcs::{FuncBody, FuncCreator};

/// Reads one message from `a`, then one from `b`, and emits their integer sum
/// on `v`, once per cycle
pub struct Add;

impl FuncCreator for Add {
    fn create(&self, mut io: FuncIO, _msg: Option<Message>) -> Result<FuncBody> {
        let a = io.inputs.take("a")?;
        let b = io.inputs.take("b")?;
        let v = io.outputs.take("v")?;

        Ok(Box::new(move |signal| loop {
            let first = match a.recv(&signal) {
                Some(msg) => msg,
                None => return,
            };
            let second = match b.recv(&signal) {
                Some(msg) => msg,
                None => return,
            };

            let sum = first.as_int().unwrap_or_default() + second.as_int().unwrap_or_default();
            if !v.send(Message::Int(sum), &signal) {
                return;
            }
        }))
    }
}
