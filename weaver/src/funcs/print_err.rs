use weavecore::model::message::Message;

use crate::channels::FuncIO;
use crate::errors::Result;
use crate::funcs::{FuncBody, FuncCreator};

/// Writes the stringified form of every message on `v` to standard error,
/// one per line, and passes the message through to `v` out
pub struct PrintErr;

impl FuncCreator for PrintErr {
    fn create(&self, mut io: FuncIO, _msg: Option<Message>) -> Result<FuncBody> {
        let v_in = io.inputs.take("v")?;
        let v_out = io.outputs.take("v")?;

        Ok(Box::new(move |signal| loop {
            let value = match v_in.recv(&signal) {
                Some(msg) => msg,
                None => return,
            };
            eprintln!("{value}");
            if !v_out.send(value, &signal) {
                return;
            }
        }))
    }
}
