use weavecore::model::message::Message;

use crate::channels::FuncIO;
use crate::errors::Result;
use crate::funcs::{FuncBody, FuncCreator};

/// Gates a value stream: each message on `sig` lets one message from `v` in
/// pass to `v` out
pub struct Lock;

impl FuncCreator for Lock {
    fn create(&self, mut io: FuncIO, _msg: Option<Message>) -> Result<FuncBody> {
        let sig = io.inputs.take("sig")?;
        let v_in = io.inputs.take("v")?;
        let v_out = io.outputs.take("v")?;

        Ok(Box::new(move |signal| loop {
            if sig.recv(&signal).is_none() {
                return;
            }
            let value = match v_in.recv(&signal) {
                Some(msg) => msg,
                None => return,
            };
            if !v_out.send(value, &signal) {
                return;
            }
        }))
    }
}
