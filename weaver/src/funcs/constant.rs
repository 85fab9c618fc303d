use weavecore::model::message::Message;

use crate::channels::FuncIO;
use crate::errors::*;
use crate::funcs::{FuncBody, FuncCreator};

/// Emits the message bound to the call on `v`, forever
pub struct Constant;

impl FuncCreator for Constant {
    fn create(&self, mut io: FuncIO, msg: Option<Message>) -> Result<FuncBody> {
        let msg = msg.ok_or("No message bound to Const worker")?;
        let v = io.outputs.take("v")?;

        Ok(Box::new(move |signal| {
            while v.send(msg.clone(), &signal) {}
        }))
    }
}
