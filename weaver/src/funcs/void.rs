use weavecore::model::message::Message;

use crate::channels::FuncIO;
use crate::errors::Result;
use crate::funcs::{FuncBody, FuncCreator};

/// Consumes everything arriving on `v` and discards it
pub struct Void;

impl FuncCreator for Void {
    fn create(&self, mut io: FuncIO, _msg: Option<Message>) -> Result<FuncBody> {
        let v = io.inputs.take("v")?;

        Ok(Box::new(move |signal| {
            while v.recv(&signal).is_some() {}
        }))
    }
}
