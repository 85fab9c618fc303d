use weavecore::model::message::Message;

use crate::channels::FuncIO;
use crate::errors::Result;
use crate::funcs::{FuncBody, FuncCreator};

/// Parses the string arriving on `v` into an integer. Success is emitted on
/// `v` out; a failure is described by a string on `err`.
pub struct ParseInt;

impl FuncCreator for ParseInt {
    fn create(&self, mut io: FuncIO, _msg: Option<Message>) -> Result<FuncBody> {
        let v_in = io.inputs.take("v")?;
        let v_out = io.outputs.take("v")?;
        let err_out = io.outputs.take("err")?;

        Ok(Box::new(move |signal| loop {
            let value = match v_in.recv(&signal) {
                Some(msg) => msg,
                None => return,
            };

            let text = value.as_str().unwrap_or_default();
            match text.parse::<i64>() {
                Ok(parsed) => {
                    if !v_out.send(Message::Int(parsed), &signal) {
                        return;
                    }
                }
                Err(e) => {
                    if !err_out.send(Message::Str(format!("{e}: '{text}'")), &signal) {
                        return;
                    }
                }
            }
        }))
    }
}
