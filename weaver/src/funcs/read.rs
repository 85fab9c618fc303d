use std::io::{self, BufRead};

use log::error;

use weavecore::model::message::Message;

use crate::channels::FuncIO;
use crate::errors::Result;
use crate::funcs::{FuncBody, FuncCreator};

/// Reads one line from standard input per message on `sig` and emits it on
/// `v`. The worker ends at end of input.
pub struct Read;

impl FuncCreator for Read {
    fn create(&self, mut io: FuncIO, _msg: Option<Message>) -> Result<FuncBody> {
        let sig = io.inputs.take("sig")?;
        let v = io.outputs.take("v")?;

        Ok(Box::new(move |signal| {
            let stdin = io::stdin();
            loop {
                if sig.recv(&signal).is_none() {
                    return;
                }

                let mut line = String::new();
                match stdin.lock().read_line(&mut line) {
                    Ok(0) => return, // end of input
                    Ok(_) => {
                        while line.ends_with('\n') || line.ends_with('\r') {
                            line.pop();
                        }
                        if !v.send(Message::Str(line), &signal) {
                            return;
                        }
                    }
                    Err(e) => {
                        error!("Error reading from standard input: {e}");
                        return;
                    }
                }
            }
        }))
    }
}
