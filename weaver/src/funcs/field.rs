use log::error;

use weavecore::model::message::Message;

use crate::channels::FuncIO;
use crate::errors::*;
use crate::funcs::{FuncBody, FuncCreator};

/// Projects a path of field names out of every struct or dictionary message
/// arriving on `v`. The path comes in as the bound message, a list of
/// strings. Backs the field selectors of connection senders.
pub struct Field;

impl FuncCreator for Field {
    fn create(&self, mut io: FuncIO, msg: Option<Message>) -> Result<FuncBody> {
        let selectors = match msg {
            Some(Message::List(items)) => {
                let mut selectors = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Message::Str(selector) => selectors.push(selector),
                        other => bail!("Field selector must be a string, got '{other}'"),
                    }
                }
                selectors
            }
            _ => bail!("No selector list bound to Field worker"),
        };
        if selectors.is_empty() {
            bail!("Field worker needs at least one selector");
        }

        let v_in = io.inputs.take("v")?;
        let v_out = io.outputs.take("v")?;

        Ok(Box::new(move |signal| loop {
            let value = match v_in.recv(&signal) {
                Some(msg) => msg,
                None => return,
            };

            let mut current = value;
            for selector in &selectors {
                current = match current {
                    Message::Struct(mut fields) | Message::Dict(mut fields) => {
                        match fields.remove(selector) {
                            Some(inner) => inner,
                            None => {
                                // the analyzer proved the field exists, so a miss is a bug
                                error!("Field '{selector}' missing from message");
                                return;
                            }
                        }
                    }
                    other => {
                        error!("Cannot select field '{selector}' from '{other}'");
                        return;
                    }
                };
            }

            if !v_out.send(current, &signal) {
                return;
            }
        }))
    }
}
