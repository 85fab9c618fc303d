use weavecore::model::message::Message;

use crate::channels::FuncIO;
use crate::errors::Result;
use crate::funcs::{FuncBody, FuncCreator};

/// Reads a string on `data` then an index on `idx` and emits the character at
/// that position on `res`. Negative indexes count from the end. Out of bounds
/// is reported as a string on `err`.
pub struct StringAt;

impl FuncCreator for StringAt {
    fn create(&self, mut io: FuncIO, _msg: Option<Message>) -> Result<FuncBody> {
        let data_in = io.inputs.take("data")?;
        let idx_in = io.inputs.take("idx")?;
        let res_out = io.outputs.take("res")?;
        let err_out = io.outputs.take("err")?;

        Ok(Box::new(move |signal| loop {
            let data = match data_in.recv(&signal) {
                Some(msg) => msg.as_str().unwrap_or_default().to_string(),
                None => return,
            };
            let mut idx = match idx_in.recv(&signal) {
                Some(msg) => msg.as_int().unwrap_or_default(),
                None => return,
            };

            if idx < 0 {
                idx += data.chars().count() as i64;
            }

            let found = if idx >= 0 {
                data.chars().nth(idx as usize)
            } else {
                None
            };

            let sent = match found {
                Some(character) => res_out.send(Message::Str(character.to_string()), &signal),
                None => err_out.send(Message::Str("string index out of bounds".into()), &signal),
            };
            if !sent {
                return;
            }
        }))
    }
}

#[cfg(test)]
mod test {
    use std::sync::mpsc;
    use std::thread;

    use weavecore::model::ir::PortAddr;
    use weavecore::model::message::Message;

    use crate::channels::{FuncIO, InPort, InPorts, IndexedMsg, OutPort, OutPorts};
    use crate::funcs::FuncCreator;
    use crate::signal::Signal;

    use super::StringAt;

    fn run_case(data: &str, idx: i64) -> (Option<String>, Option<String>) {
        let (data_tx, data_rx) = mpsc::sync_channel(0);
        let (idx_tx, idx_rx) = mpsc::sync_channel(0);
        let (res_tx, res_rx) = mpsc::sync_channel(0);
        let (err_tx, err_rx) = mpsc::sync_channel(0);

        let io = FuncIO {
            inputs: InPorts::new(vec![
                InPort::new(PortAddr::new("root/at/in", "data"), data_rx),
                InPort::new(PortAddr::new("root/at/in", "idx"), idx_rx),
            ]),
            outputs: OutPorts::new(vec![
                OutPort::new(PortAddr::new("root/at/out", "res"), res_tx),
                OutPort::new(PortAddr::new("root/at/out", "err"), err_tx),
            ]),
        };

        let body = StringAt.create(io, None).expect("Could not create worker");
        let signal = Signal::new();
        let worker_signal = signal.clone();
        let worker = thread::spawn(move || body(worker_signal));

        data_tx
            .send(IndexedMsg {
                msg: Message::Str(data.to_string()),
                index: 0,
            })
            .expect("Could not send data");
        idx_tx
            .send(IndexedMsg {
                msg: Message::Int(idx),
                index: 0,
            })
            .expect("Could not send idx");

        let mut result = None;
        let mut error = None;
        // exactly one of the two ports emits per cycle
        loop {
            if let Ok(indexed) = res_rx.try_recv() {
                result = indexed.msg.as_str().map(str::to_string);
                break;
            }
            if let Ok(indexed) = err_rx.try_recv() {
                error = indexed.msg.as_str().map(str::to_string);
                break;
            }
            thread::yield_now();
        }

        drop(data_tx);
        drop(idx_tx);
        worker.join().expect("Worker panicked");
        (result, error)
    }

    #[test]
    fn positive_index() {
        let (result, error) = run_case("abc", 1);
        assert_eq!(result.as_deref(), Some("b"));
        assert!(error.is_none());
    }

    #[test]
    fn negative_index_counts_from_the_end() {
        let (result, error) = run_case("abc", -1);
        assert_eq!(result.as_deref(), Some("c"));
        assert!(error.is_none());
    }

    #[test]
    fn out_of_bounds_goes_to_error_port() {
        let (result, error) = run_case("abc", 3);
        assert!(result.is_none());
        assert_eq!(error.as_deref(), Some("string index out of bounds"));
    }

    #[test]
    fn too_negative_index_goes_to_error_port() {
        let (result, error) = run_case("abc", -4);
        assert!(result.is_none());
        assert_eq!(error.as_deref(), Some("string index out of bounds"));
    }
}
