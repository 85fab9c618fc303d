#![deny(missing_docs)]
#![warn(clippy::unwrap_used)]

//! `weaver` executes weave programs. It loads a serialized source tree from a
//! file, compiles it (analysis then IR generation) and runs the resulting
//! network of workers, exiting with the status code the program writes to the
//! `code` outport of its root component.
//!
//! Execute `weaver --help` at the command line for a description of the
//! command line options.

use std::fs;
use std::path::Path;
use std::process::exit;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Arg, ArgMatches, Command};
use colored::Colorize;
use log::debug;
use simplog::SimpleLogger;

use weavec::compile;
use weavecore::deserializers;
use weavecore::model::entity::EntityRef;
use weavecore::model::module::Module;
use weaver::coordinator::Coordinator;
use weaver::errors::*;
use weaver::funcs;
use weaver::network::{Interceptor, Noop, Trace};

fn main() {
    match run() {
        Err(ref e) => {
            eprintln!("{}: {}", "error".red(), e);
            for cause in e.iter().skip(1) {
                eprintln!("caused by: {cause}");
            }
            exit(1);
        }
        Ok(code) => exit(code),
    }
}

fn run() -> Result<i32> {
    let matches = get_matches();
    let verbosity = matches.get_one::<String>("verbosity").map(|s| s.as_str());
    SimpleLogger::init_prefix(verbosity, false);

    debug!(
        "'{}' version {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let source = matches
        .get_one::<String>("source")
        .ok_or("No source file specified")?;
    let root = matches
        .get_one::<String>("root")
        .map_or("Main", |s| s.as_str());
    let root = EntityRef::from_str(root)?;

    let module = load_module(Path::new(source))?;
    let program =
        compile(&module, &root).chain_err(|| format!("Could not compile '{source}'"))?;

    let interceptor: Arc<dyn Interceptor> = if matches.get_flag("trace") {
        Arc::new(Trace)
    } else {
        Arc::new(Noop)
    };

    let coordinator = Coordinator::new(funcs::registry(), interceptor);
    coordinator
        .run(&program)
        .chain_err(|| format!("Error while executing '{source}'"))
}

/*
    Load the source tree from a file, selecting the format by file extension
*/
fn load_module(path: &Path) -> Result<Module> {
    let contents = fs::read_to_string(path)
        .chain_err(|| format!("Could not read source file '{}'", path.display()))?;
    Ok(deserializers::load(path, &contents)?)
}

/*
    Parse the command line arguments using clap
*/
fn get_matches() -> ArgMatches {
    Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about("Execute a weave program")
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbosity")
                .num_args(1)
                .value_name("VERBOSITY_LEVEL")
                .help("Set verbosity level for output (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("trace")
                .short('t')
                .long("trace")
                .action(clap::ArgAction::SetTrue)
                .help("Log every message delivery through the trace interceptor"),
        )
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .num_args(1)
                .value_name("COMPONENT")
                .help("The root component to instantiate, 'Main' by default"),
        )
        .arg(
            Arg::new("source")
                .num_args(1)
                .required(true)
                .value_name("SOURCE_FILE")
                .help("Path of the source tree file to execute"),
        )
        .get_matches()
}
