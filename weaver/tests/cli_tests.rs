//! End-to-end tests of the `weaver` binary: programs are written to disk as
//! serialized source trees, executed through the CLI and observed via their
//! standard streams and exit codes.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use weavecore::model::component::{Component, Node, EXTERN_DIRECTIVE};
use weavecore::model::connection::{Connection, PortAddr, ReceiverSide, SenderSide};
use weavecore::model::constant::{Const, ConstValue};
use weavecore::model::entity::{Entity, EntityRef};
use weavecore::model::interface::{Interface, Io, Port};
use weavecore::model::meta::SourceRange;
use weavecore::model::module::{Module, SourceFile};
use weavecore::model::types::{TypeExpr, TypeParam};

const RUN_TIMEOUT: Duration = Duration::from_secs(10);

fn port(name: &str, type_name: &str) -> Port {
    Port::new(name, TypeExpr::named(type_name))
}

fn extern_component(
    func: &str,
    type_params: Vec<&str>,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
) -> Entity {
    let mut component = Component {
        interface: Interface {
            type_params: type_params
                .into_iter()
                .map(|name| TypeParam {
                    name: name.to_string(),
                    constr: None,
                })
                .collect(),
            io: Io { inputs, outputs },
        },
        ..Default::default()
    };
    component
        .directives
        .insert(EXTERN_DIRECTIVE.into(), vec![func.to_string()]);
    Entity::Component(component)
}

fn node(component: &str, type_args: Vec<&str>) -> Node {
    let mut node = Node::new(EntityRef::local(component));
    node.type_args = type_args.into_iter().map(TypeExpr::named).collect();
    node
}

fn wire(sender: SenderSide, receivers: Vec<PortAddr>) -> Connection {
    Connection {
        sender,
        receiver: ReceiverSide::Addrs(receivers),
        meta: SourceRange::default(),
    }
}

fn str_const(value: &str) -> Entity {
    Entity::Const(Const {
        type_expr: TypeExpr::named("str"),
        value: ConstValue::of_str(value),
        meta: SourceRange::default(),
    })
}

/// The extern components every test program can pull from
fn builtin_entities() -> Vec<(String, Entity)> {
    vec![
        (
            "Read".to_string(),
            extern_component(
                "Read",
                vec![],
                vec![port("sig", "bool")],
                vec![port("v", "str")],
            ),
        ),
        (
            "ParseInt".to_string(),
            extern_component(
                "ParseInt",
                vec![],
                vec![port("v", "str")],
                vec![port("v", "int"), port("err", "str")],
            ),
        ),
        (
            "Add".to_string(),
            extern_component(
                "Add",
                vec![],
                vec![port("a", "int"), port("b", "int")],
                vec![port("v", "int")],
            ),
        ),
        (
            "Print".to_string(),
            extern_component("Print", vec!["T"], vec![port("v", "T")], vec![port("v", "T")]),
        ),
        (
            "PrintErr".to_string(),
            extern_component(
                "PrintErr",
                vec!["T"],
                vec![port("v", "T")],
                vec![port("v", "T")],
            ),
        ),
    ]
}

fn write_program(
    dir: &TempDir,
    file_name: &str,
    entities: Vec<(String, Entity)>,
    main: Component,
) -> PathBuf {
    let mut file = SourceFile {
        name: file_name.to_string(),
        ..Default::default()
    };
    for (name, entity) in entities {
        file.entities.insert(name, entity);
    }
    file.entities
        .insert("Main".to_string(), Entity::Component(main));

    let module = Module::single_file(file);
    let path = dir.path().join(file_name);
    std::fs::write(
        &path,
        serde_json::to_string_pretty(&module).expect("Could not serialize program"),
    )
    .expect("Could not write program file");
    path
}

fn weaver() -> Command {
    let mut command = Command::cargo_bin("weaver").expect("Binary not built");
    command.timeout(RUN_TIMEOUT);
    command
}

#[test]
fn hello_prints_the_greeting() {
    let dir = TempDir::new().expect("Could not create temp dir");

    let mut nodes = BTreeMap::new();
    nodes.insert("print".to_string(), node("Print", vec!["str"]));
    let main = Component {
        interface: Interface {
            type_params: vec![],
            io: Io {
                inputs: vec![],
                outputs: vec![port("v", "str")],
            },
        },
        nodes,
        net: vec![
            wire(
                SenderSide::from_const(EntityRef::local("greeting")),
                vec![PortAddr::new("print", "v")],
            ),
            wire(
                SenderSide::from_addr(PortAddr::new("print", "v")),
                vec![PortAddr::new("out", "v")],
            ),
        ],
        ..Default::default()
    };

    let mut entities = builtin_entities();
    entities.push(("greeting".to_string(), str_const("hello")));
    let path = write_program(&dir, "hello.json", entities, main);

    weaver()
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("hello\n"));
}

#[test]
fn adder_sums_two_lines_of_input() {
    let dir = TempDir::new().expect("Could not create temp dir");

    let mut nodes = BTreeMap::new();
    nodes.insert("r1".to_string(), node("Read", vec![]));
    nodes.insert("r2".to_string(), node("Read", vec![]));
    nodes.insert("p1".to_string(), node("ParseInt", vec![]));
    nodes.insert("p2".to_string(), node("ParseInt", vec![]));
    nodes.insert("add".to_string(), node("Add", vec![]));
    nodes.insert("print".to_string(), node("Print", vec!["int"]));

    let main = Component {
        interface: Interface {
            type_params: vec![],
            io: Io {
                inputs: vec![port("go1", "bool"), port("go2", "bool")],
                outputs: vec![port("v", "int")],
            },
        },
        nodes,
        net: vec![
            wire(
                SenderSide::from_addr(PortAddr::new("in", "go1")),
                vec![PortAddr::new("r1", "sig")],
            ),
            wire(
                SenderSide::from_addr(PortAddr::new("in", "go2")),
                vec![PortAddr::new("r2", "sig")],
            ),
            wire(
                SenderSide::from_addr(PortAddr::new("r1", "v")),
                vec![PortAddr::new("p1", "v")],
            ),
            wire(
                SenderSide::from_addr(PortAddr::new("r2", "v")),
                vec![PortAddr::new("p2", "v")],
            ),
            wire(
                SenderSide::from_addr(PortAddr::new("p1", "v")),
                vec![PortAddr::new("add", "a")],
            ),
            wire(
                SenderSide::from_addr(PortAddr::new("p2", "v")),
                vec![PortAddr::new("add", "b")],
            ),
            wire(
                SenderSide::from_addr(PortAddr::new("add", "v")),
                vec![PortAddr::new("print", "v")],
            ),
            wire(
                SenderSide::from_addr(PortAddr::new("print", "v")),
                vec![PortAddr::new("out", "v")],
            ),
        ],
        ..Default::default()
    };

    let path = write_program(&dir, "adder.json", builtin_entities(), main);

    weaver()
        .arg(&path)
        .write_stdin("3\n4\n")
        .assert()
        .success()
        .stdout("7\n");
}

#[test]
fn parse_failure_reports_on_stderr() {
    let dir = TempDir::new().expect("Could not create temp dir");

    let mut nodes = BTreeMap::new();
    nodes.insert("reader".to_string(), node("Read", vec![]));
    nodes.insert("parse".to_string(), node("ParseInt", vec![]));
    nodes.insert("report".to_string(), node("PrintErr", vec!["str"]));

    let main = Component {
        interface: Interface {
            type_params: vec![],
            io: Io {
                inputs: vec![port("go", "bool")],
                outputs: vec![port("v", "str")],
            },
        },
        nodes,
        net: vec![
            wire(
                SenderSide::from_addr(PortAddr::new("in", "go")),
                vec![PortAddr::new("reader", "sig")],
            ),
            wire(
                SenderSide::from_addr(PortAddr::new("reader", "v")),
                vec![PortAddr::new("parse", "v")],
            ),
            wire(
                SenderSide::from_addr(PortAddr::new("parse", "err")),
                vec![PortAddr::new("report", "v")],
            ),
            wire(
                SenderSide::from_addr(PortAddr::new("report", "v")),
                vec![PortAddr::new("out", "v")],
            ),
        ],
        ..Default::default()
    };

    let path = write_program(&dir, "parse_error.json", builtin_entities(), main);

    weaver()
        .arg(&path)
        .write_stdin("abc\n")
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("abc"));
}

#[test]
fn cyclic_constants_fail_compilation() {
    let dir = TempDir::new().expect("Could not create temp dir");

    let cyclic = |target: &str| {
        Entity::Const(Const {
            type_expr: TypeExpr::named("int"),
            value: ConstValue::of_ref(EntityRef::local(target)),
            meta: SourceRange::default(),
        })
    };

    let main = Component::default();
    let mut entities = builtin_entities();
    entities.push(("a".to_string(), cyclic("b")));
    entities.push(("b".to_string(), cyclic("a")));
    let path = write_program(&dir, "cyclic.json", entities, main);

    weaver()
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cyclic"));
}

#[test]
fn missing_source_file_fails() {
    weaver().arg("/no/such/file.json").assert().failure();
}

#[test]
fn unknown_extension_fails() {
    let dir = TempDir::new().expect("Could not create temp dir");
    let path = dir.path().join("program.wrong");
    std::fs::write(&path, "{}").expect("Could not write file");
    weaver().arg(&path).assert().failure();
}
