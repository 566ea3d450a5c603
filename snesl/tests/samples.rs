//! Integration tests against the language samples directory.

use snesl::lang::core::semantics::{self, Value};
use snesl::lang::{core, surface};
use snesl::pass::{core_to_pretty, core_to_svcode, surface_to_core};
use snesl::reporting::{CompileError, Message, RuntimeError};
use snesl::runtime::{self, reify};

fn elaborate(source: &str) -> (core::Program, Vec<Message>) {
    let (messages_tx, messages_rx) = crossbeam_channel::unbounded();
    let surface_program = surface::Program::from_str(source).unwrap();
    let program = surface_to_core::State::new(messages_tx).from_program(&surface_program);
    (program, messages_rx.try_iter().collect())
}

fn elaborate_ok(source: &str) -> core::Program {
    let (program, messages) = elaborate(source);
    assert!(messages.is_empty(), "unexpected messages: {:?}", messages);
    program
}

fn run_engine(program: &core::Program) -> Result<Value, RuntimeError> {
    let compiled = core_to_svcode::compile_program(program).unwrap();
    let output = runtime::run(&compiled.code, &compiled.value, &runtime::Config::default())?;
    Ok(reify::reify(&output).unwrap())
}

fn to_string(value: &Value) -> String {
    let pretty_alloc = pretty::BoxAllocator;
    let doc = core_to_pretty::from_value(&pretty_alloc, value);
    doc.1.pretty(std::usize::MAX).to_string()
}

fn run_sample(source: &str) {
    let expected = (source.lines())
        .find_map(|line| line.strip_prefix("-- expect:"))
        .map(str::trim)
        .expect("missing `-- expect:` header");

    let program = elaborate_ok(source);
    let value = run_engine(&program).unwrap();

    assert_eq!(to_string(&value), expected);
    assert_eq!(semantics::eval_program(&program), Ok(value));
}

macro_rules! test {
    ($test_name:ident, $path:literal) => {
        #[test]
        fn $test_name() {
            crate::run_sample(include_str!(concat!("../../samples/", $path, ".snesl")));
        }
    };
}

mod samples {
    test!(append, "append");
    test!(arithmetic, "arithmetic");
    test!(captures, "captures");
    test!(concat, "concat");
    test!(dot, "dot");
    test!(evens, "evens");
    test!(extremes, "extremes");
    test!(filters, "filters");
    test!(logic, "logic");
    test!(nested, "nested");
    test!(scan, "scan");
    test!(singletons, "singletons");
    test!(split, "split");
    test!(squares, "squares");
    test!(strings, "strings");
    test!(sum, "sum");
    test!(tuples, "tuples");
}

mod failures {
    use super::*;

    #[test]
    fn mismatched_types() {
        let (_, messages) = elaborate(include_str!("../../samples/mismatched-types.snesl"));
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn arrays() {
        let program = elaborate_ok(include_str!("../../samples/arrays.snesl"));
        assert_eq!(
            core_to_svcode::compile_program(&program).map(|_| ()),
            Err(CompileError::Unsupported { construct: "tab" }),
        );
        assert_eq!(semantics::eval_program(&program), Ok(Value::num(3.0)));
    }

    #[test]
    fn division_by_zero() {
        let program = elaborate_ok(include_str!("../../samples/division-by-zero.snesl"));
        assert!(matches!(run_engine(&program), Err(RuntimeError::Fault { .. })));
        assert!(semantics::eval_program(&program).is_err());
    }

    #[test]
    fn deadlock() {
        let program = elaborate_ok(include_str!("../../samples/deadlock.snesl"));
        assert!(matches!(run_engine(&program), Err(RuntimeError::Deadlock { .. })));
        assert_eq!(
            semantics::eval_program(&program),
            Ok(Value::Sequence(vec![
                Value::num(3.0),
                Value::num(4.0),
                Value::num(5.0),
            ])),
        );
    }

    #[test]
    fn shared_append() {
        let program = elaborate_ok(include_str!("../../samples/shared-append.snesl"));
        assert!(matches!(run_engine(&program), Err(RuntimeError::Deadlock { .. })));
        assert_eq!(
            semantics::eval_program(&program),
            Ok(Value::Sequence(
                [0.0, 1.0, 2.0, 3.0, 0.0, 1.0, 2.0, 3.0].iter().copied().map(Value::num).collect(),
            )),
        );
    }

    #[test]
    fn unused_fault() {
        let program = elaborate_ok(include_str!("../../samples/unused-fault.snesl"));
        assert_eq!(run_engine(&program), Ok(Value::num(5.0)));
        assert!(semantics::eval_program(&program).is_err());
    }
}
