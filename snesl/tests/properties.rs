use proptest::collection::vec;
use proptest::prelude::*;
use snesl::lang::core::semantics::{self, Value};
use snesl::lang::core::Type;
use snesl::lang::svcode::{Elem, Kind, Op, StreamTree};
use snesl::lang::{core, surface};
use snesl::pass::{core_to_svcode, surface_to_core};
use snesl::runtime::{self, reify};

fn elaborate(source: &str) -> core::Program {
    let (messages_tx, messages_rx) = crossbeam_channel::unbounded();
    let surface_program = surface::Program::from_str(source).unwrap();
    let program = surface_to_core::State::new(messages_tx).from_program(&surface_program);
    let messages = messages_rx.try_iter().collect::<Vec<_>>();
    assert!(messages.is_empty(), "{}: {:?}", source, messages);
    program
}

fn run_engine(program: &core::Program) -> Value {
    let compiled = core_to_svcode::compile_program(program).unwrap();
    let config = runtime::Config::default();
    let output = runtime::run(&compiled.code, &compiled.value, &config).unwrap();
    reify::reify(&output).unwrap()
}

fn join<T: ToString>(values: &[T]) -> String {
    values.iter().map(T::to_string).collect::<Vec<_>>().join(", ")
}

/// An annotated literal, so that empty sequences are allowed.
fn nums_literal(values: &[u32]) -> String {
    format!("([{}] : {{num}})", join(values))
}

fn bools_literal(values: &[bool]) -> String {
    format!("([{}] : {{bool}})", join(values))
}

fn nested_literal(values: &[Vec<u32>]) -> String {
    let inner = values.iter().map(|xs| format!("[{}]", join(xs))).collect::<Vec<_>>();
    format!("([{}] : {{{{num}}}})", inner.join(", "))
}

fn num_seq(values: &[u32]) -> Value {
    Value::Sequence(values.iter().map(|value| Value::num(f64::from(*value))).collect())
}

/// A canonical segment descriptor for segments of the given lengths.
fn ssd(lens: &[usize]) -> Vec<Elem> {
    (lens.iter())
        .flat_map(|&len| match len {
            0 => vec![Elem::END],
            len => vec![Elem::count(len), Elem::END],
        })
        .collect()
}

/// A segment descriptor for one segment, with a count token for each
/// non-empty chunk.
fn chunked_ssd(chunks: &[usize]) -> Vec<Elem> {
    (chunks.iter())
        .filter(|&&len| len > 0)
        .map(|&len| Elem::count(len))
        .chain(std::iter::once(Elem::END))
        .collect()
}

/// The streams of a `{{num}}` value whose segments are split into chunks.
///
/// The outer segment starts a new chunk before each inner segment whose
/// break flag is set.
fn chunked_streams(segments: &[(bool, Vec<Vec<u32>>)]) -> StreamTree<Vec<Elem>> {
    let mut outer_chunks = vec![0];
    let mut inner_ssd = Vec::new();
    let mut data = Vec::new();

    for (split, chunks) in segments {
        if *split {
            outer_chunks.push(0);
        }
        if let Some(len) = outer_chunks.last_mut() {
            *len += 1;
        }
        let lens = chunks.iter().map(Vec::len).collect::<Vec<_>>();
        inner_ssd.extend(chunked_ssd(&lens));
        data.extend(chunks.iter().flatten().map(|x| Elem::num(f64::from(*x))));
    }

    StreamTree::seq(
        chunked_ssd(&outer_chunks),
        StreamTree::seq(inner_ssd, StreamTree::Sid(data, Kind::NUM)),
    )
}

fn eval_op(op: Op, inputs: Vec<Vec<Elem>>) -> Vec<Elem> {
    runtime::eval_op(&op, inputs).unwrap()
}

fn template(index: usize, pairs: &[(u32, bool)], a: u32, m: u32) -> String {
    let xs = pairs.iter().map(|(x, _)| *x).collect::<Vec<_>>();
    let flags = pairs.iter().map(|(_, flag)| *flag).collect::<Vec<_>>();
    let xs = nums_literal(&xs);

    match index {
        0 => format!("main = {{x * {} + 1 : x in {} | x % {} == 0}}", a, xs, m),
        1 => format!("main = sum({{x * x : x in {}}})", xs),
        2 => format!("main = {{ {{y + x : y in &x}} : x in {}}}", xs),
        3 => format!("main = split({}, {})", xs, bools_literal(&flags)),
        4 => format!("main = zip({}, {{x > {} : x in {}}})", xs, a, xs),
        _ => format!("main = let k = {} in {{x - k : x in {} | x >= k}}", a, xs),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn nested_sequences_survive_flattening(values in vec(vec(0u32..100, 0..5), 0..5)) {
        let value = Value::Sequence(values.iter().map(|xs| num_seq(xs)).collect());
        let r#type = Type::sequence(Type::sequence(Type::num()));

        let output = reify::flatten(&value, &r#type).unwrap();
        prop_assert_eq!(reify::reify(&output).unwrap(), value);
    }

    #[test]
    fn canonical_streams_survive_reification(
        segments in vec((Just(false), vec(vec(0u32..100, 0..4), 0..2)), 0..5),
    ) {
        let r#type = Type::sequence(Type::sequence(Type::num()));
        let output = chunked_streams(&segments);

        let value = reify::reify(&output).unwrap();
        prop_assert_eq!(reify::flatten(&value, &r#type).unwrap(), output);
    }

    #[test]
    fn split_counts_are_merged_by_reification(
        segments in vec((any::<bool>(), vec(vec(0u32..100, 0..4), 0..4)), 0..5),
    ) {
        let r#type = Type::sequence(Type::sequence(Type::num()));
        let output = chunked_streams(&segments);

        let value = reify::reify(&output).unwrap();
        let canonical = reify::flatten(&value, &r#type).unwrap();
        let value_again = reify::reify(&canonical).unwrap();
        prop_assert_eq!(&value_again, &value);
        prop_assert_eq!(reify::flatten(&value_again, &r#type).unwrap(), canonical);

        let merged = segments
            .iter()
            .map(|(_, chunks)| num_seq(&chunks.concat()))
            .collect();
        prop_assert_eq!(value, Value::Sequence(merged));
    }

    #[test]
    fn filtering_commutes_with_distribution(
        lanes in vec((0u32..100, 0usize..4, any::<bool>()), 0..8),
    ) {
        let lens = lanes.iter().map(|(_, len, _)| *len).collect::<Vec<_>>();
        let xs = lanes.iter().map(|(x, _, _)| Elem::num(f64::from(*x))).collect::<Vec<_>>();
        let keep = lanes.iter().map(|(_, _, keep)| Elem::bool(*keep)).collect::<Vec<_>>();

        let spread_keep = eval_op(Op::Dist(Kind::BOOL), vec![ssd(&lens), keep.clone()]);
        let spread_xs = eval_op(Op::Dist(Kind::NUM), vec![ssd(&lens), xs.clone()]);
        let filtered_after = eval_op(Op::Pack(Kind::NUM), vec![spread_keep, spread_xs]);

        let kept_ssd = eval_op(Op::SsdPack, vec![keep.clone(), ssd(&lens)]);
        let kept_xs = eval_op(Op::Pack(Kind::NUM), vec![keep, xs]);
        let filtered_before = eval_op(Op::Dist(Kind::NUM), vec![kept_ssd, kept_xs]);

        let expected = (lanes.iter())
            .filter(|(_, _, keep)| *keep)
            .flat_map(|(x, len, _)| std::iter::repeat(Elem::num(f64::from(*x))).take(*len))
            .collect::<Vec<_>>();
        prop_assert_eq!(&filtered_after, &expected);
        prop_assert_eq!(&filtered_before, &expected);
    }

    #[test]
    fn concat_appends_nested_sequences(
        xss in vec(vec(0u32..100, 0..4), 0..4),
        yss in vec(vec(0u32..100, 0..4), 0..4),
    ) {
        let source = format!("main = concat([{}, {}])", nested_literal(&xss), nested_literal(&yss));
        let expected = Value::Sequence(xss.iter().chain(&yss).map(|xs| num_seq(xs)).collect());
        prop_assert_eq!(run_engine(&elaborate(&source)), expected);
    }

    #[test]
    fn append_agrees_with_concat(
        xs in vec(0u32..100, 0..6),
        ys in vec(0u32..100, 0..6),
    ) {
        let appended = format!("main = append({}, {})", nums_literal(&xs), nums_literal(&ys));
        let concatenated = format!("main = concat([{}, {}])", nums_literal(&xs), nums_literal(&ys));

        let expected = num_seq(&xs.iter().chain(&ys).copied().collect::<Vec<_>>());
        prop_assert_eq!(run_engine(&elaborate(&appended)), expected.clone());
        prop_assert_eq!(run_engine(&elaborate(&concatenated)), expected);
    }

    #[test]
    fn scans_end_with_the_reduction(
        segments in vec(vec(1u32..10, 1..5), 0..5),
        op in prop::sample::select(vec!["sum", "prod", "max", "min"]),
    ) {
        let literal = nested_literal(&segments);
        let reduced = format!("main = {{{}(xs) : xs in {}}}", op, literal);
        let scanned = format!("main = {{{}_scan(xs) : xs in {}}}", op, literal);

        match (run_engine(&elaborate(&reduced)), run_engine(&elaborate(&scanned))) {
            (Value::Sequence(reductions), Value::Sequence(scans)) => {
                prop_assert_eq!(reductions.len(), scans.len());
                for (reduction, scan) in reductions.iter().zip(&scans) {
                    match scan {
                        Value::Sequence(scan) => prop_assert_eq!(scan.last(), Some(reduction)),
                        scan => prop_assert!(false, "expected a sequence, found {:?}", scan),
                    }
                }
            }
            values => prop_assert!(false, "expected sequences, found {:?}", values),
        }
    }

    #[test]
    fn engine_agrees_with_interpreter(
        pairs in vec((0u32..8, any::<bool>()), 0..6),
        a in 0u32..5,
        m in 1u32..4,
        index in 0usize..6,
    ) {
        let source = template(index, &pairs, a, m);
        let program = elaborate(&source);
        prop_assert_eq!(run_engine(&program), semantics::eval_program(&program).unwrap());
    }

    #[test]
    fn front_end_does_not_panic(input in "[a-z0-9 (){}\\[\\],.:|&#+*<=-]{0,40}") {
        if let Ok(surface_program) = surface::Program::from_str(&input) {
            let (messages_tx, _messages_rx) = crossbeam_channel::unbounded();
            surface_to_core::State::new(messages_tx).from_program(&surface_program);
        }
    }
}
