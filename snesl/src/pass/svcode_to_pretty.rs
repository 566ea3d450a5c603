//! Pretty prints vector code to a textual form.
//!
//! Each instruction is printed on its own line, in the form:
//!
//! ```text
//! s2 : num = iotas(s1)
//! ```

use pretty::{DocAllocator, DocBuilder};

use crate::lang::prim::ReduceOp;
use crate::lang::svcode::{Elem, Instruction, Op, Reducer, StreamTree, Svcode, ValueTree};

pub fn from_svcode<'a, D>(alloc: &'a D, svcode: &'a Svcode) -> DocBuilder<'a, D>
where
    D: DocAllocator<'a>,
    D::Doc: Clone,
{
    alloc.intersperse(
        svcode
            .instructions
            .iter()
            .map(|instruction| from_instruction(alloc, instruction)),
        alloc.hardline(),
    )
}

pub fn from_instruction<'a, D>(alloc: &'a D, instruction: &'a Instruction) -> DocBuilder<'a, D>
where
    D: DocAllocator<'a>,
    D::Doc: Clone,
{
    (alloc.nil())
        .append(alloc.as_string(instruction.name))
        .append(alloc.space())
        .append(":")
        .append(alloc.space())
        .append(alloc.text(instruction.kind.name()))
        .append(alloc.space())
        .append("=")
        .append(
            (alloc.space())
                .append(alloc.text(op_name(&instruction.op)))
                .append("(")
                .append(alloc.intersperse(
                    instruction.args.iter().map(|arg| alloc.as_string(arg)),
                    alloc.text(",").append(alloc.space()),
                ))
                .append(")")
                .group()
                .nest(4),
        )
}

/// The name of an instruction, including any parameters.
pub fn op_name(op: &Op) -> String {
    match op {
        Op::Rep(constant) => format!("rep_{}[{}]", constant.prim_type(), constant),
        Op::Iotas => "iotas".to_owned(),
        Op::SsdToCtrl => "ssd_to_ctrl".to_owned(),
        Op::SsdToEmpty => "ssd_to_empty".to_owned(),
        Op::Dist(kind) => format!("dist_{}", kind),
        Op::Map(op) => match op.comparison_type() {
            Some(prim_type) => format!("map_{}_{}", op.name(), prim_type),
            None => format!("map_{}", op.name()),
        },
        Op::Pack(kind) => format!("pack_{}", kind),
        Op::SsdPack => "ssd_pack".to_owned(),
        Op::BoolToSsd => "bool_to_ssd".to_owned(),
        Op::EndFlagsToSsd => "end_flags_to_ssd".to_owned(),
        Op::NumToSsd => "num_to_ssd".to_owned(),
        Op::Reduce(Reducer::Fold(op)) => format!("reduce_{}", reduce_op_name(*op)),
        Op::Reduce(Reducer::EndFlagCount) => "reduce_end_flag_count".to_owned(),
        Op::Scan(op) => format!("scan_{}", reduce_op_name(*op)),
        Op::Il(kind, _) => format!("il_{}", kind),
        Op::SsdIl(_) => "ssd_il".to_owned(),
        Op::SsdConcat => "ssd_concat".to_owned(),
        Op::CheckSingletons => "check_singletons".to_owned(),
    }
}

fn reduce_op_name(op: ReduceOp) -> String {
    match op {
        ReduceOp::Max(t) | ReduceOp::Min(t) => format!("{}_{}", op.name(), t),
        _ => op.name().to_owned(),
    }
}

/// Print a value tree, eg. `ss(s1, tup(s2, s3))`.
pub fn from_value_tree<'a, D>(alloc: &'a D, tree: &'a ValueTree) -> DocBuilder<'a, D>
where
    D: DocAllocator<'a>,
    D::Doc: Clone,
{
    let nested = |head: &'static str, children: Vec<DocBuilder<'a, D>>| {
        (alloc.nil())
            .append(head)
            .append("(")
            .append(alloc.intersperse(children, alloc.text(",").append(alloc.space())))
            .append(")")
            .group()
    };

    match tree {
        StreamTree::Sid(id, _) => alloc.as_string(id),
        StreamTree::Tuple(trees) => nested(
            "tup",
            trees.iter().map(|tree| from_value_tree(alloc, tree)).collect(),
        ),
        StreamTree::Seq(ssd, elems) => nested(
            "ss",
            vec![alloc.as_string(ssd), from_value_tree(alloc, elems)],
        ),
        StreamTree::Array(asd, elems) => nested(
            "sa",
            vec![alloc.as_string(asd), from_value_tree(alloc, elems)],
        ),
    }
}

/// Print the raw contents of a stream, eg. `[3, |]`.
pub fn from_elems<'a, D>(alloc: &'a D, elems: &'a [Elem]) -> DocBuilder<'a, D>
where
    D: DocAllocator<'a>,
    D::Doc: Clone,
{
    (alloc.nil())
        .append("[")
        .append(
            alloc
                .intersperse(
                    elems.iter().map(|elem| alloc.as_string(elem)),
                    alloc.text(",").append(alloc.line()),
                )
                .nest(1),
        )
        .append("]")
        .group()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::prim::{Constant, PrimType, ScalarOp};
    use crate::lang::svcode::{Kind, StreamId};

    fn render<'a>(doc: DocBuilder<'a, pretty::BoxAllocator>) -> String {
        doc.1.pretty(80).to_string()
    }

    #[test]
    fn instruction_listing() {
        let code = Svcode::new(vec![
            Instruction {
                name: StreamId::Output(0),
                kind: Kind::NUM,
                op: Op::Rep(Constant::Num(3.0)),
                args: vec![StreamId::Ctrl],
            },
            Instruction {
                name: StreamId::Output(1),
                kind: Kind::BOOL,
                op: Op::Map(ScalarOp::Lt(PrimType::Num)),
                args: vec![StreamId::Output(0), StreamId::Output(0)],
            },
        ]);
        let alloc = pretty::BoxAllocator;

        assert_eq!(
            render(from_svcode(&alloc, &code)),
            "s0 : num = rep_num[3](ctrl)\ns1 : bool = map_lt_num(s0, s0)",
        );
    }

    #[test]
    fn op_names() {
        assert_eq!(op_name(&Op::Scan(ReduceOp::Sum)), "scan_sum");
        assert_eq!(op_name(&Op::Reduce(Reducer::Fold(ReduceOp::Min(PrimType::Char)))), "reduce_min_char");
        assert_eq!(op_name(&Op::Dist(Kind::Ssa)), "dist_ssa");
    }

    #[test]
    fn value_trees() {
        let tree = StreamTree::seq(
            StreamId::Output(1),
            StreamTree::Tuple(vec![
                StreamTree::Sid(StreamId::Output(2), Kind::NUM),
                StreamTree::Sid(StreamId::Output(3), Kind::BOOL),
            ]),
        );
        let alloc = pretty::BoxAllocator;

        assert_eq!(render(from_value_tree(&alloc, &tree)), "ss(s1, tup(s2, s3))");
    }

    #[test]
    fn raw_streams() {
        let elems = vec![Elem::count(2), Elem::END, Elem::END];
        let alloc = pretty::BoxAllocator;

        assert_eq!(render(from_elems(&alloc, &elems)), "[2, |, |]");
    }
}
