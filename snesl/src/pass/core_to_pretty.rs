//! Pretty prints core language types and values to a textual form.

use pretty::{DocAllocator, DocBuilder};

use crate::lang::core::semantics::Value;
use crate::lang::core::Type;
use crate::lang::prim::Constant;

pub fn from_type<'a, D>(alloc: &'a D, r#type: &'a Type) -> DocBuilder<'a, D>
where
    D: DocAllocator<'a>,
    D::Doc: Clone,
{
    match r#type {
        Type::Prim(prim_type) => alloc.text(prim_type.name()),
        Type::Tuple(types) => (alloc.nil())
            .append("(")
            .append(alloc.intersperse(
                types.iter().map(|r#type| from_type(alloc, r#type)),
                alloc.text(",").append(alloc.space()),
            ))
            .append(")")
            .group(),
        Type::Array(elem_type) => (alloc.nil())
            .append("[")
            .append(from_type(alloc, elem_type))
            .append("]"),
        Type::Sequence(elem_type) => (alloc.nil())
            .append("{")
            .append(from_type(alloc, elem_type))
            .append("}"),
    }
}

pub fn from_value<'a, D>(alloc: &'a D, value: &'a Value) -> DocBuilder<'a, D>
where
    D: DocAllocator<'a>,
    D::Doc: Clone,
{
    match value {
        Value::Constant(constant) => from_constant(alloc, constant),
        Value::Tuple(values) => (alloc.nil())
            .append("(")
            .append(entries(alloc, values))
            .append(")")
            .group(),
        Value::Sequence(values) => match as_string(values) {
            Some(string) => alloc.text(format!("{:?}", string)),
            None => (alloc.nil())
                .append("[")
                .append(entries(alloc, values))
                .append("]")
                .group(),
        },
        Value::Array(values) => (alloc.nil())
            .append("[|")
            .append(entries(alloc, values))
            .append("|]")
            .group(),
    }
}

pub fn from_constant<'a, D>(alloc: &'a D, constant: &'a Constant) -> DocBuilder<'a, D>
where
    D: DocAllocator<'a>,
    D::Doc: Clone,
{
    match constant {
        Constant::Num(value) => alloc.text(format!("{}", value)),
        Constant::Bool(value) => alloc.text(format!("{}", value)),
        Constant::Char(value) => alloc.text(format!("{:?}", value)),
    }
}

fn entries<'a, D>(alloc: &'a D, values: &'a [Value]) -> DocBuilder<'a, D>
where
    D: DocAllocator<'a>,
    D::Doc: Clone,
{
    alloc
        .intersperse(
            values.iter().map(|value| from_value(alloc, value)),
            alloc.text(",").append(alloc.line()),
        )
        .nest(1)
}

/// Non-empty sequences of characters are printed as string literals.
fn as_string(values: &[Value]) -> Option<String> {
    if values.is_empty() {
        return None;
    }

    values
        .iter()
        .map(|value| match value {
            Value::Constant(Constant::Char(c)) => Some(*c),
            _ => None,
        })
        .collect()
}
