//! Conversion between the flat contents of result streams and nested values.

use crate::lang::core::semantics::Value;
use crate::lang::core::Type;
use crate::lang::svcode::{Elem, Kind, Seg, StreamTree};
use crate::runtime::Output;

/// Errors produced when the contents of some streams do not describe a value.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ReifyError {
    #[error("expected a scalar, found `{0}`")]
    ExpectedScalar(Elem),
    #[error("expected a segment descriptor token, found `{0}`")]
    ExpectedSegment(Elem),
    #[error("a segment descriptor counts more elements than are available")]
    MissingElements,
    #[error("{0} elements are not part of any segment")]
    LeftoverElements(usize),
    #[error("a segment descriptor ends in the middle of a segment")]
    UnterminatedSegment,
    #[error("the components of a tuple have different lengths")]
    MismatchedComponents,
    #[error("expected a single result, found {0}")]
    LaneCount(usize),
    #[error("value does not have the type `{0}`")]
    MismatchedValue(Type),
}

/// Rebuild the value described by the output of a single-lane run.
pub fn reify(output: &Output) -> Result<Value, ReifyError> {
    let mut lanes = reify_lanes(output)?;
    match lanes.len() {
        1 => Ok(lanes.remove(0)),
        len => Err(ReifyError::LaneCount(len)),
    }
}

/// Rebuild one value for each lane of the output.
pub fn reify_lanes(output: &Output) -> Result<Vec<Value>, ReifyError> {
    match output {
        StreamTree::Sid(elems, _) => (elems.iter())
            .map(|elem| match elem {
                Elem::Const(constant) => Ok(Value::Constant(*constant)),
                elem => Err(ReifyError::ExpectedScalar(*elem)),
            })
            .collect(),
        StreamTree::Tuple(outputs) => {
            let columns = (outputs.iter())
                .map(reify_lanes)
                .collect::<Result<Vec<_>, _>>()?;
            let len = columns.first().map_or(0, Vec::len);
            if columns.iter().any(|column| column.len() != len) {
                return Err(ReifyError::MismatchedComponents);
            }

            let mut columns = columns.into_iter().map(Vec::into_iter).collect::<Vec<_>>();
            Ok((0..len)
                .map(|_| Value::Tuple(columns.iter_mut().filter_map(|column| column.next()).collect()))
                .collect())
        }
        StreamTree::Seq(ssd, elems) => {
            let groups = segments(ssd, reify_lanes(elems)?)?;
            Ok(groups.into_iter().map(Value::Sequence).collect())
        }
        StreamTree::Array(asd, elems) => {
            let groups = segments(asd, reify_lanes(elems)?)?;
            Ok(groups.into_iter().map(Value::Array).collect())
        }
    }
}

/// Group items according to a segment descriptor.
fn segments(descriptor: &[Elem], items: Vec<Value>) -> Result<Vec<Vec<Value>>, ReifyError> {
    let mut items = items.into_iter();
    let mut groups = Vec::new();
    let mut group = Vec::new();

    for elem in descriptor {
        match elem {
            Elem::Seg(Seg::Count(count)) => {
                for _ in 0..*count {
                    group.push(items.next().ok_or(ReifyError::MissingElements)?);
                }
            }
            Elem::Seg(Seg::End) => groups.push(std::mem::take(&mut group)),
            elem => return Err(ReifyError::ExpectedSegment(*elem)),
        }
    }

    match items.len() {
        _ if !group.is_empty() => Err(ReifyError::UnterminatedSegment),
        0 => Ok(groups),
        leftover => Err(ReifyError::LeftoverElements(leftover)),
    }
}

/// Lay out a value of the given type over flat streams, using one count
/// token for each non-empty segment.
pub fn flatten(value: &Value, r#type: &Type) -> Result<Output, ReifyError> {
    flatten_lanes(std::slice::from_ref(value), r#type)
}

/// Lay out one value for each lane.
pub fn flatten_lanes(values: &[Value], r#type: &Type) -> Result<Output, ReifyError> {
    let mismatch = || ReifyError::MismatchedValue(r#type.clone());

    match r#type {
        Type::Prim(prim_type) => {
            let elems = (values.iter())
                .map(|value| match value {
                    Value::Constant(constant) if constant.prim_type() == *prim_type => {
                        Ok(Elem::Const(*constant))
                    }
                    _ => Err(mismatch()),
                })
                .collect::<Result<_, _>>()?;
            Ok(StreamTree::Sid(elems, Kind::Prim(*prim_type)))
        }
        Type::Tuple(types) => {
            let mut columns = vec![Vec::with_capacity(values.len()); types.len()];
            for value in values {
                match value {
                    Value::Tuple(components) if components.len() == types.len() => {
                        for (column, component) in columns.iter_mut().zip(components) {
                            column.push(component.clone());
                        }
                    }
                    _ => return Err(mismatch()),
                }
            }

            (columns.iter().zip(types))
                .map(|(column, r#type)| flatten_lanes(column, r#type))
                .collect::<Result<_, _>>()
                .map(StreamTree::Tuple)
        }
        Type::Sequence(elem_type) => {
            let (ssd, items) = descriptor(values, |value| match value {
                Value::Sequence(items) => Some(items),
                _ => None,
            })
            .ok_or_else(mismatch)?;
            Ok(StreamTree::seq(ssd, flatten_lanes(&items, elem_type)?))
        }
        Type::Array(elem_type) => {
            let (asd, items) = descriptor(values, |value| match value {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .ok_or_else(mismatch)?;
            Ok(StreamTree::array(asd, flatten_lanes(&items, elem_type)?))
        }
    }
}

fn descriptor<'a>(
    values: &'a [Value],
    items: impl Fn(&'a Value) -> Option<&'a Vec<Value>>,
) -> Option<(Vec<Elem>, Vec<Value>)> {
    let mut tokens = Vec::new();
    let mut flat = Vec::new();

    for value in values {
        let items = items(value)?;
        if !items.is_empty() {
            tokens.push(Elem::count(items.len()));
        }
        tokens.push(Elem::END);
        flat.extend(items.iter().cloned());
    }

    Some((tokens, flat))
}
