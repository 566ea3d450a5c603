//! Intermediate languages of the SNESL compiler.

pub mod surface;
//       🠃
pub mod core;
//       🠃
pub mod svcode;

pub mod prim;

/// A range of source code.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    pub fn merge(self, other: Range) -> Range {
        Range {
            start: std::cmp::min(self.start, other.start),
            end: std::cmp::max(self.end, other.end),
        }
    }
}

impl From<std::ops::Range<usize>> for Range {
    fn from(src: std::ops::Range<usize>) -> Range {
        Range {
            start: src.start,
            end: src.end,
        }
    }
}

impl From<Range> for std::ops::Range<usize> {
    fn from(src: Range) -> std::ops::Range<usize> {
        src.start..src.end
    }
}

/// Data that covers some range of source code.
#[derive(Debug, Clone)]
pub struct Ranged<Data> {
    pub range: Range,
    pub data: Data,
}

impl<Data> Ranged<Data> {
    pub fn new(range: Range, data: Data) -> Ranged<Data> {
        Ranged { range, data }
    }

    pub fn map<T>(self, f: impl FnOnce(Data) -> T) -> Ranged<T> {
        Ranged::new(self.range, f(self.data))
    }
}

impl<Data> From<Data> for Ranged<Data> {
    fn from(data: Data) -> Ranged<Data> {
        Ranged::new(Range { start: 0, end: 0 }, data)
    }
}
