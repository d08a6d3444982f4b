//! In-memory numeric arrays evaluated eagerly.

use crate::dtype::DType;
use crate::registry::BackendEntry;
use crate::variant::{ArrayType, FunctionType};

pub const NAME: &str = "plain-array";

pub const ALLOWED_TYPES: &[DType] = &[
    DType::F16,
    DType::F32,
    DType::F64,
    DType::I32,
    DType::I64,
    DType::U8,
    DType::Bool,
];

pub fn entry() -> BackendEntry {
    BackendEntry::new(
        NAME,
        ArrayType::PlainArray,
        FunctionType::PlainArray,
        ALLOWED_TYPES.iter().copied(),
    )
}
