//! Compiled computation graphs with fixed input shapes.
//!
//! Registered but inactive in the standard registry: its allowed types are
//! still consulted when a [`crate::symbol::Function`] binds arguments.

use crate::dtype::DType;
use crate::registry::BackendEntry;
use crate::variant::{ArrayType, FunctionType};

pub const NAME: &str = "symbolic-graph";

pub const ALLOWED_TYPES: &[DType] = &[DType::F16, DType::F32, DType::F64, DType::I32, DType::U8];

pub fn entry() -> BackendEntry {
    BackendEntry::new(
        NAME,
        ArrayType::SymbolicGraph,
        FunctionType::SymbolicGraph,
        ALLOWED_TYPES.iter().copied(),
    )
    .inactive()
}
