//! Native element types
//!
//! A backend's array constructor accepts a fixed subset of these types (see
//! [`crate::registry`]). Arrays always hold `f32` values internally; the dtype
//! decides which values are representable, and [`DType::cast`] maps a value
//! onto that set when an array is constructed.

use crate::error::HybridError;
use half::{bf16, f16};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported native element types
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum DType {
    /// 16-bit floating point (IEEE 754 half precision)
    F16 = 0,
    /// 16-bit brain floating point (truncated f32 mantissa)
    BF16 = 1,
    /// 32-bit floating point (default)
    #[default]
    F32 = 2,
    /// 64-bit floating point
    F64 = 3,
    /// 32-bit signed integer
    I32 = 4,
    /// 64-bit signed integer
    I64 = 5,
    /// 8-bit unsigned integer
    U8 = 6,
    /// Boolean (stored as 0/1)
    Bool = 7,
}

impl DType {
    pub const ALL: [DType; 8] = [
        DType::F16,
        DType::BF16,
        DType::F32,
        DType::F64,
        DType::I32,
        DType::I64,
        DType::U8,
        DType::Bool,
    ];

    /// Returns the size in bytes of a single element of this dtype
    #[must_use]
    pub fn size_of(&self) -> usize {
        match self {
            DType::F16 | DType::BF16 => 2,
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
            DType::U8 | DType::Bool => 1,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::U8 => "u8",
            DType::Bool => "bool",
        }
    }

    /// Whether values keep a fractional part after [`DType::cast`]
    #[must_use]
    pub fn is_float(&self) -> bool {
        matches!(self, DType::F16 | DType::BF16 | DType::F32 | DType::F64)
    }

    /// Map `value` onto the nearest value this dtype can hold.
    ///
    /// Half types round through their 16-bit encoding, integers truncate toward
    /// zero and saturate at their bounds, and `Bool` becomes 0 or 1. NaN maps
    /// to 0 for every non-float type.
    #[must_use]
    pub fn cast(&self, value: f32) -> f32 {
        match self {
            DType::F32 | DType::F64 => value,
            DType::F16 => f16::from_f32(value).to_f32(),
            DType::BF16 => bf16::from_f32(value).to_f32(),
            // `as` saturates and sends NaN to zero
            DType::I32 => (value as i32) as f32,
            DType::I64 => (value as i64) as f32,
            DType::U8 => f32::from(value as u8),
            DType::Bool => {
                if value != 0.0 && !value.is_nan() {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DType {
    type Err = HybridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        DType::ALL
            .iter()
            .copied()
            .find(|d| d.name() == lower)
            .ok_or_else(|| HybridError::UnknownDType(s.to_string()))
    }
}
