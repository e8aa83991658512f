use bytemuck::{Pod, Zeroable};
use derive_more::Display;
use half::f16;
use serde::{Deserialize, Serialize};

/// Type tag of a buffer's elements, used to select kernel implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum DataType {
    F16,
    F32,
    F64,
    I64,
}

impl DataType {
    /// Returns size of one element of this data type in bytes.
    pub const fn size(self) -> usize {
        match self {
            DataType::F16 => 2,
            DataType::F32 => 4,
            DataType::F64 => 8,
            DataType::I64 => 8,
        }
    }
}

pub trait Zero {
    fn zero() -> Self;
}

impl Zero for f16 {
    fn zero() -> Self {
        Self::ZERO
    }
}

impl Zero for f32 {
    fn zero() -> Self {
        0.0
    }
}

impl Zero for f64 {
    fn zero() -> Self {
        0.0
    }
}

impl Zero for i64 {
    fn zero() -> Self {
        0
    }
}

pub trait One {
    fn one() -> Self;
}

impl One for f16 {
    fn one() -> Self {
        Self::ONE
    }
}

impl One for f32 {
    fn one() -> Self {
        1.0
    }
}

impl One for f64 {
    fn one() -> Self {
        1.0
    }
}

impl One for i64 {
    fn one() -> Self {
        1
    }
}

pub trait Scalar:
    Sized
    + Zeroable
    + Pod
    + Zero
    + One
    + PartialEq
    + std::fmt::Debug
    + std::ops::Add<Output = Self>
    + std::ops::Mul<Output = Self>
    + Send
    + Sync
    + 'static
{
    const DATA_TYPE: DataType;
}

impl Scalar for f16 {
    const DATA_TYPE: DataType = DataType::F16;
}

impl Scalar for f32 {
    const DATA_TYPE: DataType = DataType::F32;
}

impl Scalar for f64 {
    const DATA_TYPE: DataType = DataType::F64;
}

impl Scalar for i64 {
    const DATA_TYPE: DataType = DataType::I64;
}

/// Scalars that round-trip through `f64`, the wire format of packed task
/// arguments.
pub trait Float: Scalar {
    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
}

impl Float for f16 {
    fn from_f64(value: f64) -> Self {
        f16::from_f64(value)
    }

    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }
}

impl Float for f32 {
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Float for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }
}
