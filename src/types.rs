//! Types and traits for real numbers
use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

/// Floating point type, used for generic kernel evaluations
pub trait FloatNum:
    Float + FromPrimitive + Debug + SubAssign + AddAssign + MulAssign + DivAssign
{
}

impl<T> FloatNum for T where
    T: Float + FromPrimitive + Debug + SubAssign + AddAssign + MulAssign + DivAssign
{
}
