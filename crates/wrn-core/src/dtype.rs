use std::fmt;

use serde::Serialize;

/// Element type stored in a [`Tensor`](crate::Tensor).
/// Implemented for `f32` and `f64`.
pub trait Float:
    Copy
    + Default
    + PartialEq
    + PartialOrd
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + Serialize
    + 'static
{
    const ZERO: Self;
    const ONE: Self;

    fn from_f64(v: f64) -> Self;
}

macro_rules! impl_float {
    ($($t:ty),*) => {
        $(
            impl Float for $t {
                const ZERO: Self = 0.0;
                const ONE: Self = 1.0;

                #[inline] fn from_f64(v: f64) -> Self { v as $t }
            }
        )*
    };
}

impl_float!(f32, f64);
