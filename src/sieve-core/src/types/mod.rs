//! Value and slice types.

mod slice;
mod value;

pub use slice::Slice;
pub use value::Value;
