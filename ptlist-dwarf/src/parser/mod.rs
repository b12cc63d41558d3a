//! Decoding of DWARF types and location expressions

pub mod location;
mod type_resolver;

pub use location::{FrameBase, FrameState, VariableLocation};
pub use type_resolver::TypeResolver;
