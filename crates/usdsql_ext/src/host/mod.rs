//! Minimal in-process query host.
//!
//! Models the table-function API of a vectorised engine: a function is
//! bound once with its arguments, initialised once per invocation and then
//! pulled chunk by chunk until it reports an empty chunk.

mod value;
mod chunk;
mod function;
mod registry;

pub use value::*;
pub use chunk::*;
pub use function::*;
pub use registry::*;
