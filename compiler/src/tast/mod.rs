pub mod id_types;
pub mod types;
pub mod elements;
pub mod node;
pub mod visit;
pub mod builder;

pub use id_types::*;
pub use types::*;
pub use elements::*;
pub use node::*;
pub use visit::MutVisitor;
