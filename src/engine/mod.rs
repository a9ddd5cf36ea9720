// Query engine components
pub mod filter;
pub mod projection;
pub mod query_builder;
pub mod query_executor;
pub mod request;

pub use filter::{FilterChain, OrGroup};
pub use projection::{ColumnSpec, Projector, RelationTerm};
pub use query_builder::*;
pub use request::*;
