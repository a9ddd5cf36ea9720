pub mod engine;
pub mod storage;
pub mod cli;
pub mod utils;

pub use engine::*;
pub use storage::*;
pub use cli::*;
pub use utils::*;
