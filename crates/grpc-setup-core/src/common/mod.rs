pub mod types;

mod error;
pub use error::*;
