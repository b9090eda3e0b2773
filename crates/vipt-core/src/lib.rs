pub mod error;
pub mod importer;
pub mod model;
pub mod targets;
pub mod tokenizer;

pub use error::*;
pub use importer::*;
pub use model::*;
pub use targets::*;
pub use tokenizer::*;
