pub mod generate;
pub mod list;
pub mod validate;

pub use generate::{GenerateConfig, generate_code};
pub use list::list_operations;
pub use validate::validate_document;
