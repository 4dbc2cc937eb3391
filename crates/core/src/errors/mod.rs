pub mod core;

pub use self::core::{short_type_name, CoreError};
