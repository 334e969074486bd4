mod gel;

pub mod helpers;
pub mod op;
mod secret;

pub use gel::{Gel, GelConversionError, GEL_CURRENCY_CODE, GEL_CURRENCY_CODE_LOWER};
pub use secret::Secret;
