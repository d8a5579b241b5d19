mod amounts;
mod helpers;
pub mod op;
mod secret;

pub use amounts::{AmountConversionError, ElurcAmount, EurCents, ELURC_CURRENCY_CODE, ELURC_DECIMALS};
pub use helpers::parse_boolean_flag;
pub use secret::Secret;
