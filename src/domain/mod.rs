pub mod currency;
pub mod order;
pub mod quote;

pub use currency::*;
pub use order::*;
pub use quote::*;
