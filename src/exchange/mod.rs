mod traits;

pub use traits::ExchangeApi;
