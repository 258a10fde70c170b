pub mod authorize;
pub mod context;

pub use authorize::{PageDenial, api, page};
