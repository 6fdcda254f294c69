pub mod offer;
pub mod vault;

pub use offer::*;
pub use vault::Vault;
