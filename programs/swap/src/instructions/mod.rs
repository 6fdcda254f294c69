pub mod cancel_offer;
pub mod make_offer;
pub mod take_offer;

pub use cancel_offer::*;
pub use make_offer::*;
pub use take_offer::*;
