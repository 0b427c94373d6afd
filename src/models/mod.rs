mod invoice;
mod payment;
mod promo_code;
mod user;

pub use invoice::*;
pub use payment::*;
pub use promo_code::*;
pub use user::*;
