mod association;
mod finance;
mod users;
mod wallet;

pub use association::*;
pub use finance::*;
pub use users::*;
pub use wallet::*;
