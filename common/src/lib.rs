mod amount;
mod db;
mod error;
mod helpers;
mod schema;
mod services;

pub use amount::*;
pub use db::*;
pub use error::*;
pub use helpers::*;
pub use schema::*;
pub use services::*;
