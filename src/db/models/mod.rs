mod activity;
mod repository;
mod user;

pub use activity::*;
pub use repository::*;
pub use user::*;
