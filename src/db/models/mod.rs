#![allow(unused_imports)]

//! Database models split into separate files.
//! Everything is re-exported so callers can `use crate::db::models::*;`.

pub mod list;
pub mod notification;
pub mod share;
pub mod task;
pub mod user;

pub use self::list::*;
pub use self::notification::*;
pub use self::share::*;
pub use self::task::*;
pub use self::user::*;
