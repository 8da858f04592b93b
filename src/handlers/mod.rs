//! HTTP request handlers

pub mod auth;
pub mod bookings;
pub mod maintenance;
pub mod middleware;
pub mod reports;
pub mod resources;
pub mod users;

pub use auth::*;
pub use bookings::*;
pub use maintenance::*;
pub use reports::*;
pub use resources::*;
pub use users::*;
