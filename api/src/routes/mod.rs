pub mod activity_levels;
pub mod chat;
pub mod health;
pub mod plans;
pub mod users;
