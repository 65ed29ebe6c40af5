pub mod auth;
pub mod health;
pub mod nodes;
pub mod tasks;
pub mod users;
