//! Domain entities for the database layer

pub mod message;
pub mod user;

pub use message::{ChatMessage, NewMessage};
pub use user::User;
