pub mod errors;
pub mod messages;
pub mod record;
pub mod user;

// Re-export all types
pub use errors::*;
pub use messages::*;
pub use record::*;
pub use user::*;
