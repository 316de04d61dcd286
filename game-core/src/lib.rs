pub mod chat_session;
pub mod prompt;
pub mod record;
pub mod stats;
pub mod word_list;

// Re-export main components
pub use chat_session::*;
pub use prompt::*;
pub use record::*;
pub use stats::*;
pub use word_list::*;
