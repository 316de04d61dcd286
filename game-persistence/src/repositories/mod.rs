pub mod record_repository;
pub mod user_repository;

pub use record_repository::RecordRepository;
pub use user_repository::UserRepository;
