pub mod prelude;

pub mod records;
pub mod users;
