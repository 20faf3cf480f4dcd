pub mod error;
pub mod time;

pub use error::DomainError;
pub use time::TimeRange;
