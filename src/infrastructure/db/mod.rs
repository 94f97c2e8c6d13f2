pub mod dialect;
pub mod repository;

pub use repository::SqlxRepository;
