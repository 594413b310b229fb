pub mod dedup;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use dedup::DedupStore;
pub use memory::MemoryRepository;
pub use postgres::PgRepository;
pub use repository::Repository;
