//! Query helpers grouped by table family.

mod result_count_repo;

pub use result_count_repo::ResultCountRepo;
