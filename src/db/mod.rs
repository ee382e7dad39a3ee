mod repository;
mod schema;

pub use repository::{collected_now, Repository};
