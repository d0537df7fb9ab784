pub mod configs_repo;
pub mod study_repo;

pub use configs_repo::ConfigsRepo;
pub use study_repo::StudyRepo;
