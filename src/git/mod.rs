pub mod identity;
pub mod repo;
pub mod source;

pub use identity::resolve_author;
pub use repo::GitRepo;
pub use source::{discover_repositories, CommitSource, GitSource, RepositoryRef};
