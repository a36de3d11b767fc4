//! Remote collaborators - source control and the deployment target
//!
//! Everything that leaves the process lives here, behind traits so the
//! execution engine and the built-in steps never know whether they are
//! talking to git and a real cluster or to in-memory fakes.

pub mod fetcher;
pub mod kubectl;
pub mod store;

pub use fetcher::{FetchError, GitCliFetcher, Revision, SourceFetcher};
pub use kubectl::KubectlStore;
pub use store::{
    Applied, InMemoryResourceStore, Resource, ResourceError, ResourceKind, ResourceStore,
};
