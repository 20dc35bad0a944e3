pub mod artifacts;
pub mod collection;
pub mod identity_store;

pub use artifacts::{ArtifactStore, FileArtifactStore, UrlError, UrlSigner};
pub use collection::{CollectionData, CollectionStore};
pub use identity_store::{FileIdentityStore, IdentityRecord, IdentityStore};
