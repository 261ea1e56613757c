pub mod camera;
pub mod identity;
pub mod memory_store;
pub mod pg_store;

pub use camera::StillFrameCamera;
pub use identity::LocalIdentity;
pub use memory_store::InMemoryPhotoStore;
pub use pg_store::PgPhotoStore;
