//! Object storage gateway for the Agroww Kavach backend
//!
//! Posts and timeline entries carry images. This crate validates incoming
//! uploads, stores them in one of the configured backends and releases them
//! again when their owning document goes away.
//!
//! Three backends implement [`ObjectStorage`]:
//! - [`S3Storage`]: any S3-compatible bucket (DigitalOcean Spaces in production)
//! - [`LocalStorage`]: files on local disk, served by the API under `/uploads`
//! - [`MemoryStorage`]: in-process map used by tests and the memory dev mode

pub mod config;
pub mod error;
pub mod gateway;
pub mod keys;
pub mod local;
pub mod memory;
pub mod policy;
pub mod s3;

pub use config::{StorageBackend, StorageConfig, connect};
pub use error::{StorageError, StorageResult};
pub use gateway::{ObjectStorage, Upload};
pub use keys::{key_from_url, object_key, sanitize_file_name};
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use policy::UploadPolicy;
pub use s3::S3Storage;
