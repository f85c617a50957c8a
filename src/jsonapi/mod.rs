//! JSON:API plumbing: envelope types, relationship inlining, and pagination.

pub mod decode;
pub mod document;
pub mod paginate;
pub mod resolve;

pub use decode::{decode, describe};
pub use document::{Document, Meta, Relationship, RelationshipData, Resource, ResourceRef};
pub use paginate::{PageFetcher, paginate, paginate_as};
pub use resolve::{IncludedTable, inline, resolve};
