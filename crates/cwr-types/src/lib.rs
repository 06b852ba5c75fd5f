//! Foundation types for the CWR digital-object front end.
//!
//! This crate provides the identifier, object, and error-classification types
//! used throughout the CWR crates. Every other CWR crate depends on `cwr-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Persistent identifier of an object in the object store
//! - [`IdPrefix`] -- The store's identifier prefix; any string starting with it is a reference
//! - [`LinkedObject`] -- A node of the source linked-data graph
//! - [`ObjectType`] -- Closed classification of a node's type tags
//! - [`ErrorClass`] -- Caller-facing failure taxonomy shared by all crates

pub mod error;
pub mod id;
pub mod object;
pub mod reference;

pub use error::{ErrorClass, TypeError};
pub use id::{IdPrefix, ObjectId};
pub use object::{type_tags, LinkedObject, ObjectType};
pub use reference::{
    as_list, reference, reference_id, reference_ids, string_or_reference, unwrap_value,
};
