//! Strata Core
//!
//! This crate provides the building blocks the strata composite store uses
//! to turn typed values into ordered key-value rows.
//!
//! # Overview
//!
//! - **Keys**: [`Key`] encodes a base name, identity segments and an optional
//!   member tag into a byte string whose lexical order matches the logical
//!   order, so one range scan returns every row of a composite.
//! - **Identifiers**: [`Identifier`] turns identity values into key segments
//!   that sort the same way the values do.
//! - **Marshaling**: [`Marshaling`] converts typed values to bytes
//!   ([`JsonMarshaling`], [`BincodeMarshaling`]).
//! - **Filtering**: [`Filtering`] post-processes marshaled bytes
//!   ([`NoFiltering`], [`GzipFiltering`]).
//! - **Codec**: [`Codec`] composes one marshaling and one filtering stage.
//!
//! # Example
//!
//! ```
//! use strata_core::{Identifier, Key, Separator};
//!
//! let sep = Separator::default();
//! let person = Key::from_parts("person", 42u32.to_key_segments());
//! let email = person.tagged("email", None);
//!
//! let encoded = email.encode(sep).unwrap();
//! assert!(encoded.starts_with(&person.encode(sep).unwrap()));
//! assert_eq!(Key::parse(&encoded, sep).unwrap(), email);
//! assert_eq!(email.to_string(), "person:0000000042#email");
//! ```
//!
//! # Modules
//!
//! - [`key`] - Composite key codec ([`Key`], [`Tag`], [`Separator`])
//! - [`identifier`] - Identity segment encoding ([`Identifier`])
//! - [`marshaling`] - Typed value serialization
//! - [`filtering`] - Byte post-processing
//! - [`codec`] - The two-stage value pipeline
//! - [`error`] - Error types ([`KeyError`], [`CoreError`])

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod codec;
pub mod error;
pub mod filtering;
pub mod identifier;
pub mod key;
pub mod marshaling;


pub use codec::Codec;
pub use error::{CoreError, KeyError};
pub use filtering::{Filtering, GzipFiltering, NoFiltering};
pub use identifier::Identifier;
pub use key::{Key, Separator, Tag};
pub use marshaling::{BincodeMarshaling, JsonMarshaling, Marshaling};
