//! Derive macros for dynamic SSZ type description and (de)serialization.

#![deny(unused_must_use, missing_docs)]

extern crate proc_macro;

mod attribute;
mod describe;
mod deserialize;
mod helpers;
mod serialize;

use self::{
    describe::describe_derive,
    deserialize::deserialize_derive,
    serialize::serialize_derive,
};

synstructure::decl_derive!(
    [Describe, attributes(ssz)] =>
    /// Derives `Describe` for the given container `struct` or union `enum`.
    describe_derive
);
synstructure::decl_derive!(
    [Serialize, attributes(ssz)] =>
    /// Derives `Serialize` for the given container `struct` or union `enum`.
    serialize_derive
);
synstructure::decl_derive!(
    [Deserialize, attributes(ssz)] =>
    /// Derives `Deserialize` for the given container `struct` or union `enum`.
    deserialize_derive
);
