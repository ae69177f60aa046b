//  LIB.rs
//    by Ray Plante
//
//  Description:
//!   The `specifications` crate defines the wire and on-disk shapes shared
//!   across the job office binaries: the `Dataset` value type, its textual
//!   record encoding, and the event envelope exchanged over the broker.
//!   Nothing in this crate touches the filesystem or the network directly;
//!   it only describes shapes and how to move between them and strings.

pub mod event;
pub mod id_value;
pub mod dataset;
pub mod record;

pub use dataset::Dataset;
pub use id_value::IdValue;
pub use event::{CommandEvent, StatusEvent};
