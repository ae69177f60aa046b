//  LIB.rs
//    by Ray Plante
//
//  Description:
//!   The `joboffice-shr` crate defines common functions and other tools
//!   shared across the job office binaries. This crate differs from the
//!   `specifications` crate in that it does not aim to standardize wire
//!   shapes, but rather to provide a common implementation of filesystem
//!   and broker plumbing.

// Declare some modules
pub mod fs;
pub mod kafka;
