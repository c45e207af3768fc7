//! Content hashing for the Realm asset layer.
//!
//! Assets are addressed by the SHA-256 of their bytes, hex-encoded, with the
//! original file extension appended. All hashing wraps `sha2`; there is no
//! custom cryptography here.

pub mod hasher;

pub use hasher::{ContentHasher, HasherError};
