//! Access to the Google Play edits API.
//!
//! Authentication happens once when the client is built; every call after
//! that is scoped to a single application package.

/// Android Publisher v3 client implementation using reqwest.
pub mod google_play;

/// Common trait over the edits operations.
pub mod traits;

/// Wire types for edits, bundles, and tracks.
pub mod types;
