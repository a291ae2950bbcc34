//! # idbridge-mirror - document-mirror trigger logic
//!
//! Mirrors a per-user mutable location document into a public,
//! access-restricted projection and stamps retention metadata onto the
//! private copy.
//!
//! The design keeps trigger logic pure: [`location`] holds functions from
//! `(before, after)` document states to [`intent::WriteIntent`]s, and
//! [`intent::apply`] executes those intents through the [`store`] seam.
//! Nothing in the trigger path can fail because of the store - malformed
//! source documents are skipped, and store failures only surface at
//! execution time.
//!
//! ```rust
//! use idbridge_mirror::project_location;
//! use serde_json::json;
//!
//! let doc = json!({
//!     "lat": 48.85, "lng": 2.29, "geohash": "u09t", "timestamp": 1754000000
//! });
//! let intents = project_location("federated:user-42", Some(&doc));
//! assert_eq!(intents.len(), 1);
//! ```

pub mod intent;
pub mod location;
pub mod store;

#[doc(inline)]
pub use intent::{WriteIntent, apply};
#[doc(inline)]
pub use location::{
    EXPIRES_AT_FIELD, RETENTION_DAYS, private_path, project_location, public_path,
    stamp_retention,
};
#[doc(inline)]
pub use store::{DocumentStore, MemoryStore, StoreError};
