//! Domain types for the Cantus song ownership registry.
//!
//! Everything the registry, storage, and RPC layers agree on lives here:
//! work identifiers, content fingerprints, the immutable song record, the
//! registration event payload, and the clock service that supplies
//! registration timestamps.

pub mod clock;
pub mod event;
pub mod fingerprint;
pub mod record;

pub use clock::*;
pub use event::*;
pub use fingerprint::*;
pub use record::*;
