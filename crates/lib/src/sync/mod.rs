//! Boundary with the transport.
//!
//! The document model never sends anything itself. Locally issued records
//! wait in an [`OutboundQueue`] until the transport drains them.

pub mod outbound;

pub use outbound::{OpStatus, OutboundQueue};
