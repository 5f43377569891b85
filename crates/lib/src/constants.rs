//! Constants used throughout the sharedoc library.
//!
//! Reserved identifiers and separators shared by several modules.

/// Id of every document's root map.
pub const ROOT_NODE_ID: &str = "root";

/// Separates the issuing replica from the counter in generated node ids.
pub const NODE_ID_SEPARATOR: char = ':';

/// Prefix of the id of a participant's private map, `user:<address>`.
pub const PRIVATE_NODE_PREFIX: &str = "user";

/// Separates the name from the domain in a participant address.
pub const ADDRESS_SEPARATOR: char = '@';
