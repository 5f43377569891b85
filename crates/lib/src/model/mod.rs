//! The document tree: values, structural nodes and path addressing.
//!
//! Everything in this module is plain data with no notion of replicas,
//! events or participants. [`crate::document::DocumentHandle`] layers
//! those on top.

pub mod errors;
pub mod list;
pub mod map;
pub mod node;
pub mod path;
pub mod resolver;
pub mod store;
pub mod text;
pub mod value;

pub use errors::{ModelError, PathError};
pub use list::ListNode;
pub use map::MapNode;
pub use node::{Node, NodeEntry, NodeId, NodeKind};
pub use path::{PathBuf, Segment};
pub use resolver::Resolved;
pub use store::NodeStore;
pub use text::{Annotation, AnnotationSet, TextNode};
pub use value::{PlainValue, Value};
