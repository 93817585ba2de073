//! Core identifier types for the wireflow engine.
//!
//! This module defines the newtypes used throughout the system to refer to
//! nodes, templates, and port type tags. Keeping them distinct at the type
//! level prevents the classic string-soup mistakes (passing a template id
//! where a node id is expected) without imposing any runtime cost: each is a
//! transparent wrapper over `String` and serializes as a plain JSON string.
//!
//! # Key Types
//!
//! - [`NodeId`]: Identifies one node instance within a graph
//! - [`TemplateId`]: Identifies an immutable component template in the registry
//! - [`TypeTag`]: A port type label used for connection compatibility
//!
//! # Examples
//!
//! ```rust
//! use wireflow::types::{NodeId, TemplateId, TypeTag};
//!
//! let node = NodeId::from("uppercase-1");
//! let template = TemplateId::from("uppercase");
//! let tag = TypeTag::from("str");
//!
//! assert_eq!(node.as_str(), "uppercase-1");
//! assert_eq!(format!("{template}"), "uppercase");
//! assert_eq!(tag, TypeTag::from("str"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a node instance within a graph.
///
/// Node ids are chosen by the graph author and must be unique within one
/// graph; validation rejects duplicates. They are ordinary strings under the
/// hood, so authored JSON graphs round-trip without any mapping table.
///
/// # Examples
///
/// ```rust
/// use wireflow::types::NodeId;
///
/// let id = NodeId::new("literal-1");
/// assert_eq!(id.as_str(), "literal-1");
/// assert_eq!(NodeId::from("literal-1"), id);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Developer Experience: allow using string literals where a NodeId is expected.
impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifies an immutable component template in the registry.
///
/// Registered once at startup, referenced by every node instantiating the
/// template and by the result cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(String);

impl TemplateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TemplateId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TemplateId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for TemplateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A port type label, e.g. `"str"`, `"Message"`, `"Document"`.
///
/// Tags form an open set: templates declare which tags their outputs produce
/// and which tags each input field accepts, and an edge is valid exactly when
/// the two declared sets intersect. The engine never interprets a tag's
/// content; equality is the only operation.
///
/// # Examples
///
/// ```rust
/// use wireflow::types::TypeTag;
///
/// let produced = [TypeTag::from("Message"), TypeTag::from("str")];
/// let accepts = [TypeTag::from("str")];
/// assert!(produced.iter().any(|t| accepts.contains(t)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(String);

impl TypeTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TypeTag {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TypeTag {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for TypeTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
