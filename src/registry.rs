//! Template registry: startup-time registration, lock-free shared lookups.
//!
//! Templates are registered while the process boots, then the registry is
//! wrapped in an [`Arc`] and handed out read-only. There is deliberately no
//! interior mutability: the type system enforces the "writes only during
//! startup" contract, and concurrent lookups during execution are plain map
//! reads.
//!
//! # Examples
//!
//! ```rust
//! use wireflow::registry::TemplateRegistry;
//! use wireflow::templates::{ComponentTemplate, OutputSpec};
//!
//! let mut registry = TemplateRegistry::new();
//! registry
//!     .register(
//!         ComponentTemplate::builder("literal", "Literal")
//!             .output(OutputSpec::new("value", ["str"]))
//!             .build(),
//!     )
//!     .unwrap();
//!
//! assert!(registry.lookup(&"literal".into()).is_ok());
//! assert!(registry.lookup(&"missing".into()).is_err());
//! ```

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::templates::ComponentTemplate;
use crate::types::TemplateId;

/// Errors from template registration and lookup.
#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("template already registered: {id}")]
    #[diagnostic(
        code(wireflow::registry::duplicate_template),
        help("Template ids must be unique; pick a new id or drop the earlier registration.")
    )]
    DuplicateTemplate { id: TemplateId },

    #[error("unknown template: {id}")]
    #[diagnostic(
        code(wireflow::registry::unknown_template),
        help("Register the template before referencing it from a node.")
    )]
    UnknownTemplate { id: TemplateId },
}

/// Holds the immutable component templates available to graphs.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: FxHashMap<TemplateId, Arc<ComponentTemplate>>,
}

impl TemplateRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from an iterator of templates, failing on the first
    /// duplicate id.
    pub fn with_templates<I>(templates: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = ComponentTemplate>,
    {
        let mut registry = Self::new();
        for template in templates {
            registry.register(template)?;
        }
        Ok(registry)
    }

    /// Register a template. Fails if the id is already present.
    pub fn register(&mut self, template: ComponentTemplate) -> Result<(), RegistryError> {
        let id = template.id.clone();
        if self.templates.contains_key(&id) {
            return Err(RegistryError::DuplicateTemplate { id });
        }
        self.templates.insert(id, Arc::new(template));
        Ok(())
    }

    /// Look up a template, failing with [`RegistryError::UnknownTemplate`]
    /// if absent.
    pub fn lookup(&self, id: &TemplateId) -> Result<&Arc<ComponentTemplate>, RegistryError> {
        self.templates
            .get(id)
            .ok_or_else(|| RegistryError::UnknownTemplate { id: id.clone() })
    }

    /// `Option`-returning sibling of [`lookup`](Self::lookup).
    #[must_use]
    pub fn get(&self, id: &TemplateId) -> Option<&Arc<ComponentTemplate>> {
        self.templates.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &TemplateId) -> bool {
        self.templates.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Iterate templates in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ComponentTemplate>> {
        let mut entries: Vec<_> = self.templates.values().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries.into_iter()
    }

    /// Serialize the full template listing for UI collaborators, sorted by
    /// id. Password field defaults are redacted by `FieldSpec`'s serializer.
    #[must_use]
    pub fn catalog(&self) -> Value {
        let listing: Vec<&ComponentTemplate> = self.iter().map(|t| t.as_ref()).collect();
        serde_json::to_value(&listing).unwrap_or(Value::Null)
    }
}
