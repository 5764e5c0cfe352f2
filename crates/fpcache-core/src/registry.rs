//! The per-session function registry.
//!
//! [`RegistryBuilder`] classifies, hashes and parses every source once;
//! [`Registry`] is the immutable result. A registry is an explicit value
//! handed to the graph builder. There is no global function table.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::category::Category;
use crate::diagnostic::Diagnostic;
use crate::error::CoreError;
use crate::flags::ControlFlags;
use crate::function::{base_name, FunctionDescriptor, FunctionSource};
use crate::id::FunctionId;

/// Incrementally collects function sources.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    functions: IndexMap<String, FunctionDescriptor>,
    diagnostics: Vec<Diagnostic>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one function source.
    ///
    /// Fails fast with [`CoreError::UnknownCategory`] when the name carries
    /// no recognised prefix and the source is not marked `other`, and with
    /// [`CoreError::DuplicateFunction`] when the name is already taken.
    pub fn add(&mut self, source: FunctionSource) -> Result<FunctionId, CoreError> {
        if self.functions.contains_key(&source.name) {
            return Err(CoreError::DuplicateFunction { name: source.name });
        }

        let category = if source.other {
            Category::Other
        } else {
            Category::classify(base_name(&source.name)).ok_or_else(|| {
                CoreError::UnknownCategory {
                    name: source.name.clone(),
                }
            })?
        };

        let (flags, diagnostics) = ControlFlags::parse(&source.name, &source.text);
        self.diagnostics.extend(diagnostics);

        let id = FunctionId(self.functions.len() as u32);
        let descriptor = FunctionDescriptor {
            id,
            source_hash: blake3::hash(source.text.as_bytes()),
            name: source.name.clone(),
            category,
            source: source.text,
            location: source.location,
            source_folder: source.source_folder,
            flags,
        };
        tracing::trace!(function = %descriptor.name, %category, "registered function");
        self.functions.insert(source.name, descriptor);
        Ok(id)
    }

    /// Finishes registration and builds the lookup indices.
    pub fn build(self) -> Registry {
        // Unqualified lookups resolve to the smallest full name sharing the
        // identifier, independent of registration order.
        let mut by_base: HashMap<String, FunctionId> = HashMap::new();
        for descriptor in self.functions.values() {
            by_base
                .entry(descriptor.base_name().to_string())
                .and_modify(|current| {
                    let current_name = &self.functions[current.0 as usize].name;
                    if descriptor.name < *current_name {
                        *current = descriptor.id;
                    }
                })
                .or_insert(descriptor.id);
        }

        Registry {
            functions: self.functions,
            by_base,
            diagnostics: self.diagnostics,
        }
    }
}

/// Every known pipeline function of one session, indexed by name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    functions: IndexMap<String, FunctionDescriptor>,
    by_base: HashMap<String, FunctionId>,
    diagnostics: Vec<Diagnostic>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registers all `sources` in iteration order.
    pub fn from_sources<I>(sources: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = FunctionSource>,
    {
        let mut builder = RegistryBuilder::new();
        for source in sources {
            builder.add(source)?;
        }
        Ok(builder.build())
    }

    /// Returns the descriptor with the given ID.
    pub fn get(&self, id: FunctionId) -> Option<&FunctionDescriptor> {
        self.functions
            .get_index(id.0 as usize)
            .map(|(_, descriptor)| descriptor)
    }

    /// Looks up a function by its exact registered name.
    pub fn by_name(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.get(name)
    }

    /// Resolves a reference as written in source or an annotation.
    ///
    /// Tries the exact name first, then the reference with its namespace
    /// qualifier stripped.
    pub fn resolve(&self, reference: &str) -> Option<FunctionId> {
        if let Some(descriptor) = self.functions.get(reference) {
            return Some(descriptor.id);
        }
        self.by_base.get(base_name(reference)).copied()
    }

    /// Like [`resolve`](Self::resolve), failing with
    /// [`CoreError::FunctionNotFound`].
    pub fn require(&self, reference: &str) -> Result<&FunctionDescriptor, CoreError> {
        self.resolve(reference)
            .and_then(|id| self.get(id))
            .ok_or_else(|| CoreError::FunctionNotFound {
                name: reference.to_string(),
            })
    }

    /// Iterates descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &FunctionDescriptor> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Annotation problems found during registration.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_classifies() {
        let registry = Registry::from_sources([
            FunctionSource::new("readData", "readData <- function() 1"),
            FunctionSource::new("calcExample", "calcExample <- function() readData()"),
            FunctionSource::new("smooth", "smooth <- function(x) x").as_other(),
        ])
        .unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.by_name("readData").unwrap().category, Category::Read);
        assert_eq!(registry.by_name("calcExample").unwrap().category, Category::Calc);
        assert_eq!(registry.by_name("smooth").unwrap().category, Category::Other);
        assert_eq!(registry.get(FunctionId(1)).unwrap().name, "calcExample");
    }

    #[test]
    fn unknown_category_is_fatal() {
        let err = Registry::from_sources([FunctionSource::new("smooth", "x")]).unwrap_err();
        assert_eq!(
            err,
            CoreError::UnknownCategory {
                name: "smooth".into()
            }
        );
    }

    #[test]
    fn duplicate_name_is_fatal() {
        let mut builder = Registry::builder();
        builder.add(FunctionSource::new("readData", "a")).unwrap();
        let err = builder.add(FunctionSource::new("readData", "b")).unwrap_err();
        assert_eq!(
            err,
            CoreError::DuplicateFunction {
                name: "readData".into()
            }
        );
    }

    #[test]
    fn source_hash_is_content_addressed() {
        let a = Registry::from_sources([
            FunctionSource::new("readA", "same text"),
            FunctionSource::new("readB", "other text"),
        ])
        .unwrap();
        let b = Registry::from_sources([
            FunctionSource::new("readB", "other text"),
            FunctionSource::new("readA", "same text"),
        ])
        .unwrap();

        assert_eq!(
            a.by_name("readA").unwrap().source_hash,
            b.by_name("readA").unwrap().source_hash
        );
        assert_eq!(
            a.by_name("readA").unwrap().source_hash,
            blake3::hash(b"same text")
        );
        assert_ne!(
            a.by_name("readA").unwrap().source_hash,
            a.by_name("readB").unwrap().source_hash
        );
    }

    #[test]
    fn resolves_qualified_references() {
        let registry = Registry::from_sources([
            FunctionSource::new("pkg:::toolHelper", "x"),
            FunctionSource::new("readData", "y"),
        ])
        .unwrap();

        let helper = registry.by_name("pkg:::toolHelper").unwrap().id;
        assert_eq!(registry.resolve("pkg:::toolHelper"), Some(helper));
        assert_eq!(registry.resolve("toolHelper"), Some(helper));
        assert_eq!(registry.resolve("other:::readData"), registry.resolve("readData"));
        assert_eq!(registry.resolve("readMissing"), None);
    }

    #[test]
    fn ambiguous_base_name_resolves_independent_of_order() {
        let forward = Registry::from_sources([
            FunctionSource::new("b:::toolX", "1"),
            FunctionSource::new("a:::toolX", "2"),
        ])
        .unwrap();
        let backward = Registry::from_sources([
            FunctionSource::new("a:::toolX", "2"),
            FunctionSource::new("b:::toolX", "1"),
        ])
        .unwrap();

        let name = |registry: &Registry| {
            let id = registry.resolve("toolX").unwrap();
            registry.get(id).unwrap().name.clone()
        };
        assert_eq!(name(&forward), "a:::toolX");
        assert_eq!(name(&backward), "a:::toolX");
    }

    #[test]
    fn require_reports_missing_function() {
        let registry = Registry::default();
        assert_eq!(
            registry.require("calcNothing").unwrap_err(),
            CoreError::FunctionNotFound {
                name: "calcNothing".into()
            }
        );
    }

    #[test]
    fn annotation_diagnostics_are_collected() {
        let registry = Registry::from_sources([FunctionSource::new(
            "calcX",
            "\"!# @monitor\"\n\"!# @bogus y\"",
        )])
        .unwrap();
        assert_eq!(registry.diagnostics().len(), 2);
    }
}
