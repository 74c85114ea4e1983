use crate::{
    compile::{compile, CompiledTemplate},
    log::Error,
    marker::Marker,
    template::{Description, MarkupKind, Strings},
};
use std::collections::HashMap;

/// Identifies a compiled template within a [`Templates`] store.
///
/// Two renders share a `TemplateId` exactly when they were compiled from
/// the same template definition, so a part holding an instance can tell a
/// value update apart from a template swap by comparing ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateId(usize);

/// Per-scope lookup tables from a description to its compiled template.
#[derive(Debug, Default)]
struct Scope {
    /// Fast path keyed by the address of the shared chunk allocation.
    by_identity: HashMap<(MarkupKind, usize), TemplateId>,
    /// Fallback keyed by chunk content, for descriptions rebuilt from
    /// equal chunks in fresh allocations.
    by_content: HashMap<(MarkupKind, String), TemplateId>,
}

/// Owns every compiled template and the caches that find them.
///
/// Compilation is idempotent: the same description compiles once and every
/// later lookup returns the same [`TemplateId`]. Each scope name caches
/// independently, and the unscoped cache is its own scope.
#[derive(Debug, Default)]
pub struct Templates {
    entries: Vec<CompiledTemplate>,
    scopes: HashMap<Option<String>, Scope>,
    /// Every chunk allocation keyed in an identity map, kept alive so an
    /// address can never be freed and reused by a different definition.
    retained: Vec<Strings>,
}

impl Templates {
    /// Create a new, empty Templates store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the compiled template with the given id.
    pub fn get(&self, id: TemplateId) -> &CompiledTemplate {
        &self.entries[id.0]
    }

    /// Return the id of the template compiled for the given description,
    /// compiling it first if this is the first time it is seen in the
    /// given scope.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the description fails to compile.
    pub fn obtain(
        &mut self,
        description: &Description,
        scope: Option<&str>,
    ) -> Result<TemplateId, Error> {
        let scope = self
            .scopes
            .entry(scope.map(str::to_string))
            .or_default();
        let identity_key = (description.kind, description.strings.identity());
        if let Some(id) = scope.by_identity.get(&identity_key) {
            return Ok(*id);
        }

        // Joining with the token makes equal-content chunk lists collide
        // exactly when their joined sources would.
        let content_key = (
            description.kind,
            description.strings.join_with(Marker::get().token()),
        );
        if let Some(id) = scope.by_content.get(&content_key).copied() {
            // Same definition through a fresh allocation, remember the
            // new address too. Retaining the chunks keeps the address
            // from being reused while the key is live.
            scope.by_identity.insert(identity_key, id);
            self.retained.push(description.strings.clone());
            return Ok(id);
        }

        let compiled = compile(description)?;
        let id = TemplateId(self.entries.len());
        self.entries.push(compiled);
        scope.by_identity.insert(identity_key, id);
        scope.by_content.insert(content_key, id);
        tracing::debug!(id = id.0, "compiled template");

        Ok(id)
    }

    /// Return mutable access to the compiled template with the given id.
    pub(crate) fn get_mut(&mut self, id: TemplateId) -> &mut CompiledTemplate {
        &mut self.entries[id.0]
    }

    /// Return the number of compiled templates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return true when nothing is compiled yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Creates or finds compiled templates for descriptions during a render.
///
/// The default factory is [`Templates::obtain`]; replace it to intercept
/// template creation, for example to share one store between engines.
pub trait TemplateFactory {
    /// Return the id of the template for the given description.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the description fails to compile.
    fn obtain(
        &self,
        templates: &mut Templates,
        description: &Description,
        scope: Option<&str>,
    ) -> Result<TemplateId, Error>;
}

/// The standard factory, delegating to the store's own cache.
#[derive(Debug, Default)]
pub struct DefaultFactory;

impl TemplateFactory for DefaultFactory {
    fn obtain(
        &self,
        templates: &mut Templates,
        description: &Description,
        scope: Option<&str>,
    ) -> Result<TemplateId, Error> {
        templates.obtain(description, scope)
    }
}
