//! Class metadata building context.
//!
//! One context spans one top-level `get_metadata_for` call tree. It carries
//! the collaborators drivers need (reflection and naming) and a queue of
//! second-pass steps that run exactly once, in insertion order, after every
//! class of the call tree finished its primary pass.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::Arc;

use ormeta_core::{ClassMetadata, MappingError, NamingStrategy, ReflectionService, Result};

/// Resolves class metadata on behalf of second-pass steps.
///
/// Implemented by the metadata factory.
pub trait MetadataResolver {
    /// Resolve metadata for a class within an existing building context.
    fn resolve_metadata(
        &mut self,
        class_name: &str,
        context: &ClassMetadataBuildingContext,
    ) -> Result<Arc<ClassMetadata>>;
}

/// Deferred step run by [`ClassMetadataBuildingContext::validate`].
pub type SecondPass =
    Box<dyn FnOnce(&mut dyn MetadataResolver, &ClassMetadataBuildingContext) -> Result<()>>;

/// Per-lookup scope shared by every class loaded in one call tree.
pub struct ClassMetadataBuildingContext {
    reflection: Arc<dyn ReflectionService>,
    naming_strategy: Arc<dyn NamingStrategy>,
    second_passes: RefCell<Vec<SecondPass>>,
    in_second_pass: Cell<bool>,
    validated: Cell<bool>,
    loaded: RefCell<Vec<String>>,
}

impl ClassMetadataBuildingContext {
    /// Create a context.
    pub fn new(
        reflection: Arc<dyn ReflectionService>,
        naming_strategy: Arc<dyn NamingStrategy>,
    ) -> Self {
        Self {
            reflection,
            naming_strategy,
            second_passes: RefCell::new(Vec::new()),
            in_second_pass: Cell::new(false),
            validated: Cell::new(false),
            loaded: RefCell::new(Vec::new()),
        }
    }

    /// Reflection service.
    #[must_use]
    pub fn reflection(&self) -> &dyn ReflectionService {
        self.reflection.as_ref()
    }

    /// Naming strategy.
    #[must_use]
    pub fn naming_strategy(&self) -> &dyn NamingStrategy {
        self.naming_strategy.as_ref()
    }

    /// Queue a second-pass step.
    ///
    /// Fails once the second pass has started.
    pub fn add_second_pass<F>(&self, step: F) -> Result<()>
    where
        F: FnOnce(&mut dyn MetadataResolver, &ClassMetadataBuildingContext) -> Result<()>
            + 'static,
    {
        if self.in_second_pass.get() || self.validated.get() {
            return Err(MappingError::SecondPassAlreadyStarted);
        }
        self.second_passes.borrow_mut().push(Box::new(step));
        Ok(())
    }

    /// Whether second-pass steps are currently running.
    #[must_use]
    pub fn is_in_second_pass(&self) -> bool {
        self.in_second_pass.get()
    }

    /// Number of queued second-pass steps.
    #[must_use]
    pub fn pending_second_passes(&self) -> usize {
        self.second_passes.borrow().len()
    }

    /// Run every queued second-pass step, once.
    ///
    /// A second call, including one made from inside a running step, fails
    /// with [`MappingError::ContextAlreadyValidated`].
    pub fn validate(&self, resolver: &mut dyn MetadataResolver) -> Result<()> {
        if self.validated.replace(true) {
            return Err(MappingError::ContextAlreadyValidated);
        }
        self.in_second_pass.set(true);
        let steps = self.second_passes.take();
        tracing::debug!(
            target: "ormeta::context",
            steps = steps.len(),
            "Running second pass"
        );
        let result = steps.into_iter().try_for_each(|step| step(resolver, self));
        self.in_second_pass.set(false);
        result
    }

    pub(crate) fn record_loaded(&self, class_name: &str) {
        self.loaded.borrow_mut().push(class_name.to_string());
    }

    /// Classes whose primary pass completed within this context.
    #[must_use]
    pub fn loaded_classes(&self) -> Vec<String> {
        self.loaded.borrow().clone()
    }
}

impl fmt::Debug for ClassMetadataBuildingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassMetadataBuildingContext")
            .field("naming_strategy", &self.naming_strategy)
            .field("pending_second_passes", &self.pending_second_passes())
            .field("in_second_pass", &self.in_second_pass.get())
            .field("validated", &self.validated.get())
            .field("loaded", &self.loaded.borrow())
            .finish_non_exhaustive()
    }
}
