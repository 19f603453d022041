//! Active project and properties shared by a client and its clones.
//!
//! List operations fall back to the active project when no project filter is
//! given, and create operations merge the active properties underneath the
//! explicit ones.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::error::{NexusError, NexusResult};
use crate::models::annotations::PropertiesDict;
use crate::models::references::ProjectRef;

#[derive(Debug, Clone, Default)]
struct ActiveContext {
    project: Option<ProjectRef>,
    properties: PropertiesDict,
}

/// Handle to the shared active context.
#[derive(Debug, Clone, Default)]
pub struct ContextHandle {
    state: Arc<RwLock<ActiveContext>>,
}

impl ContextHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or clear) the project used when none is given explicitly.
    pub fn set_active_project(&self, project: Option<ProjectRef>) {
        debug!(project = ?project.as_ref().map(|p| p.id), "Active project changed");
        self.write(|ctx| ctx.project = project);
    }

    /// The active project, if any.
    pub fn active_project(&self) -> Option<ProjectRef> {
        self.read(|ctx| ctx.project.clone())
    }

    /// The active project, or [`NexusError::NoActiveProject`].
    pub fn require_active_project(&self) -> NexusResult<ProjectRef> {
        self.active_project().ok_or(NexusError::NoActiveProject)
    }

    /// Resolve an explicit project against the active one.
    pub fn project_or_active(&self, project: Option<&ProjectRef>) -> NexusResult<ProjectRef> {
        match project {
            Some(p) => Ok(p.clone()),
            None => self.require_active_project(),
        }
    }

    pub fn active_properties(&self) -> PropertiesDict {
        self.read(|ctx| ctx.properties.clone())
    }

    /// Merge `properties` into the active set, overwriting existing keys.
    pub fn update_active_properties(&self, properties: PropertiesDict) {
        self.write(|ctx| ctx.properties.extend(properties));
    }

    pub fn clear_active_properties(&self) {
        self.write(|ctx| ctx.properties.clear());
    }

    /// Make `project` active until the guard is dropped.
    pub fn using_project(&self, project: ProjectRef) -> ContextGuard {
        let previous = self.active_project();
        self.set_active_project(Some(project));
        ContextGuard {
            handle: self.clone(),
            restore: Some(Restore::Project(previous)),
        }
    }

    /// Merge `properties` into the active set until the guard is dropped.
    pub fn using_properties(&self, properties: PropertiesDict) -> ContextGuard {
        let previous = self.active_properties();
        self.update_active_properties(properties);
        ContextGuard {
            handle: self.clone(),
            restore: Some(Restore::Properties(previous)),
        }
    }

    fn read<R>(&self, f: impl FnOnce(&ActiveContext) -> R) -> R {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write(&self, f: impl FnOnce(&mut ActiveContext)) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

#[derive(Debug)]
enum Restore {
    Project(Option<ProjectRef>),
    Properties(PropertiesDict),
}

/// Restores the previous project or properties when dropped.
#[must_use = "the previous context is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ContextGuard {
    handle: ContextHandle,
    restore: Option<Restore>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        match self.restore.take() {
            Some(Restore::Project(previous)) => self.handle.set_active_project(previous),
            Some(Restore::Properties(previous)) => self.handle.write(|ctx| ctx.properties = previous),
            None => {}
        }
    }
}
