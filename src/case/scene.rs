//! Typed registry of the meshes the carving steps work on.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

use crate::error::{CaseError, Result, SelectionError};
use crate::math::Point2;
use crate::mesh::{Mesh, RegionTracker};
use crate::operations::boolean::BooleanOp;

use super::solid::Solid;
use super::tags::Tag;

/// Names of the scene objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKey {
    Case,
    /// Inner sheet of the uncarved case, normals facing the cavity.
    InnerReference,
    BottomPlate,
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ObjectKey::Case => "case",
            ObjectKey::InnerReference => "inner_reference",
            ObjectKey::BottomPlate => "bottom_plate",
        })
    }
}

#[derive(Debug, Clone)]
pub struct SceneObject {
    pub mesh: Mesh,
    pub tags: RegionTracker<Tag>,
}

impl SceneObject {
    #[must_use]
    pub fn new(mesh: Mesh) -> Self {
        Self {
            mesh,
            tags: RegionTracker::new(),
        }
    }
}

/// A boolean waiting for the bottom plate to exist.
#[derive(Debug, Clone)]
pub struct QueuedBoolean {
    pub op: BooleanOp,
    pub mesh: Mesh,
}

/// The meshes of one generation run.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    objects: BTreeMap<ObjectKey, SceneObject>,
    /// Inner floor loop of the case, counter-clockwise seen from above.
    pub floor_outline: Vec<Point2>,
    /// Operations to apply to the bottom plate once it is built.
    pub bottom_queue: Vec<QueuedBoolean>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A scene holding an assembled solid and its inner reference.
    #[must_use]
    pub fn from_solid(solid: Solid) -> Self {
        let mut scene = Self::new();
        scene.insert(
            ObjectKey::Case,
            SceneObject {
                mesh: solid.mesh,
                tags: solid.tags,
            },
        );
        scene.insert(ObjectKey::InnerReference, SceneObject::new(solid.inner_reference));
        scene.floor_outline = solid.floor_outline;
        scene
    }

    /// Adds or replaces an object, returning the previous one.
    pub fn insert(&mut self, key: ObjectKey, object: SceneObject) -> Option<SceneObject> {
        self.objects.insert(key, object)
    }

    #[must_use]
    pub fn get(&self, key: ObjectKey) -> Option<&SceneObject> {
        self.objects.get(&key)
    }

    /// The object under `key`, which must exist.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::MissingObject` if it does not.
    pub fn require(&self, key: ObjectKey) -> Result<&SceneObject> {
        self.objects
            .get(&key)
            .ok_or_else(|| SelectionError::MissingObject(key.to_string()).into())
    }

    /// Mutable access to an object that must exist.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::MissingObject` if it does not.
    pub fn require_mut(&mut self, key: ObjectKey) -> Result<&mut SceneObject> {
        self.objects
            .get_mut(&key)
            .ok_or_else(|| SelectionError::MissingObject(key.to_string()).into())
    }

    pub fn take(&mut self, key: ObjectKey) -> Option<SceneObject> {
        self.objects.remove(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = ObjectKey> + '_ {
        self.objects.keys().copied()
    }

    /// Runs `step` as a checkpointed transaction.
    ///
    /// The scene is snapshotted first; if `step` fails the snapshot is
    /// restored and the error is returned wrapped with the stage name.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::Stage` carrying the step's error.
    pub fn transaction<T, F>(&mut self, stage: &'static str, step: F) -> Result<T>
    where
        F: FnOnce(&mut Scene) -> Result<T>,
    {
        let checkpoint = self.clone();
        match step(self) {
            Ok(value) => {
                debug!(stage, "committed");
                Ok(value)
            }
            Err(err) => {
                warn!(stage, error = %err, "rolled back");
                *self = checkpoint;
                Err(CaseError::Stage {
                    stage,
                    source: Box::new(err),
                })
            }
        }
    }
}
