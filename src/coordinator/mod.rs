//! # View Sync Coordinator
//!
//! Keeps a primary view and an overview of the same scene linked, so the
//! overview can outline what the primary camera sees.
//!
//! A [`ViewRegistry`] is created by the host and handed to every view over the
//! scenes it manages. It never owns a view: each view publishes its camera in
//! an `Arc<RwLock<PublishedView>>` and the registry only keeps a [`Weak`] to
//! it. A view that is dropped without unregistering simply looks like "no
//! partner" from the other side.
//!
//! The registry's lock is held only to mutate or copy entries. Reading a
//! partner's camera happens after the registry lock is released.
//!
//! ```no_run
//! # use std::sync::{Arc, RwLock};
//! # use netview3d::coordinator::{PublishedView, ViewRegistry, ViewRole};
//! # fn demo(primary: Arc<RwLock<PublishedView>>, overview: Arc<RwLock<PublishedView>>) {
//! let registry = ViewRegistry::new();
//! let p = registry.register_view(7, ViewRole::Primary, &primary);
//! let o = registry.register_view(7, ViewRole::Overview, &overview);
//! assert_eq!(registry.find_link_partner(o), Some(p));
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use cgmath::Vector3;
use indexmap::IndexMap;

use crate::gfx::camera::{OrbitCamera, Projection, ScreenProjector, Viewport};
use crate::scene::SceneId;

pub type ViewId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewRole {
    Primary,
    Overview,
}

/// The camera state a view exposes to its partner, refreshed once per frame.
#[derive(Debug, Clone, Copy)]
pub struct PublishedView {
    pub camera: OrbitCamera,
    pub projection: Projection,
    pub viewport: Viewport,
    /// Frame counter of the view at publication.
    pub frame: u64,
}

pub type SharedPublishedView = Arc<RwLock<PublishedView>>;

#[derive(Debug)]
struct ViewEntry {
    id: ViewId,
    role: ViewRole,
    published: Weak<RwLock<PublishedView>>,
    partner: Option<ViewId>,
    /// World-space point the partner asked this view to center on.
    recenter: Option<Vector3<f32>>,
}

impl ViewEntry {
    fn is_live(&self) -> bool {
        self.published.strong_count() > 0
    }
}

/// Scene-scoped registry of live views and their links.
#[derive(Debug)]
pub struct ViewRegistry {
    next_id: AtomicU64,
    scenes: Mutex<IndexMap<SceneId, Vec<ViewEntry>>>,
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            scenes: Mutex::new(IndexMap::new()),
        }
    }

    /// Adds a view to its scene's set and returns its id.
    pub fn register_view(
        &self,
        scene: SceneId,
        role: ViewRole,
        published: &SharedPublishedView,
    ) -> ViewId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().entry(scene).or_default().push(ViewEntry {
            id,
            role,
            published: Arc::downgrade(published),
            partner: None,
            recenter: None,
        });
        log::debug!("Registered {:?} view {} on scene {}", role, id, scene);
        id
    }

    /// Removes a view and breaks its link. Unknown ids are ignored.
    pub fn unregister_view(&self, id: ViewId) {
        let mut scenes = self.lock();
        let Some((scene, entries)) = scenes
            .iter_mut()
            .find(|(_, entries)| entries.iter().any(|entry| entry.id == id))
        else {
            return;
        };
        let scene = *scene;
        entries.retain(|entry| entry.id != id);
        for entry in entries.iter_mut().filter(|entry| entry.partner == Some(id)) {
            log::debug!("View {} lost its partner {}", entry.id, id);
            entry.partner = None;
            entry.recenter = None;
        }
        if entries.is_empty() {
            scenes.shift_remove(&scene);
        }
        log::debug!("Unregistered view {} from scene {}", id, scene);
    }

    /// Returns the view's partner, linking it to the first eligible view if it
    /// has none yet.
    ///
    /// A candidate is eligible when it is live, unlinked and has the other role.
    /// Candidates are scanned in registration order.
    pub fn find_link_partner(&self, id: ViewId) -> Option<ViewId> {
        let mut scenes = self.lock();
        let entries = scenes
            .values_mut()
            .find(|entries| entries.iter().any(|entry| entry.id == id))?;

        let own = entries.iter().position(|entry| entry.id == id)?;
        if let Some(partner) = entries[own].partner {
            if entries.iter().any(|e| e.id == partner && e.is_live()) {
                return Some(partner);
            }
            entries[own].partner = None;
        }

        let role = entries[own].role;
        let candidate = entries.iter().position(|entry| {
            entry.id != id && entry.role != role && entry.partner.is_none() && entry.is_live()
        })?;
        let partner = entries[candidate].id;
        entries[candidate].partner = Some(id);
        entries[own].partner = Some(partner);
        log::debug!("Linked view {} with view {}", id, partner);
        Some(partner)
    }

    /// Current partner of a view, without linking.
    pub fn partner(&self, id: ViewId) -> Option<ViewId> {
        let scenes = self.lock();
        let (entry, entries) = find_entry(&scenes, id)?;
        let partner = entry.partner?;
        entries
            .iter()
            .any(|e| e.id == partner && e.is_live())
            .then_some(partner)
    }

    /// Copy of the partner's published camera, or `None` if unlinked or disposed.
    pub fn partner_view(&self, id: ViewId) -> Option<PublishedView> {
        let published = {
            let scenes = self.lock();
            let (entry, entries) = find_entry(&scenes, id)?;
            let partner = entry.partner?;
            entries
                .iter()
                .find(|e| e.id == partner)
                .map(|e| e.published.clone())?
        };
        let published = published.upgrade()?;
        let view = *published.read().unwrap_or_else(PoisonError::into_inner);
        Some(view)
    }

    /// Asks the partner of `from` to center its camera on `target`.
    pub fn request_recenter(&self, from: ViewId, target: Vector3<f32>) -> bool {
        let mut scenes = self.lock();
        for entries in scenes.values_mut() {
            let Some(partner) = entries.iter().find(|e| e.id == from).and_then(|e| e.partner)
            else {
                continue;
            };
            if let Some(entry) = entries.iter_mut().find(|e| e.id == partner) {
                entry.recenter = Some(target);
                return true;
            }
        }
        false
    }

    /// Takes a pending recenter request addressed to `id`.
    pub fn take_recenter(&self, id: ViewId) -> Option<Vector3<f32>> {
        let mut scenes = self.lock();
        scenes
            .values_mut()
            .flat_map(|entries| entries.iter_mut())
            .find(|entry| entry.id == id)
            .and_then(|entry| entry.recenter.take())
    }

    /// Registered views of a scene, in registration order.
    pub fn views(&self, scene: SceneId) -> Vec<(ViewId, ViewRole)> {
        self.lock()
            .get(&scene)
            .map(|entries| entries.iter().map(|e| (e.id, e.role)).collect())
            .unwrap_or_default()
    }

    /// Drops every entry of a scene that is being torn down.
    pub fn release_scene(&self, scene: SceneId) {
        if let Some(entries) = self.lock().shift_remove(&scene) {
            log::debug!("Released scene {} with {} views", scene, entries.len());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<SceneId, Vec<ViewEntry>>> {
        self.scenes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn find_entry(
    scenes: &IndexMap<SceneId, Vec<ViewEntry>>,
    id: ViewId,
) -> Option<(&ViewEntry, &Vec<ViewEntry>)> {
    scenes.values().find_map(|entries| {
        entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| (entry, entries))
    })
}

/// World-space quadrilateral seen through a camera at its orbit distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrustumFootprint {
    /// Top-left, top-right, bottom-right, bottom-left.
    pub corners: [Vector3<f32>; 4],
}

/// Unprojects the four viewport corners of `view` at its camera's target depth.
///
/// Returns `None` for an empty viewport or a degenerate camera.
pub fn frustum_footprint(view: &PublishedView) -> Option<FrustumFootprint> {
    let projector = ScreenProjector::new(&view.camera, &view.projection, view.viewport);
    let depth = view.camera.distance();
    let [a, b, c, d] = view.viewport.corners();
    Some(FrustumFootprint {
        corners: [
            projector.unproject(a, depth)?,
            projector.unproject(b, depth)?,
            projector.unproject(c, depth)?,
            projector.unproject(d, depth)?,
        ],
    })
}
