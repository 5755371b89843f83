//! # Selection Controller
//!
//! Turns one frame of input plus the frame's picking results into hover,
//! click-toggle and rubber-band selection.
//!
//! Each frame runs in two halves around the picking pass:
//!
//! 1. [`SelectionController::plan`] reads the input snapshot and decides what
//!    to pick: the hover point, a click point, and the drag rectangle
//! 2. the view runs those queries against the camera it is about to render with
//! 3. [`SelectionController::resolve`] applies the answers and writes the
//!    "selected" flag back to the scene model
//!
//! The scene owns selectedness. [`SelectionController::sync_from_scene`]
//! reloads the persistent sets from a snapshot so edits made elsewhere show
//! up on the next frame.
//!
//! ## States
//!
//! | Phase           | Entered when                                            |
//! |-----------------|---------------------------------------------------------|
//! | `Idle`          | nothing under the pointer, or a button is held          |
//! | `Hovering`      | the hover query hit something and no button is held     |
//! | `DragSelecting` | the primary button moved at least the threshold on both axes |

use cgmath::Point2;
use indexmap::IndexSet;

use crate::gfx::picking::{PickHit, RectPick, ScreenRect};
use crate::input::{InputSnapshot, MouseButton};
use crate::scene::{ElementKind, ElementRef, SceneModel, SceneSnapshot};
use crate::settings::SelectionSettings;

const PRIMARY: MouseButton = MouseButton::Left;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    Idle,
    Hovering,
    DragSelecting,
}

/// Hover, persistent selection and the in-flight drag of one view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    pub hover: Option<ElementRef>,
    pub selected_nodes: IndexSet<u32>,
    pub selected_edges: IndexSet<u32>,
    /// Normalized rubber-band rectangle; only set while dragging.
    pub drag_rect: Option<ScreenRect>,
    pub drag_select_mode: bool,
    /// Preview of what the current drag would add.
    pub pending_nodes: IndexSet<u32>,
    pub pending_edges: IndexSet<u32>,
}

impl SelectionState {
    pub fn is_node_selected(&self, index: u32) -> bool {
        self.selected_nodes.contains(&index)
    }

    pub fn is_edge_selected(&self, index: u32) -> bool {
        self.selected_edges.contains(&index)
    }

    /// Selected, or inside the drag rectangle being swept.
    pub fn is_node_highlighted(&self, index: u32) -> bool {
        self.is_node_selected(index) || self.pending_nodes.contains(&index)
    }

    pub fn is_edge_highlighted(&self, index: u32) -> bool {
        self.is_edge_selected(index) || self.pending_edges.contains(&index)
    }

    pub fn is_hovered(&self, element: ElementRef) -> bool {
        self.hover == Some(element)
    }

    fn clear_drag(&mut self) {
        self.drag_rect = None;
        self.drag_select_mode = false;
        self.pending_nodes.clear();
        self.pending_edges.clear();
    }
}

/// Picking work requested for this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PickRequest {
    pub hover: Option<Point2<f32>>,
    pub click: Option<Point2<f32>>,
    pub rect: Option<ScreenRect>,
    /// The drag ends this frame; `rect` is final.
    pub commit_drag: bool,
}

/// Answers to a [`PickRequest`].
#[derive(Debug, Clone, Default)]
pub struct FramePicks {
    pub hover: Option<PickHit>,
    pub click: Option<PickHit>,
    pub rect: Option<RectPick>,
}

#[derive(Debug)]
pub struct SelectionController {
    settings: SelectionSettings,
    state: SelectionState,
    phase: SelectionPhase,
    /// Where the primary button went down, while it is down.
    press_origin: Option<Point2<f32>>,
    buttons_down: bool,
}

impl SelectionController {
    pub fn new(settings: SelectionSettings) -> Self {
        Self {
            settings,
            state: SelectionState::default(),
            phase: SelectionPhase::Idle,
            press_origin: None,
            buttons_down: false,
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn phase(&self) -> SelectionPhase {
        self.phase
    }

    pub fn settings(&self) -> &SelectionSettings {
        &self.settings
    }

    /// Reloads persistent selection from the scene's "selected" flags and drops
    /// a hover target that no longer exists.
    pub fn sync_from_scene(&mut self, snapshot: &SceneSnapshot) {
        self.state.selected_nodes = snapshot
            .nodes()
            .iter()
            .filter(|node| node.selected)
            .map(|node| node.index)
            .collect();
        self.state.selected_edges = snapshot
            .edges()
            .iter()
            .filter(|edge| edge.selected)
            .map(|edge| edge.index)
            .collect();

        if let Some(hover) = self.state.hover {
            let exists = match hover.kind {
                ElementKind::Node => snapshot.node(hover.index).is_some(),
                ElementKind::Edge => snapshot.edge(hover.index).is_some(),
            };
            if !exists {
                self.state.hover = None;
            }
        }
    }

    /// Advances the press/drag gesture and lists the queries this frame needs.
    pub fn plan(&mut self, input: &InputSnapshot) -> PickRequest {
        let mut request = PickRequest {
            hover: input.hover_position(),
            ..Default::default()
        };
        self.buttons_down = input
            .buttons_held
            .iter()
            .chain(&input.buttons_pressed)
            .any(|button| !input.buttons_released.contains(button));

        if input.was_button_pressed(PRIMARY) {
            self.state.clear_drag();
            self.press_origin = input
                .press_positions
                .get(&PRIMARY)
                .copied()
                .or(input.pointer);
        }

        let Some(origin) = self.press_origin else {
            return request;
        };

        let released = input.was_button_released(PRIMARY);
        let current = if released {
            input.release_positions.get(&PRIMARY).copied().or(input.pointer)
        } else {
            input.pointer
        };
        let current = current.unwrap_or(origin);

        if !self.state.drag_select_mode && self.crossed_threshold(origin, current) {
            log::debug!("Drag select started at ({}, {})", origin.x, origin.y);
            self.state.drag_select_mode = true;
        }

        if self.state.drag_select_mode {
            let rect = ScreenRect::from_corners(origin, current);
            self.state.drag_rect = Some(rect);
            request.rect = Some(rect);
            request.commit_drag = released;
        } else if released {
            request.click = Some(current);
        }

        if released {
            self.press_origin = None;
        }
        request
    }

    /// Applies this frame's picking results.
    pub fn resolve(
        &mut self,
        request: &PickRequest,
        picks: &FramePicks,
        scene: &mut dyn SceneModel,
    ) {
        self.update_hover(picks.hover.map(|hit| hit.element), scene);

        if let Some(rect) = &picks.rect {
            self.state.pending_nodes = rect.nodes.clone();
            self.state.pending_edges = rect.edges.clone();
        }
        if request.commit_drag {
            self.commit_drag(scene);
        }

        if request.click.is_some() {
            match picks.click {
                Some(hit) => self.toggle(hit.element, scene),
                None if self.settings.clear_on_empty_click => self.clear_selection(scene),
                None => {}
            }
        }

        self.phase = if self.state.drag_select_mode {
            SelectionPhase::DragSelecting
        } else if self.state.hover.is_some() && !self.buttons_down {
            SelectionPhase::Hovering
        } else {
            SelectionPhase::Idle
        };
    }

    /// Deselects everything, in the scene too.
    pub fn clear_selection(&mut self, scene: &mut dyn SceneModel) {
        for index in self.state.selected_nodes.drain(..) {
            scene.set_selected(ElementRef::node(index), false);
        }
        for index in self.state.selected_edges.drain(..) {
            scene.set_selected(ElementRef::edge(index), false);
        }
    }

    fn crossed_threshold(&self, origin: Point2<f32>, current: Point2<f32>) -> bool {
        let threshold = self.settings.drag_threshold_px;
        (current.x - origin.x).abs() >= threshold && (current.y - origin.y).abs() >= threshold
    }

    fn update_hover(&mut self, hover: Option<ElementRef>, scene: &mut dyn SceneModel) {
        if hover == self.state.hover {
            return;
        }
        self.state.hover = hover;
        if !self.settings.hover_clears_selection {
            return;
        }
        if let Some(element) = hover.filter(|e| e.is_node()) {
            if self.state.selected_nodes.shift_remove(&element.index) {
                scene.set_selected(element, false);
            }
        }
    }

    fn commit_drag(&mut self, scene: &mut dyn SceneModel) {
        let nodes = std::mem::take(&mut self.state.pending_nodes);
        let edges = std::mem::take(&mut self.state.pending_edges);
        log::debug!(
            "Drag select committed {} nodes, {} edges",
            nodes.len(),
            edges.len()
        );
        for index in nodes {
            if scene.set_selected(ElementRef::node(index), true) {
                self.state.selected_nodes.insert(index);
            }
        }
        for index in edges {
            if scene.set_selected(ElementRef::edge(index), true) {
                self.state.selected_edges.insert(index);
            }
        }
        self.state.clear_drag();
    }

    fn toggle(&mut self, element: ElementRef, scene: &mut dyn SceneModel) {
        let set = match element.kind {
            ElementKind::Node => &mut self.state.selected_nodes,
            ElementKind::Edge => &mut self.state.selected_edges,
        };
        let select = !set.contains(&element.index);
        if !scene.set_selected(element, select) {
            log::debug!("Click on {} ignored, element no longer exists", element);
            return;
        }
        if select {
            set.insert(element.index);
        } else {
            set.shift_remove(&element.index);
        }
    }
}
