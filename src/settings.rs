//! # Viewer Settings
//!
//! Code-level configuration for a graph view. Every group has a [`Default`]
//! carrying the stock values and `with_*` builder methods for overrides:
//!
//! ```no_run
//! use netview3d::settings::{SelectionSettings, ViewerSettings};
//!
//! let settings = ViewerSettings::default()
//!     .with_selection(SelectionSettings::default().with_hover_clears_selection(true));
//! ```
//!
//! Angles are radians everywhere. Colors are linear RGBA.

use cgmath::{Deg, Rad, Vector3, Zero};

/// Linear RGBA color.
pub type Rgba = [f32; 4];

/// All settings for one view.
#[derive(Debug, Clone, Default)]
pub struct ViewerSettings {
    pub camera: CameraSettings,
    pub picking: PickingSettings,
    pub selection: SelectionSettings,
    pub render: RenderSettings,
    pub light: LightConfig,
}

impl ViewerSettings {
    pub fn with_camera(mut self, camera: CameraSettings) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_picking(mut self, picking: PickingSettings) -> Self {
        self.picking = picking;
        self
    }

    pub fn with_selection(mut self, selection: SelectionSettings) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_render(mut self, render: RenderSettings) -> Self {
        self.render = render;
        self
    }

    pub fn with_light(mut self, light: LightConfig) -> Self {
        self.light = light;
        self
    }
}

/// Pose the camera returns to on reset, and starts from before the first fit.
#[derive(Debug, Clone, Copy)]
pub struct CameraPose {
    pub target: Vector3<f32>,
    pub distance: f32,
    /// Rotation about the pole axis, measured from +Z.
    pub azimuth: Rad<f32>,
    /// Angle above the plane perpendicular to the pole axis.
    pub elevation: Rad<f32>,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            target: Vector3::zero(),
            distance: 4.0,
            azimuth: Rad(0.0),
            elevation: Rad(0.0),
        }
    }
}

/// Camera motion, bounds and projection.
#[derive(Debug, Clone, Copy)]
pub struct CameraSettings {
    /// World units moved per frame while a translation key is held.
    pub move_speed: f32,
    /// Orbit step per frame while Shift+arrow is held.
    pub key_orbit_step: Rad<f32>,
    /// First-person turn step per frame while an arrow key is held.
    pub key_turn_step: Rad<f32>,
    /// Roll step per frame while Z or X is held.
    pub roll_step: Rad<f32>,
    /// Radians of orbit per pixel of secondary-button drag.
    pub orbit_sensitivity: f32,
    /// Radians of turn per pixel of pointer motion with Alt held.
    pub turn_sensitivity: f32,
    /// Pan distance per pixel, relative to the orbit distance.
    pub pan_speed: f32,
    /// Each wheel notch scales the orbit distance by this factor.
    pub zoom_base: f32,
    /// Elevation limit on either side of the pole plane.
    pub max_elevation: Rad<f32>,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Orbit axis; world up.
    pub pole: Vector3<f32>,
    pub default_pose: CameraPose,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
    /// Extra room left around the graph's bounding sphere by fit-in-view.
    pub fit_margin: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            move_speed: 0.04,
            key_orbit_step: Deg(1.5).into(),
            key_turn_step: Deg(1.0).into(),
            roll_step: Deg(1.0).into(),
            orbit_sensitivity: 0.005,
            turn_sensitivity: 0.003,
            pan_speed: 0.002,
            zoom_base: 1.1,
            max_elevation: Deg(89.0).into(),
            min_distance: 0.25,
            max_distance: 40.0,
            pole: Vector3::unit_y(),
            default_pose: CameraPose::default(),
            fovy: Deg(45.0).into(),
            znear: 0.2,
            zfar: 50.0,
            fit_margin: 1.2,
        }
    }
}

impl CameraSettings {
    pub fn with_distance_bounds(mut self, min_distance: f32, max_distance: f32) -> Self {
        self.min_distance = min_distance;
        self.max_distance = max_distance;
        self
    }

    pub fn with_zoom_base(mut self, zoom_base: f32) -> Self {
        self.zoom_base = zoom_base;
        self
    }

    pub fn with_max_elevation(mut self, max_elevation: Rad<f32>) -> Self {
        self.max_elevation = max_elevation;
        self
    }

    pub fn with_default_pose(mut self, pose: CameraPose) -> Self {
        self.default_pose = pose;
        self
    }

    pub fn with_move_speed(mut self, move_speed: f32) -> Self {
        self.move_speed = move_speed;
        self
    }

    /// Sets the perspective parameters (builder pattern)
    ///
    /// # Arguments
    /// * `fovy` - Vertical field of view
    /// * `znear` - Near clip distance, must be positive
    /// * `zfar` - Far clip distance, must exceed `znear`
    pub fn with_projection(mut self, fovy: Rad<f32>, znear: f32, zfar: f32) -> Self {
        self.fovy = fovy;
        self.znear = znear;
        self.zfar = zfar;
        self
    }
}

/// Screen-space picking tolerances.
#[derive(Debug, Clone, Copy)]
pub struct PickingSettings {
    /// Node sphere radius in world units.
    pub node_radius: f32,
    /// Pointer distance in pixels within which an edge counts as hit.
    pub edge_tolerance_px: f32,
    /// Far-away nodes stay at least this large, in pixels, for picking.
    pub min_node_radius_px: f32,
}

impl Default for PickingSettings {
    fn default() -> Self {
        Self {
            node_radius: 0.102,
            edge_tolerance_px: 4.0,
            min_node_radius_px: 3.0,
        }
    }
}

impl PickingSettings {
    pub fn with_node_radius(mut self, node_radius: f32) -> Self {
        self.node_radius = node_radius;
        self
    }

    pub fn with_edge_tolerance(mut self, pixels: f32) -> Self {
        self.edge_tolerance_px = pixels;
        self
    }
}

/// Selection behaviour switches.
#[derive(Debug, Clone, Copy)]
pub struct SelectionSettings {
    /// Hovering a selected node deselects it.
    pub hover_clears_selection: bool,
    /// A click on empty space clears the whole selection.
    pub clear_on_empty_click: bool,
    /// Minimum pointer travel on both axes before a press becomes a drag.
    pub drag_threshold_px: f32,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            hover_clears_selection: false,
            clear_on_empty_click: false,
            drag_threshold_px: 1.0,
        }
    }
}

impl SelectionSettings {
    pub fn with_hover_clears_selection(mut self, enabled: bool) -> Self {
        self.hover_clears_selection = enabled;
        self
    }

    pub fn with_clear_on_empty_click(mut self, enabled: bool) -> Self {
        self.clear_on_empty_click = enabled;
        self
    }
}

/// Colors and tessellation used by the render procedures.
#[derive(Debug, Clone, Copy)]
pub struct RenderSettings {
    pub clear_color: Rgba,
    pub default_node_color: Rgba,
    pub default_edge_color: Rgba,
    pub selected_color: Rgba,
    pub hover_color: Rgba,
    pub selection_box_color: Rgba,
    pub frustum_color: Rgba,
    pub label_color: Rgba,
    /// Scale applied to selected node spheres.
    pub selected_scale: f32,
    pub sphere_longitude_segments: u32,
    pub sphere_latitude_segments: u32,
    /// Polyline segments per curved edge.
    pub arc_segments: u32,
    /// Sideways bulge of parallel edges, as a fraction of the edge length.
    pub arc_spread: f32,
    /// Label anchor height above the node center, in node radii.
    pub label_offset: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            default_node_color: [0.67, 0.67, 0.67, 1.0],
            default_edge_color: [0.67, 0.67, 0.67, 1.0],
            selected_color: [0.73, 0.73, 0.6, 1.0],
            hover_color: [0.5, 0.5, 0.7, 1.0],
            selection_box_color: [0.0, 0.4, 0.6, 1.0],
            frustum_color: [0.7, 0.7, 0.6, 1.0],
            label_color: [1.0, 1.0, 1.0, 1.0],
            selected_scale: 1.1,
            sphere_longitude_segments: 12,
            sphere_latitude_segments: 8,
            arc_segments: 12,
            arc_spread: 0.2,
            label_offset: 1.5,
        }
    }
}

impl RenderSettings {
    pub fn with_clear_color(mut self, color: Rgba) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_sphere_detail(mut self, longitude: u32, latitude: u32) -> Self {
        self.sphere_longitude_segments = longitude;
        self.sphere_latitude_segments = latitude;
        self
    }
}

/// Single positional light for the main view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightConfig {
    /// Homogeneous position; w = 0 makes it directional.
    pub position: [f32; 4],
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            position: [-4.0, 4.0, 6.0, 1.0],
            ambient: 0.4,
            diffuse: 0.57,
            specular: 0.79,
        }
    }
}
