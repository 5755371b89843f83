use std::collections::HashMap;
use std::sync::Arc;

use cgmath::{Point2, Rad, Vector3};
use netview3d::gfx::camera::{Projection, ScreenProjector, Viewport};
use netview3d::gfx::rendering::RecordingBackend;
use netview3d::input::{InputEvent, InputSink, MouseButton};
use netview3d::scene::{ElementRef, SceneModel};
use netview3d::selection::SelectionPhase;
use netview3d::{share, FrameInfo, GraphScene, GraphView, SharedScene, ViewRegistry, ViewerSettings};

const WIDTH: f32 = 640.0;
const HEIGHT: f32 = 480.0;

fn info() -> FrameInfo {
    FrameInfo {
        viewport: Viewport::new(WIDTH, HEIGHT),
        elapsed: 0.0,
    }
}

fn projector(view: &GraphView) -> ScreenProjector {
    let viewport = Viewport::new(WIDTH, HEIGHT);
    let projection = Projection::from_settings(&view.settings().camera, viewport);
    ScreenProjector::new(view.camera(), &projection, viewport)
}

fn screen_position(view: &GraphView, world: Vector3<f32>) -> Point2<f32> {
    projector(view).project(world).unwrap().position
}

fn move_to(sink: &InputSink, p: Point2<f32>) {
    sink.push(InputEvent::PointerMoved { x: p.x, y: p.y });
}

/// 11 x 11 grid in the z = 0 plane, one unit apart.
fn grid_scene() -> (SharedScene, HashMap<(i32, i32), u32>) {
    let mut scene = GraphScene::new().with_distance_scale(1.0);
    let mut indices = HashMap::new();
    for x in -5..=5 {
        for y in -5..=5 {
            let index = scene.add_node(Vector3::new(x as f32, y as f32, 0.0));
            indices.insert((x, y), index);
        }
    }
    (share(scene), indices)
}

fn row_scene() -> SharedScene {
    let mut scene = GraphScene::new().with_distance_scale(1.0);
    for i in 0..6 {
        scene.add_labeled_node(Vector3::new(i as f32 - 2.5, 0.0, 0.0), format!("n{i}"));
    }
    share(scene)
}

/// Node 0 sits behind edge 0, which crosses right in front of it.
fn occluded_node_scene() -> SharedScene {
    let mut scene = GraphScene::new().with_distance_scale(1.0);
    scene.add_node(Vector3::new(0.0, 0.0, -1.0));
    let a = scene.add_node(Vector3::new(-3.0, 0.0, 1.0));
    let b = scene.add_node(Vector3::new(3.0, 0.0, 1.0));
    scene.add_edge(a, b);
    share(scene)
}

fn node_world(scene: &SharedScene, index: u32) -> Vector3<f32> {
    let snapshot = scene.read().unwrap().snapshot();
    let node = snapshot.node(index).unwrap();
    snapshot.world_position(node)
}

#[test]
fn drag_select_adds_nodes_inside_rectangle() {
    let (scene, indices) = grid_scene();
    let registry = Arc::new(ViewRegistry::new());
    let mut view = GraphView::primary(scene.clone(), registry, ViewerSettings::default());
    let mut backend = RecordingBackend::new();
    let sink = view.input_sink();

    view.draw(&info(), &mut backend).unwrap();
    // Close enough that the grid corner spills into the top-left of the screen.
    view.camera_mut().set_distance(10.0);
    view.draw(&info(), &mut backend).unwrap();

    move_to(&sink, Point2::new(10.0, 10.0));
    sink.push(InputEvent::ButtonPressed(MouseButton::Left));
    view.draw(&info(), &mut backend).unwrap();
    assert!(!view.selection().unwrap().drag_select_mode);

    move_to(&sink, Point2::new(10.5, 10.5));
    view.draw(&info(), &mut backend).unwrap();
    assert!(!view.selection().unwrap().drag_select_mode);

    move_to(&sink, Point2::new(100.0, 100.0));
    view.draw(&info(), &mut backend).unwrap();
    assert!(view.selection().unwrap().drag_select_mode);
    assert_eq!(view.selection_phase(), Some(SelectionPhase::DragSelecting));

    let inside: Vec<u32> = indices
        .values()
        .copied()
        .filter(|&index| {
            let p = screen_position(&view, node_world(&scene, index));
            (10.0..=100.0).contains(&p.x) && (10.0..=100.0).contains(&p.y)
        })
        .collect();
    assert!(!inside.is_empty());
    for index in &inside {
        assert!(view.selection().unwrap().is_node_highlighted(*index));
    }

    sink.push(InputEvent::ButtonReleased(MouseButton::Left));
    let report = view.draw(&info(), &mut backend).unwrap();

    let selection = view.selection().unwrap();
    assert!(!selection.drag_select_mode);
    assert!(selection.drag_rect.is_none());
    for index in &inside {
        assert!(selection.is_node_selected(*index));
    }
    assert!(!selection.is_node_selected(indices[&(5, -5)]));
    assert!(!selection.is_node_selected(indices[&(0, 0)]));
    assert_eq!(report.selected_nodes, selection.selected_nodes.len());

    let persisted = scene.read().unwrap().snapshot();
    for index in &inside {
        assert!(persisted.node(*index).unwrap().selected);
    }
}

#[test]
fn hover_follows_pointer_on_and_off_a_node() {
    let scene = row_scene();
    let registry = Arc::new(ViewRegistry::new());
    let mut view = GraphView::primary(scene.clone(), registry, ViewerSettings::default());
    let mut backend = RecordingBackend::new();
    let sink = view.input_sink();
    view.draw(&info(), &mut backend).unwrap();

    move_to(&sink, screen_position(&view, node_world(&scene, 5)));
    let report = view.draw(&info(), &mut backend).unwrap();
    assert_eq!(report.hover, Some(ElementRef::node(5)));
    assert_eq!(view.selection_phase(), Some(SelectionPhase::Hovering));
    assert!(view.selection().unwrap().is_hovered(ElementRef::node(5)));

    move_to(&sink, Point2::new(5.0, 5.0));
    let report = view.draw(&info(), &mut backend).unwrap();
    assert_eq!(report.hover, None);
    assert_eq!(view.selection_phase(), Some(SelectionPhase::Idle));
    assert!(!view.selection().unwrap().is_hovered(ElementRef::node(5)));
}

#[test]
fn hover_clears_when_pointer_leaves_view() {
    let scene = row_scene();
    let registry = Arc::new(ViewRegistry::new());
    let mut view = GraphView::primary(scene.clone(), registry, ViewerSettings::default());
    let mut backend = RecordingBackend::new();
    let sink = view.input_sink();
    view.draw(&info(), &mut backend).unwrap();

    move_to(&sink, screen_position(&view, node_world(&scene, 2)));
    view.draw(&info(), &mut backend).unwrap();
    assert!(view.selection().unwrap().hover.is_some());

    sink.push(InputEvent::PointerLeft);
    let report = view.draw(&info(), &mut backend).unwrap();
    assert_eq!(report.hover, None);
}

#[test]
fn clicking_a_node_toggles_its_selection() {
    let scene = row_scene();
    let registry = Arc::new(ViewRegistry::new());
    let mut view = GraphView::primary(scene.clone(), registry, ViewerSettings::default());
    let mut backend = RecordingBackend::new();
    let sink = view.input_sink();
    view.draw(&info(), &mut backend).unwrap();

    let target = screen_position(&view, node_world(&scene, 3));
    move_to(&sink, target);
    view.draw(&info(), &mut backend).unwrap();

    let mut click = |view: &mut GraphView| {
        sink.push(InputEvent::ButtonPressed(MouseButton::Left));
        view.draw(&info(), &mut backend).unwrap();
        sink.push(InputEvent::ButtonReleased(MouseButton::Left));
        view.draw(&info(), &mut backend).unwrap()
    };

    let report = click(&mut view);
    assert!(view.selection().unwrap().is_node_selected(3));
    assert_eq!(report.selected_nodes, 1);

    let report = click(&mut view);
    assert!(!view.selection().unwrap().is_node_selected(3));
    assert_eq!(report.selected_nodes, 0);

    click(&mut view);
    assert!(view.selection().unwrap().is_node_selected(3));
    assert!(scene.read().unwrap().snapshot().node(3).unwrap().selected);
}

#[test]
fn clicking_a_node_behind_an_edge_toggles_the_node() {
    let scene = occluded_node_scene();
    let registry = Arc::new(ViewRegistry::new());
    let mut view = GraphView::primary(scene.clone(), registry, ViewerSettings::default());
    let mut backend = RecordingBackend::new();
    let sink = view.input_sink();
    view.draw(&info(), &mut backend).unwrap();

    let target = screen_position(&view, node_world(&scene, 0));
    let crossing = screen_position(&view, Vector3::new(0.0, 0.0, 1.0));
    assert!((target.x - crossing.x).abs() < 1.0 && (target.y - crossing.y).abs() < 1.0);

    move_to(&sink, target);
    sink.push(InputEvent::ButtonPressed(MouseButton::Left));
    view.draw(&info(), &mut backend).unwrap();
    sink.push(InputEvent::ButtonReleased(MouseButton::Left));
    let report = view.draw(&info(), &mut backend).unwrap();

    let selection = view.selection().unwrap();
    assert!(selection.is_node_selected(0));
    assert!(!selection.is_edge_selected(0));
    assert_eq!(report.selected_nodes, 1);
    assert_eq!(report.selected_edges, 0);
    let persisted = scene.read().unwrap().snapshot();
    assert!(persisted.node(0).unwrap().selected);
    assert!(!persisted.edge(0).unwrap().selected);
}

#[test]
fn hover_reports_the_node_where_an_edge_overlaps_it() {
    let scene = occluded_node_scene();
    let registry = Arc::new(ViewRegistry::new());
    let mut view = GraphView::primary(scene.clone(), registry, ViewerSettings::default());
    let mut backend = RecordingBackend::new();
    let sink = view.input_sink();
    view.draw(&info(), &mut backend).unwrap();

    move_to(&sink, screen_position(&view, node_world(&scene, 0)));
    let report = view.draw(&info(), &mut backend).unwrap();
    assert_eq!(report.hover, Some(ElementRef::node(0)));
    assert!(!view.selection().unwrap().is_hovered(ElementRef::edge(0)));

    // Away from the node, the edge still answers.
    move_to(&sink, screen_position(&view, Vector3::new(1.5, 0.0, 1.0)));
    let report = view.draw(&info(), &mut backend).unwrap();
    assert_eq!(report.hover, Some(ElementRef::edge(0)));
}

#[test]
fn overview_outlines_partner_until_it_is_disposed() {
    let scene = row_scene();
    let registry = Arc::new(ViewRegistry::new());
    let settings = ViewerSettings::default();
    let mut primary = GraphView::primary(scene.clone(), registry.clone(), settings.clone());
    let mut overview = GraphView::overview(scene, registry.clone(), settings);
    let mut primary_backend = RecordingBackend::new();
    let mut overview_backend = RecordingBackend::new();

    primary.draw(&info(), &mut primary_backend).unwrap();
    let report = overview.draw(&info(), &mut overview_backend).unwrap();
    assert!(report.linked);
    assert_eq!(overview.partner(), Some(primary.id()));
    assert_eq!(primary.partner(), Some(overview.id()));

    let outlines = overview_backend.last_frame_outlines();
    assert_eq!(outlines.len(), 1);
    assert_eq!(outlines[0].len(), 4);
    let before = outlines[0].to_vec();

    primary.camera_mut().orbit(Rad(0.3), Rad(0.0));
    primary.draw(&info(), &mut primary_backend).unwrap();
    overview.draw(&info(), &mut overview_backend).unwrap();
    let outlines = overview_backend.last_frame_outlines();
    assert_eq!(outlines.len(), 1);
    assert_ne!(outlines[0], before.as_slice());

    drop(primary);
    let report = overview.draw(&info(), &mut overview_backend).unwrap();
    assert!(!report.linked);
    assert!(overview_backend.last_frame_outlines().is_empty());
}

#[test]
fn overview_press_recenters_primary() {
    let scene = row_scene();
    let registry = Arc::new(ViewRegistry::new());
    let settings = ViewerSettings::default();
    let mut primary = GraphView::primary(scene.clone(), registry.clone(), settings.clone());
    let mut overview = GraphView::overview(scene, registry, settings);
    let mut backend = RecordingBackend::new();

    primary.draw(&info(), &mut backend).unwrap();
    overview.draw(&info(), &mut backend).unwrap();
    let before = primary.camera().target();

    let sink = overview.input_sink();
    move_to(&sink, Point2::new(WIDTH * 0.75, HEIGHT * 0.5));
    sink.push(InputEvent::ButtonPressed(MouseButton::Left));
    overview.draw(&info(), &mut backend).unwrap();
    // The overview never selects.
    assert!(overview.selection().is_none());

    primary.draw(&info(), &mut backend).unwrap();
    let after = primary.camera().target();
    assert!(after.x > before.x + 0.1);
    assert!((after.z - before.z).abs() < 1e-3);
}

#[test]
fn labels_are_drawn_only_by_primary() {
    let scene = row_scene();
    let registry = Arc::new(ViewRegistry::new());
    let settings = ViewerSettings::default();
    let mut primary = GraphView::primary(scene.clone(), registry.clone(), settings.clone());
    let mut overview = GraphView::overview(scene, registry, settings);
    let mut backend = RecordingBackend::new();

    primary.draw(&info(), &mut backend).unwrap();
    let mut labels = backend.last_frame_labels();
    labels.sort_unstable();
    assert_eq!(labels, ["n0", "n1", "n2", "n3", "n4", "n5"]);

    overview.draw(&info(), &mut backend).unwrap();
    assert!(backend.last_frame_labels().is_empty());
}
