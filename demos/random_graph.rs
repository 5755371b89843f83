//! # Random Graph
//!
//! Opens a primary view and an overview over a random graph.
//!
//! ## Usage:
//! ```bash
//! RUST_LOG=netview3d=debug cargo run --example random_graph -- 120
//! ```
//!
//! ## Controls (primary window):
//! - Left click toggles a node or edge, left drag selects a rectangle
//! - Right drag orbits, middle drag pans, wheel zooms
//! - Alt + mouse looks around, arrows turn, Shift + arrows orbit
//! - W/S/A/D/Q/E move, Z/X roll, F fits the graph, Shift+C resets the camera
//!
//! In the overview, left click or drag re-centers the primary camera.

use cgmath::Vector3;
use netview3d::scene::DEFAULT_DISTANCE_SCALE;
use netview3d::{share, GraphScene, ViewerSettings};
use rand::Rng;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let node_count: u32 = std::env::args()
        .nth(1)
        .map(|arg| arg.parse())
        .transpose()?
        .unwrap_or(60);

    let mut rng = rand::rng();
    let mut scene = GraphScene::new();
    let extent = 2.0 * DEFAULT_DISTANCE_SCALE;

    let mut nodes = Vec::with_capacity(node_count as usize);
    for i in 0..node_count {
        let position = Vector3::new(
            rng.random_range(-extent..extent),
            rng.random_range(-extent..extent),
            rng.random_range(-extent..extent),
        );
        let node = if i % 10 == 0 {
            scene.add_labeled_node(position, format!("n{i}"))
        } else {
            scene.add_node(position)
        };
        scene.set_node_color(
            node,
            [
                rng.random_range(0.3..1.0),
                rng.random_range(0.3..1.0),
                rng.random_range(0.3..1.0),
                1.0,
            ],
        );
        nodes.push(node);
    }

    // Roughly two edges per node, with the occasional parallel edge and loop.
    for _ in 0..node_count * 2 {
        let source = nodes[rng.random_range(0..nodes.len())];
        let target = if rng.random_bool(0.05) {
            source
        } else {
            nodes[rng.random_range(0..nodes.len())]
        };
        scene.add_edge(source, target);
        if rng.random_bool(0.1) {
            scene.add_edge(source, target);
        }
    }

    log::info!(
        "Random graph with {} nodes and {} edges",
        scene.node_count(),
        scene.edge_count()
    );
    netview3d::run(share(scene), ViewerSettings::default())
}
