use std::collections::BTreeSet;

use approx::assert_relative_eq;
use planview::{
    drive_edges, extract_edges, index_scene, project_edges, project_outline, run_to_completion,
    CancelToken, Completion, EdgeKind, EdgeVisibility, Interval, JobKind, LineSet,
    OcclusionResolver, OcclusionStrategy, ProjectionSettings, ProjectionWorker, Scene, Transform,
    TriangleMesh, TriangleOrder, Vec3, ViewFrame, WorkerMessage, WorkerRequest,
};

#[rustfmt::skip]
const CUBE_VERTICES: [f32; 24] = [
    0.0, 0.0, 0.0,  1.0, 0.0, 0.0,  1.0, 1.0, 0.0,  0.0, 1.0, 0.0,
    0.0, 0.0, 1.0,  1.0, 0.0, 1.0,  1.0, 1.0, 1.0,  0.0, 1.0, 1.0,
];

#[rustfmt::skip]
const CUBE_INDICES: [u32; 36] = [
    0, 2, 1,  0, 3, 2,
    4, 5, 6,  4, 6, 7,
    0, 1, 5,  0, 5, 4,
    2, 3, 7,  2, 7, 6,
    0, 4, 7,  0, 7, 3,
    1, 2, 6,  1, 6, 5,
];

fn cube() -> TriangleMesh {
    TriangleMesh::new(CUBE_VERTICES.to_vec(), Some(CUBE_INDICES.to_vec())).unwrap()
}

fn rectangle() -> TriangleMesh {
    TriangleMesh::new(
        vec![0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 2.0, 1.0, 0.0, 0.0, 1.0, 0.0],
        Some(vec![0, 1, 2, 0, 2, 3]),
    )
    .unwrap()
}

/// Two faces folded along the segment from the origin to `(2, 0, 0.5)`.
fn ridge() -> TriangleMesh {
    TriangleMesh::new(
        vec![
            0.0, 0.0, 0.0, 2.0, 0.0, 0.5, 1.0, 1.0, -0.8, 1.5, -1.0, -0.6,
        ],
        Some(vec![0, 1, 2, 1, 0, 3]),
    )
    .unwrap()
}

fn top_down() -> ProjectionSettings {
    ProjectionSettings::default()
}

type EdgeSignature = ([[i64; 3]; 2], EdgeKind);

fn signatures(vis: &EdgeVisibility) -> BTreeSet<EdgeSignature> {
    let q = |v: f64| (v * 1e4).round() as i64;
    vis.edges()
        .iter()
        .map(|e| {
            let mut ends = [e.line.start, e.line.end].map(|p| [q(p.x), q(p.y), q(p.z)]);
            ends.sort();
            (ends, e.kind)
        })
        .collect()
}

fn hidden_length(vis: &EdgeVisibility) -> f64 {
    vis.edges()
        .iter()
        .enumerate()
        .map(|(i, e)| vis.hidden_intervals(i).covered_length() * e.line.length())
        .sum()
}

#[test]
fn test_flat_rectangle_round_trip() {
    let mesh = rectangle();
    let edges = extract_edges(&mesh, None, 0.0, 4);
    assert_eq!(edges.len(), 4);
    assert!(edges.iter().all(|e| e.kind == EdgeKind::Boundary));

    let scene = Scene::single(mesh);
    let resolver = OcclusionResolver::new(
        index_scene(&scene, 4),
        &ViewFrame::top_down(),
        edges,
        OcclusionStrategy::Batched,
        4,
    );
    let vis = run_to_completion(resolver);
    assert_eq!(vis.visible_segments().len(), 4);
    assert!(vis.hidden_segments().is_empty());
    for i in 0..vis.len() {
        assert_eq!(vis.hidden_intervals(i).complement(), vec![Interval::FULL]);
    }
}

#[test]
fn test_cube_seen_from_above() {
    let scene = Scene::single(cube());
    let vis = project_edges(&scene, &top_down()).unwrap();

    let visible = vis.visible_segments();
    let hidden = vis.hidden_segments();
    assert_eq!(visible.len(), 4);
    assert_eq!(hidden.len(), 4);
    for s in &visible {
        assert_relative_eq!(s.line.start.z, 1.0, epsilon = 1e-9);
        assert_relative_eq!(s.line.length(), 1.0, epsilon = 1e-9);
    }
    for s in &hidden {
        assert_relative_eq!(s.line.start.z, 0.0, epsilon = 1e-9);
        assert_relative_eq!(s.line.length(), 1.0, epsilon = 1e-9);
    }
}

#[test]
fn test_coplanar_pair_keeps_only_outer_boundary() {
    let edges = extract_edges(&rectangle(), None, 50.0, 4);
    assert_eq!(edges.len(), 4);
    for e in &edges {
        // The shared diagonal is the only edge with both x and y changing.
        let d = e.line.end - e.line.start;
        assert!(d.x.abs() < 1e-9 || d.y.abs() < 1e-9);
    }
}

#[test]
fn test_cancel_before_first_resume() {
    let scene = Scene::single(cube());
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut reports = 0;
    let future = drive_edges(&scene, &top_down(), cancel, |_, _| reports += 1).unwrap();
    let outcome = pollster::block_on(future);
    assert!(matches!(outcome, Completion::Aborted));
    assert_eq!(reports, 0);
}

#[test]
fn test_cancel_mid_run() {
    let scene = Scene::single(cube());
    let settings = ProjectionSettings {
        time_budget_ms: Some(0.0),
        ..top_down()
    };
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let mut reports = Vec::new();
    let future = drive_edges(&scene, &settings, cancel, |p, _| {
        reports.push(p);
        if reports.len() == 3 {
            trigger.cancel();
        }
    })
    .unwrap();
    assert!(pollster::block_on(future).is_aborted());
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|&p| p < 1.0));
}

#[test]
fn test_strategies_agree_on_stacked_cubes() {
    let mut scene = Scene::single(cube());
    scene.push(cube(), Transform::translation(0.4, 0.3, 1.5));
    scene.push(cube(), Transform::translation(-0.6, 0.5, -1.2));
    let oblique = |strategy| ProjectionSettings {
        direction: [0.3, -0.4, -1.0],
        occlusion_strategy: strategy,
        ..top_down()
    };
    let batched = project_edges(&scene, &oblique(OcclusionStrategy::Batched)).unwrap();
    let per_edge = project_edges(&scene, &oblique(OcclusionStrategy::PerEdge)).unwrap();
    assert_eq!(batched.len(), per_edge.len());
    assert!(!batched.hidden_segments().is_empty());
    for i in 0..batched.len() {
        let a = batched.hidden_intervals(i).intervals();
        let b = per_edge.hidden_intervals(i).intervals();
        assert_eq!(a.len(), b.len(), "edge {i}");
        for (x, y) in a.iter().zip(b) {
            assert_relative_eq!(x.start, y.start, epsilon = 1e-9);
            assert_relative_eq!(x.end, y.end, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_mirrored_instance_matches_mirrored_mesh() {
    let settings = ProjectionSettings {
        direction: [0.2, 1.0, -0.3],
        angle_threshold: 80.0,
        ..top_down()
    };

    let mut placed = Scene::new();
    placed.push(ridge(), Transform::scale(-1.0, 1.0, 1.0));

    let source = ridge();
    let vertices: Vec<f32> = source
        .vertices
        .chunks(3)
        .flat_map(|p| [-p[0], p[1], p[2]])
        .collect();
    let indices: Vec<u32> = source
        .indices
        .unwrap()
        .chunks(3)
        .flat_map(|t| [t[0], t[2], t[1]])
        .collect();
    let baked = Scene::single(TriangleMesh::new(vertices, Some(indices)).unwrap());

    let a = project_edges(&placed, &settings).unwrap();
    let b = project_edges(&baked, &settings).unwrap();
    assert!(a.edges().iter().any(|e| e.kind == EdgeKind::Silhouette));
    assert_eq!(signatures(&a), signatures(&b));
    assert_relative_eq!(hidden_length(&a), hidden_length(&b), epsilon = 1e-9);

    let outline_a = project_outline(&placed, &settings).unwrap();
    let outline_b = project_outline(&baked, &settings).unwrap();
    assert_relative_eq!(
        outline_a.state.area(),
        outline_b.state.area(),
        epsilon = 1e-4
    );
}

#[test]
fn test_visible_and_hidden_partition_every_edge() {
    let mut scene = Scene::single(cube());
    scene.push(cube(), Transform::translation(0.5, 0.5, 2.0));
    let settings = ProjectionSettings {
        direction: [0.1, 0.2, -1.0],
        ..top_down()
    };
    let vis = project_edges(&scene, &settings).unwrap();
    for i in 0..vis.len() {
        let set = vis.hidden_intervals(i);
        let visible: f64 = set.complement().iter().map(Interval::length).sum();
        assert_relative_eq!(visible + set.covered_length(), 1.0, epsilon = 1e-12);
    }
    let total = |set: LineSet| -> f64 {
        let geometry = vis.to_line_geometry(set);
        (0..geometry.len()).map(|k| geometry.segment(k).length()).sum()
    };
    let full: f64 = vis.edges().iter().map(|e| e.line.length()).sum();
    assert_relative_eq!(
        total(LineSet::Visible) + total(LineSet::Hidden),
        full,
        epsilon = 1e-4
    );
}

#[test]
fn test_outline_order_does_not_matter() {
    let mut scene = Scene::single(cube());
    scene.push(cube(), Transform::translation(0.5, 0.5, 0.5));
    let input = project_outline(&scene, &top_down()).unwrap();
    let largest = project_outline(
        &scene,
        &ProjectionSettings {
            triangle_order: TriangleOrder::LargestFirst,
            ..top_down()
        },
    )
    .unwrap();
    // Two unit squares overlapping in a quarter: 1.75 plus inflation.
    assert_relative_eq!(input.state.area(), 1.75, epsilon = 1e-2);
    assert_relative_eq!(input.state.area(), largest.state.area(), epsilon = 1e-3);
    assert_eq!(input.state.rings().len(), largest.state.rings().len());
}

#[test]
fn test_worker_sends_one_final_message() {
    let worker = ProjectionWorker::spawn().unwrap();
    let request = WorkerRequest {
        id: 42,
        positions: CUBE_VERTICES.to_vec(),
        indices: Some(CUBE_INDICES.to_vec()),
        settings: top_down(),
        job: JobKind::Both,
    };
    let messages: Vec<WorkerMessage> = worker.submit(request).unwrap().iter().collect();
    assert_eq!(messages.iter().filter(|m| m.is_final()).count(), 1);
    assert!(messages.iter().all(|m| m.id() == 42));
    assert!(matches!(messages.last(), Some(WorkerMessage::Finished { .. })));

    let json = serde_json::to_string(&messages).unwrap();
    let back: Vec<WorkerMessage> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, messages);
}

#[test]
fn test_non_finite_vertex_does_not_spoil_the_scene() {
    let mesh = TriangleMesh::from_soup(vec![
        0.0, 0.0, 0.0, f32::INFINITY, 0.0, 0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0,
    ])
    .unwrap();
    let scene = Scene::single(mesh);
    let oblique = ProjectionSettings {
        direction: [0.2, 0.1, -1.0],
        ..top_down()
    };
    for settings in [top_down(), oblique] {
        let vis = project_edges(&scene, &settings).unwrap();
        assert_eq!(vis.len(), 3);
        assert!(vis.edges().iter().all(|e| e.kind == EdgeKind::Boundary));
        assert_eq!(vis.visible_segments().len(), 3);
        assert!(vis.hidden_segments().is_empty());

        let outline = project_outline(&scene, &settings).unwrap();
        assert_eq!(outline.state.rings().len(), 1);
    }
    let outline = project_outline(&scene, &top_down()).unwrap();
    assert_relative_eq!(outline.state.area(), 0.5, epsilon = 1e-3);
}

#[test]
fn test_settings_from_toml_drive_projection() {
    let settings = ProjectionSettings::from_toml_str(
        r#"
        direction = [0.0, 0.0, -1.0]
        angle_threshold = 30.0
        occlusion_strategy = "per_edge"
        "#,
    )
    .unwrap();
    assert_eq!(settings.occlusion_strategy, OcclusionStrategy::PerEdge);
    let scene = Scene::single(cube());
    let vis = project_edges(&scene, &settings).unwrap();
    assert_eq!(vis.fully_hidden_count(), 4);
    assert_eq!(settings.direction_vec(), -Vec3::z());
}
