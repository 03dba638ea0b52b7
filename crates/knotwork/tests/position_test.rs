mod common;

use common::{Builder, config, overlaps_padded};
use knotwork::graph::{NodeId, NodeKind, PinCategory, Vec2};
use knotwork::{FormatError, FormatParams, Formatter, InvalidRootReason, ParameterStyle, format};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

fn chain(b: &mut Builder) -> (NodeId, NodeId, NodeId) {
    let r = b.event(0.0, 0.0, 160.0, 64.0);
    let a = b.exec(500.0, 300.0, 160.0, 64.0);
    let c = b.exec(-200.0, 50.0, 160.0, 64.0);
    b.then(r, a);
    b.then(a, c);
    (r, a, c)
}

/// Event with three exec outputs at 24, 48 and 72.
fn fan_out(b: &mut Builder) -> (NodeId, [NodeId; 3]) {
    let r = b.node(NodeKind::Event, 0.0, 0.0, 160.0, 96.0);
    let mut children = [NodeId(0); 3];
    for (i, child) in children.iter_mut().enumerate() {
        let name = format!("out{i}");
        b.output(r, &name, PinCategory::Exec, 24.0 + 24.0 * i as f64);
        *child = b.exec(0.0, 0.0, 160.0, 64.0);
        b.link(r, &name, *child, "exec");
    }
    (r, children)
}

#[test]
fn chain_is_laid_out_left_to_right_on_one_row() {
    common::init_tracing();
    let mut b = Builder::new();
    let (r, a, c) = chain(&mut b);

    let report = format(&mut b.graph, r, &config()).unwrap();
    assert!(!report.fast_path);
    assert!(!report.cancelled);
    assert_eq!(report.formatted, vec![r, a, c]);
    assert_eq!(report.same_row.len(), 2);

    assert_eq!(b.position(r), Vec2::new(0.0, 0.0));
    assert_eq!(b.position(a), Vec2::new(264.0, 0.0));
    assert_eq!(b.position(c), Vec2::new(528.0, 0.0));
}

#[test]
fn root_is_aligned_to_the_grid() {
    let mut b = Builder::new();
    let (r, a, _) = chain(&mut b);
    b.graph.set_position(r, Vec2::new(3.0, 5.0));

    format(&mut b.graph, r, &config()).unwrap();
    assert_eq!(b.position(r), Vec2::new(0.0, 8.0));
    assert_eq!(b.position(a).y, 8.0);
}

#[test]
fn second_branch_is_pushed_below_the_first() {
    let mut b = Builder::new();
    let r = b.node(NodeKind::Event, 0.0, 0.0, 160.0, 96.0);
    b.output(r, "a", PinCategory::Exec, 24.0);
    b.output(r, "b", PinCategory::Exec, 48.0);
    let c1 = b.exec(0.0, 0.0, 160.0, 64.0);
    let c2 = b.exec(0.0, 0.0, 160.0, 64.0);
    let d1 = b.exec(0.0, 0.0, 160.0, 64.0);
    b.link(r, "a", c1, "exec");
    b.link(r, "b", c2, "exec");
    b.then(c1, d1);

    format(&mut b.graph, r, &config()).unwrap();

    // The steep wire to c2 widens the column by one grid step.
    assert_eq!(b.position(c1), Vec2::new(272.0, 0.0));
    assert_eq!(b.position(d1), Vec2::new(536.0, 0.0));
    assert_eq!(b.position(c2), Vec2::new(272.0, 168.0));

    let nodes = [r, c1, c2, d1];
    for (i, x) in nodes.iter().enumerate() {
        for y in &nodes[i + 1..] {
            assert!(
                !b.bounds(*x).intersects(&b.bounds(*y)),
                "{x} overlaps {y}"
            );
        }
    }
    let gap = b.bounds(c2).top - b.bounds(c1).bottom;
    assert!(gap >= 100.0, "row gap {gap}");
}

#[test]
fn centered_branches_balance_around_the_parent_pins() {
    let mut b = Builder::new();
    let (r, [c1, c2, c3]) = fan_out(&mut b);
    let mut config = config();
    config.center_branches = true;

    let report = format(&mut b.graph, r, &config).unwrap();

    assert_eq!(b.position(c1), Vec2::new(272.0, -144.0));
    assert_eq!(b.position(c2), Vec2::new(272.0, 24.0));
    assert_eq!(b.position(c3), Vec2::new(272.0, 192.0));
    assert_eq!(b.position(r), Vec2::new(0.0, 0.0));

    let child_mean: f64 = [c1, c2, c3]
        .iter()
        .map(|c| b.pin_y(b.pin(*c, "exec")))
        .sum::<f64>()
        / 3.0;
    let parent_mean: f64 = ["out0", "out1", "out2"]
        .iter()
        .map(|p| b.pin_y(b.pin(r, p)))
        .sum::<f64>()
        / 3.0;
    assert_eq!(child_mean, parent_mean);
    assert_eq!(b.bounds(c2).top - b.bounds(c1).bottom, 104.0);
    assert!(!overlaps_padded(b.bounds(c1), b.bounds(c2), Vec2::new(0.0, 100.0)));
    // Centered wires are no longer straight.
    assert!(report.same_row.is_empty());
}

#[test]
fn merge_into_a_centered_fan_out_keeps_same_row_wires_straight() {
    let mut b = Builder::new();
    let root = b.node(NodeKind::Event, 0.0, 0.0, 160.0, 128.0);
    b.input(root, "value", PinCategory::Parameter, 104.0);
    let mut children = [NodeId(0); 4];
    for (i, child) in children.iter_mut().enumerate() {
        let name = format!("out{i}");
        b.output(root, &name, PinCategory::Exec, 24.0 + 24.0 * i as f64);
        *child = b.exec(0.0, 0.0, 160.0, 64.0);
        b.link(root, &name, *child, "exec");
    }
    let [n1, n2, n3, _] = children;
    let n5 = b.exec(0.0, 0.0, 160.0, 64.0);
    b.then(n1, n5);
    b.then(n3, n1);
    b.input(n2, "value", PinCategory::Parameter, 48.0);
    for consumer in [root, n2] {
        let value = b.pure(0.0, 0.0, 120.0, 48.0);
        b.link(value, "value", consumer, "value");
    }
    let mut config = config();
    config.center_branches = true;
    config.min_branches_to_center = 2;
    config.parameter_style = ParameterStyle::LeftSide;

    let report = format(&mut b.graph, root, &config).unwrap();

    for link in &report.same_row {
        assert_eq!(b.pin_y(link.from), b.pin_y(link.to), "bent same-row link {link:?}");
    }
    for (i, x) in report.formatted.iter().enumerate() {
        for y in &report.formatted[i + 1..] {
            assert!(!b.bounds(*x).intersects(&b.bounds(*y)), "{x:?} overlaps {y:?}");
        }
    }
}

#[test]
fn too_few_branches_are_not_centered() {
    let mut b = Builder::new();
    let (r, [c1, _, _]) = fan_out(&mut b);
    let mut config = config();
    config.center_branches = true;
    config.min_branches_to_center = 4;

    format(&mut b.graph, r, &config).unwrap();
    assert_eq!(b.position(c1).y, 0.0);
}

#[test]
fn exec_cycles_terminate() {
    let mut b = Builder::new();
    let a = b.exec(0.0, 0.0, 160.0, 64.0);
    let c = b.exec(0.0, 0.0, 160.0, 64.0);
    b.then(a, c);
    b.then(c, a);

    let report = format(&mut b.graph, a, &config()).unwrap();
    assert_eq!(report.formatted.len(), 2);
    assert_eq!(b.position(c).x, 264.0);
    assert!(!b.bounds(a).intersects(&b.bounds(c)));
}

#[test]
fn ignored_and_unselected_nodes_stay_put() {
    let mut b = Builder::new();
    let (r, a, c) = chain(&mut b);

    let params = FormatParams {
        ignored_nodes: vec![c],
        ..FormatParams::default()
    };
    let report = Formatter::new(config())
        .format(&mut b.graph, r, &params)
        .unwrap();
    assert!(!report.formatted.contains(&c));
    assert_eq!(b.position(c), Vec2::new(-200.0, 50.0));
    assert_eq!(b.position(a), Vec2::new(264.0, 0.0));

    let params = FormatParams {
        nodes_to_format: vec![a],
        ..FormatParams::default()
    };
    let report = Formatter::new(config())
        .format(&mut b.graph, r, &params)
        .unwrap();
    assert_eq!(report.formatted, vec![r, a]);
    assert_eq!(b.position(c), Vec2::new(-200.0, 50.0));
}

#[test]
fn formatting_twice_changes_nothing() {
    let mut b = Builder::new();
    let (r, a, c) = chain(&mut b);
    let d = b.exec(900.0, 900.0, 200.0, 120.0);
    b.output(a, "alt", PinCategory::Exec, 48.0);
    b.link(a, "alt", d, "exec");

    format(&mut b.graph, r, &config()).unwrap();
    let first: Vec<Vec2> = [r, a, c, d].iter().map(|n| b.position(*n)).collect();
    format(&mut b.graph, r, &config()).unwrap();
    let second: Vec<Vec2> = [r, a, c, d].iter().map(|n| b.position(*n)).collect();
    assert_eq!(first, second);
}

#[test]
fn keep_still_node_does_not_move() {
    let mut b = Builder::new();
    let r = b.exec(0.0, 0.0, 160.0, 64.0);
    let c = b.exec(1000.0, 496.0, 160.0, 64.0);
    b.then(r, c);

    let params = FormatParams {
        node_to_keep_still: Some(c),
        ..FormatParams::default()
    };
    Formatter::new(config())
        .format(&mut b.graph, r, &params)
        .unwrap();
    assert_eq!(b.position(c), Vec2::new(1000.0, 496.0));
    assert_eq!(b.position(r), Vec2::new(736.0, 496.0));
}

#[test]
fn event_roots_always_keep_themselves_still() {
    let mut b = Builder::new();
    let (r, a, _) = chain(&mut b);

    let params = FormatParams {
        node_to_keep_still: Some(a),
        ..FormatParams::default()
    };
    Formatter::new(config())
        .format(&mut b.graph, r, &params)
        .unwrap();
    assert_eq!(b.position(r), Vec2::new(0.0, 0.0));
}

#[test]
fn unmeasured_nodes_are_reported() {
    let mut b = Builder::new();
    let (r, a, _) = chain(&mut b);
    b.graph.node_mut(a).unwrap().size = None;

    let err = format(&mut b.graph, r, &config()).unwrap_err();
    match err {
        FormatError::MissingSize { nodes } => assert_eq!(nodes, vec![a]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(b.position(r), Vec2::new(0.0, 0.0));
}

#[test]
fn invalid_roots_are_rejected() {
    let mut b = Builder::new();
    let (r, a, _) = chain(&mut b);
    let note = b.comment(&[r, a]);
    let knot = b.graph.add_knot(Vec2::ZERO, Vec2::new(42.0, 16.0), PinCategory::Exec);

    let reason = |graph: &mut knotwork::graph::Graph, root: NodeId, params: &FormatParams| {
        match Formatter::new(config()).format(graph, root, params) {
            Err(FormatError::InvalidRoot { node, reason }) => {
                assert_eq!(node, root);
                reason
            }
            other => panic!("expected an invalid root, got {other:?}"),
        }
    };
    let none = FormatParams::default();
    assert_eq!(reason(&mut b.graph, note, &none), InvalidRootReason::Comment);
    assert_eq!(reason(&mut b.graph, knot, &none), InvalidRootReason::Knot);
    assert_eq!(reason(&mut b.graph, NodeId(99), &none), InvalidRootReason::Missing);
    let ignoring_root = FormatParams {
        ignored_nodes: vec![r],
        ..FormatParams::default()
    };
    assert_eq!(
        reason(&mut b.graph, r, &ignoring_root),
        InvalidRootReason::Ignored
    );
}

#[test]
fn unlinked_root_is_left_alone() {
    let mut b = Builder::new();
    let r = b.exec(3.0, 5.0, 160.0, 64.0);

    let report = format(&mut b.graph, r, &config()).unwrap();
    assert_eq!(report.formatted, vec![r]);
    assert_eq!(b.position(r), Vec2::new(3.0, 5.0));
}

#[test]
fn grid_snapping_rounds_columns() {
    let mut b = Builder::new();
    let (r, a, c) = chain(&mut b);
    let mut config = config();
    config.snap_to_grid = true;
    config.grid_size = 100.0;

    format(&mut b.graph, r, &config).unwrap();
    assert_eq!(b.position(a).x, 300.0);
    assert_eq!(b.position(c).x, 500.0);
}

#[test]
fn cancelled_call_reports_it() {
    let mut b = Builder::new();
    let (r, _, _) = chain(&mut b);
    let params = FormatParams {
        cancel: Some(Arc::new(AtomicBool::new(true))),
        ..FormatParams::default()
    };

    let report = Formatter::new(config())
        .format(&mut b.graph, r, &params)
        .unwrap();
    assert!(report.cancelled);
    assert!(report.knot_requests.is_empty());
    assert!(report.comment_bounds.is_empty());
}
