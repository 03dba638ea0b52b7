mod common;

use common::{Builder, config};
use knotwork::graph::Vec2;
use knotwork::{FormatAllStyle, FormatConfig, format_all};

fn two_scripts(b: &mut Builder) -> [knotwork::graph::NodeId; 4] {
    let e1 = b.event(0.0, 0.0, 160.0, 64.0);
    let a = b.exec(0.0, 300.0, 160.0, 64.0);
    let e2 = b.event(2000.0, 0.0, 160.0, 64.0);
    let c = b.exec(0.0, 0.0, 160.0, 64.0);
    b.then(e1, a);
    b.then(e2, c);
    [e1, a, e2, c]
}

#[test]
fn simple_style_stacks_clusters_in_one_column() {
    let mut b = Builder::new();
    let [e1, a, e2, c] = two_scripts(&mut b);

    let report = format_all(&mut b.graph, &config()).unwrap();
    assert_eq!(report.roots, vec![e1, e2]);
    assert_eq!(report.clusters.len(), 2);

    assert_eq!(b.position(e1), Vec2::new(0.0, 0.0));
    assert_eq!(b.position(a), Vec2::new(264.0, 0.0));
    assert_eq!(b.position(e2), Vec2::new(0.0, 264.0));
    assert_eq!(b.position(c), Vec2::new(264.0, 264.0));
}

#[test]
fn smart_style_keeps_distant_clusters_side_by_side() {
    let mut b = Builder::new();
    let [e1, _, e2, c] = two_scripts(&mut b);
    let config = FormatConfig {
        format_all_style: FormatAllStyle::Smart,
        ..config()
    };

    format_all(&mut b.graph, &config).unwrap();
    assert_eq!(b.position(e1), Vec2::new(0.0, 0.0));
    assert_eq!(b.position(e2), Vec2::new(1024.0, 0.0));
    assert_eq!(b.position(c), Vec2::new(1288.0, 0.0));
}

#[test]
fn shared_nodes_stay_with_the_first_root() {
    let mut b = Builder::new();
    let e1 = b.event(0.0, 0.0, 160.0, 64.0);
    let e2 = b.event(0.0, 500.0, 160.0, 64.0);
    let shared = b.exec(0.0, 0.0, 160.0, 64.0);
    b.then(e1, shared);
    b.then(e2, shared);

    let report = format_all(&mut b.graph, &config()).unwrap();
    let owners = report
        .clusters
        .iter()
        .filter(|c| c.formatted.contains(&shared))
        .count();
    assert_eq!(owners, 1);
    assert!(
        report
            .clusters
            .iter()
            .any(|c| c.root == e2 && c.formatted == vec![e2])
    );
}

#[test]
fn clusters_never_overlap() {
    let mut b = Builder::new();
    let mut nodes = Vec::new();
    for i in 0..4 {
        let e = b.event(37.0 * i as f64, 11.0 * i as f64, 160.0, 64.0);
        let a = b.exec(0.0, 0.0, 200.0, 96.0);
        b.then(e, a);
        nodes.push([e, a]);
    }

    for style in [FormatAllStyle::Simple, FormatAllStyle::Smart] {
        let config = FormatConfig {
            format_all_style: style,
            ..config()
        };
        format_all(&mut b.graph, &config).unwrap();
        for (i, x) in nodes.iter().enumerate() {
            for y in &nodes[i + 1..] {
                for m in x {
                    for n in y {
                        assert!(!b.bounds(*m).intersects(&b.bounds(*n)), "{style:?}");
                    }
                }
            }
        }
    }
}

#[test]
fn empty_graph_has_no_roots() {
    let mut b = Builder::new();
    b.pure(0.0, 0.0, 120.0, 48.0);
    let report = format_all(&mut b.graph, &config()).unwrap();
    assert!(report.roots.is_empty());
    assert!(report.clusters.is_empty());
}

#[test]
fn unmeasured_cluster_is_skipped_and_the_rest_formatted() {
    let mut b = Builder::new();
    let [e1, a, e2, c] = two_scripts(&mut b);
    b.graph.node_mut(c).unwrap().size = None;

    let report = format_all(&mut b.graph, &config()).unwrap();

    assert_eq!(report.roots, vec![e1, e2]);
    assert_eq!(report.skipped, vec![e2]);
    assert_eq!(report.clusters.len(), 1);
    assert_eq!(b.position(e1), Vec2::new(0.0, 0.0));
    assert_eq!(b.position(a), Vec2::new(264.0, 0.0));
    assert_eq!(b.position(e2), Vec2::new(2000.0, 0.0));
    assert_eq!(b.position(c), Vec2::new(0.0, 0.0));
}
