mod common;

use common::{Builder, config};
use knotwork::graph::{NodeId, NodeKind, PinCategory, Vec2};
use knotwork::{FormatConfig, NodeFilter, ParameterGroup, ParameterStyle, build_pool, format};

/// `root -> consumer`, with `value` (pure) feeding the consumer's parameter pin at 56.
fn consumer_with_value(b: &mut Builder, root_width: f64) -> (NodeId, NodeId, NodeId) {
    let r = b.exec(0.0, 0.0, root_width, 64.0);
    let c = b.exec(0.0, 0.0, 160.0, 96.0);
    b.input(c, "value", PinCategory::Parameter, 56.0);
    let p = b.pure(-400.0, 400.0, 120.0, 48.0);
    b.then(r, c);
    b.link(p, "value", c, "value");
    (r, c, p)
}

#[test]
fn helixing_stacks_dependencies_below_and_before_the_consumer() {
    let mut b = Builder::new();
    let (r, c, p) = consumer_with_value(&mut b, 196.0);

    let report = format(&mut b.graph, r, &config()).unwrap();

    assert_eq!(b.position(c), Vec2::new(296.0, 0.0));
    assert_eq!(b.position(p), Vec2::new(136.0, 128.0));
    assert!(b.bounds(p).top >= b.bounds(c).bottom + 25.0);
    assert!(b.bounds(p).right <= b.bounds(c).left - 40.0);
    assert_eq!(
        report.parameters,
        vec![ParameterGroup {
            consumer: c,
            nodes: vec![p],
        }]
    );
    assert!(report.formatted.contains(&p));
}

#[test]
fn helixing_dependency_does_not_push_the_consumer_column() {
    let mut b = Builder::new();
    let (r, c, p) = consumer_with_value(&mut b, 196.0);
    let config = FormatConfig::default();

    let report = format(&mut b.graph, r, &config).unwrap();

    let (rb, cb, pb) = (b.bounds(r), b.bounds(c), b.bounds(p));
    assert_eq!(cb.left, rb.left + rb.width() + config.padding.x);
    assert!(pb.right <= cb.left - config.parameter_padding.x);
    assert!(!pb.intersects(&cb));
    assert!(!pb.intersects(&rb));
    assert_eq!(
        report.parameters,
        vec![ParameterGroup {
            consumer: c,
            nodes: vec![p],
        }]
    );
    let pool = build_pool(&b.graph, r, &config, &NodeFilter::new(r, &[], &[]));
    assert!(!pool.nodes.contains(&p));
}

#[test]
fn helixing_steps_nested_dependencies_toward_the_inputs() {
    let mut b = Builder::new();
    let (r, c, p) = consumer_with_value(&mut b, 160.0);
    b.input(p, "in", PinCategory::Parameter, 24.0);
    let q = b.pure(0.0, 0.0, 120.0, 48.0);
    b.link(q, "value", p, "in");

    format(&mut b.graph, r, &config()).unwrap();

    assert_eq!(b.position(c), Vec2::new(264.0, 0.0));
    assert_eq!(b.position(p), Vec2::new(104.0, 128.0));
    assert_eq!(b.position(q), Vec2::new(-56.0, 208.0));
    assert!(b.bounds(q).right <= b.bounds(p).left - 40.0);
    assert!(b.bounds(q).top >= b.bounds(p).bottom + 25.0);
}

#[test]
fn left_side_places_dependencies_before_the_consumer() {
    let mut b = Builder::new();
    let (r, c, p) = consumer_with_value(&mut b, 160.0);
    let mut config = config();
    config.parameter_style = ParameterStyle::LeftSide;

    format(&mut b.graph, r, &config).unwrap();

    // The consumer column makes room for the cluster.
    assert_eq!(b.position(c), Vec2::new(424.0, 0.0));
    assert_eq!(b.position(p).x, 264.0);
    assert_eq!(b.bounds(c).left - b.bounds(p).right, 40.0);
    assert_eq!(b.pin_y(b.pin(p, "value")), b.pin_y(b.pin(c, "value")));
    assert!(b.bounds(p).left - b.bounds(r).right >= 100.0);
}

#[test]
fn shared_dependency_belongs_to_one_consumer() {
    let mut b = Builder::new();
    let r = b.exec(0.0, 0.0, 160.0, 64.0);
    let a = b.exec(0.0, 0.0, 160.0, 96.0);
    let c = b.exec(0.0, 0.0, 160.0, 96.0);
    b.input(a, "value", PinCategory::Parameter, 56.0);
    b.input(c, "value", PinCategory::Parameter, 56.0);
    let p = b.pure(0.0, 0.0, 120.0, 48.0);
    b.then(r, a);
    b.then(a, c);
    b.link(p, "value", a, "value");
    b.link(p, "value", c, "value");

    let report = format(&mut b.graph, r, &config()).unwrap();

    let owners: Vec<NodeId> = report
        .parameters
        .iter()
        .filter(|g| g.nodes.contains(&p))
        .map(|g| g.consumer)
        .collect();
    assert_eq!(owners, vec![a]);
    assert!(b.bounds(p).right <= b.bounds(a).left - 40.0);
    // The later consumer stays clear of the shared cluster.
    assert!(b.bounds(c).left >= b.bounds(p).right + 40.0);
}

#[test]
fn pure_root_formats_only_its_dependencies() {
    let mut b = Builder::new();
    let p = b.pure(0.0, 0.0, 120.0, 48.0);
    b.input(p, "in", PinCategory::Parameter, 24.0);
    let q = b.pure(500.0, 500.0, 120.0, 48.0);
    b.link(q, "value", p, "in");
    let consumer = b.exec(700.0, 0.0, 160.0, 64.0);
    b.input(consumer, "value", PinCategory::Parameter, 24.0);
    b.link(p, "value", consumer, "value");

    let report = format(&mut b.graph, p, &config()).unwrap();

    assert_eq!(report.formatted, vec![p, q]);
    assert_eq!(b.position(p), Vec2::new(0.0, 0.0));
    assert_eq!(b.position(q), Vec2::new(-160.0, 80.0));
    assert_eq!(b.position(consumer), Vec2::new(700.0, 0.0));
}

#[test]
fn non_pure_inputs_are_not_parameters() {
    let mut b = Builder::new();
    let r = b.exec(0.0, 0.0, 160.0, 64.0);
    let c = b.exec(0.0, 0.0, 160.0, 96.0);
    b.input(c, "value", PinCategory::Parameter, 56.0);
    let other = b.node(NodeKind::Impure, 0.0, 600.0, 160.0, 64.0);
    b.output(other, "result", PinCategory::Parameter, 24.0);
    b.then(r, c);
    b.link(other, "result", c, "value");

    let report = format(&mut b.graph, r, &config()).unwrap();
    assert!(report.parameters.is_empty());
    assert_eq!(b.position(other), Vec2::new(0.0, 600.0));
}
