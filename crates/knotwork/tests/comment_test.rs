mod common;

use common::{Builder, config};
use knotwork::graph::{NodeKind, PinCategory, Rect, Vec2};
use knotwork::{CommentBounds, format};

#[test]
fn comment_is_padded_away_from_its_neighbours() {
    let mut b = Builder::new();
    let r = b.event(0.0, 0.0, 160.0, 64.0);
    let a = b.exec(0.0, 0.0, 160.0, 64.0);
    let c = b.exec(0.0, 0.0, 160.0, 64.0);
    b.then(r, a);
    b.then(a, c);
    let note = b.comment(&[a]);

    let report = format(&mut b.graph, r, &config()).unwrap();

    assert_eq!(b.position(a), Vec2::new(296.0, 0.0));
    assert_eq!(b.position(c), Vec2::new(592.0, 0.0));
    let expected = Rect::new(266.0, -30.0, 486.0, 94.0);
    assert_eq!(
        report.comment_bounds,
        vec![CommentBounds {
            comment: note,
            bounds: expected,
        }]
    );
    assert_eq!(b.bounds(note), expected);
    assert!(expected.left - b.bounds(r).right >= 100.0);
    assert!(b.bounds(c).left - expected.right >= 100.0);
}

#[test]
fn comment_below_a_branch_is_pushed_down() {
    let mut b = Builder::new();
    let r = b.node(NodeKind::Event, 0.0, 0.0, 160.0, 96.0);
    b.output(r, "a", PinCategory::Exec, 24.0);
    b.output(r, "b", PinCategory::Exec, 48.0);
    let c1 = b.exec(0.0, 0.0, 160.0, 64.0);
    let c2 = b.exec(0.0, 0.0, 160.0, 64.0);
    b.link(r, "a", c1, "exec");
    b.link(r, "b", c2, "exec");
    let note = b.comment(&[c2]);

    let report = format(&mut b.graph, r, &config()).unwrap();

    assert_eq!(b.position(c2), Vec2::new(272.0, 200.0));
    let bounds = report.comment_bounds[0].bounds;
    assert_eq!(report.comment_bounds[0].comment, note);
    assert!(bounds.top >= b.bounds(c1).bottom + 100.0);
    assert!(bounds.contains(&b.bounds(c2)));
}

#[test]
fn nested_comments_enclose_each_other() {
    let mut b = Builder::new();
    let r = b.event(0.0, 0.0, 160.0, 64.0);
    let a = b.exec(0.0, 0.0, 160.0, 64.0);
    let c = b.exec(0.0, 0.0, 160.0, 64.0);
    b.then(r, a);
    b.then(a, c);
    let inner = b.comment(&[a]);
    let outer = b.comment(&[a, c, inner]);

    let report = format(&mut b.graph, r, &config()).unwrap();

    let find = |id| {
        report
            .comment_bounds
            .iter()
            .find(|cb| cb.comment == id)
            .map(|cb| cb.bounds)
            .unwrap()
    };
    let (inner_box, outer_box) = (find(inner), find(outer));
    assert!(outer_box.contains(&inner_box));
    assert!(inner_box.contains(&b.bounds(a)));
    assert!(outer_box.contains(&b.bounds(c)));
    assert!(!inner_box.intersects(&b.bounds(c)));
    assert!(!outer_box.intersects(&b.bounds(r)));
}

#[test]
fn comments_reaching_outside_the_format_are_ignored() {
    let mut b = Builder::new();
    let r = b.event(0.0, 0.0, 160.0, 64.0);
    let a = b.exec(0.0, 0.0, 160.0, 64.0);
    b.then(r, a);
    let stranger = b.exec(900.0, 900.0, 160.0, 64.0);
    let note = b.comment(&[a, stranger]);

    let report = format(&mut b.graph, r, &config()).unwrap();

    assert_eq!(report.ignored_comments, vec![note]);
    assert!(report.comment_bounds.is_empty());
    assert_eq!(b.bounds(note), Rect::new(0.0, 0.0, 10.0, 10.0));
}

#[test]
fn parameter_without_its_consumer_voids_the_comment() {
    let mut b = Builder::new();
    let r = b.event(0.0, 0.0, 160.0, 64.0);
    let c = b.exec(0.0, 0.0, 160.0, 96.0);
    b.input(c, "value", PinCategory::Parameter, 56.0);
    let p = b.pure(0.0, 0.0, 120.0, 48.0);
    b.then(r, c);
    b.link(p, "value", c, "value");
    let note = b.comment(&[p]);

    let report = format(&mut b.graph, r, &config()).unwrap();
    assert_eq!(report.ignored_comments, vec![note]);
}

#[test]
fn comment_padding_can_be_turned_off() {
    let mut b = Builder::new();
    let r = b.event(0.0, 0.0, 160.0, 64.0);
    let a = b.exec(0.0, 0.0, 160.0, 64.0);
    b.then(r, a);
    b.comment(&[a]);
    let mut config = config();
    config.apply_comment_padding = false;

    let report = format(&mut b.graph, r, &config).unwrap();
    assert!(report.comment_bounds.is_empty());
    assert_eq!(b.position(a).x, 264.0);
}
