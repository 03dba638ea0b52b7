mod common;

use common::{Builder, config};
use knotwork::graph::{NodeId, Vec2};
use knotwork::{FormatConfig, FormatParams, Formatter};

fn fast_config() -> FormatConfig {
    FormatConfig {
        enable_fast_path: true,
        ..config()
    }
}

fn chain(b: &mut Builder) -> (NodeId, NodeId) {
    let r = b.exec(0.0, 0.0, 160.0, 64.0);
    let a = b.exec(700.0, 300.0, 160.0, 64.0);
    b.then(r, a);
    (r, a)
}

#[test]
fn moved_root_replays_the_saved_layout() {
    let mut b = Builder::new();
    let (r, a) = chain(&mut b);
    let mut formatter = Formatter::new(fast_config());
    let params = FormatParams::default();

    let first = formatter.format(&mut b.graph, r, &params).unwrap();
    assert!(!first.fast_path);
    assert_eq!(b.position(a), Vec2::new(264.0, 0.0));

    b.graph.set_position(r, Vec2::new(64.0, 32.0));
    b.graph.set_position(a, Vec2::new(-500.0, 20.0));
    let second = formatter.format(&mut b.graph, r, &params).unwrap();
    assert!(second.fast_path);
    assert_eq!(second.formatted, first.formatted);
    assert_eq!(b.position(r), Vec2::new(64.0, 32.0));
    assert_eq!(b.position(a), Vec2::new(328.0, 32.0));
}

#[test]
fn revision_bump_forces_a_full_layout() {
    let mut b = Builder::new();
    let (r, a) = chain(&mut b);
    let mut formatter = Formatter::new(fast_config());
    let params = FormatParams::default();
    formatter.format(&mut b.graph, r, &params).unwrap();

    b.graph.node_mut(a).unwrap().revision += 1;
    let report = formatter.format(&mut b.graph, r, &params).unwrap();
    assert!(!report.fast_path);

    // The full run saved a fresh state.
    let report = formatter.format(&mut b.graph, r, &params).unwrap();
    assert!(report.fast_path);
}

#[test]
fn resized_or_relinked_nodes_force_a_full_layout() {
    let mut b = Builder::new();
    let (r, a) = chain(&mut b);
    let mut formatter = Formatter::new(fast_config());
    let params = FormatParams::default();
    formatter.format(&mut b.graph, r, &params).unwrap();

    b.graph.node_mut(a).unwrap().size = Some(Vec2::new(200.0, 64.0));
    assert!(!formatter.format(&mut b.graph, r, &params).unwrap().fast_path);

    let c = b.exec(0.0, 0.0, 160.0, 64.0);
    b.then(a, c);
    let report = formatter.format(&mut b.graph, r, &params).unwrap();
    assert!(!report.fast_path);
    assert!(report.formatted.contains(&c));
}

#[test]
fn config_or_selection_change_forces_a_full_layout() {
    let mut b = Builder::new();
    let (r, _) = chain(&mut b);
    let mut formatter = Formatter::new(fast_config());
    let params = FormatParams::default();
    formatter.format(&mut b.graph, r, &params).unwrap();

    let mut changed = fast_config();
    changed.padding = Vec2::new(80.0, 80.0);
    formatter.set_config(changed);
    assert!(!formatter.format(&mut b.graph, r, &params).unwrap().fast_path);

    let ignoring = FormatParams {
        ignored_nodes: vec![NodeId(7)],
        ..FormatParams::default()
    };
    assert!(!formatter.format(&mut b.graph, r, &ignoring).unwrap().fast_path);
}

#[test]
fn forgotten_roots_and_disabled_fast_path_run_in_full() {
    let mut b = Builder::new();
    let (r, _) = chain(&mut b);
    let params = FormatParams::default();

    let mut formatter = Formatter::new(fast_config());
    formatter.format(&mut b.graph, r, &params).unwrap();
    formatter.forget(r);
    assert!(!formatter.format(&mut b.graph, r, &params).unwrap().fast_path);

    let mut plain = Formatter::new(config());
    plain.format(&mut b.graph, r, &params).unwrap();
    assert!(!plain.format(&mut b.graph, r, &params).unwrap().fast_path);
}
