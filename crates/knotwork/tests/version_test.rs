#[test]
fn version_matches_cargo_pkg_version() {
    assert_eq!(knotwork::VERSION, env!("CARGO_PKG_VERSION"));
    assert!(!knotwork::VERSION.is_empty());
}
