/*!
 * Discovery Tests
 * Directory scanning, capability filtering and per-package failure isolation
 */

use crate::common::{manager, package_dir, touch};
use pretty_assertions::assert_eq;
use snip_modules::capability::{Effect, ExportAction, Rect, SelectionBearing, Surface, DrawCommand};
use snip_modules::Capability;

#[test]
fn test_get_types_filters_by_capability() {
    let dir = package_dir(&["shapes"]);
    let mut manager = manager();
    assert_eq!(manager.load_from(dir.path(), &[Capability::Effect]), 1);

    assert_eq!(
        manager.get_types::<dyn SelectionBearing>(),
        vec!["shapes.Lasso".to_string()]
    );

    let mut effects = manager.get_types::<dyn Effect>();
    effects.sort();
    assert_eq!(effects, vec!["shapes.Frame", "shapes.Lasso", "shapes.Smudge"]);
    assert!(manager.get_types::<dyn ExportAction>().is_empty());
}

#[test]
fn test_package_without_wanted_capability_is_dropped() {
    let dir = package_dir(&["shapes"]);
    let mut manager = manager();

    assert_eq!(manager.load_from(dir.path(), &[Capability::ExportAction]), 0);
    assert!(manager.hosts().is_empty());
}

#[test]
fn test_internal_and_abstract_types_do_not_count() {
    let dir = package_dir(&["hidden"]);
    let mut manager = manager();

    assert_eq!(manager.load_from(dir.path(), &Capability::ALL), 0);
    assert!(manager.hosts().is_empty());
}

#[test]
fn test_missing_directory_loads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = manager();

    assert_eq!(
        manager.load_from(dir.path().join("does-not-exist"), &Capability::ALL),
        0
    );
    assert!(manager.hosts().is_empty());
    assert!(manager.get_types::<dyn Effect>().is_empty());
}

#[test]
fn test_one_broken_package_does_not_stop_the_rest() {
    // `unknown` has no module behind it, so launching its boundary fails
    let dir = package_dir(&["unknown", "shapes"]);
    let mut manager = manager();

    assert_eq!(manager.load_from(dir.path(), &[Capability::Effect]), 1);
    assert_eq!(manager.hosts().len(), 1);
    assert!(manager.hosts()[0].name().ends_with("-shapes"));
}

#[test]
fn test_only_package_extension_is_scanned() {
    let dir = package_dir(&[]);
    touch(&dir.path().join("shapes.dll"));
    touch(&dir.path().join("shapes"));
    std::fs::create_dir(dir.path().join("nested.module")).unwrap();

    let mut manager = manager();
    assert_eq!(manager.load_from(dir.path(), &Capability::ALL), 0);
}

#[test]
fn test_boundary_names_are_numbered_per_manager() {
    let dir = package_dir(&["shapes"]);
    let mut manager = manager();
    manager.load_from(dir.path(), &[Capability::Effect]);
    manager.load_from(dir.path(), &[Capability::Effect]);

    let names: Vec<&str> = manager.hosts().iter().map(|h| h.name()).collect();
    assert_eq!(names.len(), 2);
    assert_ne!(names[0], names[1]);
    assert!(names.iter().all(|n| n.starts_with("module-boundary-")));
}

#[test]
fn test_duplicate_types_are_listed_once() {
    let dir = package_dir(&["shapes"]);
    let mut manager = manager();
    manager.load_from(dir.path(), &[Capability::Effect]);
    manager.load_from(dir.path(), &[Capability::Effect]);

    assert_eq!(manager.hosts().len(), 2);
    assert_eq!(manager.get_types::<dyn Effect>().len(), 3);
}

#[test]
fn test_malformed_package_config_fails_the_load() {
    let dir = package_dir(&["shapes"]);
    std::fs::write(dir.path().join("shapes.module.config"), b"{ not json").unwrap();

    let mut manager = manager();
    assert_eq!(manager.load_from(dir.path(), &[Capability::Effect]), 0);
}

#[test]
fn test_package_settings_reach_new_instances() {
    let dir = package_dir(&["shapes"]);
    std::fs::write(
        dir.path().join("shapes.module.config"),
        br#"{ "frame_width": "4" }"#,
    )
    .unwrap();

    let mut manager = manager();
    assert_eq!(manager.load_from(dir.path(), &[Capability::Effect]), 1);

    let host = manager.hosts()[0].clone();
    let mut frame = host.create::<dyn Effect>("shapes.Frame", &[]).unwrap();
    let mut surface = Surface::new(Rect::new(0, 0, 10, 10));
    frame.apply(&mut surface).unwrap();

    match &surface.commands[..] {
        [DrawCommand::Rectangle { width, .. }] => assert_eq!(*width, 4),
        other => panic!("unexpected commands: {:?}", other),
    }
}

#[test]
fn test_dispose_is_idempotent_and_unloads_everything() {
    let dir = package_dir(&["shapes"]);
    let mut manager = manager();
    manager.load_from(dir.path(), &[Capability::Effect]);
    let host = manager.hosts()[0].clone();

    manager.dispose();
    manager.dispose();

    assert!(manager.is_disposed());
    assert!(manager.hosts().is_empty());
    assert!(!host.is_alive());
    assert_eq!(manager.load_from(dir.path(), &[Capability::Effect]), 0);
}
