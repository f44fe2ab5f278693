/*!
 * Catalog Tests
 */

use crate::common::loaded_shapes;
use pretty_assertions::assert_eq;
use snip_modules::capability::{Effect, Surface};
use snip_modules::ModuleCatalog;

#[test]
fn test_catalog_splits_selection_tools_from_effects() {
    let (_dir, manager) = loaded_shapes();
    let catalog = ModuleCatalog::build(&manager.hosts()[0]).unwrap();

    let snapshot = catalog.snapshot();
    assert_eq!(snapshot.module, "shapes");
    assert_eq!(snapshot.effects, vec!["shapes.Frame", "shapes.Smudge"]);
    assert_eq!(snapshot.selections, vec!["shapes.Lasso"]);
    assert!(snapshot.screenshots.is_empty());
    assert!(snapshot.export_actions.is_empty());
}

#[test]
fn test_icons_are_found_by_display_name() {
    let (_dir, manager) = loaded_shapes();
    let catalog = ModuleCatalog::build(&manager.hosts()[0]).unwrap();

    let frame = &catalog.effects[0];
    assert_eq!(frame.display_name(), "Frame");
    assert_eq!(frame.icon(), Some(&b"\x89PNG frame"[..]));

    let smudge = &catalog.effects[1];
    assert_eq!(smudge.display_name(), "Smudge");
    assert!(smudge.icon().is_none());
}

#[test]
fn test_entries_create_usable_proxies() {
    let (_dir, manager) = loaded_shapes();
    let catalog = ModuleCatalog::build(&manager.hosts()[0]).unwrap();

    let mut frame = catalog.effects[0].create().unwrap();
    let mut surface = Surface::default();
    frame.apply(&mut surface).unwrap();
    assert_eq!(surface.commands.len(), 1);

    // Lasso is not pointer-aware, so only its primary and effect survive
    let lasso = catalog.selections[0].create().unwrap();
    assert_eq!(lasso.capabilities().len(), 2);
}
