/*!
 * Lease Expiry Tests
 * Unsponsored objects, renew-on-call and pinned terms
 */

use crate::common::{launcher, package_dir, test_config};
use crate::common::loaded_shapes;
use pretty_assertions::assert_eq;
use snip_modules::boundary::Invocation;
use snip_modules::capability::{Effect, Surface};
use snip_modules::{Capability, FaultKind, LeaseTerms, ModuleManager};
use std::time::Duration;

#[test]
fn test_unsponsored_object_expires_and_is_released() {
    let (_dir, manager) = loaded_shapes();
    let host = manager.hosts()[0].clone();
    let raw = host.create_raw("shapes.Frame", "effect", &[]).unwrap();
    assert!(raw.lease().is_some());
    assert_eq!(host.lifetime().len(), 1);

    let stats = host.lifetime().checkpoint(Duration::from_secs(61));
    assert_eq!(stats.expired, 1);
    assert!(raw.lease().is_none());
    assert!(host.lifetime().is_empty());

    let err = raw
        .invoke(Invocation::Apply {
            surface: Surface::default(),
        })
        .unwrap_err();
    assert_eq!(err.kind(), FaultKind::Disconnected);
}

#[test]
fn test_successful_call_raises_remaining_time() {
    let (_dir, manager) = loaded_shapes();
    let host = manager.hosts()[0].clone();
    let mut frame = host.create::<dyn Effect>("shapes.Frame", &[]).unwrap();
    let lease = frame.lease().unwrap();

    host.lifetime().checkpoint(Duration::from_secs(55));
    assert_eq!(lease.remaining(), Duration::from_secs(5));

    frame.apply(&mut Surface::default()).unwrap();
    assert_eq!(lease.remaining(), Duration::from_secs(12));

    // Never above the floor
    frame.apply(&mut Surface::default()).unwrap();
    assert_eq!(lease.remaining(), Duration::from_secs(12));
}

#[test]
fn test_pinned_terms_issue_no_lease() {
    let dir = package_dir(&["shapes"]);
    let config = test_config().with_lease(LeaseTerms::pinned());
    assert!(config.validate().is_ok());
    let mut manager = ModuleManager::with_launcher(config, launcher());
    assert_eq!(manager.load_from(dir.path(), &[Capability::Effect]), 1);

    let host = manager.hosts()[0].clone();
    let mut frame = host.create::<dyn Effect>("shapes.Frame", &[]).unwrap();
    assert!(frame.lease().is_none());
    assert_eq!(manager.sponsor().sponsored_count(), 0);

    let stats = host.lifetime().checkpoint(Duration::from_secs(3600));
    assert_eq!(stats.checked, 0);
    frame.apply(&mut Surface::default()).unwrap();
}

#[test]
fn test_object_reclaimed_by_boundary_expires_host_lease() {
    let dir = package_dir(&["shapes"]);
    let config = test_config().with_lease(LeaseTerms {
        initial: Duration::from_millis(50),
        renew_on_call: Duration::from_millis(10),
        sponsorship_timeout: Duration::ZERO,
    });
    let mut manager = ModuleManager::with_launcher(config, launcher());
    assert_eq!(manager.load_from(dir.path(), &[Capability::Effect]), 1);

    let host = manager.hosts()[0].clone();
    let mut frame = host.create::<dyn Effect>("shapes.Frame", &[]).unwrap();
    let lease = frame.lease().unwrap();
    assert!(manager.sponsor().is_sponsoring(lease.id()));

    // Several reaper passes on the boundary side, no host checkpoint yet
    std::thread::sleep(Duration::from_secs(1));

    let stats = host.lifetime().checkpoint(Duration::from_secs(1));
    assert_eq!(stats.renewed, 0);
    assert_eq!(stats.expired, 1);
    assert!(lease.is_expired());
    assert!(frame.lease().is_none());
    assert_eq!(manager.sponsor().sponsored_count(), 0);

    let err = frame.apply(&mut Surface::default()).unwrap_err();
    let err = err.downcast_ref::<snip_modules::ModuleError>().unwrap();
    assert_eq!(err.kind(), FaultKind::Disconnected);
}
