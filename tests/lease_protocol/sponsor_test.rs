/*!
 * Sponsor Tests
 * Renewal while the host holds a proxy, denial once it lets go
 */

use crate::common::{loaded_shapes, package_dir, shapes_registry, test_config};
use pretty_assertions::assert_eq;
use snip_modules::capability::{Effect, Surface};
use snip_modules::core::types::SponsorId;
use snip_modules::{Capability, Lease, LeaseHolder, LeaseSponsor, ModuleManager, StaticLauncher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const RENEWAL: Duration = Duration::from_secs(12);
const PAST_INITIAL: Duration = Duration::from_secs(61);

#[test]
fn test_held_proxy_is_renewed_at_every_checkpoint() {
    let (_dir, manager) = loaded_shapes();
    let host = manager.hosts()[0].clone();
    let mut frame = host.create::<dyn Effect>("shapes.Frame", &[]).unwrap();
    let lease = frame.lease().unwrap();
    let sponsor = manager.sponsor();
    assert!(sponsor.is_sponsoring(lease.id()));

    for _ in 0..5 {
        assert_eq!(sponsor.renewal(&lease), RENEWAL);
    }

    for _ in 0..5 {
        let stats = host.lifetime().checkpoint(PAST_INITIAL);
        assert_eq!(stats.renewed, 1);
        assert_eq!(stats.expired, 0);
        assert_eq!(lease.remaining(), RENEWAL);
    }

    frame.apply(&mut Surface::default()).unwrap();
}

#[test]
fn test_dropped_proxy_is_no_longer_renewed() {
    let (_dir, manager) = loaded_shapes();
    let host = manager.hosts()[0].clone();
    let frame = host.create::<dyn Effect>("shapes.Frame", &[]).unwrap();
    let lease = frame.lease().unwrap();
    let sponsor = manager.sponsor();

    drop(frame);
    assert!(lease.is_expired());
    assert!(!sponsor.is_sponsoring(lease.id()));

    assert_eq!(sponsor.renewal(&lease), Duration::ZERO);
    assert!(!sponsor.is_sponsoring(lease.id()));
    // Unknown lease: still zero, still no error
    assert_eq!(sponsor.renewal(&lease), Duration::ZERO);

    assert!(host.lifetime().is_empty());
}

#[test]
fn test_unregistered_proxy_expires_at_next_checkpoint() {
    let (_dir, manager) = loaded_shapes();
    let host = manager.hosts()[0].clone();
    let mut frame = host.create::<dyn Effect>("shapes.Frame", &[]).unwrap();
    let sponsor = manager.sponsor();

    sponsor.unregister(&frame);
    let lease = frame.lease().unwrap();
    assert_eq!(lease.sponsor_count(), 0);
    assert_eq!(sponsor.sponsored_count(), 0);

    let stats = host.lifetime().checkpoint(PAST_INITIAL);
    assert_eq!(stats.expired, 1);
    assert!(frame.lease().is_none());

    let err = frame.apply(&mut Surface::default()).unwrap_err();
    assert!(err.downcast_ref::<snip_modules::ModuleError>().is_some());
}

struct LocalShape;

impl LeaseHolder for LocalShape {}

#[test]
fn test_local_references_are_ignored() {
    let (_dir, manager) = loaded_shapes();
    let sponsor = manager.sponsor();

    sponsor.register(&LocalShape);
    sponsor.unregister(&LocalShape);
    assert_eq!(sponsor.sponsored_count(), 0);
}

struct Generous;

impl LeaseSponsor for Generous {
    fn sponsor_id(&self) -> SponsorId {
        SponsorId(u64::MAX)
    }

    fn renewal(&self, _lease: &Lease) -> Duration {
        Duration::from_secs(30)
    }
}

#[test]
fn test_largest_grant_wins() {
    let (_dir, manager) = loaded_shapes();
    let host = manager.hosts()[0].clone();
    let frame = host.create::<dyn Effect>("shapes.Frame", &[]).unwrap();
    let lease = frame.lease().unwrap();

    let generous: Arc<dyn LeaseSponsor> = Arc::new(Generous);
    lease.register(&generous);
    assert_eq!(lease.sponsor_count(), 2);

    host.lifetime().checkpoint(PAST_INITIAL);
    assert_eq!(lease.remaining(), Duration::from_secs(30));

    // A dropped sponsor is simply forgotten
    drop(generous);
    host.lifetime().checkpoint(PAST_INITIAL);
    assert_eq!(lease.remaining(), RENEWAL);
}

#[test]
fn test_dispose_releases_every_sponsorship() {
    let (_dir, mut manager) = loaded_shapes();
    let host = manager.hosts()[0].clone();
    let _a = host.create::<dyn Effect>("shapes.Frame", &[]).unwrap();
    let _b = host.create::<dyn Effect>("shapes.Lasso", &[]).unwrap();
    assert_eq!(manager.sponsor().sponsored_count(), 2);

    manager.dispose();
    assert_eq!(manager.sponsor().sponsored_count(), 0);
}

#[test]
fn test_dropped_proxies_leave_no_sponsorship_behind() {
    let (_dir, manager) = loaded_shapes();
    let host = manager.hosts()[0].clone();

    for _ in 0..100 {
        let frame = host.create::<dyn Effect>("shapes.Frame", &[]).unwrap();
        drop(frame);
    }
    host.lifetime().checkpoint(PAST_INITIAL);
    host.lifetime().checkpoint(PAST_INITIAL);

    assert_eq!(manager.sponsor().sponsored_count(), 0);
    assert!(host.lifetime().is_empty());
}

/// Manager with two boundaries built from the same module
fn two_boundaries() -> (tempfile::TempDir, ModuleManager) {
    let launcher = Arc::new(
        StaticLauncher::new()
            .with_module("a", shapes_registry)
            .with_module("b", shapes_registry),
    );
    let dir = package_dir(&["a", "b"]);
    let mut manager = ModuleManager::with_launcher(test_config(), launcher);
    assert_eq!(manager.load_from(dir.path(), &[Capability::Effect]), 2);
    (dir, manager)
}

#[test]
fn test_one_sponsor_serves_several_boundaries() {
    let (_dir, manager) = two_boundaries();
    let first = manager.hosts()[0].clone();
    let second = manager.hosts()[1].clone();

    let mut kept = first.create::<dyn Effect>("shapes.Frame", &[]).unwrap();
    let dropped = second.create::<dyn Effect>("shapes.Frame", &[]).unwrap();
    let kept_lease = kept.lease().unwrap();
    let dropped_lease = dropped.lease().unwrap();
    assert_ne!(kept_lease.id(), dropped_lease.id());
    assert_eq!(manager.sponsor().sponsored_count(), 2);

    drop(dropped);
    assert_eq!(manager.sponsor().sponsored_count(), 1);
    assert!(manager.sponsor().is_sponsoring(kept_lease.id()));

    let stats = first.lifetime().checkpoint(PAST_INITIAL);
    assert_eq!(stats.renewed, 1);
    assert_eq!(stats.expired, 0);
    let stats = second.lifetime().checkpoint(PAST_INITIAL);
    assert_eq!(stats.checked, 0);

    kept.apply(&mut Surface::default()).unwrap();
}

#[test]
fn test_checkpoints_run_alongside_registration() {
    let (_dir, manager) = loaded_shapes();
    let host = manager.hosts()[0].clone();
    let sponsor = manager.sponsor().clone();
    let done = Arc::new(AtomicBool::new(false));

    let checkpoints = {
        let host = host.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut runs = 0usize;
            loop {
                host.lifetime().checkpoint(PAST_INITIAL);
                runs += 1;
                if done.load(Ordering::Acquire) {
                    return runs;
                }
            }
        })
    };

    let churn = {
        let host = host.clone();
        let sponsor = sponsor.clone();
        thread::spawn(move || {
            let mut held = Vec::new();
            for i in 0..200 {
                let frame = host.create::<dyn Effect>("shapes.Frame", &[]).unwrap();
                if i % 4 == 0 {
                    held.push(frame);
                }
                if i % 50 == 49 {
                    sponsor.unregister_all();
                }
            }
            held
        })
    };

    let held = churn.join().unwrap();
    done.store(true, Ordering::Release);
    assert!(checkpoints.join().unwrap() > 0);

    let live: Vec<Arc<Lease>> = held.iter().filter_map(|proxy| proxy.lease()).collect();
    assert_eq!(host.lifetime().len(), live.len());
    for lease in &live {
        assert_eq!(sponsor.is_sponsoring(lease.id()), lease.sponsor_count() == 1);
    }
    let sponsored = live.iter().filter(|lease| sponsor.is_sponsoring(lease.id())).count();
    assert_eq!(sponsor.sponsored_count(), sponsored);

    drop(live);
    drop(held);
    assert_eq!(sponsor.sponsored_count(), 0);
    assert!(host.lifetime().is_empty());
}
