/*!
 * Lease / Sponsor Protocol
 *
 * Keeps each cross-boundary object alive while the host can still reach it.
 * Boundaries issue leases, the host's lifetime manager counts them down, and
 * sponsors decide at each checkpoint whether a lease gets more time.
 */

pub mod lease;
pub mod lifetime;
pub mod sponsor;

pub use lease::{Lease, LeaseSponsor, LeaseState, LeaseTerms};
pub use lifetime::{CheckpointStats, LeaseRenewer, LifetimeManager};
pub use sponsor::{LeaseHolder, Sponsor};
