//! Reconciliation of a source and a replica inventory
//!
//! [`reconcile`] is a pure function: it looks only at the two inventories
//! and never touches the filesystem. Files are matched by relative path and
//! compared with [`Fingerprint::matches`](crate::types::Fingerprint::matches):
//!
//! | source | replica | fingerprints | result      |
//! |--------|---------|--------------|-------------|
//! | yes    | no      | -            | `to_add`    |
//! | yes    | yes     | match        | nothing     |
//! | yes    | yes     | differ       | `to_update` |
//! | no     | yes     | -            | `to_delete` |
//!
//! A file that could not be hashed on either side never matches, so it is
//! always re-copied.

use crate::types::{Inventory, ReconciliationPlan};
use tracing::{debug, trace};

/// Compute the operations that make `replica` match `source`
///
/// Each output set follows the inventories' relative-path order.
pub fn reconcile(source: &Inventory, replica: &Inventory) -> ReconciliationPlan {
    let source_map = source.by_path();
    let replica_map = replica.by_path();

    let mut plan = ReconciliationPlan::default();

    for record in source {
        match replica_map.get(record.relative_path.as_path()) {
            None => {
                trace!("{:?} missing from replica", record.relative_path);
                plan.to_add.push(record.clone());
            }
            Some(existing) if !record.fingerprint.matches(&existing.fingerprint) => {
                trace!(
                    "{:?} differs ({} vs {})",
                    record.relative_path,
                    record.fingerprint,
                    existing.fingerprint
                );
                plan.to_update.push(record.clone());
            }
            Some(_) => {}
        }
    }

    for record in replica {
        if !source_map.contains_key(record.relative_path.as_path()) {
            trace!("{:?} missing from source", record.relative_path);
            plan.to_delete.push(record.relative_path.clone());
        }
    }

    debug!(
        "Reconciled {} source / {} replica files: {} to add, {} to update, {} to delete",
        source.len(),
        replica.len(),
        plan.to_add.len(),
        plan.to_update.len(),
        plan.to_delete.len()
    );

    plan
}
