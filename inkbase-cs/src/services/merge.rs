//! Merge Engine
//!
//! Consolidates two customers of one owner. The losing side is deactivated
//! and points at the survivor; anything already merged into the losing side
//! is repointed too, so every inactive customer is at most one hop from an
//! active one. Consent rows are never touched: they keep referencing the
//! customer they were signed under.

use inkbase_common::{time, Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::db::audit::{self, MergeLog};
use crate::db::customers::{self, Customer, CustomerField, CustomerProfile};
use crate::db::lock_customers;
use crate::scope::OwnerScope;

/// Result of a merge
#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
    pub keep: Customer,
    pub merged: Customer,
    /// Customers previously merged into `merged` that now point at `keep`
    pub relinked: u64,
    pub log: MergeLog,
}

/// Copy mergeable fields from `merged` into `keep`
///
/// Without `overwrite` only empty fields of `keep` are filled; with it every
/// non-empty field of `merged` wins. Returns the fields that changed.
pub fn reconcile_fields(keep: &mut CustomerProfile, merged: &CustomerProfile, overwrite: bool) -> Result<Vec<CustomerField>> {
    let mut changed = Vec::new();

    for field in CustomerField::mergeable() {
        let incoming = merged.get(field);
        if incoming.is_empty() {
            continue;
        }

        let current = keep.get(field);
        if (overwrite || current.is_empty()) && current != incoming {
            keep.set(field, incoming)?;
            changed.push(field);
        }
    }

    Ok(changed)
}

/// Merge `merged_id` into `keep_id` within the owner's scope
///
/// Rejected before any write when the ids are equal, either customer is
/// missing, or `keep` is inactive.
pub async fn merge_customers(
    pool: &SqlitePool,
    scope: &OwnerScope,
    keep_id: Uuid,
    merged_id: Uuid,
    overwrite: bool,
) -> Result<MergeOutcome> {
    if keep_id == merged_id {
        return Err(Error::InvalidRequest("A customer cannot be merged into itself".to_string()));
    }

    let mut tx = pool.begin().await?;
    lock_customers(&mut tx, scope.owner_id, &[keep_id, merged_id]).await?;

    let mut keep = customers::load_owned_customer(&mut tx, scope.owner_id, keep_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Customer {} (keep)", keep_id)))?;
    let mut merged = customers::load_owned_customer(&mut tx, scope.owner_id, merged_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Customer {} (merged)", merged_id)))?;

    if !keep.is_active {
        return Err(Error::InvalidRequest(format!(
            "Customer {} (keep) is not active",
            keep_id
        )));
    }

    let now = time::now();

    reconcile_fields(&mut keep.profile, &merged.profile, overwrite)?;
    keep.updated_at = now;

    let relinked = customers::relink_merged(&mut tx, scope.owner_id, merged.guid, keep.guid, &now).await?;

    merged.is_active = false;
    merged.merged_into = Some(keep.guid);
    merged.updated_at = now;

    let log = MergeLog::new(keep.guid, merged.guid, scope.owner_id, overwrite);
    audit::append_merge_log(&mut tx, &log).await?;

    customers::save_customer(&mut tx, &keep).await?;
    customers::save_customer(&mut tx, &merged).await?;

    tx.commit().await?;

    info!(
        keep = %keep.guid,
        merged = %merged.guid,
        relinked,
        overwrite,
        "Merged customers"
    );

    Ok(MergeOutcome {
        keep,
        merged,
        relinked,
        log,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(full_name: &str) -> CustomerProfile {
        CustomerProfile {
            full_name: full_name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_fill_empty_keep_field() {
        let mut keep = profile("");
        let changed = reconcile_fields(&mut keep, &profile("Taro"), false).unwrap();
        assert_eq!(keep.full_name, "Taro");
        assert_eq!(changed, vec![CustomerField::FullName]);
    }

    #[test]
    fn test_keep_value_preserved_without_overwrite() {
        let mut keep = profile("Jiro");
        reconcile_fields(&mut keep, &profile("Taro"), false).unwrap();
        assert_eq!(keep.full_name, "Jiro");
    }

    #[test]
    fn test_overwrite_prefers_merged() {
        let mut keep = profile("Jiro");
        reconcile_fields(&mut keep, &profile("Taro"), true).unwrap();
        assert_eq!(keep.full_name, "Taro");
    }

    #[test]
    fn test_overwrite_never_copies_empty_values() {
        let mut keep = CustomerProfile {
            full_name: "Jiro".to_string(),
            birth_date: Some("1990-01-01".to_string()),
            tattoo_experience: true,
            ..Default::default()
        };
        let changed = reconcile_fields(&mut keep, &CustomerProfile::default(), true).unwrap();

        assert!(changed.is_empty());
        assert_eq!(keep.full_name, "Jiro");
        assert_eq!(keep.birth_date.as_deref(), Some("1990-01-01"));
        assert!(keep.tattoo_experience);
    }

    #[test]
    fn test_false_flag_counts_as_empty() {
        let mut keep = CustomerProfile::default();
        let merged = CustomerProfile {
            tattoo_experience: true,
            ..Default::default()
        };
        reconcile_fields(&mut keep, &merged, false).unwrap();
        assert!(keep.tattoo_experience);
    }

    #[test]
    fn test_gender_is_left_alone() {
        let mut keep = CustomerProfile::default();
        let merged = CustomerProfile {
            gender: "female".to_string(),
            ..Default::default()
        };
        reconcile_fields(&mut keep, &merged, true).unwrap();
        assert_eq!(keep.gender, "");
    }
}
