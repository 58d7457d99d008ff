use crate::store::{StorageError, TelemetryTx};

/// Outcome of a meter -> vehicle lookup. `Unmapped` is an expected state,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VehicleResolution {
    Mapped(String),
    Unmapped,
}

impl VehicleResolution {
    pub fn vehicle_id(&self) -> Option<&str> {
        match self {
            Self::Mapped(v) => Some(v),
            Self::Unmapped => None,
        }
    }
}

/// Resolve the vehicle charged by `meter_id` inside the caller's transaction.
///
/// Only storage failures are errors; a missing mapping yields `Unmapped`.
pub async fn resolve_vehicle<T: TelemetryTx>(
    tx: &mut T,
    meter_id: &str,
) -> Result<VehicleResolution, StorageError> {
    Ok(match tx.find_mapped_vehicle(meter_id).await? {
        Some(vehicle_id) => VehicleResolution::Mapped(vehicle_id),
        None => VehicleResolution::Unmapped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryTelemetryStore, TelemetryStore};

    #[tokio::test]
    async fn resolves_seeded_mapping() {
        let store = InMemoryTelemetryStore::with_mappings([("m-123", "v-tesla-01")]);
        let mut tx = store.begin().await.unwrap();

        let resolved = resolve_vehicle(&mut tx, "m-123").await.unwrap();
        assert_eq!(resolved, VehicleResolution::Mapped("v-tesla-01".to_string()));
        assert_eq!(resolved.vehicle_id(), Some("v-tesla-01"));
    }

    #[tokio::test]
    async fn unknown_meter_is_unmapped_not_an_error() {
        let store = InMemoryTelemetryStore::with_mappings([("m-123", "v-tesla-01")]);
        let mut tx = store.begin().await.unwrap();

        let resolved = resolve_vehicle(&mut tx, "m-unknown").await.unwrap();
        assert_eq!(resolved, VehicleResolution::Unmapped);
        assert_eq!(resolved.vehicle_id(), None);
    }

    #[tokio::test]
    async fn removed_mapping_resolves_unmapped() {
        let store = InMemoryTelemetryStore::with_mappings([("m-123", "v-tesla-01")]);
        assert_eq!(store.remove_mapping("m-123").await.as_deref(), Some("v-tesla-01"));

        let mut tx = store.begin().await.unwrap();
        let resolved = resolve_vehicle(&mut tx, "m-123").await.unwrap();
        assert_eq!(resolved, VehicleResolution::Unmapped);
    }
}
