//! Chart repository.
//!
//! Each patient has at most one periodontal chart and one odontogram, stored
//! as opaque JSON blobs in records whose id is the patient id.

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use super::{CollectionStore, DbError, DbResult};
use crate::models::{MeasurementLimits, OdontogramSelection, PeriodontalChart};

pub const PERIODONTOGRAMS_COLLECTION: &str = "periodontograms";
pub const ODONTOGRAMS_COLLECTION: &str = "odontograms";

/// Load the blob stored under `key`, if any.
fn load_blob<S, T>(store: &S, collection: &str, patient_id: &str, key: &str) -> DbResult<Option<T>>
where
    S: CollectionStore + ?Sized,
    T: DeserializeOwned,
{
    let Some(record) = store.find(collection, patient_id)? else {
        return Ok(None);
    };
    let Some(blob) = record.fields.get(key) else {
        return Ok(None);
    };
    serde_json::from_value(blob.clone()).map(Some).map_err(|e| {
        DbError::Validation(format!(
            "malformed {} for patient {}: {}",
            collection, patient_id, e
        ))
    })
}

fn save_blob<S, T>(store: &S, collection: &str, patient_id: &str, key: &str, value: &T) -> DbResult<()>
where
    S: CollectionStore + ?Sized,
    T: Serialize,
{
    let mut fields = Map::new();
    fields.insert("patient".into(), Value::String(patient_id.to_string()));
    fields.insert(key.into(), serde_json::to_value(value)?);
    fields.insert("saved_at".into(), json!(Utc::now().to_rfc3339()));

    if store.find(collection, patient_id)?.is_some() {
        store.update(collection, patient_id, fields)?;
    } else {
        fields.insert("id".into(), Value::String(patient_id.to_string()));
        store.create(collection, fields)?;
    }
    Ok(())
}

/// Chart persistence over any collection store.
pub trait ChartRepository: CollectionStore {
    /// Load a patient's periodontal chart under the given limits.
    ///
    /// A patient without a saved chart gets an empty one. Stored charts are
    /// normalized: missing teeth are filled in and values re-clamped.
    fn load_periodontal_chart(
        &self,
        patient_id: &str,
        limits: MeasurementLimits,
    ) -> DbResult<PeriodontalChart> {
        let stored: Option<PeriodontalChart> =
            load_blob(self, PERIODONTOGRAMS_COLLECTION, patient_id, "chart")?;
        Ok(match stored {
            Some(chart) => chart.normalized(limits),
            None => PeriodontalChart::with_limits(limits),
        })
    }

    /// Save the chart and clear its modified flag.
    fn save_periodontal_chart(&self, patient_id: &str, chart: &mut PeriodontalChart) -> DbResult<()> {
        save_blob(self, PERIODONTOGRAMS_COLLECTION, patient_id, "chart", &*chart)?;
        chart.mark_saved();
        info!(patient = patient_id, "saved periodontal chart");
        Ok(())
    }

    fn load_odontogram(&self, patient_id: &str) -> DbResult<OdontogramSelection> {
        Ok(load_blob(self, ODONTOGRAMS_COLLECTION, patient_id, "odontogram")?.unwrap_or_default())
    }

    fn save_odontogram(&self, patient_id: &str, odontogram: &OdontogramSelection) -> DbResult<()> {
        save_blob(self, ODONTOGRAMS_COLLECTION, patient_id, "odontogram", odontogram)?;
        info!(
            patient = patient_id,
            selected = odontogram.selected().count(),
            "saved odontogram"
        );
        Ok(())
    }
}

impl<S: CollectionStore + ?Sized> ChartRepository for S {}
