//! Odonto Core Library
//!
//! Local-first core of a dental practice: periodontal charting, odontogram
//! treatment planning, budgets with installment plans and patient balances.
//!
//! # Architecture
//!
//! ```text
//! Chart input (click / keyboard)
//!         │
//!   [PeriodontalChart]  clamp + wrap per site
//!         │
//!         ├──────────────► ChartGeometry ──► SVG paths over each tooth
//!         └──────────────► SiteStatistics ─► bleeding / plaque / pocket %
//!
//! Odontogram ──► planned treatments ──► Budget (pending)
//!                                           │ set_plan
//!                                           ▼
//!                         ┌──────── BudgetService (one transaction) ───────┐
//!                         │ accept / reject / register_payment             │
//!                         │ status + patient balance + ledger entry        │
//!                         └────────────────────────────────────────────────┘
//!                                           │
//!                                  CollectionStore (SQLite)
//! ```
//!
//! # Modules
//!
//! - [`models`]: Domain types (teeth, periodontal chart, odontogram, budgets, patients)
//! - [`chart`]: Clinical derivations and plot geometry
//! - [`billing`]: Payment calculator, budget lifecycle and balance ledger
//! - [`db`]: Collection store with filter/sort/expand and typed repositories
//! - [`history`]: Medication history and appointment book
//! - [`config`]: TOML configuration

pub mod billing;
pub mod chart;
pub mod config;
pub mod db;
pub mod history;
pub mod logging;
pub mod matching;
pub mod models;

// Re-export commonly used types
pub use billing::{BillingError, BudgetService, BudgetTransition, LedgerReport};
pub use chart::{ChartGeometry, GeometryConfig, SiteStatistics};
pub use config::AppConfig;
pub use db::{CollectionStore, Database, DbError, ListQuery, Record, Records};
pub use history::{AppointmentBook, MedicationHistory};
pub use models::{
    Appointment, AppointmentStatus, Budget, BudgetItem, BudgetStatus, Consultation,
    MeasurementLimits, OdontogramSelection, Patient, PeriodontalChart, PlanType, Prescription,
    ToothNumber, Treatment,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveTime};

use db::{
    BudgetRepository, ChartRepository, ConsultationRepository, PatientRepository,
    TreatmentRepository,
};
use models::{
    Measurement, MeasurementKind, PaymentMethod, Site, StepDirection, Surface, ToothTreatment,
    TreatmentStatus, VitalSigns,
};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum OdontoError {
    /// Retrying may succeed (busy or locked database, I/O failure)
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for OdontoError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => OdontoError::NotFound(what),
            DbError::Json(e) => OdontoError::Serialization(e.to_string()),
            e if e.is_retryable() => OdontoError::TransientIo(e.to_string()),
            e => OdontoError::Validation(e.to_string()),
        }
    }
}

impl From<BillingError> for OdontoError {
    fn from(e: BillingError) -> Self {
        match e {
            BillingError::Store(e) => e.into(),
            e => OdontoError::Validation(e.to_string()),
        }
    }
}

impl From<models::ChartError> for OdontoError {
    fn from(e: models::ChartError) -> Self {
        OdontoError::Validation(e.to_string())
    }
}

impl From<serde_json::Error> for OdontoError {
    fn from(e: serde_json::Error) -> Self {
        OdontoError::Serialization(e.to_string())
    }
}

impl From<anyhow::Error> for OdontoError {
    fn from(e: anyhow::Error) -> Self {
        OdontoError::Config(format!("{:#}", e))
    }
}

impl<T> From<std::sync::PoisonError<T>> for OdontoError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        OdontoError::TransientIo(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path with default settings.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<OdontoCore>, OdontoError> {
    let db = Database::open(&path)?;
    Ok(OdontoCore::new(db, AppConfig::default()))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<OdontoCore>, OdontoError> {
    let db = Database::open_in_memory()?;
    Ok(OdontoCore::new(db, AppConfig::default()))
}

/// Load a TOML config file and open the database it names.
#[uniffi::export]
pub fn open_with_config(config_path: String) -> Result<Arc<OdontoCore>, OdontoError> {
    let config = AppConfig::load_from(&config_path)?;
    let db = Database::open(&config.database.path)?;
    Ok(OdontoCore::new(db, config))
}

/// Install the tracing subscriber. Later calls are no-ops.
#[uniffi::export]
pub fn init_logging(filter: String) {
    logging::init_subscriber(&filter);
}

fn parse_date(date: &str) -> Result<NaiveDate, OdontoError> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|e| OdontoError::Validation(format!("invalid date {:?}: {}", date, e)))
}

fn parse_time(time: &str) -> Result<NaiveTime, OdontoError> {
    let time = time.trim();
    NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .map_err(|e| OdontoError::Validation(format!("invalid time {:?}: {}", time, e)))
}

/// Dated installments for a breakdown, starting on `start_date` (YYYY-MM-DD).
#[uniffi::export]
pub fn payment_schedule(
    breakdown: FfiPaymentBreakdown,
    plan_type: FfiPlanType,
    start_date: String,
) -> Result<Vec<FfiInstallment>, OdontoError> {
    let start = parse_date(&start_date)?;
    let schedule = billing::payment_schedule(&breakdown.into(), plan_type.into(), start)?;
    Ok(schedule.into_iter().map(|i| i.into()).collect())
}

/// Payment breakdown for a subtotal under a plan.
#[uniffi::export]
pub fn calculate_payment(
    subtotal: f64,
    plan_type: FfiPlanType,
    duration: i32,
    interest_rate: f64,
) -> Result<FfiPaymentBreakdown, OdontoError> {
    let breakdown = billing::calculate_payment(subtotal, plan_type.into(), duration, interest_rate)?;
    Ok(breakdown.into())
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
///
/// Periodontal charts and odontograms are edited as per-patient working
/// copies, loaded on first access. Edits stay in memory until the host
/// saves or discards them. Locks are always taken working copies first,
/// then the database.
#[derive(uniffi::Object)]
pub struct OdontoCore {
    db: Arc<Mutex<Database>>,
    config: AppConfig,
    charts: Mutex<HashMap<String, PeriodontalChart>>,
    odontograms: Mutex<HashMap<String, WorkingOdontogram>>,
}

/// Odontogram being edited plus whether it differs from the stored one.
struct WorkingOdontogram {
    selection: OdontogramSelection,
    modified: bool,
}

impl OdontoCore {
    fn new(db: Database, config: AppConfig) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            config,
            charts: Mutex::new(HashMap::new()),
            odontograms: Mutex::new(HashMap::new()),
        })
    }

    /// Run `f` on the patient's working chart, loading it on first access.
    fn with_chart<T>(
        &self,
        patient_id: &str,
        f: impl FnOnce(&mut PeriodontalChart) -> Result<T, OdontoError>,
    ) -> Result<T, OdontoError> {
        let mut charts = self.charts.lock()?;
        let chart = match charts.entry(patient_id.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let db = self.db.lock()?;
                let loaded = db
                    .records()
                    .load_periodontal_chart(patient_id, self.config.chart.limits())?;
                entry.insert(loaded)
            }
        };
        f(chart)
    }

    /// Run `f` on the patient's working odontogram, loading it on first
    /// access. `f` returns whether it changed the selection.
    fn with_odontogram<T>(
        &self,
        patient_id: &str,
        f: impl FnOnce(&mut OdontogramSelection) -> Result<(T, bool), OdontoError>,
    ) -> Result<T, OdontoError> {
        let mut odontograms = self.odontograms.lock()?;
        let working = match odontograms.entry(patient_id.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let db = self.db.lock()?;
                let selection = db.records().load_odontogram(patient_id)?;
                entry.insert(WorkingOdontogram {
                    selection,
                    modified: false,
                })
            }
        };
        let (result, changed) = f(&mut working.selection)?;
        working.modified |= changed;
        Ok(result)
    }
}

#[uniffi::export]
impl OdontoCore {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Create a new patient.
    pub fn create_patient(
        &self,
        first_name: String,
        last_name: String,
    ) -> Result<FfiPatient, OdontoError> {
        let db = self.db.lock()?;
        let patient = Patient::new(first_name, last_name);
        db.records().insert_patient(&patient)?;
        Ok(patient.into())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: String) -> Result<Option<FfiPatient>, OdontoError> {
        let db = self.db.lock()?;
        let patient = db.records().get_patient(&id)?;
        Ok(patient.map(|p| p.into()))
    }

    /// Search patients by name.
    pub fn search_patients(&self, query: String, limit: u32) -> Result<Vec<FfiPatient>, OdontoError> {
        let db = self.db.lock()?;
        let patients = db.records().search_patients(&query, limit as usize)?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    // =========================================================================
    // Treatment Catalog
    // =========================================================================

    /// Add or update a catalog treatment.
    pub fn upsert_treatment(&self, treatment: FfiTreatment) -> Result<(), OdontoError> {
        let db = self.db.lock()?;
        db.records().upsert_treatment(&treatment.into())?;
        Ok(())
    }

    /// Fuzzy search of the catalog.
    pub fn search_treatments(&self, query: String, limit: u32) -> Result<Vec<FfiTreatment>, OdontoError> {
        let db = self.db.lock()?;
        let hits = db.records().search_treatments(&query, limit as usize)?;
        Ok(hits.into_iter().map(|h| h.treatment.into()).collect())
    }

    // =========================================================================
    // Budget Operations
    // =========================================================================

    /// Create a pending budget.
    pub fn create_budget(
        &self,
        patient_id: String,
        items: Vec<FfiBudgetItem>,
    ) -> Result<FfiBudget, OdontoError> {
        let items = items
            .into_iter()
            .map(BudgetItem::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let db = self.db.lock()?;
        let budget = BudgetService::new(&db).create_budget(&patient_id, items)?;
        Ok(budget.into())
    }

    /// Attach a payment plan to a pending budget.
    pub fn set_budget_plan(
        &self,
        budget_id: String,
        plan_type: FfiPlanType,
        duration: i32,
        interest_rate: f64,
    ) -> Result<FfiBudget, OdontoError> {
        let db = self.db.lock()?;
        let budget = BudgetService::new(&db).set_plan(
            &budget_id,
            plan_type.into(),
            duration,
            interest_rate,
            Some(chrono::Utc::now().date_naive()),
        )?;
        Ok(budget.into())
    }

    pub fn accept_budget(&self, budget_id: String) -> Result<FfiBudgetTransition, OdontoError> {
        let db = self.db.lock()?;
        Ok(BudgetService::new(&db).accept_budget(&budget_id)?.into())
    }

    pub fn reject_budget(&self, budget_id: String) -> Result<FfiBudgetTransition, OdontoError> {
        let db = self.db.lock()?;
        Ok(BudgetService::new(&db).reject_budget(&budget_id)?.into())
    }

    pub fn register_payment(
        &self,
        budget_id: String,
        amount: f64,
        method: FfiPaymentMethod,
    ) -> Result<FfiBudgetTransition, OdontoError> {
        let db = self.db.lock()?;
        let transition =
            BudgetService::new(&db).register_payment(&budget_id, amount, method.into(), None)?;
        Ok(transition.into())
    }

    /// A patient's budgets, newest first.
    pub fn list_budgets(&self, patient_id: String) -> Result<Vec<FfiBudget>, OdontoError> {
        let db = self.db.lock()?;
        let budgets = db.records().list_budgets_for_patient(&patient_id)?;
        Ok(budgets.into_iter().map(|b| b.into()).collect())
    }

    /// Check a patient's balance against the ledger and fix drift.
    pub fn reconcile_balance(&self, patient_id: String) -> Result<FfiLedgerReport, OdontoError> {
        let db = self.db.lock()?;
        Ok(BudgetService::new(&db).reconcile_balance(&patient_id)?.into())
    }

    /// Dated installments of a budget's plan, from the plan's start date or
    /// today when it has none.
    pub fn budget_schedule(&self, budget_id: String) -> Result<Vec<FfiInstallment>, OdontoError> {
        let db = self.db.lock()?;
        let budget = db
            .records()
            .get_budget(&budget_id)?
            .ok_or_else(|| OdontoError::NotFound(format!("budget {}", budget_id)))?;
        let plan = budget
            .plan
            .ok_or_else(|| OdontoError::Validation(format!("budget {} has no payment plan", budget_id)))?;
        let start = match &plan.start_date {
            Some(date) => parse_date(date)?,
            None => chrono::Utc::now().date_naive(),
        };
        let schedule = billing::payment_schedule(&plan.breakdown, plan.plan_type, start)?;
        Ok(schedule.into_iter().map(|i| i.into()).collect())
    }

    // =========================================================================
    // Periodontal Chart
    // =========================================================================

    /// Set a millimeter reading; returns the stored (clamped) value.
    pub fn set_chart_value(
        &self,
        patient_id: String,
        tooth: u8,
        surface: FfiSurface,
        site: FfiSite,
        kind: FfiMeasurementKind,
        value: i32,
    ) -> Result<i32, OdontoError> {
        let tooth = ToothNumber::new(tooth)?;
        self.with_chart(&patient_id, |chart| {
            let measurement = match kind {
                FfiMeasurementKind::Margin => Measurement::Margin(value),
                FfiMeasurementKind::ProbingDepth => Measurement::ProbingDepth(value),
                FfiMeasurementKind::Bleeding => Measurement::Bleeding(value != 0),
                FfiMeasurementKind::Plaque => Measurement::Plaque(value != 0),
            };
            Ok(measurement_value(chart.set(tooth, surface.into(), site.into(), measurement)))
        })
    }

    /// Cycle a reading (wrapping) or toggle a flag; returns the new value.
    pub fn step_chart_value(
        &self,
        patient_id: String,
        tooth: u8,
        surface: FfiSurface,
        site: FfiSite,
        kind: FfiMeasurementKind,
        increment: bool,
    ) -> Result<i32, OdontoError> {
        let tooth = ToothNumber::new(tooth)?;
        let direction = if increment {
            StepDirection::Increment
        } else {
            StepDirection::Decrement
        };
        self.with_chart(&patient_id, |chart| {
            Ok(measurement_value(chart.step(
                tooth,
                surface.into(),
                site.into(),
                kind.into(),
                direction,
            )))
        })
    }

    /// Flip a tooth's absent flag; returns the new state.
    pub fn toggle_tooth_absent(&self, patient_id: String, tooth: u8) -> Result<bool, OdontoError> {
        let tooth = ToothNumber::new(tooth)?;
        self.with_chart(&patient_id, |chart| Ok(chart.toggle_absent(tooth)))
    }

    /// Set mobility and furcation grades (clamped to 0-3).
    pub fn set_tooth_grades(
        &self,
        patient_id: String,
        tooth: u8,
        mobility: i32,
        furcation: i32,
    ) -> Result<(), OdontoError> {
        let tooth = ToothNumber::new(tooth)?;
        self.with_chart(&patient_id, |chart| {
            chart.set_mobility(tooth, mobility);
            chart.set_furcation(tooth, furcation);
            Ok(())
        })
    }

    /// Whole-mouth statistics.
    pub fn chart_statistics(&self, patient_id: String) -> Result<FfiChartStatistics, OdontoError> {
        self.with_chart(&patient_id, |chart| Ok(SiteStatistics::from_chart(chart).into()))
    }

    /// Plot paths for one surface of a tooth; `None` for absent teeth.
    pub fn plot_surface(
        &self,
        patient_id: String,
        tooth: u8,
        surface: FfiSurface,
    ) -> Result<Option<FfiSurfacePlot>, OdontoError> {
        let tooth = ToothNumber::new(tooth)?;
        let geometry = ChartGeometry::new(self.config.geometry);
        self.with_chart(&patient_id, |chart| {
            Ok(geometry
                .plot_surface(chart, tooth, surface.into())
                .map(|plot| plot.into()))
        })
    }

    /// The working chart as JSON.
    pub fn periodontal_chart_json(&self, patient_id: String) -> Result<String, OdontoError> {
        self.with_chart(&patient_id, |chart| Ok(serde_json::to_string(chart)?))
    }

    /// Whether the working chart has unsaved edits.
    pub fn is_chart_modified(&self, patient_id: String) -> Result<bool, OdontoError> {
        let charts = self.charts.lock()?;
        Ok(charts.get(&patient_id).is_some_and(|c| c.is_modified()))
    }

    /// Persist the working chart. Returns false when there was nothing to save.
    pub fn save_periodontal_chart(&self, patient_id: String) -> Result<bool, OdontoError> {
        let mut charts = self.charts.lock()?;
        let Some(chart) = charts.get_mut(&patient_id).filter(|c| c.is_modified()) else {
            return Ok(false);
        };
        let db = self.db.lock()?;
        db.records().save_periodontal_chart(&patient_id, chart)?;
        Ok(true)
    }

    /// Drop unsaved chart edits; the next access reloads the stored chart.
    pub fn discard_chart_changes(&self, patient_id: String) -> Result<(), OdontoError> {
        self.charts.lock()?.remove(&patient_id);
        Ok(())
    }

    // =========================================================================
    // Odontogram
    // =========================================================================

    pub fn odontogram(&self, patient_id: String) -> Result<FfiOdontogram, OdontoError> {
        self.with_odontogram(&patient_id, |odontogram| Ok((FfiOdontogram::from(&*odontogram), false)))
    }

    /// Flip a tooth's selection; returns whether it is now selected.
    pub fn toggle_tooth_selection(&self, patient_id: String, tooth: u8) -> Result<bool, OdontoError> {
        let tooth = ToothNumber::new(tooth)?;
        self.with_odontogram(&patient_id, |odontogram| Ok((odontogram.toggle(tooth), true)))
    }

    /// Assign a catalog treatment to a tooth, replacing any earlier one.
    pub fn annotate_tooth(
        &self,
        patient_id: String,
        tooth: u8,
        treatment_id: String,
    ) -> Result<FfiToothTreatment, OdontoError> {
        let tooth = ToothNumber::new(tooth)?;
        let treatment = {
            let db = self.db.lock()?;
            db.records()
                .get_treatment(&treatment_id)?
                .ok_or_else(|| OdontoError::NotFound(format!("treatment {}", treatment_id)))?
        };
        self.with_odontogram(&patient_id, |odontogram| {
            let annotation = odontogram.annotate(tooth, &treatment).clone();
            Ok((FfiToothTreatment::new(tooth, annotation), true))
        })
    }

    /// Returns false when the tooth has no treatment.
    pub fn set_tooth_treatment_status(
        &self,
        patient_id: String,
        tooth: u8,
        status: FfiTreatmentStatus,
    ) -> Result<bool, OdontoError> {
        let tooth = ToothNumber::new(tooth)?;
        self.with_odontogram(&patient_id, |odontogram| {
            let changed = odontogram.set_status(tooth, status.into());
            Ok((changed, changed))
        })
    }

    /// Remove a tooth's treatment; returns whether it had one.
    pub fn clear_tooth_treatment(&self, patient_id: String, tooth: u8) -> Result<bool, OdontoError> {
        let tooth = ToothNumber::new(tooth)?;
        self.with_odontogram(&patient_id, |odontogram| {
            let cleared = odontogram.clear_annotation(tooth).is_some();
            Ok((cleared, cleared))
        })
    }

    pub fn is_odontogram_modified(&self, patient_id: String) -> Result<bool, OdontoError> {
        let odontograms = self.odontograms.lock()?;
        Ok(odontograms.get(&patient_id).is_some_and(|w| w.modified))
    }

    /// Persist the working odontogram. Returns false when there was nothing to save.
    pub fn save_odontogram(&self, patient_id: String) -> Result<bool, OdontoError> {
        let mut odontograms = self.odontograms.lock()?;
        let Some(working) = odontograms.get_mut(&patient_id).filter(|w| w.modified) else {
            return Ok(false);
        };
        let db = self.db.lock()?;
        db.records().save_odontogram(&patient_id, &working.selection)?;
        working.modified = false;
        Ok(true)
    }

    pub fn discard_odontogram_changes(&self, patient_id: String) -> Result<(), OdontoError> {
        self.odontograms.lock()?.remove(&patient_id);
        Ok(())
    }

    /// Pending budget from the planned treatments of the working odontogram.
    pub fn create_budget_from_odontogram(&self, patient_id: String) -> Result<FfiBudget, OdontoError> {
        let odontogram = self.with_odontogram(&patient_id, |odontogram| Ok((odontogram.clone(), false)))?;
        let db = self.db.lock()?;
        let budget = BudgetService::new(&db).create_budget_from_odontogram(&patient_id, &odontogram)?;
        Ok(budget.into())
    }

    // =========================================================================
    // Appointments
    // =========================================================================

    /// Book a registered patient. `date` is YYYY-MM-DD and `time` HH:MM.
    pub fn schedule_appointment(
        &self,
        patient_id: String,
        date: String,
        time: String,
        duration_minutes: Option<u32>,
        reason: Option<String>,
    ) -> Result<FfiAppointment, OdontoError> {
        let date = parse_date(&date)?;
        let time = parse_time(&time)?;
        let db = self.db.lock()?;
        let store = db.records();
        let patient = store
            .get_patient(&patient_id)?
            .ok_or_else(|| OdontoError::NotFound(format!("patient {}", patient_id)))?;

        let mut appointment = Appointment::for_patient(&patient, date, time);
        if let Some(minutes) = duration_minutes {
            appointment.duration_minutes = minutes;
        }
        if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
            appointment.reason = reason;
        }
        AppointmentBook::load(&store)?.schedule(appointment.clone())?;
        Ok(appointment.into())
    }

    /// Appointments on a day (YYYY-MM-DD), by start time.
    pub fn appointments_on(&self, date: String) -> Result<Vec<FfiAppointment>, OdontoError> {
        let date = parse_date(&date)?;
        let db = self.db.lock()?;
        let store = db.records();
        let book = AppointmentBook::load(&store)?;
        Ok(book.on_date(date).into_iter().map(|a| a.clone().into()).collect())
    }

    pub fn set_appointment_status(
        &self,
        id: String,
        status: FfiAppointmentStatus,
    ) -> Result<FfiAppointment, OdontoError> {
        let db = self.db.lock()?;
        let store = db.records();
        let updated = AppointmentBook::load(&store)?.set_status(&id, status.into())?;
        Ok(updated.into())
    }

    // =========================================================================
    // Consultations
    // =========================================================================

    /// Save a consultation, stamp the patient's last visit, complete today's
    /// appointments for the patient and remember the prescribed medications,
    /// all in one transaction. Returns the consultation ID.
    pub fn record_consultation(&self, input: FfiConsultation) -> Result<String, OdontoError> {
        let db = self.db.lock()?;
        let tx = db.begin()?;
        let store = Records::new(&tx);

        let mut consultation = match &input.parent_id {
            Some(parent_id) => {
                let parent = store
                    .get_consultation(parent_id)?
                    .ok_or_else(|| OdontoError::NotFound(format!("consultation {}", parent_id)))?;
                Consultation::follow_up(&parent)
            }
            None => Consultation::new(input.patient_id.clone()),
        };
        if !input.chief_complaint.is_empty() {
            consultation.chief_complaint = input.chief_complaint;
        }
        consultation.diagnosis = input.diagnosis;
        consultation.treatment_plan = input.treatment_plan;
        consultation.notes = input.notes;
        consultation.studies = input.studies;
        consultation.vital_signs = VitalSigns {
            systolic: input.systolic,
            diastolic: input.diastolic,
            heart_rate: input.heart_rate,
            temperature: input.temperature,
            spo2: input.spo2,
            weight_kg: input.weight_kg,
            height_cm: input.height_cm,
        };
        consultation.medications = input.medications.into_iter().map(|m| m.into()).collect();

        store.insert_consultation(&consultation)?;
        if let Some(patient) = store.get_patient(&consultation.patient)? {
            let today = chrono::Utc::now().date_naive();
            AppointmentBook::load(&store)?.complete_consultation(&patient, today)?;
        }
        let mut history = MedicationHistory::load(&store, self.config.medication_history.capacity)?;
        history.remember_all(consultation.named_medications())?;
        tx.commit().map_err(DbError::from)?;

        Ok(consultation.id)
    }

    pub fn get_consultation(&self, id: String) -> Result<Option<FfiConsultation>, OdontoError> {
        let db = self.db.lock()?;
        let consultation = db.records().get_consultation(&id)?;
        Ok(consultation.map(|c| c.into()))
    }

    /// Medication suggestions for a partially typed name.
    pub fn suggest_medications(&self, query: String, limit: u32) -> Result<Vec<FfiPrescription>, OdontoError> {
        let db = self.db.lock()?;
        let store = db.records();
        let history = MedicationHistory::load(&store, self.config.medication_history.capacity)?;
        Ok(history
            .suggest(&query, limit as usize)
            .into_iter()
            .map(|m| m.into())
            .collect())
    }
}

fn measurement_value(measurement: Measurement) -> i32 {
    match measurement {
        Measurement::Margin(v) | Measurement::ProbingDepth(v) => v,
        Measurement::Bleeding(b) | Measurement::Plaque(b) => i32::from(b),
    }
}

// =========================================================================
// FFI Types
// =========================================================================

#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiPlanType {
    LumpSum,
    Weekly,
    Biweekly,
    Monthly,
}

impl From<FfiPlanType> for PlanType {
    fn from(plan: FfiPlanType) -> Self {
        match plan {
            FfiPlanType::LumpSum => PlanType::LumpSum,
            FfiPlanType::Weekly => PlanType::Weekly,
            FfiPlanType::Biweekly => PlanType::Biweekly,
            FfiPlanType::Monthly => PlanType::Monthly,
        }
    }
}

#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiPaymentMethod {
    Cash,
    Card,
    Transfer,
    Other,
}

impl From<FfiPaymentMethod> for PaymentMethod {
    fn from(method: FfiPaymentMethod) -> Self {
        match method {
            FfiPaymentMethod::Cash => PaymentMethod::Cash,
            FfiPaymentMethod::Card => PaymentMethod::Card,
            FfiPaymentMethod::Transfer => PaymentMethod::Transfer,
            FfiPaymentMethod::Other => PaymentMethod::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiSurface {
    Vestibular,
    Lingual,
}

impl From<FfiSurface> for Surface {
    fn from(surface: FfiSurface) -> Self {
        match surface {
            FfiSurface::Vestibular => Surface::Vestibular,
            FfiSurface::Lingual => Surface::Lingual,
        }
    }
}

#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiSite {
    Mesial,
    Central,
    Distal,
}

impl From<FfiSite> for Site {
    fn from(site: FfiSite) -> Self {
        match site {
            FfiSite::Mesial => Site::Mesial,
            FfiSite::Central => Site::Central,
            FfiSite::Distal => Site::Distal,
        }
    }
}

#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiMeasurementKind {
    Margin,
    ProbingDepth,
    Bleeding,
    Plaque,
}

impl From<FfiMeasurementKind> for MeasurementKind {
    fn from(kind: FfiMeasurementKind) -> Self {
        match kind {
            FfiMeasurementKind::Margin => MeasurementKind::Margin,
            FfiMeasurementKind::ProbingDepth => MeasurementKind::ProbingDepth,
            FfiMeasurementKind::Bleeding => MeasurementKind::Bleeding,
            FfiMeasurementKind::Plaque => MeasurementKind::Plaque,
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub balance: f64,
    pub allergies: Option<String>,
    pub last_visit: Option<String>,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            first_name: patient.first_name,
            last_name: patient.last_name,
            phone: patient.phone,
            email: patient.email,
            balance: patient.balance,
            allergies: patient.allergies,
            last_visit: patient.last_visit,
        }
    }
}

/// FFI-safe catalog treatment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTreatment {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub code: Option<String>,
    pub active: bool,
}

impl From<Treatment> for FfiTreatment {
    fn from(t: Treatment) -> Self {
        Self {
            id: t.id,
            name: t.name,
            price: t.price,
            code: t.code,
            active: t.active,
        }
    }
}

impl From<FfiTreatment> for Treatment {
    fn from(t: FfiTreatment) -> Self {
        Treatment {
            id: t.id,
            name: t.name,
            price: t.price,
            code: t.code,
            active: t.active,
        }
    }
}

/// FFI-safe budget line item.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBudgetItem {
    pub treatment_id: Option<String>,
    pub name: String,
    pub price: f64,
    pub code: Option<String>,
    /// FDI tooth number
    pub tooth: Option<u8>,
}

impl TryFrom<FfiBudgetItem> for BudgetItem {
    type Error = OdontoError;

    fn try_from(item: FfiBudgetItem) -> Result<Self, Self::Error> {
        Ok(BudgetItem {
            treatment_id: item.treatment_id,
            name: item.name,
            price: item.price,
            code: item.code,
            tooth: item.tooth.map(ToothNumber::new).transpose()?,
        })
    }
}

impl From<BudgetItem> for FfiBudgetItem {
    fn from(item: BudgetItem) -> Self {
        Self {
            treatment_id: item.treatment_id,
            name: item.name,
            price: item.price,
            code: item.code,
            tooth: item.tooth.map(|t| t.number()),
        }
    }
}

/// FFI-safe payment breakdown.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPaymentBreakdown {
    pub subtotal: f64,
    pub interest_rate: f64,
    pub interest_amount: f64,
    pub final_total: f64,
    pub installment_count: u32,
    pub per_installment: f64,
}

impl From<FfiPaymentBreakdown> for models::PaymentBreakdown {
    fn from(b: FfiPaymentBreakdown) -> Self {
        models::PaymentBreakdown {
            subtotal: b.subtotal,
            interest_rate: b.interest_rate,
            interest_amount: b.interest_amount,
            final_total: b.final_total,
            installment_count: b.installment_count,
            per_installment: b.per_installment,
        }
    }
}

/// FFI-safe dated installment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInstallment {
    pub number: u32,
    /// YYYY-MM-DD
    pub due_date: String,
    pub amount: f64,
}

impl From<billing::Installment> for FfiInstallment {
    fn from(i: billing::Installment) -> Self {
        Self {
            number: i.number,
            due_date: i.due_date.to_string(),
            amount: i.amount,
        }
    }
}

impl From<models::PaymentBreakdown> for FfiPaymentBreakdown {
    fn from(b: models::PaymentBreakdown) -> Self {
        Self {
            subtotal: b.subtotal,
            interest_rate: b.interest_rate,
            interest_amount: b.interest_amount,
            final_total: b.final_total,
            installment_count: b.installment_count,
            per_installment: b.per_installment,
        }
    }
}

/// FFI-safe budget.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBudget {
    pub id: String,
    pub patient: String,
    pub items: Vec<FfiBudgetItem>,
    pub total: f64,
    pub status: String,
    pub amount_due: f64,
    pub paid_total: f64,
    pub outstanding: f64,
    pub plan: Option<FfiPaymentBreakdown>,
}

impl From<Budget> for FfiBudget {
    fn from(budget: Budget) -> Self {
        Self {
            amount_due: budget.amount_due(),
            paid_total: budget.paid_total(),
            outstanding: budget.outstanding(),
            status: budget.status.as_str().to_string(),
            plan: budget.plan.map(|p| p.breakdown.into()),
            items: budget.items.into_iter().map(|i| i.into()).collect(),
            id: budget.id,
            patient: budget.patient,
            total: budget.total,
        }
    }
}

/// FFI-safe budget status change.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBudgetTransition {
    pub budget: FfiBudget,
    pub balance_delta: f64,
    pub patient_balance: f64,
}

impl From<BudgetTransition> for FfiBudgetTransition {
    fn from(t: BudgetTransition) -> Self {
        Self {
            budget: t.budget.into(),
            balance_delta: t.balance_delta,
            patient_balance: t.patient_balance,
        }
    }
}

/// FFI-safe reconciliation report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLedgerReport {
    pub patient: String,
    pub recorded_balance: f64,
    pub ledger_balance: f64,
    pub drift: f64,
    pub chain_intact: bool,
    pub compensated: bool,
}

impl From<LedgerReport> for FfiLedgerReport {
    fn from(r: LedgerReport) -> Self {
        Self {
            chain_intact: r.chain_intact(),
            compensated: r.compensation.is_some(),
            patient: r.patient,
            recorded_balance: r.recorded_balance,
            ledger_balance: r.ledger_balance,
            drift: r.drift,
        }
    }
}

/// FFI-safe chart statistics (rounded percentages).
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiChartStatistics {
    pub total_sites: u32,
    pub bleeding_percent: u32,
    pub plaque_percent: u32,
    pub pocket_percent: u32,
}

impl From<SiteStatistics> for FfiChartStatistics {
    fn from(stats: SiteStatistics) -> Self {
        let (bleeding, plaque, pocket) = stats.rounded_percentages();
        Self {
            total_sites: stats.total_sites,
            bleeding_percent: bleeding,
            plaque_percent: plaque,
            pocket_percent: pocket,
        }
    }
}

/// FFI-safe surface plot.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSurfacePlot {
    pub tooth: u8,
    pub zero_line_y: f64,
    pub margin_path: String,
    pub probing_depth_path: String,
    /// Fill color of each probing depth point, mesial to distal
    pub probing_depth_colors: Vec<String>,
}

impl From<chart::SurfacePlot> for FfiSurfacePlot {
    fn from(plot: chart::SurfacePlot) -> Self {
        Self {
            tooth: plot.tooth.number(),
            zero_line_y: plot.zero_line_y,
            margin_path: plot.margin.svg_path(),
            probing_depth_path: plot.probing_depth.svg_path(),
            probing_depth_colors: plot
                .probing_depth
                .points
                .iter()
                .map(|p| p.fill.color().to_string())
                .collect(),
        }
    }
}

/// FFI-safe prescription line.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiPrescription {
    pub name: String,
    pub dose: String,
    pub frequency: String,
    pub duration: String,
}

impl From<Prescription> for FfiPrescription {
    fn from(m: Prescription) -> Self {
        Self {
            name: m.name,
            dose: m.dose,
            frequency: m.frequency,
            duration: m.duration,
        }
    }
}

impl From<FfiPrescription> for Prescription {
    fn from(m: FfiPrescription) -> Self {
        Prescription {
            name: m.name,
            dose: m.dose,
            frequency: m.frequency,
            duration: m.duration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiTreatmentStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl From<FfiTreatmentStatus> for TreatmentStatus {
    fn from(status: FfiTreatmentStatus) -> Self {
        match status {
            FfiTreatmentStatus::Planned => TreatmentStatus::Planned,
            FfiTreatmentStatus::InProgress => TreatmentStatus::InProgress,
            FfiTreatmentStatus::Completed => TreatmentStatus::Completed,
            FfiTreatmentStatus::Cancelled => TreatmentStatus::Cancelled,
        }
    }
}

impl From<TreatmentStatus> for FfiTreatmentStatus {
    fn from(status: TreatmentStatus) -> Self {
        match status {
            TreatmentStatus::Planned => FfiTreatmentStatus::Planned,
            TreatmentStatus::InProgress => FfiTreatmentStatus::InProgress,
            TreatmentStatus::Completed => FfiTreatmentStatus::Completed,
            TreatmentStatus::Cancelled => FfiTreatmentStatus::Cancelled,
        }
    }
}

/// FFI-safe treatment annotation on a tooth.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiToothTreatment {
    pub tooth: u8,
    pub treatment_id: String,
    pub treatment_name: String,
    pub price: f64,
    pub code: Option<String>,
    pub date: String,
    pub status: FfiTreatmentStatus,
    /// Chart highlight color, if the status has one
    pub highlight: Option<String>,
}

impl FfiToothTreatment {
    fn new(tooth: ToothNumber, t: ToothTreatment) -> Self {
        Self {
            tooth: tooth.number(),
            highlight: t.status.highlight().map(str::to_string),
            status: t.status.into(),
            treatment_id: t.treatment_id,
            treatment_name: t.treatment_name,
            price: t.price,
            code: t.code,
            date: t.date,
        }
    }
}

/// FFI-safe odontogram.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOdontogram {
    /// Selected FDI tooth numbers, ascending
    pub selected: Vec<u8>,
    pub annotations: Vec<FfiToothTreatment>,
}

impl From<&OdontogramSelection> for FfiOdontogram {
    fn from(odontogram: &OdontogramSelection) -> Self {
        Self {
            selected: odontogram.selected().map(|t| t.number()).collect(),
            annotations: odontogram
                .annotations()
                .map(|(tooth, t)| FfiToothTreatment::new(tooth, t.clone()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiAppointmentStatus {
    Scheduled,
    Confirmed,
    Attended,
    Completed,
    Cancelled,
    NoShow,
}

impl From<FfiAppointmentStatus> for AppointmentStatus {
    fn from(status: FfiAppointmentStatus) -> Self {
        match status {
            FfiAppointmentStatus::Scheduled => AppointmentStatus::Scheduled,
            FfiAppointmentStatus::Confirmed => AppointmentStatus::Confirmed,
            FfiAppointmentStatus::Attended => AppointmentStatus::Attended,
            FfiAppointmentStatus::Completed => AppointmentStatus::Completed,
            FfiAppointmentStatus::Cancelled => AppointmentStatus::Cancelled,
            FfiAppointmentStatus::NoShow => AppointmentStatus::NoShow,
        }
    }
}

impl From<AppointmentStatus> for FfiAppointmentStatus {
    fn from(status: AppointmentStatus) -> Self {
        match status {
            AppointmentStatus::Scheduled => FfiAppointmentStatus::Scheduled,
            AppointmentStatus::Confirmed => FfiAppointmentStatus::Confirmed,
            AppointmentStatus::Attended => FfiAppointmentStatus::Attended,
            AppointmentStatus::Completed => FfiAppointmentStatus::Completed,
            AppointmentStatus::Cancelled => FfiAppointmentStatus::Cancelled,
            AppointmentStatus::NoShow => FfiAppointmentStatus::NoShow,
        }
    }
}

/// FFI-safe appointment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointment {
    pub id: String,
    pub patient_id: Option<String>,
    pub patient_name: String,
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM
    pub time: String,
    pub duration_minutes: u32,
    pub reason: String,
    pub notes: String,
    pub status: FfiAppointmentStatus,
    pub color: String,
    pub consultation_completed: bool,
}

impl From<Appointment> for FfiAppointment {
    fn from(a: Appointment) -> Self {
        Self {
            date: a.date.to_string(),
            time: a.time.format("%H:%M").to_string(),
            color: a.status.color().to_string(),
            status: a.status.into(),
            id: a.id,
            patient_id: a.patient,
            patient_name: a.patient_name,
            duration_minutes: a.duration_minutes,
            reason: a.reason,
            notes: a.notes,
            consultation_completed: a.consultation_completed,
        }
    }
}

/// FFI-safe consultation.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiConsultation {
    pub patient_id: String,
    /// Set for follow-ups
    pub parent_id: Option<String>,
    pub chief_complaint: String,
    pub diagnosis: String,
    pub treatment_plan: String,
    pub notes: String,
    pub studies: String,
    pub systolic: Option<u32>,
    pub diastolic: Option<u32>,
    pub heart_rate: Option<u32>,
    /// Degrees Celsius
    pub temperature: Option<f64>,
    pub spo2: Option<u32>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub medications: Vec<FfiPrescription>,
}

impl From<Consultation> for FfiConsultation {
    fn from(c: Consultation) -> Self {
        let vitals = c.vital_signs;
        Self {
            patient_id: c.patient,
            parent_id: c.parent_id,
            chief_complaint: c.chief_complaint,
            diagnosis: c.diagnosis,
            treatment_plan: c.treatment_plan,
            notes: c.notes,
            studies: c.studies,
            systolic: vitals.systolic,
            diastolic: vitals.diastolic,
            heart_rate: vitals.heart_rate,
            temperature: vitals.temperature,
            spo2: vitals.spo2,
            weight_kg: vitals.weight_kg,
            height_cm: vitals.height_cm,
            medications: c.medications.into_iter().map(|m| m.into()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> Arc<OdontoCore> {
        open_database_in_memory().unwrap()
    }

    #[test]
    fn test_budget_flow_through_ffi() {
        let core = core();
        let patient = core.create_patient("Ana".into(), "Martínez".into()).unwrap();

        let budget = core
            .create_budget(
                patient.id.clone(),
                vec![FfiBudgetItem {
                    treatment_id: None,
                    name: "Corona".into(),
                    price: 1200.0,
                    code: None,
                    tooth: Some(16),
                }],
            )
            .unwrap();
        let budget = core
            .set_budget_plan(budget.id, FfiPlanType::Monthly, 6, 10.0)
            .unwrap();
        assert!((budget.amount_due - 1320.0).abs() < 1e-9);

        let t = core.accept_budget(budget.id.clone()).unwrap();
        assert_eq!(t.budget.status, "accepted");
        let t = core
            .register_payment(budget.id.clone(), 1320.0, FfiPaymentMethod::Cash)
            .unwrap();
        assert_eq!(t.budget.status, "paid");
        assert!(t.patient_balance.abs() < 1e-9);

        let report = core.reconcile_balance(patient.id).unwrap();
        assert!(report.chain_intact);
        assert!(!report.compensated);
    }

    #[test]
    fn test_error_classification() {
        let core = core();
        let err = core.accept_budget("missing".into()).unwrap_err();
        assert!(matches!(err, OdontoError::NotFound(_)));

        let err = calculate_payment(100.0, FfiPlanType::Weekly, 0, 0.0).unwrap_err();
        assert!(matches!(err, OdontoError::Validation(_)));

        let err = core
            .create_budget(
                "p".into(),
                vec![FfiBudgetItem {
                    treatment_id: None,
                    name: "X".into(),
                    price: 1.0,
                    code: None,
                    tooth: Some(19),
                }],
            )
            .unwrap_err();
        assert!(matches!(err, OdontoError::Validation(_)));

        let err = open_with_config("/nonexistent/odonto.toml".into()).err().unwrap();
        assert!(matches!(err, OdontoError::Config(_)));
    }

    #[test]
    fn test_chart_through_ffi() {
        let core = core();
        let p = "patient-1".to_string();

        let stored = core
            .set_chart_value(p.clone(), 11, FfiSurface::Vestibular, FfiSite::Mesial, FfiMeasurementKind::ProbingDepth, 40)
            .unwrap();
        assert_eq!(stored, 15);

        let wrapped = core
            .step_chart_value(p.clone(), 11, FfiSurface::Vestibular, FfiSite::Mesial, FfiMeasurementKind::ProbingDepth, true)
            .unwrap();
        assert_eq!(wrapped, 0);

        core.set_chart_value(p.clone(), 11, FfiSurface::Vestibular, FfiSite::Central, FfiMeasurementKind::Bleeding, 1)
            .unwrap();
        let stats = core.chart_statistics(p.clone()).unwrap();
        assert_eq!(stats.total_sites, 192);
        assert_eq!(stats.bleeding_percent, 1);

        let plot = core.plot_surface(p.clone(), 11, FfiSurface::Vestibular).unwrap().unwrap();
        assert_eq!(plot.margin_path, "M 8 65 L 27.5 65 L 47 65");

        assert!(core.toggle_tooth_absent(p.clone(), 11).unwrap());
        assert!(core.plot_surface(p.clone(), 11, FfiSurface::Vestibular).unwrap().is_none());
        assert!(core.set_chart_value(p, 19, FfiSurface::Lingual, FfiSite::Distal, FfiMeasurementKind::Margin, 1).is_err());
    }

    #[test]
    fn test_consultation_remembers_medications() {
        let core = core();
        let patient = core.create_patient("Luis".into(), "Pérez".into()).unwrap();

        let input = FfiConsultation {
            patient_id: patient.id.clone(),
            parent_id: None,
            chief_complaint: "Dolor en molar".into(),
            diagnosis: "Pulpitis".into(),
            treatment_plan: "Endodoncia".into(),
            notes: String::new(),
            studies: String::new(),
            systolic: None,
            diastolic: None,
            heart_rate: None,
            temperature: None,
            spo2: None,
            weight_kg: Some(70.0),
            height_cm: Some(175.0),
            medications: vec![FfiPrescription {
                name: "Ibuprofeno".into(),
                dose: "400 mg".into(),
                frequency: "cada 8 h".into(),
                duration: "3 días".into(),
            }],
        };
        let id = core.record_consultation(input.clone()).unwrap();

        let follow_up = FfiConsultation {
            parent_id: Some(id),
            chief_complaint: String::new(),
            medications: vec![],
            ..input
        };
        core.record_consultation(follow_up).unwrap();

        let suggestions = core.suggest_medications("ibu".into(), 5).unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].dose, "400 mg");

        let patient = core.get_patient(patient.id).unwrap().unwrap();
        assert!(patient.last_visit.is_some());
    }

    #[test]
    fn test_chart_edits_stay_unsaved_until_saved() {
        let core = core();
        let p = "patient-2".to_string();
        let stored = |core: &OdontoCore| {
            core.db
                .lock()
                .unwrap()
                .records()
                .find(db::PERIODONTOGRAMS_COLLECTION, "patient-2")
                .unwrap()
        };

        core.set_chart_value(p.clone(), 21, FfiSurface::Lingual, FfiSite::Central, FfiMeasurementKind::Margin, 3)
            .unwrap();
        assert!(core.is_chart_modified(p.clone()).unwrap());
        assert!(stored(&core).is_none());

        assert!(core.save_periodontal_chart(p.clone()).unwrap());
        assert!(!core.is_chart_modified(p.clone()).unwrap());
        assert!(stored(&core).is_some());
        assert!(!core.save_periodontal_chart(p.clone()).unwrap());

        core.set_chart_value(p.clone(), 21, FfiSurface::Lingual, FfiSite::Central, FfiMeasurementKind::Margin, -5)
            .unwrap();
        core.discard_chart_changes(p.clone()).unwrap();
        assert!(!core.is_chart_modified(p.clone()).unwrap());
        let json = core.periodontal_chart_json(p).unwrap();
        let chart: PeriodontalChart = serde_json::from_str(&json).unwrap();
        let tooth = ToothNumber::new(21).unwrap();
        assert_eq!(
            chart.value(tooth, Surface::Lingual, Site::Central, MeasurementKind::Margin),
            Measurement::Margin(3)
        );
    }

    #[test]
    fn test_odontogram_budget_through_ffi() {
        let core = core();
        let patient = core.create_patient("Marta".into(), "Gil".into()).unwrap();
        core.upsert_treatment(FfiTreatment {
            id: "t-crown".into(),
            name: "Corona".into(),
            price: 1200.0,
            code: Some("COR".into()),
            active: true,
        })
        .unwrap();

        assert!(core.toggle_tooth_selection(patient.id.clone(), 16).unwrap());
        let note = core
            .annotate_tooth(patient.id.clone(), 16, "t-crown".into())
            .unwrap();
        assert_eq!(note.status, FfiTreatmentStatus::Planned);
        assert_eq!(note.highlight.as_deref(), Some("blue"));
        assert!(matches!(
            core.annotate_tooth(patient.id.clone(), 16, "missing".into()).unwrap_err(),
            OdontoError::NotFound(_)
        ));

        assert!(core.is_odontogram_modified(patient.id.clone()).unwrap());
        assert!(core.save_odontogram(patient.id.clone()).unwrap());
        core.discard_odontogram_changes(patient.id.clone()).unwrap();
        let reloaded = core.odontogram(patient.id.clone()).unwrap();
        assert_eq!(reloaded.selected, vec![16]);
        assert_eq!(reloaded.annotations[0].treatment_name, "Corona");

        let budget = core.create_budget_from_odontogram(patient.id.clone()).unwrap();
        assert_eq!(budget.total, 1200.0);
        assert_eq!(budget.items[0].tooth, Some(16));

        core.set_budget_plan(budget.id.clone(), FfiPlanType::Weekly, 4, 0.0)
            .unwrap();
        let schedule = core.budget_schedule(budget.id).unwrap();
        assert_eq!(schedule.len(), 4);
        assert!(schedule.iter().all(|i| (i.amount - 300.0).abs() < 1e-9));

        let breakdown = calculate_payment(1000.0, FfiPlanType::Monthly, 3, 0.0).unwrap();
        let schedule = payment_schedule(breakdown, FfiPlanType::Monthly, "2026-01-31".into()).unwrap();
        assert_eq!(schedule[1].due_date, "2026-02-28");
        assert!((schedule[2].amount - 333.34).abs() < 1e-9);
    }

    #[test]
    fn test_consultation_completes_todays_appointment() {
        let core = core();
        let patient = core.create_patient("Rosa".into(), "Vega".into()).unwrap();
        let today = chrono::Utc::now().date_naive().to_string();

        let appt = core
            .schedule_appointment(patient.id.clone(), today.clone(), "09:30".into(), None, None)
            .unwrap();
        assert_eq!(appt.status, FfiAppointmentStatus::Scheduled);
        assert_eq!(appt.duration_minutes, 30);
        assert!(matches!(
            core.schedule_appointment(patient.id.clone(), "tomorrow".into(), "09:30".into(), None, None)
                .unwrap_err(),
            OdontoError::Validation(_)
        ));

        let input = FfiConsultation {
            patient_id: patient.id.clone(),
            parent_id: None,
            chief_complaint: "Revisión".into(),
            diagnosis: String::new(),
            treatment_plan: String::new(),
            notes: String::new(),
            studies: String::new(),
            systolic: None,
            diastolic: None,
            heart_rate: None,
            temperature: None,
            spo2: None,
            weight_kg: None,
            height_cm: None,
            medications: vec![],
        };
        core.record_consultation(input).unwrap();

        let day = core.appointments_on(today).unwrap();
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].id, appt.id);
        assert_eq!(day[0].status, FfiAppointmentStatus::Completed);
        assert!(day[0].consultation_completed);

        let cancelled = core
            .set_appointment_status(appt.id, FfiAppointmentStatus::Cancelled)
            .unwrap();
        assert_eq!(cancelled.color, "#ef4444");
    }

    #[test]
    fn test_consultation_round_trip_keeps_vitals_and_studies() {
        let core = core();
        let patient = core.create_patient("Iván".into(), "Soto".into()).unwrap();
        let input = FfiConsultation {
            patient_id: patient.id,
            parent_id: None,
            chief_complaint: "Sensibilidad".into(),
            diagnosis: "Caries".into(),
            treatment_plan: "Resina".into(),
            notes: "Control en 6 meses".into(),
            studies: "Radiografía periapical".into(),
            systolic: Some(118),
            diastolic: Some(76),
            heart_rate: Some(68),
            temperature: Some(36.7),
            spo2: Some(97),
            weight_kg: Some(80.5),
            height_cm: Some(180.0),
            medications: vec![],
        };

        let id = core.record_consultation(input.clone()).unwrap();
        let stored = core.get_consultation(id).unwrap().unwrap();
        assert_eq!(stored, input);
        assert!(core.get_consultation("missing".into()).unwrap().is_none());
    }
}
