use crate::db::KeyValueStore;
use crate::error::{StoreError, StoreResult};
use crate::model::{
    now_iso, new_id, DataScheme, SchemeConfigPatch, SchemeStorageData, Seat, Student,
    StudentGroup, DEFAULT_SCHEME_NAME, MAX_GRID_SIDE, SCHEME_STORAGE_KEY, SCHEME_VERSION,
};
use serde::Serialize;
use tracing::{error, info, warn};

/// Above this serialized size a save still goes through but is flagged.
pub const MAX_STORAGE_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub bytes: usize,
    pub oversized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    pub used_bytes: usize,
    pub available: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeRef<'a> {
    schemes: &'a [DataScheme],
    active_scheme_id: Option<&'a str>,
    version: u32,
}

pub struct SchemeStore {
    storage: Box<dyn KeyValueStore>,
    schemes: Vec<DataScheme>,
    active_id: Option<String>,
    switching: bool,
}

fn check_dims(scheme: &DataScheme) -> StoreResult<()> {
    let seat = &scheme.config.seat;
    if seat.has_valid_dims() {
        return Ok(());
    }
    warn!(rows = seat.rows, cols = seat.cols, "rejected scheme with out-of-range grid");
    Err(StoreError::InvalidPayload(format!(
        "grid size {}x{} is outside 1..={}",
        seat.rows, seat.cols, MAX_GRID_SIDE
    )))
}

impl SchemeStore {
    /// Opens the store and loads the persisted envelope (see [`SchemeStore::load`]).
    pub fn open(storage: Box<dyn KeyValueStore>) -> Self {
        let mut store = Self {
            storage,
            schemes: Vec::new(),
            active_id: None,
            switching: false,
        };
        store.load();
        store
    }

    /// Reads the envelope. Absent, corrupt or empty envelopes are replaced by a
    /// single default scheme. Afterwards there is always an active scheme.
    pub fn load(&mut self) {
        self.schemes.clear();
        self.active_id = None;

        match self.storage.get(SCHEME_STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<SchemeStorageData>(&raw) {
                Ok(envelope) => {
                    if envelope.version > SCHEME_VERSION {
                        warn!(
                            stored = envelope.version,
                            supported = SCHEME_VERSION,
                            "scheme envelope written by a newer version"
                        );
                    }
                    self.schemes = envelope.schemes;
                    self.active_id = envelope.active_scheme_id;
                    for scheme in &mut self.schemes {
                        if !scheme.config.seat.has_valid_dims() {
                            warn!(
                                scheme_id = %scheme.id,
                                rows = scheme.config.seat.rows,
                                cols = scheme.config.seat.cols,
                                "stored grid size out of range, clamping"
                            );
                            scheme.config.seat.clamp_dims();
                        }
                    }
                }
                Err(e) => warn!(error = %e, "stored scheme envelope is corrupt, starting fresh"),
            },
            Ok(None) => {}
            Err(e) => error!(error = %e, "scheme storage unavailable"),
        }

        if self.schemes.is_empty() {
            let scheme = DataScheme::empty(DEFAULT_SCHEME_NAME, None);
            info!(scheme_id = %scheme.id, "created default scheme");
            self.active_id = Some(scheme.id.clone());
            self.schemes.push(scheme);
            let _ = self.save();
        }

        self.repair_active_pointer();
    }

    fn repair_active_pointer(&mut self) {
        let valid = self
            .active_id
            .as_deref()
            .map(|id| self.schemes.iter().any(|s| s.id == id))
            .unwrap_or(false);
        if !valid {
            self.active_id = self.schemes.first().map(|s| s.id.clone());
        }
    }

    /// Serializes and writes the whole envelope. Failures are logged and
    /// returned; the in-memory state is kept either way.
    pub fn save(&mut self) -> StoreResult<SaveReport> {
        let envelope = EnvelopeRef {
            schemes: &self.schemes,
            active_scheme_id: self.active_id.as_deref(),
            version: SCHEME_VERSION,
        };
        let serialized = serde_json::to_string(&envelope).map_err(|e| {
            error!(error = %e, "failed to serialize scheme envelope");
            StoreError::Storage(e.to_string())
        })?;

        let bytes = serialized.len();
        let oversized = bytes > MAX_STORAGE_BYTES;
        if oversized {
            warn!(
                size_mb = %format!("{:.2}", bytes as f64 / (1024.0 * 1024.0)),
                "scheme data is large, consider deleting old schemes"
            );
        }

        self.storage
            .set(SCHEME_STORAGE_KEY, &serialized)
            .map_err(|e| {
                error!(error = %e, "failed to persist schemes");
                StoreError::Storage(e.to_string())
            })?;

        Ok(SaveReport { bytes, oversized })
    }

    fn persist(&mut self) -> StoreResult<()> {
        self.save().map(|_| ())
    }

    pub fn list(&self) -> &[DataScheme] {
        &self.schemes
    }

    pub fn get(&self, id: &str) -> Option<&DataScheme> {
        self.schemes.iter().find(|s| s.id == id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&DataScheme> {
        self.active_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn is_switching(&self) -> bool {
        self.switching
    }

    pub fn finish_switch(&mut self) {
        self.switching = false;
    }

    fn find_mut(&mut self, id: &str) -> StoreResult<&mut DataScheme> {
        self.schemes
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::not_found("scheme", id))
    }

    pub fn create(&mut self, name: &str, description: Option<String>) -> StoreResult<DataScheme> {
        let scheme = DataScheme::empty(name, description);
        info!(scheme_id = %scheme.id, name, "scheme created");
        self.schemes.push(scheme.clone());
        self.persist()?;
        Ok(scheme)
    }

    pub fn delete(&mut self, id: &str) -> StoreResult<DataScheme> {
        let Some(index) = self.schemes.iter().position(|s| s.id == id) else {
            return Err(StoreError::not_found("scheme", id));
        };
        if self.schemes.len() == 1 {
            warn!(scheme_id = id, "refusing to delete the last scheme");
            return Err(StoreError::LastScheme);
        }

        let removed = self.schemes.remove(index);
        if self.active_id.as_deref() == Some(id) {
            self.active_id = self.schemes.first().map(|s| s.id.clone());
        }
        info!(scheme_id = id, "scheme deleted");
        self.persist()?;
        Ok(removed)
    }

    pub fn rename(&mut self, id: &str, name: &str) -> StoreResult<DataScheme> {
        let scheme = self.find_mut(id)?;
        scheme.name = name.to_string();
        scheme.updated_at = now_iso();
        let out = scheme.clone();
        self.persist()?;
        Ok(out)
    }

    pub fn update_description(&mut self, id: &str, description: &str) -> StoreResult<DataScheme> {
        let scheme = self.find_mut(id)?;
        scheme.description = Some(description.to_string());
        scheme.updated_at = now_iso();
        let out = scheme.clone();
        self.persist()?;
        Ok(out)
    }

    pub fn duplicate(&mut self, id: &str, new_name: Option<&str>) -> StoreResult<DataScheme> {
        let copy = self
            .get(id)
            .ok_or_else(|| StoreError::not_found("scheme", id))?
            .duplicate(new_name);
        self.schemes.push(copy.clone());
        self.persist()?;
        Ok(copy)
    }

    /// Moves the active pointer. The caller re-hydrates its views and then
    /// calls [`SchemeStore::finish_switch`].
    pub fn switch_active(&mut self, id: &str) -> StoreResult<DataScheme> {
        let scheme = self
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("scheme", id))?;
        self.switching = true;
        self.active_id = Some(id.to_string());
        info!(scheme_id = id, name = %scheme.name, "switched active scheme");
        self.persist()?;
        Ok(scheme)
    }

    fn with_active<F>(&mut self, f: F) -> StoreResult<()>
    where
        F: FnOnce(&mut DataScheme),
    {
        let id = self
            .active_id
            .clone()
            .ok_or_else(|| StoreError::not_found("scheme", ""))?;
        let scheme = self.find_mut(&id)?;
        f(scheme);
        scheme.updated_at = now_iso();
        self.persist()
    }

    pub fn update_active_config(&mut self, patch: SchemeConfigPatch) -> StoreResult<()> {
        self.with_active(|s| {
            if let Some(seat) = patch.seat {
                s.config.seat = seat;
            }
            if let Some(export) = patch.export {
                s.config.export = export;
            }
            if let Some(show) = patch.show_podium {
                s.config.show_podium = show;
            }
        })
    }

    pub fn update_active_students(&mut self, students: &[Student]) -> StoreResult<()> {
        self.with_active(|s| s.students = students.to_vec())
    }

    pub fn update_active_seats(&mut self, seats: &[Seat]) -> StoreResult<()> {
        self.with_active(|s| s.seats = seats.to_vec())
    }

    pub fn update_active_groups(&mut self, groups: &[StudentGroup]) -> StoreResult<()> {
        self.with_active(|s| s.groups = groups.to_vec())
    }

    /// Commits all three collections with a single write.
    pub fn save_current_data(
        &mut self,
        students: &[Student],
        seats: &[Seat],
        groups: &[StudentGroup],
    ) -> StoreResult<()> {
        self.with_active(|s| {
            s.students = students.to_vec();
            s.seats = seats.to_vec();
            s.groups = groups.to_vec();
        })
    }

    pub fn export(&self, id: &str) -> Option<String> {
        let scheme = self.get(id)?;
        match serde_json::to_string(scheme) {
            Ok(v) => Some(v),
            Err(e) => {
                error!(error = %e, scheme_id = id, "failed to serialize scheme");
                None
            }
        }
    }

    /// Adds a scheme from an exported payload under a fresh identity; any id
    /// in the payload is ignored.
    pub fn import(&mut self, raw: &str) -> StoreResult<DataScheme> {
        let mut scheme: DataScheme = serde_json::from_str(raw).map_err(|e| {
            warn!(error = %e, "rejected scheme import");
            StoreError::InvalidPayload(e.to_string())
        })?;
        check_dims(&scheme)?;
        let now = now_iso();
        scheme.id = new_id("scheme");
        scheme.created_at = now.clone();
        scheme.updated_at = now;
        scheme.version = SCHEME_VERSION;
        info!(scheme_id = %scheme.id, name = %scheme.name, "scheme imported");
        self.schemes.push(scheme.clone());
        self.persist()?;
        Ok(scheme)
    }

    /// Replaces every scheme, e.g. when restoring a workspace bundle.
    pub fn replace_envelope(&mut self, envelope: SchemeStorageData) -> StoreResult<()> {
        if envelope.schemes.is_empty() {
            return Err(StoreError::InvalidPayload("bundle contains no schemes".into()));
        }
        for scheme in &envelope.schemes {
            check_dims(scheme)?;
        }
        self.schemes = envelope.schemes;
        self.active_id = envelope.active_scheme_id;
        self.repair_active_pointer();
        self.persist()
    }

    pub fn envelope(&self) -> SchemeStorageData {
        SchemeStorageData {
            schemes: self.schemes.clone(),
            active_scheme_id: self.active_id.clone(),
            version: SCHEME_VERSION,
        }
    }

    pub fn storage_usage(&self) -> StorageUsage {
        match self.storage.get(SCHEME_STORAGE_KEY) {
            Ok(v) => StorageUsage {
                used_bytes: v.map(|s| s.len()).unwrap_or(0),
                available: true,
            },
            Err(_) => StorageUsage {
                used_bytes: 0,
                available: false,
            },
        }
    }

    pub fn reset(&mut self) -> StoreResult<()> {
        let scheme = DataScheme::empty(DEFAULT_SCHEME_NAME, None);
        self.active_id = Some(scheme.id.clone());
        self.schemes = vec![scheme];
        self.persist()
    }
}
