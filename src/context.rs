use crate::arrange::{self, Assignment};
use crate::db::KeyValueStore;
use crate::error::{StoreError, StoreResult};
use crate::export::{self, ExportSnapshot, GroupListing, ListingField};
use crate::grid::SeatGrid;
use crate::groups::GroupManager;
use crate::model::{
    ArrangeRule, DataScheme, ExportConfig, ExportConfigPatch, NewStudent, SchemeConfig,
    SchemeConfigPatch, SchemeStorageData, SeatConfig, SeatConfigPatch, Student, StudentGroup,
    StudentPatch,
};
use crate::roster::Roster;
use crate::schemes::{SchemeStore, StorageUsage};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSummary {
    pub active_scheme_id: Option<String>,
    pub active_scheme_name: Option<String>,
    pub scheme_count: usize,
    pub switching: bool,
    pub student_count: usize,
    pub seated_count: usize,
    pub unseated_count: usize,
    pub rows: u32,
    pub cols: u32,
    pub empty_seat_count: usize,
    pub group_count: usize,
    pub can_undo: bool,
    pub can_redo: bool,
    pub storage: StorageUsage,
}

/// The active scheme's working set. Every intent mutates the in-memory
/// components first and then commits the touched collections back into the
/// active scheme, which persists them.
pub struct SeatingContext {
    schemes: SchemeStore,
    roster: Roster,
    grid: SeatGrid,
    groups: GroupManager,
}

impl SeatingContext {
    pub fn open(storage: Box<dyn KeyValueStore>) -> Self {
        let mut ctx = Self {
            schemes: SchemeStore::open(storage),
            roster: Roster::default(),
            grid: SeatGrid::default(),
            groups: GroupManager::default(),
        };
        ctx.on_active_scheme_changed();
        ctx
    }

    /// Re-hydrates roster, grid and groups from whatever scheme is active now.
    pub fn on_active_scheme_changed(&mut self) {
        let active = self.schemes.active();
        self.roster.sync_from_scheme(active);
        self.grid.sync_from_scheme(active);
        self.groups.sync_from_scheme(active);
        self.reconcile_pointers();
        self.schemes.finish_switch();
    }

    /// Makes student seat pointers agree with the grid after loading. The grid
    /// wins; occupants that are unknown or seated twice are dropped.
    fn reconcile_pointers(&mut self) {
        let mut seen = HashSet::new();
        let stray: Vec<(String, bool)> = self
            .grid
            .seats()
            .iter()
            .filter(|s| match s.student_id.as_deref() {
                Some(sid) => !self.roster.contains(sid) || !seen.insert(sid.to_string()),
                None => false,
            })
            .map(|s| (s.id.clone(), s.is_locked))
            .collect();
        for (seat_id, locked) in &stray {
            let _ = self.grid.force_set(seat_id, None, *locked);
        }
        if !stray.is_empty() {
            warn!(count = stray.len(), "dropped dangling seat occupants");
        }

        self.roster.clear_all_seated();
        let placed: Vec<(String, String)> = self
            .grid
            .seats()
            .iter()
            .filter_map(|s| s.student_id.clone().map(|sid| (sid, s.id.clone())))
            .collect();
        for (sid, seat_id) in placed {
            let _ = self.roster.set_seated(&sid, Some(&seat_id));
        }
    }

    fn commit_students(&mut self) -> StoreResult<()> {
        self.schemes.update_active_students(self.roster.students())
    }

    fn commit_seats(&mut self) -> StoreResult<()> {
        self.schemes.update_active_seats(&self.grid.persisted_seats())
    }

    fn commit_groups(&mut self) -> StoreResult<()> {
        self.schemes.update_active_groups(self.groups.groups())
    }

    fn commit_all(&mut self) -> StoreResult<()> {
        let seats = self.grid.persisted_seats();
        self.schemes
            .save_current_data(self.roster.students(), &seats, self.groups.groups())
    }

    /// Runs a scheme-store operation and re-hydrates if it moved the active
    /// pointer (or `force` is set). Re-hydration happens even when the
    /// operation's write failed, since the in-memory pointer already moved.
    fn with_schemes<T, F>(&mut self, force: bool, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut SchemeStore) -> StoreResult<T>,
    {
        let before = self.schemes.active_id().map(str::to_string);
        let out = f(&mut self.schemes);
        if force || self.schemes.is_switching() || self.schemes.active_id() != before.as_deref() {
            self.on_active_scheme_changed();
        }
        out
    }

    // ---- queries ----

    pub fn schemes(&self) -> &SchemeStore {
        &self.schemes
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn grid(&self) -> &SeatGrid {
        &self.grid
    }

    pub fn groups(&self) -> &GroupManager {
        &self.groups
    }

    pub fn active_config(&self) -> StoreResult<&SchemeConfig> {
        self.schemes
            .active()
            .map(|s| &s.config)
            .ok_or_else(|| StoreError::not_found("scheme", ""))
    }

    pub fn summary(&self) -> StateSummary {
        let active = self.schemes.active();
        StateSummary {
            active_scheme_id: active.map(|s| s.id.clone()),
            active_scheme_name: active.map(|s| s.name.clone()),
            scheme_count: self.schemes.list().len(),
            switching: self.schemes.is_switching(),
            student_count: self.roster.students().len(),
            seated_count: self.roster.seated().len(),
            unseated_count: self.roster.unseated().len(),
            rows: self.grid.rows(),
            cols: self.grid.cols(),
            empty_seat_count: self.grid.empty_seats().len(),
            group_count: self.groups.groups().len(),
            can_undo: self.groups.can_undo(),
            can_redo: self.groups.can_redo(),
            storage: self.schemes.storage_usage(),
        }
    }

    pub fn export_snapshot(&self, fields: Option<Vec<ListingField>>) -> StoreResult<ExportSnapshot> {
        let config = self.active_config()?;
        Ok(export::seat_chart(
            self.roster.students(),
            &self.grid,
            config,
            fields,
        ))
    }

    pub fn group_listing(&self, fields: &[ListingField]) -> GroupListing {
        export::group_listing(&self.groups, self.roster.students(), fields)
    }

    // ---- schemes ----

    pub fn create_scheme(&mut self, name: &str, description: Option<String>) -> StoreResult<DataScheme> {
        self.schemes.create(name, description)
    }

    pub fn delete_scheme(&mut self, id: &str) -> StoreResult<DataScheme> {
        self.with_schemes(false, |s| s.delete(id))
    }

    pub fn rename_scheme(&mut self, id: &str, name: &str) -> StoreResult<DataScheme> {
        self.schemes.rename(id, name)
    }

    pub fn update_scheme_description(&mut self, id: &str, description: &str) -> StoreResult<DataScheme> {
        self.schemes.update_description(id, description)
    }

    pub fn duplicate_scheme(&mut self, id: &str, new_name: Option<&str>) -> StoreResult<DataScheme> {
        self.schemes.duplicate(id, new_name)
    }

    pub fn switch_scheme(&mut self, id: &str) -> StoreResult<DataScheme> {
        self.with_schemes(false, |s| s.switch_active(id))
    }

    pub fn export_scheme(&self, id: &str) -> Option<String> {
        self.schemes.export(id)
    }

    pub fn import_scheme(&mut self, raw: &str) -> StoreResult<DataScheme> {
        self.schemes.import(raw)
    }

    pub fn reset_schemes(&mut self) -> StoreResult<()> {
        info!("resetting all schemes");
        self.with_schemes(true, |s| s.reset())
    }

    /// Replaces every scheme with a restored envelope.
    pub fn restore(&mut self, envelope: SchemeStorageData) -> StoreResult<()> {
        self.with_schemes(true, |s| s.replace_envelope(envelope))
    }

    // ---- students ----

    pub fn add_student(&mut self, base: NewStudent) -> StoreResult<Student> {
        let student = self.roster.add(base);
        self.commit_students()?;
        Ok(student)
    }

    pub fn add_students(&mut self, bases: Vec<NewStudent>) -> StoreResult<Vec<Student>> {
        let added = self.roster.add_many(bases);
        self.commit_students()?;
        Ok(added)
    }

    /// Bulk roster import. With `replace`, the old roster goes away together
    /// with its seat occupancy and group memberships.
    pub fn import_students(&mut self, bases: Vec<NewStudent>, replace: bool) -> StoreResult<Vec<Student>> {
        let added = if replace {
            self.grid.clear_occupants();
            self.groups.clear_memberships();
            let students: Vec<Student> = bases.into_iter().map(NewStudent::into_student).collect();
            self.roster.replace_all(students.clone());
            students
        } else {
            self.roster.add_many(bases)
        };
        info!(count = added.len(), replace, "students imported");
        self.commit_all()?;
        Ok(added)
    }

    pub fn update_student(&mut self, id: &str, patch: StudentPatch) -> StoreResult<Student> {
        let student = self.roster.update(id, patch)?;
        self.commit_students()?;
        Ok(student)
    }

    pub fn set_student_color(&mut self, id: &str, color: &str) -> StoreResult<()> {
        self.roster.set_color(id, color)?;
        self.commit_students()
    }

    /// Also frees the student's seat (locked or not) and group membership so
    /// nothing is left pointing at it.
    pub fn remove_student(&mut self, id: &str) -> StoreResult<Student> {
        let removed = self.roster.remove(id)?;
        self.grid.remove_student_from_seat(id);
        self.groups.remove_student_everywhere(id);
        self.commit_all()?;
        Ok(removed)
    }

    pub fn clear_students(&mut self) -> StoreResult<()> {
        self.roster.clear();
        self.grid.clear_occupants();
        self.groups.clear_memberships();
        self.commit_all()
    }

    // ---- seats ----

    pub fn init_grid(&mut self, rows: u32, cols: u32) -> StoreResult<()> {
        self.grid.init(rows, cols);
        self.roster.clear_all_seated();
        let mut seat = self.active_config()?.seat.clone();
        seat.rows = rows;
        seat.cols = cols;
        self.schemes.update_active_config(SchemeConfigPatch {
            seat: Some(seat),
            ..Default::default()
        })?;
        self.commit_all()
    }

    fn require_student(&self, id: &str) -> StoreResult<()> {
        if self.roster.contains(id) {
            Ok(())
        } else {
            Err(StoreError::not_found("student", id))
        }
    }

    /// Drag intent: seat the student at `seat_id`. A different occupant there
    /// becomes unseated, and the student's previous seat is vacated. When the
    /// student was dragged out of a group listing, `from_group` drops that
    /// membership too.
    pub fn move_student_to_seat(
        &mut self,
        student_id: &str,
        seat_id: &str,
        from_group: Option<&str>,
    ) -> StoreResult<()> {
        self.require_student(student_id)?;
        let (target_locked, displaced) = match self.grid.seat_by_id(seat_id) {
            Some(s) => (
                s.is_locked,
                s.student_id.clone().filter(|sid| sid != student_id),
            ),
            None => return Err(StoreError::not_found("seat", seat_id)),
        };
        if target_locked {
            warn!(seat_id, "drop onto locked seat refused");
            return Err(StoreError::SeatLocked(seat_id.to_string()));
        }
        if let Some(current) = self.grid.seat_of(student_id) {
            if current.is_locked && current.id != seat_id {
                return Err(StoreError::SeatLocked(current.id.clone()));
            }
        }
        if let Some(g) = from_group {
            if self.groups.get(g).is_none() {
                return Err(StoreError::not_found("group", g));
            }
        }

        self.grid.set_student_to_seat(seat_id, Some(student_id))?;
        if let Some(d) = displaced {
            if self.roster.contains(&d) {
                self.roster.set_seated(&d, None)?;
            }
        }
        self.roster.set_seated(student_id, Some(seat_id))?;
        if let Some(g) = from_group {
            self.groups.remove_student(g, student_id)?;
        }
        self.commit_all()
    }

    /// Returns false if the student was not seated.
    pub fn unseat_student(&mut self, student_id: &str) -> StoreResult<bool> {
        self.require_student(student_id)?;
        let Some((seat_id, locked)) = self
            .grid
            .seat_of(student_id)
            .map(|s| (s.id.clone(), s.is_locked))
        else {
            return Ok(false);
        };
        if locked {
            return Err(StoreError::SeatLocked(seat_id));
        }
        self.grid.set_student_to_seat(&seat_id, None)?;
        self.roster.set_seated(student_id, None)?;
        self.commit_all()?;
        Ok(true)
    }

    pub fn swap_seats(&mut self, a: &str, b: &str) -> StoreResult<()> {
        self.grid.swap(a, b)?;
        for seat_id in [a, b] {
            let occupant = self.grid.seat_by_id(seat_id).and_then(|s| s.student_id.clone());
            if let Some(sid) = occupant {
                self.roster.set_seated(&sid, Some(seat_id))?;
            }
        }
        self.commit_all()
    }

    /// Administrative placement that ignores locks.
    pub fn force_set_seat(
        &mut self,
        seat_id: &str,
        student_id: Option<&str>,
        locked: bool,
    ) -> StoreResult<()> {
        if let Some(sid) = student_id {
            self.require_student(sid)?;
        }
        let previous = self.grid.force_set(seat_id, student_id, locked)?;
        if let Some(p) = previous.filter(|p| Some(p.as_str()) != student_id) {
            if self.roster.contains(&p) {
                self.roster.set_seated(&p, None)?;
            }
        }
        if let Some(sid) = student_id {
            self.roster.set_seated(sid, Some(seat_id))?;
        }
        self.commit_all()
    }

    pub fn toggle_lock(&mut self, seat_id: &str) -> StoreResult<bool> {
        let locked = self.grid.toggle_lock(seat_id)?;
        self.commit_seats()?;
        Ok(locked)
    }

    // ---- config ----

    /// Changing rows/cols resizes the grid; students whose seats fall outside
    /// the new bounds are unseated.
    pub fn update_seat_config(&mut self, patch: SeatConfigPatch) -> StoreResult<SeatConfig> {
        let next = patch.apply(&self.active_config()?.seat);
        if next.rows != self.grid.rows() || next.cols != self.grid.cols() {
            let evicted = self.grid.resize(next.rows, next.cols);
            for sid in &evicted {
                if self.roster.contains(sid) {
                    self.roster.set_seated(sid, None)?;
                }
            }
            if !evicted.is_empty() {
                info!(count = evicted.len(), "resize unseated students");
            }
        }
        self.schemes.update_active_config(SchemeConfigPatch {
            seat: Some(next.clone()),
            ..Default::default()
        })?;
        self.commit_all()?;
        Ok(next)
    }

    pub fn update_export_config(&mut self, patch: ExportConfigPatch) -> StoreResult<ExportConfig> {
        let next = patch.apply(&self.active_config()?.export);
        self.schemes.update_active_config(SchemeConfigPatch {
            export: Some(next.clone()),
            ..Default::default()
        })?;
        Ok(next)
    }

    pub fn set_show_podium(&mut self, show: bool) -> StoreResult<()> {
        let mut seat = self.active_config()?.seat.clone();
        seat.show_podium = show;
        self.schemes.update_active_config(SchemeConfigPatch {
            seat: Some(seat),
            export: None,
            show_podium: Some(show),
        })
    }

    // ---- groups ----

    pub fn create_group(&mut self, name: Option<&str>) -> StoreResult<StudentGroup> {
        let group = self.groups.create(name);
        self.commit_groups()?;
        Ok(group)
    }

    pub fn delete_group(&mut self, id: &str) -> StoreResult<StudentGroup> {
        let removed = self.groups.delete(id)?;
        self.commit_groups()?;
        Ok(removed)
    }

    pub fn rename_group(&mut self, id: &str, name: &str) -> StoreResult<()> {
        self.groups.rename(id, name)?;
        self.commit_groups()
    }

    pub fn set_group_color(&mut self, id: &str, color: &str) -> StoreResult<()> {
        self.groups.set_color(id, color)?;
        self.commit_groups()
    }

    pub fn add_student_to_group(&mut self, group_id: &str, student_id: &str) -> StoreResult<()> {
        self.require_student(student_id)?;
        self.groups.add_student(group_id, student_id)?;
        self.commit_groups()
    }

    pub fn remove_student_from_group(&mut self, group_id: &str, student_id: &str) -> StoreResult<bool> {
        let changed = self.groups.remove_student(group_id, student_id)?;
        if changed {
            self.commit_groups()?;
        }
        Ok(changed)
    }

    pub fn clear_group(&mut self, group_id: &str) -> StoreResult<bool> {
        let changed = self.groups.clear_students(group_id)?;
        if changed {
            self.commit_groups()?;
        }
        Ok(changed)
    }

    pub fn move_student_between_groups(&mut self, from: &str, to: &str, student_id: &str) -> StoreResult<()> {
        self.require_student(student_id)?;
        self.groups.move_student(from, to, student_id)?;
        self.commit_groups()
    }

    pub fn clear_groups(&mut self) -> StoreResult<()> {
        self.groups.clear_all();
        self.commit_groups()
    }

    pub fn set_active_group(&mut self, id: Option<&str>) -> StoreResult<()> {
        self.groups.set_active(id)
    }

    pub fn replace_groups(&mut self, groups: Vec<StudentGroup>) -> StoreResult<()> {
        let mut groups = groups;
        for g in &mut groups {
            g.student_ids.retain(|s| self.roster.contains(s));
        }
        self.groups.replace_all(groups);
        self.commit_groups()
    }

    /// History snapshots can predate roster removals; members no longer on
    /// the roster are dropped from the restored groups.
    fn prune_group_members(&mut self) {
        let roster = &self.roster;
        if self.groups.retain_members(|id| roster.contains(id)) {
            debug!("dropped removed students from restored groups");
        }
    }

    pub fn undo_groups(&mut self) -> StoreResult<bool> {
        let changed = self.groups.undo();
        if changed {
            self.prune_group_members();
            self.commit_groups()?;
        }
        Ok(changed)
    }

    pub fn redo_groups(&mut self) -> StoreResult<bool> {
        let changed = self.groups.redo();
        if changed {
            self.prune_group_members();
            self.commit_groups()?;
        }
        Ok(changed)
    }

    // ---- arrangement ----

    fn apply_assignments(&mut self, assignments: &[Assignment]) -> StoreResult<()> {
        for a in assignments {
            self.grid.set_student_to_seat(&a.seat_id, Some(&a.student_id))?;
            self.roster.set_seated(&a.student_id, Some(&a.seat_id))?;
        }
        self.commit_all()
    }

    /// Seats unseated students at random among the empty unlocked seats. A
    /// seed makes the outcome reproducible.
    pub fn random_arrange(&mut self, seed: Option<u64>) -> StoreResult<Vec<Assignment>> {
        let assignments = {
            let unseated = self.roster.unseated();
            let empty = self.grid.empty_seats();
            match seed {
                Some(seed) => arrange::random_assignments(&unseated, &empty, &mut StdRng::seed_from_u64(seed)),
                None => arrange::random_assignments(&unseated, &empty, &mut rand::thread_rng()),
            }
        };
        info!(placed = assignments.len(), "random arrangement");
        self.apply_assignments(&assignments)?;
        Ok(assignments)
    }

    pub fn smart_arrange(&mut self, rule: &ArrangeRule) -> StoreResult<Vec<Assignment>> {
        let assignments = {
            let unseated = self.roster.unseated();
            let empty = self.grid.empty_seats();
            arrange::smart_assignments(&unseated, &empty, rule)
        };
        info!(placed = assignments.len(), rule = ?rule.kind, "smart arrangement");
        self.apply_assignments(&assignments)?;
        Ok(assignments)
    }

    /// Vacates every unlocked seat. Students in locked seats stay seated.
    pub fn clear_all_seats(&mut self) -> StoreResult<Vec<String>> {
        let vacated = self.grid.clear_all();
        for sid in &vacated {
            if self.roster.contains(sid) {
                self.roster.set_seated(sid, None)?;
            }
        }
        self.commit_all()?;
        Ok(vacated)
    }
}
