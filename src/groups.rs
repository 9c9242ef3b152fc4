use crate::error::{StoreError, StoreResult};
use crate::model::{
    new_id, now_millis, DataScheme, HistoryAction, HistoryKind, StudentGroup, GROUP_COLORS,
};
use std::collections::HashSet;

pub const MAX_HISTORY: usize = 50;

/// Named student groups plus a linear snapshot history.
///
/// `index` is the last applied history entry; `-1` means there is nothing to
/// undo. Each entry keeps the groups before and after its mutation, so undo
/// restores `previous_state` and redo restores `next_state`.
#[derive(Debug, Clone)]
pub struct GroupManager {
    groups: Vec<StudentGroup>,
    active_group_id: Option<String>,
    history: Vec<HistoryAction>,
    index: isize,
}

impl Default for GroupManager {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            active_group_id: None,
            history: Vec::new(),
            index: -1,
        }
    }
}

impl GroupManager {
    pub fn sync_from_scheme(&mut self, scheme: Option<&DataScheme>) {
        self.groups = scheme.map(|s| s.groups.clone()).unwrap_or_default();
        self.active_group_id = None;
        self.reset_history();
    }

    fn reset_history(&mut self) {
        self.history.clear();
        self.index = -1;
    }

    pub fn groups(&self) -> &[StudentGroup] {
        &self.groups
    }

    pub fn history(&self) -> &[HistoryAction] {
        &self.history
    }

    pub fn history_index(&self) -> isize {
        self.index
    }

    pub fn can_undo(&self) -> bool {
        self.index >= 0
    }

    pub fn can_redo(&self) -> bool {
        self.index < self.history.len() as isize - 1
    }

    fn record(&mut self, kind: HistoryKind, previous_state: Vec<StudentGroup>) {
        let keep = (self.index + 1) as usize;
        self.history.truncate(keep);
        self.history.push(HistoryAction {
            kind,
            previous_state,
            next_state: self.groups.clone(),
            timestamp: now_millis(),
        });
        if self.history.len() > MAX_HISTORY {
            // Truncation above left `index` on the previous tail, which is the
            // new tail once the oldest entry is gone.
            self.history.remove(0);
        } else {
            self.index += 1;
        }
    }

    pub fn undo(&mut self) -> bool {
        if self.index < 0 {
            return false;
        }
        self.groups = self.history[self.index as usize].previous_state.clone();
        self.index -= 1;
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.index += 1;
        self.groups = self.history[self.index as usize].next_state.clone();
        true
    }

    fn find_mut(&mut self, group_id: &str) -> StoreResult<&mut StudentGroup> {
        self.groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or_else(|| StoreError::not_found("group", group_id))
    }

    pub fn get(&self, group_id: &str) -> Option<&StudentGroup> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    fn next_color(&self) -> &'static str {
        GROUP_COLORS[self.groups.len() % GROUP_COLORS.len()]
    }

    pub fn create(&mut self, name: Option<&str>) -> StudentGroup {
        let before = self.groups.clone();
        let name = match name {
            Some(n) if !n.trim().is_empty() => n.trim().to_string(),
            _ => format!("Group {}", self.groups.len() + 1),
        };
        let group = StudentGroup::new(&name, self.next_color());
        self.groups.push(group.clone());
        self.active_group_id = Some(group.id.clone());
        self.record(HistoryKind::Create, before);
        group
    }

    pub fn delete(&mut self, group_id: &str) -> StoreResult<StudentGroup> {
        let index = self
            .groups
            .iter()
            .position(|g| g.id == group_id)
            .ok_or_else(|| StoreError::not_found("group", group_id))?;
        let before = self.groups.clone();
        let removed = self.groups.remove(index);
        if self.active_group_id.as_deref() == Some(group_id) {
            self.active_group_id = self.groups.first().map(|g| g.id.clone());
        }
        self.record(HistoryKind::Delete, before);
        Ok(removed)
    }

    pub fn rename(&mut self, group_id: &str, name: &str) -> StoreResult<()> {
        let before = self.groups.clone();
        let group = self.find_mut(group_id)?;
        group.name = name.to_string();
        group.touch();
        self.record(HistoryKind::Rename, before);
        Ok(())
    }

    /// Not recorded in history.
    pub fn set_color(&mut self, group_id: &str, color: &str) -> StoreResult<()> {
        let group = self.find_mut(group_id)?;
        group.color = color.to_string();
        group.touch();
        Ok(())
    }

    fn strip_everywhere(&mut self, student_id: &str) -> bool {
        let mut changed = false;
        for g in &mut self.groups {
            let before = g.student_ids.len();
            g.student_ids.retain(|s| s != student_id);
            if g.student_ids.len() != before {
                g.touch();
                changed = true;
            }
        }
        changed
    }

    /// Moves the student into `group_id`, out of any other group.
    pub fn add_student(&mut self, group_id: &str, student_id: &str) -> StoreResult<()> {
        if self.get(group_id).is_none() {
            return Err(StoreError::not_found("group", group_id));
        }
        if self
            .get(group_id)
            .map(|g| g.student_ids.iter().any(|s| s == student_id))
            .unwrap_or(false)
        {
            return Ok(());
        }
        let before = self.groups.clone();
        self.strip_everywhere(student_id);
        let group = self.find_mut(group_id)?;
        group.student_ids.push(student_id.to_string());
        group.touch();
        self.record(HistoryKind::AddStudent, before);
        Ok(())
    }

    /// Returns whether the student was a member.
    pub fn remove_student(&mut self, group_id: &str, student_id: &str) -> StoreResult<bool> {
        let before = self.groups.clone();
        let group = self.find_mut(group_id)?;
        let Some(pos) = group.student_ids.iter().position(|s| s == student_id) else {
            return Ok(false);
        };
        group.student_ids.remove(pos);
        group.touch();
        self.record(HistoryKind::RemoveStudent, before);
        Ok(true)
    }

    pub fn clear_students(&mut self, group_id: &str) -> StoreResult<bool> {
        let before = self.groups.clone();
        let group = self.find_mut(group_id)?;
        if group.student_ids.is_empty() {
            return Ok(false);
        }
        group.student_ids.clear();
        group.touch();
        self.record(HistoryKind::ClearStudents, before);
        Ok(true)
    }

    pub fn move_student(&mut self, from: &str, to: &str, student_id: &str) -> StoreResult<()> {
        for id in [from, to] {
            if self.get(id).is_none() {
                return Err(StoreError::not_found("group", id));
            }
        }
        let before = self.groups.clone();
        self.strip_everywhere(student_id);
        let target = self.find_mut(to)?;
        target.student_ids.push(student_id.to_string());
        target.touch();
        self.record(HistoryKind::MoveStudent, before);
        Ok(())
    }

    pub fn clear_all(&mut self) {
        if self.groups.is_empty() {
            return;
        }
        let before = std::mem::take(&mut self.groups);
        self.active_group_id = None;
        self.record(HistoryKind::ClearAll, before);
    }

    /// Drops a student from every group without touching history; used when
    /// the student leaves the roster.
    pub fn remove_student_everywhere(&mut self, student_id: &str) -> bool {
        self.strip_everywhere(student_id)
    }

    /// Drops members `keep` rejects, without touching history.
    pub fn retain_members<F>(&mut self, keep: F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        let mut changed = false;
        for g in &mut self.groups {
            let before = g.student_ids.len();
            g.student_ids.retain(|s| keep(s));
            if g.student_ids.len() != before {
                g.touch();
                changed = true;
            }
        }
        changed
    }

    /// Empties every group's membership without touching history.
    pub fn clear_memberships(&mut self) -> bool {
        let mut changed = false;
        for g in &mut self.groups {
            if !g.student_ids.is_empty() {
                g.student_ids.clear();
                g.touch();
                changed = true;
            }
        }
        changed
    }

    pub fn group_of(&self, student_id: &str) -> Option<&StudentGroup> {
        self.groups
            .iter()
            .find(|g| g.student_ids.iter().any(|s| s == student_id))
    }

    pub fn grouped_student_ids(&self) -> HashSet<&str> {
        self.groups
            .iter()
            .flat_map(|g| g.student_ids.iter().map(String::as_str))
            .collect()
    }

    pub fn active_group(&self) -> Option<&StudentGroup> {
        self.active_group_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn set_active(&mut self, group_id: Option<&str>) -> StoreResult<()> {
        if let Some(id) = group_id {
            if self.get(id).is_none() {
                return Err(StoreError::not_found("group", id));
            }
        }
        self.active_group_id = group_id.map(str::to_string);
        Ok(())
    }

    /// Bulk import. Missing ids and colors are filled in, and a student
    /// listed in several groups (or twice in one) stays only at its first
    /// occurrence. History starts over.
    pub fn replace_all(&mut self, groups: Vec<StudentGroup>) {
        let mut seen: HashSet<String> = HashSet::new();
        let now = now_millis();
        self.groups = groups
            .into_iter()
            .enumerate()
            .map(|(i, mut g)| {
                if g.id.trim().is_empty() {
                    g.id = new_id("group");
                }
                if g.color.trim().is_empty() {
                    g.color = GROUP_COLORS[i % GROUP_COLORS.len()].to_string();
                }
                if g.created_at == 0 {
                    g.created_at = now;
                }
                if g.updated_at == 0 {
                    g.updated_at = now;
                }
                g.student_ids.retain(|s| seen.insert(s.clone()));
                g
            })
            .collect();
        self.active_group_id = self.groups.first().map(|g| g.id.clone());
        self.reset_history();
    }
}
