use crate::error::{StoreError, StoreResult};
use crate::model::{new_id, DataScheme, NewStudent, Student, StudentPatch};

/// In-memory student list of the active scheme. Seat pointers on the rows are
/// a denormalized copy of the grid's occupancy and only change through
/// [`Roster::set_seated`] and [`Roster::clear_all_seated`].
#[derive(Debug, Default, Clone)]
pub struct Roster {
    students: Vec<Student>,
}

impl Roster {
    pub fn sync_from_scheme(&mut self, scheme: Option<&DataScheme>) {
        self.students = scheme.map(|s| s.students.clone()).unwrap_or_default();
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn get(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn seated(&self) -> Vec<&Student> {
        self.students.iter().filter(|s| s.seat_id.is_some()).collect()
    }

    pub fn unseated(&self) -> Vec<&Student> {
        self.students.iter().filter(|s| s.seat_id.is_none()).collect()
    }

    pub fn add(&mut self, base: NewStudent) -> Student {
        let student = base.into_student();
        self.students.push(student.clone());
        student
    }

    pub fn add_many(&mut self, bases: Vec<NewStudent>) -> Vec<Student> {
        bases.into_iter().map(|b| self.add(b)).collect()
    }

    /// Replaces the whole list; rows without an id get one.
    pub fn replace_all(&mut self, students: Vec<Student>) {
        self.students = students
            .into_iter()
            .map(|mut s| {
                if s.id.trim().is_empty() {
                    s.id = new_id("student");
                }
                s
            })
            .collect();
    }

    fn find_mut(&mut self, id: &str) -> StoreResult<&mut Student> {
        self.students
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::not_found("student", id))
    }

    pub fn update(&mut self, id: &str, patch: StudentPatch) -> StoreResult<Student> {
        let student = self.find_mut(id)?;
        if let Some(name) = patch.name {
            student.name = name;
        }
        if patch.student_id.is_some() {
            student.student_id = patch.student_id;
        }
        if patch.gender.is_some() {
            student.gender = patch.gender;
        }
        if patch.height.is_some() {
            student.height = patch.height;
        }
        if patch.score.is_some() {
            student.score = patch.score;
        }
        if patch.color.is_some() {
            student.color = patch.color;
        }
        Ok(student.clone())
    }

    pub fn set_color(&mut self, id: &str, color: &str) -> StoreResult<()> {
        self.find_mut(id)?.color = Some(color.to_string());
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> StoreResult<Student> {
        let index = self
            .students
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| StoreError::not_found("student", id))?;
        Ok(self.students.remove(index))
    }

    pub fn clear(&mut self) {
        self.students.clear();
    }

    pub fn set_seated(&mut self, id: &str, seat_id: Option<&str>) -> StoreResult<()> {
        self.find_mut(id)?.seat_id = seat_id.map(str::to_string);
        Ok(())
    }

    pub fn clear_all_seated(&mut self) {
        for s in &mut self.students {
            s.seat_id = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Gender;

    fn roster_of(names: &[&str]) -> Roster {
        let mut r = Roster::default();
        for n in names {
            r.add(NewStudent::named(n));
        }
        r
    }

    #[test]
    fn add_assigns_unique_ids() {
        let r = roster_of(&["Ann", "Ben", "Ann"]);
        let ids: std::collections::HashSet<_> = r.students().iter().map(|s| &s.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(r.students().iter().all(|s| s.id.starts_with("student-")));
    }

    #[test]
    fn update_merges_and_keeps_identity() {
        let mut r = roster_of(&["Ann"]);
        let id = r.students()[0].id.clone();
        let updated = r
            .update(
                &id,
                StudentPatch {
                    height: Some(151.0),
                    gender: Some(Gender::Female),
                    ..Default::default()
                },
            )
            .expect("update");
        assert_eq!(updated.id, id);
        assert_eq!(updated.name, "Ann");
        assert_eq!(updated.height, Some(151.0));

        let err = r.update("student-missing", StudentPatch::default());
        assert_eq!(err.map_err(|e| e.code()), Err("not_found"));
    }

    #[test]
    fn seated_views_follow_mutations() {
        let mut r = roster_of(&["Ann", "Ben"]);
        let ann = r.students()[0].id.clone();
        assert_eq!(r.unseated().len(), 2);

        r.set_seated(&ann, Some("seat-0-0")).expect("seat");
        assert_eq!(r.seated().len(), 1);
        assert_eq!(r.unseated().len(), 1);

        r.clear_all_seated();
        assert!(r.seated().is_empty());
    }

    #[test]
    fn replace_all_mints_missing_ids() {
        let mut r = Roster::default();
        let mut s = NewStudent::named("Ann").into_student();
        s.id = String::new();
        r.replace_all(vec![s]);
        assert!(!r.students()[0].id.is_empty());
    }
}
