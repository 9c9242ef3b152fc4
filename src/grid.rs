use crate::error::{StoreError, StoreResult};
use crate::model::{parse_seat_id, DataScheme, Seat, SeatConfig};

/// Row-major dense seat array. Seat ids encode (row, col), so lookups by id
/// are index arithmetic and every cell exists without read-time insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct SeatGrid {
    rows: u32,
    cols: u32,
    seats: Vec<Seat>,
}

impl Default for SeatGrid {
    fn default() -> Self {
        let cfg = SeatConfig::default();
        Self::vacant(cfg.rows, cfg.cols)
    }
}

impl SeatGrid {
    pub fn vacant(rows: u32, cols: u32) -> Self {
        let mut seats = Vec::with_capacity(rows as usize * cols as usize);
        for row in 0..rows {
            for col in 0..cols {
                seats.push(Seat::vacant(row, col));
            }
        }
        Self { rows, cols, seats }
    }

    /// Rebuilds from the scheme's sparse seat list. Stored seats outside the
    /// configured bounds are dropped; missing cells come back as defaults.
    pub fn sync_from_scheme(&mut self, scheme: Option<&DataScheme>) {
        let Some(scheme) = scheme else {
            *self = Self::default();
            return;
        };
        let mut grid = Self::vacant(scheme.config.seat.rows, scheme.config.seat.cols);
        for stored in &scheme.seats {
            if let Some(i) = grid.index(stored.row, stored.col) {
                let cell = &mut grid.seats[i];
                cell.student_id = stored.student_id.clone();
                cell.is_locked = stored.is_locked;
            }
        }
        *self = grid;
    }

    pub fn init(&mut self, rows: u32, cols: u32) {
        *self = Self::vacant(rows, cols);
    }

    /// Changes the dimensions keeping every in-range seat. Returns the
    /// students whose seats fell outside the new bounds.
    pub fn resize(&mut self, rows: u32, cols: u32) -> Vec<String> {
        let mut grid = Self::vacant(rows, cols);
        let mut evicted = Vec::new();
        for seat in self.seats.drain(..) {
            match grid.index(seat.row, seat.col) {
                Some(i) => grid.seats[i] = seat,
                None => evicted.extend(seat.student_id),
            }
        }
        *self = grid;
        evicted
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn total(&self) -> usize {
        self.seats.len()
    }

    fn index(&self, row: u32, col: u32) -> Option<usize> {
        if row < self.rows && col < self.cols {
            Some(row as usize * self.cols as usize + col as usize)
        } else {
            None
        }
    }

    fn index_of(&self, seat_id: &str) -> StoreResult<usize> {
        parse_seat_id(seat_id)
            .and_then(|(r, c)| self.index(r, c))
            .ok_or_else(|| StoreError::not_found("seat", seat_id))
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn grid(&self) -> Vec<Vec<Seat>> {
        (0..self.rows)
            .map(|r| {
                let start = r as usize * self.cols as usize;
                self.seats[start..start + self.cols as usize].to_vec()
            })
            .collect()
    }

    pub fn seat(&self, row: u32, col: u32) -> Option<&Seat> {
        self.index(row, col).map(|i| &self.seats[i])
    }

    pub fn seat_by_id(&self, seat_id: &str) -> Option<&Seat> {
        self.index_of(seat_id).ok().map(|i| &self.seats[i])
    }

    /// Unoccupied, unlocked seats in row-major order.
    pub fn empty_seats(&self) -> Vec<&Seat> {
        self.seats
            .iter()
            .filter(|s| s.student_id.is_none() && !s.is_locked)
            .collect()
    }

    pub fn occupied_count(&self) -> usize {
        self.seats.iter().filter(|s| s.student_id.is_some()).count()
    }

    pub fn student_position(&self, student_id: &str) -> Option<(u32, u32)> {
        self.seats
            .iter()
            .find(|s| s.student_id.as_deref() == Some(student_id))
            .map(|s| (s.row, s.col))
    }

    pub fn seat_of(&self, student_id: &str) -> Option<&Seat> {
        self.seats
            .iter()
            .find(|s| s.student_id.as_deref() == Some(student_id))
    }

    fn vacate_student(&mut self, student_id: &str) -> bool {
        let mut changed = false;
        for seat in &mut self.seats {
            if seat.student_id.as_deref() == Some(student_id) {
                seat.student_id = None;
                changed = true;
            }
        }
        changed
    }

    /// Places (or clears, with `None`) the occupant of an unlocked seat. A
    /// student placed here is first vacated from wherever else they sit.
    pub fn set_student_to_seat(&mut self, seat_id: &str, student_id: Option<&str>) -> StoreResult<()> {
        let i = self.index_of(seat_id)?;
        if self.seats[i].is_locked {
            return Err(StoreError::SeatLocked(seat_id.to_string()));
        }
        if let Some(sid) = student_id {
            self.vacate_student(sid);
        }
        self.seats[i].student_id = student_id.map(str::to_string);
        Ok(())
    }

    /// Administrative override: ignores the lock. Returns the previous occupant.
    pub fn force_set(
        &mut self,
        seat_id: &str,
        student_id: Option<&str>,
        locked: bool,
    ) -> StoreResult<Option<String>> {
        let i = self.index_of(seat_id)?;
        let previous = self.seats[i].student_id.take();
        if let Some(sid) = student_id {
            self.vacate_student(sid);
        }
        let seat = &mut self.seats[i];
        seat.student_id = student_id.map(str::to_string);
        seat.is_locked = locked;
        Ok(previous)
    }

    /// Clears every seat holding the student, locked or not.
    pub fn remove_student_from_seat(&mut self, student_id: &str) -> bool {
        self.vacate_student(student_id)
    }

    pub fn toggle_lock(&mut self, seat_id: &str) -> StoreResult<bool> {
        let i = self.index_of(seat_id)?;
        let seat = &mut self.seats[i];
        seat.is_locked = !seat.is_locked;
        Ok(seat.is_locked)
    }

    /// Vacates every unlocked seat and returns the students that were removed.
    pub fn clear_all(&mut self) -> Vec<String> {
        self.seats
            .iter_mut()
            .filter(|s| !s.is_locked)
            .filter_map(|s| s.student_id.take())
            .collect()
    }

    /// Vacates every seat, locked ones included; lock flags stay. Used when
    /// the roster itself goes away.
    pub fn clear_occupants(&mut self) -> Vec<String> {
        self.seats
            .iter_mut()
            .filter_map(|s| s.student_id.take())
            .collect()
    }

    pub fn swap(&mut self, a: &str, b: &str) -> StoreResult<()> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        for (i, id) in [(ia, a), (ib, b)] {
            if self.seats[i].is_locked {
                return Err(StoreError::SeatLocked(id.to_string()));
            }
        }
        let tmp = self.seats[ia].student_id.take();
        self.seats[ia].student_id = self.seats[ib].student_id.take();
        self.seats[ib].student_id = tmp;
        Ok(())
    }

    /// Seats that differ from the default (occupied or locked), row-major.
    pub fn persisted_seats(&self) -> Vec<Seat> {
        self.seats.iter().filter(|s| !s.is_default()).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::seat_id;

    #[test]
    fn grid_is_fully_materialized() {
        let g = SeatGrid::vacant(2, 3);
        let m = g.grid();
        assert_eq!(m.len(), 2);
        assert!(m.iter().all(|r| r.len() == 3));
        assert_eq!(m[1][2].id, "seat-1-2");
        assert_eq!(g.empty_seats().len(), 6);
        assert!(SeatGrid::vacant(0, 4).grid().is_empty());
    }

    #[test]
    fn placing_a_student_vacates_previous_seat() {
        let mut g = SeatGrid::vacant(2, 2);
        g.set_student_to_seat("seat-0-0", Some("s1")).expect("place");
        g.set_student_to_seat("seat-1-1", Some("s1")).expect("move");
        assert_eq!(g.seat(0, 0).and_then(|s| s.student_id.clone()), None);
        assert_eq!(g.student_position("s1"), Some((1, 1)));
        assert_eq!(g.occupied_count(), 1);
    }

    #[test]
    fn locked_seat_refuses_changes_until_forced() {
        let mut g = SeatGrid::vacant(1, 2);
        g.set_student_to_seat("seat-0-0", Some("s1")).expect("place");
        assert_eq!(g.toggle_lock("seat-0-0"), Ok(true));

        let err = g.set_student_to_seat("seat-0-0", Some("s2"));
        assert_eq!(err.map_err(|e| e.code()), Err("seat_locked"));
        assert_eq!(g.swap("seat-0-0", "seat-0-1").map_err(|e| e.code()), Err("seat_locked"));
        assert_eq!(g.clear_all(), Vec::<String>::new());
        assert_eq!(g.student_position("s1"), Some((0, 0)));

        let prev = g.force_set("seat-0-0", Some("s2"), true).expect("force");
        assert_eq!(prev.as_deref(), Some("s1"));
        assert_eq!(g.student_position("s2"), Some((0, 0)));
    }

    #[test]
    fn force_set_keeps_occupancy_injective() {
        let mut g = SeatGrid::vacant(1, 2);
        g.set_student_to_seat("seat-0-1", Some("s1")).expect("place");
        g.toggle_lock("seat-0-1").expect("lock");
        g.force_set("seat-0-0", Some("s1"), false).expect("force");
        let holders = g
            .seats()
            .iter()
            .filter(|s| s.student_id.as_deref() == Some("s1"))
            .count();
        assert_eq!(holders, 1);
    }

    #[test]
    fn remove_student_clears_duplicates() {
        let mut g = SeatGrid::vacant(1, 3);
        // Corrupt state loaded from storage: the same student twice.
        let mut scheme = DataScheme::empty("x", None);
        scheme.config.seat.rows = 1;
        scheme.config.seat.cols = 3;
        for c in [0, 2] {
            let mut s = Seat::vacant(0, c);
            s.student_id = Some("dup".into());
            scheme.seats.push(s);
        }
        g.sync_from_scheme(Some(&scheme));
        assert_eq!(g.occupied_count(), 2);
        assert!(g.remove_student_from_seat("dup"));
        assert_eq!(g.occupied_count(), 0);
    }

    #[test]
    fn clear_occupants_ignores_locks_but_keeps_them() {
        let mut g = SeatGrid::vacant(1, 2);
        g.set_student_to_seat("seat-0-0", Some("a")).expect("place");
        g.toggle_lock("seat-0-0").expect("lock");
        assert_eq!(g.clear_occupants(), vec!["a".to_string()]);
        assert!(g.seat_of("a").is_none());
        assert_eq!(g.seat(0, 0).map(|s| s.is_locked), Some(true));
    }

    #[test]
    fn swap_exchanges_occupants() {
        let mut g = SeatGrid::vacant(1, 2);
        g.set_student_to_seat("seat-0-0", Some("a")).expect("place");
        g.swap("seat-0-0", "seat-0-1").expect("swap");
        assert_eq!(g.student_position("a"), Some((0, 1)));
        assert!(g.swap("seat-0-0", "seat-9-9").is_err());
    }

    #[test]
    fn sparse_persistence_round_trips() {
        let mut g = SeatGrid::vacant(3, 3);
        g.set_student_to_seat("seat-2-1", Some("a")).expect("place");
        g.toggle_lock("seat-0-2").expect("lock");
        let persisted = g.persisted_seats();
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted[0].id, seat_id(0, 2));

        let mut scheme = DataScheme::empty("x", None);
        scheme.config.seat.rows = 3;
        scheme.config.seat.cols = 3;
        scheme.seats = persisted;
        // Out-of-range leftovers from an older, larger layout are ignored.
        let mut stale = Seat::vacant(7, 7);
        stale.student_id = Some("ghost".into());
        scheme.seats.push(stale);

        let mut back = SeatGrid::default();
        back.sync_from_scheme(Some(&scheme));
        assert_eq!(back, g);
    }

    #[test]
    fn resize_reports_cut_off_students() {
        let mut g = SeatGrid::vacant(3, 3);
        g.set_student_to_seat("seat-2-2", Some("far")).expect("place");
        g.set_student_to_seat("seat-0-0", Some("near")).expect("place");
        let evicted = g.resize(2, 2);
        assert_eq!(evicted, vec!["far".to_string()]);
        assert_eq!(g.student_position("near"), Some((0, 0)));
        assert_eq!(g.total(), 4);
    }
}
