use crate::model::{ArrangeRule, Gender, RuleKind, Seat, Student};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub seat_id: String,
    pub student_id: String,
}

fn pair(students: &[&Student], seats: &[&Seat]) -> Vec<Assignment> {
    students
        .iter()
        .zip(seats.iter())
        .map(|(st, se)| Assignment {
            seat_id: se.id.clone(),
            student_id: st.id.clone(),
        })
        .collect()
}

/// Shuffles both lists independently and pairs them up to the shorter one.
pub fn random_assignments<R: Rng + ?Sized>(
    unseated: &[&Student],
    empty_seats: &[&Seat],
    rng: &mut R,
) -> Vec<Assignment> {
    let mut students = unseated.to_vec();
    let mut seats = empty_seats.to_vec();
    students.shuffle(rng);
    seats.shuffle(rng);
    pair(&students, &seats)
}

/// Stable order for the rule. Missing heights/scores count as 0; custom and
/// unknown rules keep the input order.
pub fn sort_for_rule<'a>(students: &[&'a Student], rule: &ArrangeRule) -> Vec<&'a Student> {
    let mut sorted = students.to_vec();
    let cmp: fn(&Student, &Student) -> Ordering = match rule.kind {
        RuleKind::Height => |a, b| a.height.unwrap_or(0.0).total_cmp(&b.height.unwrap_or(0.0)),
        RuleKind::Score => |a, b| a.score.unwrap_or(0.0).total_cmp(&b.score.unwrap_or(0.0)),
        RuleKind::Gender => |a, b| Gender::rank(a.gender).cmp(&Gender::rank(b.gender)),
        RuleKind::Custom | RuleKind::Unknown => return sorted,
    };
    if rule.ascending {
        sorted.sort_by(|a, b| cmp(a, b));
    } else {
        sorted.sort_by(|a, b| cmp(b, a));
    }
    sorted
}

/// Sorted students against empty seats in row-major order.
pub fn smart_assignments(
    unseated: &[&Student],
    empty_seats: &[&Seat],
    rule: &ArrangeRule,
) -> Vec<Assignment> {
    pair(&sort_for_rule(unseated, rule), empty_seats)
}
