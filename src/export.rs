use crate::grid::SeatGrid;
use crate::groups::GroupManager;
use crate::model::{
    ExportFormat, Gender, SchemeConfig, Seat, SeatConfig, Student, StudentGroup,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const PODIUM_LABEL: &str = "讲台";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListingField {
    Name,
    StudentId,
    Gender,
}

impl ListingField {
    pub fn label(self) -> &'static str {
        match self {
            ListingField::Name => "姓名",
            ListingField::StudentId => "学号",
            ListingField::Gender => "性别",
        }
    }

    fn value(self, student: &Student) -> String {
        match self {
            ListingField::Name => student.name.clone(),
            ListingField::StudentId => student.student_id.clone().unwrap_or_default(),
            ListingField::Gender => match student.gender {
                Some(Gender::Male) => "男".to_string(),
                Some(Gender::Female) => "女".to_string(),
                _ => String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub quality: f64,
    pub background_color: String,
    pub show_podium: bool,
    pub show_seat_number: bool,
    pub show_student_id: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<ListingField>>,
}

/// Everything an external codec needs to draw the seat chart, resolved so it
/// never has to look anything up.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub students: Vec<Student>,
    pub seats_by_id: BTreeMap<String, Seat>,
    pub seat_config: SeatConfig,
    pub options: ExportOptions,
    pub chart: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub podium_row: Option<Vec<String>>,
}

pub fn seat_chart(
    students: &[Student],
    grid: &SeatGrid,
    config: &SchemeConfig,
    fields: Option<Vec<ListingField>>,
) -> ExportSnapshot {
    let names: HashMap<&str, &str> = students
        .iter()
        .map(|s| (s.id.as_str(), s.name.as_str()))
        .collect();

    let chart: Vec<Vec<String>> = (0..grid.rows())
        .map(|r| {
            (0..grid.cols())
                .map(|c| {
                    grid.seat(r, c)
                        .and_then(|s| s.student_id.as_deref())
                        .and_then(|id| names.get(id))
                        .map(|n| n.to_string())
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();

    let show_podium = config.show_podium && config.seat.show_podium;
    let podium_row = show_podium.then(|| {
        (0..grid.cols())
            .map(|c| if c == 0 { PODIUM_LABEL.to_string() } else { String::new() })
            .collect()
    });

    let mut seat_config = config.seat.clone();
    seat_config.rows = grid.rows();
    seat_config.cols = grid.cols();

    ExportSnapshot {
        students: students.to_vec(),
        seats_by_id: grid
            .seats()
            .iter()
            .map(|s| (s.id.clone(), s.clone()))
            .collect(),
        seat_config,
        options: ExportOptions {
            format: config.export.format,
            quality: config.export.quality,
            background_color: config.export.background_color.clone(),
            show_podium,
            show_seat_number: config.export.show_seat_number,
            show_student_id: config.export.show_student_id,
            fields,
        },
        chart,
        podium_row,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSheet {
    pub name: String,
    pub color: String,
    pub count: usize,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupListing {
    pub headers: Vec<String>,
    pub groups: Vec<GroupSheet>,
}

/// Per-group tables of the requested student fields. Members no longer on
/// the roster are skipped. An empty field list falls back to names only.
pub fn group_listing(
    groups: &GroupManager,
    students: &[Student],
    fields: &[ListingField],
) -> GroupListing {
    let fields: Vec<ListingField> = if fields.is_empty() {
        vec![ListingField::Name]
    } else {
        fields.to_vec()
    };
    let by_id: HashMap<&str, &Student> = students.iter().map(|s| (s.id.as_str(), s)).collect();

    let sheet = |g: &StudentGroup| {
        let rows: Vec<Vec<String>> = g
            .student_ids
            .iter()
            .filter_map(|id| by_id.get(id.as_str()))
            .map(|s| fields.iter().map(|f| f.value(s)).collect())
            .collect();
        GroupSheet {
            name: g.name.clone(),
            color: g.color.clone(),
            count: rows.len(),
            rows,
        }
    };

    GroupListing {
        headers: fields.iter().map(|f| f.label().to_string()).collect(),
        groups: groups.groups().iter().map(sheet).collect(),
    }
}
