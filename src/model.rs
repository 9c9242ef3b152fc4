use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SCHEME_STORAGE_KEY: &str = "seat-schemes";
pub const SCHEME_VERSION: u32 = 1;
pub const DEFAULT_SCHEME_NAME: &str = "Default Scheme";
/// Upper bound for grid rows and cols.
pub const MAX_GRID_SIDE: u32 = 50;

pub const GROUP_COLORS: [&str; 10] = [
    "#3b82f6", "#10b981", "#f59e0b", "#ef4444", "#64748b", "#ec4899", "#06b6d4", "#84cc16",
    "#f97316", "#0ea5e9",
];

pub fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[serde(other)]
    Other,
}

impl Gender {
    /// Accepts the spellings found in roster spreadsheets (男/女, m/f, male/female).
    pub fn parse_loose(raw: &str) -> Option<Gender> {
        let v = raw.trim().to_lowercase();
        if v.is_empty() {
            return None;
        }
        match v.as_str() {
            "男" | "male" | "m" => Some(Gender::Male),
            "女" | "female" | "f" => Some(Gender::Female),
            _ => Some(Gender::Other),
        }
    }

    /// Sort rank used by gender arrangement: male < female < other.
    pub fn rank(g: Option<Gender>) -> u8 {
        match g {
            Some(Gender::Male) => 1,
            Some(Gender::Female) => 2,
            _ => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat_id: Option<String>,
    /// Keys we don't model, kept from persisted or imported scheme payloads.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub name: String,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
}

impl NewStudent {
    #[cfg(test)]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn into_student(self) -> Student {
        Student {
            id: new_id("student"),
            name: self.name,
            student_id: self.student_id,
            gender: self.gender,
            height: self.height,
            score: self.score,
            color: self.color,
            seat_id: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Partial update for a student. `id` and `seatId` are deliberately absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    pub name: Option<String>,
    pub student_id: Option<String>,
    pub gender: Option<Gender>,
    pub height: Option<f64>,
    pub score: Option<f64>,
    pub color: Option<String>,
}

pub fn seat_id(row: u32, col: u32) -> String {
    format!("seat-{}-{}", row, col)
}

pub fn parse_seat_id(id: &str) -> Option<(u32, u32)> {
    let rest = id.strip_prefix("seat-")?;
    let (r, c) = rest.split_once('-')?;
    Some((r.parse().ok()?, c.parse().ok()?))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: String,
    pub row: u32,
    pub col: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default)]
    pub is_locked: bool,
}

impl Seat {
    pub fn vacant(row: u32, col: u32) -> Self {
        Self {
            id: seat_id(row, col),
            row,
            col,
            student_id: None,
            is_locked: false,
        }
    }

    pub fn is_default(&self) -> bool {
        self.student_id.is_none() && !self.is_locked
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub student_ids: Vec<String>,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl StudentGroup {
    pub fn new(name: &str, color: &str) -> Self {
        let now = now_millis();
        Self {
            id: new_id("group"),
            name: name.to_string(),
            student_ids: Vec::new(),
            color: color.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeatConfig {
    pub rows: u32,
    pub cols: u32,
    pub show_podium: bool,
    pub seat_width: u32,
    pub seat_height: u32,
    pub gap_x: u32,
    pub gap_y: u32,
}

impl SeatConfig {
    pub fn dims_in_bounds(rows: u32, cols: u32) -> bool {
        (1..=MAX_GRID_SIDE).contains(&rows) && (1..=MAX_GRID_SIDE).contains(&cols)
    }

    pub fn has_valid_dims(&self) -> bool {
        Self::dims_in_bounds(self.rows, self.cols)
    }

    /// Pulls rows and cols back into `1..=MAX_GRID_SIDE`.
    pub fn clamp_dims(&mut self) {
        self.rows = self.rows.clamp(1, MAX_GRID_SIDE);
        self.cols = self.cols.clamp(1, MAX_GRID_SIDE);
    }
}

impl Default for SeatConfig {
    fn default() -> Self {
        Self {
            rows: 6,
            cols: 7,
            show_podium: true,
            seat_width: 90,
            seat_height: 60,
            gap_x: 8,
            gap_y: 8,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatConfigPatch {
    pub rows: Option<u32>,
    pub cols: Option<u32>,
    pub show_podium: Option<bool>,
    pub seat_width: Option<u32>,
    pub seat_height: Option<u32>,
    pub gap_x: Option<u32>,
    pub gap_y: Option<u32>,
}

impl SeatConfigPatch {
    pub fn apply(&self, base: &SeatConfig) -> SeatConfig {
        SeatConfig {
            rows: self.rows.unwrap_or(base.rows),
            cols: self.cols.unwrap_or(base.cols),
            show_podium: self.show_podium.unwrap_or(base.show_podium),
            seat_width: self.seat_width.unwrap_or(base.seat_width),
            seat_height: self.seat_height.unwrap_or(base.seat_height),
            gap_x: self.gap_x.unwrap_or(base.gap_x),
            gap_y: self.gap_y.unwrap_or(base.gap_y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    Jpg,
    Pdf,
    Excel,
    Word,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportConfig {
    pub format: ExportFormat,
    pub quality: f64,
    pub show_seat_number: bool,
    pub show_student_id: bool,
    pub background_color: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            quality: 1.0,
            show_seat_number: true,
            show_student_id: false,
            background_color: "#ffffff".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportConfigPatch {
    pub format: Option<ExportFormat>,
    pub quality: Option<f64>,
    pub show_seat_number: Option<bool>,
    pub show_student_id: Option<bool>,
    pub background_color: Option<String>,
}

impl ExportConfigPatch {
    pub fn apply(&self, base: &ExportConfig) -> ExportConfig {
        ExportConfig {
            format: self.format.unwrap_or(base.format),
            quality: self.quality.unwrap_or(base.quality),
            show_seat_number: self.show_seat_number.unwrap_or(base.show_seat_number),
            show_student_id: self.show_student_id.unwrap_or(base.show_student_id),
            background_color: self
                .background_color
                .clone()
                .unwrap_or_else(|| base.background_color.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemeConfig {
    pub seat: SeatConfig,
    pub export: ExportConfig,
    pub show_podium: bool,
}

impl Default for SchemeConfig {
    fn default() -> Self {
        Self {
            seat: SeatConfig::default(),
            export: ExportConfig::default(),
            show_podium: true,
        }
    }
}

/// Whole-section replacement; absent sections are left alone.
#[derive(Debug, Clone, Default)]
pub struct SchemeConfigPatch {
    pub seat: Option<SeatConfig>,
    pub export: Option<ExportConfig>,
    pub show_podium: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataScheme {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub config: SchemeConfig,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub seats: Vec<Seat>,
    #[serde(default)]
    pub groups: Vec<StudentGroup>,
}

impl DataScheme {
    pub fn empty(name: &str, description: Option<String>) -> Self {
        let now = now_iso();
        Self {
            id: new_id("scheme"),
            name: name.to_string(),
            description,
            created_at: now.clone(),
            updated_at: now,
            version: SCHEME_VERSION,
            config: SchemeConfig::default(),
            students: Vec::new(),
            seats: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Deep copy under a fresh identity.
    pub fn duplicate(&self, new_name: Option<&str>) -> Self {
        let now = now_iso();
        let mut copy = self.clone();
        copy.id = new_id("scheme");
        copy.name = match new_name {
            Some(n) if !n.trim().is_empty() => n.trim().to_string(),
            _ => format!("{} (copy)", self.name),
        };
        copy.created_at = now.clone();
        copy.updated_at = now;
        copy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeStorageData {
    pub schemes: Vec<DataScheme>,
    #[serde(default)]
    pub active_scheme_id: Option<String>,
    #[serde(default)]
    pub version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Create,
    Delete,
    Rename,
    AddStudent,
    RemoveStudent,
    MoveStudent,
    ClearStudents,
    ClearAll,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryAction {
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub previous_state: Vec<StudentGroup>,
    pub next_state: Vec<StudentGroup>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Height,
    Score,
    Gender,
    Custom,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrangeRule {
    #[serde(rename = "type")]
    pub kind: RuleKind,
    #[serde(default = "default_ascending")]
    pub ascending: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

fn default_ascending() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_id_parses_back() {
        assert_eq!(seat_id(3, 12), "seat-3-12");
        assert_eq!(parse_seat_id("seat-3-12"), Some((3, 12)));
        assert_eq!(parse_seat_id("seat-3"), None);
        assert_eq!(parse_seat_id("desk-1-1"), None);
        assert_eq!(parse_seat_id("seat-a-1"), None);
    }

    #[test]
    fn student_keeps_unknown_columns() {
        let raw = r##"{"id":"s1","name":"Ann","seatId":"seat-0-0","club":"chess","color":"#fff"}"##;
        let s: Student = serde_json::from_str(raw).expect("parse student");
        assert_eq!(s.seat_id.as_deref(), Some("seat-0-0"));
        assert_eq!(s.extra.get("club").and_then(|v| v.as_str()), Some("chess"));

        let back = serde_json::to_value(&s).expect("serialize");
        assert_eq!(back.get("club").and_then(|v| v.as_str()), Some("chess"));
        assert_eq!(back.get("seatId").and_then(|v| v.as_str()), Some("seat-0-0"));
        assert!(back.get("height").is_none());
    }

    #[test]
    fn unknown_gender_and_rule_fall_back() {
        let g: Gender = serde_json::from_str("\"nonbinary\"").expect("gender");
        assert_eq!(g, Gender::Other);
        let rule: ArrangeRule = serde_json::from_str(r#"{"type":"shoe_size"}"#).expect("rule");
        assert_eq!(rule.kind, RuleKind::Unknown);
        assert!(rule.ascending);
    }

    #[test]
    fn loose_gender_spellings() {
        assert_eq!(Gender::parse_loose("男"), Some(Gender::Male));
        assert_eq!(Gender::parse_loose(" F "), Some(Gender::Female));
        assert_eq!(Gender::parse_loose("x"), Some(Gender::Other));
        assert_eq!(Gender::parse_loose(""), None);
    }

    #[test]
    fn scheme_config_tolerates_missing_sections() {
        let cfg: SchemeConfig =
            serde_json::from_str(r#"{"seat":{"rows":2}}"#).expect("partial config");
        assert_eq!(cfg.seat.rows, 2);
        assert_eq!(cfg.seat.cols, 7);
        assert_eq!(cfg.export.background_color, "#ffffff");
        assert!(cfg.show_podium);
    }

    #[test]
    fn duplicate_gets_fresh_identity() {
        let mut s = DataScheme::empty("Period 1", None);
        s.students.push(NewStudent::named("Ann").into_student());
        let d = s.duplicate(None);
        assert_ne!(d.id, s.id);
        assert_eq!(d.name, "Period 1 (copy)");
        assert_eq!(d.students, s.students);
        assert_eq!(s.duplicate(Some("Lab")).name, "Lab");
    }
}
