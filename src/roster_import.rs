use crate::model::{Gender, NewStudent};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub line: usize,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseResult {
    pub students: Vec<NewStudent>,
    pub fields: Vec<String>,
    pub errors: Vec<RowError>,
}

/// Maps header synonyms (English and Chinese spreadsheet headers) onto
/// student field names. Unknown headers come back trimmed.
pub fn normalize_field(header: &str) -> String {
    let h = header.trim().trim_start_matches('\u{feff}');
    let canonical = match h {
        "姓名" | "name" | "学生姓名" => "name",
        "学号" | "studentId" | "student_id" => "studentId",
        "性别" | "gender" => "gender",
        "身高" | "height" => "height",
        "成绩" | "score" | "分数" => "score",
        other => other,
    };
    canonical.to_string()
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn non_empty(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// One row of `(header, cell)` pairs into a student, or `None` if the row
/// has no name.
fn build_student<'a, I>(cells: I) -> Option<NewStudent>
where
    I: IntoIterator<Item = (&'a str, String)>,
{
    let mut out = NewStudent::default();
    let mut has_name = false;
    for (header, value) in cells {
        match normalize_field(header).as_str() {
            "name" => {
                if let Some(n) = non_empty(&value) {
                    out.name = n;
                    has_name = true;
                }
            }
            "studentId" => out.student_id = non_empty(&value),
            "gender" => out.gender = Gender::parse_loose(&value),
            "height" => out.height = parse_number(&value),
            "score" => out.score = parse_number(&value),
            _ => {}
        }
    }
    has_name.then_some(out)
}

fn missing_name(line: usize) -> RowError {
    RowError {
        line,
        code: "missing_name",
        message: format!("line {} is missing the name field", line),
    }
}

fn cell_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Rows already decoded by an external reader (e.g. a spreadsheet sheet),
/// keyed by header. Row `i` sits on file line `i + 2`, below the header.
pub fn parse_rows(rows: &[BTreeMap<String, serde_json::Value>]) -> ParseResult {
    let mut result = ParseResult {
        fields: rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default(),
        ..Default::default()
    };
    for (i, row) in rows.iter().enumerate() {
        let cells = row.iter().map(|(k, v)| (k.as_str(), cell_text(v)));
        match build_student(cells) {
            Some(s) => result.students.push(s),
            None => result.errors.push(missing_name(i + 2)),
        }
    }
    result
}

/// CSV text with a header row. Malformed records are reported and skipped;
/// the rest of the file is still imported.
pub fn parse_csv(text: &str) -> ParseResult {
    let mut result = ParseResult::default();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.trim_start_matches('\u{feff}').as_bytes());

    let headers: Vec<String> = match reader.headers() {
        Ok(h) => h.iter().map(str::to_string).collect(),
        Err(e) => {
            result.errors.push(RowError {
                line: 1,
                code: "csv_error",
                message: format!("failed to read CSV header: {}", e),
            });
            return result;
        }
    };
    result.fields = headers.clone();

    for (i, record) in reader.records().enumerate() {
        let fallback_line = i + 2;
        match record {
            Ok(rec) => {
                let line = rec
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(fallback_line);
                let cells = headers
                    .iter()
                    .map(String::as_str)
                    .zip(rec.iter().map(str::to_string));
                match build_student(cells) {
                    Some(s) => result.students.push(s),
                    None => result.errors.push(missing_name(line)),
                }
            }
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(fallback_line);
                result.errors.push(RowError {
                    line,
                    code: "csv_error",
                    message: e.to_string(),
                });
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn row_without_name_is_dropped_with_line_number() {
        let res = parse_csv("name,score\n,90\nBen,85\n");
        assert_eq!(res.students.len(), 1);
        assert_eq!(res.students[0].name, "Ben");
        assert_eq!(res.students[0].score, Some(85.0));
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.errors[0].line, 2);
        assert_eq!(res.errors[0].code, "missing_name");
    }

    #[test]
    fn chinese_headers_and_values_are_normalized() {
        let text = "\u{feff}学生姓名,学号,性别,身高,分数,备注\n张三,001,男,172,88.5,班长\n李四,002,女,abc,,\n";
        let res = parse_csv(text);
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        assert_eq!(res.fields.len(), 6);
        let a = &res.students[0];
        assert_eq!(a.name, "张三");
        assert_eq!(a.student_id.as_deref(), Some("001"));
        assert_eq!(a.gender, Some(Gender::Male));
        assert_eq!(a.height, Some(172.0));
        assert_eq!(a.score, Some(88.5));
        let b = &res.students[1];
        assert_eq!(b.gender, Some(Gender::Female));
        assert_eq!(b.height, None);
        assert_eq!(b.score, None);
    }

    #[test]
    fn short_rows_are_tolerated() {
        let res = parse_csv("name,height\nAnn\nBen,150\n");
        assert_eq!(res.students.len(), 2);
        assert_eq!(res.students[0].height, None);
    }

    #[test]
    fn pre_parsed_rows_use_header_offset() {
        let rows: Vec<BTreeMap<String, serde_json::Value>> = vec![
            serde_json::from_value(json!({ "姓名": "Ann", "成绩": 91 })).expect("row"),
            serde_json::from_value(json!({ "name": "", "score": 90 })).expect("row"),
        ];
        let res = parse_rows(&rows);
        assert_eq!(res.students.len(), 1);
        assert_eq!(res.students[0].score, Some(91.0));
        assert_eq!(res.errors[0].line, 3);
    }
}
