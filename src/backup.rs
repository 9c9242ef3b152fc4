use crate::model::SchemeStorageData;
use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const SCHEMES_ENTRY: &str = "schemes.json";
pub const BUNDLE_FORMAT_V1: &str = "seatplanner-schemes-v1";
/// A bare `SchemeStorageData` JSON file, as written by older exports.
pub const PLAIN_JSON_FORMAT: &str = "plain-json";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub scheme_count: usize,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub envelope: SchemeStorageData,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn export_bundle(envelope: &SchemeStorageData, out_path: &Path) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory {}", parent.to_string_lossy())
            })?;
        }
    }

    let payload = serde_json::to_vec_pretty(envelope).context("failed to serialize schemes")?;
    let checksum = sha256_hex(&payload);

    let out_file = File::create(out_path).with_context(|| {
        format!("failed to create output file {}", out_path.to_string_lossy())
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": envelope.version,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "schemeCount": envelope.schemes.len(),
        "sha256": checksum,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(SCHEMES_ENTRY, opts)
        .context("failed to start schemes entry")?;
    zip.write_all(&payload)
        .context("failed to write schemes entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        scheme_count: envelope.schemes.len(),
        sha256: checksum,
    })
}

/// Reads a bundle written by [`export_bundle`], or a plain JSON envelope.
/// Nothing is applied here; the caller decides what to do with the result.
pub fn import_bundle(in_path: &Path) -> anyhow::Result<ImportSummary> {
    if !is_zip_file(in_path)? {
        let text = std::fs::read_to_string(in_path)
            .with_context(|| format!("failed to read {}", in_path.to_string_lossy()))?;
        let envelope: SchemeStorageData =
            serde_json::from_str(&text).context("file is neither a bundle nor a scheme envelope")?;
        return Ok(ImportSummary {
            bundle_format_detected: PLAIN_JSON_FORMAT.to_string(),
            envelope,
        });
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut payload = Vec::new();
    archive
        .by_name(SCHEMES_ENTRY)
        .context("bundle missing schemes.json")?
        .read_to_end(&mut payload)
        .context("failed to read schemes.json")?;

    if let Some(expected) = manifest.get("sha256").and_then(|v| v.as_str()) {
        let actual = sha256_hex(&payload);
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(anyhow!(
                "checksum mismatch: expected={} actual={}",
                expected,
                actual
            ));
        }
    }

    let envelope: SchemeStorageData =
        serde_json::from_slice(&payload).context("schemes.json is invalid")?;
    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        envelope,
    })
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataScheme, NewStudent, SCHEME_VERSION};
    use std::path::PathBuf;

    fn temp_dir(prefix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn sample() -> SchemeStorageData {
        let mut scheme = DataScheme::empty("Period 2", None);
        scheme.students.push(NewStudent::named("Ann").into_student());
        SchemeStorageData {
            active_scheme_id: Some(scheme.id.clone()),
            schemes: vec![scheme],
            version: SCHEME_VERSION,
        }
    }

    #[test]
    fn bundle_round_trips() {
        let dir = temp_dir("seatplanner-backup");
        let path = dir.join("out").join("schemes.zip");
        let env = sample();
        let summary = export_bundle(&env, &path).expect("export");
        assert_eq!(summary.scheme_count, 1);
        assert_eq!(summary.sha256.len(), 64);

        let back = import_bundle(&path).expect("import");
        assert_eq!(back.bundle_format_detected, BUNDLE_FORMAT_V1);
        assert_eq!(back.envelope, env);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let dir = temp_dir("seatplanner-backup-tamper");
        let path = dir.join("bad.zip");
        let file = File::create(&path).expect("create");
        let mut zip = ZipWriter::new(file);
        let opts = FileOptions::default();
        zip.start_file(MANIFEST_ENTRY, opts).expect("manifest");
        zip.write_all(
            json!({ "format": BUNDLE_FORMAT_V1, "sha256": "00" })
                .to_string()
                .as_bytes(),
        )
        .expect("write manifest");
        zip.start_file(SCHEMES_ENTRY, opts).expect("schemes");
        zip.write_all(br#"{"schemes":[]}"#).expect("write schemes");
        zip.finish().expect("finish");

        let e = import_bundle(&path).expect_err("checksum must fail");
        assert!(e.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn plain_json_envelope_is_accepted() {
        let dir = temp_dir("seatplanner-backup-json");
        let path = dir.join("schemes.json");
        let env = sample();
        std::fs::write(&path, serde_json::to_string(&env).expect("json")).expect("write");
        let back = import_bundle(&path).expect("import");
        assert_eq!(back.bundle_format_detected, PLAIN_JSON_FORMAT);
        assert_eq!(back.envelope.schemes.len(), 1);

        std::fs::write(&path, "not json").expect("write");
        assert!(import_bundle(&path).is_err());
    }
}
