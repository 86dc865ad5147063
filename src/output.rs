//! Result persistence
//!
//! Results are written as a JSON object keyed by `"ra,dec"` in request order,
//! indented with four spaces.

use crate::error::Result;
use crate::types::{PositionOutcome, ResultSet};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::path::Path;
use tracing::info;

/// Serialize a value as JSON indented with four spaces
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    // serde_json only emits UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

impl ResultSet {
    /// Render the result set as indented JSON
    pub fn to_json_string(&self) -> Result<String> {
        to_pretty_json(self)
    }

    /// Write the result set to `path` as indented JSON
    pub async fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        tokio::fs::write(path, self.to_json_string()?).await?;
        info!(
            path = %path.display(),
            positions = self.len(),
            with_data = self.with_data(),
            "Wrote results"
        );
        Ok(())
    }
}

/// Write a retrieval manifest to `path` as indented JSON
pub async fn write_manifest(outcomes: &[PositionOutcome], path: impl AsRef<Path>) -> Result<()> {
    tokio::fs::write(path.as_ref(), to_pretty_json(outcomes)?).await?;
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Disposition, LightCurve, PhotometricRecord, Position};
    use tempfile::TempDir;

    fn curve() -> LightCurve {
        LightCurve::from_records(
            vec![PhotometricRecord {
                mjd: Some(58215.6234),
                mag: None,
                magerr: None,
                limiting_mag: Some(20.5),
                filter: Some("ztfg".to_string()),
                ra: None,
                dec: None,
            }],
            false,
        )
    }

    fn results() -> ResultSet {
        ResultSet::from_entries(vec![
            (Position::new(30.0000001, -5.0000002), Some(curve())),
            (Position::new(10.1234567, 20.7654321), None),
        ])
    }

    #[test]
    fn json_uses_four_space_indent_and_request_order() {
        let json = results().to_json_string().unwrap();

        assert!(json.starts_with("{\n    \"30.0000001,-5.0000002\": {\n        \"mjd\""));
        let first = json.find("30.0000001").unwrap();
        let second = json.find("10.1234567").unwrap();
        assert!(first < second, "keys must keep request order");
        assert!(json.contains("\"10.1234567,20.7654321\": null"));
        assert!(json.contains("\"mag\": [\n            null\n        ]"));
    }

    #[tokio::test]
    async fn writes_results_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("results.json");

        results().write_json(&path).await.unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["30.0000001,-5.0000002"]["magsys"][0], "ab");
        assert!(value["10.1234567,20.7654321"].is_null());
    }

    #[tokio::test]
    async fn writes_manifest_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("manifest.json");
        let outcomes = vec![PositionOutcome {
            position: Position::new(1.0, 2.0),
            exit_code: Some(63),
            disposition: Disposition::NoData,
            message: "No data".to_string(),
            epochs: None,
            error: None,
        }];

        write_manifest(&outcomes, &path).await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(value[0]["disposition"], "no_data");
        assert_eq!(value[0]["exit_code"], 63);
    }

    #[tokio::test]
    async fn write_to_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let err = results()
            .write_json(temp_dir.path().join("absent").join("results.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)));
    }
}
