//! Light-curve table parsing and photometric normalization
//!
//! A fetched light curve is a flat text table: `#` comment lines, a header
//! row whose names carry stray commas, and whitespace-separated data rows.
//! [`parse_table`] validates it once against the required columns and
//! produces typed rows; [`normalize`] turns those rows into magnitudes.
//!
//! Magnitudes follow the difference-image convention
//!
//! ```text
//! mag    = zpdiff - 2.5 * log10(forcediffimflux)
//! magerr = 1.0857 * forcediffimfluxunc / forcediffimflux
//! ```
//!
//! and are nulled for epochs with SNR below 3, zero flux uncertainty, or a
//! missing flux.

use crate::error::SchemaError;
use crate::types::{LightCurve, PhotometricRecord};
use tracing::{debug, info};

/// Columns every light-curve table must carry
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "jd",
    "forcediffimflux",
    "forcediffimfluxunc",
    "diffmaglim",
    "zpdiff",
    "filter",
];

/// Offset between Julian and modified Julian dates
pub const MJD_OFFSET: f64 = 2_400_000.5;

/// Detection threshold on flux / flux uncertainty
pub const SNR_THRESHOLD: f64 = 3.0;

/// 2.5 / ln(10), propagates a relative flux error into magnitudes
pub const MAGERR_FACTOR: f64 = 1.0857;

/// One typed row of a fetched light-curve table
///
/// Missing numeric values are NaN; a missing filter is `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct RawLightcurveRow {
    /// Julian date
    pub jd: f64,
    /// Difference-image forced flux
    pub forcediffimflux: f64,
    /// Uncertainty of the forced flux
    pub forcediffimfluxunc: f64,
    /// Limiting magnitude of the difference image
    pub diffmaglim: f64,
    /// Photometric zero-point of the difference image
    pub zpdiff: f64,
    /// Filter name as reported (e.g. `ZTF_g`)
    pub filter: Option<String>,
    /// Right ascension, if the table has an `ra` column
    pub ra: Option<f64>,
    /// Declination, if the table has a `dec` column
    pub dec: Option<f64>,
}

/// A fetched light-curve table, validated against [`REQUIRED_COLUMNS`]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawLightcurveTable {
    /// Data rows in file order
    pub rows: Vec<RawLightcurveRow>,
    /// Whether the table carried both `ra` and `dec` columns
    pub has_coordinates: bool,
}

struct ColumnIndex {
    jd: usize,
    flux: usize,
    flux_unc: usize,
    maglim: usize,
    zp: usize,
    filter: usize,
    ra: Option<usize>,
    dec: Option<usize>,
}

impl ColumnIndex {
    fn resolve(header: &[String]) -> Result<Self, SchemaError> {
        let find = |name: &str| header.iter().position(|h| h == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .into_iter()
            .filter(|name| find(*name).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError::MissingColumns { missing });
        }

        let required = |name: &str| {
            find(name).ok_or_else(|| SchemaError::MissingColumns {
                missing: vec![name.to_string()],
            })
        };
        Ok(Self {
            jd: required("jd")?,
            flux: required("forcediffimflux")?,
            flux_unc: required("forcediffimfluxunc")?,
            maglim: required("diffmaglim")?,
            zp: required("zpdiff")?,
            filter: required("filter")?,
            ra: find("ra"),
            dec: find("dec"),
        })
    }
}

/// Split a line on whitespace and commas
///
/// Header names come with trailing commas (`jd,`), which this strips.
fn tokenize(line: &str) -> Vec<String> {
    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_null(token: &str) -> bool {
    token.is_empty()
        || token == "\"\""
        || token.eq_ignore_ascii_case("null")
        || token.eq_ignore_ascii_case("nan")
}

fn parse_number(token: &str, line: usize, column: &str) -> Result<f64, SchemaError> {
    if is_null(token) {
        return Ok(f64::NAN);
    }
    token.parse().map_err(|_| SchemaError::InvalidValue {
        line,
        column: column.to_string(),
        value: token.to_string(),
    })
}

/// Parse and validate a light-curve text table
///
/// # Errors
///
/// - [`SchemaError::MissingHeader`] if there is no non-comment line
/// - [`SchemaError::MissingColumns`] listing every absent required column
/// - [`SchemaError::RaggedRow`] if a row's field count differs from the header
/// - [`SchemaError::InvalidValue`] for a non-numeric, non-null numeric field
pub fn parse_table(text: &str) -> Result<RawLightcurveTable, SchemaError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    let (_, header_line) = lines.next().ok_or(SchemaError::MissingHeader)?;
    let header = tokenize(header_line);
    let columns = ColumnIndex::resolve(&header)?;
    let has_coordinates = columns.ra.is_some() && columns.dec.is_some();

    let mut rows = Vec::new();
    for (line_no, line) in lines {
        let fields = tokenize(line);
        if fields.len() != header.len() {
            return Err(SchemaError::RaggedRow {
                line: line_no,
                expected: header.len(),
                found: fields.len(),
            });
        }

        let number = |index: usize| parse_number(&fields[index], line_no, &header[index]);
        let optional = |index: Option<usize>| index.map(number).transpose();

        let filter = &fields[columns.filter];
        rows.push(RawLightcurveRow {
            jd: number(columns.jd)?,
            forcediffimflux: number(columns.flux)?,
            forcediffimfluxunc: number(columns.flux_unc)?,
            diffmaglim: number(columns.maglim)?,
            zpdiff: number(columns.zp)?,
            filter: (!is_null(filter)).then(|| filter.clone()),
            ra: optional(columns.ra)?,
            dec: optional(columns.dec)?,
        });
    }

    debug!(rows = rows.len(), columns = header.len(), "Parsed light curve table");
    Ok(RawLightcurveTable {
        rows,
        has_coordinates,
    })
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Julian date to modified Julian date
pub fn jd_to_mjd(jd: f64) -> f64 {
    jd - MJD_OFFSET
}

/// Normalize a filter name: strip underscores, lowercase (`ZTF_g` → `ztfg`)
pub fn normalize_filter(filter: &str) -> String {
    filter.replace('_', "").to_lowercase()
}

/// Whether an epoch's magnitude must be nulled
///
/// The three conditions are independent; any one of them masks the epoch.
fn is_masked(flux: f64, flux_unc: f64) -> bool {
    let low_snr = flux / flux_unc < SNR_THRESHOLD;
    let zero_unc = flux_unc == 0.0;
    let missing_flux = flux.is_nan();
    low_snr || zero_unc || missing_flux
}

fn normalize_row(row: &RawLightcurveRow) -> PhotometricRecord {
    let flux = row.forcediffimflux;
    let flux_unc = row.forcediffimfluxunc;

    let (mag, magerr) = if is_masked(flux, flux_unc) {
        (None, None)
    } else {
        (
            finite(row.zpdiff - 2.5 * flux.log10()),
            finite(MAGERR_FACTOR * flux_unc / flux),
        )
    };

    PhotometricRecord {
        mjd: finite(jd_to_mjd(row.jd)),
        mag,
        magerr,
        limiting_mag: finite(row.diffmaglim),
        filter: row.filter.as_deref().map(normalize_filter),
        ra: row.ra.and_then(finite),
        dec: row.dec.and_then(finite),
    }
}

/// Normalize every row of a table into photometric records
pub fn normalize_records(table: &RawLightcurveTable) -> Vec<PhotometricRecord> {
    table.rows.iter().map(normalize_row).collect()
}

/// Normalize a table into a column-major light curve
pub fn normalize(table: &RawLightcurveTable) -> LightCurve {
    let below = table
        .rows
        .iter()
        .filter(|r| r.forcediffimflux / r.forcediffimfluxunc < SNR_THRESHOLD)
        .count();
    info!(
        below_snr = below,
        at_or_above_snr = table.rows.len() - below,
        "Epochs relative to SNR threshold"
    );

    LightCurve::from_records(normalize_records(table), table.has_coordinates)
}

/// Parse and normalize a raw light-curve payload
pub fn normalize_text(text: &str) -> Result<LightCurve, SchemaError> {
    Ok(normalize(&parse_table(text)?))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        " index, field, ccdid, qid, filter, pid, jd, diffmaglim, zpdiff, forcediffimflux, forcediffimfluxunc, procstatus";

    fn payload(rows: &[&str]) -> String {
        let mut text = String::from(
            "# Requested input R.A. = 10.1234567 degrees\n\
             # Requested input Dec. = 20.7654321 degrees\n\
             #\n",
        );
        text.push_str(HEADER);
        text.push('\n');
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text
    }

    fn raw(flux: f64, flux_unc: f64) -> RawLightcurveRow {
        RawLightcurveRow {
            jd: 2458216.1234,
            forcediffimflux: flux,
            forcediffimfluxunc: flux_unc,
            diffmaglim: 20.5,
            zpdiff: 26.0,
            filter: Some("ZTF_g".to_string()),
            ra: None,
            dec: None,
        }
    }

    #[test]
    fn parses_header_with_commas_and_skips_comments() {
        let text = payload(&[
            "0 680 2 3 ZTF_g 1 2458216.1234 20.5 26.0 100.0 10.0 0",
            "1 680 2 3 ZTF_r 2 2458217.5 null 26.1 null 10.0 0",
        ]);
        let table = parse_table(&text).unwrap();

        assert_eq!(table.rows.len(), 2);
        assert!(!table.has_coordinates);
        assert_eq!(table.rows[0].forcediffimflux, 100.0);
        assert_eq!(table.rows[0].filter.as_deref(), Some("ZTF_g"));
        assert!(table.rows[1].diffmaglim.is_nan(), "null sentinel");
        assert!(table.rows[1].forcediffimflux.is_nan());
    }

    #[test]
    fn missing_columns_are_all_reported() {
        let text = "jd, forcediffimflux, filter\n2458216.1 1.0 ZTF_g\n";
        let err = parse_table(text).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingColumns {
                missing: vec![
                    "forcediffimfluxunc".to_string(),
                    "diffmaglim".to_string(),
                    "zpdiff".to_string(),
                ]
            }
        );
    }

    #[test]
    fn empty_payload_has_no_header() {
        assert_eq!(
            parse_table("# only comments\n\n").unwrap_err(),
            SchemaError::MissingHeader
        );
    }

    #[test]
    fn ragged_row_is_rejected() {
        let text = payload(&["0 680 2 3 ZTF_g 1 2458216.1234 20.5 26.0 100.0"]);
        let err = parse_table(&text).unwrap_err();
        assert_eq!(
            err,
            SchemaError::RaggedRow {
                line: 5,
                expected: 12,
                found: 10
            }
        );
    }

    #[test]
    fn non_numeric_value_is_rejected() {
        let text = payload(&["0 680 2 3 ZTF_g 1 2458216.1234 20.5 26.0 bogus 10.0 0"]);
        let err = parse_table(&text).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::InvalidValue { ref column, ref value, .. }
                if column == "forcediffimflux" && value == "bogus"
        ));
    }

    #[test]
    fn exact_required_column_subset_is_accepted() {
        let text = "jd forcediffimflux forcediffimfluxunc diffmaglim zpdiff filter\n\
                    2458216.1234 100 10 20.5 26.0 ZTF_g\n";
        let curve = normalize_text(text).unwrap();
        assert_eq!(curve.len(), 1);
        assert!(curve.mag[0].is_some());
    }

    #[test]
    fn coordinates_are_kept_when_present() {
        let text = "jd, ra, dec, forcediffimflux, forcediffimfluxunc, diffmaglim, zpdiff, filter\n\
                    2458216.1234 10.5 -20.25 100 10 20.5 26.0 ZTF_i\n";
        let curve = normalize_text(text).unwrap();
        assert_eq!(curve.ra, Some(vec![Some(10.5)]));
        assert_eq!(curve.dec, Some(vec![Some(-20.25)]));
        assert_eq!(curve.filter, vec![Some("ztfi".to_string())]);
    }

    #[test]
    fn mjd_uses_exact_offset() {
        let record = normalize_row(&raw(100.0, 10.0));
        assert_eq!(record.mjd, Some(2458216.1234 - 2400000.5));
        assert!((record.mjd.unwrap() - 58215.6234).abs() < 1e-6);
    }

    #[test]
    fn filter_is_lowercased_without_underscores() {
        assert_eq!(normalize_filter("ZTF_g"), "ztfg");
        assert_eq!(normalize_filter("ZTF_r"), "ztfr");
        assert_eq!(normalize_filter("ztfi"), "ztfi");
    }

    #[test]
    fn low_snr_is_masked() {
        let record = normalize_row(&raw(10.0, 4.0));
        assert_eq!(record.mag, None);
        assert_eq!(record.magerr, None);
        assert_eq!(record.limiting_mag, Some(20.5), "limiting mag survives masking");
    }

    #[test]
    fn zero_uncertainty_is_masked() {
        let record = normalize_row(&raw(10.0, 0.0));
        assert_eq!(record.mag, None);
        assert_eq!(record.magerr, None);
    }

    #[test]
    fn nan_flux_is_masked() {
        let record = normalize_row(&raw(f64::NAN, 1.0));
        assert_eq!(record.mag, None);
        assert_eq!(record.magerr, None);
    }

    #[test]
    fn negative_flux_is_masked() {
        let record = normalize_row(&raw(-50.0, 5.0));
        assert_eq!(record.mag, None);
    }

    #[test]
    fn detection_gets_magnitude_and_error() {
        let record = normalize_row(&raw(100.0, 10.0));
        let expected_mag = 26.0 - 2.5 * 100f64.log10();
        assert_eq!(record.mag, Some(expected_mag));
        assert!((record.mag.unwrap() - 21.0).abs() < 1e-12);
        assert_eq!(record.magerr, Some(1.0857 * 10.0 / 100.0));
    }

    #[test]
    fn snr_exactly_at_threshold_is_kept() {
        let record = normalize_row(&raw(30.0, 10.0));
        assert!(record.mag.is_some());
    }

    #[test]
    fn normalize_produces_parallel_columns_with_ab_tag() {
        let text = payload(&[
            "0 680 2 3 ZTF_g 1 2458216.1234 20.5 26.0 100.0 10.0 0",
            "1 680 2 3 ZTF_r 2 2458217.1234 20.1 26.0 10.0 4.0 0",
            "2 680 2 3 ZTF_g 3 2458218.1234 null 26.0 NaN 4.0 0",
        ]);
        let curve = normalize_text(&text).unwrap();

        assert_eq!(curve.len(), 3);
        assert_eq!(curve.mag.len(), 3);
        assert_eq!(curve.magerr.len(), 3);
        assert_eq!(curve.limiting_mag, vec![Some(20.5), Some(20.1), None]);
        assert_eq!(curve.magsys, vec!["ab"; 3]);
        assert_eq!(curve.detections(), 1);
        assert_eq!(
            curve.filter,
            vec![
                Some("ztfg".to_string()),
                Some("ztfr".to_string()),
                Some("ztfg".to_string())
            ]
        );
        assert!(curve.ra.is_none());
    }
}
