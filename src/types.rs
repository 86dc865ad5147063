//! Core types for lightcurve-dl

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Number of decimal digits positions are rounded to on ingestion
pub const POSITION_DECIMALS: usize = 7;

/// Photometric system tag attached to every normalized record
pub const MAGSYS_AB: &str = "ab";

/// A sky position (right ascension, declination) in degrees
///
/// Both coordinates are rounded to [`POSITION_DECIMALS`] digits on creation, so
/// two positions compare equal exactly when their rounded values are equal.
/// This is the identity used to match submitted positions against rows of the
/// service's job table.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(from = "PositionFields")]
pub struct Position {
    ra: f64,
    dec: f64,
}

#[derive(Deserialize)]
struct PositionFields {
    ra: f64,
    dec: f64,
}

impl From<PositionFields> for Position {
    fn from(fields: PositionFields) -> Self {
        Self::new(fields.ra, fields.dec)
    }
}

impl Position {
    /// Create a position, rounding both coordinates to 7 decimal digits
    #[must_use]
    pub fn new(ra: f64, dec: f64) -> Self {
        Self {
            ra: round_coordinate(ra),
            dec: round_coordinate(dec),
        }
    }

    /// Right ascension in degrees
    pub fn ra(&self) -> f64 {
        self.ra
    }

    /// Declination in degrees
    pub fn dec(&self) -> f64 {
        self.dec
    }

    /// String key used in the result set, e.g. `"10.1234567,20.7654321"`
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        canonical_bits(self.ra) == canonical_bits(other.ra)
            && canonical_bits(self.dec) == canonical_bits(other.dec)
    }
}

impl Eq for Position {}

impl Hash for Position {
    fn hash<H: Hasher>(&self, state: &mut H) {
        canonical_bits(self.ra).hash(state);
        canonical_bits(self.dec).hash(state);
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", format_coordinate(self.ra), format_coordinate(self.dec))
    }
}

/// Round to 7 decimals the way `printf("%.7f")` does, then re-parse
fn round_coordinate(value: f64) -> f64 {
    format!("{:.*}", POSITION_DECIMALS, value)
        .parse()
        .unwrap_or(value)
}

// -0.0 and 0.0 are the same position
fn canonical_bits(value: f64) -> u64 {
    if value == 0.0 { 0 } else { value.to_bits() }
}

/// Format a coordinate the way Python's `repr` does
///
/// Whole numbers keep a decimal point (`30.0`, not `30`) and magnitudes below
/// 1e-4 switch to exponent form with a two-digit exponent (`1e-05`).
fn format_coordinate(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        return format!("{value:.1}");
    }
    if value.is_finite() && value.abs() < 1e-4 {
        let formatted = format!("{value:e}");
        if let Some((mantissa, exponent)) = formatted.split_once('e') {
            if let Ok(exponent) = exponent.parse::<i32>() {
                let sign = if exponent < 0 { '-' } else { '+' };
                return format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs());
            }
        }
    }
    format!("{value}")
}

/// One row of the service's job status table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobRow {
    /// Position the job was submitted for
    pub position: Position,
    /// Exit code of the job; `None` while the job has not finished
    pub exit_code: Option<i32>,
    /// Service-relative reference to the light-curve file
    pub lightcurve: Option<String>,
    /// Remaining status columns (request id, timestamps, ...)
    #[serde(default)]
    pub aux: BTreeMap<String, String>,
}

impl JobRow {
    /// Whether the service reports this job as finished
    pub fn is_finished(&self) -> bool {
        self.exit_code.is_some()
    }
}

/// What to do with a position, derived from its job's exit code
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Photometry is available; the light curve is fetched
    Success,
    /// The job finished but produced no epochs
    NoData,
    /// The job failed on the service side
    Error,
    /// No finished job for the position yet
    Pending,
}

impl Disposition {
    /// Whether a light-curve fetch is attempted for this disposition
    pub fn is_fetch_eligible(&self) -> bool {
        matches!(self, Disposition::Success)
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Disposition::Success => "success",
            Disposition::NoData => "no_data",
            Disposition::Error => "error",
            Disposition::Pending => "pending",
        };
        f.write_str(s)
    }
}

/// One normalized photometric epoch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhotometricRecord {
    /// Modified Julian date
    pub mjd: Option<f64>,
    /// AB magnitude, null below the detection threshold
    pub mag: Option<f64>,
    /// Magnitude uncertainty, null whenever `mag` is null
    pub magerr: Option<f64>,
    /// Limiting magnitude of the epoch
    pub limiting_mag: Option<f64>,
    /// Filter name, lowercase without underscores (e.g. `ztfg`)
    pub filter: Option<String>,
    /// Right ascension, when the upstream table carries it
    pub ra: Option<f64>,
    /// Declination, when the upstream table carries it
    pub dec: Option<f64>,
}

/// Column-major table of normalized photometric records for one position
///
/// Every column has one entry per epoch. `ra`/`dec` are only present when the
/// fetched table contained them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LightCurve {
    /// Modified Julian dates
    pub mjd: Vec<Option<f64>>,
    /// Magnitudes
    pub mag: Vec<Option<f64>>,
    /// Magnitude uncertainties
    pub magerr: Vec<Option<f64>>,
    /// Limiting magnitudes
    pub limiting_mag: Vec<Option<f64>>,
    /// Normalized filter names
    pub filter: Vec<Option<String>>,
    /// Right ascensions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ra: Option<Vec<Option<f64>>>,
    /// Declinations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dec: Option<Vec<Option<f64>>>,
    /// Photometric system tag of each epoch (always `"ab"`)
    pub magsys: Vec<String>,
}

impl LightCurve {
    /// Pivot row records into columns
    ///
    /// `with_coordinates` controls whether `ra`/`dec` columns are emitted.
    pub fn from_records(records: Vec<PhotometricRecord>, with_coordinates: bool) -> Self {
        let mut curve = LightCurve {
            ra: with_coordinates.then(Vec::new),
            dec: with_coordinates.then(Vec::new),
            ..Default::default()
        };
        for record in records {
            curve.mjd.push(record.mjd);
            curve.mag.push(record.mag);
            curve.magerr.push(record.magerr);
            curve.limiting_mag.push(record.limiting_mag);
            curve.filter.push(record.filter);
            if let Some(ra) = curve.ra.as_mut() {
                ra.push(record.ra);
            }
            if let Some(dec) = curve.dec.as_mut() {
                dec.push(record.dec);
            }
            curve.magsys.push(MAGSYS_AB.to_string());
        }
        curve
    }

    /// Number of epochs
    pub fn len(&self) -> usize {
        self.mjd.len()
    }

    /// Whether the light curve has no epochs
    pub fn is_empty(&self) -> bool {
        self.mjd.is_empty()
    }

    /// Number of epochs with a magnitude (detections)
    pub fn detections(&self) -> usize {
        self.mag.iter().filter(|m| m.is_some()).count()
    }

    /// Row view of epoch `index`
    pub fn record(&self, index: usize) -> Option<PhotometricRecord> {
        if index >= self.len() {
            return None;
        }
        Some(PhotometricRecord {
            mjd: self.mjd[index],
            mag: self.mag[index],
            magerr: self.magerr[index],
            limiting_mag: self.limiting_mag[index],
            filter: self.filter[index].clone(),
            ra: self.ra.as_ref().and_then(|c| c[index]),
            dec: self.dec.as_ref().and_then(|c| c[index]),
        })
    }
}

/// Final mapping from position to light curve, in request order
///
/// A `None` entry means the position has no usable photometry (no data,
/// service-side error, or, in partial mode, a failed fetch).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    entries: Vec<(Position, Option<LightCurve>)>,
}

impl ResultSet {
    pub(crate) fn from_entries(entries: Vec<(Position, Option<LightCurve>)>) -> Self {
        Self { entries }
    }

    /// Light curve for a position: `None` if the position is not in the set,
    /// `Some(None)` if it is present with a null result
    pub fn get(&self, position: &Position) -> Option<Option<&LightCurve>> {
        self.entries
            .iter()
            .find(|(p, _)| p == position)
            .map(|(_, curve)| curve.as_ref())
    }

    /// Number of positions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set holds no positions
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in request order
    pub fn iter(&self) -> impl Iterator<Item = (&Position, Option<&LightCurve>)> {
        self.entries.iter().map(|(p, c)| (p, c.as_ref()))
    }

    /// Number of positions that have a light curve
    pub fn with_data(&self) -> usize {
        self.entries.iter().filter(|(_, c)| c.is_some()).count()
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (position, curve) in &self.entries {
            map.serialize_entry(&position.key(), curve)?;
        }
        map.end()
    }
}

/// Per-position entry of the retrieval manifest
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionOutcome {
    /// The requested position
    pub position: Position,
    /// Exit code reported by the service
    pub exit_code: Option<i32>,
    /// Disposition derived from the exit code
    pub disposition: Disposition,
    /// Explanatory message for the exit code
    pub message: String,
    /// Number of epochs retrieved, if the fetch succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epochs: Option<usize>,
    /// Fetch error, if the fetch failed (partial mode only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a completed retrieval: the result set plus its manifest
#[derive(Clone, Debug, Default)]
pub struct Retrieval {
    /// Light curves keyed by position, in request order
    pub results: ResultSet,
    /// One outcome per requested position, in request order
    pub outcomes: Vec<PositionOutcome>,
}

impl Retrieval {
    /// Outcome manifest (keeps the no-data vs error distinction)
    pub fn manifest(&self) -> &[PositionOutcome] {
        &self.outcomes
    }

    /// Outcomes whose fetch failed
    pub fn failures(&self) -> impl Iterator<Item = &PositionOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }
}

/// Event emitted during a retrieval or submission
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Positions submitted to the service
    Submitted {
        /// Number of positions in the request
        positions: usize,
        /// HTTP status of the submission
        status: u16,
    },

    /// The job status table was queried
    StatusQueried {
        /// 1-based poll attempt
        attempt: u32,
        /// Number of rows in the table
        rows: usize,
    },

    /// Some positions have no finished job yet
    Pending {
        /// 1-based poll attempt
        attempt: u32,
        /// Number of positions still pending
        pending: usize,
    },

    /// Waiting before the next status query
    PollBackoff {
        /// 1-based poll attempt that just finished
        attempt: u32,
        /// Delay in milliseconds
        delay_ms: u64,
        /// Reason for backing off
        reason: String,
    },

    /// Every requested position has a finished job
    Reconciled {
        /// Number of matched positions
        matched: usize,
        /// Number of positions that will be fetched
        eligible: usize,
    },

    /// A position was not fetched because its job produced no usable data
    PositionSkipped {
        /// Position key
        position: String,
        /// Disposition of the job
        disposition: Disposition,
        /// Exit code message
        message: String,
    },

    /// A light curve was fetched and normalized
    Fetched {
        /// Position key
        position: String,
        /// Number of epochs
        epochs: usize,
        /// Number of epochs with a magnitude
        detections: usize,
    },

    /// A light-curve fetch failed
    FetchFailed {
        /// Position key
        position: String,
        /// Error message
        error: String,
    },

    /// Retrieval finished
    Completed {
        /// Number of positions in the result set
        positions: usize,
        /// Number of positions with a light curve
        with_data: usize,
    },
}
