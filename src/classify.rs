//! Exit-code classification
//!
//! Maps the exit code of a finished forced-photometry job to a
//! [`Disposition`]. Codes 63 and 65 mean the job returned no epochs, 64 and
//! 255 mean it failed; neither is fetched. Everything else, including codes
//! the service has never documented, is fetched.

use crate::types::Disposition;
use tracing::warn;

/// Exit codes documented by the service, with their messages
pub const EXIT_CODES: &[(i32, &str)] = &[
    (0, "Successful execution"),
    (
        56,
        "One or more epochs have photometry measurements that may be impacted by bad (including NaN'd) pixels",
    ),
    (
        57,
        "One or more epochs had no reference image catalog source falling with 5 arcsec",
    ),
    (
        58,
        "One or more epochs had a reference image PSF-catalog that does not exist in the archive",
    ),
    (
        59,
        "One or more epochs may have suspect photometric uncertainties due to early creation date of difference image in production",
    ),
    (
        60,
        "One or more epochs had upsampled diff-image PSF dimensions that were not odd integers",
    ),
    (
        61,
        "One or more epochs had diff-image cutouts that were off the image or too close to an edge",
    ),
    (
        62,
        "Requested start JD was before official survey start date [3/17/18] and was reset to 2018-03-17T00:00:00.0 UT",
    ),
    (63, "No records (epochs) returned by database query"),
    (64, "Catastrophic error (see log output)"),
    (65, "Requested end JD is before official survey start date [3/17/18]"),
    (
        255,
        "Database connection or query execution error (see log output)",
    ),
];

/// Outcome of classifying one exit code
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    /// What to do with the position
    pub disposition: Disposition,
    /// Human-readable explanation of the code
    pub message: String,
    /// Whether the code is one the service documents
    pub known: bool,
}

/// Look up the documented message for an exit code
pub fn exit_code_message(code: i32) -> Option<&'static str> {
    EXIT_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, message)| *message)
}

/// Classify an exit code
///
/// Unknown codes are fetch-eligible; a warning is logged so drift in the
/// service's code table gets noticed.
pub fn classify(code: i32) -> Classification {
    let disposition = match code {
        63 | 65 => Disposition::NoData,
        64 | 255 => Disposition::Error,
        _ => Disposition::Success,
    };

    match exit_code_message(code) {
        Some(message) => Classification {
            disposition,
            message: message.to_string(),
            known: true,
        },
        None => {
            warn!(exit_code = code, "Undocumented exit code, attempting fetch anyway");
            Classification {
                disposition,
                message: format!("Undocumented exit code {code}"),
                known: false,
            }
        }
    }
}
