//! Custom assertions for retrieval results

use lightcurve_dl::{LightCurve, Position, ResultSet};

/// Assert that `position` has a light curve and return it
pub fn expect_curve<'a>(results: &'a ResultSet, position: &Position) -> &'a LightCurve {
    match results.get(position) {
        Some(Some(curve)) => curve,
        Some(None) => panic!("position {position} has a null result"),
        None => panic!("position {position} missing from result set"),
    }
}

/// Assert that `position` is present with a null result
pub fn assert_null_result(results: &ResultSet, position: &Position) {
    assert_eq!(
        results.get(position),
        Some(None),
        "position {position} should have a null result"
    );
}

/// Assert the number of masked (null) magnitudes in a light curve
pub fn assert_masked(curve: &LightCurve, expected: usize) {
    let masked = curve.mag.iter().filter(|m| m.is_none()).count();
    assert_eq!(
        masked, expected,
        "expected {expected} masked magnitudes, found {masked} in {:?}",
        curve.mag
    );
    for (mag, magerr) in curve.mag.iter().zip(&curve.magerr) {
        assert_eq!(mag.is_none(), magerr.is_none(), "mag and magerr must be masked together");
    }
}
