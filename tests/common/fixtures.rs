//! Status pages and light-curve payloads served by mock servers

use lightcurve_dl::Position;

/// One row of a mock status table
pub struct StatusRow {
    /// Position as printed by the service
    pub ra: String,
    /// Declination as printed by the service
    pub dec: String,
    /// Exit code cell; empty while the job runs
    pub exit_code: String,
    /// Light-curve reference, rendered as a link when present
    pub lightcurve: Option<String>,
}

impl StatusRow {
    /// A finished job with the given exit code and light-curve path
    pub fn finished(position: Position, exit_code: i32, lightcurve: &str) -> Self {
        Self {
            ra: position.ra().to_string(),
            dec: position.dec().to_string(),
            exit_code: exit_code.to_string(),
            lightcurve: Some(lightcurve.to_string()),
        }
    }

    /// A job that has not finished yet
    pub fn running(position: Position) -> Self {
        Self {
            ra: position.ra().to_string(),
            dec: position.dec().to_string(),
            exit_code: String::new(),
            lightcurve: None,
        }
    }
}

/// Render a status page the way the service does
pub fn status_page(rows: &[StatusRow]) -> String {
    let mut html = String::from(
        "<html><head><title>Forced photometry requests</title></head><body>\n\
         <table border=\"1\">\n\
         <tr><th>reqId</th><th>ra</th><th>dec</th><th>startJD</th><th>endJD</th>\
         <th>created</th><th>exitcode</th><th>lightcurve</th></tr>\n",
    );
    for (i, row) in rows.iter().enumerate() {
        let link = row
            .lightcurve
            .as_ref()
            .map(|lc| format!("<a href=\"{lc}\">{lc}</a>"))
            .unwrap_or_default();
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>2458216.1234</td><td>2458450.0253</td>\
             <td>2024-01-01 00:00:00</td><td>{}</td><td>{}</td></tr>\n",
            1000 + i,
            row.ra,
            row.dec,
            row.exit_code,
            link
        ));
    }
    html.push_str("</table>\n</body></html>\n");
    html
}

const LIGHTCURVE_HEADER: &str = " index, field, ccdid, qid, filter, pid, infobitssci, sciinpseeing, \
scibckgnd, scisigpix, zpmaginpsci, zpmaginpsciunc, zpmaginpscirms, clrcoeff, clrcoeffunc, ncalmatches, \
exptime, adpctdif1, adpctdif2, diffmaglim, zpdiff, programid, jd, rfid, forcediffimflux, \
forcediffimfluxunc, forcediffimsnr, forcediffimchisq, forcediffimfluxap, forcediffimfluxuncap, \
forcediffimsnrap, aperturecorr, dnearestrefsrc, nearestrefmag, nearestrefmagunc, nearestrefchi, \
nearestrefsharp, refjdstart, refjdend, procstatus";

/// One epoch of a light-curve payload
pub struct Epoch {
    /// Julian date
    pub jd: f64,
    /// Filter name, e.g. `ZTF_g`
    pub filter: &'static str,
    /// Difference-image flux
    pub flux: f64,
    /// Flux uncertainty
    pub flux_unc: f64,
}

/// Render a light-curve payload with the full service header
pub fn lightcurve_payload(position: Position, epochs: &[Epoch]) -> String {
    let mut text = format!(
        "# Requested input R.A. = {} degrees\n\
         # Requested input Dec. = {} degrees\n\
         # Requested JD start = 2458216.1234 days\n\
         # Requested JD end = 2458450.0253 days\n\
         #\n",
        position.ra(),
        position.dec()
    );
    text.push_str(LIGHTCURVE_HEADER);
    text.push('\n');
    for (i, epoch) in epochs.iter().enumerate() {
        text.push_str(&format!(
            "{i} 680 2 3 {filter} {pid} 0 2.1 120.5 9.8 26.1 0.01 0.02 0.1 0.01 500 30 1.1 1.2 \
             20.5 26.0 1 {jd} 680120 {flux} {flux_unc} 1.0 1.0 null null null 1.0 0.5 18.0 0.01 1.0 \
             0.0 2458100.0 2458200.0 0\n",
            filter = epoch.filter,
            pid = 1_000_000 + i,
            jd = epoch.jd,
            flux = epoch.flux,
            flux_unc = epoch.flux_unc,
        ));
    }
    text
}

/// Three epochs; the second has SNR 2.5 and must be masked
pub fn three_epochs(position: Position) -> String {
    lightcurve_payload(
        position,
        &[
            Epoch {
                jd: 2458216.1234,
                filter: "ZTF_g",
                flux: 100.0,
                flux_unc: 10.0,
            },
            Epoch {
                jd: 2458217.1234,
                filter: "ZTF_r",
                flux: 10.0,
                flux_unc: 4.0,
            },
            Epoch {
                jd: 2458218.1234,
                filter: "ZTF_i",
                flux: 1000.0,
                flux_unc: 10.0,
            },
        ],
    )
}

/// The two positions used throughout the end-to-end tests
pub fn sample_positions() -> [Position; 2] {
    [
        Position::new(10.1234567, 20.7654321),
        Position::new(30.0000001, -5.0000002),
    ]
}
