use std::fs;
use std::path::{Path, PathBuf};
use log::info;
use crate::drivers::{
    render_chart_png, render_response_png, response_bounds, ChartSeries, Harmonic,
    MeasurementSession, PlotStyle, SweepError,
};
fn cell(value: f64) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        String::new()
    }
}
/// Writes a header row and one row per index; shorter columns leave blank cells.
fn write_table(path: &Path, headers: &[&str], columns: &[Vec<String>]) -> Result<(), SweepError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(headers)?;
    let rows = columns.iter().map(Vec::len).max().unwrap_or(0);
    for row in 0..rows {
        writer.write_record(columns.iter().map(|c| c.get(row).map_or("", String::as_str)))?;
    }
    writer.flush()?;
    Ok(())
}
fn indices(values: &[usize]) -> Vec<String> {
    values.iter().map(usize::to_string).collect()
}
fn cells(values: &[f64]) -> Vec<String> {
    values.iter().copied().map(cell).collect()
}
/// Spreadsheet export of the sweep and its derived statistics.
pub fn export_tables(session: &MeasurementSession, dir: &Path) -> Result<Vec<PathBuf>, SweepError> {
    info!("export to csv: {}", dir.display());
    fs::create_dir_all(dir)?;
    let mut files = Vec::new();
    if !session.is_empty() {
        let path = dir.join("sweep.csv");
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(["Code", "Frequency", "Amplitude"])?;
        for (code, point) in session.codes().iter().zip(session.points()) {
            for (f, a) in point.frequencies.iter().zip(&point.amplitudes) {
                writer.write_record([code.to_string(), cell(*f), cell(*a)])?;
            }
        }
        writer.flush()?;
        files.push(path);
    }
    let Some(stats) = session.stats() else {
        info!("no statistics to export");
        return Ok(files);
    };
    let tables: [(&str, &str, &[usize], &[f64]); 4] = [
        ("cutoff.csv", "Cutoff frequency", &stats.codes, &stats.cutoff_freqs),
        ("delta.csv", "Delta", &stats.delta_codes, &stats.delta_series),
        ("loss_x2.csv", "Loss at x2 frequency", &stats.codes, &stats.loss_double_freq),
        ("loss_x3.csv", "Loss at x3 frequency", &stats.codes, &stats.loss_triple_freq),
    ];
    for (name, y_name, xs, ys) in tables {
        let path = dir.join(name);
        write_table(&path, &["Code", y_name], &[indices(xs), cells(ys)])?;
        files.push(path);
    }
    let x2 = session.harmonic_deltas(Harmonic::Second);
    let x3 = session.harmonic_deltas(Harmonic::Third);
    if !x2.is_empty() || !x3.is_empty() {
        let path = dir.join("harmonics.csv");
        let codes: Vec<usize> = (0..x2.len().max(x3.len())).collect();
        write_table(
            &path,
            &["Code", "Suppression x2", "Suppression x3"],
            &[indices(&codes), cells(x2), cells(x3)],
        )?;
        files.push(path);
    }
    let path = dir.join("stats.json");
    fs::write(&path, serde_json::to_string_pretty(stats)?)?;
    files.push(path);
    Ok(files)
}
fn as_axis(values: &[usize]) -> Vec<f64> {
    values.iter().map(|&v| v as f64).collect()
}
enum Chart<'a> {
    Response {
        frequencies: Vec<&'a [f64]>,
        amplitudes: Vec<&'a [f64]>,
        cutoff_amplitude: Option<f64>,
    },
    Lines {
        title: String,
        y_desc: &'static str,
        series: Vec<ChartSeries>,
    },
}
impl Chart<'_> {
    fn has_points(&self) -> bool {
        match self {
            Chart::Response {
                frequencies,
                amplitudes,
                ..
            } => response_bounds(frequencies, amplitudes).is_some(),
            Chart::Lines { series, .. } => series.iter().any(ChartSeries::has_points),
        }
    }
    fn render(&self, style: &PlotStyle) -> Result<Vec<u8>, SweepError> {
        match self {
            Chart::Response {
                frequencies,
                amplitudes,
                cutoff_amplitude,
            } => render_response_png(frequencies, amplitudes, *cutoff_amplitude, style),
            Chart::Lines {
                title,
                y_desc,
                series,
            } => render_chart_png(title, "Code", y_desc, series, style),
        }
    }
}
/// Every chart the session can feed, keyed by file name; charts with nothing to draw are left out.
fn chart_plan(session: &MeasurementSession) -> Vec<(&'static str, Chart<'_>)> {
    let mut plan = vec![(
        "stats.png",
        Chart::Response {
            frequencies: session.frequencies_by_code(),
            amplitudes: session.amplitudes_by_code(),
            cutoff_amplitude: session.cutoff_amplitude(),
        },
    )];
    if let Some(stats) = session.stats() {
        let codes = as_axis(&stats.codes);
        plan.push((
            "cutoff.png",
            Chart::Lines {
                title: format!("Cutoff frequency at {} dB", stats.cutoff_offset_db),
                y_desc: "F, Hz",
                series: vec![ChartSeries::new("cutoff", codes.clone(), stats.cutoff_freqs.clone())],
            },
        ));
        plan.push((
            "delta.png",
            Chart::Lines {
                title: "Cutoff frequency delta".to_owned(),
                y_desc: "dF, Hz",
                series: vec![ChartSeries::new(
                    "delta",
                    as_axis(&stats.delta_codes),
                    stats.delta_series.clone(),
                )],
            },
        ));
        plan.push((
            "double-triple.png",
            Chart::Lines {
                title: "Loss at x2 and x3 cutoff frequency".to_owned(),
                y_desc: "Suppression, dB",
                series: vec![
                    ChartSeries::new("x2", codes.clone(), stats.loss_double_freq.clone()),
                    ChartSeries::new("x3", codes, stats.loss_triple_freq.clone()),
                ],
            },
        ));
    }
    let harmonics: Vec<ChartSeries> = Harmonic::ALL
        .iter()
        .map(|&h| {
            let ys = session.harmonic_deltas(h).to_vec();
            ChartSeries::new(h.to_string(), (0..ys.len()).map(|i| i as f64).collect(), ys)
        })
        .collect();
    plan.push((
        "harmonics.png",
        Chart::Lines {
            title: "2nd and 3rd harmonic suppression".to_owned(),
            y_desc: "Suppression, dB",
            series: harmonics,
        },
    ));
    plan.retain(|(name, chart)| {
        let keep = chart.has_points();
        if !keep {
            info!("skip {name}: nothing to draw");
        }
        keep
    });
    plan
}
/// PNG charts of the response curves and every derived series that has data.
pub fn export_charts(session: &MeasurementSession, dir: &Path) -> Result<Vec<PathBuf>, SweepError> {
    info!("saving images: {}", dir.display());
    let plan = chart_plan(session);
    if plan.is_empty() {
        return Ok(Vec::new());
    }
    fs::create_dir_all(dir)?;
    let style = PlotStyle::default();
    let mut files = Vec::with_capacity(plan.len());
    for (name, chart) in plan {
        let path = dir.join(name);
        fs::write(&path, chart.render(&style)?)?;
        files.push(path);
    }
    Ok(files)
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::SweepPoint;
    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lpf-sweep-{name}-{}", std::process::id()));
        fs::remove_dir_all(&dir).ok();
        dir
    }
    fn measured_session() -> MeasurementSession {
        let mut session = MeasurementSession::default();
        let freqs = vec![10.0, 20.0, 30.0, 40.0];
        session.record_point(
            0,
            SweepPoint {
                frequencies: freqs.clone(),
                amplitudes: vec![-2.0, -4.0, -8.0, -12.0],
            },
        );
        session.record_point(
            1,
            SweepPoint {
                frequencies: freqs,
                amplitudes: vec![-1.0, -3.0, -7.0, -15.0],
            },
        );
        session.compute_stats().unwrap();
        session
    }
    #[test]
    fn tables_hold_stats_columns() {
        let dir = scratch("tables");
        let mut session = measured_session();
        session.record_harmonic(Harmonic::Second, vec![-30.0]);
        session.record_harmonic(Harmonic::Second, vec![-41.0]);
        session.process_harmonic(Harmonic::Second).unwrap();
        let files = export_tables(&session, &dir).unwrap();
        let names: Vec<String> = files
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(
            names,
            vec![
                "sweep.csv",
                "cutoff.csv",
                "delta.csv",
                "loss_x2.csv",
                "loss_x3.csv",
                "harmonics.csv",
                "stats.json"
            ]
        );
        let cutoff = fs::read_to_string(dir.join("cutoff.csv")).unwrap();
        assert_eq!(cutoff, "Code,Cutoff frequency\n0,30\n1,30\n");
        let harmonics = fs::read_to_string(dir.join("harmonics.csv")).unwrap();
        assert_eq!(harmonics, "Code,Suppression x2,Suppression x3\n0,28,\n1,40,\n");
        let sweep = fs::read_to_string(dir.join("sweep.csv")).unwrap();
        assert_eq!(sweep.lines().count(), 9);
        fs::remove_dir_all(&dir).ok();
    }
    #[test]
    fn empty_session_exports_nothing() {
        let dir = scratch("empty");
        let session = MeasurementSession::default();
        assert!(export_tables(&session, &dir).unwrap().is_empty());
        assert!(export_charts(&session, &dir).unwrap().is_empty());
        fs::remove_dir_all(&dir).ok();
    }
    fn gapped_session() -> MeasurementSession {
        let mut session = MeasurementSession::default();
        session.record_point(0, SweepPoint::empty());
        session.record_point(
            1,
            SweepPoint {
                frequencies: vec![10.0, 20.0, 30.0],
                amplitudes: vec![-1.0, -7.0, -20.0],
            },
        );
        session.compute_stats().unwrap();
        session.record_harmonic(Harmonic::Second, Vec::new());
        session.record_harmonic(Harmonic::Second, vec![-30.0]);
        session.process_harmonic(Harmonic::Second).unwrap();
        session
    }
    #[test]
    fn gaps_export_as_blank_cells() {
        let dir = scratch("gaps");
        let session = gapped_session();
        let files = export_tables(&session, &dir).unwrap();
        assert_eq!(files.len(), 7);
        let read = |name: &str| fs::read_to_string(dir.join(name)).unwrap();
        assert_eq!(read("cutoff.csv"), "Code,Cutoff frequency\n0,20\n1,\n");
        assert_eq!(read("delta.csv"), "Code,Delta\n0,\n");
        assert_eq!(read("loss_x2.csv"), "Code,Loss at x2 frequency\n0,\n1,19\n");
        assert_eq!(
            read("harmonics.csv"),
            "Code,Suppression x2,Suppression x3\n0,,\n1,29,\n"
        );
        fs::remove_dir_all(&dir).ok();
    }
    #[test]
    fn charts_without_finite_values_are_skipped() {
        let session = gapped_session();
        let names: Vec<&str> = chart_plan(&session).into_iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec!["stats.png", "cutoff.png", "double-triple.png", "harmonics.png"]
        );
        assert!(chart_plan(&MeasurementSession::default()).is_empty());
    }
    #[test]
    #[ignore = "text rendering needs a system sans-serif font"]
    fn gapped_session_renders_every_drawable_chart() {
        let dir = scratch("charts");
        let files = export_charts(&gapped_session(), &dir).unwrap();
        assert_eq!(files.len(), 4);
        assert!(files.iter().all(|f| fs::metadata(f).map_or(false, |m| m.len() > 0)));
        fs::remove_dir_all(&dir).ok();
    }
    #[test]
    fn nan_cells_are_left_blank() {
        assert_eq!(cell(f64::NAN), "");
        assert_eq!(cell(-6.5), "-6.5");
    }
}
