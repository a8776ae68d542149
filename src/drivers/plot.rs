use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::LineSeries;
use plotters::prelude::*;
use crate::drivers::error::SweepError;
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub foreground: RGBColor,
    pub palette: Vec<RGBColor>,
}
impl PlotStyle {
    /// Palette entry for a line, falling back to the foreground colour.
    pub fn color(&self, idx: usize) -> RGBColor {
        if self.palette.is_empty() {
            self.foreground
        } else {
            self.palette[idx % self.palette.len()]
        }
    }
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
            background: WHITE,
            foreground: BLACK,
            palette: vec![
                RGBColor(102, 102, 102),
                RGBColor(31, 119, 180),
                RGBColor(214, 39, 40),
                RGBColor(44, 160, 44),
            ],
        }
    }
}
/// One labelled line of a code-indexed chart.
#[derive(Clone, Debug)]
pub struct ChartSeries {
    pub label: String,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}
impl ChartSeries {
    pub fn new(label: impl Into<String>, xs: Vec<f64>, ys: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            xs,
            ys,
        }
    }
    /// True when at least one sample can be drawn.
    pub fn has_points(&self) -> bool {
        self.xs
            .iter()
            .zip(&self.ys)
            .any(|(x, y)| x.is_finite() && y.is_finite())
    }
}
/// Splits a polyline at NaN samples so gaps stay visible.
fn segments(points: impl Iterator<Item = (f64, f64)>) -> Vec<Vec<(f64, f64)>> {
    let mut out = vec![Vec::new()];
    for (x, y) in points {
        if x.is_finite() && y.is_finite() {
            if let Some(last) = out.last_mut() {
                last.push((x, y));
            }
        } else if out.last().map_or(false, |s| !s.is_empty()) {
            out.push(Vec::new());
        }
    }
    out.retain(|s| !s.is_empty());
    out
}
fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return None;
    }
    if (hi - lo).abs() < f64::EPSILON {
        Some((lo - 1.0, hi + 1.0))
    } else {
        let pad = (hi - lo) * 0.05;
        Some((lo - pad, hi + pad))
    }
}
/// Positive frequency range and amplitude range of a set of responses, if any can be drawn.
pub fn response_bounds(
    frequencies: &[&[f64]],
    amplitudes: &[&[f64]],
) -> Option<((f64, f64), (f64, f64))> {
    let (f_min, f_max) = frequencies
        .iter()
        .flat_map(|f| f.iter().copied())
        .filter(|f| f.is_finite() && *f > 0.0)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !(f_min < f_max) {
        return None;
    }
    let amps = bounds(amplitudes.iter().flat_map(|a| a.iter().copied()))?;
    Some(((f_min, f_max), amps))
}
/// Per-code transfer curves on a logarithmic frequency axis, with the cutoff level marked.
pub fn render_response_png(
    frequencies: &[&[f64]],
    amplitudes: &[&[f64]],
    cutoff_amplitude: Option<f64>,
    style: &PlotStyle,
) -> Result<Vec<u8>, SweepError> {
    let ((f_min, f_max), _) = response_bounds(frequencies, amplitudes)
        .ok_or_else(|| SweepError::Plot("response has nothing to draw".into()))?;
    let (y_min, y_max) = bounds(
        amplitudes
            .iter()
            .flat_map(|a| a.iter().copied())
            .chain(cutoff_amplitude.filter(|v| v.is_finite())),
    )
    .ok_or_else(|| SweepError::Plot("response has no amplitudes".into()))?;
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(
                "Transfer coefficient",
                ("sans-serif", 22).into_font().color(&style.foreground),
            )
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 45)
            .build_cartesian_2d((f_min..f_max).log_scale(), y_min..y_max)?;
        chart
            .configure_mesh()
            .x_desc("F, Hz")
            .y_desc("Gain, dB")
            .light_line_style(&style.foreground.mix(0.1))
            .draw()?;
        let color = style.color(0);
        for (freqs, amps) in frequencies.iter().zip(amplitudes) {
            let points = freqs
                .iter()
                .copied()
                .zip(amps.iter().copied())
                .filter(|(f, _)| *f > 0.0);
            for segment in segments(points) {
                chart.draw_series(LineSeries::new(segment, &color))?;
            }
        }
        if let Some(level) = cutoff_amplitude {
            let marker = style.color(2);
            chart
                .draw_series(LineSeries::new(vec![(f_min, level), (f_max, level)], &marker))?
                .label(format!("cutoff {level:.2} dB"))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &marker));
            chart
                .configure_series_labels()
                .border_style(&style.foreground.mix(0.2))
                .background_style(&style.background)
                .draw()?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
/// Line chart over the code index, one line per series.
pub fn render_chart_png(
    title: &str,
    x_desc: &str,
    y_desc: &str,
    series: &[ChartSeries],
    style: &PlotStyle,
) -> Result<Vec<u8>, SweepError> {
    if !series.iter().any(ChartSeries::has_points) {
        return Err(SweepError::Plot(format!("chart '{title}' has no data")));
    }
    let (x_min, x_max) = bounds(series.iter().flat_map(|s| s.xs.iter().copied()))
        .ok_or_else(|| SweepError::Plot(format!("chart '{title}' has no x values")))?;
    let (y_min, y_max) = bounds(series.iter().flat_map(|s| s.ys.iter().copied()))
        .ok_or_else(|| SweepError::Plot(format!("chart '{title}' has no finite values")))?;
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(title, ("sans-serif", 22).into_font().color(&style.foreground))
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 45)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
        chart
            .configure_mesh()
            .x_desc(x_desc)
            .y_desc(y_desc)
            .light_line_style(&style.foreground.mix(0.1))
            .draw()?;
        for (idx, line) in series.iter().enumerate() {
            let color = style.color(idx);
            let points = line.xs.iter().copied().zip(line.ys.iter().copied());
            for (n, segment) in segments(points).into_iter().enumerate() {
                let drawn = chart.draw_series(LineSeries::new(segment, &color))?;
                if n == 0 {
                    drawn
                        .label(line.label.clone())
                        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
                }
            }
        }
        if series.len() > 1 {
            chart
                .configure_series_labels()
                .border_style(&style.foreground.mix(0.2))
                .background_style(&style.background)
                .draw()?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, SweepError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| SweepError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
#[cfg(test)]
mod tests {
    use super::*;
    fn small() -> PlotStyle {
        PlotStyle {
            width: 320,
            height: 240,
            ..PlotStyle::default()
        }
    }
    #[test]
    fn nan_samples_split_lines() {
        let pts = vec![(0.0, 1.0), (1.0, f64::NAN), (2.0, 3.0), (3.0, 4.0)];
        let segs = segments(pts.into_iter());
        assert_eq!(segs, vec![vec![(0.0, 1.0)], vec![(2.0, 3.0), (3.0, 4.0)]]);
    }
    #[test]
    #[ignore = "text rendering needs a system sans-serif font"]
    fn chart_helpers_return_png() {
        let series = vec![
            ChartSeries::new("x2", vec![0.0, 1.0, 2.0], vec![10.0, 12.0, f64::NAN]),
            ChartSeries::new("x3", vec![0.0, 1.0, 2.0], vec![20.0, 22.0, 25.0]),
        ];
        let png = render_chart_png("Loss", "Code", "dB", &series, &small()).unwrap();
        assert!(!png.is_empty());
        let freqs: &[f64] = &[1.0e5, 1.0e6, 1.0e7];
        let amps: &[f64] = &[0.0, -3.0, -20.0];
        let png = render_response_png(&[freqs], &[amps], Some(-6.0), &small()).unwrap();
        assert!(!png.is_empty());
    }
    #[test]
    fn series_without_finite_pairs_has_no_points() {
        assert!(!ChartSeries::new("delta", vec![0.0], vec![f64::NAN]).has_points());
        assert!(!ChartSeries::new("x2", vec![], vec![]).has_points());
        assert!(ChartSeries::new("x3", vec![0.0, 1.0], vec![f64::NAN, 3.0]).has_points());
    }
    #[test]
    fn empty_palette_falls_back_to_foreground() {
        let style = PlotStyle {
            palette: Vec::new(),
            ..PlotStyle::default()
        };
        assert_eq!(style.color(0), style.foreground);
        assert_eq!(PlotStyle::default().color(5), PlotStyle::default().palette[1]);
    }
    #[test]
    fn response_bounds_need_a_frequency_span() {
        let freqs: &[f64] = &[1.0e5, 1.0e6];
        let amps: &[f64] = &[0.0, -3.0];
        let silent: &[f64] = &[f64::NAN, f64::NAN];
        assert!(response_bounds(&[freqs], &[amps]).is_some());
        assert!(response_bounds(&[&freqs[..1]], &[&amps[..1]]).is_none());
        assert!(response_bounds(&[freqs], &[silent]).is_none());
    }
    #[test]
    fn empty_chart_is_rejected() {
        let err = render_chart_png("Delta", "Code", "dF", &[], &small()).unwrap_err();
        assert!(matches!(err, SweepError::Plot(_)));
    }
}
