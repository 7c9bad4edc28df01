use std::ops::Range;

use chrono::{Datelike, NaiveDate};
use image::RgbImage;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use super::{Chart, Layout, Renderer};
use crate::color::{coolwarm, generate_palette};
use crate::data::model::{Table, Value};
use crate::error::{Result, VizError};
use crate::stats::BoxStats;
use crate::transform::aggregate::{
    CorrelationMatrix, DualFit, Distributions, MonthlyMeans, TOTAL_COLUMN, VALUE_COLUMN,
    VARIABLE_COLUMN,
};

type Area<'b> = DrawingArea<BitMapBackend<'b>, Shift>;
type XyChart<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

const FONT: &str = "sans-serif";

// ---------------------------------------------------------------------------
// PNG renderer (plotters bitmap backend into an in-memory RGB buffer)
// ---------------------------------------------------------------------------

/// Draws charts with plotters. Nothing is written to disk here.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngRenderer;

impl Renderer for PngRenderer {
    fn render(&self, chart: &Chart<'_>, layout: &Layout) -> Result<RgbImage> {
        let (w, h) = (layout.width, layout.height);
        let mut buf = vec![0u8; w as usize * h as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buf, (w, h)).into_drawing_area();
            root.fill(&WHITE)?;
            let area = root.titled(&layout.title, (FONT, 28).into_font())?;

            match *chart {
                Chart::CategoricalBars { tally, identity } => {
                    categorical_bars(&area, tally, identity, layout)?
                }
                Chart::Heatmap(matrix) => heatmap(&area, matrix)?,
                Chart::ScatterWithFits { points, fits } => scatter_with_fits(&area, points, fits, layout)?,
                Chart::TimeLine { points } => time_line(&area, points, layout)?,
                Chart::GroupedBars(means) => grouped_bars(&area, means, layout)?,
                Chart::BoxPlots(dist) => box_plots(&area, dist, layout)?,
            }
            root.present()?;
        }
        RgbImage::from_raw(w, h, buf)
            .ok_or_else(|| VizError::Render(format!("{} chart: pixel buffer size mismatch", chart.kind())))
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Label for a tick at `x` on a category axis whose categories sit at
/// 0, 1, 2, ...; ticks between categories stay blank.
fn category_label(labels: &[String], x: f64) -> String {
    let i = x.round();
    if (x - i).abs() > 1e-6 || i < 0.0 {
        return String::new();
    }
    labels.get(i as usize).cloned().unwrap_or_default()
}

/// Range around `[lo, hi]` with 5 % head-room either side.
fn padded(lo: f64, hi: f64) -> Range<f64> {
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    let span = if hi > lo { hi - lo } else { lo.abs().max(1.0) };
    (lo - span * 0.05)..(hi + span * 0.05)
}

/// Bar value axis from zero to a little above `max`.
fn bar_range(max: f64) -> Range<f64> {
    if max.is_finite() && max > 0.0 {
        0.0..max * 1.1
    } else {
        0.0..1.0
    }
}

/// Cartesian chart with categories along x and a numeric y axis.
fn category_chart<'a, 'b>(
    area: &'a Area<'b>,
    caption: &str,
    labels: &[String],
    y: Range<f64>,
    x_desc: &str,
    y_desc: &str,
) -> Result<XyChart<'a, 'b>> {
    let n = labels.len().max(1) as f64;
    let mut chart = ChartBuilder::on(area)
        .caption(caption, (FONT, 20).into_font())
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5..n - 0.5, y)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len() * 2 + 2)
        .x_label_style((FONT, 14).into_font())
        .x_label_formatter(&|x| category_label(labels, *x))
        .x_desc(x_desc)
        .y_desc(y_desc)
        .draw()?;
    Ok(chart)
}

fn draw_legend<'a, 'b: 'a>(chart: &mut XyChart<'a, 'b>, position: SeriesLabelPosition) -> Result<()> {
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .position(position)
        .draw()?;
    Ok(())
}

/// One hue per group, bars of width `0.8 / groups` side by side
/// around each category centre.
fn bar_span(category: usize, group: usize, groups: usize) -> (f64, f64) {
    let width = 0.8 / groups.max(1) as f64;
    let x0 = category as f64 - 0.4 + group as f64 * width;
    (x0, x0 + width)
}

// ---------------------------------------------------------------------------
// Categorical tally: one panel per identity value
// ---------------------------------------------------------------------------

fn categorical_bars(area: &Area<'_>, tally: &Table, identity: &str, layout: &Layout) -> Result<()> {
    let ids = &tally.column(identity)?.values;
    let vars = &tally.column(VARIABLE_COLUMN)?.values;
    let vals = &tally.column(VALUE_COLUMN)?.values;
    let totals = tally.numeric(TOTAL_COLUMN)?;

    // variables keep the order the tally was built with
    let mut variables: Vec<&Value> = Vec::new();
    for v in vars {
        if !variables.contains(&v) {
            variables.push(v);
        }
    }
    let labels: Vec<String> = variables.iter().map(|v| v.to_string()).collect();
    let panels: Vec<Value> = tally.unique_values(identity)?.into_iter().collect();
    let hues: Vec<Value> = tally.unique_values(VALUE_COLUMN)?.into_iter().collect();
    let palette = generate_palette(hues.len());
    let max = totals.iter().flatten().copied().fold(0.0, f64::max);

    let areas = area.split_evenly((1, panels.len().max(1)));
    for (panel_area, panel) in areas.iter().zip(&panels) {
        let mut chart = category_chart(
            panel_area,
            &format!("{identity} = {panel}"),
            &labels,
            bar_range(max),
            &layout.x_label,
            &layout.y_label,
        )?;

        for (h, hue) in hues.iter().enumerate() {
            let color = palette[h];
            let bars: Vec<Rectangle<(f64, f64)>> = (0..tally.len())
                .filter(|&row| &ids[row] == panel && &vals[row] == hue)
                .filter_map(|row| {
                    let category = variables.iter().position(|v| *v == &vars[row])?;
                    let (x0, x1) = bar_span(category, h, hues.len());
                    Some(Rectangle::new([(x0, 0.0), (x1, totals[row]?)], color.filled()))
                })
                .collect();
            chart
                .draw_series(bars)?
                .label(format!("value = {hue}"))
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
        }
        draw_legend(&mut chart, SeriesLabelPosition::UpperRight)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Correlation heatmap (lower triangle only)
// ---------------------------------------------------------------------------

fn heatmap(area: &Area<'_>, matrix: &CorrelationMatrix) -> Result<()> {
    let n = matrix.len();
    if n == 0 {
        return Err(VizError::insufficient("heatmap", "no numeric columns"));
    }
    let extent = n as f64;
    let labels = &matrix.columns;
    // row 0 is drawn at the top
    let flip = |i: usize| (n - 1 - i) as f64;

    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .x_label_area_size(80)
        .y_label_area_size(100)
        .build_cartesian_2d(-0.5..extent - 0.5, -0.5..extent - 0.5)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n * 2 + 2)
        .y_labels(n * 2 + 2)
        .x_label_formatter(&|x| category_label(labels, *x))
        .y_label_formatter(&|y| {
            let i = y.round();
            if (y - i).abs() > 1e-6 || i < 0.0 || i >= extent {
                String::new()
            } else {
                category_label(labels, (n - 1) as f64 - i)
            }
        })
        .draw()?;

    let cells: Vec<(usize, usize, f64)> = matrix
        .visible_cells()
        .filter_map(|(i, j, v)| Some((i, j, v?)))
        .collect();

    let rect = |i: usize, j: usize| {
        let (x, y) = (j as f64, flip(i));
        [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)]
    };
    chart.draw_series(
        cells
            .iter()
            .map(|&(i, j, v)| Rectangle::new(rect(i, j), coolwarm(v).filled())),
    )?;
    chart.draw_series(
        cells
            .iter()
            .map(|&(i, j, _)| Rectangle::new(rect(i, j), WHITE.stroke_width(1))),
    )?;

    let style = TextStyle::from((FONT, 14).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
    chart.draw_series(cells.iter().map(|&(i, j, v)| {
        Text::new(format!("{v:.1}"), (j as f64, flip(i)), style.clone())
    }))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Scatter with both regression lines
// ---------------------------------------------------------------------------

fn scatter_with_fits(area: &Area<'_>, points: &[(f64, f64)], fits: &DualFit, layout: &Layout) -> Result<()> {
    let all_line = fits.all.line();
    let recent_line = fits.recent.line();

    let xs = points.iter().map(|p| p.0).chain(all_line.iter().map(|p| p.0));
    let ys = points
        .iter()
        .map(|p| p.1)
        .chain(all_line.iter().map(|p| p.1))
        .chain(recent_line.iter().map(|p| p.1));
    let (x_lo, x_hi) = xs.fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), v| (a.min(v), b.max(v)));
    let (y_lo, y_hi) = ys.fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), v| (a.min(v), b.max(v)));

    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(padded(x_lo, x_hi), padded(y_lo, y_hi))?;

    chart
        .configure_mesh()
        .x_label_formatter(&|x| format!("{x:.0}"))
        .y_label_formatter(&|y| format!("{y:.1}"))
        .x_desc(layout.x_label.as_str())
        .y_desc(layout.y_label.as_str())
        .draw()?;

    let dot = BLUE.mix(0.7).filled();
    chart
        .draw_series(points.iter().map(|&p| Circle::new(p, 3, dot)))?
        .label("Data points")
        .legend(move |(x, y)| Circle::new((x + 6, y), 3, dot));

    chart
        .draw_series(LineSeries::new(all_line, RED.stroke_width(2)))?
        .label(format!("Best fit line ({}–{})", fits.all.domain_start, fits.all.domain_end))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));

    let green = RGBColor(0, 150, 0);
    chart
        .draw_series(LineSeries::new(recent_line, green.stroke_width(2)))?
        .label(format!("Best fit line ({}–{})", fits.cutoff, fits.recent.domain_end))
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], green.stroke_width(2)));

    draw_legend(&mut chart, SeriesLabelPosition::UpperLeft)
}

// ---------------------------------------------------------------------------
// Daily line plot
// ---------------------------------------------------------------------------

fn day_number(d: NaiveDate) -> f64 {
    f64::from(d.num_days_from_ce())
}

fn time_line(area: &Area<'_>, points: &[(NaiveDate, f64)], layout: &Layout) -> Result<()> {
    let (Some(first), Some(last)) = (
        points.iter().map(|p| p.0).min(),
        points.iter().map(|p| p.0).max(),
    ) else {
        return Err(VizError::insufficient("line plot", "no dated values"));
    };
    let (y_lo, y_hi) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), p| (a.min(p.1), b.max(p.1)));

    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(day_number(first)..day_number(last) + 1.0, padded(y_lo, y_hi))?;

    chart
        .configure_mesh()
        .x_labels(12)
        .x_label_formatter(&|x| {
            NaiveDate::from_num_days_from_ce_opt(x.round() as i32)
                .map(|d| d.format("%Y-%m").to_string())
                .unwrap_or_default()
        })
        .y_label_formatter(&|y| format!("{y:.0}"))
        .x_desc(layout.x_label.as_str())
        .y_desc(layout.y_label.as_str())
        .draw()?;

    chart.draw_series(LineSeries::new(
        points.iter().map(|&(d, v)| (day_number(d), v)),
        RED.stroke_width(1),
    ))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Mean per month grouped by year
// ---------------------------------------------------------------------------

fn grouped_bars(area: &Area<'_>, means: &MonthlyMeans, layout: &Layout) -> Result<()> {
    let labels: Vec<String> = means.years.iter().map(|y| y.to_string()).collect();
    // colours are tied to the calendar month, not to its position
    let palette = generate_palette(12);

    let mut chart = category_chart(
        area,
        "",
        &labels,
        bar_range(means.max().unwrap_or(0.0)),
        &layout.x_label,
        &layout.y_label,
    )?;

    for (m, month) in means.months.iter().enumerate() {
        let color = palette[(month.number() - 1) as usize];
        let bars: Vec<Rectangle<(f64, f64)>> = means
            .cells
            .iter()
            .enumerate()
            .filter_map(|(y, row)| {
                let v = row[m]?;
                let (x0, x1) = bar_span(y, m, means.months.len());
                Some(Rectangle::new([(x0, 0.0), (x1, v)], color.filled()))
            })
            .collect();
        chart
            .draw_series(bars)?
            .label(month.name())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
    }
    draw_legend(&mut chart, SeriesLabelPosition::UpperLeft)
}

// ---------------------------------------------------------------------------
// Box plots: trend (by year) and seasonality (by month)
// ---------------------------------------------------------------------------

fn box_panel(area: &Area<'_>, caption: &str, x_desc: &str, y_desc: &str, boxes: &[(String, &BoxStats)]) -> Result<()> {
    let labels: Vec<String> = boxes.iter().map(|(l, _)| l.clone()).collect();
    let (lo, hi) = boxes.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), (_, s)| {
        let low = s.outliers.iter().copied().fold(s.whisker_low, f64::min);
        let high = s.outliers.iter().copied().fold(s.whisker_high, f64::max);
        (a.min(low), b.max(high))
    });
    let mut chart = category_chart(area, caption, &labels, padded(lo, hi), x_desc, y_desc)?;
    let palette = generate_palette(boxes.len());

    chart.draw_series(boxes.iter().enumerate().map(|(i, (_, s))| {
        let x = i as f64;
        Rectangle::new([(x - 0.3, s.q1), (x + 0.3, s.q3)], palette[i].mix(0.6).filled())
    }))?;
    chart.draw_series(boxes.iter().enumerate().map(|(i, (_, s))| {
        let x = i as f64;
        Rectangle::new([(x - 0.3, s.q1), (x + 0.3, s.q3)], BLACK.stroke_width(1))
    }))?;
    chart.draw_series(boxes.iter().enumerate().flat_map(|(i, (_, s))| {
        let x = i as f64;
        [
            vec![(x - 0.3, s.median), (x + 0.3, s.median)],
            vec![(x, s.whisker_low), (x, s.q1)],
            vec![(x, s.q3), (x, s.whisker_high)],
            vec![(x - 0.15, s.whisker_low), (x + 0.15, s.whisker_low)],
            vec![(x - 0.15, s.whisker_high), (x + 0.15, s.whisker_high)],
        ]
        .into_iter()
        .map(|path| PathElement::new(path, BLACK.stroke_width(1)))
    }))?;
    chart.draw_series(boxes.iter().enumerate().flat_map(|(i, (_, s))| {
        s.outliers
            .iter()
            .map(move |&v| Circle::new((i as f64, v), 2, BLACK.stroke_width(1)))
    }))?;
    Ok(())
}

fn box_plots(area: &Area<'_>, dist: &Distributions, layout: &Layout) -> Result<()> {
    let panels = area.split_evenly((1, 2));
    let by_year: Vec<(String, &BoxStats)> = dist.by_year.iter().map(|(y, s)| (y.to_string(), s)).collect();
    let by_month: Vec<(String, &BoxStats)> =
        dist.by_month.iter().map(|(m, s)| (m.abbrev().to_string(), s)).collect();

    box_panel(&panels[0], "Year-wise Box Plot (Trend)", "Year", &layout.y_label, &by_year)?;
    box_panel(&panels[1], "Month-wise Box Plot (Seasonality)", "Month", &layout.y_label, &by_month)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_ticks_only_on_whole_positions() {
        let labels = vec!["smoke".to_string(), "alco".to_string()];
        assert_eq!(category_label(&labels, 0.0), "smoke");
        assert_eq!(category_label(&labels, 1.0), "alco");
        assert_eq!(category_label(&labels, 0.5), "");
        assert_eq!(category_label(&labels, -1.0), "");
        assert_eq!(category_label(&labels, 2.0), "");
    }

    #[test]
    fn grouped_bars_stay_inside_their_category() {
        for groups in 1..=12 {
            let (first, _) = bar_span(3, 0, groups);
            let (_, last) = bar_span(3, groups - 1, groups);
            assert!((first - 2.6).abs() < 1e-9);
            assert!((last - 3.4).abs() < 1e-9);
        }
    }

    use crate::data::synthetic::SyntheticDataset;
    use crate::transform::aggregate::{
        dated_values, distributions, dual_fit, medical_heat_rules, monthly_means, observations,
        tally, trimmed_correlation,
    };
    use crate::transform::clean::normalize_medical;

    fn draw(chart: Chart<'_>, width: u32, height: u32) -> RgbImage {
        let layout = Layout::new(chart.kind()).labels("x", "y").size(width, height);
        let image = PngRenderer.render(&chart, &layout).unwrap();
        assert_eq!(image.dimensions(), (width, height), "{} chart", chart.kind());
        assert!(
            image.pixels().any(|p| p.0 != [255, 255, 255]),
            "{} chart is blank",
            chart.kind()
        );
        image
    }

    #[test]
    fn renders_medical_charts() {
        let table = SyntheticDataset::Medical.generate(300, 1).unwrap();
        let normalized = normalize_medical(&table).unwrap();
        let counts = tally(&normalized, "cardio", &["cholesterol", "gluc", "smoke"]).unwrap();
        let matrix = trimmed_correlation(&normalized, &medical_heat_rules(0.025, 0.975)).unwrap();

        draw(
            Chart::CategoricalBars {
                tally: &counts,
                identity: "cardio",
            },
            640,
            360,
        );
        draw(Chart::Heatmap(&matrix), 600, 500);
    }

    #[test]
    fn renders_sea_level_scatter() {
        let table = SyntheticDataset::SeaLevel.generate(134, 1).unwrap();
        let points = observations(&table, "Year", "CSIRO Adjusted Sea Level").unwrap();
        let fits = dual_fit(&points, 2000, 2050).unwrap();
        draw(
            Chart::ScatterWithFits {
                points: &points,
                fits: &fits,
            },
            640,
            400,
        );
    }

    #[test]
    fn renders_page_view_charts() {
        let table = SyntheticDataset::PageViews.generate(500, 1).unwrap();
        let daily = dated_values(&table, "date", "value").unwrap();
        let means = monthly_means(&table, "date", "value").unwrap();
        let spread = distributions(&table, "date", "value").unwrap();

        draw(Chart::TimeLine { points: &daily }, 800, 300);
        draw(Chart::GroupedBars(&means), 600, 480);
        draw(Chart::BoxPlots(&spread), 900, 400);
    }

    #[test]
    fn heatmap_without_numeric_columns_is_rejected() {
        let text_only = Table::from_columns(vec![crate::data::model::Column::new(
            "name",
            vec![Value::from("a"), Value::from("b")],
        )])
        .unwrap();
        let matrix = crate::transform::aggregate::correlation_matrix(&text_only).unwrap();
        let layout = Layout::new("empty").size(200, 200);
        let err = PngRenderer.render(&Chart::Heatmap(&matrix), &layout).unwrap_err();
        assert!(matches!(err, VizError::InsufficientData { .. }));
    }

    #[test]
    fn padded_handles_flat_and_empty_ranges() {
        let r = padded(5.0, 5.0);
        assert!(r.start < 5.0 && r.end > 5.0);
        assert_eq!(padded(f64::INFINITY, f64::NEG_INFINITY), 0.0..1.0);
        assert_eq!(bar_range(0.0), 0.0..1.0);
    }
}
