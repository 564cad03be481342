use std::fmt::Write;

use crate::channel::telemetry::GaitSeries;

pub const CHART_HEIGHT: usize = 8;
const COLUMN_WIDTH: usize = 4;

fn level(sample: u8, height: usize) -> usize {
    usize::from(sample) * (height - 1) / usize::from(u8::MAX)
}

/// Plot the gait window as a terminal chart, newest sample on the right. Samples span 0-255
/// from the bottom row to the top row.
pub fn render_chart(series: &GaitSeries, height: usize) -> String {
    let height = height.max(2);
    let mut out = String::new();

    for row in (0..height).rev() {
        let label = if row == height - 1 {
            "255"
        } else if row == 0 {
            "  0"
        } else {
            "   "
        };
        out.push_str(label);
        out.push_str(" |");

        for sample in series.samples() {
            let cell = if level(*sample, height) == row { "*" } else { " " };
            let _ = write!(out, "{:^width$}", cell, width = COLUMN_WIDTH);
        }
        out.push('\n');
    }

    out.push_str("    +");
    out.push_str(&"-".repeat(series.samples().len() * COLUMN_WIDTH));
    out.push('\n');
    out.push_str("     ");
    for sample in series.samples() {
        let _ = write!(out, "{:^width$}", sample, width = COLUMN_WIDTH);
    }
    out.push('\n');
    out
}
