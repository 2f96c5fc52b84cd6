use std::fmt;

use crate::sample::SatelliteObservation;

pub const EMPTY_CELL: char = '.';
pub const ZENITH_LINE: char = '|';

/// Character grid of satellite positions: azimuth across, elevation down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkyPlot {
    width: usize,
    rows: Vec<Vec<char>>,
}

impl SkyPlot {
    fn blank(width: usize, height: usize) -> Self {
        let mut rows = vec![vec![EMPTY_CELL; width]; height];
        if width > 0 {
            let mid = width / 2;
            for row in &mut rows {
                row[mid] = ZENITH_LINE;
            }
        }
        Self { width, rows }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<char> {
        self.rows.get(row)?.get(col).copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = String> + '_ {
        self.rows.iter().map(|r| r.iter().collect())
    }

    fn put(&mut self, x: usize, y: usize, id: u32) {
        let label = format!("{:02}", id % 100);
        let mut digits = label.chars();
        let row = &mut self.rows[y];
        if let Some(d) = digits.next() {
            row[x] = d;
        }
        if x + 1 < self.width {
            if let Some(d) = digits.next() {
                row[x + 1] = d;
            }
        }
    }
}

impl fmt::Display for SkyPlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            writeln!(f, "{row}")?;
        }
        Ok(())
    }
}

/// Project satellites onto a `height` x `width` grid.
///
/// Satellites are drawn strongest signal first and later writes win, so where
/// two labels collide the weaker satellite ends up on top.
// NOTE: weaker-on-top is the long-standing behavior. Unconfirmed whether
// strongest-on-top was intended.
pub fn render(
    satellites: &[SatelliteObservation],
    fix_valid: bool,
    width: usize,
    height: usize,
) -> SkyPlot {
    let mut plot = SkyPlot::blank(width, height);
    if !fix_valid || width == 0 || height == 0 {
        return plot;
    }

    let mut visible: Vec<&SatelliteObservation> =
        satellites.iter().filter(|s| s.signal_db >= 0.0).collect();
    visible.sort_by(|a, b| b.signal_db.total_cmp(&a.signal_db));

    for sat in visible {
        let x = (f64::from(sat.azimuth_deg) / 360.0 * width as f64).floor();
        let y = ((90.0 - f64::from(sat.elevation_deg)) / 90.0 * height as f64).floor();
        if !(x >= 0.0 && x < width as f64 && y >= 0.0 && y < height as f64) {
            continue;
        }
        plot.put(x as usize, y as usize, sat.id);
    }
    plot
}
