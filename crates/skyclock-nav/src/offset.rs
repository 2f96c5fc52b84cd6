/// Static bias removed from every reported fix.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionOffsetCorrector {
    lat_offset: f64,
    lon_offset: f64,
}

impl PositionOffsetCorrector {
    pub fn new(lat_offset: f64, lon_offset: f64) -> Self {
        Self { lat_offset, lon_offset }
    }

    pub fn set_offset(&mut self, lat_offset: f64, lon_offset: f64) {
        self.lat_offset = lat_offset;
        self.lon_offset = lon_offset;
    }

    pub fn offset(&self) -> (f64, f64) {
        (self.lat_offset, self.lon_offset)
    }

    /// `(0.0, 0.0)` stands for "no fix".
    pub fn correct(&self, position: Option<(f64, f64)>) -> (f64, f64) {
        match position {
            Some((lat, lon)) => (lat - self.lat_offset, lon - self.lon_offset),
            None => (0.0, 0.0),
        }
    }
}
