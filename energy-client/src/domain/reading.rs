/// A cumulative energy counter value (kWh) as reported by the meter.
///
/// The meter answers with not-a-number when a register read fails, so an
/// unavailable reading is kept distinct from zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnergyReading {
    Available(f64),
    Unavailable,
}

impl EnergyReading {
    /// Wraps a raw register value; NaN and infinities become `Unavailable`.
    pub fn from_kwh(raw: f64) -> Self {
        if raw.is_finite() {
            Self::Available(raw)
        } else {
            Self::Unavailable
        }
    }

    pub fn kwh(self) -> Option<f64> {
        match self {
            Self::Available(v) => Some(v),
            Self::Unavailable => None,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, Self::Available(_))
    }
}

impl From<Option<f64>> for EnergyReading {
    fn from(raw: Option<f64>) -> Self {
        raw.map(Self::from_kwh).unwrap_or(Self::Unavailable)
    }
}
