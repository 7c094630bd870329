mod daily_energy;
mod date_key;
mod reading;

pub use daily_energy::{DailyBaseline, DailyEnergyRecord};
pub use date_key::{DateKey, DateKeyError};
pub use reading::EnergyReading;
