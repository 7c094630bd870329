use energy_client::domain::DailyEnergyRecord;

use crate::pipeline::DataAnomaly;

/// Pure validation of a finalized `DailyEnergyRecord`.
///
/// Rules:
/// - the day's total must be non-negative; a negative one means the meter's
///   cumulative counter went backwards (reset or replacement).
pub fn validate_daily_record(record: &DailyEnergyRecord) -> Result<(), DataAnomaly> {
    if record.is_anomalous() {
        return Err(DataAnomaly {
            date: record.date,
            delta_kwh: record.delta_kwh,
        });
    }
    Ok(())
}

/// Surface an anomalous record without altering it.
///
/// The record is still relayed unchanged; what to do about a counter reset
/// is left to whoever reads the remote store.
pub fn flag_anomaly(record: &DailyEnergyRecord) -> Option<DataAnomaly> {
    match validate_daily_record(record) {
        Ok(()) => None,
        Err(anomaly) => {
            metrics::counter!("relay_data_anomalies_total").increment(1);
            tracing::error!(error = %anomaly, "daily energy anomaly");
            Some(anomaly)
        }
    }
}
