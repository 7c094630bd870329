//! Plain CSV views of the backlog, for operators.

use std::io::{Read, Write};

use energy_client::domain::{DailyEnergyRecord, DateKey};

/// Parse a `date,energy` backup file as written by the first generation of
/// devices: no header, one day per line, blank lines allowed.
///
/// Returns the parsed records in file order and the number of lines that
/// could not be used.
pub fn read_legacy_backup<R: Read>(reader: R) -> (Vec<DailyEnergyRecord>, usize) {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (idx, row) in rdr.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(line = idx + 1, error = %e, "unreadable backup line");
                skipped += 1;
                continue;
            }
        };

        match parse_row(&row) {
            Some(record) => records.push(record),
            None => {
                tracing::warn!(line = idx + 1, row = ?row, "skipping malformed backup line");
                skipped += 1;
            }
        }
    }

    (records, skipped)
}

fn parse_row(row: &csv::StringRecord) -> Option<DailyEnergyRecord> {
    if row.len() != 2 {
        return None;
    }
    let date: DateKey = row.get(0)?.parse().ok()?;
    let delta_kwh: f64 = row.get(1)?.parse().ok()?;
    if !delta_kwh.is_finite() {
        return None;
    }
    Some(DailyEnergyRecord::new(date, delta_kwh))
}

/// Write `records` as `date,delta_kwh` CSV with a header row.
pub fn write_csv<W: Write>(records: &[DailyEnergyRecord], writer: W) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["date", "delta_kwh"])?;
    for record in records {
        wtr.write_record([record.date.to_string(), format!("{:.3}", record.delta_kwh)])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    #[test]
    fn reads_device_backup_file() {
        let input = "2026-01-03,1.250\n2026-01-04,2.100\n\n";
        let (records, skipped) = read_legacy_backup(input.as_bytes());

        assert_eq!(skipped, 0);
        assert_eq!(
            records,
            vec![
                DailyEnergyRecord::new(day("2026-01-03"), 1.25),
                DailyEnergyRecord::new(day("2026-01-04"), 2.1),
            ]
        );
    }

    #[test]
    fn skips_lines_it_cannot_use() {
        let input = "2026-01-03,1.0\nnot-a-date,2.0\n2026-01-05\n2026-01-06,abc\n2026-01-07, 0.5 \n";
        let (records, skipped) = read_legacy_backup(input.as_bytes());

        assert_eq!(skipped, 3);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], DailyEnergyRecord::new(day("2026-01-07"), 0.5));
    }

    #[test]
    fn writes_header_and_rows() {
        let records = vec![
            DailyEnergyRecord::new(day("2026-01-04"), 2.1),
            DailyEnergyRecord::new(day("2026-01-05"), -0.25),
        ];
        let mut out = Vec::new();
        write_csv(&records, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "date,delta_kwh\n2026-01-04,2.100\n2026-01-05,-0.250\n"
        );
    }
}
