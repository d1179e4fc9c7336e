use csv::Writer;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::ExportError;
use crate::models::Lap;
use crate::pmc::{PmcPoint, WeeklyAggregate};

fn optional(value: Option<f64>, decimals: usize) -> String {
    value.map_or(String::new(), |v| format!("{:.*}", decimals, v))
}

/// Write laps as CSV (one row per lap)
pub fn write_laps<W: Write>(laps: &[Lap], writer: W) -> Result<(), ExportError> {
    let mut writer = Writer::from_writer(writer);

    writer.write_record([
        "lap",
        "distance_m",
        "moving_seconds",
        "elapsed_seconds",
        "pace_sec_per_km",
        "pace",
        "avg_hr",
        "avg_power",
        "elevation_gain_m",
        "elevation_loss_m",
        "source",
    ])?;

    for lap in laps {
        writer.write_record([
            lap.index.to_string(),
            format!("{:.1}", lap.distance_meters),
            format!("{:.0}", lap.duration_seconds),
            format!("{:.0}", lap.elapsed_seconds),
            format!("{:.1}", lap.avg_pace_sec_per_km),
            lap.pace_label(),
            optional(lap.avg_heart_rate, 0),
            optional(lap.avg_power, 0),
            format!("{:.1}", lap.elevation_gain),
            format!("{:.1}", lap.elevation_loss),
            format!("{:?}", lap.source).to_lowercase(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write PMC data as CSV (suitable for spreadsheet plotting)
pub fn write_pmc_series<W: Write>(series: &[PmcPoint], writer: W) -> Result<(), ExportError> {
    let mut writer = Writer::from_writer(writer);

    writer.write_record(["date", "tss", "ctl", "atl", "tsb"])?;
    for point in series {
        writer.write_record([
            point.date.format("%Y-%m-%d").to_string(),
            point.tss.round_dp(1).to_string(),
            point.ctl.round_dp(2).to_string(),
            point.atl.round_dp(2).to_string(),
            point.tsb.round_dp(2).to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write weekly aggregates as CSV
pub fn write_weekly<W: Write>(weeks: &[WeeklyAggregate], writer: W) -> Result<(), ExportError> {
    let mut writer = Writer::from_writer(writer);

    writer.write_record([
        "week_start",
        "iso_year",
        "week",
        "total_tss",
        "days_completed",
        "projected_tss",
    ])?;
    for week in weeks {
        writer.write_record([
            week.week_start.format("%Y-%m-%d").to_string(),
            week.iso_year.to_string(),
            week.week_number.to_string(),
            week.total_tss.round_dp(1).normalize().to_string(),
            week.days_completed.to_string(),
            week.projected_tss.round_dp(1).normalize().to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Export laps to a CSV file
pub fn export_laps<P: AsRef<Path>>(laps: &[Lap], output_path: P) -> Result<(), ExportError> {
    write_laps(laps, File::create(output_path)?)
}

/// Export PMC data to a CSV file
pub fn export_pmc_series<P: AsRef<Path>>(series: &[PmcPoint], output_path: P) -> Result<(), ExportError> {
    write_pmc_series(series, File::create(output_path)?)
}

/// Export weekly aggregates to a CSV file
pub fn export_weekly<P: AsRef<Path>>(weeks: &[WeeklyAggregate], output_path: P) -> Result<(), ExportError> {
    write_weekly(weeks, File::create(output_path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LapSource;
    use crate::pmc::{aggregate_weekly, advance_training_load};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn lap() -> Lap {
        Lap {
            index: 1,
            distance_meters: 1000.0,
            duration_seconds: 200.0,
            elapsed_seconds: 215.0,
            avg_pace_sec_per_km: 200.0,
            avg_heart_rate: Some(151.4),
            avg_power: None,
            elevation_gain: 4.3,
            elevation_loss: 0.0,
            source: LapSource::Synthesized,
        }
    }

    #[test]
    fn test_lap_csv() {
        let mut buffer = Vec::new();
        write_laps(&[lap()], &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("lap,distance_m,moving_seconds"));
        assert_eq!(lines[1], "1,1000.0,200,215,200.0,3:20,151,,4.3,0.0,synthesized");
    }

    #[test]
    fn test_pmc_csv_file() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let series = advance_training_load(&[], dec!(100), date).unwrap();
        let series = advance_training_load(&series, dec!(0), date.succ_opt().unwrap()).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("pmc.csv");
        export_pmc_series(&series, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,tss,ctl,atl,tsb");
        assert_eq!(lines[1], "2024-03-04,100,2.38,14.29,-11.90");
        assert_eq!(lines.len(), 3);

        let weeks_path = dir.path().join("weekly.csv");
        export_weekly(&aggregate_weekly(&series).unwrap(), &weeks_path).unwrap();
        let weekly = std::fs::read_to_string(&weeks_path).unwrap();
        assert_eq!(weekly.lines().nth(1), Some("2024-03-04,2024,10,100,2,350"));
    }
}
