use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{NaiveDateTime, TimeDelta};
use regex::Regex;
use rust_decimal::Decimal;

use crate::domain::models::{SessionRecord, SessionTable, round_cents};

const BYTE_ORDER_MARK: char = '\u{feff}';
const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const SECONDS_PER_HOUR: i64 = 3600;

// <log ts>;Logger Wallbox;<event ts>:Fahrzeug getrennt;user:<id>;Geladene Energie:<x.y>kWh;Dauer:<n> s;<x.y>€
fn disconnect_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2};Logger Wallbox;",
            r"(?P<disconnected>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}):Fahrzeug getrennt;",
            r"user:(?P<user>[^;]+);",
            r"Geladene Energie:(?P<energy>\d+\.\d+)kWh;",
            r"Dauer:(?P<seconds>\d+) s;",
            r"(?P<cost>\d+\.\d+)€$",
        ))
        .expect("invalid disconnect line regex")
    })
}

/// Outcome of classifying one raw log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMatch {
    Matched(SessionRecord),
    /// A well-formed disconnect line for another user.
    ForeignIdentity,
    Unmatched,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub total_lines: usize,
    pub matched: usize,
    pub foreign_identity: usize,
    pub unmatched: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub table: SessionTable,
    pub stats: ExtractionStats,
}

pub fn classify_line(line: &str, filter_identity: &str) -> LineMatch {
    let Some(captures) = disconnect_line_re().captures(line) else {
        return LineMatch::Unmatched;
    };

    let user = &captures["user"];
    if user != filter_identity {
        return LineMatch::ForeignIdentity;
    }

    match build_record(
        &captures["disconnected"],
        user,
        &captures["energy"],
        &captures["seconds"],
        &captures["cost"],
    ) {
        Some(record) => LineMatch::Matched(record),
        None => LineMatch::Unmatched,
    }
}

fn build_record(
    disconnected: &str,
    user: &str,
    energy: &str,
    seconds: &str,
    cost: &str,
) -> Option<SessionRecord> {
    let disconnected_at = NaiveDateTime::parse_from_str(disconnected, LOG_TIMESTAMP_FORMAT).ok()?;
    let duration_seconds = seconds.parse::<i64>().ok()?;
    let connected_at =
        disconnected_at.checked_sub_signed(TimeDelta::try_seconds(duration_seconds)?)?;

    let energy_kwh = Decimal::from_str(energy).ok()?;
    let cost_eur = Decimal::from_str(cost).ok()?;
    let duration_hours = Decimal::from(duration_seconds) / Decimal::from(SECONDS_PER_HOUR);

    Some(SessionRecord {
        connected_at,
        disconnected_at,
        user_id: user.to_string(),
        plate: user.to_string(),
        energy_kwh: round_cents(energy_kwh),
        duration_hours: round_cents(duration_hours),
        cost_eur: round_cents(cost_eur),
    })
}

/// Builds the session table for `filter_identity`, skipping every other line.
///
/// A byte order mark is stripped from the first line only.
pub fn extract_sessions<I, S>(lines: I, filter_identity: &str) -> Extraction
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut extraction = Extraction::default();

    for (index, line) in lines.into_iter().enumerate() {
        let raw = line.as_ref();
        let line = if index == 0 {
            raw.strip_prefix(BYTE_ORDER_MARK).unwrap_or(raw)
        } else {
            raw
        };

        extraction.stats.total_lines += 1;
        match classify_line(line, filter_identity) {
            LineMatch::Matched(record) => {
                extraction.stats.matched += 1;
                extraction.table.push(record);
            }
            LineMatch::ForeignIdentity => extraction.stats.foreign_identity += 1,
            LineMatch::Unmatched => {
                tracing::trace!(line_number = index + 1, "log line skipped");
                extraction.stats.unmatched += 1;
            }
        }
    }

    extraction
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
    use rust_decimal::Decimal;

    use super::{ExtractionStats, LineMatch, classify_line, extract_sessions};

    const SAMPLE: &str = "2025-03-01 10:00:00;Logger Wallbox;2025-03-01 12:30:00:Fahrzeug getrennt;user:AZ999ZZ;Geladene Energie:12.345kWh;Dauer:9000 s;4.567€";

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .expect("valid timestamp")
    }

    #[test]
    fn extracts_record_from_disconnect_line() {
        let extraction = extract_sessions([SAMPLE], "AZ999ZZ");

        assert_eq!(extraction.table.len(), 1);
        let record = &extraction.table.records()[0];
        assert_eq!(record.connected_at, at(1, 10, 0));
        assert_eq!(record.disconnected_at, at(1, 12, 30));
        assert_eq!(record.user_id, "AZ999ZZ");
        assert_eq!(record.plate, "AZ999ZZ");
        assert_eq!(record.energy_kwh, Decimal::new(1235, 2));
        assert_eq!(record.duration_hours, Decimal::new(250, 2));
        assert_eq!(record.cost_eur, Decimal::new(457, 2));
    }

    #[test]
    fn skips_lines_for_other_identities() {
        let extraction = extract_sessions([SAMPLE], "BZ111XX");

        assert!(extraction.table.is_empty());
        assert_eq!(
            extraction.stats,
            ExtractionStats {
                total_lines: 1,
                matched: 0,
                foreign_identity: 1,
                unmatched: 0,
            }
        );
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let extraction = extract_sessions(Vec::<String>::new(), "AZ999ZZ");

        assert!(extraction.table.is_empty());
        assert_eq!(extraction.stats, ExtractionStats::default());
    }

    #[test]
    fn strips_byte_order_mark_on_first_line_only() {
        let with_bom = format!("\u{feff}{SAMPLE}");

        let first = extract_sessions([with_bom.as_str()], "AZ999ZZ");
        let second = extract_sessions([SAMPLE, with_bom.as_str()], "AZ999ZZ");

        assert_eq!(first.table.len(), 1);
        assert_eq!(second.table.len(), 1);
        assert_eq!(second.stats.unmatched, 1);
    }

    #[test]
    fn rejects_malformed_and_unrelated_lines() {
        let lines = [
            "2025-03-01 08:00:00;Logger Wallbox;2025-03-01 08:00:00:Fahrzeug verbunden;user:AZ999ZZ",
            "",
            "garbage",
            // trailing content after the currency symbol
            "2025-03-01 10:00:00;Logger Wallbox;2025-03-01 12:30:00:Fahrzeug getrennt;user:AZ999ZZ;Geladene Energie:12.345kWh;Dauer:9000 s;4.567€;",
            // leading content before the log timestamp
            "x2025-03-01 10:00:00;Logger Wallbox;2025-03-01 12:30:00:Fahrzeug getrennt;user:AZ999ZZ;Geladene Energie:12.345kWh;Dauer:9000 s;4.567€",
            // missing fractional part on energy
            "2025-03-01 10:00:00;Logger Wallbox;2025-03-01 12:30:00:Fahrzeug getrennt;user:AZ999ZZ;Geladene Energie:12kWh;Dauer:9000 s;4.567€",
            // impossible calendar date
            "2025-03-01 10:00:00;Logger Wallbox;2025-02-30 12:30:00:Fahrzeug getrennt;user:AZ999ZZ;Geladene Energie:1.0kWh;Dauer:60 s;0.10€",
        ];

        let extraction = extract_sessions(lines, "AZ999ZZ");

        assert!(extraction.table.is_empty());
        assert_eq!(extraction.stats.unmatched, 7);
    }

    #[test]
    fn connected_at_is_disconnect_minus_raw_seconds() {
        for seconds in [0_i64, 1, 59, 3599, 86_401, 1_000_000] {
            let line = format!(
                "2025-03-20 00:00:00;Logger Wallbox;2025-03-20 06:15:07:Fahrzeug getrennt;user:AZ999ZZ;Geladene Energie:1.00kWh;Dauer:{seconds} s;0.50€"
            );

            let LineMatch::Matched(record) = classify_line(&line, "AZ999ZZ") else {
                panic!("line with {seconds} seconds should match");
            };

            assert_eq!(
                record.disconnected_at - record.connected_at,
                TimeDelta::seconds(seconds)
            );
        }
    }

    #[test]
    fn preserves_log_order_and_counts() {
        let lines = [
            SAMPLE.replace("12:30:00", "23:00:00"),
            "noise".to_string(),
            SAMPLE.replace("AZ999ZZ", "BZ111XX"),
            SAMPLE.to_string(),
        ];

        let extraction = extract_sessions(&lines, "AZ999ZZ");

        let disconnects: Vec<_> = extraction
            .table
            .iter()
            .map(|record| record.disconnected_at)
            .collect();
        assert_eq!(disconnects, vec![at(1, 23, 0), at(1, 12, 30)]);
        assert_eq!(
            extraction.stats,
            ExtractionStats {
                total_lines: 4,
                matched: 2,
                foreign_identity: 1,
                unmatched: 1,
            }
        );
    }
}
