//! Schedule expansion, reconciliation, and adherence statistics.
//!
//! Everything here is a pure function over an in-memory snapshot of the
//! medicine list and the dose log; callers load both and pass an explicit
//! anchor date. All dates and times are local wall clock with no timezone
//! handling.
//!
//! A dose occurrence exists conceptually for every (medicine, active
//! schedule entry, date) whose weekday matches. It stays *virtual* until
//! someone acts on it; acting creates a row in medication_tracking and the
//! persisted row is authoritative from then on.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::models::{Medicine, TrackingRecord};

/// Identity of a not-yet-persisted dose occurrence.
///
/// Derived entirely from (medicine, date, time), so repeated expansions of
/// the same window produce the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceKey {
    pub medicine_id: i64,
    /// Snapshot of the medicine name at expansion time
    pub medicine_name: String,
    /// HH:MM
    pub scheduled_time: String,
    /// YYYY-MM-DD
    pub date: String,
}

/// A dose occurrence after reconciliation against the log.
///
/// The variant is the source of truth for "has anyone acted on this":
/// callers branch on it instead of sniffing id formats, and persisted row
/// ids can never collide with virtual identities.
#[derive(Debug, Clone)]
pub enum Occurrence {
    /// A matching log row exists; it is authoritative
    Persisted(TrackingRecord),
    /// No log row yet; synthesized with taken = false
    Virtual(OccurrenceKey),
}

impl Occurrence {
    pub fn is_virtual(&self) -> bool {
        matches!(self, Occurrence::Virtual(_))
    }

    pub fn taken(&self) -> bool {
        match self {
            Occurrence::Persisted(r) => r.taken,
            Occurrence::Virtual(_) => false,
        }
    }

    pub fn medicine_id(&self) -> i64 {
        match self {
            Occurrence::Persisted(r) => r.medicine_id,
            Occurrence::Virtual(k) => k.medicine_id,
        }
    }

    pub fn medicine_name(&self) -> &str {
        match self {
            Occurrence::Persisted(r) => &r.medicine_name,
            Occurrence::Virtual(k) => &k.medicine_name,
        }
    }

    pub fn scheduled_time(&self) -> &str {
        match self {
            Occurrence::Persisted(r) => &r.scheduled_time,
            Occurrence::Virtual(k) => &k.scheduled_time,
        }
    }

    pub fn date(&self) -> &str {
        match self {
            Occurrence::Persisted(r) => &r.date,
            Occurrence::Virtual(k) => &k.date,
        }
    }

    pub fn taken_at(&self) -> Option<&str> {
        match self {
            Occurrence::Persisted(r) => r.taken_at.as_deref(),
            Occurrence::Virtual(_) => None,
        }
    }

    pub fn notes(&self) -> Option<&str> {
        match self {
            Occurrence::Persisted(r) => r.notes.as_deref(),
            Occurrence::Virtual(_) => None,
        }
    }

    /// Stable display identity. Persisted rows use their numeric id; virtual
    /// occurrences get a prefixed key that is deterministic across queries.
    pub fn display_id(&self) -> String {
        match self {
            Occurrence::Persisted(r) => r.id.to_string(),
            Occurrence::Virtual(k) => format!(
                "virtual-{}-{}-{}",
                k.medicine_id, k.date, k.scheduled_time
            ),
        }
    }
}

/// Expand all schedules onto one calendar date.
///
/// One key per (medicine, active entry firing on that weekday), ascending by
/// scheduled time. Lexicographic comparison of "HH:MM" is the intended time
/// order. Inactive entries and non-matching weekdays contribute nothing.
pub fn expand_day(medicines: &[Medicine], date: NaiveDate) -> Vec<OccurrenceKey> {
    let weekday = date.weekday().num_days_from_sunday() as u8;
    let date_str = date.format("%Y-%m-%d").to_string();

    let mut keys = Vec::new();
    for medicine in medicines {
        for entry in &medicine.schedule {
            if entry.fires_on(weekday) {
                keys.push(OccurrenceKey {
                    medicine_id: medicine.id,
                    medicine_name: medicine.name.clone(),
                    scheduled_time: entry.time.clone(),
                    date: date_str.clone(),
                });
            }
        }
    }

    keys.sort_by(|a, b| {
        a.scheduled_time
            .cmp(&b.scheduled_time)
            .then(a.medicine_id.cmp(&b.medicine_id))
    });
    keys
}

/// Expand over the `days` consecutive dates ending at and including `today`,
/// oldest day first. Each day is expanded independently.
pub fn expand_range(medicines: &[Medicine], today: NaiveDate, days: i64) -> Vec<OccurrenceKey> {
    let mut keys = Vec::new();
    for i in (0..days).rev() {
        keys.extend(expand_day(medicines, today - Duration::days(i)));
    }
    keys
}

/// Materialize one expanded key against the log.
///
/// Any row matching (medicine, date, time) wins over synthesis. Duplicate
/// rows are tolerated: a taken row is preferred, so the existence of at
/// least one taken row marks the dose as taken.
pub fn reconcile(key: OccurrenceKey, records: &[TrackingRecord]) -> Occurrence {
    let mut found: Option<&TrackingRecord> = None;
    for record in records {
        if record.matches(key.medicine_id, &key.date, &key.scheduled_time) {
            if record.taken {
                return Occurrence::Persisted(record.clone());
            }
            found.get_or_insert(record);
        }
    }
    match found {
        Some(record) => Occurrence::Persisted(record.clone()),
        None => Occurrence::Virtual(key),
    }
}

/// Reconcile a whole expansion, preserving order
pub fn reconcile_all(keys: Vec<OccurrenceKey>, records: &[TrackingRecord]) -> Vec<Occurrence> {
    keys.into_iter().map(|key| reconcile(key, records)).collect()
}

/// Percentage of occurrences taken, rounded to the nearest integer.
/// Empty input is 0% by policy, not an error.
pub fn adherence(occurrences: &[Occurrence]) -> u32 {
    if occurrences.is_empty() {
        return 0;
    }
    let taken = occurrences.iter().filter(|o| o.taken()).count();
    (taken as f64 / occurrences.len() as f64 * 100.0).round() as u32
}

/// Persisted taken = false records dated within the last `days` days ending
/// at `today`. Rows with unparseable dates are skipped.
///
/// Virtual occurrences never appear here, however overdue: a dose nobody
/// acted on has no row until the alert sweep (or the user) materializes it.
/// That asymmetry with the adherence percentages is deliberate.
pub fn missed_in_window(
    records: &[TrackingRecord],
    today: NaiveDate,
    days: i64,
) -> Vec<TrackingRecord> {
    let cutoff = today - Duration::days(days);
    records
        .iter()
        .filter(|r| {
            if r.taken {
                return false;
            }
            match NaiveDate::parse_from_str(&r.date, "%Y-%m-%d") {
                Ok(date) => date >= cutoff && date <= today,
                Err(_) => false,
            }
        })
        .cloned()
        .collect()
}

/// The dashboard projection for one moment in time
#[derive(Debug, Clone)]
pub struct HealthSummary {
    pub today_schedule: Vec<Occurrence>,
    pub adherence_rate: u32,
    pub total_scheduled_today: usize,
    pub total_taken_today: usize,
    pub total_pending_today: usize,
    pub this_week_adherence: u32,
    pub this_month_adherence: u32,
    pub missed_medications: Vec<TrackingRecord>,
}

/// Compute the full health summary as of `today`.
///
/// The week and month figures re-expand every day in their window; they are
/// not rolling aggregates of the today view.
pub fn health_summary(
    medicines: &[Medicine],
    records: &[TrackingRecord],
    today: NaiveDate,
) -> HealthSummary {
    let today_schedule = reconcile_all(expand_day(medicines, today), records);
    let week = reconcile_all(expand_range(medicines, today, 7), records);
    let month = reconcile_all(expand_range(medicines, today, 30), records);

    let total_scheduled_today = today_schedule.len();
    let total_taken_today = today_schedule.iter().filter(|o| o.taken()).count();

    HealthSummary {
        adherence_rate: adherence(&today_schedule),
        total_scheduled_today,
        total_taken_today,
        total_pending_today: total_scheduled_today - total_taken_today,
        this_week_adherence: adherence(&week),
        this_month_adherence: adherence(&month),
        missed_medications: missed_in_window(records, today, 7),
        today_schedule,
    }
}

/// Per-day taken/scheduled tally
#[derive(Debug, Clone, Default, Serialize)]
pub struct DayTally {
    pub taken: u32,
    pub scheduled: u32,
}

/// Seven-day adherence breakdown
#[derive(Debug, Clone)]
pub struct WeeklyReport {
    /// First date of the window, YYYY-MM-DD
    pub start_date: String,
    /// Last date of the window (today), YYYY-MM-DD
    pub end_date: String,
    /// Every date in the window is present, zeroed when nothing was scheduled
    pub daily: BTreeMap<String, DayTally>,
    pub weekly_adherence: u32,
}

/// Tally the last seven days per date
pub fn weekly_report(
    medicines: &[Medicine],
    records: &[TrackingRecord],
    today: NaiveDate,
) -> WeeklyReport {
    let mut daily: BTreeMap<String, DayTally> = BTreeMap::new();
    for i in (0..7).rev() {
        let date = today - Duration::days(i);
        daily.insert(date.format("%Y-%m-%d").to_string(), DayTally::default());
    }

    let week = reconcile_all(expand_range(medicines, today, 7), records);
    for occurrence in &week {
        if let Some(tally) = daily.get_mut(occurrence.date()) {
            tally.scheduled += 1;
            if occurrence.taken() {
                tally.taken += 1;
            }
        }
    }

    WeeklyReport {
        start_date: (today - Duration::days(6)).format("%Y-%m-%d").to_string(),
        end_date: today.format("%Y-%m-%d").to_string(),
        daily,
        weekly_adherence: adherence(&week),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScheduleEntry;

    fn medicine(id: i64, name: &str, entries: Vec<(&str, Vec<u8>, bool)>) -> Medicine {
        Medicine {
            id,
            name: name.into(),
            dosage: "1 tablet".into(),
            quantity: 30,
            category: "test".into(),
            notes: None,
            created_at: "2026-01-01T00:00:00".into(),
            schedule: entries
                .into_iter()
                .enumerate()
                .map(|(i, (time, days, active))| ScheduleEntry {
                    id: id * 100 + i as i64,
                    medicine_id: id,
                    time: time.into(),
                    days_of_week: days,
                    active,
                })
                .collect(),
        }
    }

    fn record(
        id: i64,
        medicine_id: i64,
        time: &str,
        date: &str,
        taken: bool,
    ) -> TrackingRecord {
        TrackingRecord {
            id,
            medicine_id,
            medicine_name: "Metformin".into(),
            scheduled_time: time.into(),
            date: date.into(),
            taken,
            taken_at: taken.then(|| format!("{}T09:00:00", date)),
            notes: None,
        }
    }

    // 2026-08-19 is a Wednesday
    fn wednesday() -> NaiveDate {
        let date = NaiveDate::from_ymd_opt(2026, 8, 19).unwrap();
        assert_eq!(date.weekday().num_days_from_sunday(), 3);
        date
    }

    #[test]
    fn test_inactive_entries_never_fire() {
        let meds = vec![medicine(1, "Metformin", vec![("08:00", vec![0, 1, 2, 3, 4, 5, 6], false)])];
        for i in 0..30 {
            let date = wednesday() - Duration::days(i);
            assert!(expand_day(&meds, date).is_empty());
        }
    }

    #[test]
    fn test_expand_day_sorted_by_time() {
        let meds = vec![
            medicine(2, "B", vec![("20:00", vec![3], true), ("06:30", vec![3], true)]),
            medicine(1, "A", vec![("08:00", vec![3], true)]),
        ];
        let keys = expand_day(&meds, wednesday());
        let times: Vec<&str> = keys.iter().map(|k| k.scheduled_time.as_str()).collect();
        assert_eq!(times, vec!["06:30", "08:00", "20:00"]);
        assert!(keys.iter().all(|k| k.date == "2026-08-19"));
    }

    #[test]
    fn test_mon_wed_fri_over_week_anchored_wednesday() {
        // Window 2026-08-13 (Thu) ..= 2026-08-19 (Wed) contains Fri 14, Mon 17, Wed 19
        let meds = vec![medicine(1, "Metformin", vec![("08:00", vec![1, 3, 5], true)])];
        let keys = expand_range(&meds, wednesday(), 7);
        let dates: Vec<&str> = keys.iter().map(|k| k.date.as_str()).collect();
        assert_eq!(dates, vec!["2026-08-14", "2026-08-17", "2026-08-19"]);
        assert!(keys.iter().all(|k| k.scheduled_time == "08:00"));
    }

    #[test]
    fn test_adherence_policy_values() {
        assert_eq!(adherence(&[]), 0);

        let taken = Occurrence::Persisted(record(1, 1, "08:00", "2026-08-19", true));
        assert_eq!(adherence(std::slice::from_ref(&taken)), 100);

        let missed = Occurrence::Persisted(record(2, 1, "12:00", "2026-08-19", false));
        let virt = Occurrence::Virtual(OccurrenceKey {
            medicine_id: 1,
            medicine_name: "Metformin".into(),
            scheduled_time: "20:00".into(),
            date: "2026-08-19".into(),
        });
        assert_eq!(adherence(&[taken, missed, virt]), 33); // round(100/3)
    }

    #[test]
    fn test_reconcile_prefers_persisted_row() {
        let records = vec![record(7, 1, "08:00", "2026-08-19", true)];
        let key = OccurrenceKey {
            medicine_id: 1,
            medicine_name: "Metformin".into(),
            scheduled_time: "08:00".into(),
            date: "2026-08-19".into(),
        };
        match reconcile(key, &records) {
            Occurrence::Persisted(r) => {
                assert_eq!(r.id, 7);
                assert!(r.taken);
            }
            Occurrence::Virtual(_) => panic!("expected the persisted row"),
        }
    }

    #[test]
    fn test_reconcile_duplicates_any_taken_wins() {
        // Duplicate rows for the same occurrence, untaken first in log order
        let records = vec![
            record(1, 1, "08:00", "2026-08-19", false),
            record(2, 1, "08:00", "2026-08-19", true),
        ];
        let key = OccurrenceKey {
            medicine_id: 1,
            medicine_name: "Metformin".into(),
            scheduled_time: "08:00".into(),
            date: "2026-08-19".into(),
        };
        assert!(reconcile(key, &records).taken());
    }

    #[test]
    fn test_virtual_identity_is_stable_and_prefixed() {
        let meds = vec![medicine(1, "Metformin", vec![("08:00", vec![3], true)])];
        let first = reconcile_all(expand_day(&meds, wednesday()), &[]);
        let second = reconcile_all(expand_day(&meds, wednesday()), &[]);
        assert_eq!(first.len(), 1);
        assert!(first[0].is_virtual());
        assert_eq!(first[0].display_id(), second[0].display_id());
        assert_eq!(first[0].display_id(), "virtual-1-2026-08-19-08:00");
        assert!(!first[0].taken());
        assert!(first[0].taken_at().is_none());
    }

    #[test]
    fn test_missed_list_excludes_virtual_occurrences() {
        // A schedule with a long-past dose today, but nothing persisted
        let meds = vec![medicine(1, "Metformin", vec![("06:00", vec![0, 1, 2, 3, 4, 5, 6], true)])];
        let summary = health_summary(&meds, &[], wednesday());
        assert_eq!(summary.total_scheduled_today, 1);
        assert!(summary.missed_medications.is_empty());

        // Once materialized, it shows up
        let records = vec![record(1, 1, "06:00", "2026-08-19", false)];
        let summary = health_summary(&meds, &records, wednesday());
        assert_eq!(summary.missed_medications.len(), 1);
    }

    #[test]
    fn test_missed_window_bounds() {
        let records = vec![
            record(1, 1, "08:00", "2026-08-12", false), // cutoff day, included
            record(2, 1, "08:00", "2026-08-11", false), // before cutoff
            record(3, 1, "08:00", "2026-08-20", false), // future date
            record(4, 1, "08:00", "not-a-date", false), // unparseable, skipped
        ];
        let missed = missed_in_window(&records, wednesday(), 7);
        assert_eq!(missed.len(), 1);
        assert_eq!(missed[0].id, 1);
    }

    #[test]
    fn test_health_summary_counts() {
        let meds = vec![medicine(
            1,
            "Metformin",
            vec![
                ("08:00", vec![0, 1, 2, 3, 4, 5, 6], true),
                ("20:00", vec![0, 1, 2, 3, 4, 5, 6], true),
            ],
        )];
        let records = vec![record(1, 1, "08:00", "2026-08-19", true)];
        let summary = health_summary(&meds, &records, wednesday());

        assert_eq!(summary.total_scheduled_today, 2);
        assert_eq!(summary.total_taken_today, 1);
        assert_eq!(summary.total_pending_today, 1);
        assert_eq!(summary.adherence_rate, 50);
        // Week: 14 scheduled, 1 taken -> round(7.14) = 7
        assert_eq!(summary.this_week_adherence, 7);
        // Today view order and reconciliation
        assert!(!summary.today_schedule[0].is_virtual());
        assert!(summary.today_schedule[1].is_virtual());
    }

    #[test]
    fn test_deleted_medicine_history_still_counts() {
        // Medicine no longer in the list; its history remains in the log
        let meds: Vec<Medicine> = vec![];
        assert!(expand_range(&meds, wednesday(), 7).is_empty());

        let records = vec![record(1, 9, "08:00", "2026-08-18", false)];
        let summary = health_summary(&meds, &records, wednesday());
        assert_eq!(summary.missed_medications.len(), 1);
        assert_eq!(summary.total_scheduled_today, 0);
    }

    #[test]
    fn test_weekly_report_has_all_seven_days() {
        let meds = vec![medicine(1, "Metformin", vec![("08:00", vec![1, 3, 5], true)])];
        let records = vec![record(1, 1, "08:00", "2026-08-17", true)];
        let report = weekly_report(&meds, &records, wednesday());

        assert_eq!(report.start_date, "2026-08-13");
        assert_eq!(report.end_date, "2026-08-19");
        assert_eq!(report.daily.len(), 7);

        // Thu 13th: nothing scheduled, zeroed bucket still present
        let thu = &report.daily["2026-08-13"];
        assert_eq!((thu.taken, thu.scheduled), (0, 0));

        let mon = &report.daily["2026-08-17"];
        assert_eq!((mon.taken, mon.scheduled), (1, 1));

        let wed = &report.daily["2026-08-19"];
        assert_eq!((wed.taken, wed.scheduled), (0, 1));

        // 3 scheduled over the window, 1 taken -> 33
        assert_eq!(report.weekly_adherence, 33);
    }
}
