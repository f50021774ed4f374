use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use jiff::{SignedDuration, Timestamp, Zoned};

use ink_types::ServerConfig;

use crate::{DEFAULT_RENDER_ESTIMATE_SECONDS, RENDER_SLACK_SECONDS};

// ----------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct PageSchedule {
    next_render_at: Timestamp,
    last_render_duration: Option<Duration>,
}

/// Decides when each page's next render should begin.
///
/// Exclusively owned by the scheduling loop; serving paths never need it.
pub struct Scheduler {
    config: Arc<ServerConfig>,
    pages: BTreeMap<String, PageSchedule>,
}

impl Scheduler {
    /// Seeds every page's first scheduled render using the default
    /// per-page estimate, since nothing has been observed yet.
    pub fn new(config: Arc<ServerConfig>, now: Timestamp) -> Self {
        let estimated_total = config.pages.len() as i64 * DEFAULT_RENDER_ESTIMATE_SECONDS;
        let lead = estimated_total + RENDER_SLACK_SECONDS;

        let pages = config
            .pages
            .iter()
            .map(|(page_id, page)| {
                let offset = page.refresh_interval as i64 - lead;
                let schedule = PageSchedule {
                    next_render_at: now
                        .saturating_add(SignedDuration::from_secs(offset))
                        .unwrap(),
                    last_render_duration: None,
                };
                (page_id.clone(), schedule)
            })
            .collect();

        Self { config, pages }
    }

    /// Summed last render duration over all pages, with the default estimate
    /// standing in for pages never rendered. This is the whole-queue time a
    /// page can be blocked behind on the single worker.
    pub fn total_render_seconds(&self) -> f64 {
        self.pages
            .values()
            .map(|schedule| {
                schedule
                    .last_render_duration
                    .map_or(DEFAULT_RENDER_ESTIMATE_SECONDS as f64, |d| d.as_secs_f64())
            })
            .sum()
    }

    pub fn lead_seconds(&self) -> f64 {
        self.total_render_seconds() + RENDER_SLACK_SECONDS as f64
    }

    /// Pages whose render should start now: past due and not inside their
    /// suppression window.
    pub fn due_pages(&self, now: &Zoned) -> Vec<String> {
        let now_ts = now.timestamp();
        let now_time = now.time();

        self.pages
            .iter()
            .filter(|(page_id, schedule)| {
                if now_ts < schedule.next_render_at {
                    return false;
                }
                let Some(page) = self.config.pages.get(*page_id) else {
                    return false;
                };
                !page
                    .suppress_refresh
                    .is_some_and(|window| window.contains(now_time))
            })
            .map(|(page_id, _)| page_id.clone())
            .collect()
    }

    /// Record a finished render attempt and schedule the next one.
    ///
    /// `duration` is `Some` when at least one mode was committed; only then
    /// does it update the page's observed render time. The next render is
    /// scheduled either way so a persistently failing page is retried at its
    /// normal cadence rather than every tick.
    pub fn on_render_finished(
        &mut self,
        page_id: &str,
        duration: Option<Duration>,
        now: Timestamp,
    ) {
        let Some(interval) = self
            .config
            .pages
            .get(page_id)
            .map(|page| page.refresh_interval as i64)
        else {
            return;
        };
        let Some(schedule) = self.pages.get_mut(page_id) else {
            return;
        };

        if let Some(duration) = duration {
            schedule.last_render_duration = Some(duration);
        }

        let lead = self.lead_seconds();
        let offset = (interval as f64 - lead).round() as i64;
        let next = now
            .saturating_add(SignedDuration::from_secs(offset))
            .unwrap();

        if let Some(schedule) = self.pages.get_mut(page_id) {
            schedule.next_render_at = next;
        }

        ink_log::info!(
            "next render of {page_id:?} at {next} (lead time: {lead:.1}s = \
             {:.1}s render + {RENDER_SLACK_SECONDS}s slack)",
            lead - RENDER_SLACK_SECONDS as f64,
        );
    }

    pub fn next_render_at(&self, page_id: &str) -> Option<Timestamp> {
        self.pages.get(page_id).map(|s| s.next_render_at)
    }

    /// Point-in-time view for the dashboard.
    pub fn status(&self, now: Timestamp) -> ScheduleStatus {
        let pages = self
            .pages
            .iter()
            .map(|(page_id, schedule)| {
                let status = PageStatus {
                    next_refresh: Some(schedule.next_render_at),
                    seconds_until: Some(
                        schedule.next_render_at.as_second() - now.as_second(),
                    ),
                    last_render_duration: schedule
                        .last_render_duration
                        .map(|d| d.as_secs_f64()),
                };
                (page_id.clone(), status)
            })
            .collect();

        ScheduleStatus {
            pages,
            total_render_time: self.total_render_seconds(),
            lead_time: self.lead_seconds(),
        }
    }
}

// ----------------------------------------------------------------------------

#[derive(Clone, Debug, serde::Serialize)]
pub struct ScheduleStatus {
    pub pages: BTreeMap<String, PageStatus>,
    pub total_render_time: f64,
    pub lead_time: f64,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct PageStatus {
    pub next_refresh: Option<Timestamp>,
    pub seconds_until: Option<i64>,
    pub last_render_duration: Option<f64>,
}

// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::civil;
    use jiff::tz::TimeZone;

    fn config(yaml: &str) -> Arc<ServerConfig> {
        Arc::new(ServerConfig::from_yaml(yaml).unwrap())
    }

    fn two_pages() -> Arc<ServerConfig> {
        config(
            r#"
api_key: k
supported_modes: [800x480x1xB]
pages:
  a: { url: "https://a.example", refresh_interval: 600 }
  b: { url: "https://b.example", refresh_interval: 3600 }
"#,
        )
    }

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    fn zoned(date: civil::Date, time: civil::Time) -> Zoned {
        date.at(time.hour(), time.minute(), time.second(), 0)
            .to_zoned(TimeZone::UTC)
            .unwrap()
    }

    #[test]
    fn initial_schedule_uses_the_default_estimate() {
        let now = ts("2026-01-10T12:00:00Z");
        let scheduler = Scheduler::new(two_pages(), now);

        // Two pages, 30s each, plus 5s slack.
        let lead = 2 * 30 + 5;
        assert_eq!(
            scheduler.next_render_at("a").unwrap(),
            ts("2026-01-10T12:00:00Z").saturating_add(SignedDuration::from_secs(600 - lead)).unwrap(),
        );
        assert_eq!(
            scheduler.next_render_at("b").unwrap(),
            ts("2026-01-10T12:00:00Z").saturating_add(SignedDuration::from_secs(3600 - lead)).unwrap(),
        );
    }

    #[test]
    fn completed_render_reschedules_with_observed_lead() {
        let now = ts("2026-01-10T12:00:00Z");
        let mut scheduler = Scheduler::new(two_pages(), now);

        let done_at = ts("2026-01-10T12:10:00Z");
        scheduler.on_render_finished("a", Some(Duration::from_secs(12)), done_at);

        // a observed at 12s, b still the 30s estimate: lead = 12 + 30 + 5.
        let lead = 12 + 30 + 5;
        assert_eq!(
            scheduler.next_render_at("a").unwrap(),
            done_at.saturating_add(SignedDuration::from_secs(600 - lead)).unwrap(),
        );
    }

    #[test]
    fn failed_render_still_advances_the_schedule() {
        let now = ts("2026-01-10T12:00:00Z");
        let mut scheduler = Scheduler::new(two_pages(), now);

        let done_at = ts("2026-01-10T12:10:00Z");
        scheduler.on_render_finished("a", None, done_at);

        // No observation recorded: both pages still estimated.
        assert_eq!(scheduler.total_render_seconds(), 60.0);
        let lead = 2 * 30 + 5;
        assert_eq!(
            scheduler.next_render_at("a").unwrap(),
            done_at.saturating_add(SignedDuration::from_secs(600 - lead)).unwrap(),
        );
    }

    #[test]
    fn due_once_past_next_render_at() {
        let now = ts("2026-01-10T12:00:00Z");
        let scheduler = Scheduler::new(two_pages(), now);

        // Just before a's scheduled time: nothing due.
        let before = zoned(civil::date(2026, 1, 10), civil::time(12, 8, 54, 0));
        assert!(scheduler.due_pages(&before).is_empty());

        // At/after it: a is due, b is not.
        let at = zoned(civil::date(2026, 1, 10), civil::time(12, 8, 55, 0));
        assert_eq!(scheduler.due_pages(&at), vec!["a".to_owned()]);
    }

    #[test]
    fn suppression_window_blocks_due_pages() {
        let config = config(
            r#"
api_key: k
supported_modes: [800x480x1xB]
pages:
  p:
    url: "https://p.example"
    refresh_interval: 600
    suppress_refresh: { start: "01:00", end: "06:00" }
"#,
        );
        let now = ts("2026-01-10T00:00:00Z");
        let scheduler = Scheduler::new(config, now);

        // Well past due, but inside the window.
        let suppressed = zoned(civil::date(2026, 1, 10), civil::time(2, 30, 0, 0));
        assert!(scheduler.due_pages(&suppressed).is_empty());

        // Past the window's end the page renders again; no backfill logic,
        // the stale next_render_at simply fires.
        let after = zoned(civil::date(2026, 1, 10), civil::time(6, 0, 1, 0));
        assert_eq!(scheduler.due_pages(&after), vec!["p".to_owned()]);
    }

    #[test]
    fn interval_shorter_than_lead_stays_due() {
        let config = config(
            r#"
api_key: k
supported_modes: [800x480x1xB]
pages:
  p: { url: "https://p.example", refresh_interval: 30 }
"#,
        );
        let now = ts("2026-01-10T12:00:00Z");
        let mut scheduler = Scheduler::new(config, now);

        // interval (30) < lead (35): next_render_at lands in the past, so
        // the page is immediately due again after each completion.
        scheduler.on_render_finished("p", Some(Duration::from_secs(30)), now);
        let after = zoned(civil::date(2026, 1, 10), civil::time(12, 0, 0, 0));
        assert_eq!(scheduler.due_pages(&after), vec!["p".to_owned()]);
    }

    #[test]
    fn status_reports_lead_and_durations() {
        let now = ts("2026-01-10T12:00:00Z");
        let mut scheduler = Scheduler::new(two_pages(), now);
        scheduler.on_render_finished("a", Some(Duration::from_secs(10)), now);

        let status = scheduler.status(now);
        assert_eq!(status.total_render_time, 40.0);
        assert_eq!(status.lead_time, 45.0);
        assert_eq!(status.pages["a"].last_render_duration, Some(10.0));
        assert_eq!(status.pages["b"].last_render_duration, None);
    }
}
