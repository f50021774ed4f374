use jiff::civil;

use ink_types::{PageConfig, TimeOfDay, DEFAULT_REFRESH_INTERVAL};

/// How long a device should sleep before checking in again.
///
/// This is the only signal the server has to re-phase a client, so it folds
/// in everything that should wake the device early: mandatory refresh times
/// pull the wake-up forward, and suppression windows park the device until
/// the window ends (or wake it right when one is about to start). Returns
/// whole seconds, never negative; `0` means "don't sleep" and is returned
/// exactly when sleep is disabled for the device.
pub fn sleep_seconds(page: Option<&PageConfig>, sleep_disabled: bool, now: civil::Time) -> i64 {
    if sleep_disabled {
        return 0;
    }

    let Some(page) = page else {
        return DEFAULT_REFRESH_INTERVAL as i64;
    };

    let mut candidate = page.refresh_interval as i64;

    for mandatory in &page.mandatory_refresh {
        let until = seconds_until_next(*mandatory, now);
        if until < candidate {
            candidate = until;
        }
    }

    if let Some(window) = &page.suppress_refresh {
        if window.contains(now) {
            // Parked: sleep through the rest of the window.
            candidate = window.end.seconds_into_day() - seconds_of_day(now);
        } else if !window.is_empty() {
            let until_start = seconds_until_next(window.start, now);
            if until_start < candidate {
                candidate = until_start;
            }
        }
    }

    candidate.max(0)
}

/// Seconds until the next daily occurrence of `t`: later today if `t` is
/// still ahead, otherwise tomorrow.
fn seconds_until_next(t: TimeOfDay, now: civil::Time) -> i64 {
    let mut delta = t.seconds_into_day() - seconds_of_day(now);
    if delta <= 0 {
        delta += 24 * 3600;
    }
    delta
}

fn seconds_of_day(t: civil::Time) -> i64 {
    t.hour() as i64 * 3600 + t.minute() as i64 * 60 + t.second() as i64
}

// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use ink_types::ServerConfig;

    fn page(yaml_page: &str) -> PageConfig {
        let yaml = format!(
            "api_key: k\nsupported_modes: [800x480x1xB]\npages:\n  p:\n{yaml_page}"
        );
        ServerConfig::from_yaml(&yaml).unwrap().pages["p"].clone()
    }

    fn at(h: i8, m: i8, s: i8) -> civil::Time {
        civil::time(h, m, s, 0)
    }

    #[test]
    fn plain_interval() {
        let p = page("    { url: \"https://x\", refresh_interval: 600 }");
        assert_eq!(sleep_seconds(Some(&p), false, at(12, 0, 0)), 600);
    }

    #[test]
    fn sleep_disabled_wins() {
        let p = page("    { url: \"https://x\", refresh_interval: 600 }");
        assert_eq!(sleep_seconds(Some(&p), true, at(12, 0, 0)), 0);
    }

    #[test]
    fn no_page_falls_back_to_default_interval() {
        assert_eq!(
            sleep_seconds(None, false, at(12, 0, 0)),
            DEFAULT_REFRESH_INTERVAL as i64
        );
    }

    #[test]
    fn mandatory_refresh_pulls_the_wakeup_forward() {
        let p = page(
            "    { url: \"https://x\", refresh_interval: 3600, mandatory_refresh: [\"08:00\"] }",
        );

        // Five minutes before the mandatory time.
        assert_eq!(sleep_seconds(Some(&p), false, at(7, 55, 0)), 300);

        // An hour past it: the next occurrence is tomorrow, far beyond the
        // interval, so the interval wins.
        assert_eq!(sleep_seconds(Some(&p), false, at(9, 0, 0)), 3600);
    }

    #[test]
    fn mandatory_refresh_exactly_now_wraps_to_tomorrow() {
        let p = page(
            "    { url: \"https://x\", refresh_interval: 90000, mandatory_refresh: [\"08:00\"] }",
        );
        // 24h await is shorter than the (absurd) 25h interval.
        assert_eq!(sleep_seconds(Some(&p), false, at(8, 0, 0)), 24 * 3600);
    }

    #[test]
    fn earliest_of_several_mandatory_times_wins() {
        let p = page(
            "    { url: \"https://x\", refresh_interval: 3600, \
             mandatory_refresh: [\"14:00\", \"12:30\"] }",
        );
        assert_eq!(sleep_seconds(Some(&p), false, at(12, 0, 0)), 1800);
    }

    #[test]
    fn inside_suppression_sleeps_until_the_window_ends() {
        let p = page(
            "    { url: \"https://x\", refresh_interval: 600, \
             suppress_refresh: { start: \"01:00\", end: \"06:00\" } }",
        );
        // 02:30 → 06:00 is 3.5 hours.
        assert_eq!(sleep_seconds(Some(&p), false, at(2, 30, 0)), 12600);
    }

    #[test]
    fn imminent_suppression_start_caps_the_sleep() {
        let p = page(
            "    { url: \"https://x\", refresh_interval: 600, \
             suppress_refresh: { start: \"01:00\", end: \"06:00\" } }",
        );
        // 00:55: the window opens in 5 minutes, before the interval is up.
        assert_eq!(sleep_seconds(Some(&p), false, at(0, 55, 0)), 300);

        // 20:00: the window is hours away, the interval wins.
        assert_eq!(sleep_seconds(Some(&p), false, at(20, 0, 0)), 600);
    }

    #[test]
    fn empty_window_never_suppresses() {
        let p = page(
            "    { url: \"https://x\", refresh_interval: 600, \
             suppress_refresh: { start: \"06:00\", end: \"06:00\" } }",
        );
        assert_eq!(sleep_seconds(Some(&p), false, at(6, 0, 0)), 600);
    }

    #[test]
    fn window_end_boundary_is_inclusive() {
        let p = page(
            "    { url: \"https://x\", refresh_interval: 600, \
             suppress_refresh: { start: \"01:00\", end: \"06:00\" } }",
        );
        // Exactly at the end: still inside, zero seconds left.
        assert_eq!(sleep_seconds(Some(&p), false, at(6, 0, 0)), 0);
    }

    #[test]
    fn never_negative() {
        let p = page(
            "    { url: \"https://x\", refresh_interval: 600, \
             suppress_refresh: { start: \"01:00\", end: \"06:00\" } }",
        );
        for h in 0..24 {
            for m in [0, 15, 30, 45] {
                assert!(sleep_seconds(Some(&p), false, at(h, m, 0)) >= 0);
            }
        }
    }
}
