/// A local wall-clock time of day with minute resolution, e.g. `08:30`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("expected HH:MM (e.g. \"08:30\"), got {0:?}")]
pub struct TimeOfDayParseError(pub String);

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, TimeOfDayParseError> {
        if hour > 23 || minute > 59 {
            return Err(TimeOfDayParseError(format!("{hour:02}:{minute:02}")));
        }
        Ok(Self { hour, minute })
    }

    /// Seconds since local midnight.
    #[inline]
    pub fn seconds_into_day(&self) -> i64 {
        self.hour as i64 * 3600 + self.minute as i64 * 60
    }

    #[inline]
    pub fn civil(&self) -> jiff::civil::Time {
        jiff::civil::time(self.hour as i8, self.minute as i8, 0, 0)
    }
}

impl std::fmt::Display for TimeOfDay {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl std::str::FromStr for TimeOfDay {
    type Err = TimeOfDayParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TimeOfDayParseError(s.to_owned());
        let (h, m) = s.split_once(':').ok_or_else(err)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(err());
        }
        let hour: u8 = h.parse().map_err(|_| err())?;
        let minute: u8 = m.parse().map_err(|_| err())?;
        Self::new(hour, minute).map_err(|_| err())
    }
}

impl serde::Serialize for TimeOfDay {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for TimeOfDay {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ----------------------------------------------------------------------------

/// A daily local-time interval during which no render is triggered.
///
/// Both bounds are inclusive. Windows never straddle midnight (enforced at
/// config load); `start == end` is an empty window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SuppressWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl SuppressWindow {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Is the given time inside the window?
    pub fn contains(&self, t: jiff::civil::Time) -> bool {
        !self.is_empty() && self.start.civil() <= t && t <= self.end.civil()
    }
}

// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tod(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    #[test]
    fn parse_roundtrip() {
        for s in ["00:00", "08:30", "23:59"] {
            assert_eq!(tod(s).to_string(), s);
        }
        // A single-digit hour is accepted but formats back zero-padded.
        assert_eq!(tod("8:30").to_string(), "08:30");
    }

    #[test]
    fn reject_invalid() {
        for s in ["", "8", "24:00", "12:60", "12:3", "ab:cd", "12:34:56"] {
            assert!(s.parse::<TimeOfDay>().is_err(), "{s:?} should not parse");
        }
    }

    #[test]
    fn window_contains_is_inclusive() {
        let w = SuppressWindow {
            start: tod("01:00"),
            end: tod("06:00"),
        };
        assert!(w.contains(jiff::civil::time(1, 0, 0, 0)));
        assert!(w.contains(jiff::civil::time(2, 30, 0, 0)));
        assert!(w.contains(jiff::civil::time(6, 0, 0, 0)));
        assert!(!w.contains(jiff::civil::time(0, 59, 59, 0)));
        assert!(!w.contains(jiff::civil::time(6, 0, 1, 0)));
    }

    #[test]
    fn empty_window_contains_nothing() {
        let w = SuppressWindow {
            start: tod("06:00"),
            end: tod("06:00"),
        };
        assert!(w.is_empty());
        assert!(!w.contains(jiff::civil::time(6, 0, 0, 0)));
    }
}
