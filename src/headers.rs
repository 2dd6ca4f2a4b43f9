use chrono::{Datelike, NaiveDate};

/// Tag pairs of one game, in first-seen order.
///
/// Re-setting a tag overwrites its value in place, so export keeps the
/// original ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True only when no tag pair was seen; tags with empty values count.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn result(&self) -> Option<&str> {
        self.get("Result").filter(|value| !value.is_empty())
    }

    /// Setup position, honoured only when present and non-empty.
    pub fn fen(&self) -> Option<&str> {
        self.get("FEN")
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn is_chess960(&self) -> bool {
        self.get("Variant").is_some_and(|variant| {
            let variant = variant.to_ascii_lowercase();
            variant.contains("960") || variant == "fischerandom"
        })
    }

    /// `Date` as a calendar date.
    ///
    /// Unknown month or day (`??`) fall back to 1, days past the end of the
    /// month are clamped. An unknown year means no date.
    pub fn date(&self) -> Option<NaiveDate> {
        parse_pgn_date(self.get("Date")?)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

fn parse_pgn_date(raw: &str) -> Option<NaiveDate> {
    let norm = raw.trim().replace('-', ".");
    let parts: Vec<&str> = norm.split('.').collect();
    if parts.len() != 3 || parts[0].contains('?') {
        return None;
    }

    let year: i32 = parts[0].parse().ok()?;
    let month: u32 = if parts[1].contains('?') {
        1
    } else {
        parts[1].parse().ok()?
    };
    let day: u32 = if parts[2].contains('?') {
        1
    } else {
        parts[2].parse().ok()?
    };

    let last_day = last_day_of_month(year, month)?;
    let date = NaiveDate::from_ymd_opt(year, month, day.min(last_day))?;
    (date.year() > 0).then_some(date)
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let first_day_next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month.checked_add(1)?, 1)?
    };

    first_day_next_month.pred_opt().map(|d| d.day())
}
