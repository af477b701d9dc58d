use chrono::{Datelike, Month, NaiveDate};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` is not one of the options")]
pub struct InvalidPick(String);

/// The part of the date that is picked next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarStep {
    Year,
    Month,
    Day,
}

impl CalendarStep {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
        }
    }
}

/// Picks a date by asking for the year, the month and the day in turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calendar {
    today: NaiveDate,
    year: Option<i32>,
    month: Option<u32>,
}

fn month_label(month: u32) -> String {
    u8::try_from(month)
        .ok()
        .and_then(|month| Month::try_from(month).ok())
        .map_or_else(|| month.to_string(), |month| month.name()[..3].to_string())
}

impl Calendar {
    /// Years offered around `today`.
    const YEARS_AROUND: i32 = 1;

    #[must_use]
    pub const fn new(today: NaiveDate) -> Self {
        Self {
            today,
            year: None,
            month: None,
        }
    }

    #[must_use]
    pub const fn step(&self) -> CalendarStep {
        match (self.year, self.month) {
            (None, _) => CalendarStep::Year,
            (Some(_), None) => CalendarStep::Month,
            (Some(_), Some(_)) => CalendarStep::Day,
        }
    }

    #[must_use]
    pub fn prompt(&self) -> String {
        format!("Select {}", self.step().name())
    }

    /// The labels that can be picked in the current step.
    #[must_use]
    pub fn options(&self) -> Vec<String> {
        match (self.year, self.month) {
            (None, _) => {
                let year = self.today.year();
                (year - Self::YEARS_AROUND..=year + Self::YEARS_AROUND)
                    .map(|year| year.to_string())
                    .collect()
            }
            (Some(_), None) => (1..=12).map(month_label).collect(),
            (Some(year), Some(month)) => (1..=31)
                .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
                .map(|date| date.day().to_string())
                .collect(),
        }
    }

    /// Picks `label` in the current step.
    ///
    /// Returns the date once the day has been picked.
    pub fn pick(&mut self, label: &str) -> Result<Option<NaiveDate>, InvalidPick> {
        let label = label.trim();
        let index = self
            .options()
            .iter()
            .position(|option| option.eq_ignore_ascii_case(label))
            .ok_or_else(|| InvalidPick(label.to_string()))?;

        match (self.year, self.month) {
            (None, _) => {
                self.year = Some(self.today.year() - Self::YEARS_AROUND + index as i32);
                Ok(None)
            }
            (Some(_), None) => {
                self.month = Some(index as u32 + 1);
                Ok(None)
            }
            (Some(year), Some(month)) => Ok(NaiveDate::from_ymd_opt(year, month, index as u32 + 1)),
        }
    }
}
