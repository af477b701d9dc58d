use core::fmt;

use chrono::{Datelike, Days, Local, NaiveDate, Weekday};

use crate::utils::ArrayExt;

/// The moment a timesheet is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceTime {
    /// The current local date.
    #[default]
    Now,
    Date(NaiveDate),
}

impl ReferenceTime {
    #[must_use]
    pub fn resolve(&self) -> NaiveDate {
        match self {
            Self::Now => Local::now().date_naive(),
            Self::Date(date) => *date,
        }
    }
}

impl From<NaiveDate> for ReferenceTime {
    fn from(date: NaiveDate) -> Self {
        Self::Date(date)
    }
}

impl From<Option<NaiveDate>> for ReferenceTime {
    fn from(date: Option<NaiveDate>) -> Self {
        date.map_or(Self::Now, Self::Date)
    }
}

/// The seven days of a week, starting on a sunday and ending on a saturday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekWindow {
    days: [NaiveDate; 7],
}

impl WeekWindow {
    /// Returns the week in which `date` lies.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        let offset = match date.weekday() {
            Weekday::Sun => 0,
            week_day => week_day.num_days_from_monday() + 1,
        };

        let sunday = date - Days::new(u64::from(offset));

        Self {
            days: <[NaiveDate; 7]>::init_with(|index| sunday + Days::new(index as u64)),
        }
    }

    #[must_use]
    pub const fn days(&self) -> &[NaiveDate; 7] {
        &self.days
    }

    /// The sunday the week starts with.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.days[0]
    }

    /// The saturday the week ends with.
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.days[6]
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.iter().copied()
    }
}

impl fmt::Display for WeekWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start(), self.end())
    }
}

/// Returns the sunday to saturday week that is active at `reference`.
#[must_use]
pub fn current_week(reference: impl Into<ReferenceTime>) -> WeekWindow {
    WeekWindow::containing(reference.into().resolve())
}
