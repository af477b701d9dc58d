use crate::template::{CellRange, CellRef};

/// Where the fields of a timesheet are written to in the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Day of the month, one column per day from sunday to saturday.
    pub day_numbers: [CellRef; 7],
    pub week_start: CellRef,
    pub week_end: CellRef,
    /// One row per time entry row of the source, one column per day.
    pub time_block: CellRange,
    /// One row per mark row of the source, one column per day.
    pub mark_block: CellRange,
    pub totals: [CellRef; 4],
    pub identity: CellRef,
    /// Top left corner of the logo.
    pub logo_anchor: CellRef,
}

impl Layout {
    /// The layout of the weekly timesheet template.
    pub const WEEKLY: Self = Self {
        day_numbers: [
            CellRef::at(b'E', 6),
            CellRef::at(b'F', 6),
            CellRef::at(b'G', 6),
            CellRef::at(b'H', 6),
            CellRef::at(b'I', 6),
            CellRef::at(b'J', 6),
            CellRef::at(b'K', 6),
        ],
        week_start: CellRef::at(b'G', 2),
        week_end: CellRef::at(b'J', 2),
        time_block: CellRange::new(CellRef::at(b'E', 8), CellRef::at(b'K', 15)),
        mark_block: CellRange::new(CellRef::at(b'E', 16), CellRef::at(b'K', 43)),
        totals: [
            CellRef::at(b'C', 8),
            CellRef::at(b'C', 10),
            CellRef::at(b'C', 12),
            CellRef::at(b'C', 14),
        ],
        identity: CellRef::at(b'G', 3),
        logo_anchor: CellRef::at(b'B', 2),
    };

    /// Every cell that is written to, named after the field.
    pub fn destinations(&self) -> impl Iterator<Item = (&'static str, CellRef)> + '_ {
        let single = [
            ("week start", self.week_start),
            ("week end", self.week_end),
            ("identity", self.identity),
            ("logo anchor", self.logo_anchor),
        ];

        self.day_numbers
            .iter()
            .map(|cell| ("day number", *cell))
            .chain(single)
            .chain(self.totals.iter().map(|cell| ("total hours", *cell)))
            .chain(
                [
                    ("time block", self.time_block.first()),
                    ("time block", self.time_block.last()),
                    ("mark block", self.mark_block.first()),
                    ("mark block", self.mark_block.last()),
                ]
                .into_iter(),
            )
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::WEEKLY
    }
}
