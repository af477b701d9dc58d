#[macro_export]
macro_rules! date {
    ($year:literal : $month:literal : $day:literal) => {{
        static_assertions::const_assert!($month >= 1 && $month <= 12);
        static_assertions::const_assert!($day >= 1 && $day <= 31);

        ::chrono::NaiveDate::from_ymd_opt($year, $month, $day)
            .expect(concat!("invalid date: ", $year, "-", $month, "-", $day))
    }};
}

#[macro_export]
macro_rules! time_stamp {
    ( $hours:literal : $mins:literal ) => {{
        static_assertions::const_assert!($hours < 24);
        static_assertions::const_assert!($mins < 60);

        ::chrono::NaiveTime::from_hms_opt($hours, $mins, 0)
            .expect("time_stamp! is bounds checked at compile time")
    }};
}
