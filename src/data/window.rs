use chrono::{Datelike, Local, Months, NaiveDate};
use crate::data::types::{DateInterval, GetCostForecastInput, Granularity, DATE_FORMAT, UNBLENDED_COST};

/// Source of "today" for building forecast windows
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// A single forecast request, built fresh for each list call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastQuery {
    pub granularity: Granularity,
    pub metric: &'static str,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ForecastQuery {
    /// Returns `None` only when the window end falls outside chrono's date range.
    pub fn new(granularity: Granularity, today: NaiveDate) -> Option<Self> {
        let end = forecast_end_date(&granularity, today)?;
        Some(Self {
            granularity,
            metric: UNBLENDED_COST,
            start: today,
            end,
        })
    }

    pub fn to_input(&self) -> GetCostForecastInput {
        GetCostForecastInput {
            time_period: DateInterval {
                start: self.start.format(DATE_FORMAT).to_string(),
                end: self.end.format(DATE_FORMAT).to_string(),
            },
            granularity: self.granularity.as_str().to_string(),
            metric: self.metric.to_string(),
        }
    }
}

pub fn forecast_end_date(granularity: &Granularity, today: NaiveDate) -> Option<NaiveDate> {
    window_end(today, granularity.horizon_months())
}

/// Exclusive end of a window that runs through the last day of the month
/// `months` after the current one.
///
/// On the 1st of a month the end is simply `months` months later, which stops
/// one month short of the general rule. That asymmetry is intentional and
/// matches how existing forecasts were requested.
pub fn window_end(today: NaiveDate, months: u32) -> Option<NaiveDate> {
    if today.day() == 1 {
        return today.checked_add_months(Months::new(months));
    }
    today
        .with_day(1)?
        .checked_add_months(Months::new(months + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_monthly_on_first_of_month() {
        let end = forecast_end_date(&Granularity::Monthly, date(2026, 10, 1)).unwrap();
        assert_eq!(end, date(2027, 10, 1));
    }

    #[test]
    fn test_monthly_mid_month() {
        let end = forecast_end_date(&Granularity::Monthly, date(2026, 10, 15)).unwrap();
        assert_eq!(end, date(2027, 11, 1));
        // Window covers through the last day of the month twelve months out
        assert_eq!(end.pred_opt().unwrap(), date(2027, 10, 31));
    }

    #[test]
    fn test_daily_on_first_of_month() {
        let end = forecast_end_date(&Granularity::Daily, date(2026, 10, 1)).unwrap();
        assert_eq!(end, date(2027, 1, 1));
    }

    #[test]
    fn test_daily_mid_month() {
        let end = forecast_end_date(&Granularity::Daily, date(2026, 10, 15)).unwrap();
        assert_eq!(end, date(2027, 2, 1));
        assert_eq!(end.pred_opt().unwrap(), date(2027, 1, 31));
    }

    #[test]
    fn test_unknown_granularity_uses_twelve_months() {
        let other = Granularity::parse("hourly");
        assert_eq!(
            forecast_end_date(&other, date(2026, 10, 15)),
            forecast_end_date(&Granularity::Monthly, date(2026, 10, 15))
        );
        assert_eq!(
            forecast_end_date(&other, date(2026, 10, 1)).unwrap(),
            date(2027, 10, 1)
        );
    }

    #[test]
    fn test_lowercase_daily_selects_three_months() {
        for raw in ["daily", "Daily", "DAILY"] {
            let end = forecast_end_date(&Granularity::parse(raw), date(2026, 10, 15)).unwrap();
            assert_eq!(end, date(2027, 2, 1), "granularity {}", raw);
        }
    }

    #[test]
    fn test_end_of_month_days_do_not_overflow() {
        assert_eq!(window_end(date(2026, 1, 31), 12).unwrap(), date(2027, 2, 1));
        assert_eq!(window_end(date(2026, 11, 30), 3).unwrap(), date(2027, 3, 1));
        assert_eq!(window_end(date(2024, 2, 29), 3).unwrap(), date(2024, 6, 1));
    }

    #[test]
    fn test_query_formats_wire_dates() {
        let query = ForecastQuery::new(Granularity::parse("daily"), date(2026, 10, 5)).unwrap();
        let input = query.to_input();

        assert_eq!(input.time_period.start, "2026-10-05");
        assert_eq!(input.time_period.end, "2027-02-01");
        assert_eq!(input.granularity, "DAILY");
        assert_eq!(input.metric, "UNBLENDED_COST");
    }

    #[test]
    fn test_query_out_of_range() {
        assert!(ForecastQuery::new(Granularity::Monthly, NaiveDate::MAX).is_none());
    }

    #[test]
    fn test_fixed_clock() {
        assert_eq!(FixedClock(date(2026, 10, 15)).today(), date(2026, 10, 15));
    }
}
