//! Transaction query engine
//!
//! Turns listing parameters into a [`TransactionFilter`] anchored at a given
//! instant. Windows are rolling fixed-day lookbacks, not calendar periods;
//! the month-to-date summary is the one calendar-aligned period.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeDelta, Utc};
use tracing::debug;

use crate::models::transaction::{TransactionFilter, TransactionListQuery, TransactionType};

/// Lookback window for transaction listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Period {
    #[default]
    All,
    Month,
    ThreeMonths,
    Year,
}

impl Period {
    /// Parse the `period` query value; anything unrecognised means [`Period::All`]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None | Some("all") => Period::All,
            Some("month") => Period::Month,
            Some("3months") => Period::ThreeMonths,
            Some("year") => Period::Year,
            Some(other) => {
                debug!("Ignoring unknown period filter {:?}", other);
                Period::All
            }
        }
    }

    pub fn lookback_days(self) -> Option<i64> {
        match self {
            Period::All => None,
            Period::Month => Some(30),
            Period::ThreeMonths => Some(90),
            Period::Year => Some(365),
        }
    }

    /// Earliest date included when the window is anchored at `now`
    pub fn window_start(self, now: DateTime<Utc>) -> Option<NaiveDate> {
        self.lookback_days()
            .map(|days| (now - TimeDelta::days(days)).date_naive())
    }
}

/// Parsed listing parameters, independent of the current time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionQuery {
    pub transaction_type: Option<TransactionType>,
    pub period: Period,
}

impl TransactionQuery {
    /// Build from raw query parameters; invalid values are ignored, not rejected
    pub fn from_params(params: &TransactionListQuery) -> Self {
        let transaction_type = params.transaction_type.as_deref().and_then(|raw| {
            let parsed = TransactionType::parse(raw);
            if parsed.is_none() {
                debug!("Ignoring unknown transaction_type filter {:?}", raw);
            }
            parsed
        });

        Self {
            transaction_type,
            period: Period::parse(params.period.as_deref()),
        }
    }

    /// Resolve the query into a row filter at instant `now`
    pub fn filter_at(&self, now: DateTime<Utc>) -> TransactionFilter {
        TransactionFilter {
            transaction_type: self.transaction_type,
            since: self.period.window_start(now),
        }
    }
}

/// Midnight UTC on the first day of `now`'s month
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    today
        .with_day(1)
        .unwrap_or(today)
        .and_time(NaiveTime::MIN)
        .and_utc()
}
