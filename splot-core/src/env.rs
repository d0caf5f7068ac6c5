//! `Env` — the clock, resource-link resolver, and REST client threaded
//! through construction, replacing global executors and mutable module
//! state.

use crate::resource_link::{ResourceLinkManager, RestClient};
use chrono::{Datelike, Local, Timelike};
use std::sync::Arc;

/// A snapshot of the real-time clock's calendar fields, bound into SAE
/// execution as the `rtc.*` variables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RtcSnapshot {
    /// Calendar year.
    pub year: i32,
    /// Day of week, `0` = Monday .. `6` = Sunday.
    pub day_of_week: u8,
    /// Day of month, 0-based.
    pub day_of_month: u8,
    /// Time of day in fractional hours, `0.0..24.0`.
    pub time_of_day: f64,
    /// Month of year, `0` = January .. `11` = December.
    pub month_of_year: u8,
    /// Aligned week of month: which occurrence of this weekday within the
    /// month, 0-based (the 2nd Wednesday of the month has `awm = 1`).
    pub aligned_week_of_month: u8,
    /// Week of month, 0-based.
    pub week_of_month: u8,
    /// ISO week of year, 0-based, weeks starting Monday.
    pub week_of_year: u8,
}

/// Supplies the monotonic clock (for scheduling delays) and the wall clock
/// with calendar fields (for RTC-driven SAE expressions).
pub trait Clock: Send + Sync {
    /// Current wall-clock calendar snapshot.
    fn now_rtc(&self) -> RtcSnapshot;
}

/// A [`Clock`] backed by the system's local timezone via `chrono`.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_rtc(&self) -> RtcSnapshot {
        let now = Local::now();
        let day_of_week = now.weekday().num_days_from_monday() as u8;
        let day_of_month = (now.day() - 1) as u8;
        let time_of_day =
            now.hour() as f64 + now.minute() as f64 / 60.0 + now.second() as f64 / 3600.0;
        let month_of_year = (now.month() - 1) as u8;
        let week_of_month = day_of_month / 7;
        let aligned_week_of_month = day_of_month / 7;
        let week_of_year = now.iso_week().week0() as u8;
        RtcSnapshot {
            year: now.year(),
            day_of_week,
            day_of_month,
            time_of_day,
            month_of_year,
            aligned_week_of_month,
            week_of_month,
            week_of_year,
        }
    }
}

/// Everything the automation engine needs from the outside world, bundled
/// so it can be threaded through construction instead of reached for as
/// global state: a clock, a resource-link resolver, and a REST client.
#[derive(Clone)]
pub struct Env {
    /// Resolves URIs to resource links.
    pub resource_links: Arc<dyn ResourceLinkManager>,
    /// Performs REST-style calls against resolved URIs.
    pub rest_client: Arc<dyn RestClient>,
    /// Wall/monotonic clock source.
    pub clock: Arc<dyn Clock>,
}

impl Env {
    /// Build a new `Env` from its three collaborators.
    pub fn new(
        resource_links: Arc<dyn ResourceLinkManager>,
        rest_client: Arc<dyn RestClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Env {
            resource_links,
            rest_client,
            clock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtc_snapshot_fields_are_in_range() {
        let rtc = SystemClock.now_rtc();
        assert!(rtc.day_of_week <= 6);
        assert!(rtc.month_of_year <= 11);
        assert!(rtc.time_of_day >= 0.0 && rtc.time_of_day < 24.0);
    }
}
