//! Leave balances, recomputed from approved history on every read.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use strum::IntoEnumIterator;
use utoipa::ToSchema;

use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};

/// Consumed quantity per leave type: days for day-based types, request
/// count for incident types. Every type is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveUsage(BTreeMap<LeaveType, u32>);

impl LeaveUsage {
    pub fn get(&self, leave_type: LeaveType) -> u32 {
        self.0.get(&leave_type).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (LeaveType, u32)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

/// Accounting period: the calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn containing(date: NaiveDate) -> Self {
        let year = date.year();
        Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(date),
            end: NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(date),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// How much a single request consumes of its type's allowance.
pub fn units(request: &LeaveRequest) -> u32 {
    if request.leave_type.is_incident() {
        1
    } else {
        request.day_count()
    }
}

/// Sums the user's approved requests starting inside the period.
pub fn leave_usage(requests: &[LeaveRequest], user_id: u64, period: Period) -> LeaveUsage {
    let mut usage: BTreeMap<LeaveType, u32> = LeaveType::iter().map(|t| (t, 0)).collect();
    for request in requests.iter().filter(|r| {
        r.user_id == user_id && r.status == LeaveStatus::Approved && period.contains(r.start_date)
    }) {
        *usage.entry(request.leave_type).or_insert(0) += units(request);
    }
    LeaveUsage(usage)
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct QuotaLine {
    pub leave_type: LeaveType,
    pub used: u32,
    /// `None` when the type has no allowance configured.
    pub quota: Option<u32>,
    pub remaining: Option<i64>,
    pub over_quota: bool,
}

pub fn balances(usage: &LeaveUsage, quotas: &HashMap<LeaveType, u32>) -> Vec<QuotaLine> {
    usage
        .iter()
        .map(|(leave_type, used)| {
            let quota = quotas.get(&leave_type).copied();
            let remaining = quota.map(|q| q as i64 - used as i64);
            QuotaLine {
                leave_type,
                used,
                quota,
                remaining,
                over_quota: remaining.is_some_and(|r| r < 0),
            }
        })
        .collect()
}
