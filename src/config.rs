use std::collections::HashMap;
use std::env;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveTime;
use dotenvy::dotenv;

use crate::model::leave_request::LeaveType;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Proof uploads land here and are served from the public base
    pub proof_dir: String,
    pub proof_public_base: String,

    pub policy: Policy,
}

/// Organisation rules the engines apply.
#[derive(Debug, Clone)]
pub struct Policy {
    pub attendance: AttendancePolicy,
    pub duty: DutyPolicy,
    pub quotas: HashMap<LeaveType, u32>,
}

#[derive(Debug, Clone)]
pub struct AttendancePolicy {
    /// Check-ins after this time of day are late.
    pub work_start: NaiveTime,
    /// Minimum worked minutes before a checkout counts as completed.
    pub min_work_minutes: i64,
    /// Open sessions from an earlier day older than this are outdated.
    pub stale_after_hours: i64,
    /// Corrected checkout times before this belong to the next calendar day.
    pub overnight_cutoff: NaiveTime,
    pub require_proof: bool,
    pub retention_days: i64,
}

#[derive(Debug, Clone)]
pub struct DutyPolicy {
    /// Grace period after the duty day ends before it is abandoned.
    pub tribunal_window_hours: i64,
    /// Seconds the lock screen stays up before acknowledgment unlocks.
    pub acknowledge_dwell_secs: u64,
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            work_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            min_work_minutes: 8 * 60,
            stale_after_hours: 18,
            overnight_cutoff: NaiveTime::from_hms_opt(5, 0, 0).unwrap_or_default(),
            require_proof: false,
            retention_days: 730,
        }
    }
}

impl Default for DutyPolicy {
    fn default() -> Self {
        Self {
            tribunal_window_hours: 24,
            acknowledge_dwell_secs: 5,
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            attendance: AttendancePolicy::default(),
            duty: DutyPolicy::default(),
            quotas: default_quotas(),
        }
    }
}

pub fn default_quotas() -> HashMap<LeaveType, u32> {
    HashMap::from([
        (LeaveType::Sick, 12),
        (LeaveType::Vacation, 14),
        (LeaveType::Personal, 3),
        (LeaveType::Emergency, 3),
        (LeaveType::LateEntry, 6),
        (LeaveType::ForgotCheckIn, 4),
        (LeaveType::ForgotCheckOut, 4),
        (LeaveType::WorkFromHome, 24),
    ])
}

/// Parses `sick=12,vacation=14`. Types left out fall back to the defaults;
/// overtime has no allowance unless listed.
pub fn parse_quotas(raw: &str) -> Result<HashMap<LeaveType, u32>> {
    let mut quotas = default_quotas();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (kind, amount) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("quota entry `{}` must look like type=n", pair))?;
        let kind = LeaveType::from_str(kind.trim())
            .map_err(|_| anyhow!("unknown leave type `{}` in LEAVE_QUOTAS", kind))?;
        let amount = amount
            .trim()
            .parse::<u32>()
            .with_context(|| format!("invalid quota for {}", kind))?;
        quotas.insert(kind, amount);
    }
    Ok(quotas)
}

fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} is invalid: {}", key, e)),
        Err(_) => Ok(default),
    }
}

/// Rejects settings the engines cannot turn into a calendar span.
fn within<T>(key: &str, value: T, range: RangeInclusive<T>) -> Result<T>
where
    T: PartialOrd + Display,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(anyhow!(
            "{} must be between {} and {}, got {}",
            key,
            range.start(),
            range.end(),
            value
        ))
    }
}

fn bounded_or<T>(key: &str, default: T, range: RangeInclusive<T>) -> Result<T>
where
    T: FromStr + PartialOrd + Display,
    T::Err: Display,
{
    within(key, var_or(key, default)?, range)
}

const HOURS_PER_YEAR: i64 = 365 * 24;
const SECONDS_PER_YEAR: usize = 365 * 24 * 60 * 60;

fn time_or(key: &str, default: NaiveTime) -> Result<NaiveTime> {
    match env::var(key) {
        Ok(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .with_context(|| format!("{} must be HH:MM", key)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let defaults = Policy::default();
        let min_work_hours: f64 = bounded_or("MIN_WORK_HOURS", 8.0, 0.0..=24.0)?;

        let policy = Policy {
            attendance: AttendancePolicy {
                work_start: time_or("WORK_START_TIME", defaults.attendance.work_start)?,
                min_work_minutes: (min_work_hours * 60.0).round() as i64,
                stale_after_hours: bounded_or("STALE_SESSION_HOURS", 18, 1..=HOURS_PER_YEAR)?,
                overnight_cutoff: time_or("OVERNIGHT_CUTOFF", defaults.attendance.overnight_cutoff)?,
                require_proof: var_or("REQUIRE_CHECK_IN_PROOF", false)?,
                retention_days: bounded_or("ATTENDANCE_RETENTION_DAYS", 730, 1..=36_500)?,
            },
            duty: DutyPolicy {
                tribunal_window_hours: bounded_or("TRIBUNAL_WINDOW_HOURS", 24, 0..=HOURS_PER_YEAR)?,
                acknowledge_dwell_secs: bounded_or("ACKNOWLEDGE_DWELL_SECONDS", 5, 0..=3600)?,
            },
            quotas: match env::var("LEAVE_QUOTAS") {
                Ok(raw) => parse_quotas(&raw)?,
                Err(_) => defaults.quotas,
            },
        };

        Ok(Self {
            server_addr: env::var("SERVER_ADDR").context("SERVER_ADDR must be set")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            access_token_ttl: bounded_or("ACCESS_TOKEN_TTL", 900, 1..=SECONDS_PER_YEAR)?, // 15 min
            refresh_token_ttl: bounded_or("REFRESH_TOKEN_TTL", 604800, 1..=SECONDS_PER_YEAR)?, // 7 days

            rate_login_per_min: var_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_refresh_per_min: var_or("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: var_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            proof_dir: env::var("PROOF_DIR").unwrap_or_else(|_| "uploads".to_string()),
            proof_public_base: env::var("PROOF_PUBLIC_BASE")
                .unwrap_or_else(|_| "/uploads".to_string()),

            policy,
        })
    }
}
