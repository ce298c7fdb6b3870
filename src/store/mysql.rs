use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::{FromRow, MySqlConnection, MySqlPool};

use super::{ApprovalEffect, LeaveInsert, Store};
use crate::error::{AppError, AppResult};
use crate::model::attendance::{AttendanceDay, AttendanceStatus, Coordinates, NewCheckIn};
use crate::model::duty::{Duty, NewDuty};
use crate::model::duty_swap::{AssigneeClaim, DutySwap, NewDutySwap};
use crate::model::leave_request::{LeaveQuery, LeaveRequest, LeaveStatus, NewLeaveRequest};
use crate::model::location_zone::LocationZone;

const ATTENDANCE_COLUMNS: &str = "id, user_id, shift_date, check_in, check_out, work_type, \
     status, is_late, proof_url, latitude, longitude, location_name, location_verified, \
     early_leave_reason, is_corrected";

const LEAVE_COLUMNS: &str = "id, user_id, leave_type, start_date, end_date, reason, \
     incident_time, overtime_hours, attachment_url, status, approver_id, rejection_reason, \
     created_at";

const DUTY_COLUMNS: &str = "id, title, assignee_id, duty_date, is_done, proof_url, \
     penalty_status, is_penalized, appeal_reason, appeal_proof_url, abandoned_at, \
     cleared_by_system, completion_scored";

const SWAP_COLUMNS: &str =
    "id, requestor_id, own_duty_id, target_duty_id, target_user_id, status, created_at";

/// Parses an enum column, reporting bad values as decode errors.
fn decode<T: FromStr>(column: &str, raw: &str) -> AppResult<T> {
    raw.parse().map_err(|_| {
        AppError::Database(sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: format!("unexpected value `{}`", raw).into(),
        })
    })
}

#[derive(FromRow)]
struct AttendanceRow {
    id: u64,
    user_id: u64,
    shift_date: NaiveDate,
    check_in: Option<NaiveDateTime>,
    check_out: Option<NaiveDateTime>,
    work_type: String,
    status: String,
    is_late: bool,
    proof_url: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    location_name: Option<String>,
    location_verified: bool,
    early_leave_reason: Option<String>,
    is_corrected: bool,
}

impl TryFrom<AttendanceRow> for AttendanceDay {
    type Error = AppError;

    fn try_from(row: AttendanceRow) -> AppResult<Self> {
        Ok(AttendanceDay {
            id: row.id,
            user_id: row.user_id,
            shift_date: row.shift_date,
            check_in: row.check_in,
            check_out: row.check_out,
            work_type: decode("work_type", &row.work_type)?,
            status: decode("status", &row.status)?,
            is_late: row.is_late,
            proof_url: row.proof_url,
            coordinates: match (row.latitude, row.longitude) {
                (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
                _ => None,
            },
            location_name: row.location_name,
            location_verified: row.location_verified,
            early_leave_reason: row.early_leave_reason,
            is_corrected: row.is_corrected,
        })
    }
}

#[derive(FromRow)]
struct LeaveRow {
    id: u64,
    user_id: u64,
    leave_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: String,
    incident_time: Option<NaiveTime>,
    overtime_hours: Option<f64>,
    attachment_url: Option<String>,
    status: String,
    approver_id: Option<u64>,
    rejection_reason: Option<String>,
    created_at: NaiveDateTime,
}

impl TryFrom<LeaveRow> for LeaveRequest {
    type Error = AppError;

    fn try_from(row: LeaveRow) -> AppResult<Self> {
        Ok(LeaveRequest {
            id: row.id,
            user_id: row.user_id,
            leave_type: decode("leave_type", &row.leave_type)?,
            start_date: row.start_date,
            end_date: row.end_date,
            reason: row.reason,
            incident_time: row.incident_time,
            overtime_hours: row.overtime_hours,
            attachment_url: row.attachment_url,
            status: decode("status", &row.status)?,
            approver_id: row.approver_id,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct DutyRow {
    id: u64,
    title: String,
    assignee_id: u64,
    duty_date: NaiveDate,
    is_done: bool,
    proof_url: Option<String>,
    penalty_status: String,
    is_penalized: bool,
    appeal_reason: Option<String>,
    appeal_proof_url: Option<String>,
    abandoned_at: Option<NaiveDateTime>,
    cleared_by_system: bool,
    completion_scored: bool,
}

impl TryFrom<DutyRow> for Duty {
    type Error = AppError;

    fn try_from(row: DutyRow) -> AppResult<Self> {
        Ok(Duty {
            id: row.id,
            title: row.title,
            assignee_id: row.assignee_id,
            date: row.duty_date,
            is_done: row.is_done,
            proof_url: row.proof_url,
            penalty_status: decode("penalty_status", &row.penalty_status)?,
            is_penalized: row.is_penalized,
            appeal_reason: row.appeal_reason,
            appeal_proof_url: row.appeal_proof_url,
            abandoned_at: row.abandoned_at,
            cleared_by_system: row.cleared_by_system,
            completion_scored: row.completion_scored,
        })
    }
}

#[derive(FromRow)]
struct SwapRow {
    id: u64,
    requestor_id: u64,
    own_duty_id: u64,
    target_duty_id: u64,
    target_user_id: u64,
    status: String,
    created_at: NaiveDateTime,
}

impl TryFrom<SwapRow> for DutySwap {
    type Error = AppError;

    fn try_from(row: SwapRow) -> AppResult<Self> {
        Ok(DutySwap {
            id: row.id,
            requestor_id: row.requestor_id,
            own_duty_id: row.own_duty_id,
            target_duty_id: row.target_duty_id,
            target_user_id: row.target_user_id,
            status: decode("status", &row.status)?,
            created_at: row.created_at,
        })
    }
}

fn convert<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn day_for_update(
        conn: &mut MySqlConnection,
        user_id: u64,
        date: NaiveDate,
    ) -> AppResult<Option<AttendanceDay>> {
        let sql = format!(
            "SELECT {} FROM attendance_logs WHERE user_id = ? AND shift_date = ? FOR UPDATE",
            ATTENDANCE_COLUMNS
        );
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(user_id)
            .bind(date)
            .fetch_optional(&mut *conn)
            .await?
            .map(AttendanceDay::try_from)
            .transpose()
    }

    async fn has_open_session(conn: &mut MySqlConnection, user_id: u64) -> AppResult<bool> {
        let open = sqlx::query_scalar::<_, u64>(
            r#"
            SELECT id FROM attendance_logs
            WHERE user_id = ? AND check_in IS NOT NULL AND check_out IS NULL
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(open.is_some())
    }

    async fn apply_effect(
        conn: &mut MySqlConnection,
        user_id: u64,
        effect: &ApprovalEffect,
    ) -> AppResult<()> {
        match effect {
            ApprovalEffect::None => {}
            ApprovalEffect::LeaveDays { dates } => {
                let (Some(first), Some(last)) = (dates.first(), dates.last()) else {
                    return Ok(());
                };
                let worked = sqlx::query_scalar::<_, NaiveDate>(
                    r#"
                    SELECT shift_date FROM attendance_logs
                    WHERE user_id = ? AND shift_date BETWEEN ? AND ? AND check_in IS NOT NULL
                    ORDER BY shift_date
                    LIMIT 1
                    FOR UPDATE
                    "#,
                )
                .bind(user_id)
                .bind(first)
                .bind(last)
                .fetch_optional(&mut *conn)
                .await?;
                if let Some(date) = worked {
                    return Err(AppError::conflict(format!(
                        "Attendance is already recorded on {}",
                        date
                    )));
                }
                for date in dates {
                    sqlx::query(
                        r#"
                        INSERT INTO attendance_logs (user_id, shift_date, work_type, status)
                        VALUES (?, ?, 'leave', 'leave')
                        ON DUPLICATE KEY UPDATE
                            work_type = 'leave',
                            status = 'leave',
                            check_in = NULL,
                            check_out = NULL,
                            is_late = FALSE,
                            early_leave_reason = NULL
                        "#,
                    )
                    .bind(user_id)
                    .bind(date)
                    .execute(&mut *conn)
                    .await?;
                }
            }
            ApprovalEffect::CheckIn {
                shift_date,
                check_in,
                is_late,
            } => match Self::day_for_update(conn, user_id, *shift_date).await? {
                Some(day) if day.status == AttendanceStatus::Leave => {
                    return Err(AppError::OnLeave(*shift_date));
                }
                Some(day) if day.check_out.is_some_and(|out| out <= *check_in) => {
                    return Err(AppError::validation(
                        "Corrected check-in is not before the recorded checkout",
                    ));
                }
                Some(day) => {
                    sqlx::query(
                        r#"
                        UPDATE attendance_logs
                        SET check_in = ?, is_late = ?, is_corrected = TRUE
                        WHERE id = ?
                        "#,
                    )
                    .bind(check_in)
                    .bind(is_late)
                    .bind(day.id)
                    .execute(&mut *conn)
                    .await?;
                }
                None => {
                    if Self::has_open_session(conn, user_id).await? {
                        return Err(AppError::conflict("Another session is still open"));
                    }
                    sqlx::query(
                        r#"
                        INSERT INTO attendance_logs
                            (user_id, shift_date, check_in, work_type, status, is_late, is_corrected)
                        VALUES (?, ?, ?, 'office', 'working', ?, TRUE)
                        "#,
                    )
                    .bind(user_id)
                    .bind(shift_date)
                    .bind(check_in)
                    .bind(is_late)
                    .execute(&mut *conn)
                    .await?;
                }
            },
            ApprovalEffect::CheckOut {
                shift_date,
                check_out,
            } => {
                let result = sqlx::query(
                    r#"
                    UPDATE attendance_logs
                    SET check_out = ?, status = 'completed', is_corrected = TRUE
                    WHERE user_id = ? AND shift_date = ? AND check_in IS NOT NULL
                    "#,
                )
                .bind(check_out)
                .bind(user_id)
                .bind(shift_date)
                .execute(&mut *conn)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(AppError::NotFound("Checked-in session"));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MySqlStore {
    async fn attendance_on(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> AppResult<Option<AttendanceDay>> {
        let sql = format!(
            "SELECT {} FROM attendance_logs WHERE user_id = ? AND shift_date = ?",
            ATTENDANCE_COLUMNS
        );
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(user_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?
            .map(AttendanceDay::try_from)
            .transpose()
    }

    async fn open_attendance(&self, user_id: u64) -> AppResult<Option<AttendanceDay>> {
        let sql = format!(
            "SELECT {} FROM attendance_logs WHERE open_user_id = ?",
            ATTENDANCE_COLUMNS
        );
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(AttendanceDay::try_from)
            .transpose()
    }

    async fn attendance_between(
        &self,
        user_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<AttendanceDay>> {
        let sql = format!(
            r#"
            SELECT {} FROM attendance_logs
            WHERE user_id = ? AND shift_date BETWEEN ? AND ?
            ORDER BY shift_date DESC
            "#,
            ATTENDANCE_COLUMNS
        );
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(user_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        convert(rows)
    }

    async fn attendance(&self, id: u64) -> AppResult<Option<AttendanceDay>> {
        let sql = format!("SELECT {} FROM attendance_logs WHERE id = ?", ATTENDANCE_COLUMNS);
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(AttendanceDay::try_from)
            .transpose()
    }

    async fn insert_check_in(&self, c: &NewCheckIn) -> AppResult<AttendanceDay> {
        let mut tx = self.pool.begin().await?;

        if Self::has_open_session(&mut tx, c.user_id).await? {
            return Err(AppError::conflict("An attendance session is already open"));
        }

        let (lat, lng) = match c.coordinates {
            Some(p) => (Some(p.lat), Some(p.lng)),
            None => (None, None),
        };

        let id = match Self::day_for_update(&mut tx, c.user_id, c.shift_date).await? {
            Some(existing)
                if c.replaces_leave && existing.status == AttendanceStatus::Leave =>
            {
                sqlx::query(
                    r#"
                    UPDATE attendance_logs
                    SET check_in = ?, check_out = NULL, work_type = ?, status = 'working',
                        is_late = ?, proof_url = ?, latitude = ?, longitude = ?,
                        location_name = ?, location_verified = ?, is_corrected = ?
                    WHERE id = ?
                    "#,
                )
                .bind(c.check_in)
                .bind(c.work_type.as_ref())
                .bind(c.is_late)
                .bind(&c.proof_url)
                .bind(lat)
                .bind(lng)
                .bind(&c.location_name)
                .bind(c.location_verified)
                .bind(c.is_corrected)
                .bind(existing.id)
                .execute(&mut *tx)
                .await?;
                existing.id
            }
            Some(_) => return Err(AppError::AlreadyCheckedIn(c.shift_date)),
            None => sqlx::query(
                r#"
                INSERT INTO attendance_logs
                    (user_id, shift_date, check_in, work_type, status, is_late, proof_url,
                     latitude, longitude, location_name, location_verified, is_corrected)
                VALUES (?, ?, ?, ?, 'working', ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(c.user_id)
            .bind(c.shift_date)
            .bind(c.check_in)
            .bind(c.work_type.as_ref())
            .bind(c.is_late)
            .bind(&c.proof_url)
            .bind(lat)
            .bind(lng)
            .bind(&c.location_name)
            .bind(c.location_verified)
            .bind(c.is_corrected)
            .execute(&mut *tx)
            .await?
            .last_insert_id(),
        };

        tx.commit().await?;
        self.attendance(id)
            .await?
            .ok_or(AppError::NotFound("Attendance"))
    }

    async fn record_check_out(
        &self,
        id: u64,
        check_out: NaiveDateTime,
        early_leave_reason: Option<&str>,
    ) -> AppResult<AttendanceDay> {
        let result = sqlx::query(
            r#"
            UPDATE attendance_logs
            SET check_out = ?, status = 'completed', early_leave_reason = ?
            WHERE id = ? AND check_in IS NOT NULL AND check_out IS NULL
            "#,
        )
        .bind(check_out)
        .bind(early_leave_reason)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NoOpenSession);
        }
        self.attendance(id)
            .await?
            .ok_or(AppError::NotFound("Attendance"))
    }

    async fn override_check_out(
        &self,
        id: u64,
        check_out: NaiveDateTime,
    ) -> AppResult<AttendanceDay> {
        let result = sqlx::query(
            r#"
            UPDATE attendance_logs
            SET check_out = ?, status = 'completed', is_corrected = TRUE
            WHERE id = ? AND check_in IS NOT NULL
            "#,
        )
        .bind(check_out)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Attendance"));
        }
        self.attendance(id)
            .await?
            .ok_or(AppError::NotFound("Attendance"))
    }

    async fn purge_attendance_before(&self, horizon: NaiveDate) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM attendance_logs WHERE shift_date < ?")
            .bind(horizon)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_leave_request(&self, r: &NewLeaveRequest) -> AppResult<LeaveInsert> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (user_id, leave_type, start_date, end_date, reason, incident_time,
                 overtime_hours, attachment_url, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?)
            "#,
        )
        .bind(r.user_id)
        .bind(r.leave_type.as_ref())
        .bind(r.start_date)
        .bind(r.end_date)
        .bind(&r.reason)
        .bind(r.incident_time)
        .bind(r.overtime_hours)
        .bind(&r.attachment_url)
        .bind(r.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => self
                .leave_request(done.last_insert_id())
                .await?
                .map(LeaveInsert::Inserted)
                .ok_or(AppError::NotFound("Leave request")),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
                // lost the race against an identical active request
                let status = sqlx::query_scalar::<_, String>(
                    r#"
                    SELECT status FROM leave_requests
                    WHERE user_id = ? AND leave_type = ? AND start_date = ?
                      AND status IN ('pending', 'approved')
                    LIMIT 1
                    "#,
                )
                .bind(r.user_id)
                .bind(r.leave_type.as_ref())
                .bind(r.start_date)
                .fetch_optional(&self.pool)
                .await?;
                let status = match status {
                    Some(raw) => decode("status", &raw)?,
                    None => LeaveStatus::Pending,
                };
                Ok(LeaveInsert::Duplicate(status))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn leave_request(&self, id: u64) -> AppResult<Option<LeaveRequest>> {
        let sql = format!("SELECT {} FROM leave_requests WHERE id = ?", LEAVE_COLUMNS);
        sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(LeaveRequest::try_from)
            .transpose()
    }

    async fn leave_requests(&self, query: &LeaveQuery) -> AppResult<Vec<LeaveRequest>> {
        let mut where_sql = String::from(" WHERE 1=1");
        if query.user_id.is_some() {
            where_sql.push_str(" AND user_id = ?");
        }
        if query.leave_type.is_some() {
            where_sql.push_str(" AND leave_type = ?");
        }
        if query.status.is_some() {
            where_sql.push_str(" AND status = ?");
        }
        if query.start_date.is_some() {
            where_sql.push_str(" AND start_date = ?");
        }
        if query.from.is_some() {
            where_sql.push_str(" AND end_date >= ?");
        }
        if query.to.is_some() {
            where_sql.push_str(" AND start_date <= ?");
        }

        let sql = format!(
            "SELECT {} FROM leave_requests{} ORDER BY created_at DESC, id DESC",
            LEAVE_COLUMNS, where_sql
        );

        // binds follow the same order as the clauses above
        let mut q = sqlx::query_as::<_, LeaveRow>(&sql);
        if let Some(user_id) = query.user_id {
            q = q.bind(user_id);
        }
        if let Some(leave_type) = query.leave_type {
            q = q.bind(leave_type.as_ref().to_string());
        }
        if let Some(status) = query.status {
            q = q.bind(status.as_ref().to_string());
        }
        if let Some(date) = query.start_date {
            q = q.bind(date);
        }
        if let Some(date) = query.from {
            q = q.bind(date);
        }
        if let Some(date) = query.to {
            q = q.bind(date);
        }

        let rows = q.fetch_all(&self.pool).await?;
        convert(rows)
    }

    async fn approve_leave_request(
        &self,
        id: u64,
        approver_id: u64,
        effect: &ApprovalEffect,
    ) -> AppResult<LeaveRequest> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, (u64, String)>(
            "SELECT user_id, status FROM leave_requests WHERE id = ? FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Leave request"))?;

        let (user_id, status) = row;
        if decode::<LeaveStatus>("status", &status)? != LeaveStatus::Pending {
            return Err(AppError::conflict("Request was already decided"));
        }

        Self::apply_effect(&mut tx, user_id, effect).await?;

        sqlx::query("UPDATE leave_requests SET status = 'approved', approver_id = ? WHERE id = ?")
            .bind(approver_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.leave_request(id)
            .await?
            .ok_or(AppError::NotFound("Leave request"))
    }

    async fn reject_leave_request(
        &self,
        id: u64,
        approver_id: u64,
        reason: &str,
    ) -> AppResult<LeaveRequest> {
        let result = sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = 'rejected', approver_id = ?, rejection_reason = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(approver_id)
        .bind(reason)
        .bind(id)
        .execute(&self.pool)
        .await?;

        let request = self
            .leave_request(id)
            .await?
            .ok_or(AppError::NotFound("Leave request"))?;
        if result.rows_affected() == 0 {
            return Err(AppError::conflict("Request was already decided"));
        }
        Ok(request)
    }

    async fn insert_duties(&self, duties: &[NewDuty]) -> AppResult<Vec<Duty>> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(duties.len());

        for d in duties {
            let result = sqlx::query(
                "INSERT IGNORE INTO duties (title, assignee_id, duty_date) VALUES (?, ?, ?)",
            )
            .bind(&d.title)
            .bind(d.assignee_id)
            .bind(d.date)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 1 {
                ids.push(result.last_insert_id());
            }
        }
        tx.commit().await?;

        let mut inserted = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(duty) = self.duty(id).await? {
                inserted.push(duty);
            }
        }
        Ok(inserted)
    }

    async fn duty(&self, id: u64) -> AppResult<Option<Duty>> {
        let sql = format!("SELECT {} FROM duties WHERE id = ?", DUTY_COLUMNS);
        sqlx::query_as::<_, DutyRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Duty::try_from)
            .transpose()
    }

    async fn duties_for(&self, user_id: u64) -> AppResult<Vec<Duty>> {
        let sql = format!(
            "SELECT {} FROM duties WHERE assignee_id = ? ORDER BY duty_date DESC",
            DUTY_COLUMNS
        );
        let rows = sqlx::query_as::<_, DutyRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        convert(rows)
    }

    async fn duties_between(&self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<Duty>> {
        let sql = format!(
            "SELECT {} FROM duties WHERE duty_date BETWEEN ? AND ? ORDER BY duty_date, id",
            DUTY_COLUMNS
        );
        let rows = sqlx::query_as::<_, DutyRow>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        convert(rows)
    }

    async fn update_duty(&self, duty: &Duty) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE duties
            SET is_done = ?, proof_url = ?, penalty_status = ?, is_penalized = ?,
                appeal_reason = ?, appeal_proof_url = ?, abandoned_at = ?, cleared_by_system = ?,
                completion_scored = ?
            WHERE id = ?
            "#,
        )
        .bind(duty.is_done)
        .bind(&duty.proof_url)
        .bind(duty.penalty_status.as_ref())
        .bind(duty.is_penalized)
        .bind(&duty.appeal_reason)
        .bind(&duty.appeal_proof_url)
        .bind(duty.abandoned_at)
        .bind(duty.cleared_by_system)
        .bind(duty.completion_scored)
        .bind(duty.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 && self.duty(duty.id).await?.is_none() {
            return Err(AppError::NotFound("Duty"));
        }
        Ok(())
    }

    async fn insert_swap(&self, s: &NewDutySwap) -> AppResult<DutySwap> {
        let result = sqlx::query(
            r#"
            INSERT INTO duty_swaps
                (requestor_id, own_duty_id, target_duty_id, target_user_id, status, created_at)
            VALUES (?, ?, ?, ?, 'pending', ?)
            "#,
        )
        .bind(s.requestor_id)
        .bind(s.own_duty_id)
        .bind(s.target_duty_id)
        .bind(s.target_user_id)
        .bind(s.created_at)
        .execute(&self.pool)
        .await?;

        self.swap(result.last_insert_id())
            .await?
            .ok_or(AppError::NotFound("Swap"))
    }

    async fn swap(&self, id: u64) -> AppResult<Option<DutySwap>> {
        let sql = format!("SELECT {} FROM duty_swaps WHERE id = ?", SWAP_COLUMNS);
        sqlx::query_as::<_, SwapRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(DutySwap::try_from)
            .transpose()
    }

    async fn swaps_for(&self, user_id: u64) -> AppResult<Vec<DutySwap>> {
        let sql = format!(
            r#"
            SELECT {} FROM duty_swaps
            WHERE requestor_id = ? OR target_user_id = ?
            ORDER BY created_at DESC
            "#,
            SWAP_COLUMNS
        );
        let rows = sqlx::query_as::<_, SwapRow>(&sql)
            .bind(user_id)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        convert(rows)
    }

    async fn reject_swap(&self, id: u64) -> AppResult<DutySwap> {
        let result = sqlx::query(
            "UPDATE duty_swaps SET status = 'rejected' WHERE id = ? AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        let swap = self.swap(id).await?.ok_or(AppError::NotFound("Swap"))?;
        if result.rows_affected() == 0 {
            return Err(AppError::conflict("Swap was already answered"));
        }
        Ok(swap)
    }

    async fn approve_swap(
        &self,
        id: u64,
        own: AssigneeClaim,
        target: AssigneeClaim,
    ) -> AppResult<DutySwap> {
        let mut tx = self.pool.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM duty_swaps WHERE id = ? FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Swap"))?;
        if status != "pending" {
            return Err(AppError::conflict("Swap was already answered"));
        }

        // compare-and-swap on the assignee each side is expected to have;
        // returning early drops the transaction and rolls it back
        for (claim, new_assignee) in [
            (own, target.expected_assignee),
            (target, own.expected_assignee),
        ] {
            let result = sqlx::query(
                "UPDATE duties SET assignee_id = ? WHERE id = ? AND assignee_id = ?",
            )
            .bind(new_assignee)
            .bind(claim.duty_id)
            .bind(claim.expected_assignee)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() != 1 {
                return Err(AppError::conflict("Duties changed hands since the proposal"));
            }
        }

        sqlx::query("UPDATE duty_swaps SET status = 'approved' WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.swap(id).await?.ok_or(AppError::NotFound("Swap"))
    }

    async fn location_zones(&self) -> AppResult<Vec<LocationZone>> {
        let zones = sqlx::query_as::<_, LocationZone>(
            "SELECT id, name, lat, lng, radius_m FROM location_zones ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(zones)
    }
}
