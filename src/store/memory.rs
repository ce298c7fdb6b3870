//! In-memory store used by the engine tests.
//!
//! A single mutex guards all tables, so each trait call is atomic just like a
//! transaction in the MySQL store.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::Mutex;

use super::{ApprovalEffect, LeaveInsert, Store};
use crate::error::{AppError, AppResult};
use crate::model::attendance::{AttendanceDay, AttendanceStatus, NewCheckIn, WorkType};
use crate::model::duty::{Duty, NewDuty, PenaltyStatus};
use crate::model::duty_swap::{AssigneeClaim, DutySwap, NewDutySwap, SwapStatus};
use crate::model::leave_request::{LeaveQuery, LeaveRequest, LeaveStatus, NewLeaveRequest};
use crate::model::location_zone::LocationZone;

#[derive(Default)]
struct Tables {
    next_id: u64,
    attendance: Vec<AttendanceDay>,
    leave: Vec<LeaveRequest>,
    duties: Vec<Duty>,
    swaps: Vec<DutySwap>,
    zones: Vec<LocationZone>,
}

impl Tables {
    fn id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn day_index(&self, user_id: u64, date: NaiveDate) -> Option<usize> {
        self.attendance
            .iter()
            .position(|a| a.user_id == user_id && a.shift_date == date)
    }

    /// Index of the (user, date) record, created blank when missing.
    fn day_index_or_insert(&mut self, user_id: u64, date: NaiveDate) -> usize {
        match self.day_index(user_id, date) {
            Some(idx) => idx,
            None => {
                let day = self.blank_day(user_id, date);
                self.attendance.push(day);
                self.attendance.len() - 1
            }
        }
    }

    fn has_open(&self, user_id: u64) -> bool {
        self.attendance
            .iter()
            .any(|a| a.user_id == user_id && a.is_open())
    }

    fn blank_day(&mut self, user_id: u64, date: NaiveDate) -> AttendanceDay {
        AttendanceDay {
            id: self.id(),
            user_id,
            shift_date: date,
            check_in: None,
            check_out: None,
            work_type: WorkType::Office,
            status: AttendanceStatus::Working,
            is_late: false,
            proof_url: None,
            coordinates: None,
            location_name: None,
            location_verified: false,
            early_leave_reason: None,
            is_corrected: false,
        }
    }

    fn apply(&mut self, user_id: u64, effect: &ApprovalEffect) -> AppResult<()> {
        match effect {
            ApprovalEffect::None => {}
            ApprovalEffect::LeaveDays { dates } => {
                if let Some(worked) = self.attendance.iter().find(|a| {
                    a.user_id == user_id && a.check_in.is_some() && dates.contains(&a.shift_date)
                }) {
                    return Err(AppError::conflict(format!(
                        "Attendance is already recorded on {}",
                        worked.shift_date
                    )));
                }
                for date in dates {
                    let idx = self.day_index_or_insert(user_id, *date);
                    let day = &mut self.attendance[idx];
                    day.status = AttendanceStatus::Leave;
                    day.work_type = WorkType::Leave;
                    day.check_in = None;
                    day.check_out = None;
                    day.is_late = false;
                    day.early_leave_reason = None;
                }
            }
            ApprovalEffect::CheckIn {
                shift_date,
                check_in,
                is_late,
            } => {
                let existing = self.day_index(user_id, *shift_date);
                if let Some(idx) = existing {
                    let day = &self.attendance[idx];
                    if day.status == AttendanceStatus::Leave {
                        return Err(AppError::OnLeave(*shift_date));
                    }
                    if day.check_out.is_some_and(|out| out <= *check_in) {
                        return Err(AppError::validation(
                            "Corrected check-in is not before the recorded checkout",
                        ));
                    }
                } else if self.has_open(user_id) {
                    return Err(AppError::conflict("Another session is still open"));
                }
                let idx = self.day_index_or_insert(user_id, *shift_date);
                let day = &mut self.attendance[idx];
                day.check_in = Some(*check_in);
                day.is_late = *is_late;
                day.is_corrected = true;
            }
            ApprovalEffect::CheckOut {
                shift_date,
                check_out,
            } => {
                let idx = self
                    .day_index(user_id, *shift_date)
                    .filter(|&i| self.attendance[i].check_in.is_some())
                    .ok_or(AppError::NotFound("Checked-in session"))?;
                let day = &mut self.attendance[idx];
                day.check_out = Some(*check_out);
                day.status = AttendanceStatus::Completed;
                day.is_corrected = true;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_zone(&self, name: &str, lat: f64, lng: f64, radius_m: f64) {
        let mut t = self.tables.lock().await;
        let id = t.id();
        t.zones.push(LocationZone {
            id,
            name: name.to_string(),
            lat,
            lng,
            radius_m,
        });
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn attendance_on(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> AppResult<Option<AttendanceDay>> {
        let t = self.tables.lock().await;
        Ok(t.attendance
            .iter()
            .find(|a| a.user_id == user_id && a.shift_date == date)
            .cloned())
    }

    async fn open_attendance(&self, user_id: u64) -> AppResult<Option<AttendanceDay>> {
        let t = self.tables.lock().await;
        Ok(t.attendance
            .iter()
            .find(|a| a.user_id == user_id && a.is_open())
            .cloned())
    }

    async fn attendance_between(
        &self,
        user_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<AttendanceDay>> {
        let t = self.tables.lock().await;
        let mut days: Vec<_> = t
            .attendance
            .iter()
            .filter(|a| a.user_id == user_id && a.shift_date >= from && a.shift_date <= to)
            .cloned()
            .collect();
        days.sort_by(|a, b| b.shift_date.cmp(&a.shift_date));
        Ok(days)
    }

    async fn attendance(&self, id: u64) -> AppResult<Option<AttendanceDay>> {
        let t = self.tables.lock().await;
        Ok(t.attendance.iter().find(|a| a.id == id).cloned())
    }

    async fn insert_check_in(&self, c: &NewCheckIn) -> AppResult<AttendanceDay> {
        let mut t = self.tables.lock().await;
        if t.has_open(c.user_id) {
            return Err(AppError::conflict("An attendance session is already open"));
        }

        let id = t.id();
        let day = AttendanceDay {
            id,
            user_id: c.user_id,
            shift_date: c.shift_date,
            check_in: Some(c.check_in),
            check_out: None,
            work_type: c.work_type,
            status: AttendanceStatus::Working,
            is_late: c.is_late,
            proof_url: c.proof_url.clone(),
            coordinates: c.coordinates,
            location_name: c.location_name.clone(),
            location_verified: c.location_verified,
            early_leave_reason: None,
            is_corrected: c.is_corrected,
        };

        match t.day_index(c.user_id, c.shift_date) {
            Some(idx) if c.replaces_leave && t.attendance[idx].status == AttendanceStatus::Leave => {
                let existing = &mut t.attendance[idx];
                *existing = AttendanceDay {
                    id: existing.id,
                    ..day
                };
                Ok(existing.clone())
            }
            Some(_) => Err(AppError::AlreadyCheckedIn(c.shift_date)),
            None => {
                t.attendance.push(day.clone());
                Ok(day)
            }
        }
    }

    async fn record_check_out(
        &self,
        id: u64,
        check_out: NaiveDateTime,
        early_leave_reason: Option<&str>,
    ) -> AppResult<AttendanceDay> {
        let mut t = self.tables.lock().await;
        let day = t
            .attendance
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AppError::NotFound("Attendance"))?;
        if !day.is_open() {
            return Err(AppError::NoOpenSession);
        }
        day.check_out = Some(check_out);
        day.status = AttendanceStatus::Completed;
        day.early_leave_reason = early_leave_reason.map(str::to_string);
        Ok(day.clone())
    }

    async fn override_check_out(
        &self,
        id: u64,
        check_out: NaiveDateTime,
    ) -> AppResult<AttendanceDay> {
        let mut t = self.tables.lock().await;
        let day = t
            .attendance
            .iter_mut()
            .find(|a| a.id == id && a.check_in.is_some())
            .ok_or(AppError::NotFound("Attendance"))?;
        day.check_out = Some(check_out);
        day.status = AttendanceStatus::Completed;
        day.is_corrected = true;
        Ok(day.clone())
    }

    async fn purge_attendance_before(&self, horizon: NaiveDate) -> AppResult<u64> {
        let mut t = self.tables.lock().await;
        let before = t.attendance.len();
        t.attendance.retain(|a| a.shift_date >= horizon);
        Ok((before - t.attendance.len()) as u64)
    }

    async fn insert_leave_request(&self, r: &NewLeaveRequest) -> AppResult<LeaveInsert> {
        let mut t = self.tables.lock().await;
        let existing = t.leave.iter().find(|l| {
            l.user_id == r.user_id
                && l.leave_type == r.leave_type
                && l.start_date == r.start_date
                && l.status != LeaveStatus::Rejected
        });
        if let Some(existing) = existing {
            return Ok(LeaveInsert::Duplicate(existing.status));
        }

        let request = LeaveRequest {
            id: t.id(),
            user_id: r.user_id,
            leave_type: r.leave_type,
            start_date: r.start_date,
            end_date: r.end_date,
            reason: r.reason.clone(),
            incident_time: r.incident_time,
            overtime_hours: r.overtime_hours,
            attachment_url: r.attachment_url.clone(),
            status: LeaveStatus::Pending,
            approver_id: None,
            rejection_reason: None,
            created_at: r.created_at,
        };
        t.leave.push(request.clone());
        Ok(LeaveInsert::Inserted(request))
    }

    async fn leave_request(&self, id: u64) -> AppResult<Option<LeaveRequest>> {
        let t = self.tables.lock().await;
        Ok(t.leave.iter().find(|l| l.id == id).cloned())
    }

    async fn leave_requests(&self, query: &LeaveQuery) -> AppResult<Vec<LeaveRequest>> {
        let t = self.tables.lock().await;
        let mut found: Vec<_> = t.leave.iter().filter(|l| query.matches(l)).cloned().collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(found)
    }

    async fn approve_leave_request(
        &self,
        id: u64,
        approver_id: u64,
        effect: &ApprovalEffect,
    ) -> AppResult<LeaveRequest> {
        let mut t = self.tables.lock().await;
        let request = t
            .leave
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or(AppError::NotFound("Leave request"))?;
        if request.status != LeaveStatus::Pending {
            return Err(AppError::conflict("Request was already decided"));
        }

        t.apply(request.user_id, effect)?;

        let stored = t
            .leave
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(AppError::NotFound("Leave request"))?;
        stored.status = LeaveStatus::Approved;
        stored.approver_id = Some(approver_id);
        Ok(stored.clone())
    }

    async fn reject_leave_request(
        &self,
        id: u64,
        approver_id: u64,
        reason: &str,
    ) -> AppResult<LeaveRequest> {
        let mut t = self.tables.lock().await;
        let stored = t
            .leave
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(AppError::NotFound("Leave request"))?;
        if stored.status != LeaveStatus::Pending {
            return Err(AppError::conflict("Request was already decided"));
        }
        stored.status = LeaveStatus::Rejected;
        stored.approver_id = Some(approver_id);
        stored.rejection_reason = Some(reason.to_string());
        Ok(stored.clone())
    }

    async fn insert_duties(&self, duties: &[NewDuty]) -> AppResult<Vec<Duty>> {
        let mut t = self.tables.lock().await;
        let mut inserted = Vec::new();
        for d in duties {
            let exists = t
                .duties
                .iter()
                .any(|x| x.assignee_id == d.assignee_id && x.date == d.date && x.title == d.title);
            if exists {
                continue;
            }
            let duty = Duty {
                id: t.id(),
                title: d.title.clone(),
                assignee_id: d.assignee_id,
                date: d.date,
                is_done: false,
                proof_url: None,
                penalty_status: PenaltyStatus::None,
                is_penalized: false,
                appeal_reason: None,
                appeal_proof_url: None,
                abandoned_at: None,
                cleared_by_system: false,
                completion_scored: false,
            };
            t.duties.push(duty.clone());
            inserted.push(duty);
        }
        Ok(inserted)
    }

    async fn duty(&self, id: u64) -> AppResult<Option<Duty>> {
        let t = self.tables.lock().await;
        Ok(t.duties.iter().find(|d| d.id == id).cloned())
    }

    async fn duties_for(&self, user_id: u64) -> AppResult<Vec<Duty>> {
        let t = self.tables.lock().await;
        let mut found: Vec<_> = t
            .duties
            .iter()
            .filter(|d| d.assignee_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(found)
    }

    async fn duties_between(&self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<Duty>> {
        let t = self.tables.lock().await;
        Ok(t.duties
            .iter()
            .filter(|d| d.date >= from && d.date <= to)
            .cloned()
            .collect())
    }

    async fn update_duty(&self, duty: &Duty) -> AppResult<()> {
        let mut t = self.tables.lock().await;
        let stored = t
            .duties
            .iter_mut()
            .find(|d| d.id == duty.id)
            .ok_or(AppError::NotFound("Duty"))?;
        // assignee changes only through approve_swap
        let assignee_id = stored.assignee_id;
        *stored = Duty {
            assignee_id,
            ..duty.clone()
        };
        Ok(())
    }

    async fn insert_swap(&self, s: &NewDutySwap) -> AppResult<DutySwap> {
        let mut t = self.tables.lock().await;
        let swap = DutySwap {
            id: t.id(),
            requestor_id: s.requestor_id,
            own_duty_id: s.own_duty_id,
            target_duty_id: s.target_duty_id,
            target_user_id: s.target_user_id,
            status: SwapStatus::Pending,
            created_at: s.created_at,
        };
        t.swaps.push(swap.clone());
        Ok(swap)
    }

    async fn swap(&self, id: u64) -> AppResult<Option<DutySwap>> {
        let t = self.tables.lock().await;
        Ok(t.swaps.iter().find(|s| s.id == id).cloned())
    }

    async fn swaps_for(&self, user_id: u64) -> AppResult<Vec<DutySwap>> {
        let t = self.tables.lock().await;
        Ok(t.swaps
            .iter()
            .filter(|s| s.requestor_id == user_id || s.target_user_id == user_id)
            .cloned()
            .collect())
    }

    async fn reject_swap(&self, id: u64) -> AppResult<DutySwap> {
        let mut t = self.tables.lock().await;
        let swap = t
            .swaps
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(AppError::NotFound("Swap"))?;
        if swap.status != SwapStatus::Pending {
            return Err(AppError::conflict("Swap was already answered"));
        }
        swap.status = SwapStatus::Rejected;
        Ok(swap.clone())
    }

    async fn approve_swap(
        &self,
        id: u64,
        own: AssigneeClaim,
        target: AssigneeClaim,
    ) -> AppResult<DutySwap> {
        let mut t = self.tables.lock().await;
        let pending = t
            .swaps
            .iter()
            .any(|s| s.id == id && s.status == SwapStatus::Pending);
        if !pending {
            return Err(AppError::conflict("Swap was already answered"));
        }
        let holds = |claim: &AssigneeClaim| {
            t.duties
                .iter()
                .any(|d| d.id == claim.duty_id && d.assignee_id == claim.expected_assignee)
        };
        if !holds(&own) || !holds(&target) {
            return Err(AppError::conflict("Duties changed hands since the proposal"));
        }

        for duty in t.duties.iter_mut() {
            if duty.id == own.duty_id {
                duty.assignee_id = target.expected_assignee;
            } else if duty.id == target.duty_id {
                duty.assignee_id = own.expected_assignee;
            }
        }
        let swap = t
            .swaps
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(AppError::NotFound("Swap"))?;
        swap.status = SwapStatus::Approved;
        Ok(swap.clone())
    }

    async fn location_zones(&self) -> AppResult<Vec<LocationZone>> {
        let t = self.tables.lock().await;
        Ok(t.zones.clone())
    }
}
