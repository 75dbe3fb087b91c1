use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::representation_headers;
use shared_database::{DbError, SupabaseClient};

use crate::models::{ScheduleException, Slot, SlotStatus, SlotTransition, WeeklySchedule};

use super::{ScheduleStore, SlotStore};

const SCHEDULES: &str = "/rest/v1/weekly_schedules";
const DEFAULTS: &str = "/rest/v1/doctor_default_schedules";
const EXCEPTIONS: &str = "/rest/v1/schedule_exceptions";
const SLOTS: &str = "/rest/v1/slots";

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, DbError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(DbError::from))
        .collect()
}

fn first_row<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Option<T>, DbError> {
    Ok(decode_rows(rows)?.into_iter().next())
}

pub struct SupabaseScheduleStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseScheduleStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl ScheduleStore for SupabaseScheduleStore {
    async fn insert_schedule(&self, schedule: &WeeklySchedule) -> Result<(), DbError> {
        let mut body = serde_json::to_value(schedule)?;
        // The default flag lives in doctor_default_schedules only.
        if let Some(row) = body.as_object_mut() {
            row.remove("is_default");
        }

        self.supabase
            .execute(Method::POST, SCHEDULES, None, Some(body), None)
            .await
    }

    async fn get_schedule(&self, schedule_id: Uuid) -> Result<Option<WeeklySchedule>, DbError> {
        let path = format!("{}?id=eq.{}", SCHEDULES, schedule_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;
        first_row(rows)
    }

    async fn list_schedules(&self, doctor_id: Uuid) -> Result<Vec<WeeklySchedule>, DbError> {
        let path = format!("{}?doctor_id=eq.{}&order=created_at.asc", SCHEDULES, doctor_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;
        decode_rows(rows)
    }

    async fn default_schedule_id(&self, doctor_id: Uuid) -> Result<Option<Uuid>, DbError> {
        let path = format!("{}?doctor_id=eq.{}&select=schedule_id", DEFAULTS, doctor_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;

        rows.first()
            .and_then(|row| row.get("schedule_id"))
            .and_then(Value::as_str)
            .map(|raw| Uuid::parse_str(raw).map_err(|e| DbError::Decode(e.to_string())))
            .transpose()
    }

    async fn set_default_schedule(&self, doctor_id: Uuid, schedule_id: Uuid) -> Result<(), DbError> {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("resolution=merge-duplicates"));

        let body = json!({
            "doctor_id": doctor_id,
            "schedule_id": schedule_id,
            "updated_at": Utc::now().to_rfc3339(),
        });

        self.supabase
            .execute(Method::POST, DEFAULTS, None, Some(body), Some(headers))
            .await
    }

    async fn insert_exception(&self, exception: &ScheduleException) -> Result<(), DbError> {
        let body = serde_json::to_value(exception)?;
        self.supabase
            .execute(Method::POST, EXCEPTIONS, None, Some(body), None)
            .await
    }

    async fn get_exception(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<ScheduleException>, DbError> {
        let path = format!("{}?doctor_id=eq.{}&date=eq.{}", EXCEPTIONS, doctor_id, date);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;
        first_row(rows)
    }

    async fn list_exceptions(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ScheduleException>, DbError> {
        let path = format!(
            "{}?doctor_id=eq.{}&date=gte.{}&date=lte.{}&order=date.asc",
            EXCEPTIONS, doctor_id, from, to
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;
        decode_rows(rows)
    }

    async fn delete_exception(&self, doctor_id: Uuid, date: NaiveDate) -> Result<bool, DbError> {
        let path = format!("{}?doctor_id=eq.{}&date=eq.{}", EXCEPTIONS, doctor_id, date);
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, None, None, Some(representation_headers()))
            .await?;
        Ok(!rows.is_empty())
    }
}

pub struct SupabaseSlotStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseSlotStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

fn appointment_filter(appointment_id: Option<Uuid>) -> String {
    match appointment_id {
        Some(id) => format!("appointment_id=eq.{}", id),
        None => "appointment_id=is.null".to_string(),
    }
}

#[async_trait]
impl SlotStore for SupabaseSlotStore {
    async fn get_slot(&self, slot_id: Uuid) -> Result<Option<Slot>, DbError> {
        let path = format!("{}?id=eq.{}", SLOTS, slot_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;
        first_row(rows)
    }

    async fn list_slots(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        status: Option<SlotStatus>,
    ) -> Result<Vec<Slot>, DbError> {
        let mut query_parts = vec![
            format!("doctor_id=eq.{}", doctor_id),
            format!("date=gte.{}", from),
            format!("date=lte.{}", to),
        ];
        if let Some(status) = status {
            query_parts.push(format!("status=eq.{}", status));
        }

        let path = format!("{}?{}&order=date.asc,start_time.asc", SLOTS, query_parts.join("&"));
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;
        decode_rows(rows)
    }

    async fn delete_unbooked_slots(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<usize, DbError> {
        let path = format!(
            "{}?doctor_id=eq.{}&date=gte.{}&date=lte.{}&status=neq.booked&select=id",
            SLOTS, doctor_id, from, to
        );
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, None, None, Some(representation_headers()))
            .await?;
        Ok(rows.len())
    }

    async fn insert_slots(&self, slots: &[Slot]) -> Result<usize, DbError> {
        if slots.is_empty() {
            return Ok(0);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=ignore-duplicates,return=representation"),
        );

        let path = format!("{}?on_conflict=doctor_id,date,start_time&select=id", SLOTS);
        let body = serde_json::to_value(slots)?;
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::POST, &path, None, Some(body), Some(headers))
            .await?;

        debug!("Inserted {} of {} slots", rows.len(), slots.len());
        Ok(rows.len())
    }

    async fn transition_slot(
        &self,
        slot_id: Uuid,
        transition: SlotTransition,
    ) -> Result<Option<Slot>, DbError> {
        // The filter is the guard: PostgREST only patches rows still matching it.
        let path = format!(
            "{}?id=eq.{}&status=eq.{}&{}",
            SLOTS,
            slot_id,
            transition.expected_status,
            appointment_filter(transition.expected_appointment),
        );
        let body = json!({
            "status": transition.new_status,
            "appointment_id": transition.new_appointment,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, None, Some(body), Some(representation_headers()))
            .await?;
        first_row(rows)
    }
}
