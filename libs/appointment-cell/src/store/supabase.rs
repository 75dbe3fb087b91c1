use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::Value;
use uuid::Uuid;

use shared_database::supabase::representation_headers;
use shared_database::{DbError, SupabaseClient};

use crate::models::{Appointment, AppointmentGuard};

use super::AppointmentStore;

const APPOINTMENTS: &str = "/rest/v1/appointments";

fn decode(rows: Vec<Value>) -> Result<Vec<Appointment>, DbError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(DbError::from))
        .collect()
}

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert_appointment(&self, appointment: &Appointment) -> Result<(), DbError> {
        let body = serde_json::to_value(appointment)?;
        self.supabase
            .execute(Method::POST, APPOINTMENTS, None, Some(body), None)
            .await
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, DbError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS, appointment_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(decode(rows)?.into_iter().next())
    }

    async fn update_appointment(
        &self,
        appointment: &Appointment,
        guard: AppointmentGuard,
    ) -> Result<Option<Appointment>, DbError> {
        let slot_filter = match guard.slot_id {
            Some(slot_id) => format!("slot_id=eq.{}", slot_id),
            None => "slot_id=is.null".to_string(),
        };
        let path = format!(
            "{}?id=eq.{}&status=eq.{}&{}",
            APPOINTMENTS, appointment.id, guard.status, slot_filter
        );

        let mut body = serde_json::to_value(appointment)?;
        if let Some(row) = body.as_object_mut() {
            // Identity and ownership never change after booking.
            for immutable in ["id", "patient_id", "doctor_id", "created_at"] {
                row.remove(immutable);
            }
        }

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, None, Some(body), Some(representation_headers()))
            .await?;
        Ok(decode(rows)?.into_iter().next())
    }

    async fn list_doctor_appointments(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, DbError> {
        let path = format!(
            "{}?doctor_id=eq.{}&date=gte.{}&date=lte.{}&order=date.asc,start_time.asc",
            APPOINTMENTS, doctor_id, from, to
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;
        decode(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use shared_utils::test_utils::TestConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::models::AppointmentStatus;

    fn appointment_row(id: Uuid, status: &str) -> Value {
        json!({
            "id": id,
            "patient_id": Uuid::new_v4(),
            "doctor_id": Uuid::new_v4(),
            "slot_id": Uuid::new_v4(),
            "date": "2024-05-06",
            "start_time": "10:00",
            "end_time": "10:30",
            "duration_minutes": 30,
            "status": status,
            "appointment_type": "GeneralConsultation",
            "notes": null,
            "cancellation_reason": null,
            "cancelled_at": null,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        })
    }

    #[tokio::test]
    async fn guarded_update_filters_on_expected_status_and_slot() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();
        let stored: Appointment = serde_json::from_value(appointment_row(id, "scheduled")).unwrap();
        let guard = AppointmentGuard::of(&stored);

        let mut confirmed = stored.clone();
        confirmed.status = AppointmentStatus::Confirmed;

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("status", "eq.scheduled"))
            .and(query_param("slot_id", format!("eq.{}", stored.slot_id.unwrap())))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row(id, "confirmed")])))
            .expect(1)
            .mount(&server)
            .await;

        let store = SupabaseAppointmentStore::new(Arc::new(SupabaseClient::new(
            &TestConfig::with_url(server.uri()).to_app_config(),
        )));
        let updated = store.update_appointment(&confirmed, guard).await.unwrap().unwrap();

        assert_eq!(updated.status, AppointmentStatus::Confirmed);
    }

    #[tokio::test]
    async fn stale_guard_yields_none() {
        let server = MockServer::start().await;
        let stored: Appointment = serde_json::from_value(appointment_row(Uuid::new_v4(), "cancelled")).unwrap();

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let store = SupabaseAppointmentStore::new(Arc::new(SupabaseClient::new(
            &TestConfig::with_url(server.uri()).to_app_config(),
        )));

        assert!(store
            .update_appointment(&stored, AppointmentGuard::of(&stored))
            .await
            .unwrap()
            .is_none());
    }
}
