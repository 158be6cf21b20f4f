//! Interview REST endpoints.
//!
//! - `POST  /api/v1/interviews`              create (201)
//! - `GET   /api/v1/interviews`              list, newest first
//! - `GET   /api/v1/interviews/{id}`         one interview with its messages
//! - `PATCH /api/v1/interviews/{id}/status`  move the lifecycle forward
//! - `GET   /api/v1/titles`                  titles accepted on create

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::{normalize_skills, InterviewStatus, InterviewTitle};

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct CreateInterviewRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

impl CreateInterviewRequest {
    /// Check the request before anything is written.
    fn validate(self) -> AppResult<(InterviewTitle, Vec<String>)> {
        let raw_title = self
            .title
            .filter(|title| !title.trim().is_empty())
            .ok_or_else(|| AppError::ValidationError("Interview title is required".to_string()))?;
        let title = raw_title.parse::<InterviewTitle>().map_err(AppError::ValidationError)?;
        let skills = normalize_skills(&self.skills).map_err(AppError::ValidationError)?;
        Ok((title, skills))
    }
}

pub async fn create_interview(
    state: web::Data<AppState>,
    body: web::Json<CreateInterviewRequest>,
) -> AppResult<HttpResponse> {
    let (title, skills) = body.into_inner().validate()?;

    let interview = state
        .store
        .blocking(move |store| store.create_interview(title, &skills))
        .await?;

    info!(interview_id = %interview.id, title = %interview.title, "Interview created via API");
    Ok(HttpResponse::Created().json(interview))
}

pub async fn list_interviews(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let interviews = state.store.blocking(|store| store.list_interviews()).await?;
    Ok(HttpResponse::Ok().json(interviews))
}

pub async fn get_interview(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let interview_id = path.into_inner();
    let lookup_id = interview_id.clone();
    let interview = state
        .store
        .blocking(move |store| store.get_interview(&lookup_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Interview {} not found", interview_id)))?;

    Ok(HttpResponse::Ok().json(interview))
}

pub async fn update_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UpdateStatusRequest>,
) -> AppResult<HttpResponse> {
    let interview_id = path.into_inner();
    let status = body
        .status
        .parse::<InterviewStatus>()
        .map_err(AppError::ValidationError)?;

    let update_id = interview_id.clone();
    let interview = state
        .store
        .blocking(move |store| store.update_status(&update_id, status))
        .await?;

    // Only interviews with live connections have a coordinator to notify.
    if let Some(coordinator) = state.directory.get(&interview_id).await {
        if let Err(err) = coordinator.publish_details().await {
            warn!(interview_id = %interview_id, "Failed to publish status change: {}", err);
        }
    }

    Ok(HttpResponse::Ok().json(interview))
}

pub async fn list_titles() -> HttpResponse {
    let titles: Vec<_> = InterviewTitle::ALL
        .iter()
        .map(|title| {
            json!({
                "id": title.as_str(),
                "name": title.display_name()
            })
        })
        .collect();
    HttpResponse::Ok().json(titles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ConnectionHandle;
    use crate::state::testing::test_state;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::Value;

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .route("/api/v1/interviews", web::post().to(create_interview))
                    .route("/api/v1/interviews", web::get().to(list_interviews))
                    .route("/api/v1/interviews/{id}", web::get().to(get_interview))
                    .route("/api/v1/interviews/{id}/status", web::patch().to(update_status))
                    .route("/api/v1/titles", web::get().to(list_titles)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_create_then_get_returns_empty_history() {
        let app = app!(test_state());

        let req = test::TestRequest::post()
            .uri("/api/v1/interviews")
            .set_json(json!({"title": "SystemArchitect", "skills": ["SQL", "Communication"]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["status"], "created");
        let id = created["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/interviews/{}", id))
            .to_request();
        let fetched: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(fetched["title"], "SystemArchitect");
        assert_eq!(fetched["skills"], json!(["SQL", "Communication"]));
        assert_eq!(fetched["messages"], json!([]));
    }

    #[actix_web::test]
    async fn test_create_rejects_invalid_input() {
        let app = app!(test_state());

        for body in [
            json!({"skills": ["SQL"]}),
            json!({"title": "Astronaut", "skills": ["SQL"]}),
            json!({"title": "SystemArchitect", "skills": []}),
            json!({"title": "SystemArchitect", "skills": ["SQL", "  "]}),
        ] {
            let req = test::TestRequest::post()
                .uri("/api/v1/interviews")
                .set_json(body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let error: Value = test::read_body_json(resp).await;
            assert_eq!(error["error"]["type"], "validation_error");
        }

        let req = test::TestRequest::get().uri("/api/v1/interviews").to_request();
        let listed: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listed, json!([]));
    }

    #[actix_web::test]
    async fn test_unknown_interview_is_not_found() {
        let app = app!(test_state());
        let req = test::TestRequest::get()
            .uri("/api/v1/interviews/unknown-id")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_list_is_newest_first() {
        let state = test_state();
        let first = state
            .store
            .create_interview(InterviewTitle::QAEngineer, &["Testing".to_string()])
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = state
            .store
            .create_interview(InterviewTitle::ProductManager, &["Roadmaps".to_string()])
            .unwrap();
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/v1/interviews").to_request();
        let listed: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listed[0]["id"], second.id.as_str());
        assert_eq!(listed[1]["id"], first.id.as_str());
        assert!(listed[0].get("messages").is_none());
    }

    #[actix_web::test]
    async fn test_status_update_is_forward_only_and_broadcast() {
        let state = test_state();
        let interview = state
            .store
            .create_interview(InterviewTitle::SystemArchitect, &["SQL".to_string()])
            .unwrap();
        let coordinator = state.directory.get_or_create(&interview.id).await.unwrap();
        let (handle, mut rx) = ConnectionHandle::channel(8);
        coordinator.on_attach(handle).await.unwrap();
        rx.try_recv().unwrap();
        let app = app!(state);

        let req = test::TestRequest::patch()
            .uri(&format!("/api/v1/interviews/{}/status", interview.id))
            .set_json(json!({"status": "completed"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let pushed: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(pushed["type"], "interview_details");
        assert_eq!(pushed["data"]["status"], "completed");

        let req = test::TestRequest::patch()
            .uri(&format!("/api/v1/interviews/{}/status", interview.id))
            .set_json(json!({"status": "in_progress"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::patch()
            .uri(&format!("/api/v1/interviews/{}/status", interview.id))
            .set_json(json!({"status": "paused"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_titles_are_listed() {
        let app = app!(test_state());
        let req = test::TestRequest::get().uri("/api/v1/titles").to_request();
        let titles: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(titles.as_array().unwrap().len(), InterviewTitle::ALL.len());
        assert!(titles
            .as_array()
            .unwrap()
            .iter()
            .any(|t| t["id"] == "SystemArchitect" && t["name"] == "System Architect"));
    }
}
