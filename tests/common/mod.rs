#![allow(dead_code)]

use actix_web::web;
use schoolhub_server::auth::SessionUser;
use schoolhub_server::db::models::{Role, School};
use schoolhub_server::{AppState, MemoryStore, Settings};
use std::sync::Arc;
use uuid::Uuid;

/// Two schools sharing one in-memory store.
pub struct TestContext {
    pub store: MemoryStore,
    pub state: web::Data<AppState>,
    pub school: School,
    pub other_school: School,
}

impl TestContext {
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        let school = store.add_school("Riverside Primary").await;
        let other_school = store.add_school("Hillcrest Academy").await;
        let config = Settings::new_for_test().expect("Failed to load test config");
        let state = web::Data::new(AppState::with_store(config, Arc::new(store.clone())));

        Self {
            store,
            state,
            school,
            other_school,
        }
    }

    pub fn token_for(&self, school_id: Uuid, role: Role) -> String {
        let user = SessionUser {
            id: Uuid::new_v4(),
            role,
            school_id,
        };
        self.state.sessions.issue_token(&user).expect("Failed to issue token")
    }

    pub fn auth(&self, role: Role) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", self.token_for(self.school.id, role)))
    }

    pub fn admin(&self) -> (&'static str, String) {
        self.auth(Role::Admin)
    }

    pub fn other_admin(&self) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", self.token_for(self.other_school.id, Role::Admin)))
    }
}

/// Builds the full service, health route included.
#[macro_export]
macro_rules! test_app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($ctx.state.clone())
                .route(
                    "/health",
                    actix_web::web::get().to(schoolhub_server::health_check),
                )
                .configure(schoolhub_server::api::configure),
        )
        .await
    };
}
