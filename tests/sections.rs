#[macro_use]
mod common;

use actix_web::test;
use common::TestContext;
use schoolhub_server::db::models::{Class, Role, Section};
use schoolhub_server::Store;
use serde_json::json;
use uuid::Uuid;

async fn class_named(ctx: &TestContext, name: &str, order: i32) -> Class {
    ctx.store
        .insert_class(&Class::new(ctx.school.id, name.into(), order))
        .await
        .unwrap()
}

#[actix_web::test]
async fn test_create_section_defaults_capacity() {
    let ctx = TestContext::new().await;
    let class = class_named(&ctx, "Grade 1", 1).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/sections")
        .insert_header(ctx.admin())
        .set_json(json!({ "classId": class.id, "name": " A " }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["section"]["name"], "A");
    assert_eq!(body["section"]["capacity"], 40);
    assert_eq!(body["section"]["className"], "Grade 1");

    // Same name in the same class is rejected.
    let req = test::TestRequest::post()
        .uri("/api/sections")
        .insert_header(ctx.admin())
        .set_json(json!({ "classId": class.id, "name": "A", "capacity": 20 }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn test_create_section_in_foreign_class_is_not_found() {
    let ctx = TestContext::new().await;
    let foreign = ctx
        .store
        .insert_class(&Class::new(ctx.other_school.id, "Grade 1".into(), 1))
        .await
        .unwrap();
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/sections")
        .insert_header(ctx.admin())
        .set_json(json!({ "classId": foreign.id, "name": "A" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Class not found");
}

#[actix_web::test]
async fn test_sections_sorted_by_class_then_name() {
    let ctx = TestContext::new().await;
    let second = class_named(&ctx, "Grade 2", 2).await;
    let first = class_named(&ctx, "Grade 1", 1).await;
    for (class, name) in [(&second, "B"), (&second, "A"), (&first, "C"), (&first, "A")] {
        ctx.store
            .insert_section(&Section::new(class.id, name.into(), 30))
            .await
            .unwrap();
    }
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/api/sections")
        .insert_header(ctx.auth(Role::Teacher))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let order: Vec<(String, String)> = body["sections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| {
            (
                s["className"].as_str().unwrap().to_string(),
                s["name"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        order,
        vec![
            ("Grade 1".to_string(), "A".to_string()),
            ("Grade 1".to_string(), "C".to_string()),
            ("Grade 2".to_string(), "A".to_string()),
            ("Grade 2".to_string(), "B".to_string()),
        ]
    );

    let req = test::TestRequest::get()
        .uri(&format!("/api/sections?classId={}", second.id))
        .insert_header(ctx.auth(Role::Teacher))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["sections"].as_array().unwrap().len(), 2);

    let req = test::TestRequest::get()
        .uri("/api/sections?classId=oops")
        .insert_header(ctx.auth(Role::Teacher))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn test_section_delete_guarded_by_enrollment() {
    let ctx = TestContext::new().await;
    let class = class_named(&ctx, "Grade 3", 3).await;
    let occupied = ctx
        .store
        .insert_section(&Section::new(class.id, "A".into(), 30))
        .await
        .unwrap();
    let empty = ctx
        .store
        .insert_section(&Section::new(class.id, "B".into(), 30))
        .await
        .unwrap();
    ctx.store
        .add_student(ctx.school.id, "student@riverside.test", "Student", Some(occupied.id))
        .await
        .unwrap();
    let app = test_app!(ctx);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/sections/{}", occupied.id))
        .insert_header(ctx.admin())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
    assert!(ctx.store.find_section(ctx.school.id, occupied.id).await.unwrap().is_some());

    let req = test::TestRequest::delete()
        .uri(&format!("/api/sections/{}", empty.id))
        .insert_header(ctx.admin())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    assert!(ctx.store.find_section(ctx.school.id, empty.id).await.unwrap().is_none());
}

#[actix_web::test]
async fn test_section_capacity_cannot_drop_below_enrollment() {
    let ctx = TestContext::new().await;
    let class = class_named(&ctx, "Grade 4", 4).await;
    let section = ctx
        .store
        .insert_section(&Section::new(class.id, "A".into(), 30))
        .await
        .unwrap();
    for i in 0..2 {
        ctx.store
            .add_student(ctx.school.id, &format!("s{}@riverside.test", i), "Student", Some(section.id))
            .await
            .unwrap();
    }
    let app = test_app!(ctx);

    let req = test::TestRequest::put()
        .uri(&format!("/api/sections/{}", section.id))
        .insert_header(ctx.admin())
        .set_json(json!({ "capacity": 1 }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::put()
        .uri(&format!("/api/sections/{}", section.id))
        .insert_header(ctx.admin())
        .set_json(json!({ "capacity": 2 }))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["section"]["capacity"], 2);
    assert_eq!(body["section"]["name"], "A");
}

#[actix_web::test]
async fn test_class_teacher_upsert_is_idempotent() {
    let ctx = TestContext::new().await;
    let class = class_named(&ctx, "Grade 5", 5).await;
    let section = ctx
        .store
        .insert_section(&Section::new(class.id, "A".into(), 30))
        .await
        .unwrap();
    let first = ctx
        .store
        .add_teacher(ctx.school.id, "ada@riverside.test", "Ada")
        .await
        .unwrap();
    let second = ctx
        .store
        .add_teacher(ctx.school.id, "grace@riverside.test", "Grace")
        .await
        .unwrap();
    let app = test_app!(ctx);
    let uri = format!("/api/sections/{}/class-teacher", section.id);

    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri(&uri)
            .insert_header(ctx.admin())
            .set_json(json!({ "teacherId": first.id }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["classTeacher"]["teacher"]["name"], "Ada");
    }

    let req = test::TestRequest::post()
        .uri(&uri)
        .insert_header(ctx.admin())
        .set_json(json!({ "teacherId": second.id }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::get()
        .uri(&uri)
        .insert_header(ctx.auth(Role::Parent))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["classTeacher"]["teacher"]["id"], json!(second.id));
    assert_eq!(body["classTeacher"]["teacher"]["email"], "grace@riverside.test");

    let overview = ctx.store.find_section(ctx.school.id, section.id).await.unwrap().unwrap();
    assert_eq!(overview.class_teacher.map(|ct| ct.teacher.id), Some(second.id));
}

#[actix_web::test]
async fn test_class_teacher_removal_and_foreign_teacher() {
    let ctx = TestContext::new().await;
    let class = class_named(&ctx, "Grade 6", 6).await;
    let section = ctx
        .store
        .insert_section(&Section::new(class.id, "A".into(), 30))
        .await
        .unwrap();
    let outsider = ctx
        .store
        .add_teacher(ctx.other_school.id, "eve@hillcrest.test", "Eve")
        .await
        .unwrap();
    let app = test_app!(ctx);
    let uri = format!("/api/sections/{}/class-teacher", section.id);

    let req = test::TestRequest::post()
        .uri(&uri)
        .insert_header(ctx.admin())
        .set_json(json!({ "teacherId": outsider.id }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Teacher not found");

    let req = test::TestRequest::get()
        .uri(&uri)
        .insert_header(ctx.admin())
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["classTeacher"].is_null());

    let req = test::TestRequest::delete()
        .uri(&uri)
        .insert_header(ctx.admin())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    // Unknown section
    let req = test::TestRequest::get()
        .uri(&format!("/api/sections/{}/class-teacher", Uuid::new_v4()))
        .insert_header(ctx.admin())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn test_class_teacher_assign_then_remove() {
    let ctx = TestContext::new().await;
    let class = class_named(&ctx, "Grade 7", 7).await;
    let section = ctx
        .store
        .insert_section(&Section::new(class.id, "A".into(), 30))
        .await
        .unwrap();
    let teacher = ctx
        .store
        .add_teacher(ctx.school.id, "alan@riverside.test", "Alan")
        .await
        .unwrap();
    let app = test_app!(ctx);
    let uri = format!("/api/sections/{}/class-teacher", section.id);

    let req = test::TestRequest::post()
        .uri(&uri)
        .insert_header(ctx.admin())
        .set_json(json!({ "teacherId": teacher.id }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::delete()
        .uri(&uri)
        .insert_header(ctx.admin())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let overview = ctx.store.find_section(ctx.school.id, section.id).await.unwrap().unwrap();
    assert!(overview.class_teacher.is_none());
}
