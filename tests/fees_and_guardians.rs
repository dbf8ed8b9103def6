#[macro_use]
mod common;

use actix_web::test;
use common::TestContext;
use schoolhub_server::db::models::{Class, Role};
use schoolhub_server::Store;
use serde_json::json;
use uuid::Uuid;

#[actix_web::test]
async fn test_fee_structures_create_and_filter() {
    let ctx = TestContext::new().await;
    let class = ctx
        .store
        .insert_class(&Class::new(ctx.school.id, "Grade 1".into(), 1))
        .await
        .unwrap();
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/fee-structures")
        .insert_header(ctx.admin())
        .set_json(json!({
            "name": "Tuition",
            "amount": 1200.0,
            "frequency": "QUARTERLY",
            "classId": class.id,
            "dueDay": 10,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["feeStructure"]["className"], "Grade 1");
    assert_eq!(body["feeStructure"]["frequency"], "QUARTERLY");
    assert_eq!(body["feeStructure"]["isActive"], true);

    let req = test::TestRequest::post()
        .uri("/api/fee-structures")
        .insert_header(ctx.admin())
        .set_json(json!({ "name": "Library", "amount": 50, "frequency": "ANNUAL" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let req = test::TestRequest::get()
        .uri("/api/fee-structures")
        .insert_header(ctx.auth(Role::Parent))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["feeStructures"].as_array().unwrap().len(), 2);

    let req = test::TestRequest::get()
        .uri(&format!("/api/fee-structures?classId={}", class.id))
        .insert_header(ctx.auth(Role::Parent))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let fees = body["feeStructures"].as_array().unwrap();
    assert_eq!(fees.len(), 1);
    assert_eq!(fees[0]["name"], "Tuition");

    // Other tenants see none of it
    let req = test::TestRequest::get()
        .uri("/api/fee-structures")
        .insert_header(ctx.other_admin())
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["feeStructures"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn test_fee_structure_for_foreign_class_is_not_found() {
    let ctx = TestContext::new().await;
    let foreign = ctx
        .store
        .insert_class(&Class::new(ctx.other_school.id, "Grade 1".into(), 1))
        .await
        .unwrap();
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/fee-structures")
        .insert_header(ctx.admin())
        .set_json(json!({
            "name": "Tuition",
            "amount": 100,
            "frequency": "MONTHLY",
            "classId": foreign.id,
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
    assert!(ctx.store.list_fee_structures(ctx.school.id, None).await.unwrap().is_empty());
}

#[actix_web::test]
async fn test_parent_student_links() {
    let ctx = TestContext::new().await;
    let parent = ctx.store.add_parent(ctx.school.id, "mum@riverside.test", "Mum").await.unwrap();
    let student = ctx
        .store
        .add_student(ctx.school.id, "kid@riverside.test", "Kid", None)
        .await
        .unwrap();
    let app = test_app!(ctx);

    let link = json!({ "parentId": parent.id, "studentId": student.id, "relationship": "Mother" });

    let req = test::TestRequest::post()
        .uri("/api/parent-students")
        .insert_header(ctx.admin())
        .set_json(&link)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let link_id = body["parentStudent"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["parentStudent"]["parent"]["name"], "Mum");
    assert_eq!(body["parentStudent"]["student"]["email"], "kid@riverside.test");

    // Same pair again
    let req = test::TestRequest::post()
        .uri("/api/parent-students")
        .insert_header(ctx.admin())
        .set_json(&link)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "This parent-student relationship already exists");

    let req = test::TestRequest::get()
        .uri(&format!("/api/parent-students?parentId={}", parent.id))
        .insert_header(ctx.auth(Role::Teacher))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["parentStudents"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::get()
        .uri("/api/parents")
        .insert_header(ctx.auth(Role::Teacher))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["parents"][0]["childrenCount"], 1);

    // Another school's admin cannot remove it
    let req = test::TestRequest::delete()
        .uri(&format!("/api/parent-students/{}", link_id))
        .insert_header(ctx.other_admin())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/parent-students/{}", link_id))
        .insert_header(ctx.admin())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    assert!(!ctx.store.parent_student_exists(parent.id, student.id).await.unwrap());
}

#[actix_web::test]
async fn test_parent_student_requires_people_in_school() {
    let ctx = TestContext::new().await;
    let parent = ctx.store.add_parent(ctx.school.id, "dad@riverside.test", "Dad").await.unwrap();
    let outsider = ctx
        .store
        .add_student(ctx.other_school.id, "kid@hillcrest.test", "Kid", None)
        .await
        .unwrap();
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/parent-students")
        .insert_header(ctx.admin())
        .set_json(json!({ "parentId": parent.id, "studentId": outsider.id }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Student not found");

    let req = test::TestRequest::post()
        .uri("/api/parent-students")
        .insert_header(ctx.admin())
        .set_json(json!({ "parentId": Uuid::new_v4(), "studentId": outsider.id }))
        .to_request();
    let body: serde_json::Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["error"], "Parent not found");
}

#[actix_web::test]
async fn test_teachers_listing_is_tenant_scoped() {
    let ctx = TestContext::new().await;
    ctx.store.add_teacher(ctx.school.id, "ada@riverside.test", "Ada").await.unwrap();
    ctx.store.add_teacher(ctx.other_school.id, "eve@hillcrest.test", "Eve").await.unwrap();
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/api/teachers")
        .insert_header(ctx.auth(Role::Parent))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let teachers = body["teachers"].as_array().unwrap();
    assert_eq!(teachers.len(), 1);
    assert_eq!(teachers[0]["name"], "Ada");
    assert_eq!(teachers[0]["email"], "ada@riverside.test");
}
