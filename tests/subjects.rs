#[macro_use]
mod common;

use actix_web::test;
use common::TestContext;
use schoolhub_server::db::models::{Class, Role};
use schoolhub_server::Store;
use serde_json::json;
use uuid::Uuid;

#[actix_web::test]
async fn test_subject_lifecycle() {
    let ctx = TestContext::new().await;
    let class = ctx
        .store
        .insert_class(&Class::new(ctx.school.id, "Grade 1".into(), 1))
        .await
        .unwrap();
    let ada = ctx.store.add_teacher(ctx.school.id, "ada@riverside.test", "Ada").await.unwrap();
    let alan = ctx.store.add_teacher(ctx.school.id, "alan@riverside.test", "Alan").await.unwrap();
    let app = test_app!(ctx);
    let base = format!("/api/classes/{}/subjects", class.id);

    let req = test::TestRequest::post()
        .uri(&base)
        .insert_header(ctx.admin())
        .set_json(json!({ "name": "Mathematics", "code": "MATH", "teacherIds": [ada.id] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let subject_id = body["subject"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["subject"]["teachers"][0]["name"], "Ada");

    // Duplicate name in the same class
    let req = test::TestRequest::post()
        .uri(&base)
        .insert_header(ctx.admin())
        .set_json(json!({ "name": "Mathematics" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    // Partial update replaces the teacher set and keeps the code
    let req = test::TestRequest::put()
        .uri(&format!("{}/{}", base, subject_id))
        .insert_header(ctx.admin())
        .set_json(json!({ "teacherIds": [alan.id] }))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["subject"]["code"], "MATH");
    let teachers = body["subject"]["teachers"].as_array().unwrap();
    assert_eq!(teachers.len(), 1);
    assert_eq!(teachers[0]["name"], "Alan");

    let req = test::TestRequest::get()
        .uri(&base)
        .insert_header(ctx.auth(Role::Student))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["subjects"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::delete()
        .uri(&format!("{}/{}", base, subject_id))
        .insert_header(ctx.admin())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::get()
        .uri(&format!("{}/{}", base, subject_id))
        .insert_header(ctx.admin())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn test_subject_scoped_through_class_chain() {
    let ctx = TestContext::new().await;
    let class = ctx
        .store
        .insert_class(&Class::new(ctx.school.id, "Grade 2".into(), 2))
        .await
        .unwrap();
    let sibling = ctx
        .store
        .insert_class(&Class::new(ctx.school.id, "Grade 3".into(), 3))
        .await
        .unwrap();
    let foreign = ctx
        .store
        .insert_class(&Class::new(ctx.other_school.id, "Grade 2".into(), 2))
        .await
        .unwrap();
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri(&format!("/api/classes/{}/subjects", class.id))
        .insert_header(ctx.admin())
        .set_json(json!({ "name": "Science" }))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let subject_id = body["subject"]["id"].as_str().unwrap().to_string();

    // Right subject, wrong class
    let req = test::TestRequest::get()
        .uri(&format!("/api/classes/{}/subjects/{}", sibling.id, subject_id))
        .insert_header(ctx.admin())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Subject not found");

    // Another school's admin sees nothing
    let req = test::TestRequest::get()
        .uri(&format!("/api/classes/{}/subjects/{}", class.id, subject_id))
        .insert_header(ctx.other_admin())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::post()
        .uri(&format!("/api/classes/{}/subjects", foreign.id))
        .insert_header(ctx.admin())
        .set_json(json!({ "name": "Science" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn test_subject_rejects_unknown_teachers() {
    let ctx = TestContext::new().await;
    let class = ctx
        .store
        .insert_class(&Class::new(ctx.school.id, "Grade 4".into(), 4))
        .await
        .unwrap();
    let outsider = ctx
        .store
        .add_teacher(ctx.other_school.id, "eve@hillcrest.test", "Eve")
        .await
        .unwrap();
    let app = test_app!(ctx);

    for ids in [vec![outsider.id], vec![Uuid::new_v4()]] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/classes/{}/subjects", class.id))
            .insert_header(ctx.admin())
            .set_json(json!({ "name": "History", "teacherIds": ids }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["details"][0]["field"], "teacherIds");
    }

    assert!(ctx.store.list_subjects(class.id).await.unwrap().is_empty());
}
