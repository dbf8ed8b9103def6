//! REST surface mounted under `/api`.

pub mod classes;
pub mod dto;
pub mod fee_structures;
pub mod guard;
pub mod parent_students;
pub mod people;
pub mod sections;
pub mod subjects;
pub mod views;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::resource("/classes")
                    .route(web::get().to(classes::list_classes))
                    .route(web::post().to(classes::create_class)),
            )
            .service(
                web::resource("/classes/{id}")
                    .route(web::get().to(classes::get_class))
                    .route(web::put().to(classes::update_class))
                    .route(web::delete().to(classes::delete_class)),
            )
            .service(
                web::resource("/classes/{id}/subjects")
                    .route(web::get().to(subjects::list_subjects))
                    .route(web::post().to(subjects::create_subject)),
            )
            .service(
                web::resource("/classes/{id}/subjects/{subject_id}")
                    .route(web::get().to(subjects::get_subject))
                    .route(web::put().to(subjects::update_subject))
                    .route(web::delete().to(subjects::delete_subject)),
            )
            .service(
                web::resource("/fee-structures")
                    .route(web::get().to(fee_structures::list_fee_structures))
                    .route(web::post().to(fee_structures::create_fee_structure)),
            )
            .service(
                web::resource("/parent-students")
                    .route(web::get().to(parent_students::list_parent_students))
                    .route(web::post().to(parent_students::create_parent_student)),
            )
            .service(
                web::resource("/parent-students/{id}")
                    .route(web::delete().to(parent_students::delete_parent_student)),
            )
            .route("/parents", web::get().to(people::list_parents))
            .route("/teachers", web::get().to(people::list_teachers))
            .service(
                web::resource("/sections")
                    .route(web::get().to(sections::list_sections))
                    .route(web::post().to(sections::create_section)),
            )
            .service(
                web::resource("/sections/{id}")
                    .route(web::put().to(sections::update_section))
                    .route(web::delete().to(sections::delete_section)),
            )
            .service(
                web::resource("/sections/{id}/class-teacher")
                    .route(web::get().to(sections::get_class_teacher))
                    .route(web::post().to(sections::assign_class_teacher))
                    .route(web::delete().to(sections::remove_class_teacher)),
            ),
    );
}
