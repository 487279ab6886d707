pub mod auth;
pub mod boards;
pub mod health;
pub mod tasks;
pub mod users;

use actix_web::web;

/// Registers the versioned API. Mount it under `/api`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v1")
            .service(
                web::scope("/auth")
                    .service(auth::register)
                    .service(auth::token)
                    .service(auth::refresh)
                    .service(auth::me),
            )
            .service(
                web::scope("/users")
                    .service(users::list_users)
                    .service(users::get_user)
                    .service(users::update_user)
                    .service(users::delete_user),
            )
            .service(
                web::scope("/boards")
                    .service(boards::create_board)
                    .service(boards::list_boards)
                    .service(boards::get_board)
                    .service(boards::update_board)
                    .service(boards::delete_board)
                    .service(boards::list_members)
                    .service(boards::add_member)
                    .service(boards::remove_member)
                    .service(tasks::list_board_tasks)
                    .service(tasks::create_task),
            )
            .service(
                web::scope("/tasks")
                    .service(tasks::get_task)
                    .service(tasks::update_task)
                    .service(tasks::delete_task),
            ),
    );
}
