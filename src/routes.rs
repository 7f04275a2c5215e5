use crate::{
    api::{attendance, leave, permission, profile_request, project, timesheet, user, work_setting},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::AppError,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};

/// Per-IP limiter allowing `requests_per_min` with an equal burst.
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_else(|| {
            tracing::warn!(requests_per_min, "Invalid rate limit, using governor defaults");
            GovernorConfig::default()
        });
    Governor::new(&cfg)
}

/// Malformed bodies, ids and query strings all answer 400 `{"message": ...}`.
fn extractor_errors(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::invalid(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::invalid(format!("Malformed path: {err}")).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::invalid(err.to_string()).into()),
    );
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = build_limiter(config.rate_login_per_min);
    let logout_limiter = build_limiter(config.rate_login_per_min);
    let refresh_limiter = build_limiter(config.rate_refresh_per_min);
    let protected_limiter = build_limiter(config.rate_protected_per_min);

    extractor_errors(cfg);

    // Public routes
    cfg.service(
        web::scope(&format!("{}/auth", config.api_prefix))
            .service(
                web::resource("/login")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter)
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(logout_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(
                web::scope("/attendance")
                    .service(web::resource("").route(web::get().to(attendance::list_attendance)))
                    .service(web::resource("/clock").route(web::post().to(attendance::clock)))
                    .service(web::resource("/me").route(web::get().to(attendance::my_attendance)))
                    .service(
                        web::resource("/{id}/review")
                            .route(web::put().to(attendance::review_attendance)),
                    ),
            )
            .service(
                web::scope("/permissions")
                    .service(
                        web::resource("")
                            .route(web::get().to(permission::list_permissions))
                            .route(web::post().to(permission::create_permission)),
                    )
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::patch().to(permission::approve_permission)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::patch().to(permission::reject_permission)),
                    ),
            )
            .service(
                web::scope("/profile-requests")
                    .service(
                        web::resource("")
                            .route(web::get().to(profile_request::list_profile_requests))
                            .route(web::post().to(profile_request::create_profile_request)),
                    )
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::patch().to(profile_request::approve_profile_request)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::patch().to(profile_request::reject_profile_request)),
                    ),
            )
            .service(
                web::scope("/leaves")
                    .service(web::resource("").route(web::get().to(leave::list_leaves)))
                    .service(web::resource("/quota").route(web::get().to(leave::get_quota)))
                    .service(web::resource("/apply").route(web::post().to(leave::apply_leave))),
            )
            .service(
                web::scope("/projects")
                    .service(
                        web::resource("")
                            .route(web::get().to(project::list_projects))
                            .route(web::post().to(project::create_project)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(project::get_project))
                            .route(web::put().to(project::update_project))
                            .route(web::delete().to(project::delete_project)),
                    ),
            )
            .service(
                web::scope("/timesheets")
                    .service(
                        web::resource("")
                            .route(web::get().to(timesheet::list_timesheets))
                            .route(web::post().to(timesheet::create_timesheet)),
                    )
                    .service(
                        web::resource("/{id}").route(web::put().to(timesheet::update_timesheet)),
                    ),
            )
            .service(
                web::scope("/work-settings")
                    .service(
                        web::resource("")
                            .route(web::get().to(work_setting::list_work_settings))
                            .route(web::post().to(work_setting::create_work_setting)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::patch().to(work_setting::update_work_setting)),
                    ),
            )
            .service(
                web::scope("/users")
                    .service(
                        web::resource("")
                            .route(web::get().to(user::list_users))
                            .route(web::post().to(user::create_user)),
                    )
                    // registered before /{id} so "me" is not parsed as an id
                    .service(web::resource("/me").route(web::get().to(user::me)))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(user::get_user))
                            .route(web::patch().to(user::update_user)),
                    ),
            ),
    );
}
