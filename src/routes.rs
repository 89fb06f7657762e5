use crate::{
    api::{attendance, profile, project},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Per-route limiter: `requests_per_min` burst, refilled evenly over a minute.
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/forgot-password")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::forgot_password)),
            )
            .service(
                web::resource("/reset-password")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::reset_password)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(handlers::session)
            .service(
                web::scope("/profile")
                    // /profile
                    .service(
                        web::resource("")
                            .route(web::get().to(profile::get_profile))
                            .route(web::put().to(profile::update_profile)),
                    )
                    // /profile/photo
                    .service(
                        web::resource("/photo")
                            .route(web::put().to(profile::set_photo))
                            .route(web::delete().to(profile::delete_photo)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    .route("/check-in", web::post().to(attendance::check_in))
                    .route("/check-out", web::post().to(attendance::check_out))
                    .route("/today", web::get().to(attendance::today))
                    .route("/monthly", web::get().to(attendance::monthly))
                    .route("/daily", web::get().to(attendance::daily)),
            )
            .service(
                web::scope("/projects")
                    // /projects
                    .service(
                        web::resource("")
                            .route(web::get().to(project::list_projects))
                            .route(web::post().to(project::create_project)),
                    )
                    .service(web::resource("/mine").route(web::get().to(project::my_projects)))
                    .service(
                        web::resource("/stream").route(web::get().to(project::stream_projects)),
                    )
                    // /projects/{id}
                    .service(
                        web::resource("/{id}").route(web::delete().to(project::terminate_project)),
                    )
                    .service(
                        web::resource("/{id}/complete")
                            .route(web::put().to(project::complete_project)),
                    )
                    .service(
                        web::resource("/{id}/hold").route(web::put().to(project::hold_project)),
                    )
                    .service(
                        web::resource("/{id}/resume").route(web::put().to(project::resume_project)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new pair; the old refresh token is revoked

// FORGOT PASSWORD
//  └─ POST /auth/forgot-password → 202, token logged in place of a mail
//       └─ POST /auth/reset-password with token + newPassword (single use)
