use crate::{
    api::{attendance, changes, duty, leave_request, swap},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Result, anyhow};

type LimiterConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-route limiter settings. Built once so every worker shares the same
/// buckets.
#[derive(Clone)]
pub struct RateLimits {
    login: LimiterConfig,
    refresh: LimiterConfig,
    protected: LimiterConfig,
}

impl RateLimits {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: limiter(config.rate_login_per_min)?,
            refresh: limiter(config.rate_refresh_per_min)?,
            protected: limiter(config.rate_protected_per_min)?,
        })
    }
}

fn limiter(requests_per_min: u32) -> Result<LimiterConfig> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        60_000 / requests_per_min as u64
    };
    GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit of {} requests per minute", requests_per_min))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limits: &RateLimits) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(Governor::new(&limits.login))
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(Governor::new(&limits.refresh))
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(Governor::new(&limits.login))
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(Governor::new(&limits.protected)) // rate limiting
            .service(web::resource("/users").route(web::post().to(handlers::register)))
            .service(
                web::scope("/attendance")
                    .service(
                        web::resource("/check-in").route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/check-out").route(web::post().to(attendance::check_out)),
                    )
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(web::resource("/history").route(web::get().to(attendance::history)))
                    .service(web::resource("/zones").route(web::get().to(attendance::zones)))
                    .service(
                        web::resource("/expired")
                            .route(web::delete().to(attendance::purge_expired)),
                    )
                    // /attendance/{id}/check-out
                    .service(
                        web::resource("/{id}/check-out")
                            .route(web::put().to(attendance::override_check_out)),
                    ),
            )
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    // before /{id}
                    .service(web::resource("/usage").route(web::get().to(leave_request::usage)))
                    .service(web::resource("/{id}").route(web::get().to(leave_request::get_leave)))
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(leave_request::approve_leave)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(leave_request::reject_leave)),
                    ),
            )
            .service(
                web::scope("/duties")
                    .service(
                        web::resource("")
                            .route(web::get().to(duty::board))
                            .route(web::post().to(duty::create_duty)),
                    )
                    .service(web::resource("/rotation").route(web::post().to(duty::rotation)))
                    .service(web::resource("/neglected").route(web::get().to(duty::neglected)))
                    .service(
                        web::resource("/negligence-history")
                            .route(web::get().to(duty::negligence_history)),
                    )
                    .service(web::resource("/{id}/complete").route(web::post().to(duty::complete)))
                    .service(web::resource("/{id}/done").route(web::put().to(duty::set_done)))
                    .service(
                        web::resource("/{id}/accept-penalty")
                            .route(web::post().to(duty::accept_penalty)),
                    )
                    .service(web::resource("/{id}/redeem").route(web::post().to(duty::redeem)))
                    .service(web::resource("/{id}/appeal").route(web::post().to(duty::appeal)))
                    .service(
                        web::resource("/{id}/acknowledge")
                            .route(web::post().to(duty::acknowledge)),
                    ),
            )
            .service(
                web::scope("/swaps")
                    .service(
                        web::resource("")
                            .route(web::get().to(swap::list))
                            .route(web::post().to(swap::propose)),
                    )
                    .service(web::resource("/{id}").route(web::put().to(swap::respond))),
            )
            .service(web::resource("/changes").route(web::get().to(changes::changes))),
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
