use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::TokenManager;
use crate::error::{AppError, ValidationError};
use crate::identity::IdentityProvider;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{get_current_user, health_check, login, refresh_token, register};

const MAX_JSON_PAYLOAD: usize = 16 * 1024;

pub fn run(
    listener: TcpListener,
    manager: TokenManager,
    identities: Arc<dyn IdentityProvider>,
) -> Result<Server, std::io::Error> {
    let codec = manager.codec().clone();
    let manager = web::Data::new(manager);
    let identities: web::Data<dyn IdentityProvider> = web::Data::from(identities);

    let server = HttpServer::new(move || {
        let json_config = web::JsonConfig::default()
            .limit(MAX_JSON_PAYLOAD)
            .error_handler(|err, _req| {
                tracing::warn!(error = %err, "Malformed request body");
                AppError::Validation(ValidationError::InvalidPayload).into()
            });

        App::new()
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)
            .app_data(json_config)
            .app_data(manager.clone())
            .app_data(identities.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/auth")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh-token", web::post().to(refresh_token))
                    .service(
                        web::resource("/me")
                            .wrap(JwtMiddleware::new(codec.clone()))
                            .route(web::get().to(get_current_user)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
