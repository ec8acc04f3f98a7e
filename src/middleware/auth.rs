use std::future::{ready, Ready};
use std::rc::Rc;

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{web, Error, HttpMessage, HttpResponse};
use futures_util::future::LocalBoxFuture;
use sea_orm::{DatabaseConnection, EntityTrait};
use uuid::Uuid;

use crate::models::user;
use crate::utils::auth::decode_jwt;
use crate::utils::config::Config;
use crate::utils::errors::ApiError;

pub use crate::utils::auth::Claims;

/// Bearer-token guard for protected scopes. Verifies the JWT, confirms the
/// account still exists and is active, and injects the token claims into
/// request extensions for handlers to read via `web::ReqData<Claims>`.
///
/// Token verification is unconditional — there is no fallback identity for
/// unverifiable tokens.
pub struct JwtMiddleware;

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let jwt_secret = req
                .app_data::<web::Data<Config>>()
                .map(|config| config.jwt_secret.clone())
                .ok_or_else(|| internal("Configuration not available"))?;
            let db = req
                .app_data::<web::Data<DatabaseConnection>>()
                .cloned()
                .ok_or_else(|| internal("Database connection not available"))?;

            let auth_header = req
                .headers()
                .get("Authorization")
                .and_then(|header| header.to_str().ok())
                .ok_or_else(|| unauthorized("Not authorized to access this route"))?;

            let token = auth_header
                .strip_prefix("Bearer ")
                .ok_or_else(|| unauthorized("Invalid authorization format"))?;

            let claims = decode_jwt(token, &jwt_secret)
                .map_err(|_| unauthorized("Invalid or expired token"))?;

            let user_id = Uuid::parse_str(&claims.sub)
                .map_err(|_| unauthorized("Invalid user ID in token"))?;

            let account = user::Entity::find_by_id(user_id)
                .one(db.get_ref())
                .await
                .map_err(ApiError::from)?
                .ok_or_else(|| unauthorized("User not found"))?;

            if !account.is_active {
                return Err(unauthorized("User account is deactivated"));
            }

            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

fn unauthorized(message: &str) -> Error {
    actix_web::error::InternalError::from_response(
        message.to_string(),
        HttpResponse::Unauthorized().json(serde_json::json!({
            "success": false,
            "message": message,
        })),
    )
    .into()
}

fn internal(message: &str) -> Error {
    ApiError::Internal(anyhow::anyhow!("{}", message)).into()
}
