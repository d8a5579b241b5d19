//! Admin access middleware for the ELURC Payment Server.
//! This middleware can be placed on any route or service.
//!
//! It checks the `elurc_admin_token` header of the incoming request against the [`AdminToken`] registered as app
//! data. If they match, the request is allowed to continue. A missing token results in a 401 response, and a wrong
//! one in a 403. If the server has no admin token configured, every request is refused.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use elurc_common::Secret;
use futures::{
    future::{ok, Ready},
    Future,
};
use log::*;
use sha2::{Digest, Sha256};

use crate::{
    errors::{AuthError, ServerError},
    helpers::ADMIN_TOKEN_HEADER,
};

#[derive(Clone, Debug, Default)]
pub struct AdminToken(pub Secret<String>);

impl AdminToken {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(Secret::new(token.into()))
    }

    pub fn is_configured(&self) -> bool {
        !self.0.reveal().is_empty()
    }

    /// Compares the SHA-256 digests of the two tokens
    pub fn matches(&self, candidate: &str) -> bool {
        self.is_configured() && Sha256::digest(self.0.reveal().as_bytes()) == Sha256::digest(candidate.as_bytes())
    }
}

pub struct AdminAuthFactory;

impl AdminAuthFactory {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        AdminAuthFactory
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminAuthFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AdminAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AdminAuthService { service: Rc::new(service) })
    }
}

pub struct AdminAuthService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AdminAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let expected = req.app_data::<web::Data<AdminToken>>().map(|t| t.get_ref().clone()).unwrap_or_default();
            if !expected.is_configured() {
                warn!("💻️ Admin request to {} refused. No admin token has been configured.", req.path());
                return Err(ServerError::AuthenticationError(AuthError::AdminDisabled).into());
            }
            let token = req.headers().get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok());
            match token {
                None => {
                    debug!("💻️ Admin request to {} without a token", req.path());
                    Err(ServerError::AuthenticationError(AuthError::MissingToken).into())
                },
                Some(t) if expected.matches(t) => service.call(req).await,
                Some(_) => {
                    warn!("💻️ Admin request to {} with an invalid token", req.path());
                    Err(ServerError::AuthenticationError(AuthError::InvalidToken).into())
                },
            }
        })
    }
}
