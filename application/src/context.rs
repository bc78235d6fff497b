//! [`Context`]-related definitions.

use std::sync::{
    atomic::{self, AtomicU16},
    Arc,
};

use axum::{async_trait, extract::FromRequestParts, RequestPartsExt as _};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use juniper::{
    http::{GraphQLBatchResponse, GraphQLResponse},
    IntoFieldError as _,
};
use secrecy::{ExposeSecret as _, SecretString};
use service::domain::lifecycle::Actor;
use tokio::sync::OnceCell;

use crate::{
    api, config, define_error, AsError, Error, JuniperResponse, Service,
};

/// Application context.
#[derive(Debug)]
pub struct Context {
    /// [`Service`] instance.
    service: Service,

    /// API access configuration.
    api: Arc<config::Api>,

    /// Error status code.
    error_status_code: AtomicU16,

    /// Parts of the HTTP request.
    parts: http::request::Parts,

    /// Outcome of authenticating the current [`Caller`].
    caller: OnceCell<Result<Caller, Error>>,
}

impl Context {
    /// Returns [`Service`] instance of this [`Context`].
    #[must_use]
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Returns the error status code of this [`Context`].
    #[must_use]
    pub fn error_status_code(&self) -> http::StatusCode {
        http::StatusCode::from_u16(
            self.error_status_code.load(atomic::Ordering::Relaxed),
        )
        .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Sets the error status code for this [`Context`].
    ///
    /// Provided [`http::StatusCode`] will be applied to the response.
    pub fn set_error_status_code(&self, status_code: http::StatusCode) {
        self.error_status_code
            .store(status_code.as_u16(), atomic::Ordering::Relaxed);
    }

    /// Helper method calling [`Context::set_error_status_code()`] inside
    /// [`Result::map_err()`] closure.
    pub fn error(&self) -> impl FnOnce(Error) -> Error + '_ {
        move |err| {
            self.set_error_status_code(err.status_code);
            err
        }
    }

    /// Returns the [`Caller`] of the current request.
    ///
    /// # Errors
    ///
    /// Errors if:
    /// - the current HTTP request is not authorized;
    /// - the provided token matches none of the configured ones.
    pub async fn caller(&self) -> Result<Caller, Error> {
        self.caller
            .get_or_init(|| async {
                self.parts
                    .clone()
                    .extract::<TypedHeader<Authorization<Bearer>>>()
                    .await
                    .map_err(|e| {
                        if e.is_missing() {
                            AuthError::AuthorizationRequired.into()
                        } else {
                            e.into_error()
                        }
                    })
                    .and_then(|TypedHeader(Authorization(bearer))| {
                        Caller::authenticate(&self.api, bearer.token())
                            .map_err(Into::into)
                    })
            })
            .await
            .clone()
            .map_err(self.error())
    }

    /// Ensures the current [`Caller`] is allowed to open transactions.
    ///
    /// # Errors
    ///
    /// Errors if the [`Caller`] is not authenticated, or is a
    /// [`Caller::Scheduler`].
    pub async fn ensure_party(&self) -> Result<Caller, Error> {
        match self.caller().await? {
            c @ (Caller::Client | Caller::Operator) => Ok(c),
            Caller::Scheduler => {
                Err(api::AccessError::Denied.into()).map_err(self.error())
            }
        }
    }

    /// Ensures the current [`Caller`] is allowed to run auto-completion
    /// passes.
    ///
    /// # Errors
    ///
    /// Errors if the [`Caller`] is not authenticated, or is a
    /// [`Caller::Client`].
    pub async fn ensure_operator(&self) -> Result<Caller, Error> {
        match self.caller().await? {
            c @ (Caller::Operator | Caller::Scheduler) => Ok(c),
            Caller::Client => Err(api::AccessError::OperatorRequired.into())
                .map_err(self.error()),
        }
    }

    /// Resolves the [`Actor`] the current [`Caller`] changes statuses as.
    ///
    /// Clients act on behalf of the provided user, while operators act as
    /// themselves.
    ///
    /// # Errors
    ///
    /// Errors if:
    /// - the [`Caller`] is not authenticated, or is a [`Caller::Scheduler`];
    /// - the `actor_id` is not provided.
    pub async fn actor(
        &self,
        actor_id: Option<api::user::Id>,
    ) -> Result<Actor, Error> {
        let caller = self.ensure_party().await?;
        let id = actor_id
            .map(Into::into)
            .ok_or_else(|| api::AccessError::ActorRequired.into())
            .map_err(self.error())?;
        Ok(match caller {
            Caller::Operator => Actor::Operator(id),
            Caller::Client | Caller::Scheduler => Actor::User(id),
        })
    }

    /// Applies the [`juniper::Variables`] provided by the client on GraphQL
    /// subscription initialization.
    ///
    /// # Errors
    ///
    /// Errors if the provided variables are invalid.
    pub(crate) fn apply_subscription_variables(
        &mut self,
        vars: &juniper::Variables,
    ) -> Result<(), Error> {
        if let Some(token) = vars.get("authToken") {
            let token = token
                .as_string_value()
                .ok_or_else(|| Error::from(AuthError::InvalidVariables))?;
            let token = format!("Bearer {token}")
                .parse()
                .map_err(|_| Error::from(AuthError::InvalidVariables))?;
            drop(
                self.parts
                    .headers
                    .insert(http::header::AUTHORIZATION, token),
            );
        }

        Ok(())
    }
}

impl juniper::Context for Context {}

#[async_trait]
impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = JuniperResponse;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let missing = |ext: &str| JuniperResponse {
            status_code: http::StatusCode::INTERNAL_SERVER_ERROR,
            response: GraphQLBatchResponse::Single(GraphQLResponse::error(
                Error::internal(&format!("missing `{ext}` extension"))
                    .into_field_error(),
            )),
        };

        let service = parts
            .extensions
            .get::<Service>()
            .cloned()
            .ok_or_else(|| missing("Service"))?;
        let api = parts
            .extensions
            .get::<Arc<config::Api>>()
            .cloned()
            .ok_or_else(|| missing("config::Api"))?;

        Ok(Self {
            service,
            api,
            error_status_code: AtomicU16::new(
                http::StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            ),
            parts: parts.clone(),
            caller: OnceCell::new(),
        })
    }
}

/// Kind of an authenticated API caller.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Caller {
    /// Marketplace backend acting on behalf of its users.
    Client,

    /// Platform operator.
    Operator,

    /// External scheduler triggering auto-completion passes.
    Scheduler,
}

impl Caller {
    /// Resolves the [`Caller`] owning the provided bearer `token`.
    ///
    /// # Errors
    ///
    /// With [`AuthError::InvalidToken`] if the `token` matches none of the
    /// configured ones.
    pub fn authenticate(
        api: &config::Api,
        token: &str,
    ) -> Result<Self, AuthError> {
        let matches = |expected: &Option<SecretString>| {
            expected
                .as_ref()
                .is_some_and(|t| t.expose_secret() == token)
        };

        [
            (&api.operator_token, Self::Operator),
            (&api.scheduler_token, Self::Scheduler),
            (&api.client_token, Self::Client),
        ]
        .into_iter()
        .find_map(|(expected, caller)| matches(expected).then_some(caller))
        .ok_or(AuthError::InvalidToken)
    }
}

define_error! {
    enum AuthError {
        #[code = "AUTHORIZATION_REQUIRED"]
        #[status = UNAUTHORIZED]
        #[message = "Authorization required"]
        AuthorizationRequired,

        #[code = "INVALID_TOKEN"]
        #[status = UNAUTHORIZED]
        #[message = "Provided token is not recognized"]
        InvalidToken,

        #[code = "INVALID_VARIABLES"]
        #[status = BAD_REQUEST]
        #[message = "Invalid subscription authorization variables"]
        InvalidVariables,
    }
}

#[cfg(test)]
mod spec {
    use crate::config;

    use super::{AuthError, Caller};

    fn api() -> config::Api {
        config::Api {
            client_token: Some("client".to_owned().into()),
            operator_token: Some("operator".to_owned().into()),
            scheduler_token: None,
            ..config::Api::default()
        }
    }

    #[test]
    fn resolves_caller_by_token() {
        let api = api();

        assert!(matches!(
            Caller::authenticate(&api, "client"),
            Ok(Caller::Client),
        ));
        assert!(matches!(
            Caller::authenticate(&api, "operator"),
            Ok(Caller::Operator),
        ));
    }

    #[test]
    fn rejects_unknown_token() {
        let api = api();

        for token in ["", "scheduler", "Operator"] {
            assert!(matches!(
                Caller::authenticate(&api, token),
                Err(AuthError::InvalidToken),
            ));
        }
    }
}
