//! GraphQL [`Subscription`]s definitions.

use futures::{stream::BoxStream, StreamExt as _};
use juniper::graphql_subscription;
use service::{query, Query as _};

use crate::{api, AsError, Context, Error};

/// Root of all GraphQL subscription.
#[derive(Clone, Copy, Debug)]
pub struct Subscription;

#[graphql_subscription(context = Context)]
impl Subscription {
    /// Subscribes to `Signal`s about changes of the data behind the
    /// specified `Channel`s.
    ///
    /// Only `Signal`s emitted after subscribing are received.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - the subscription is not authorized.
    pub async fn changes(
        &self,
        channels: Vec<api::signal::Channel>,
        ctx: &Context,
    ) -> Result<BoxStream<'static, Result<api::Signal, Error>>, Error> {
        _ = ctx.caller().await?;

        let signals = ctx
            .service()
            .execute(query::Changes {
                channels: channels.into_iter().map(Into::into).collect(),
            })
            .await
            .map_err(AsError::into_error)?;
        Ok(signals.map(|s| Ok(s.into())).boxed())
    }
}
