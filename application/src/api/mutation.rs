//! GraphQL [`Mutation`]s definitions.

use common::DateTime;
use juniper::graphql_object;
use service::{
    command,
    domain::{booking, lifecycle, sale},
    Command as _,
};
use uuid::Uuid;

use crate::{api, AsError, Context, Error};

/// Root of all GraphQL mutations.
#[derive(Clone, Copy, Debug)]
pub struct Mutation;

impl Mutation {
    /// Name of the [`tracing::Span`] for the mutations.
    const SPAN_NAME: &'static str = "GraphQL mutation";
}

#[graphql_object(context = Context)]
impl Mutation {
    /// Creates a new pending `Booking` of the specified `Equipment` units.
    ///
    /// Omit both window boundaries for a usage-only `Booking`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `NO_LINE_ITEMS` - no `Equipment` is requested;
    /// - `DUPLICATE_EQUIPMENT` - the same `Equipment` is requested twice;
    /// - `INVALID_WINDOW` - only one window boundary is provided, or the
    ///                      window ends before it starts;
    /// - `NOT_FOUND` - some requested `Equipment` does not exist;
    /// - `NOT_FOR_RENT` - some requested `Equipment` is not listed for rent;
    /// - `INVALID_PRICING_TYPE` - some requested `Equipment` has no rate for
    ///                            the requested `PricingType`;
    /// - `CURRENCY_MISMATCH` - requested `Equipment` rates are in different
    ///                         currencies;
    /// - `EQUIPMENT_UNAVAILABLE` - some requested `Equipment` is committed to
    ///                             another transaction.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "createBooking",
            items = items.len(),
            otel.name = Self::SPAN_NAME,
            renter_id = %renter_id,
            window_end = ?window_end,
            window_start = ?window_start,
        ),
    )]
    pub async fn create_booking(
        renter_id: api::user::Id,
        items: Vec<api::booking::ItemInput>,
        window_start: Option<DateTime>,
        window_end: Option<DateTime>,
        ctx: &Context,
    ) -> Result<api::Booking, Error> {
        _ = ctx.ensure_party().await?;
        let window = api::booking::window(window_start, window_end)
            .map_err(ctx.error())?;

        ctx.service()
            .execute(command::CreateBooking {
                renter_id: renter_id.into(),
                items: items.into_iter().map(Into::into).collect(),
                window,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Creates a new pending `Sale` of the specified `Equipment` unit,
    /// reserving it.
    ///
    /// Specify `transportDistance` to have the `Equipment` delivered.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `NOT_FOUND` - the `Equipment` does not exist;
    /// - `NOT_FOR_SALE` - the `Equipment` is not listed for sale;
    /// - `TRANSPORT_UNAVAILABLE` - delivery is not offered;
    /// - `CURRENCY_MISMATCH` - price and delivery cost are in different
    ///                         currencies;
    /// - `EQUIPMENT_UNAVAILABLE` - the `Equipment` is committed to another
    ///                             transaction.
    #[tracing::instrument(
        skip_all,
        fields(
            buyer_id = %buyer_id,
            equipment_id = %equipment_id,
            gql.name = "createSale",
            otel.name = Self::SPAN_NAME,
            transport_distance = ?transport_distance.map(|d| d.to_string()),
        ),
    )]
    pub async fn create_sale(
        buyer_id: api::user::Id,
        equipment_id: api::equipment::Id,
        transport_distance: Option<api::equipment::Usage>,
        ctx: &Context,
    ) -> Result<api::Sale, Error> {
        _ = ctx.ensure_party().await?;

        ctx.service()
            .execute(command::CreateSale {
                buyer_id: buyer_id.into(),
                equipment_id: equipment_id.into(),
                transport_distance: transport_distance.map(Into::into),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Changes the status of the specified transaction.
    ///
    /// Clients change it on behalf of the user identified by `actorId`,
    /// while operators identify themselves by it. Requesting the current
    /// status of a non-terminal transaction changes nothing.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `ACTOR_REQUIRED` - `actorId` is not provided;
    /// - `INVALID_STATUS` - `targetStatus` is unknown to the
    ///                      `transactionType`;
    /// - `NOT_FOUND` - the transaction does not exist;
    /// - `TRANSITION_FROM_TERMINAL_STATE` - the transaction is completed or
    ///                                      cancelled already;
    /// - `INVALID_STATUS_TRANSITION` - the transition is not allowed.
    #[tracing::instrument(
        skip_all,
        fields(
            actor_id = ?actor_id.map(|id| id.to_string()),
            gql.name = "setStatus",
            id = %id,
            otel.name = Self::SPAN_NAME,
            target_status = %target_status,
            transaction_type = ?transaction_type,
        ),
    )]
    pub async fn set_status(
        transaction_type: api::TransactionType,
        id: Uuid,
        target_status: String,
        actor_id: Option<api::user::Id>,
        notes: Option<String>,
        ctx: &Context,
    ) -> Result<api::Transaction, Error> {
        let actor = ctx.actor(actor_id).await?;

        match transaction_type {
            api::TransactionType::Booking => ctx
                .service()
                .execute(command::SetBookingStatus {
                    booking_id: api::booking::Id::from(id).into(),
                    status: lifecycle::parse_status::<booking::Status>(
                        &target_status,
                    )
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())?,
                    actor,
                    notes,
                })
                .await
                .map_err(AsError::into_error)
                .map_err(ctx.error())
                .map(|b| api::Transaction::Booking(b.into())),
            api::TransactionType::Sale => ctx
                .service()
                .execute(command::SetSaleStatus {
                    sale_id: api::sale::Id::from(id).into(),
                    status: lifecycle::parse_status::<sale::Status>(
                        &target_status,
                    )
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())?,
                    actor,
                    notes,
                })
                .await
                .map_err(AsError::into_error)
                .map_err(ctx.error())
                .map(|s| api::Transaction::Sale(s.into())),
        }
    }

    /// Runs a single auto-completion pass as of the specified moment,
    /// defaulting to the current one.
    ///
    /// Ended `Booking`s are resolved, stale `Sale`s are cancelled and due
    /// reminders are sent. Repeating a pass as of the same moment does
    /// nothing.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `OPERATOR_REQUIRED` - the caller is neither an operator nor a
    ///                         scheduler;
    /// - `MOMENT_OUT_OF_RANGE` - `now` is too close to the supported date
    ///                           range boundaries.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "runAutoCompletion",
            now = ?now,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn run_auto_completion(
        now: Option<DateTime>,
        ctx: &Context,
    ) -> Result<api::Report, Error> {
        _ = ctx.ensure_operator().await?;

        ctx.service()
            .execute(command::RunAutoCompletion {
                now: now.unwrap_or_else(DateTime::now),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }
}
