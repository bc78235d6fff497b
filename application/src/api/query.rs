//! GraphQL [`Query`]s definitions.

use common::DateTime;
use juniper::graphql_object;
use service::{query, read, Query as _};

use crate::{api, AsError, Context, Error};

/// Root of all GraphQL queries.
#[derive(Clone, Copy, Debug)]
pub struct Query;

impl Query {
    /// Name of the [`tracing::Span`] for the queries.
    pub(crate) const SPAN_NAME: &'static str = "GraphQL query";
}

#[graphql_object(context = Context)]
impl Query {
    /// Returns the `Booking` with the specified ID.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `NOT_FOUND` - the `Booking` with the specified ID does not exist.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "booking",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn booking(
        id: api::booking::Id,
        ctx: &Context,
    ) -> Result<api::Booking, Error> {
        _ = ctx.caller().await?;
        ctx.service()
            .execute(query::booking::ById::by(id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| api::booking::BookingError::NotExists.into())
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Returns the `Booking` with the specified reference number.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `NOT_FOUND` - no `Booking` has the specified reference number.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "bookingByReference",
            otel.name = Self::SPAN_NAME,
            reference = %reference,
        ),
    )]
    pub async fn booking_by_reference(
        reference: api::booking::Reference,
        ctx: &Context,
    ) -> Result<api::Booking, Error> {
        _ = ctx.caller().await?;
        ctx.service()
            .execute(query::booking::ByReference::by(reference.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| api::booking::BookingError::NotExists.into())
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Returns the `Sale` with the specified ID.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `NOT_FOUND` - the `Sale` with the specified ID does not exist.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "sale",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn sale(
        id: api::sale::Id,
        ctx: &Context,
    ) -> Result<api::Sale, Error> {
        _ = ctx.caller().await?;
        ctx.service()
            .execute(query::sale::ById::by(id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| api::sale::SaleError::NotExists.into())
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Returns the `Sale` with the specified reference number.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `NOT_FOUND` - no `Sale` has the specified reference number.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "saleByReference",
            otel.name = Self::SPAN_NAME,
            reference = %reference,
        ),
    )]
    pub async fn sale_by_reference(
        reference: api::sale::Reference,
        ctx: &Context,
    ) -> Result<api::Sale, Error> {
        _ = ctx.caller().await?;
        ctx.service()
            .execute(query::sale::ByReference::by(reference.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| api::sale::SaleError::NotExists.into())
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Indicates whether the specified `Equipment` unit is free to be
    /// committed to a new transaction.
    ///
    /// Omit both window boundaries to check for a usage-only rental or a
    /// purchase.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `NOT_FOUND` - the `Equipment` with the specified ID does not exist;
    /// - `INVALID_WINDOW` - only one window boundary is provided, or the
    ///                      window ends before it starts.
    #[tracing::instrument(
        skip_all,
        fields(
            equipment_id = %equipment_id,
            gql.name = "isAvailable",
            otel.name = Self::SPAN_NAME,
            window_end = ?window_end,
            window_start = ?window_start,
        ),
    )]
    pub async fn is_available(
        equipment_id: api::equipment::Id,
        window_start: Option<DateTime>,
        window_end: Option<DateTime>,
        ctx: &Context,
    ) -> Result<bool, Error> {
        _ = ctx.caller().await?;
        let window = api::booking::window(window_start, window_end)
            .map_err(ctx.error())?;

        ctx.service()
            .execute(query::equipment::Availability {
                equipment_id: equipment_id.into(),
                window,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(|conflict| conflict.is_none())
    }

    /// Returns IDs of all the `Equipment` units currently committed to a
    /// transaction or withdrawn, regardless of dates.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "committedEquipment",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn committed_equipment(
        ctx: &Context,
    ) -> Result<Vec<api::equipment::Id>, Error> {
        _ = ctx.caller().await?;
        ctx.service()
            .execute(query::equipment::Committed::by(
                read::equipment::Committed,
            ))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(|ids| ids.into_iter().map(Into::into).collect())
    }
}
