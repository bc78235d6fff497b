//! [`Query`] collection related to [`Equipment`] availability.

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        availability::{self, Conflict, Engagements},
        booking::Window,
        equipment, Equipment,
    },
    infra::{database, Database},
    read, Service,
};

use super::{DatabaseQuery, Query};

/// Queries IDs of all the [`Equipment`] currently committed to a transaction
/// or withdrawn, regardless of dates.
pub type Committed =
    DatabaseQuery<By<Vec<equipment::Id>, read::equipment::Committed>>;

/// [`Query`] resolving whether an [`Equipment`] unit is free to be committed
/// to a new transaction.
///
/// Returns the [`Conflict`] making it unavailable, if any.
#[derive(Clone, Copy, Debug)]
pub struct Availability {
    /// ID of the [`Equipment`] unit.
    pub equipment_id: equipment::Id,

    /// [`Window`] the [`Equipment`] unit is wanted for.
    ///
    /// [`None`] if it's wanted for a usage-only rental or a purchase.
    pub window: Option<Window>,
}

impl<Db, Bus> Query<Availability> for Service<Db, Bus>
where
    Db: Database<
            Select<By<Option<Equipment>, equipment::Id>>,
            Ok = Option<Equipment>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Engagements, equipment::Id>>,
            Ok = Engagements,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Option<Conflict>;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        Availability {
            equipment_id,
            window,
        }: Availability,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let equipment = self
            .database()
            .execute(Select(By::<Option<Equipment>, _>::new(equipment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::EquipmentNotExists(equipment_id))
            .map_err(tracerr::wrap!())?;

        let engagements = self
            .database()
            .execute(Select(By::<Engagements, _>::new(equipment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(availability::resolve(&equipment, &engagements, window.as_ref())
            .err())
    }
}

/// Error of [`Availability`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Equipment`] with the provided ID does not exist.
    #[display("`Equipment(id: {_0})` does not exist")]
    EquipmentNotExists(#[error(not(source))] equipment::Id),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{
            create_booking::spec::{days, request, stock, window},
            create_sale::spec::purchase,
        },
        domain::{
            availability::Conflict,
            booking::spec::rental,
            equipment::Owner,
            sale::spec::for_sale,
        },
        mock, read, Command as _, Config, Query as _,
    };

    use super::{Availability, Committed, ExecutionError};

    #[tokio::test]
    async fn follows_engagements() {
        let (svc, _queue) = mock::service(Config::default());
        let drill = rental(2_500);
        stock(&svc, &drill).await;
        let june = window("2024-06-01T00:00:00Z", "2024-06-05T00:00:00Z");

        let free = svc
            .execute(Availability {
                equipment_id: drill.id,
                window: Some(june),
            })
            .await
            .unwrap();
        assert_eq!(free, None);

        let booking = svc
            .execute(request(vec![days(&drill, 4)], Some(june)))
            .await
            .unwrap();

        let overlapping = svc
            .execute(Availability {
                equipment_id: drill.id,
                window: Some(window(
                    "2024-06-03T00:00:00Z",
                    "2024-06-08T00:00:00Z",
                )),
            })
            .await
            .unwrap();
        assert_eq!(overlapping, Some(Conflict::Booking(booking.id)));

        let later = svc
            .execute(Availability {
                equipment_id: drill.id,
                window: Some(window(
                    "2024-06-05T00:00:00Z",
                    "2024-06-08T00:00:00Z",
                )),
            })
            .await
            .unwrap();
        assert_eq!(later, None);
    }

    #[tokio::test]
    async fn lists_committed_equipment() {
        let (svc, _queue) = mock::service(Config::default());
        let (drill, mixer) = (rental(2_500), rental(1_000));
        let excavator = for_sale(Owner::Platform, 500_000);
        for eq in [&drill, &mixer, &excavator] {
            stock(&svc, eq).await;
        }
        _ = svc
            .execute(request(vec![days(&drill, 1)], None))
            .await
            .unwrap();
        _ = svc.execute(purchase(&excavator)).await.unwrap();

        let mut committed =
            svc.execute(Committed::by(read::equipment::Committed))
                .await
                .unwrap();
        committed.sort_unstable();

        let mut expected = vec![drill.id, excavator.id];
        expected.sort_unstable();
        assert_eq!(committed, expected);
    }

    #[tokio::test]
    async fn reports_missing_equipment() {
        let (svc, _queue) = mock::service(Config::default());
        let ghost = rental(1);

        let err = svc
            .execute(Availability {
                equipment_id: ghost.id,
                window: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::EquipmentNotExists(id) if *id == ghost.id,
        ));
    }
}
