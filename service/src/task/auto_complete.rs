//! [`AutoComplete`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::{
    operations::{By, Perform, Start},
    DateTime,
};
use smart_default::SmartDefault;
use tokio::time::{interval, MissedTickBehavior};
use tracerr::Traced;
use tracing as log;

use crate::{
    command::{run_auto_completion, RunAutoCompletion},
    Command, Service,
};

use super::Task;

/// Configuration for [`AutoComplete`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Indicator whether [`AutoComplete`] runs at all.
    #[default = true]
    pub enabled: bool,

    /// Interval between [`RunAutoCompletion`] passes.
    #[default(time::Duration::from_secs(5 * 60))]
    pub interval: time::Duration,
}

/// [`Task`] periodically running a [`RunAutoCompletion`] pass over all the
/// bookings and sales.
#[derive(Clone, Copy, Debug)]
pub struct AutoComplete<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db, Bus> Task<Start<By<AutoComplete<Self>, Config>>> for Service<Db, Bus>
where
    AutoComplete<Self>: Task<Perform<()>, Ok = (), Err: Error> + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<AutoComplete<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = AutoComplete {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            let _ = interval.tick().await;
            _ = task.execute(Perform(())).await.map_err(|e| {
                log::error!("`task::AutoComplete` failed: {e}");
            });
        }
    }
}

impl<Db, Bus> Task<Perform<()>> for AutoComplete<Service<Db, Bus>>
where
    Service<Db, Bus>: Command<
        RunAutoCompletion,
        Ok = run_auto_completion::Report,
        Err = Traced<run_auto_completion::ExecutionError>,
    >,
{
    type Ok = ();
    type Err = Traced<run_auto_completion::ExecutionError>;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let report = self
            .service
            .execute(RunAutoCompletion {
                now: DateTime::now(),
            })
            .await?;
        if !report.is_empty() {
            log::info!("`task::AutoComplete` pass: {report:?}");
        }
        Ok(())
    }
}
