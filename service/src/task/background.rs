//! Background environment for running [`Task`]s.

use std::{
    error::Error as StdError,
    future::{Future, IntoFuture},
};

use derive_more::{Display, Error};
use futures::{
    future::{self, LocalBoxFuture},
    FutureExt as _,
};
use tokio::task;
use tracing as log;

#[cfg(doc)]
use crate::Task;

/// Type-erased error of a background [`Task`].
type BoxError = Box<dyn StdError + 'static>;

/// Background environment for running [`Task`]s on the current thread.
///
/// Resolves once every spawned [`Task`] finishes, or any of them fails.
#[derive(Debug, Default)]
pub struct Background {
    /// Local set driving the spawned [`Task`]s.
    set: task::LocalSet,

    /// Names and handles of the spawned [`Task`]s.
    tasks: Vec<(&'static str, task::JoinHandle<Result<(), BoxError>>)>,
}

impl Background {
    /// Spawns a new [`Task`] with the provided name inside this
    /// [`Background`] environment.
    pub fn spawn<F, E>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: StdError + 'static,
    {
        let handle = self.set.spawn_local(async move {
            log::debug!("`{name}` background task started");
            let res = future.await;
            if res.is_ok() {
                log::info!("`{name}` background task finished");
            }
            res.map_err(|e| -> BoxError { Box::new(e) })
        });
        self.tasks.push((name, handle));
    }

    /// Returns the number of [`Task`]s spawned in this [`Background`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Indicates whether no [`Task`] is spawned in this [`Background`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl IntoFuture for Background {
    type Output = Result<(), Failure>;
    type IntoFuture = LocalBoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { set, tasks } = self;
        let joined = tasks.into_iter().map(|(task, handle)| {
            handle
                .map(move |res| match res {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(cause)) => Err(Failure { task, cause }),
                    Err(e) => Err(Failure {
                        task,
                        cause: Box::new(e),
                    }),
                })
                .boxed_local()
        });
        async move {
            let driven = set.map(Ok).boxed_local();
            future::try_join_all(std::iter::once(driven).chain(joined))
                .await
                .map(drop)
        }
        .boxed_local()
    }
}

/// Failure of a [`Task`] running in a [`Background`] environment.
#[derive(Debug, Display, Error)]
#[display("`{task}` background task failed: {cause}")]
pub struct Failure {
    /// Name of the failed [`Task`].
    task: &'static str,

    /// Error the [`Task`] failed with.
    #[error(not(source))]
    cause: BoxError,
}

#[cfg(test)]
mod spec {
    use std::future::IntoFuture as _;

    use derive_more::{Display, Error};

    use super::Background;

    #[derive(Debug, Display, Error)]
    #[display("boom")]
    struct Boom;

    #[tokio::test]
    async fn resolves_once_all_tasks_finish() {
        let mut bg = Background::default();
        bg.spawn("first", async { Ok::<_, Boom>(()) });
        bg.spawn("second", async { Ok::<_, Boom>(()) });
        assert_eq!(bg.len(), 2);

        assert!(bg.into_future().await.is_ok());
    }

    #[tokio::test]
    async fn reports_failed_task() {
        let mut bg = Background::default();
        bg.spawn("healthy", async { Ok::<_, Boom>(()) });
        bg.spawn("failing", async { Err(Boom) });

        let err = bg.into_future().await.unwrap_err();

        assert_eq!(err.to_string(), "`failing` background task failed: boom");
    }
}
