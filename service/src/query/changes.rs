//! [`Changes`] [`Query`].

use common::operations::Subscribe;
use futures::stream::BoxStream;

use crate::{
    infra::{
        fanout::{Channel, Signal},
        Fanout,
    },
    Service,
};

use super::Query;

/// [`Query`] subscribing to [`Signal`]s about changes of the data behind the
/// provided [`Channel`]s.
///
/// Only [`Signal`]s published after subscribing are received. Dropping the
/// returned stream unsubscribes.
#[derive(Clone, Debug)]
pub struct Changes {
    /// [`Channel`]s to listen to.
    pub channels: Vec<Channel>,
}

impl<Db, Bus> Query<Changes> for Service<Db, Bus>
where
    Bus: Fanout<Subscribe<Vec<Channel>>, Ok = BoxStream<'static, Signal>>,
{
    type Ok = BoxStream<'static, Signal>;
    type Err = Bus::Err;

    async fn execute(&self, query: Changes) -> Result<Self::Ok, Self::Err> {
        self.fanout().execute(Subscribe(query.channels)).await
    }
}
