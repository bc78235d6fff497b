//! [`Query`] collection related to a single [`Sale`].

use common::operations::By;

use crate::domain::{sale, Sale};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries a [`Sale`] by its [`sale::Id`].
pub type ById = DatabaseQuery<By<Option<Sale>, sale::Id>>;

/// Queries a [`Sale`] by its [`sale::Reference`] number.
pub type ByReference = DatabaseQuery<By<Option<Sale>, sale::Reference>>;
