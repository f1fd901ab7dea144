use crate::{Meter, MeterId};
use std::sync::Arc;

pub trait Registry {
    /// Find a live [`Meter`] registered under the provided id
    fn find_meter(&self, id: MeterId) -> Option<Arc<Meter>>;
    /// Ids of every meter that is still alive
    fn meter_ids(&self) -> Vec<MeterId>;
}
