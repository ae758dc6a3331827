pub(crate) mod snapshot;
pub(crate) mod store;
pub(crate) mod task;
