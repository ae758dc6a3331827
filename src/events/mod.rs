pub(crate) mod bus;
pub(crate) mod event;
