pub(crate) mod replay;
pub(crate) mod slide_session;
