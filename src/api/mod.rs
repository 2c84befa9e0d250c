pub(crate) mod analytics;
pub(crate) mod attempts;
pub(crate) mod errors;
pub(crate) mod exams;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod instructor;
pub(crate) mod router;
pub(crate) mod topics;
