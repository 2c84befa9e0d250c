pub(crate) mod attempt_lifecycle;
pub(crate) mod attempt_timing;
pub(crate) mod grading;
pub(crate) mod question_contract;
pub(crate) mod question_generation;
pub(crate) mod weak_topics;
