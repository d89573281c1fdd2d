pub mod query_handlers;
pub mod story_session;
