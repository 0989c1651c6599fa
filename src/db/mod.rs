mod schema;
mod store;

pub use store::{ArticleStore, DEFAULT_EXPIRY_HOURS};
