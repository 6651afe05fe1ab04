pub mod listings;
pub mod matches;
pub mod migrations;
pub mod pool;
pub mod profiles;
pub mod util;

pub use listings::PgListingStore;
pub use matches::PgMatchStore;
pub use migrations::{MigrationError, run_migrations};
pub use pool::{DbPoolError, PgPool, PoolSettings, create_pool};
pub use profiles::PgProfileStore;
