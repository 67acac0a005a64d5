use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};

/// All four surfaces funnel through one pool; sized for the handful of
/// concurrent staff sessions a restaurant produces, not for fan-out.
const POOL_MAX_CONNECTIONS: u32 = 16;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn create_pool(database_url: &str) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(POOL_MAX_CONNECTIONS)
        .build(manager)
        .expect("Failed to create database connection pool")
}
