mod memory;
#[cfg(feature = "sqlite")]
mod prepare_env;

pub use memory::{MemoryDatabase, MemoryDatabaseError, RecordedRefund, ScriptedGateway};
#[cfg(feature = "sqlite")]
pub use prepare_env::{create_database, prepare_test_env, random_db_path, run_migrations};
