pub mod create_breed;
pub mod create_superuser;
pub mod flush_expired_tokens;
pub mod initdb;
pub mod migrate_and_serve;
pub mod serve;

pub use create_breed::create_breed;
pub use create_superuser::create_superuser;
pub use flush_expired_tokens::flush_expired_tokens;
pub use initdb::init_database;
pub use migrate_and_serve::migrate_and_serve;
pub use serve::serve;
