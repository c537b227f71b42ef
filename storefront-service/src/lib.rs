pub mod api;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod identifiers;
pub mod models;
pub mod schema;

use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations};

pub type DbPool = Pool<AsyncPgConnection>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");
