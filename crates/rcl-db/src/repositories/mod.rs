// All repository functions are generic over `E: Executor<'e, Database = Postgres>`
// so they accept both a `&PgPool` (direct query) and a `&mut Transaction` (atomic operations).
//
// Every lookup of user-owned data filters on `user_id`, so a row owned by someone
// else is indistinguishable from a missing row.

pub mod card;
pub mod category;
pub mod deck;
pub mod quiz;
pub mod session;
pub mod user;
