#[macro_use]
extern crate rocket;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;
#[macro_use]
extern crate diesel;

pub(crate) mod types;
pub(crate) mod util;
pub mod acme;
pub mod pki;
pub mod validator;

#[rocket_sync_db_pools::database("db")]
pub struct DBConn(pub diesel::PgConnection);
