#[macro_use]
extern crate rocket;
#[macro_use]
extern crate log;

#[launch]
fn rocket() -> _ {
    pretty_env_logger::init();
    info!("Hagall ACME server version {} starting up...", env!("CARGO_PKG_VERSION"));

    rocket::build()
        .attach(hagall::acme::ConfigFairing())
        .attach(hagall::DBConn::fairing())
        .attach(hagall::acme::DBMigrationFairing())
        .attach(rocket::fairing::AdHoc::on_ignite("Nonce store", |rocket| async move {
            let nonces: hagall::acme::replay::SharedNonces =
                std::sync::Arc::new(hagall::acme::replay::MemoryNonceStore::new());
            rocket.manage(nonces)
        }))
        .attach(rocket::fairing::AdHoc::on_ignite("Challenge validator", |rocket| async move {
            let validator: hagall::validator::SharedValidator =
                std::sync::Arc::new(hagall::validator::StaticValidator);
            rocket.manage(validator)
        }))
        .attach(rocket::fairing::AdHoc::on_liftoff("Nonce sweeper", |rocket| Box::pin(async move {
            let nonces = rocket.state::<hagall::acme::replay::SharedNonces>()
                .expect("nonce store not configured");
            hagall::acme::replay::start_sweeper(nonces.clone());
        })))
        .register("/", catchers![
            hagall::acme::acme_400,
            hagall::acme::acme_401,
            hagall::acme::acme_404,
            hagall::acme::acme_405,
            hagall::acme::acme_415,
            hagall::acme::acme_422,
            hagall::acme::acme_500,
        ])
        .mount("/", routes![
            hagall::acme::health,
            hagall::acme::directory,
            hagall::acme::directory_post,
            hagall::acme::new_nonce,
            hagall::acme::new_nonce_post,
            hagall::acme::new_account,
            hagall::acme::new_account_post,
            hagall::acme::account,
            hagall::acme::account_post,
            hagall::acme::account_orders,
            hagall::acme::account_orders_post,
            hagall::acme::key_change,
            hagall::acme::key_change_post,
            hagall::acme::account_key_change_post,
            hagall::acme::new_order,
            hagall::acme::new_order_post,
            hagall::acme::order,
            hagall::acme::order_post,
            hagall::acme::order_finalize,
            hagall::acme::order_finalize_post,
            hagall::acme::authorization,
            hagall::acme::authorization_post,
            hagall::acme::challenge,
            hagall::acme::challenge_post,
            hagall::acme::certificate,
            hagall::acme::certificate_post,
            hagall::acme::revoke,
            hagall::acme::revoke_post,
        ])
}
