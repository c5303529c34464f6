use diesel::prelude::*;
use chrono::prelude::*;
use base64::prelude::*;
use std::convert::TryInto;
use crate::{types, DBConn};

pub mod jws;
mod responses;
pub mod processing;
pub mod models;
mod schema;
pub mod replay;

pub type ACMEResult<I> = Result<I, types::error::Error>;

#[macro_export]
macro_rules! try_db_result {
    ($src:expr, $err:expr) => {
        (match ($src) {
            Ok(inner) => Ok(inner),
            Err(err) => {
                error!($err, err);
                Err(crate::internal_server_error!())
            }
        })
    }
}

#[macro_export]
macro_rules! internal_server_error {
    () => {
        crate::types::error::Error {
            error_type: crate::types::error::Type::ServerInternal,
            status: 500,
            title: String::from("Internal Server Error"),
            detail: "Something really went wrong there, we have no idea what it was".to_string(),
            sub_problems: vec ! [],
            instance: None,
            identifier: None,
        }
    }
}

macro_rules! try_result {
    ($src:expr, $nonces:expr, $base:expr) => {
        (match ($src) {
            Ok(inner) => inner,
            Err(err) => {
                return responses::ACMEResponse::problem(err, &$nonces, &$base).await;
            }
        })
    }
}

macro_rules! ensure_request_key_kid {
    ($src:expr, $nonces:expr, $base:expr) => {
        match $src {
            jws::JWSRequestKey::KID(k) => k,
            jws::JWSRequestKey::JWK { .. } => {
                return responses::ACMEResponse::problem(types::error::Error {
                    error_type: types::error::Type::Malformed,
                    status: 400,
                    title: "Bad request".to_string(),
                    detail: "'jwk' field cannot be used".to_string(),
                    sub_problems: vec![],
                    instance: None,
                    identifier: None,
                }, &$nonces, &$base).await;
            }
        }
    }
}

macro_rules! ensure_request_key_jwk {
    ($src:expr, $nonces:expr, $base:expr) => {
        match $src {
            jws::JWSRequestKey::KID(_) => {
                return responses::ACMEResponse::problem(types::error::Error {
                    error_type: types::error::Type::Malformed,
                    status: 400,
                    title: "Bad request".to_string(),
                    detail: "'kid' field cannot be used".to_string(),
                    sub_problems: vec![],
                    instance: None,
                    identifier: None,
                }, &$nonces, &$base).await;
            }
            jws::JWSRequestKey::JWK { jwk, key } => (jwk, key)
        }
    }
}

macro_rules! ensure_not_post_as_get {
    ($src:expr, $nonces:expr, $base:expr) => {
        match $src {
            Some(v) => v,
            None => {
                return responses::ACMEResponse::problem(types::error::Error {
                    error_type: types::error::Type::Malformed,
                    status: 405,
                    title: "Method not allowed".to_string(),
                    detail: "POST-as-GET is not allowed".to_string(),
                    sub_problems: vec![],
                    instance: None,
                    identifier: None,
                }, &$nonces, &$base).await;
            }
        }
    }
}

macro_rules! ensure_post_as_get {
    ($src:expr, $nonces:expr, $base:expr) => {
        match $src {
            None => {},
            Some(_) => {
                return responses::ACMEResponse::problem(types::error::Error {
                    error_type: types::error::Type::Malformed,
                    status: 405,
                    title: "Method not allowed".to_string(),
                    detail: "POST-as-GET is required".to_string(),
                    sub_problems: vec![],
                    instance: None,
                    identifier: None,
                }, &$nonces, &$base).await;
            }
        }
    }
}

const DIRECTORY_URI: &str = "/directory";
const NEW_NONCE_URI: &str = "/new-nonce";
const NEW_ACCOUNT_URI: &str = "/new-account";
const NEW_ORDER_URI: &str = "/new-order";
const REVOKE_CERT_URI: &str = "/revoke-cert";
const KEY_CHANGE_URI: &str = "/key-change";

#[derive(Debug)]
pub struct Account {
    inner: models::Account,
    key: openssl::pkey::PKey<openssl::pkey::Public>,
}

async fn lookup_account(account_id: &str, db: &DBConn) -> ACMEResult<Option<Account>> {
    let aid = account_id.to_string();
    let existing_account: Option<models::Account> = try_db_result!(db.run(move |c| {
        schema::accounts::dsl::accounts.filter(
            schema::accounts::dsl::id.eq(&aid)
        ).first::<models::Account>(c).optional()
    }).await, "Unable to search for account: {}")?;

    let existing_account = match existing_account {
        Some(v) => v,
        None => {
            return Ok(None);
        }
    };

    if existing_account.status == models::AccountStatus::Deactivated {
        return Err(types::error::Error {
            error_type: types::error::Type::Unauthorized,
            status: 401,
            title: "Unauthorized".to_string(),
            detail: format!("Account '{}' has been deactivated", account_id),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        });
    } else if existing_account.status == models::AccountStatus::Revoked {
        return Err(types::error::Error {
            error_type: types::error::Type::Unauthorized,
            status: 401,
            title: "Unauthorized".to_string(),
            detail: format!("Account '{}' has been revoked by the server", account_id),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        });
    }

    let jwk: types::jose::JWK = match serde_json::from_value(existing_account.key.clone()) {
        Ok(v) => v,
        Err(err) => {
            error!("Failed to decode account key from DB: {}", err);
            return Err(internal_server_error!());
        }
    };
    let pkey: openssl::pkey::PKey<openssl::pkey::Public> = match (&jwk).try_into() {
        Ok(v) => v,
        Err(err) => {
            error!("Failed to decode account key from DB: {}", err);
            return Err(internal_server_error!());
        }
    };

    Ok(Some(Account {
        inner: existing_account,
        key: pkey,
    }))
}

pub struct Config {
    tos_uri: Option<String>,
    website_uri: Option<String>,
    caa_identities: Vec<String>,
    serve_tls: bool,
}

pub struct ConfigFairing();

#[rocket::async_trait]
impl rocket::fairing::Fairing for ConfigFairing {
    fn info(&self) -> rocket::fairing::Info {
        rocket::fairing::Info {
            name: "Hagall config loader",
            kind: rocket::fairing::Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: rocket::Rocket<rocket::Build>) -> rocket::fairing::Result {
        let tos_uri = match rocket.figment().extract_inner::<String>("tos_uri") {
            Ok(v) => Some(v),
            Err(e) => {
                if let rocket::figment::error::Kind::MissingField(_) = e.kind {
                    None
                } else {
                    error!("Unable to load ToS URI from config: {}", e);
                    return Err(rocket);
                }
            }
        };
        let website_uri = match rocket.figment().extract_inner::<String>("website_uri") {
            Ok(v) => Some(v),
            Err(e) => {
                if let rocket::figment::error::Kind::MissingField(_) = e.kind {
                    None
                } else {
                    error!("Unable to load website URI from config: {}", e);
                    return Err(rocket);
                }
            }
        };
        let caa_identities = match rocket.figment().extract_inner::<Vec<String>>("caa_identities") {
            Ok(v) => v,
            Err(e) => {
                if let rocket::figment::error::Kind::MissingField(_) = e.kind {
                    vec![]
                } else {
                    error!("Unable to load CAA identities from config: {}", e);
                    return Err(rocket);
                }
            }
        };

        let ca_cert_file = match rocket.figment().extract_inner::<String>("ca_cert_file") {
            Ok(v) => v,
            Err(e) => {
                error!("Unable to load CA certificate path from config: {}", e);
                return Err(rocket);
            }
        };
        let ca_key_file = match rocket.figment().extract_inner::<String>("ca_key_file") {
            Ok(v) => v,
            Err(e) => {
                error!("Unable to load CA key path from config: {}", e);
                return Err(rocket);
            }
        };

        let issuer = match crate::pki::CaIssuer::from_files(&ca_cert_file, &ca_key_file) {
            Ok(v) => v,
            Err(e) => {
                error!("Unable to load CA material: {}", e);
                return Err(rocket);
            }
        };

        let serve_tls = rocket.figment().find_value("tls.certs").is_ok();

        Ok(rocket
            .manage(Config {
                tos_uri,
                website_uri,
                caa_identities,
                serve_tls,
            })
            .manage(issuer))
    }
}

pub const MIGRATIONS: diesel_migrations::EmbeddedMigrations = diesel_migrations::embed_migrations!("migrations");

pub struct DBMigrationFairing();

#[rocket::async_trait]
impl rocket::fairing::Fairing for DBMigrationFairing {
    fn info(&self) -> rocket::fairing::Info {
        rocket::fairing::Info {
            name: "DB Migration runner",
            kind: rocket::fairing::Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: rocket::Rocket<rocket::Build>) -> rocket::fairing::Result {
        let db_con = match DBConn::get_one(&rocket).await {
            Some(v) => v,
            None => {
                error!("Unable to get DB connection handle");
                return Err(rocket);
            }
        };

        if let Err(e) = db_con.run(|c| {
            use diesel_migrations::MigrationHarness;
            c.run_pending_migrations(MIGRATIONS)
                .map(|m| m.len())
                .map_err(|e| e.to_string())
        }).await {
            error!("Unable to run migrations: {}", e);
            return Err(rocket);
        }

        Ok(rocket)
    }
}

/// Per-request base URL derived from the inbound Host and scheme; every
/// absolute URL handed to clients starts from here.
pub struct BaseUrl(pub url::Url);

#[rocket::async_trait]
impl<'r> rocket::request::FromRequest<'r> for BaseUrl {
    type Error = types::error::Error;

    async fn from_request(request: &'r rocket::request::Request<'_>) -> rocket::request::Outcome<Self, Self::Error> {
        let conf = match request.guard::<&rocket::State<Config>>().await {
            rocket::request::Outcome::Success(v) => v,
            _ => {
                return rocket::request::Outcome::Error((rocket::http::Status::InternalServerError, internal_server_error!()));
            }
        };

        let host = match request.host() {
            Some(h) => h.to_string(),
            None => {
                return rocket::request::Outcome::Error((rocket::http::Status::BadRequest, types::error::Error {
                    error_type: types::error::Type::Malformed,
                    status: 400,
                    title: "No host".to_string(),
                    detail: "A Host header is required to be set".to_string(),
                    sub_problems: vec![],
                    instance: None,
                    identifier: None,
                }));
            }
        };

        let https = conf.serve_tls
            || request.headers().get_one("X-Forwarded-Proto") == Some("https");
        let scheme = if https { "https" } else { "http" };

        match url::Url::parse(&format!("{}://{}/", scheme, host)) {
            Ok(u) => rocket::request::Outcome::Success(BaseUrl(u)),
            Err(_) => rocket::request::Outcome::Error((rocket::http::Status::BadRequest, types::error::Error {
                error_type: types::error::Type::Malformed,
                status: 400,
                title: "Bad host".to_string(),
                detail: format!("'{}' is not a usable Host value", host),
                sub_problems: vec![],
                instance: None,
                identifier: None,
            }))
        }
    }
}

impl BaseUrl {
    fn join(&self, path: &str) -> String {
        self.0.join(path).map(|u| u.to_string()).unwrap_or_else(|_| path.to_string())
    }
}

#[allow(dead_code)]
pub struct ClientData {
    user_agent: String,
    accept_languages: Vec<String>,
    client_ip: Option<std::net::IpAddr>,
}

#[rocket::async_trait]
impl<'r> rocket::request::FromRequest<'r> for ClientData {
    type Error = types::error::Error;

    async fn from_request(request: &'r rocket::request::Request<'_>) -> rocket::request::Outcome<Self, Self::Error> {
        match request.headers().get_one("User-Agent") {
            Some(ua) => {
                let langs = match request.headers().get_one("Accept-Language") {
                    Some(l) => {
                        l.split(',').map(|l| {
                            let ls = l.trim().split_once(';');
                            let l = match ls {
                                None => l,
                                Some((lf, _)) => lf.trim()
                            };
                            l.to_string()
                        }).collect()
                    }
                    None => vec![]
                };
                rocket::request::Outcome::Success(ClientData {
                    user_agent: ua.to_string(),
                    accept_languages: langs,
                    client_ip: request.client_ip(),
                })
            }
            None => rocket::request::Outcome::Error((rocket::http::Status::BadRequest, types::error::Error {
                error_type: types::error::Type::Malformed,
                status: 400,
                title: "No User-Agent".to_string(),
                detail: "A User-Agent header is required to be set".to_string(),
                sub_problems: vec![],
                instance: None,
                identifier: None,
            }))
        }
    }
}

#[derive(Serialize)]
pub struct HealthStatus {
    status: &'static str,
}

#[get("/health")]
pub fn health() -> rocket::serde::json::Json<HealthStatus> {
    rocket::serde::json::Json(HealthStatus {
        status: "healthy",
    })
}

#[get("/directory")]
pub async fn directory(
    ua: ACMEResult<ClientData>,
    conf: &rocket::State<Config>,
    nonces: &rocket::State<replay::SharedNonces>,
    base: BaseUrl,
) -> responses::ACMEResponse<rocket::serde::json::Json<types::directory::Directory>> {
    try_result!(ua, nonces, base);

    responses::ACMEResponse::resource(rocket::serde::json::Json(types::directory::Directory {
        new_nonce: base.join(NEW_NONCE_URI),
        new_account: Some(base.join(NEW_ACCOUNT_URI)),
        new_order: Some(base.join(NEW_ORDER_URI)),
        revoke_cert: Some(base.join(REVOKE_CERT_URI)),
        key_change: Some(base.join(KEY_CHANGE_URI)),
        meta: Some(types::directory::Meta {
            terms_of_service: conf.tos_uri.clone(),
            website: conf.website_uri.clone(),
            caa_identities: conf.caa_identities.clone(),
            external_account_required: Some(false),
        }),
    }), rocket::http::Status::Ok, nonces, &base).await
}

#[post("/directory")]
pub fn directory_post() -> rocket::http::Status {
    rocket::http::Status::MethodNotAllowed
}

pub struct NonceResponse {}

impl<'r> rocket::response::Responder<'r, 'static> for NonceResponse {
    fn respond_to(self, _req: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        Ok(rocket::response::Response::build()
            .status(rocket::http::Status::NoContent)
            .raw_header("Cache-Control", "no-store")
            .finalize())
    }
}

#[get("/new-nonce")]
pub async fn new_nonce(
    nonces: &rocket::State<replay::SharedNonces>, base: BaseUrl,
) -> responses::ACMEResponse<NonceResponse> {
    responses::ACMEResponse::resource(
        NonceResponse {}, rocket::http::Status::NoContent, nonces, &base,
    ).await
}

#[post("/new-nonce")]
pub fn new_nonce_post() -> rocket::http::Status {
    rocket::http::Status::MethodNotAllowed
}

#[get("/new-account")]
pub fn new_account() -> rocket::http::Status {
    rocket::http::Status::MethodNotAllowed
}

#[post("/new-account", data = "<acct>")]
pub async fn new_account_post(
    ua: ACMEResult<ClientData>,
    acct: ACMEResult<jws::JWSRequest<types::account::AccountCreate>>,
    db: DBConn,
    nonces: &rocket::State<replay::SharedNonces>,
    base: BaseUrl,
) -> responses::ACMEResponse<rocket::serde::json::Json<types::account::Account>> {
    let ua = try_result!(ua, nonces, base);
    let acct = try_result!(acct, nonces, base);
    let (acct_jwk, _acct_key) = ensure_request_key_jwk!(acct.key, nonces, base);
    let payload = ensure_not_post_as_get!(acct.payload, nonces, base);

    let thumbprint = jws::make_jwk_thumbprint(&acct_jwk);

    let tp = thumbprint.clone();
    let existing_account: Option<models::Account> = try_result!(try_db_result!(db.run(move |c| {
        schema::accounts::dsl::accounts.filter(
            schema::accounts::dsl::key_thumbprint.eq(&tp)
        ).first::<models::Account>(c).optional()
    }).await, "Unable to search for existing account: {}"), nonces, base);

    if let Some(acct) = existing_account {
        let acct_obj = acct.to_json(&base.0);
        return responses::ACMEResponse::resource(
            rocket::serde::json::Json(acct_obj), rocket::http::Status::Ok, nonces, &base,
        ).await.with_location(base.join(&acct.kid()));
    }

    if payload.only_return_existing {
        return responses::ACMEResponse::problem(types::error::Error {
            error_type: types::error::Type::AccountDoesNotExist,
            status: 400,
            title: "Account does not exist".to_string(),
            detail: "Account with the provided key does not exist, and onlyReturnExisting field set".to_string(),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        }, nonces, &base).await;
    }

    if !payload.terms_of_service_agreed {
        return responses::ACMEResponse::problem(types::error::Error {
            error_type: types::error::Type::UserActionRequired,
            status: 400,
            title: "User action required".to_string(),
            detail: "Terms of Service must be agreed to".to_string(),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        }, nonces, &base).await;
    }

    try_result!(models::parse_contacts(
        &payload.contact.iter().map(|c| c.as_ref()).collect::<Vec<_>>()
    ), nonces, base);

    let now = Utc::now();
    let account = models::Account {
        id: crate::util::new_id("acct"),
        key: try_result!(
            serde_json::to_value(&acct_jwk).map_err(|_| internal_server_error!()),
            nonces, base
        ),
        key_thumbprint: thumbprint,
        contact: try_result!(
            serde_json::to_value(&payload.contact).map_err(|_| internal_server_error!()),
            nonces, base
        ),
        status: models::AccountStatus::Valid,
        terms_agreed: true,
        created_at: now,
        initial_ip: ua.client_ip.map(|ip| ip.to_string()).unwrap_or_default(),
    };

    let account: models::Account = try_result!(try_db_result!(db.run(move |c| {
        diesel::insert_into(schema::accounts::dsl::accounts)
            .values(&account)
            .get_result(c)
    }).await, "Unable to save account to database: {}"), nonces, base);

    let acct_obj = account.to_json(&base.0);
    responses::ACMEResponse::resource(
        rocket::serde::json::Json(acct_obj), rocket::http::Status::Created, nonces, &base,
    ).await.with_location(base.join(&account.kid()))
}

fn check_account(aid: &str, account: &Account) -> ACMEResult<()> {
    if aid != account.inner.id {
        return Err(types::error::Error {
            error_type: types::error::Type::Unauthorized,
            status: 401,
            title: "Unauthorized".to_string(),
            detail: "Signing key does not match account URL".to_string(),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        });
    }

    Ok(())
}

#[get("/account/<_aid>")]
pub fn account(_aid: String) -> rocket::http::Status {
    rocket::http::Status::MethodNotAllowed
}

#[post("/account/<aid>", data = "<acct>")]
pub async fn account_post(
    ua: ACMEResult<ClientData>,
    acct: ACMEResult<jws::JWSRequest<types::account::AccountUpdate>>,
    db: DBConn,
    nonces: &rocket::State<replay::SharedNonces>,
    base: BaseUrl,
    aid: String,
) -> responses::ACMEResponse<rocket::serde::json::Json<types::account::Account>> {
    try_result!(ua, nonces, base);
    let acct = try_result!(acct, nonces, base);
    let acct_key = ensure_request_key_kid!(acct.key, nonces, base);
    try_result!(check_account(&aid, &acct_key), nonces, base);

    let payload = match acct.payload {
        Some(v) => v,
        None => {
            let acct_obj = acct_key.inner.to_json(&base.0);
            return responses::ACMEResponse::resource(
                rocket::serde::json::Json(acct_obj), rocket::http::Status::Ok, nonces, &base,
            ).await;
        }
    };

    if payload.status.is_some() {
        // deactivation is surfaced as an extension point only
        return responses::ACMEResponse::problem(types::error::Error {
            error_type: types::error::Type::Malformed,
            status: 400,
            title: "Update not allowed".to_string(),
            detail: "Account status changes are not supported".to_string(),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        }, nonces, &base).await;
    }

    if let Some(new_contacts) = payload.contact {
        try_result!(models::parse_contacts(
            &new_contacts.iter().map(|c| c.as_ref()).collect::<Vec<_>>()
        ), nonces, base);

        let contact_value = try_result!(
            serde_json::to_value(&new_contacts).map_err(|_| internal_server_error!()),
            nonces, base
        );
        let acct_id = acct_key.inner.id.clone();
        let updated: models::Account = try_result!(try_db_result!(db.run(move |c| {
            diesel::update(schema::accounts::dsl::accounts.filter(schema::accounts::dsl::id.eq(&acct_id)))
                .set(schema::accounts::dsl::contact.eq(&contact_value))
                .get_result(c)
        }).await, "Unable to update account: {}"), nonces, base);

        let acct_obj = updated.to_json(&base.0);
        return responses::ACMEResponse::resource(
            rocket::serde::json::Json(acct_obj), rocket::http::Status::Ok, nonces, &base,
        ).await;
    }

    let acct_obj = acct_key.inner.to_json(&base.0);
    responses::ACMEResponse::resource(
        rocket::serde::json::Json(acct_obj), rocket::http::Status::Ok, nonces, &base,
    ).await
}

#[get("/account/<_aid>/orders")]
pub fn account_orders(_aid: String) -> rocket::http::Status {
    rocket::http::Status::MethodNotAllowed
}

#[post("/account/<aid>/orders", data = "<acct>")]
pub async fn account_orders_post(
    ua: ACMEResult<ClientData>,
    acct: ACMEResult<jws::JWSRequest<()>>,
    db: DBConn,
    nonces: &rocket::State<replay::SharedNonces>,
    base: BaseUrl,
    aid: String,
) -> responses::ACMEResponse<rocket::serde::json::Json<types::order::List>> {
    try_result!(ua, nonces, base);
    let acct = try_result!(acct, nonces, base);
    let acct_key = ensure_request_key_kid!(acct.key, nonces, base);
    ensure_post_as_get!(acct.payload, nonces, base);
    try_result!(check_account(&aid, &acct_key), nonces, base);

    let acct_id = acct_key.inner.id.clone();
    let account_orders: Vec<models::Order> = try_result!(try_db_result!(db.run(move |c| {
        schema::orders::dsl::orders.filter(
            schema::orders::dsl::account_id.eq(&acct_id)
        ).load(c)
    }).await, "Failed to get account orders: {}"), nonces, base);

    let list_obj = types::order::List {
        orders: account_orders.into_iter().map(|o| base.join(&o.url())).collect()
    };

    responses::ACMEResponse::resource(
        rocket::serde::json::Json(list_obj), rocket::http::Status::Ok, nonces, &base,
    ).await
}

fn key_change_unsupported() -> types::error::Error {
    types::error::Error {
        error_type: types::error::Type::Malformed,
        status: 501,
        title: "Not implemented".to_string(),
        detail: "Account key changes are not supported".to_string(),
        sub_problems: vec![],
        instance: None,
        identifier: None,
    }
}

#[get("/key-change")]
pub fn key_change() -> rocket::http::Status {
    rocket::http::Status::MethodNotAllowed
}

#[post("/key-change", data = "<acct>")]
pub async fn key_change_post(
    ua: ACMEResult<ClientData>,
    acct: ACMEResult<jws::JWSRequest<serde_json::Value>>,
    nonces: &rocket::State<replay::SharedNonces>,
    base: BaseUrl,
) -> responses::ACMEResponse<()> {
    try_result!(ua, nonces, base);
    let acct = try_result!(acct, nonces, base);
    ensure_request_key_kid!(acct.key, nonces, base);

    responses::ACMEResponse::problem(key_change_unsupported(), nonces, &base).await
}

#[post("/account/<_aid>/key-change", data = "<acct>")]
pub async fn account_key_change_post(
    ua: ACMEResult<ClientData>,
    acct: ACMEResult<jws::JWSRequest<serde_json::Value>>,
    nonces: &rocket::State<replay::SharedNonces>,
    base: BaseUrl,
    _aid: String,
) -> responses::ACMEResponse<()> {
    try_result!(ua, nonces, base);
    let acct = try_result!(acct, nonces, base);
    ensure_request_key_kid!(acct.key, nonces, base);

    responses::ACMEResponse::problem(key_change_unsupported(), nonces, &base).await
}

#[get("/new-order")]
pub fn new_order() -> rocket::http::Status {
    rocket::http::Status::MethodNotAllowed
}

#[post("/new-order", data = "<order>")]
pub async fn new_order_post(
    ua: ACMEResult<ClientData>,
    order: ACMEResult<jws::JWSRequest<types::order::OrderCreate>>,
    db: DBConn,
    nonces: &rocket::State<replay::SharedNonces>,
    base: BaseUrl,
) -> responses::ACMEResponse<rocket::serde::json::Json<types::order::Order>> {
    try_result!(ua, nonces, base);
    let order = try_result!(order, nonces, base);
    let acct_key = ensure_request_key_kid!(order.key, nonces, base);
    let payload = ensure_not_post_as_get!(order.payload, nonces, base);

    let db_order = try_result!(processing::create_order(&db, &payload, &acct_key).await, nonces, base);

    let order_obj = try_result!(db_order.to_json(&db, &base.0).await, nonces, base);
    responses::ACMEResponse::resource(
        rocket::serde::json::Json(order_obj), rocket::http::Status::Created, nonces, &base,
    ).await.with_location(base.join(&db_order.url()))
}

async fn get_order(oid: &str, db: &DBConn, account: Option<&Account>) -> ACMEResult<models::Order> {
    let oid_owned = oid.to_string();
    let existing_order: models::Order = match try_db_result!(db.run(move |c| {
        schema::orders::dsl::orders.filter(
            schema::orders::dsl::id.eq(&oid_owned)
        ).first::<models::Order>(c).optional()
    }).await, "Unable to search for order: {}")? {
        Some(o) => o,
        None => return Err(types::error::Error {
            error_type: types::error::Type::Malformed,
            status: 404,
            title: "Not found".to_string(),
            detail: format!("Order ID {} does not exist", oid),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        })
    };

    if let Some(account) = account {
        if existing_order.account_id != account.inner.id {
            return Err(types::error::Error {
                error_type: types::error::Type::Unauthorized,
                status: 401,
                title: "Unauthorized".to_string(),
                detail: format!("Order ID {} does not belong to the account", oid),
                sub_problems: vec![],
                instance: None,
                identifier: None,
            });
        }
    }

    Ok(existing_order)
}

#[get("/order/<oid>")]
pub async fn order(
    ua: ACMEResult<ClientData>,
    db: DBConn,
    nonces: &rocket::State<replay::SharedNonces>,
    base: BaseUrl,
    oid: String,
) -> responses::ACMEResponse<rocket::serde::json::Json<types::order::Order>> {
    try_result!(ua, nonces, base);

    let existing_order = try_result!(get_order(&oid, &db, None).await, nonces, base);
    let existing_order = try_result!(processing::refresh_order_status(&db, existing_order).await, nonces, base);

    let order_obj = try_result!(existing_order.to_json(&db, &base.0).await, nonces, base);
    responses::ACMEResponse::resource(
        rocket::serde::json::Json(order_obj), rocket::http::Status::Ok, nonces, &base,
    ).await
}

#[post("/order/<oid>", data = "<order>")]
pub async fn order_post(
    ua: ACMEResult<ClientData>,
    order: ACMEResult<jws::JWSRequest<()>>,
    db: DBConn,
    nonces: &rocket::State<replay::SharedNonces>,
    base: BaseUrl,
    oid: String,
) -> responses::ACMEResponse<rocket::serde::json::Json<types::order::Order>> {
    try_result!(ua, nonces, base);
    let order = try_result!(order, nonces, base);
    let acct_key = ensure_request_key_kid!(order.key, nonces, base);
    ensure_post_as_get!(order.payload, nonces, base);

    let existing_order = try_result!(get_order(&oid, &db, Some(&acct_key)).await, nonces, base);
    let existing_order = try_result!(processing::refresh_order_status(&db, existing_order).await, nonces, base);

    let order_obj = try_result!(existing_order.to_json(&db, &base.0).await, nonces, base);
    responses::ACMEResponse::resource(
        rocket::serde::json::Json(order_obj), rocket::http::Status::Ok, nonces, &base,
    ).await
}

#[get("/order/<_oid>/finalize")]
pub fn order_finalize(_oid: String) -> rocket::http::Status {
    rocket::http::Status::MethodNotAllowed
}

#[post("/order/<oid>/finalize", data = "<order>")]
pub async fn order_finalize_post(
    ua: ACMEResult<ClientData>,
    order: ACMEResult<jws::JWSRequest<types::order::OrderFinalize>>,
    db: DBConn,
    nonces: &rocket::State<replay::SharedNonces>,
    base: BaseUrl,
    oid: String,
    issuer: &rocket::State<crate::pki::CaIssuer>,
) -> responses::ACMEResponse<rocket::serde::json::Json<types::order::Order>> {
    try_result!(ua, nonces, base);
    let order = try_result!(order, nonces, base);
    let acct_key = ensure_request_key_kid!(order.key, nonces, base);
    let order_finalize = ensure_not_post_as_get!(order.payload, nonces, base);

    let existing_order = try_result!(get_order(&oid, &db, Some(&acct_key)).await, nonces, base);

    let csr = match BASE64_URL_SAFE_NO_PAD.decode(&order_finalize.csr) {
        Ok(c) => c,
        Err(_) => {
            return responses::ACMEResponse::problem(types::error::Error {
                error_type: types::error::Type::Malformed,
                status: 400,
                title: "Bad CSR".to_string(),
                detail: "Invalid Base64 encoding for the CSR".to_string(),
                sub_problems: vec![],
                instance: None,
                identifier: None,
            }, nonces, &base).await;
        }
    };

    let (db_order, _cert) = try_result!(
        processing::finalize_order(&db, issuer.inner(), existing_order, csr).await, nonces, base);

    let order_obj = try_result!(db_order.to_json(&db, &base.0).await, nonces, base);
    responses::ACMEResponse::resource(
        rocket::serde::json::Json(order_obj), rocket::http::Status::Ok, nonces, &base,
    ).await
}

async fn get_authz(aid: &str, db: &DBConn, account: Option<&Account>) -> ACMEResult<models::Authorization> {
    let aid_owned = aid.to_string();
    let existing_authz: models::Authorization = match try_db_result!(db.run(move |c| {
        schema::authorizations::dsl::authorizations.filter(
            schema::authorizations::dsl::id.eq(&aid_owned)
        ).first::<models::Authorization>(c).optional()
    }).await, "Unable to search for authorization: {}")? {
        Some(a) => a,
        None => return Err(types::error::Error {
            error_type: types::error::Type::AuthorizationNotFound,
            status: 404,
            title: "Not found".to_string(),
            detail: format!("Authorization ID {} does not exist", aid),
            sub_problems: vec![],
            instance: None,
            identifier: None,
        })
    };

    if let Some(account) = account {
        let order = get_order(&existing_authz.order_id, db, None).await?;
        if order.account_id != account.inner.id {
            return Err(types::error::Error {
                error_type: types::error::Type::Unauthorized,
                status: 401,
                title: "Unauthorized".to_string(),
                detail: format!("Authorization ID {} does not belong to the account", aid),
                sub_problems: vec![],
                instance: None,
                identifier: None,
            });
        }
    }

    Ok(existing_authz)
}

#[get("/authz/<aid>")]
pub async fn authorization(
    ua: ACMEResult<ClientData>,
    db: DBConn,
    nonces: &rocket::State<replay::SharedNonces>,
    base: BaseUrl,
    aid: String,
) -> responses::ACMEResponse<rocket::serde::json::Json<types::authorization::Authorization>> {
    try_result!(ua, nonces, base);

    let existing_authz = try_result!(get_authz(&aid, &db, None).await, nonces, base);
    let existing_authz = try_result!(processing::refresh_authz_status(&db, existing_authz).await, nonces, base);

    let authz_obj = try_result!(existing_authz.to_json(&db, &base.0).await, nonces, base);
    responses::ACMEResponse::resource(
        rocket::serde::json::Json(authz_obj), rocket::http::Status::Ok, nonces, &base,
    ).await
}

#[post("/authz/<aid>", data = "<authz>")]
pub async fn authorization_post(
    ua: ACMEResult<ClientData>,
    authz: ACMEResult<jws::JWSRequest<types::authorization::AuthorizationUpdate>>,
    db: DBConn,
    nonces: &rocket::State<replay::SharedNonces>,
    base: BaseUrl,
    aid: String,
) -> responses::ACMEResponse<rocket::serde::json::Json<types::authorization::Authorization>> {
    try_result!(ua, nonces, base);
    let authz = try_result!(authz, nonces, base);
    let acct_key = ensure_request_key_kid!(authz.key, nonces, base);

    let existing_authz = try_result!(get_authz(&aid, &db, Some(&acct_key)).await, nonces, base);
    let existing_authz = try_result!(processing::refresh_authz_status(&db, existing_authz).await, nonces, base);

    let existing_authz = match authz.payload {
        None => existing_authz,
        Some(authz_update) => match authz_update.status {
            Some(types::authorization::Status::Deactivated) => {
                // pending and valid authorizations may be handed back
                if !matches!(existing_authz.status,
                    models::AuthorizationStatus::Pending | models::AuthorizationStatus::Valid) {
                    return responses::ACMEResponse::problem(types::error::Error {
                        error_type: types::error::Type::Malformed,
                        status: 400,
                        title: "Update not allowed".to_string(),
                        detail: "The authorization can no longer be deactivated".to_string(),
                        sub_problems: vec![],
                        instance: None,
                        identifier: None,
                    }, nonces, &base).await;
                }
                let aid = existing_authz.id.clone();
                let now = Utc::now();
                try_result!(try_db_result!(db.run(move |c| {
                    diesel::update(schema::authorizations::dsl::authorizations.filter(schema::authorizations::dsl::id.eq(&aid)))
                        .set((
                            schema::authorizations::dsl::status.eq(models::AuthorizationStatus::Deactivated),
                            schema::authorizations::dsl::updated_at.eq(now),
                        ))
                        .get_result::<models::Authorization>(c)
                }).await, "Unable to deactivate authorization: {}"), nonces, base)
            }
            _ => {
                return responses::ACMEResponse::problem(types::error::Error {
                    error_type: types::error::Type::Malformed,
                    status: 400,
                    title: "Update not allowed".to_string(),
                    detail: "'status' can only be set to 'deactivated'".to_string(),
                    sub_problems: vec![],
                    instance: None,
                    identifier: None,
                }, nonces, &base).await;
            }
        }
    };

    let authz_obj = try_result!(existing_authz.to_json(&db, &base.0).await, nonces, base);
    responses::ACMEResponse::resource(
        rocket::serde::json::Json(authz_obj), rocket::http::Status::Ok, nonces, &base,
    ).await
}

#[get("/challenge/<_token>")]
pub fn challenge(_token: String) -> rocket::http::Status {
    rocket::http::Status::MethodNotAllowed
}

#[post("/challenge/<token>", data = "<chall>")]
pub async fn challenge_post(
    ua: ACMEResult<ClientData>,
    chall: ACMEResult<jws::JWSRequest<types::challenge::ChallengeRespond>>,
    db: DBConn,
    nonces: &rocket::State<replay::SharedNonces>,
    base: BaseUrl,
    token: String,
    validator: &rocket::State<crate::validator::SharedValidator>,
) -> responses::ACMEResponse<rocket::serde::json::Json<types::challenge::Challenge>> {
    try_result!(ua, nonces, base);
    let chall = try_result!(chall, nonces, base);
    let acct_key = ensure_request_key_kid!(chall.key, nonces, base);

    // the random token is the challenge's external key
    let token_owned = token.clone();
    let existing_chall: models::Challenge = match try_result!(try_db_result!(db.run(move |c| {
        schema::challenges::dsl::challenges.filter(
            schema::challenges::dsl::token.eq(&token_owned)
        ).first::<models::Challenge>(c).optional()
    }).await, "Unable to search for challenge: {}"), nonces, base) {
        Some(c) => c,
        None => {
            return responses::ACMEResponse::problem(types::error::Error {
                error_type: types::error::Type::ChallengeNotFound,
                status: 404,
                title: "Not found".to_string(),
                detail: format!("Challenge {} does not exist", token),
                sub_problems: vec![],
                instance: None,
                identifier: None,
            }, nonces, &base).await;
        }
    };

    let existing_authz = try_result!(
        get_authz(&existing_chall.authorization_id, &db, Some(&acct_key)).await, nonces, base);

    let chall_obj = match chall.payload {
        None => existing_chall,
        Some(_) => try_result!(processing::respond_to_challenge(
            &db, validator.inner(), existing_chall, existing_authz.clone(),
            acct_key.inner.key_thumbprint.clone(),
        ).await, nonces, base),
    };

    responses::ACMEResponse::resource(
        rocket::serde::json::Json(chall_obj.to_json(&base.0)), rocket::http::Status::Ok, nonces, &base,
    ).await.with_link(base.join(&existing_authz.url()), "up")
}

pub struct CertificateResponse {
    body: Vec<u8>,
}

impl<'r> rocket::response::Responder<'r, 'static> for CertificateResponse {
    fn respond_to(self, _req: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        Ok(rocket::response::Response::build()
            .raw_header("Content-Type", "application/pem-certificate-chain")
            .sized_body(self.body.len(), std::io::Cursor::new(self.body))
            .finalize())
    }
}

#[get("/cert/<_cid>")]
pub fn certificate(_cid: String) -> rocket::http::Status {
    rocket::http::Status::MethodNotAllowed
}

#[post("/cert/<cid>", data = "<cert>")]
pub async fn certificate_post(
    ua: ACMEResult<ClientData>,
    cert: ACMEResult<jws::JWSRequest<()>>,
    db: DBConn,
    nonces: &rocket::State<replay::SharedNonces>,
    base: BaseUrl,
    cid: String,
) -> responses::ACMEResponse<CertificateResponse> {
    try_result!(ua, nonces, base);
    let cert = try_result!(cert, nonces, base);
    let acct_key = ensure_request_key_kid!(cert.key, nonces, base);
    ensure_post_as_get!(cert.payload, nonces, base);

    let cid_owned = cid.clone();
    let existing_cert: models::Certificate = match try_result!(try_db_result!(db.run(move |c| {
        schema::certificates::dsl::certificates.filter(
            schema::certificates::dsl::id.eq(&cid_owned)
        ).first::<models::Certificate>(c).optional()
    }).await, "Unable to search for certificate: {}"), nonces, base) {
        Some(c) => c,
        None => {
            return responses::ACMEResponse::problem(types::error::Error {
                error_type: types::error::Type::Malformed,
                status: 404,
                title: "Not found".to_string(),
                detail: format!("Certificate ID {} does not exist", cid),
                sub_problems: vec![],
                instance: None,
                identifier: None,
            }, nonces, &base).await;
        }
    };

    // only the account that ordered the certificate may download it
    let order = try_result!(get_order(&existing_cert.order_id, &db, Some(&acct_key)).await, nonces, base);
    debug!("Serving certificate {} for order {}", existing_cert.id, order.id);

    responses::ACMEResponse::resource(
        CertificateResponse {
            body: existing_cert.certificate.into_bytes(),
        }, rocket::http::Status::Ok, nonces, &base,
    ).await
}

#[get("/revoke-cert")]
pub fn revoke() -> rocket::http::Status {
    rocket::http::Status::MethodNotAllowed
}

#[post("/revoke-cert", data = "<revoke>")]
pub async fn revoke_post(
    ua: ACMEResult<ClientData>,
    revoke: ACMEResult<jws::JWSRequest<types::revoke::RevokeCert>>,
    db: DBConn,
    nonces: &rocket::State<replay::SharedNonces>,
    base: BaseUrl,
) -> responses::ACMEResponse<()> {
    try_result!(ua, nonces, base);
    let revoke = try_result!(revoke, nonces, base);
    let revoke_cert = ensure_not_post_as_get!(revoke.payload, nonces, base);

    let cert_bytes = match BASE64_URL_SAFE_NO_PAD.decode(&revoke_cert.certificate) {
        Ok(c) => c,
        Err(_) => {
            return responses::ACMEResponse::problem(types::error::Error {
                error_type: types::error::Type::Malformed,
                status: 400,
                title: "Bad certificate".to_string(),
                detail: "Invalid Base64 encoding for the certificate".to_string(),
                sub_problems: vec![],
                instance: None,
                identifier: None,
            }, nonces, &base).await;
        }
    };
    let cert = match openssl::x509::X509::from_der(&cert_bytes) {
        Ok(c) => c,
        Err(_) => {
            return responses::ACMEResponse::problem(types::error::Error {
                error_type: types::error::Type::Malformed,
                status: 400,
                title: "Bad certificate".to_string(),
                detail: "Un-parsable certificate".to_string(),
                sub_problems: vec![],
                instance: None,
                identifier: None,
            }, nonces, &base).await;
        }
    };

    let not_ours = || types::error::Error {
        error_type: types::error::Type::Unauthorized,
        status: 401,
        title: "Unauthorized".to_string(),
        detail: "This server did not issue the certificate requested to be revoked".to_string(),
        sub_problems: vec![],
        instance: None,
        identifier: None,
    };

    let serial = match cert.serial_number().to_bn().map(|b| b.to_vec()) {
        Ok(s) => s,
        Err(_) => {
            return responses::ACMEResponse::problem(not_ours(), nonces, &base).await;
        }
    };
    // issued serials are the certificate row ID's 16 bytes with a nonzero
    // leading byte, so a shorter magnitude here is a foreign certificate,
    // not a value to zero-pad
    let cert_id = match processing::certificate_id_from_serial(&serial) {
        Some(v) => v,
        None => {
            return responses::ACMEResponse::problem(not_ours(), nonces, &base).await;
        }
    };

    let cid = cert_id.clone();
    let existing_cert: models::Certificate = match try_result!(try_db_result!(db.run(move |c| {
        schema::certificates::dsl::certificates.filter(
            schema::certificates::dsl::id.eq(&cid)
        ).first::<models::Certificate>(c).optional()
    }).await, "Unable to search for certificate: {}"), nonces, base) {
        Some(c) => c,
        None => {
            return responses::ACMEResponse::problem(not_ours(), nonces, &base).await;
        }
    };

    // the presented certificate must be the stored leaf byte for byte
    let stored_leaf = match openssl::x509::X509::from_pem(existing_cert.certificate.as_bytes())
        .and_then(|c| c.to_der()) {
        Ok(v) => v,
        Err(err) => {
            error!("Unable to parse stored certificate {}: {}", existing_cert.id, err);
            return responses::ACMEResponse::problem(internal_server_error!(), nonces, &base).await;
        }
    };
    if stored_leaf != cert_bytes {
        return responses::ACMEResponse::problem(not_ours(), nonces, &base).await;
    }

    match revoke.key {
        jws::JWSRequestKey::KID(acct) => {
            // the account that ordered the certificate may revoke it
            try_result!(get_order(&existing_cert.order_id, &db, Some(&acct)).await, nonces, base);
        }
        jws::JWSRequestKey::JWK { key, .. } => {
            // otherwise the request must be signed with the certificate key
            let cert_public_key = match cert.public_key() {
                Ok(k) => k,
                Err(_) => {
                    return responses::ACMEResponse::problem(not_ours(), nonces, &base).await;
                }
            };
            if !cert_public_key.public_eq(&key) {
                return responses::ACMEResponse::problem(types::error::Error {
                    error_type: types::error::Type::Unauthorized,
                    status: 401,
                    title: "Unauthorized".to_string(),
                    detail: "The public key used to sign the request does not match the certificate".to_string(),
                    sub_problems: vec![],
                    instance: None,
                    identifier: None,
                }, nonces, &base).await;
            }
        }
    };

    try_result!(processing::revoke_certificate(&db, existing_cert, revoke_cert.reason).await, nonces, base);

    responses::ACMEResponse::resource((), rocket::http::Status::Ok, nonces, &base).await
}

macro_rules! catcher_get_state {
    ($req:expr) => {
        {
            let nonces = match $req.guard::<&rocket::State<replay::SharedNonces>>().await {
                rocket::request::Outcome::Success(v) => v,
                _ => {
                    return responses::ACMEResponse::bare_problem(internal_server_error!())
                }
            };
            let base = match $req.guard::<BaseUrl>().await {
                rocket::request::Outcome::Success(v) => v,
                _ => {
                    return responses::ACMEResponse::bare_problem(internal_server_error!())
                }
            };
            (nonces, base)
        }
    }
}

#[catch(400)]
pub async fn acme_400(req: &rocket::Request<'_>) -> responses::ACMEResponse<()> {
    let (nonces, base) = catcher_get_state!(req);

    responses::ACMEResponse::problem(types::error::Error {
        error_type: types::error::Type::Malformed,
        status: 400,
        title: "Bad request".to_string(),
        detail: "You tried to do something you shouldn't have.".to_string(),
        sub_problems: vec![],
        instance: None,
        identifier: None,
    }, nonces, &base).await
}

#[catch(401)]
pub async fn acme_401(req: &rocket::Request<'_>) -> responses::ACMEResponse<()> {
    let (nonces, base) = catcher_get_state!(req);

    responses::ACMEResponse::problem(types::error::Error {
        error_type: types::error::Type::Unauthorized,
        status: 401,
        title: "Unauthorized".to_string(),
        detail: "You're not allowed to see what's here.".to_string(),
        sub_problems: vec![],
        instance: None,
        identifier: None,
    }, nonces, &base).await
}

#[catch(404)]
pub async fn acme_404(req: &rocket::Request<'_>) -> responses::ACMEResponse<()> {
    let (nonces, base) = catcher_get_state!(req);

    responses::ACMEResponse::problem(types::error::Error {
        error_type: types::error::Type::Malformed,
        status: 404,
        title: "Not found".to_string(),
        detail: format!("'{}' is not a path we know of", req.uri()),
        sub_problems: vec![],
        instance: None,
        identifier: None,
    }, nonces, &base).await
}

#[catch(405)]
pub async fn acme_405(req: &rocket::Request<'_>) -> responses::ACMEResponse<()> {
    let (nonces, base) = catcher_get_state!(req);

    responses::ACMEResponse::problem(types::error::Error {
        error_type: types::error::Type::Malformed,
        status: 405,
        title: "Method not allowed".to_string(),
        detail: format!("{} is not allowed on '{}'", req.method(), req.uri()),
        sub_problems: vec![],
        instance: None,
        identifier: None,
    }, nonces, &base).await
}

#[catch(415)]
pub async fn acme_415(req: &rocket::Request<'_>) -> responses::ACMEResponse<()> {
    let (nonces, base) = catcher_get_state!(req);

    responses::ACMEResponse::problem(types::error::Error {
        error_type: types::error::Type::Malformed,
        status: 415,
        title: "Unsupported media type".to_string(),
        detail: match req.content_type() {
            Some(c) => format!("{} is not a supported media type", c),
            None => "No media type was given in the request".to_string(),
        },
        sub_problems: vec![],
        instance: None,
        identifier: None,
    }, nonces, &base).await
}

#[catch(422)]
pub async fn acme_422(req: &rocket::Request<'_>) -> responses::ACMEResponse<()> {
    let (nonces, base) = catcher_get_state!(req);

    responses::ACMEResponse::problem(types::error::Error {
        error_type: types::error::Type::Malformed,
        status: 422,
        title: "Unprocessable entity".to_string(),
        detail: "The request could not be parsed.".to_string(),
        sub_problems: vec![],
        instance: None,
        identifier: None,
    }, nonces, &base).await
}

#[catch(500)]
pub async fn acme_500(req: &rocket::Request<'_>) -> responses::ACMEResponse<()> {
    let (nonces, base) = catcher_get_state!(req);

    responses::ACMEResponse::problem(internal_server_error!(), nonces, &base).await
}
