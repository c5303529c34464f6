table! {
    use diesel::sql_types::*;
    use crate::acme::models::AccountStatusMapping;

    accounts (id) {
        id -> Varchar,
        key -> Jsonb,
        key_thumbprint -> Varchar,
        contact -> Jsonb,
        status -> AccountStatusMapping,
        terms_agreed -> Bool,
        created_at -> Timestamptz,
        initial_ip -> Varchar,
    }
}

table! {
    use diesel::sql_types::*;
    use crate::acme::models::OrderStatusMapping;

    orders (id) {
        id -> Varchar,
        account_id -> Varchar,
        status -> OrderStatusMapping,
        expires_at -> Timestamptz,
        not_before -> Nullable<Timestamptz>,
        not_after -> Nullable<Timestamptz>,
        identifiers -> Jsonb,
        finalize -> Varchar,
        certificate_id -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    use diesel::sql_types::*;
    use crate::acme::models::AuthorizationStatusMapping;

    authorizations (id) {
        id -> Varchar,
        order_id -> Varchar,
        status -> AuthorizationStatusMapping,
        expires_at -> Timestamptz,
        identifier -> Jsonb,
        wildcard -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    use diesel::sql_types::*;
    use crate::acme::models::{ChallengeTypeMapping, ChallengeStatusMapping};

    challenges (id) {
        id -> Varchar,
        authorization_id -> Varchar,
        #[sql_name = "type"]
        type_ -> ChallengeTypeMapping,
        url -> Varchar,
        status -> ChallengeStatusMapping,
        token -> Varchar,
        validated -> Nullable<Timestamptz>,
        error -> Nullable<Jsonb>,
        updated_at -> Timestamptz,
    }
}

table! {
    use diesel::sql_types::*;

    certificates (id) {
        id -> Varchar,
        order_id -> Varchar,
        certificate -> Text,
        revoked -> Bool,
        revocation_reason -> Nullable<SmallInt>,
        revoked_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

joinable!(orders -> accounts (account_id));
joinable!(authorizations -> orders (order_id));
joinable!(challenges -> authorizations (authorization_id));
joinable!(certificates -> orders (order_id));

allow_tables_to_appear_in_same_query!(
    accounts,
    orders,
    authorizations,
    challenges,
    certificates,
);
