diesel::table! {
    transactions (id) {
        id -> Int8,
        email -> Varchar,
        amount -> Numeric,
        status -> Varchar,
        transaction_id -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
