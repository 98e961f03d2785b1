// Sync bookkeeping tables owned by the persister. Application tables are
// addressed dynamically and have no diesel schema.

diesel::table! {
    checkpoints (user_id, client_id) {
        user_id -> Text,
        client_id -> Text,
        checkpoint -> BigInt,
    }
}
