diesel::table! {
    checkpoints (user_id, client_id) {
        user_id -> Text,
        client_id -> Text,
        checkpoint -> BigInt,
    }
}
