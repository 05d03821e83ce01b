// Diesel table definitions. Kept in sync with DbContext::init_schema.

diesel::table! {
    crawl_attempts (url) {
        url -> Text,
        year -> Integer,
        doc_index -> BigInt,
        status -> Text,
        attempts -> Integer,
        last_visited_at -> Nullable<Text>,
        http_status -> Nullable<Integer>,
        last_error -> Nullable<Text>,
        document_id -> Nullable<Text>,
        updated_at -> Text,
    }
}

diesel::table! {
    documents (id) {
        id -> Text,
        url -> Text,
        year -> Integer,
        doc_index -> BigInt,
        title -> Nullable<Text>,
        text -> Text,
        bytes -> BigInt,
        ocr_provider -> Text,
        ocr_confidence -> Nullable<Double>,
        tag -> Nullable<Text>,
        category -> Nullable<Text>,
        user_edited -> Integer,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    not_found_ranges (id) {
        id -> Text,
        year -> Integer,
        start_index -> BigInt,
        end_index -> BigInt,
        count -> BigInt,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    filter_rules (id) {
        id -> Text,
        rule_type -> Text,
        field -> Text,
        mode -> Text,
        pattern -> Text,
        active -> Integer,
        created_at -> Text,
    }
}

diesel::table! {
    job_configs (name) {
        name -> Text,
        enabled -> Integer,
        params -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    run_logs (id) {
        id -> Text,
        name -> Text,
        started_at -> Text,
        duration_sec -> Double,
        attempted -> BigInt,
        downloaded -> BigInt,
        not_found -> BigInt,
        errors -> BigInt,
        skipped -> BigInt,
        extra -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    crawl_attempts,
    documents,
    not_found_ranges,
    filter_rules,
    job_configs,
    run_logs,
);
