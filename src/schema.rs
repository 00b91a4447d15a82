diesel::table! {
    uploaded_files (id) {
        id -> Int4,
        filename -> Varchar,
        table_name -> Varchar,
        created_at -> Timestamp,
    }
}

diesel::table! {
    users (id) {
        id -> Int4,
        email -> Varchar,
        password -> Varchar,
    }
}

diesel::allow_tables_to_appear_in_same_query!(uploaded_files, users,);
