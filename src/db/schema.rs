diesel::table! {
    users (roll_no) {
        roll_no -> Text,
        name -> Text,
        password_hash -> Text,
        role -> Text,
        hostel_no -> Nullable<Text>,
        room_no -> Nullable<Text>,
    }
}

diesel::table! {
    medical_records (id) {
        id -> Integer,
        roll_no -> Text,
        date -> Date,
        diagnosis -> Text,
        medications -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    certificates (id) {
        id -> Integer,
        roll_no -> Text,
        name -> Text,
        date -> Date,
        diagnosis -> Text,
        medications -> Text,
        age -> Integer,
        gender -> Text,
        relaxations -> Nullable<Text>,
        serial_no -> Text,
        file_name -> Text,
        created_at -> Timestamp,
        // Unique constraint in the database: at most one certificate per record.
        record_id -> Integer,
    }
}

diesel::joinable!(certificates -> medical_records (record_id));
diesel::joinable!(medical_records -> users (roll_no));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    medical_records,
    certificates,
);
