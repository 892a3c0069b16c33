use diesel::{allow_tables_to_appear_in_same_query, table};

table! {
    users (id) {
        id -> BigInt,
        name -> Text,
        email -> Text,
        role -> Text,
        created_at -> Timestamp,
    }
}

table! {
    rooms (id) {
        id -> BigInt,
        name -> Text,
        capacity -> Integer,
        location -> Text,
        description -> Nullable<Text>,
        status -> Text,
        is_active -> Bool,
        created_by -> BigInt,
        created_at -> Timestamp,
    }
}

table! {
    requests (id) {
        id -> BigInt,
        requester_id -> BigInt,
        capacity -> Integer,
        purpose -> Text,
        notes -> Nullable<Text>,
        date -> Date,
        start_time -> Time,
        end_time -> Time,
        status -> Text,
        assigned_by -> Nullable<BigInt>,
        rejection_reason -> Nullable<Text>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    bookings (id) {
        id -> BigInt,
        request_id -> BigInt,
        room_id -> BigInt,
        approved_by -> BigInt,
        date -> Date,
        start_time -> Time,
        end_time -> Time,
        created_at -> Timestamp,
    }
}

table! {
    notification_schedules (id) {
        id -> BigInt,
        booking_id -> BigInt,
        notify_type -> Text,
        notify_at -> Timestamp,
        channel -> Text,
        is_sent -> Bool,
        sent_at -> Nullable<Timestamp>,
        attempts -> Integer,
        last_error -> Nullable<Text>,
    }
}

table! {
    notifications (id) {
        id -> BigInt,
        user_id -> BigInt,
        booking_id -> Nullable<BigInt>,
        title -> Text,
        message -> Text,
        kind -> Text,
        channel -> Text,
        is_read -> Bool,
        read_at -> Nullable<Timestamp>,
        created_at -> Timestamp,
    }
}

table! {
    user_preferences (user_id) {
        user_id -> BigInt,
        notify_24h -> Bool,
        notify_3h -> Bool,
        notify_30m -> Bool,
        email_notifications -> Bool,
        updated_at -> Timestamp,
    }
}

allow_tables_to_appear_in_same_query!(
    users,
    rooms,
    requests,
    bookings,
    notification_schedules,
    notifications,
    user_preferences,
);
