use chrono::NaiveDateTime;

use booking_core::types::{Channel, NewSchedule, ReminderOffset, UserPreference};

/// Plans the reminder rows for a booking that starts at `start_at`.
///
/// One row per enabled offset, skipping any reminder whose fire time is
/// already in the past at approval time. The channel is `both` when the
/// user accepts email, `in_app` otherwise; in-app reminders are never
/// opted out of individually.
pub fn plan_schedules(
    start_at: NaiveDateTime,
    prefs: &UserPreference,
    now: NaiveDateTime,
) -> Vec<NewSchedule> {
    let channel = if prefs.email_notifications {
        Channel::Both
    } else {
        Channel::InApp
    };

    ReminderOffset::ALL
        .into_iter()
        .filter(|offset| prefs.wants(*offset))
        .filter_map(|offset| {
            let notify_at = start_at - offset.offset();
            (notify_at > now).then(|| NewSchedule {
                notify_type: offset,
                notify_at,
                channel,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    #[test]
    fn all_three_offsets_with_default_preferences() {
        let prefs = UserPreference::default_for(1);
        let rows = plan_schedules(at(10, 14, 0), &prefs, at(1, 9, 0));

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].notify_type, ReminderOffset::H24);
        assert_eq!(rows[0].notify_at, at(9, 14, 0));
        assert_eq!(rows[1].notify_type, ReminderOffset::H3);
        assert_eq!(rows[1].notify_at, at(10, 11, 0));
        assert_eq!(rows[2].notify_type, ReminderOffset::M30);
        assert_eq!(rows[2].notify_at, at(10, 13, 30));
        assert!(rows.iter().all(|r| r.channel == Channel::Both));
    }

    #[test]
    fn disabled_offsets_are_skipped() {
        let prefs = UserPreference {
            notify_24h: false,
            notify_30m: false,
            ..UserPreference::default_for(1)
        };
        let rows = plan_schedules(at(10, 14, 0), &prefs, at(1, 9, 0));

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].notify_type, ReminderOffset::H3);
    }

    #[test]
    fn email_opt_out_downgrades_channel_to_in_app() {
        let prefs = UserPreference {
            email_notifications: false,
            ..UserPreference::default_for(1)
        };
        let rows = plan_schedules(at(10, 14, 0), &prefs, at(1, 9, 0));

        assert!(!rows.is_empty());
        assert!(rows.iter().all(|r| r.channel == Channel::InApp));
    }

    #[test]
    fn past_fire_times_are_dropped() {
        let prefs = UserPreference::default_for(1);

        // Approval 2 hours before start: only the 30m reminder survives.
        let rows = plan_schedules(at(10, 14, 0), &prefs, at(10, 12, 0));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].notify_type, ReminderOffset::M30);

        // Approval 30 minutes before start: the 30m row would fire exactly
        // now, which is not strictly in the future, so nothing is planned.
        let rows = plan_schedules(at(10, 14, 0), &prefs, at(10, 13, 30));
        assert!(rows.is_empty());
    }
}
