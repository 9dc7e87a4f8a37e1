use std::fmt;

use chrono::{NaiveDate, TimeZone};
use pairchat_shared::models::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayLabel {
    Today,
    Yesterday,
    Date(NaiveDate),
}

impl fmt::Display for DayLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayLabel::Today => f.write_str("Today"),
            DayLabel::Yesterday => f.write_str("Yesterday"),
            DayLabel::Date(d) => write!(f, "{}", d.format("%B %-d, %Y")),
        }
    }
}

#[derive(Debug)]
pub struct DayGroup<'a> {
    pub label: DayLabel,
    pub messages: Vec<&'a Message>,
}

/// Splits an already sorted list into consecutive calendar-day runs as seen
/// in `tz`.
pub fn group_by_day<'a, Tz: TimeZone>(
    messages: &'a [Message],
    today: NaiveDate,
    tz: &Tz,
) -> Vec<DayGroup<'a>> {
    let yesterday = today.pred_opt();
    let mut groups: Vec<DayGroup<'a>> = Vec::new();

    for msg in messages {
        let day = msg.timestamp.with_timezone(tz).date_naive();
        let label = if day == today {
            DayLabel::Today
        } else if Some(day) == yesterday {
            DayLabel::Yesterday
        } else {
            DayLabel::Date(day)
        };

        match groups.last_mut() {
            Some(group) if group.label == label => group.messages.push(msg),
            _ => groups.push(DayGroup {
                label,
                messages: vec![msg],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn msg(id: &str, y: i32, m: u32, d: u32, h: u32) -> Message {
        Message {
            id: id.into(),
            author_name: "alice".into(),
            author_id: "a1".into(),
            body: Some("x".into()),
            attachment: None,
            timestamp: Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap(),
            reply_ref: None,
            edited: false,
            client_message_id: None,
            reactions: Default::default(),
            read_by: Default::default(),
        }
    }

    #[test]
    fn labels_today_yesterday_and_dates() {
        let list = vec![
            msg("a", 2026, 2, 27, 9),
            msg("b", 2026, 3, 1, 9),
            msg("c", 2026, 3, 2, 8),
            msg("d", 2026, 3, 2, 20),
        ];
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let groups = group_by_day(&list, today, &Utc);

        let labels: Vec<_> = groups.iter().map(|g| g.label.to_string()).collect();
        assert_eq!(labels, vec!["February 27, 2026", "Yesterday", "Today"]);
        assert_eq!(groups[2].messages.len(), 2);
    }

    #[test]
    fn day_boundary_follows_timezone() {
        let list = vec![msg("a", 2026, 3, 1, 23)];
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();

        assert_eq!(group_by_day(&list, today, &plus_two)[0].label, DayLabel::Today);
        assert_eq!(group_by_day(&list, today, &Utc)[0].label, DayLabel::Yesterday);
    }

    #[test]
    fn empty_list_has_no_groups() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert!(group_by_day(&[], today, &Utc).is_empty());
    }
}
