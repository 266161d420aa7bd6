//! Message formatting utilities for client display.

use chatrelay_shared::{
    protocol::GroupSummary,
    time::format_clock_time,
};
use chrono::FixedOffset;

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format the group table returned by ListGroups
    ///
    /// # Arguments
    ///
    /// * `groups` - Rows in server order
    ///
    /// # Returns
    ///
    /// A formatted table, one group per line
    pub fn format_group_table(groups: &[GroupSummary]) -> String {
        let mut output = String::new();
        output.push_str(&format!("{:>15} {:>15} {:>15}\n", "group", "capacity", "online"));

        if groups.is_empty() {
            output.push_str("(No groups)\n");
        } else {
            for group in groups {
                output.push_str(&format!(
                    "{:>15} {:>15} {:>15}\n",
                    group.name, group.capacity, group.occupancy
                ));
            }
        }
        output
    }

    /// Format a relayed chat message as `sender: text`
    pub fn format_chat_message(sender: &str, text: &str) -> String {
        format!("{}: {}\n", sender, text.trim_end_matches('\n'))
    }

    /// Format the confirmation shown after a successful join
    ///
    /// # Arguments
    ///
    /// * `group` - Joined group
    /// * `member` - Nickname used in the group
    /// * `joined_at` - Unix timestamp (milliseconds)
    /// * `offset` - Time zone used for display
    pub fn format_joined(group: &str, member: &str, joined_at: i64, offset: FixedOffset) -> String {
        format!(
            "admin: joined '{}' as '{}' at {}\n",
            group,
            member,
            format_clock_time(joined_at, offset)
        )
    }

    pub fn format_rejected(reason: &str) -> String {
        format!("admin: {}\n", reason)
    }

    pub fn format_left(group: &str, left_at: i64, offset: FixedOffset) -> String {
        format!("admin: left '{}' at {}\n", group, format_clock_time(left_at, offset))
    }
}
