//! Table output formatting for CLI commands using comfy-table.

use chrono::Utc;
use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use crate::domain::models::{Bet, BettorProfile, Nudge};

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|l| Cell::new(l).add_attribute(Attribute::Bold))
        .collect()
}

/// Format active bets as a table
pub fn format_bets_table(bets: &[Bet]) -> String {
    let now = Utc::now();
    let mut table = base_table();
    table.set_header(header(&["Task", "Wager", "Deadline", "Due", "Status"]));

    for bet in bets {
        let status = match bet.success {
            Some(true) => Cell::new("won").fg(Color::Green),
            Some(false) => Cell::new("lost").fg(Color::Red),
            None if bet.is_expired(now) => Cell::new("expired").fg(Color::Yellow),
            None => Cell::new("pending"),
        };
        table.add_row(vec![
            Cell::new(&bet.task),
            Cell::new(bet.wager),
            Cell::new(bet.deadline.format("%Y-%m-%d %H:%M UTC")),
            Cell::new(
                bet.task_due_date
                    .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string()),
            ),
            status,
        ]);
    }

    table.to_string()
}

/// Format nudges with their delivery state
pub fn format_nudges_table(nudges: &[Nudge]) -> String {
    let mut table = base_table();
    table.set_header(header(&["ID", "Task", "Delivery", "State", "Message"]));

    for nudge in nudges {
        let state = if nudge.canceled {
            Cell::new("canceled").fg(Color::DarkGrey)
        } else if nudge.triggered_at.is_some() {
            Cell::new("triggered").fg(Color::Green)
        } else {
            Cell::new("pending")
        };
        table.add_row(vec![
            Cell::new(&nudge.id),
            Cell::new(&nudge.task),
            Cell::new(nudge.delivery_time.format("%Y-%m-%d %H:%M UTC")),
            state,
            Cell::new(nudge.message.as_deref().unwrap_or("-")),
        ]);
    }

    table.to_string()
}

/// Format the bettor profile as a two-column table
pub fn format_profile_table(profile: &BettorProfile) -> String {
    let mut table = base_table();
    table.set_header(header(&["Metric", "Value"]));
    table.add_row(vec![Cell::new("Points"), Cell::new(profile.points)]);
    table.add_row(vec![Cell::new("Streak"), Cell::new(profile.streak)]);
    table.add_row(vec![Cell::new("Total bets"), Cell::new(profile.total_bets)]);
    table.add_row(vec![
        Cell::new("Success rate"),
        Cell::new(format!("{}%", profile.success_rate())),
    ]);
    table.add_row(vec![Cell::new("Pending"), Cell::new(profile.pending_bets)]);
    table.to_string()
}
