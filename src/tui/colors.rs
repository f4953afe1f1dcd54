//! Color constants for the terminal user interface.

use ratatui::style::Color;

use crate::fields::DeadlineStatus;

/// Cards still inside their sprint week.
pub const ON_TRACK_GREEN: Color = Color::Rgb(0, 110, 0);
/// Cards in the overflow grace week.
pub const OVERFLOW_AMBER: Color = Color::Rgb(200, 140, 0);
/// Cards past their overflow deadline.
pub const LATE_RED: Color = Color::Rgb(150, 0, 0);
/// Header and selected-column accent.
pub const BOARD_BLUE: Color = Color::Rgb(40, 90, 160);

/// Accent color for a deadline classification.
pub fn deadline_color(status: DeadlineStatus) -> Color {
    match status {
        DeadlineStatus::None => Color::DarkGray,
        DeadlineStatus::OnTrack => ON_TRACK_GREEN,
        DeadlineStatus::Overflow => OVERFLOW_AMBER,
        DeadlineStatus::Late => LATE_RED,
    }
}
