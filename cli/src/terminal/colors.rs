use colored::Color;

pub const PRIMARY: Color = Color::BrightGreen;
pub const ACCENT: Color = Color::BrightYellow;
pub const SEPARATOR: Color = Color::BrightBlack;
pub const TEXT_DEFAULT: Color = Color::White;

pub const PORT: Color = Color::BrightCyan;
pub const HOST_ADDR: Color = Color::BrightBlue;
pub const PENDING: Color = Color::Yellow;
pub const CONFLICT: Color = Color::Red;
