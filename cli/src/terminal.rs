pub mod colors;
pub mod logging;
pub mod notifier;
pub mod print;
pub mod spinner;
