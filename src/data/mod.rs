pub mod cost_explorer;
pub mod signing;
pub mod types;
pub mod window;
