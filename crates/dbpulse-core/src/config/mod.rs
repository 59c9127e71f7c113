//! Configuration system for dbpulse.
//! YAML or TOML settings bag, layered: env > explicit file > project file > defaults.

pub mod settings;

pub use settings::Settings;
