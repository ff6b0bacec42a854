pub mod alert;
pub mod insight;
pub mod pattern;
pub mod prediction;
pub mod preferences;
pub mod settings;
pub mod task;
pub mod telemetry;

pub use alert::*;
pub use insight::*;
pub use pattern::*;
pub use prediction::*;
pub use preferences::*;
pub use settings::*;
pub use task::*;
pub use telemetry::*;
