pub mod app;
pub mod keys;
pub mod nav;
pub mod run;
pub mod theme;
pub mod ui;

pub use app::{App, Mode, Outcome};
pub use keys::KeyMap;
pub use run::run;
