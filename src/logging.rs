use env_logger::{Builder, Env};
use std::sync::Once;

static INIT: Once = Once::new();

pub fn setup_log() {
    INIT.call_once(|| {
        Builder::from_env(Env::default().default_filter_or("info")).init();
    });
}
