/// Logs a formatted message only when debug mode is enabled
#[macro_export]
macro_rules! debug_log {
    ($debug_settings:expr, $($arg:tt)*) => {
        if $debug_settings.debug_mode {
            bevy::prelude::info!($($arg)*);
        }
    };
}
