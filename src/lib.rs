pub mod api;
pub mod core;
pub mod identification;

pub fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("blink_tracker"),
        );
    }

    #[cfg(not(target_os = "android"))]
    {
        // logging handled by the host application's `log` backend
    }
}
