use crate::{AppId, ContextId, RtError, RuntimeConfig, TickDuration};

#[test]
fn defaults_match_hardware_tuning() {
    let config = RuntimeConfig::default();

    assert_eq!(config.frame_watchdog, TickDuration::from_millis(250));
    assert_eq!(config.shutdown_timeout(ContextId::MainApp), TickDuration::from_secs(5));
    assert_eq!(config.shutdown_timeout(ContextId::Worker), TickDuration::from_secs(2));
    assert_eq!(config.download_timeout, TickDuration::from_secs(6));
    assert_eq!(config.heartbeat_interval, TickDuration::from_secs(1));
    assert_eq!(config.debounce, TickDuration::from_millis(2));
    assert_eq!(config.default_app, AppId::SYSTEM);
}

#[test]
fn builder_overrides_fields() {
    let config = RuntimeConfig::builder()
        .frame_watchdog(TickDuration::from_millis(100))
        .shutdown_timeout(ContextId::Worker, TickDuration::from_secs(1))
        .queue_depth(4)
        .arena_base(0x1000_0000)
        .build()
        .unwrap();

    assert_eq!(config.frame_watchdog, TickDuration::from_millis(100));
    assert_eq!(config.shutdown_timeout(ContextId::Worker), TickDuration::from_secs(1));
    assert_eq!(config.queue_depth, 4);
    assert_eq!(config.arena_base(ContextId::MainApp), 0x1000_0000);
    assert_eq!(
        config.arena_base(ContextId::Overlay),
        0x1000_0000 + 2 * RuntimeConfig::ARENA_STRIDE
    );
}

#[test]
fn builder_rejects_unusable_values() {
    assert_eq!(
        RuntimeConfig::builder().queue_depth(0).build(),
        Err(RtError::ProgrammingError)
    );
    assert_eq!(
        RuntimeConfig::builder()
            .hang_timeout(Some(TickDuration::from_millis(500)))
            .build(),
        Err(RtError::ProgrammingError)
    );
    assert!(RuntimeConfig::builder().hang_timeout(None).build().is_ok());
}
