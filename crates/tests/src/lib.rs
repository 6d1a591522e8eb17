//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 端到端批次分发测试（记录型 mock 目的地）
//! - 同意过滤与故障隔离场景

#[cfg(test)]
mod support;

#[cfg(test)]
mod contract_tests {
    use contracts::{AnalyticsEvent, ConsentPurpose, EventType};

    #[test]
    fn test_event_wire_shape() {
        let event: AnalyticsEvent = serde_json::from_str(
            r#"{
                "type": "group",
                "timestamp": "2024-01-01T00:00:00Z",
                "userId": "u1",
                "groupId": "acme",
                "traits": { "plan": "pro" }
            }"#,
        )
        .unwrap();

        assert_eq!(event.event_type(), EventType::Group);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "group");
        assert_eq!(json["groupId"], "acme");
        assert_eq!(json["traits"]["plan"], "pro");
    }

    #[test]
    fn test_consent_purpose_names() {
        let names: Vec<&str> = ConsentPurpose::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(
            names,
            ["necessary", "measurement", "marketing", "functionality", "experience"]
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;

    use contracts::{
        AnalyticsEvent, ConsentAction, ConsentPurpose, ConsentState, DestinationConfig,
        EventContext, EventType,
    };
    use dispatcher::{ConnectionState, DestinationManager, DispatcherError, Pipeline};
    use event_processor::{EventProcessor, ProcessorConfig, ProcessorError};
    use registry::{destination_factory, DestinationLoader, PluginRegistry, RegistryError};

    use crate::support::{mixed_batch, Recorder, RecordingPackage};

    fn manager_with(registry: PluginRegistry) -> Arc<DestinationManager> {
        Arc::new(DestinationManager::new(DestinationLoader::new(
            Arc::new(registry),
            None,
        )))
    }

    fn ctx(consent: ConsentState) -> EventContext {
        EventContext::new("sess-1", consent)
    }

    /// 超过 max_batch_size 的批次整体失败且不分发
    #[tokio::test]
    async fn test_batch_size_boundary() {
        let registry = PluginRegistry::new();
        let recorder = Recorder::register(&registry, "rec");
        let manager = manager_with(registry);
        manager
            .load_destinations(&[DestinationConfig::new("rec")])
            .await
            .unwrap();
        let pipeline = Pipeline::new(EventProcessor::new(ProcessorConfig::default()), manager);
        let consent = ctx(ConsentState::all_granted());

        let track = |i: usize| AnalyticsEvent::track(format!("e{i}")).with_user_id("u1");

        let report = pipeline
            .ingest((0..1000).map(track).collect(), &consent)
            .await
            .unwrap();
        assert_eq!(report.accepted, 1000);
        assert_eq!(recorder.count(), 1000);

        let err = pipeline
            .ingest((0..1001).map(track).collect(), &consent)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatcherError::Processor(ProcessorError::BatchTooLarge {
                size: 1001,
                max: 1000
            })
        ));
        assert_eq!(recorder.count(), 1000);
    }

    /// 同意事件无视目的地的同意要求
    #[tokio::test]
    async fn test_consent_events_reach_every_destination() {
        let registry = PluginRegistry::new();
        let gated = Recorder::register(&registry, "gated");
        let open = Recorder::register(&registry, "open");
        let manager = manager_with(registry);
        manager
            .load_destinations(&[
                DestinationConfig::new("gated").with_required_consent(ConsentPurpose::ALL.to_vec()),
                DestinationConfig::new("open"),
            ])
            .await
            .unwrap();

        let events = vec![
            AnalyticsEvent::consent(ConsentAction::Revoked).with_anonymous_id("a1"),
            AnalyticsEvent::track("Hidden").with_anonymous_id("a1"),
        ];
        manager.process_events(&events, &ctx(ConsentState::default())).await;

        assert_eq!(gated.types(), [EventType::Consent]);
        assert_eq!(open.types(), [EventType::Consent, EventType::Track]);
    }

    /// measurement 未授权时，受限目的地收不到非同意事件，兄弟目的地照常接收
    #[tokio::test]
    async fn test_measurement_gated_destination() {
        let registry = PluginRegistry::new();
        let analytics = Recorder::register(&registry, "analytics");
        let crm = Recorder::register(&registry, "crm");
        let manager = manager_with(registry);
        manager
            .load_destinations(&[
                DestinationConfig::new("analytics")
                    .with_required_consent(vec![ConsentPurpose::Measurement]),
                DestinationConfig::new("crm"),
            ])
            .await
            .unwrap();

        manager
            .process_events(&mixed_batch(), &ctx(ConsentState::necessary_only()))
            .await;

        assert_eq!(analytics.count(), 0);
        assert_eq!(crm.count(), mixed_batch().len());
    }

    /// 失败目的地逐事件计错，健康目的地处理全部事件
    #[tokio::test]
    async fn test_failure_isolation() {
        let registry = PluginRegistry::new();
        Recorder::register_failing(&registry, "flaky");
        let healthy = Recorder::register(&registry, "healthy");
        let manager = manager_with(registry);
        manager
            .load_destinations(&[
                DestinationConfig::new("flaky"),
                DestinationConfig::new("healthy"),
            ])
            .await
            .unwrap();

        let events: Vec<_> = (0..7)
            .map(|i| AnalyticsEvent::track(format!("e{i}")).with_user_id("u1"))
            .collect();
        manager
            .process_events(&events, &ctx(ConsentState::all_granted()))
            .await;

        let flaky = manager.destination_status("flaky").unwrap();
        assert_eq!(flaky.error_count, 7);
        assert!(flaky.last_error.is_some());
        assert_eq!(healthy.count(), 7);
        assert_eq!(
            manager.destination_status("healthy").unwrap().events_processed,
            7
        );
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let registry = PluginRegistry::new();
        let first = Recorder::register(&registry, "dup");

        let err = registry
            .register("dup", destination_factory(|_| unreachable!("second factory used")))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateType { .. }));

        let factory = registry.get("dup").unwrap();
        factory(&contracts::Settings::new()).unwrap();
        assert_eq!(first.constructed(), 1);
    }

    /// 禁用的配置永不构造
    #[tokio::test]
    async fn test_disabled_destination_never_constructed() {
        let registry = PluginRegistry::new();
        let enabled = Recorder::register(&registry, "on");
        let disabled = Recorder::register(&registry, "off");
        let manager = manager_with(registry);

        manager
            .load_destinations(&[
                DestinationConfig::new("on"),
                DestinationConfig::new("off").disabled(),
            ])
            .await
            .unwrap();

        assert_eq!(enabled.constructed(), 1);
        assert_eq!(disabled.constructed(), 0);
        assert_eq!(manager.loaded_destinations(), ["on"]);
    }

    /// A 需要 marketing，B 无要求
    #[tokio::test]
    async fn test_marketing_ab_scenario() {
        let registry = PluginRegistry::new();
        let a = Recorder::register(&registry, "a");
        let b = Recorder::register(&registry, "b");
        let manager = manager_with(registry);
        manager
            .load_destinations(&[
                DestinationConfig::new("a").with_required_consent(vec![ConsentPurpose::Marketing]),
                DestinationConfig::new("b"),
            ])
            .await
            .unwrap();

        let batch = vec![
            AnalyticsEvent::page("pricing").with_anonymous_id("a1"),
            AnalyticsEvent::consent(ConsentAction::Granted).with_anonymous_id("a1"),
            AnalyticsEvent::track("Signup").with_anonymous_id("a1"),
        ];

        let denied = ConsentState::all_granted().with(ConsentPurpose::Marketing, false);
        manager.process_events(&batch, &ctx(denied)).await;
        assert_eq!(a.types(), [EventType::Consent]);
        assert_eq!(
            b.types(),
            [EventType::Page, EventType::Consent, EventType::Track]
        );

        manager
            .process_events(&batch, &ctx(ConsentState::all_granted()))
            .await;
        assert_eq!(a.count(), 4);
        assert_eq!(b.count(), 6);
    }

    /// initialize 失败只排除该目的地
    #[tokio::test]
    async fn test_initialize_failure_excludes_only_that_destination() {
        let registry = PluginRegistry::new();
        Recorder::register(&registry, "strict");
        let lenient = Recorder::register(&registry, "lenient");
        let manager = manager_with(registry);

        let report = manager
            .load_destinations(&[
                DestinationConfig::new("strict").with_setting("fail_init", true),
                DestinationConfig::new("lenient"),
            ])
            .await
            .unwrap();

        assert_eq!(report.loaded, ["lenient"]);
        assert_eq!(report.failed[0].0, "strict");
        assert_eq!(manager.loaded_destinations(), ["lenient"]);

        manager
            .process_events(&mixed_batch(), &ctx(ConsentState::all_granted()))
            .await;
        assert_eq!(lenient.count(), mixed_batch().len());
        assert_eq!(manager.health_summary().loaded_destinations, 1);
    }

    #[tokio::test]
    async fn test_disconnected_connection_status() {
        let registry = PluginRegistry::new();
        Recorder::register(&registry, "offline");
        let manager = manager_with(registry);
        manager
            .load_destinations(&[DestinationConfig::new("offline").with_setting("offline", true)])
            .await
            .unwrap();

        let status = manager.test_destination("offline").await;
        assert_eq!(status.status, ConnectionState::Disconnected);
        assert!(status.error.is_none());
    }

    /// 通过包的构造函数导出解析未注册类型
    #[tokio::test]
    async fn test_package_constructor_resolution() {
        let registry = Arc::new(PluginRegistry::new());
        let package = RecordingPackage::new("createRecordingDestination");
        let recorder = package.recorder();
        let manager = DestinationManager::new(DestinationLoader::new(
            registry.clone(),
            Some(Arc::new(package)),
        ));

        manager
            .load_destinations(&[DestinationConfig::new("recording")])
            .await
            .unwrap();
        assert!(registry.contains("recording"));

        manager
            .process_events(&mixed_batch(), &ctx(ConsentState::all_granted()))
            .await;
        assert_eq!(recorder.count(), mixed_batch().len());

        let missing = manager
            .load_destinations(&[DestinationConfig::new("google-analytics")])
            .await;
        assert!(matches!(
            missing,
            Err(DispatcherError::DestinationsUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_package_is_distinct_error() {
        let manager = manager_with(PluginRegistry::new());
        let err = manager
            .load_destinations(&[DestinationConfig::new("anything")])
            .await
            .unwrap_err();

        match err {
            DispatcherError::DestinationsUnavailable(loader_error) => {
                assert!(loader_error.is_package_error())
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    /// 丰富阶段的会话字段在目的地可见
    #[tokio::test]
    async fn test_enrichment_visible_to_destinations() {
        let registry = PluginRegistry::new();
        let recorder = Recorder::register(&registry, "rec");
        let manager = manager_with(registry);
        manager
            .load_destinations(&[DestinationConfig::new("rec")])
            .await
            .unwrap();
        let pipeline = Pipeline::new(EventProcessor::default(), manager);

        pipeline
            .ingest(
                vec![AnalyticsEvent::track("Signup").with_user_id("u1")],
                &ctx(ConsentState::all_granted()).with_custom("tenant", "acme"),
            )
            .await
            .unwrap();

        let seen = recorder.events();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].session_id.as_deref(), Some("sess-1"));
        assert_eq!(seen[0].context["sessionId"], "sess-1");
        assert_eq!(seen[0].context["tenant"], "acme");
    }
}

#[cfg(test)]
mod config_e2e_tests {
    use std::sync::Arc;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{AnalyticsEvent, ConsentState, EventContext};
    use dispatcher::{BuiltinPackage, DestinationManager, Pipeline};
    use event_processor::EventProcessor;
    use registry::{DestinationLoader, PluginRegistry};

    /// TOML 配置 -> 内置 file 目的地 -> JSON Lines 输出
    #[tokio::test]
    async fn test_config_to_file_destination() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("events.jsonl");
        let toml = format!(
            r#"
[processor]
max_batch_size = 10

[[destinations]]
type = "file"
required_consent = ["measurement"]
[destinations.settings]
path = "{}"

[[destinations]]
type = "log"
"#,
            out.display().to_string().replace('\\', "/")
        );
        let config = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();

        let manager = Arc::new(DestinationManager::new(DestinationLoader::new(
            Arc::new(PluginRegistry::new()),
            Some(Arc::new(BuiltinPackage::new())),
        )));
        let report = manager.load_destinations(&config.destinations).await.unwrap();
        assert_eq!(report.loaded, ["file", "log"]);

        let pipeline = Pipeline::new(EventProcessor::new(config.processor.clone()), manager);
        let events = vec![
            AnalyticsEvent::track("Signup").with_user_id("u1"),
            AnalyticsEvent::page("home").with_user_id("u1"),
        ];

        // No measurement consent: nothing written
        pipeline
            .ingest(events.clone(), &EventContext::new("s1", ConsentState::necessary_only()))
            .await
            .unwrap();
        pipeline
            .ingest(events, &EventContext::new("s2", ConsentState::all_granted()))
            .await
            .unwrap();
        pipeline.manager().shutdown().await;

        let content = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l["sessionId"] == "s2"));
    }
}
