#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use crate::plugin::tests::mock_plugins::*;
    use crate::plugin::{
        BatchPlugin, CancellationCheck, ConfigureBoundary, ImportBoundary, ImportResult, ImportResultContainer,
        LazyCarrier, MemoryCarrier, PluginError, ProgressReporter,
    };

    fn results() -> MemoryCarrier<ImportResult> {
        MemoryCarrier::from_entries([
            ("r1", ImportResult::registered("user-v1", doc(json!({"id": "r1"})), "stored")),
            ("r2", ImportResult::deleted("user-v1", doc(json!({"id": "r2"})), "removed")),
            ("r3", ImportResult::failed("user-v1", doc(json!({"id": "r3"})), "missing name")),
        ])
    }

    #[test]
    fn test_five_records_reach_sink_five_times() {
        let mut plugin = MockImporter::new("five", numbered_records(5));
        let mut received = Vec::new();

        plugin
            .fetch(&mut |record| received.push(record), &CancellationCheck::never())
            .unwrap();

        assert_eq!(received.len(), 5);
        assert_eq!(received[0]["id"], "r1");
        assert_eq!(received[4]["id"], "r5");
    }

    #[test]
    fn test_fetch_without_records() {
        let mut plugin = MockImporter::new("empty", Vec::new());
        let mut calls = 0;

        plugin.fetch(&mut |_| calls += 1, &CancellationCheck::never()).unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_unconfigured_fetch_uses_defaults() {
        let mut plugin = MockImporter::new("defaults", numbered_records(2));
        assert!(plugin.properties().is_empty());
        assert!(plugin.reporter().is_noop());

        let mut calls = 0;
        plugin.fetch(&mut |_| calls += 1, &CancellationCheck::never()).unwrap();
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_configured_fetch_reports_progress() {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&messages);

        let mut plugin = MockImporter::new("reporting", numbered_records(3));
        plugin.set_plugin_properties(json!({"prefix": "users/"})).unwrap();
        plugin
            .set_reporter(ProgressReporter::from_fn(move |m| seen.lock().push(m.to_string())))
            .unwrap();

        plugin.fetch(&mut |_| {}, &CancellationCheck::never()).unwrap();

        assert_eq!(
            messages.lock().as_slice(),
            &["fetching with prefix users/".to_string(), "3 records fetched".to_string()]
        );
    }

    #[test]
    fn test_cancelled_before_fetch() {
        let token = CancellationToken::new();
        token.cancel();

        let mut plugin = MockImporter::new("cancel", numbered_records(3)).with_behavior(Behavior::CheckCancel);
        let mut calls = 0;
        let result = plugin.fetch(&mut |_| calls += 1, &CancellationCheck::new(token));

        assert_eq!(result, Err(PluginError::Cancelled));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_cancelled_mid_fetch_keeps_pushed_records() {
        let token = CancellationToken::new();
        let check = CancellationCheck::new(token.clone());

        let mut plugin = MockImporter::new("cancel", numbered_records(5)).with_behavior(Behavior::CheckCancel);
        let mut received = Vec::new();
        let result = plugin.fetch(
            &mut |record| {
                received.push(record);
                if received.len() == 2 {
                    token.cancel();
                }
            },
            &check,
        );

        assert_eq!(result, Err(PluginError::Cancelled));
        assert_eq!(received.len(), 2);
    }

    #[test]
    fn test_execution_failed_passes_through() {
        let error = PluginError::execution_failed_chain(["source unavailable", "HTTP 503"]);
        let mut plugin = MockImporter::new("failing", numbered_records(4))
            .with_behavior(Behavior::FailWith { after: 2, error: error.clone() });

        let mut calls = 0;
        let result = plugin.fetch(&mut |_| calls += 1, &CancellationCheck::never());

        assert_eq!(result, Err(error));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_foreign_error_collapses() {
        let mut plugin = MockImporter::new("foreign", numbered_records(1)).with_behavior(Behavior::ForeignError);
        let result = plugin.fetch(&mut |_| {}, &CancellationCheck::never());
        assert_eq!(result, Err(PluginError::UnknownPluginFailure));
    }

    #[test]
    fn test_arithmetic_panic_collapses() {
        let mut plugin = MockImporter::new("panics", numbered_records(1)).with_behavior(Behavior::DivideByZero);
        let result = plugin.fetch(&mut |_| {}, &CancellationCheck::never());
        assert_eq!(result, Err(PluginError::UnknownPluginFailure));
    }

    #[test]
    fn test_lifecycle_error_from_inner_op_collapses() {
        let mut plugin = MockImporter::new("misuse", numbered_records(2)).with_behavior(Behavior::FailWith {
            after: 0,
            error: PluginError::illegal_state("Plug-in properties is already set."),
        });
        let result = plugin.fetch(&mut |_| {}, &CancellationCheck::never());
        assert_eq!(result, Err(PluginError::UnknownPluginFailure));
    }

    #[test]
    fn test_post_processing_sees_results() {
        let mut plugin = MockImporter::new("post", Vec::new());
        let calls = plugin.post_calls();
        let seen = plugin.post_seen();

        let carrier = results();
        let container: &ImportResultContainer = &carrier;
        plugin.do_post(container, &CancellationCheck::never()).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            seen.lock().as_slice(),
            &[
                "REGISTER:stored".to_string(),
                "DELETION:removed".to_string(),
                "FAILURE:missing name".to_string(),
            ]
        );
    }

    #[test]
    fn test_default_post_processing_is_noop() {
        let mut plugin = FetchOnlyImporter::new();
        let carrier = results();
        assert_eq!(plugin.do_post(&carrier, &CancellationCheck::never()), Ok(()));

        let mut received = Vec::new();
        plugin.fetch(&mut |r| received.push(r), &CancellationCheck::never()).unwrap();
        assert_eq!(received, vec![record(&[("id", "only")])]);
    }

    #[test]
    fn test_post_processing_cancelled() {
        let token = CancellationToken::new();
        token.cancel();

        let mut plugin = MockImporter::new("post", Vec::new());
        let seen = plugin.post_seen();
        let result = plugin.do_post(&results(), &CancellationCheck::new(token));

        assert_eq!(result, Err(PluginError::Cancelled));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_post_processing_loader_failure_passes_through() {
        let carrier = LazyCarrier::new(["r1", "r2"], |key: &str| -> anyhow::Result<Option<ImportResult>> {
            if key == "r2" {
                anyhow::bail!("result store offline");
            }
            Ok(Some(ImportResult::registered("user-v1", doc(json!({"id": key})), "stored")))
        });

        let mut plugin = MockImporter::new("post", Vec::new());
        let seen = plugin.post_seen();
        let err = plugin.do_post(&carrier, &CancellationCheck::never()).unwrap_err();

        assert!(matches!(err, PluginError::ExecutionFailed { .. }));
        assert_eq!(err.messages(), &["failed to load entry 'r2'".to_string(), "result store offline".to_string()]);
        assert_eq!(seen.lock().len(), 1);
    }
}
