use std::sync::OnceLock;
use std::time::Duration;

use mps_common::observability::{LogConfig, LogFormat};
use mps_panel::{PanelHandle, PanelSnapshot};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "mps-tests",
            log_dir: Some(std::env::temp_dir().join("mps-tests")),
            emit_stderr: true,
            format: if std::env::var("MPS_LOG_FORMAT")
                .map(|raw| raw.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false)
            {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            default_filter: "debug".to_string(),
        };

        mps_common::observability::init_logging(config).unwrap_or_default()
    });
}

/// Poll the panel until `pred` holds, failing the test after about two seconds.
pub async fn eventually<F>(panel: &PanelHandle, what: &str, pred: F) -> PanelSnapshot
where
    F: Fn(&PanelSnapshot) -> bool,
{
    for _ in 0..400 {
        let snapshot = panel.snapshot().await.expect("panel alive");
        if pred(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}
