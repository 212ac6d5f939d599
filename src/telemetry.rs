use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// JSON 형식의 tracing subscriber를 설치합니다.
/// `RUST_LOG` 환경 변수가 있으면 `default_filter` 대신 사용하며,
/// `log` 파사드로 기록된 로그도 함께 전달됩니다.
///
/// 전역 subscriber가 이미 설치되어 있으면 false를 반환합니다.
pub fn init_telemetry(default_filter: &str) -> bool {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init()
        .is_ok()
}
