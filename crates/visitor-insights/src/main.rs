mod bootstrap;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use insights_core::enrichment::StaticEnrichment;
use insights_core::settings::Settings;
use insights_data::filter::FilterRequest;
use insights_runtime::dashboard::Dashboard;
use insights_runtime::enrichment::PrefetchConfig;
use insights_runtime::log_cache::LogCache;
use insights_ui::app::App;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(
        &settings.log_level,
        bootstrap::log_target(&settings.view, settings.log_file.as_ref()),
    )?;

    tracing::info!("Visitor Insights v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Source: {}, View: {}, Theme: {}, Timezone: {}",
        settings.data_file.display(),
        settings.view,
        settings.theme,
        settings.timezone
    );

    let request = filter_request(&settings);
    let mut dashboard = Dashboard::new(
        LogCache::new(&settings.data_file, settings.timezone.clone()),
        Arc::new(StaticEnrichment::new()),
        prefetch_config(&settings),
    );

    // Load once up front so a bad source exits with a message instead of an
    // empty terminal UI.
    let view = dashboard
        .render(&request)
        .await
        .with_context(|| format!("failed to load {}", settings.data_file.display()))?;

    match settings.view.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&view)?);
        }

        "dashboard" => {
            let app = App::new(&settings.theme, dashboard, request);

            // The loop exits on 'q' / Ctrl+C inside the TUI. The OS-level
            // signal covers Ctrl+C delivered outside raw mode.
            tokio::select! {
                result = app.run() => result?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received; shutting down");
                }
            }
        }

        unknown => anyhow::bail!("Unknown view mode: {unknown}"),
    }

    Ok(())
}

fn filter_request(settings: &Settings) -> FilterRequest {
    FilterRequest {
        start_date: settings.start_date,
        end_date: settings.end_date,
        ip: settings.ip.clone(),
        search: settings.search.clone(),
    }
}

fn prefetch_config(settings: &Settings) -> PrefetchConfig {
    PrefetchConfig {
        max_concurrency: settings.enrichment_concurrency as usize,
        timeout: Duration::from_millis(settings.enrichment_timeout_ms),
    }
}
