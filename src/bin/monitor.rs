use anyhow::{Context, Result};
use dbfleet::cli::actions::monitor::MonitorAction;
use dbfleet::config::InstanceRegistry;
use dbfleet::scheduler::shutdown::CancelToken;
use dbfleet::scheduler::{self, SchedulerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let action = dbfleet::cli::start_monitor()?;

    match action {
        MonitorAction::Run {
            registry_path,
            snapshot_root,
            once,
            interval,
            workers,
            grace_window,
        } => {
            let registry = InstanceRegistry::load(&registry_path)
                .await
                .with_context(|| format!("failed to load {}", registry_path.display()))?;

            let config = SchedulerConfig {
                snapshot_root,
                max_workers: workers,
                grace_window,
                ..SchedulerConfig::default()
            };

            if once {
                let report = scheduler::run_once(&registry, &config, &scheduler::qps_state::QpsState::new()).await;
                tracing::info!(
                    instances = report.ticks.len(),
                    failed = report.failed_count(),
                    "monitor tick complete"
                );
                if report.failed_count() > 0 {
                    std::process::exit(1);
                }
            } else {
                let token = CancelToken::new();
                token.spawn_watcher();
                scheduler::run_continuous(&registry, &config, interval, &token).await;
            }

            Ok(())
        }
        MonitorAction::TestConnection {
            registry_path,
            instance,
        } => {
            let registry = InstanceRegistry::load(&registry_path)
                .await
                .with_context(|| format!("failed to load {}", registry_path.display()))?;

            let Some(target) = registry.instances.iter().find(|i| i.name == instance) else {
                eprintln!("no instance named '{instance}' in {}", registry_path.display());
                std::process::exit(2);
            };

            match dbfleet::adapters::open(target).await {
                Ok(handle) => {
                    let ok = dbfleet::adapters::ping(&handle).await.unwrap_or(false);
                    dbfleet::adapters::close(handle).await;
                    if ok {
                        println!("{instance}: OK");
                        Ok(())
                    } else {
                        println!("{instance}: connected, but ping failed");
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    println!("{instance}: FAILED ({e})");
                    std::process::exit(1);
                }
            }
        }
    }
}
