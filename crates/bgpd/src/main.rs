// Copyright (C) 2024-present The bgpcore Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use anyhow::Context;
use bgpcore_bgpd::{config::BgpdConfig, Bgpd};
use clap::Parser;
use std::{path::PathBuf, str::FromStr};
use tracing::{info, Level};

#[derive(clap::Parser, Debug)]
#[command(version, about = "BGP-4 daemon")]
struct Args {
    /// YAML configuration file, `BGPD_` environment variables override it
    config: PathBuf,
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(Level::from_str(level).context("invalid logging level")?)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = BgpdConfig::load(&args.config)
        .with_context(|| format!("parsing config file {} failed", args.config.display()))?;
    init_tracing(&config.logging.level)?;

    // One event loop unless worker threads are configured
    let mut runtime_builder = match config.runtime.threads {
        Some(threads) => {
            let mut builder = tokio::runtime::Builder::new_multi_thread();
            builder.worker_threads(threads);
            builder
        }
        None => tokio::runtime::Builder::new_current_thread(),
    };
    runtime_builder.enable_all();
    let runtime = runtime_builder.build()?;
    runtime.block_on(async move {
        let bgpd = Bgpd::new(config);
        let shutdown = bgpd.shutdown_token();
        let mut daemon = tokio::spawn(bgpd.run());
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Termination signal received, shutting down peers");
                shutdown.cancel();
                daemon.await??;
            }
            result = &mut daemon => result??,
        }
        Ok::<(), anyhow::Error>(())
    })
}
