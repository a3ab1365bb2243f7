use std::sync::Arc;

use anyhow::{Context, Result, anyhow};

use safeguard::{
    cli::args_from_env,
    config::{Config, OracleConfig},
    logging::init_tracing,
    oracle::{
        MemoizedTransport, OracleTransport, ReasoningOracle, llm::LlmOracleTransport,
    },
    runner::{ScriptedAgent, SettingsRegistry, run_episode},
    safety::SafetyModule,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = args_from_env()?;
    let config = Config::load(&args.config_path)
        .with_context(|| format!("failed to load config from {}", args.config_path.display()))?;
    let logging_guard = init_tracing(&config.logging)?;

    let registry = SettingsRegistry::with_builtins().extend(config.settings.clone());
    let setting = registry.get(&args.setting).cloned().ok_or_else(|| {
        anyhow!(
            "unknown setting '{}'. available: {}",
            args.setting,
            registry.names().collect::<Vec<_>>().join(", ")
        )
    })?;

    let oracle = ReasoningOracle::new(build_transport(&config.oracle)?);
    let safety = SafetyModule::new(
        setting.initial_state.clone(),
        Arc::new(setting.environment.action_space()),
        oracle,
    )
    .context("failed to start safety session")?;

    let mut agent = ScriptedAgent::new(setting.scripted_actions.clone());
    let mut environment = setting.environment.build(&setting.initial_state);

    tracing::info!(
        target: "main",
        run_id = logging_guard.run_id(),
        setting = %args.setting,
        "episode_starting"
    );
    let report = run_episode(&setting, &safety, &mut agent, environment.as_mut())
        .await
        .context("episode aborted")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to encode episode report")?
    );
    Ok(())
}

fn build_transport(config: &OracleConfig) -> Result<Arc<dyn OracleTransport>> {
    let llm = LlmOracleTransport::new(config.backend.clone(), config.reliability.clone())
        .context("failed to construct oracle transport")?;
    if !config.memoize {
        return Ok(Arc::new(llm));
    }

    let mut memoized = MemoizedTransport::new(Arc::new(llm));
    if let Some(cache_dir) = &config.cache_dir {
        memoized = memoized.with_store_dir(cache_dir);
    }
    Ok(Arc::new(memoized))
}
