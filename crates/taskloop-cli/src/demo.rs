//! Simulated units of work for the reference trading-automation catalog.
//!
//! Each category sleeps for a fixed latency and returns a canned payload.
//! Failures can be injected at random or forced for a whole category to
//! exercise the retry path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::{json, Value};
use taskloop_core::{CategorySpec, Task};
use taskloop_runner::{HandlerRegistry, TaskExecutionError, UnitOfWork};
use thiserror::Error;

/// Rejected simulation options.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Failure rate must be within 0.0..=1.0, got {0}")]
    FailureRate(f64),

    #[error("Latency scale must be a non-negative number, got {0}")]
    LatencyScale(f64),

    #[error("Latency scale {scale} is too large for category '{category}'")]
    LatencyOverflow { category: &'static str, scale: f64 },

    #[error("Cannot force failures for '{0}': not a category of this catalog")]
    UnknownFailCategory(String),
}

/// Knobs for the simulated units of work.
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    /// Multiplier applied to every category latency.
    pub latency_scale: f64,
    /// Probability (0.0 to 1.0) that an attempt fails.
    pub failure_rate: f64,
    /// Category whose attempts always fail.
    pub fail_category: Option<String>,
}

impl SimulationOptions {
    /// Check the options against the categories of the catalog being run.
    pub fn validate(&self, categories: &[CategorySpec]) -> Result<(), SimulationError> {
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(SimulationError::FailureRate(self.failure_rate));
        }
        if !self.latency_scale.is_finite() || self.latency_scale < 0.0 {
            return Err(SimulationError::LatencyScale(self.latency_scale));
        }
        if let Some(name) = &self.fail_category {
            if !categories.iter().any(|spec| spec.name.as_str() == name) {
                return Err(SimulationError::UnknownFailCategory(name.clone()));
            }
        }
        Ok(())
    }
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            latency_scale: 1.0,
            failure_rate: 0.0,
            fail_category: None,
        }
    }
}

/// The categories of the reference catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Simulation {
    DataCollection,
    SignalGeneration,
    Backtesting,
    RiskAssessment,
    Optimization,
    Monitoring,
    TradeSimulation,
    HealthCheck,
}

impl Simulation {
    pub const ALL: [Simulation; 8] = [
        Simulation::DataCollection,
        Simulation::SignalGeneration,
        Simulation::Backtesting,
        Simulation::RiskAssessment,
        Simulation::Optimization,
        Simulation::Monitoring,
        Simulation::TradeSimulation,
        Simulation::HealthCheck,
    ];

    pub fn category(&self) -> &'static str {
        match self {
            Simulation::DataCollection => "data_collection",
            Simulation::SignalGeneration => "signal_generation",
            Simulation::Backtesting => "backtesting",
            Simulation::RiskAssessment => "risk_assessment",
            Simulation::Optimization => "optimization",
            Simulation::Monitoring => "monitoring",
            Simulation::TradeSimulation => "trade_simulation",
            Simulation::HealthCheck => "health_check",
        }
    }

    /// Unscaled processing time of one attempt.
    pub fn latency(&self) -> Duration {
        let ms = match self {
            Simulation::DataCollection => 100,
            Simulation::SignalGeneration => 150,
            Simulation::Backtesting => 200,
            Simulation::RiskAssessment => 100,
            Simulation::Optimization => 250,
            Simulation::Monitoring => 50,
            Simulation::TradeSimulation => 150,
            Simulation::HealthCheck => 50,
        };
        Duration::from_millis(ms)
    }

    /// Payload reported by a successful attempt.
    ///
    /// Task parameters win where present; otherwise values are derived from
    /// the sequence number.
    pub fn payload(&self, task: &Task) -> Value {
        let seq = task.sequence;
        let params = &task.parameters;
        match self {
            Simulation::DataCollection => json!({
                "status": "success",
                "records_collected": 100,
                "data_source": text(params, "data_source")
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("source_{seq}")),
            }),
            Simulation::SignalGeneration => json!({
                "status": "success",
                "signals_generated": params
                    .get("symbols")
                    .and_then(Value::as_u64)
                    .unwrap_or(10),
                "strategy": text(params, "strategy"),
                "batch": seq,
            }),
            Simulation::Backtesting => json!({
                "status": "success",
                "sharpe_ratio": 1.5 + f64::from(task.number) * 0.01,
                "win_rate": 0.55 + f64::from(task.number) * 0.001,
            }),
            Simulation::RiskAssessment => json!({
                "status": "success",
                "var_95": 0.05,
                "max_drawdown": 0.15,
                "sharpe_ratio": 1.8,
            }),
            Simulation::Optimization => json!({
                "status": "success",
                "optimal_allocation": { "stocks": 0.6, "bonds": 0.3, "cash": 0.1 },
                "expected_return": params
                    .get("target_return")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.10 + f64::from(seq - 1) * 0.01),
            }),
            Simulation::Monitoring => json!({
                "status": "success",
                "pnl": 1234.56,
                "win_rate": 0.58,
                "sharpe_ratio": 1.7,
            }),
            Simulation::TradeSimulation => json!({
                "status": "success",
                "trade_type": text(params, "trade_type")
                    .unwrap_or(if seq % 2 == 1 { "long" } else { "short" }),
                "simulated_pnl": 150.0,
                "execution_time_ms": 45,
            }),
            Simulation::HealthCheck => json!({
                "status": "healthy",
                "component": text(params, "component")
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("component_{seq}")),
                "latency_ms": 15,
                "uptime": 99.9,
            }),
        }
    }
}

fn text<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

/// Slack added on top of four times the latency.
const TIMEOUT_SLACK: Duration = Duration::from_millis(250);

/// A [`Simulation`] wired up as a unit of work.
pub struct SimulatedWork {
    simulation: Simulation,
    latency: Duration,
    timeout: Duration,
    failure_rate: f64,
    always_fail: bool,
}

impl SimulatedWork {
    pub fn new(
        simulation: Simulation,
        options: &SimulationOptions,
    ) -> Result<Self, SimulationError> {
        let overflow = || SimulationError::LatencyOverflow {
            category: simulation.category(),
            scale: options.latency_scale,
        };
        let latency =
            Duration::try_from_secs_f64(simulation.latency().as_secs_f64() * options.latency_scale)
                .map_err(|_| overflow())?;
        let timeout = latency
            .checked_mul(4)
            .and_then(|d| d.checked_add(TIMEOUT_SLACK))
            .ok_or_else(overflow)?;

        Ok(Self {
            simulation,
            latency,
            timeout,
            failure_rate: options.failure_rate,
            always_fail: options.fail_category.as_deref() == Some(simulation.category()),
        })
    }
}

#[async_trait]
impl UnitOfWork for SimulatedWork {
    async fn execute(&self, task: &Task) -> Result<Value, TaskExecutionError> {
        let fail = self.always_fail
            || (self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate));

        tokio::time::sleep(self.latency).await;

        if fail {
            return Err(TaskExecutionError::failed(format!(
                "simulated {} failure",
                self.simulation.category()
            )));
        }
        Ok(self.simulation.payload(task))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Registry with a simulated unit of work for every reference category.
pub fn registry(options: &SimulationOptions) -> Result<HandlerRegistry, SimulationError> {
    let mut registry = HandlerRegistry::new();
    for simulation in Simulation::ALL {
        registry.register(
            simulation.category(),
            Arc::new(SimulatedWork::new(simulation, options)?),
        );
    }
    Ok(registry)
}
