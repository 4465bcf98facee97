//! HTTP adapter for a VROOM-compatible solver, plus its response types.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SolverError;
use crate::payload::SolverRequest;
use crate::traits::RouteSolver;
use crate::travel_time::env_parse;

#[derive(Debug, Clone)]
pub struct VroomConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for VroomConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl VroomConfig {
    /// `DISPATCH_SOLVER_URL`, `DISPATCH_SOLVER_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("DISPATCH_SOLVER_URL").unwrap_or(defaults.base_url),
            timeout_secs: env_parse("DISPATCH_SOLVER_TIMEOUT_SECS")
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VroomClient {
    config: VroomConfig,
    client: reqwest::blocking::Client,
}

impl VroomClient {
    pub fn new(config: VroomConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }
}

impl RouteSolver for VroomClient {
    fn solve(&self, request: &SolverRequest) -> Result<SolverResponse, SolverError> {
        debug!(
            jobs = request.jobs.len(),
            vehicles = request.vehicles.len(),
            url = %self.config.base_url,
            "sending solver request"
        );

        let response: SolverResponse = self
            .client
            .post(&self.config.base_url)
            .json(request)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json())?;

        if response.code != 0 {
            return Err(SolverError::Infeasible(
                response
                    .error
                    .unwrap_or_else(|| format!("solver returned code {}", response.code)),
            ));
        }

        Ok(response)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverResponse {
    /// 0 on success.
    #[serde(default)]
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub routes: Vec<SolverRoute>,
    #[serde(default)]
    pub unassigned: Vec<SolverUnassigned>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverRoute {
    pub vehicle: u64,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub steps: Vec<SolverStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverStep {
    /// "start", "job", "end", or solver-specific kinds such as "break".
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<u64>,
    /// `[lon, lat]`
    #[serde(default)]
    pub location: Option<[f64; 2]>,
    #[serde(default)]
    pub arrival: Option<i64>,
    #[serde(default)]
    pub load: Option<Vec<i64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverUnassigned {
    pub id: u64,
    #[serde(default)]
    pub reason: Option<String>,
}
