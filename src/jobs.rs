//! Job substrate client: the collaborator interface for the test-execution
//! backend.
//!
//! The job-execution substrate itself (what actually runs a presubmit) is
//! out of scope here; this module only needs to list and submit job
//! *records*. Modeled as a small REST client in the same vein as
//! [`crate::forge::HttpCodeForge`], grounded on `tansanrao-nexus`'s
//! `reqwest` dependency.

use anyhow::{Context, Result};

use crate::model::Job;

/// Narrow capability set for the job substrate.
pub trait JobSubstrate: Send + Sync {
    /// All active jobs. Filterable by an empty selector upstream; this core
    /// always asks for everything and lets the partitioner discard what
    /// doesn't belong to a known subpool.
    fn list_jobs(&self) -> Result<Vec<Job>>;

    /// Submits a job. Idempotency within one iteration is not required by
    /// the substrate; duplicate triggers under retry are acceptable.
    fn submit_job(&self, job: &Job) -> Result<Job>;
}

pub struct HttpJobSubstrate {
    client: reqwest::blocking::Client,
    api_base: String,
    token: String,
}

impl HttpJobSubstrate {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_base: api_base.into(),
            token: token.into(),
        }
    }

    fn authed(&self, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        req.bearer_auth(&self.token)
    }
}

impl JobSubstrate for HttpJobSubstrate {
    fn list_jobs(&self) -> Result<Vec<Job>> {
        let url = format!("{}/jobs", self.api_base);
        let resp = self
            .authed(self.client.get(&url))
            .send()
            .context("listing jobs")?
            .error_for_status()
            .context("job substrate rejected list request")?;
        resp.json::<Vec<Job>>().context("decoding job list")
    }

    fn submit_job(&self, job: &Job) -> Result<Job> {
        let url = format!("{}/jobs", self.api_base);
        let resp = self
            .authed(self.client.post(&url))
            .json(job)
            .send()
            .context("submitting job")?
            .error_for_status()
            .context("job substrate rejected submission")?;
        resp.json::<Job>().context("decoding submitted job")
    }
}
