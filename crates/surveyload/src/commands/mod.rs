//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod convert;
pub mod export;
pub mod run;

use crate::config::{Config, ServiceConfig};
use crate::error::Result;
use crate::export::{ExportJobController, ExportRequest, HeadquartersClient};
use crate::{ExportArgs, ServiceArgs};
use surveyload_common::types::QuestionnaireIdentity;

/// Environment configuration with command-line service flags applied on top
pub(crate) fn resolve_config(service: Option<&ServiceArgs>) -> Result<Config> {
    let config = Config::from_env()?;
    let Some(args) = service else {
        return Ok(config);
    };

    match &args.url {
        Some(url) => Ok(config.with_service(ServiceConfig {
            url: url.clone(),
            username: args.user.clone().unwrap_or_default(),
            password: args.password.clone().unwrap_or_default(),
        })),
        None => Ok(config),
    }
}

pub(crate) fn export_request(args: &ExportArgs) -> Result<ExportRequest> {
    let identity = QuestionnaireIdentity::new(&args.qid, args.qversion)?;
    Ok(ExportRequest::new(identity)
        .with_export_type(args.export_type)
        .with_interview_status(args.interview_status))
}

pub(crate) fn controller(
    config: &Config,
    args: &ExportArgs,
) -> Result<ExportJobController<HeadquartersClient>> {
    let client = HeadquartersClient::new(config.service()?, config.http_timeout)?;
    std::fs::create_dir_all(&args.export_path)?;
    Ok(ExportJobController::new(client, &args.export_path).with_poll_interval(config.poll_interval))
}
