// components/provision_engine/src/provisioning/stage1_fetch.rs
//! Stage 1: stage sources and third-party dependencies, then patch plugins in

use crate::actions::{Step, StepId};
use crate::artifact::{is_already_provisioned, FetchOutcome, Fetcher, Patch};
use crate::error::Result;
use crate::provisioning::types::{PreparedLayout, StagedSources};
use crate::provisioning::StepContext;
use crate::report::send_log;

pub struct FetchArtifactsAction {
    pub ctx: StepContext,
}

impl FetchArtifactsAction {
    fn patches(&self, layout: &PreparedLayout) -> Result<Vec<Patch>> {
        self.ctx
            .recipe
            .patches
            .iter()
            .map(|spec| Patch::resolve(spec, &layout.artifacts))
            .collect()
    }

    fn fetcher<'a>(&'a self, layout: &'a PreparedLayout) -> Fetcher<'a> {
        Fetcher {
            runner: self.ctx.runner.as_ref(),
            reporter: self.ctx.reporter.as_ref(),
            download_dir: &layout.config.staging_root,
            step: self.id(),
        }
    }
}

impl Step<PreparedLayout, StagedSources> for FetchArtifactsAction {
    fn id(&self) -> StepId {
        StepId::new("fetch-artifacts")
    }

    fn description(&self) -> String {
        "Fetching dependencies".to_string()
    }

    async fn check(&self, input: &PreparedLayout) -> Result<bool> {
        let missing_artifact = input.artifacts.iter().any(|a| !is_already_provisioned(a));
        let missing_patch = self.patches(input)?.iter().any(|p| !p.is_applied());
        Ok(missing_artifact || missing_patch)
    }

    async fn apply(&self, input: PreparedLayout) -> Result<StagedSources> {
        let mut outcomes = Vec::new();
        {
            let fetcher = self.fetcher(&input);
            for artifact in &input.artifacts {
                let outcome = fetcher.ensure(artifact).await?;
                outcomes.push((artifact.name.clone(), outcome));
            }
        }

        let step = self.id();
        for patch in self.patches(&input)? {
            let outcome = patch
                .apply(self.ctx.runner.as_ref(), self.ctx.reporter.as_ref(), &step)
                .await?;
            outcomes.push((format!("patch:{}", patch.name), outcome));
        }

        Ok(StagedSources {
            layout: input,
            outcomes,
        })
    }

    async fn preview(&self, input: PreparedLayout) -> Result<StagedSources> {
        let mut outcomes = Vec::new();
        {
            let fetcher = self.fetcher(&input);
            for artifact in &input.artifacts {
                let outcome = if is_already_provisioned(artifact) {
                    FetchOutcome::Skipped
                } else {
                    for command in fetcher.commands(artifact) {
                        send_log!(self.ctx.reporter, Info, "Would run: {}", command);
                    }
                    FetchOutcome::Planned
                };
                outcomes.push((artifact.name.clone(), outcome));
            }
        }

        for patch in self.patches(&input)? {
            let outcome = if patch.is_applied() {
                FetchOutcome::Skipped
            } else {
                send_log!(self.ctx.reporter, Info, "Would run: {}", patch.command());
                FetchOutcome::Planned
            };
            outcomes.push((format!("patch:{}", patch.name), outcome));
        }

        Ok(StagedSources {
            layout: input,
            outcomes,
        })
    }
}
