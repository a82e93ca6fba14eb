//! End-to-end run: sources to panel, panel to fits, fits to artifacts.

use crate::catalog::standard_catalog;
use crate::config::PipelineConfig;
use crate::suite::{ModelOutcome, ModelSuite, PanelFrames};
use crate::Result;
use munipanel_data::{
    DeflatorSet, DisbursementRecord, GdpRow, PopulationRow, PriceSources, Resolver, aggregate,
    disbursements_from_frame, gdp_from_frame, population_from_wide, prices_from_frame,
};
use munipanel_output::ArtifactWriter;
use munipanel_panel::{Assembly, AssemblyAudit, PanelAssembler, PanelInputs, PanelVariant};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Typed source tables, as delivered by the ingestion layer.
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    /// Long-form population
    pub population: Vec<PopulationRow>,
    /// GDP and sector value added
    pub gdp: Vec<GdpRow>,
    /// Monthly disbursement records
    pub disbursements: Vec<DisbursementRecord>,
    /// Price tables of the three deflators
    pub prices: PriceSources,
}

/// Raw frames accepted by [`SourceTables::from_frames`].
#[derive(Debug, Clone, Copy)]
pub struct SourceFrames<'a> {
    /// Population, one column per year
    pub population_wide: &'a DataFrame,
    /// Long GDP table
    pub gdp: &'a DataFrame,
    /// Monthly disbursements
    pub disbursements: &'a DataFrame,
    /// Headline price table
    pub headline_prices: &'a DataFrame,
    /// Industrial price table
    pub industry_prices: &'a DataFrame,
    /// Agricultural price table
    pub agriculture_prices: &'a DataFrame,
}

impl SourceTables {
    /// Convert raw frames into typed tables.
    pub fn from_frames(frames: &SourceFrames<'_>, resolver: &Resolver) -> Result<Self> {
        Ok(Self {
            population: population_from_wide(frames.population_wide)?,
            gdp: gdp_from_frame(frames.gdp, resolver)?,
            disbursements: disbursements_from_frame(frames.disbursements)?,
            prices: PriceSources {
                headline: prices_from_frame(frames.headline_prices)?,
                industry: prices_from_frame(frames.industry_prices)?,
                agriculture: prices_from_frame(frames.agriculture_prices)?,
            },
        })
    }
}

/// Assembled panel with its frames and deflators.
#[derive(Debug, Clone)]
pub struct PanelStage {
    /// Panel, audit and resolution report
    pub assembly: Assembly,
    /// Exported variants
    pub frames: PanelFrames,
    /// Deflators used
    pub deflators: DeflatorSet,
}

/// What a run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Join statistics of the panel
    pub audit: AssemblyAudit,
    /// Models fitted successfully
    pub fitted: Vec<String>,
    /// Failed models with the reason
    pub failed: Vec<(String, String)>,
    /// Files written
    pub artifacts: Vec<PathBuf>,
}

/// The full pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline.
    pub const fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Pipeline configuration.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Resolver built from the configuration.
    pub fn resolver(&self) -> Result<Resolver> {
        Ok(Resolver::new(self.config.resolver.clone())?)
    }

    /// Build deflators, aggregate disbursements, assemble and verify the panel.
    pub fn assemble(&self, sources: &SourceTables) -> Result<PanelStage> {
        let resolver = self.resolver()?;
        let deflators = DeflatorSet::build(&sources.prices, &self.config.deflator);
        let disbursements = aggregate(&sources.disbursements, &self.config.aggregation)?;

        let inputs = PanelInputs {
            population: &sources.population,
            gdp: &sources.gdp,
            disbursements: &disbursements,
        };
        let assembly =
            PanelAssembler::new(self.config.panel.clone(), resolver).assemble(&inputs, &deflators)?;
        assembly.panel.verify()?;

        let frames = PanelFrames {
            lagged: assembly.panel.to_dataframe(PanelVariant::Lagged)?,
            lagged_with_leads: assembly.panel.to_dataframe(PanelVariant::LaggedWithLeads)?,
        };
        info!(
            entities = assembly.audit.entities,
            rows = assembly.audit.rows,
            columns = frames.lagged_with_leads.width(),
            "panel assembled"
        );
        Ok(PanelStage {
            assembly,
            frames,
            deflators,
        })
    }

    /// The catalogue for the configured lag and lead depth.
    pub fn suite(&self) -> ModelSuite {
        ModelSuite::new(
            standard_catalog(self.config.panel.max_lag, self.config.panel.max_lead),
            self.config.fit.clone(),
        )
    }

    /// Fit the catalogue on an assembled panel.
    pub fn estimate(&self, frames: &PanelFrames) -> Vec<Result<ModelOutcome>> {
        self.suite().run(frames)
    }

    /// Write panels and the artifacts of every successful model.
    pub fn export(
        &self,
        stage: &mut PanelStage,
        outcomes: &[Result<ModelOutcome>],
    ) -> Result<RunSummary> {
        let output = &self.config.output;
        let writer = ArtifactWriter::new(&output.dir)
            .with_format(output.format)?
            .with_overwrite(output.overwrite);

        let mut summary = RunSummary {
            audit: stage.assembly.audit.clone(),
            ..Default::default()
        };
        if output.write_panels {
            summary.artifacts.push(
                writer.write_panel(PanelVariant::Lagged.name(), &mut stage.frames.lagged)?,
            );
            summary.artifacts.push(writer.write_panel(
                PanelVariant::LaggedWithLeads.name(),
                &mut stage.frames.lagged_with_leads,
            )?);
        }
        for outcome in outcomes {
            match outcome {
                Ok(o) => {
                    let linear = std::slice::from_ref(&o.cumulative);
                    summary
                        .artifacts
                        .extend(writer.write_model(&o.fitted, &o.tests, linear)?);
                    summary.fitted.push(o.name().to_string());
                }
                Err(e) => summary.failed.push((
                    e.model().unwrap_or("unknown").to_string(),
                    e.to_string(),
                )),
            }
        }
        info!(
            fitted = summary.fitted.len(),
            failed = summary.failed.len(),
            artifacts = summary.artifacts.len(),
            dir = %output.dir.display(),
            "artifacts written"
        );
        Ok(summary)
    }

    /// Assemble, estimate and export.
    ///
    /// Cross-cutting failures (resolution, integrity, IO) abort the run;
    /// failed models are listed in the summary.
    pub fn run(&self, sources: &SourceTables) -> Result<RunSummary> {
        let mut stage = self.assemble(sources)?;
        let outcomes = self.estimate(&stage.frames);
        self.export(&mut stage, &outcomes)
    }
}

