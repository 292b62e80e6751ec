//! Builds and validates the graph of a repository

use anyhow::Result;
use std::path::Path;

use reqgraph_core::{
    AttributeSchema, CrossReferenceRules, Diagnostics, ProjectConfig, ReqGraph, TraceError,
};

use crate::certdoc::CertDocs;
use crate::report::{print_messages, print_problems};
use crate::scanner::CodeScanner;

/// Problems found at each stage of a run
#[derive(Debug, Default)]
pub struct TraceReport {
    pub parsing: Vec<String>,
    pub ingestion: Vec<TraceError>,
    pub scanning: Vec<TraceError>,
    pub linking: Diagnostics,
    pub attributes: Vec<TraceError>,
    pub cross_references: Diagnostics,
}

impl TraceReport {
    pub fn total(&self) -> usize {
        self.parsing.len()
            + self.ingestion.len()
            + self.scanning.len()
            + self.linking.len()
            + self.attributes.len()
            + self.cross_references.len()
    }

    /// Prints every non-empty stage; returns the number of problems
    pub fn print(&self) -> usize {
        print_messages("Document problems", &self.parsing)
            + print_problems("Ingestion problems", &self.ingestion)
            + print_problems("Code scanning problems", &self.scanning)
            + print_problems("Link problems", self.linking.iter())
            + print_problems("Attribute problems", &self.attributes)
            + print_problems("Cross-reference problems", self.cross_references.iter())
    }
}

pub struct Trace {
    pub graph: ReqGraph,
    pub report: TraceReport,
}

/// Reads documents and code under `root`, links them and runs every check.
///
/// Only configuration errors abort; everything else lands in the report.
pub fn build(root: &Path, config: &ProjectConfig) -> Result<Trace> {
    let schema = AttributeSchema::compile(&config.attributes)?;
    let certdocs = CertDocs::new(root, &config.certdoc_path);
    let mut graph = ReqGraph::new();
    let mut report = TraceReport::default();

    let (records, parsing) = certdocs.records();
    report.parsing = parsing;
    report.ingestion = graph.ingest(records);

    let (files, scanning) = CodeScanner::new(root, config).scan();
    report.scanning = scanning;
    for file in files {
        graph.add_code_file(file)?;
    }

    if let Err(diagnostics) = graph.resolve() {
        log::warn!("Linking failed with {} problems", diagnostics.len());
        report.linking = diagnostics;
    }

    report.attributes = graph.check_attributes(&schema);
    if let Err(diagnostics) =
        graph.check_cross_references(&certdocs, &CrossReferenceRules::default())
    {
        report.cross_references = diagnostics;
    }

    log::info!(
        "Built graph of {} nodes with {} problems",
        graph.len(),
        report.total()
    );
    Ok(Trace { graph, report })
}
