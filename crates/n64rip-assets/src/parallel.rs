//! Parallel export.
//!
//! Parsing stays sequential since it mutates the run context. Once the
//! queue is drained, exporters only read shared state, so all exports are
//! rendered on the rayon pool and handed to the sink in queue order.

use rayon::prelude::*;
use tracing::debug;

use crate::driver::{Driver, OutputSink, Rendered, RunReport};
use crate::{ExportForm, Result};

impl Driver {
    /// Parse everything, then render exports in parallel.
    ///
    /// Shared streams come out identical to [`Driver::run`] as long as no
    /// asset is discovered after its table neighbours were exported.
    pub fn run_parallel(&mut self, sink: &mut dyn OutputSink) -> Result<RunReport> {
        let parsed = self.parse_all()?;
        let forms: Vec<ExportForm> = self.forms().to_vec();
        debug!(assets = parsed.len(), threads = rayon::current_num_threads(), "rendering exports");

        let rendered: Vec<Vec<Rendered>> = {
            let this = &*self;
            parsed
                .par_iter()
                .map(|(descriptor, asset)| {
                    forms
                        .iter()
                        .map(|&form| this.render(descriptor, asset, form))
                        .collect()
                })
                .collect()
        };

        for ((descriptor, asset), outputs) in parsed.iter().zip(rendered) {
            for (&form, output) in forms.iter().zip(outputs) {
                self.commit(sink, descriptor, asset, form, output)?;
            }
        }
        self.finish(sink)
    }
}
