//! JSON export

use std::io::Write;

use megica_core::types::ChannelLayout;
use serde::Serialize;
use tracing::debug;

use super::{check_shapes, FeatureExporter};
use crate::error::ExportResult;
use crate::features::ComponentFeature;

#[derive(Serialize)]
struct FeatureDocument<'a> {
    n_components: usize,
    n_samples: usize,
    layout: &'a ChannelLayout,
    components: &'a [ComponentFeature],
}

/// Writes features and layout as a single JSON document
pub struct JsonExporter<W: Write> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonExporter<W> {
    /// Compact JSON to `writer`
    pub fn new(writer: W) -> Self {
        Self { writer, pretty: false }
    }

    /// Indented JSON to `writer`
    pub fn pretty(writer: W) -> Self {
        Self { writer, pretty: true }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> FeatureExporter for JsonExporter<W> {
    fn export(&mut self, features: &[ComponentFeature], layout: &ChannelLayout) -> ExportResult<()> {
        let (n_samples, _) = check_shapes(features, layout)?;
        let document = FeatureDocument { n_components: features.len(), n_samples, layout, components: features };

        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, &document)?;
        } else {
            serde_json::to_writer(&mut self.writer, &document)?;
        }
        self.writer.flush()?;

        debug!("Exported {} components as JSON", features.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use megica_core::types::ChannelKind;

    #[test]
    fn test_json_document() {
        let layout = ChannelLayout::uniform(2, ChannelKind::Gradiometer);
        let features = vec![ComponentFeature { index: 0, temporal: vec![0.5, -0.5, 0.25], spatial: vec![1.0, -1.0] }];

        let mut exporter = JsonExporter::new(Vec::new());
        exporter.export(&features, &layout).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&exporter.into_inner()).unwrap();

        assert_eq!(value["n_components"], 1);
        assert_eq!(value["n_samples"], 3);
        assert_eq!(value["layout"][1]["kind"], "gradiometer");
        assert_eq!(value["components"][0]["spatial"][1], -1.0);
    }
}
