//! Shares of production which is consumed on site and never enters the traded mix.
use crate::schema::FlowSchema;
use anyhow::{Context, Result, ensure};

/// The fraction of each technology's production consumed locally, per node.
///
/// Fractions are static across the whole time series. Node/technology pairs which were not
/// specified have a fraction of zero.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSources {
    num_technologies: usize,
    shares: Vec<f64>,
}

impl LocalSources {
    /// Build the table from `(node, technology, share)` records.
    ///
    /// Every node and technology must be declared in the schema and every share must lie between
    /// zero and one. Each pair may only be given once.
    pub fn from_records<'a, I>(schema: &FlowSchema, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str, f64)>,
    {
        let num_technologies = schema.technologies().len();
        let mut shares = vec![0.0; schema.nodes().len() * num_technologies];
        let mut specified = vec![false; shares.len()];

        for (node, technology, share) in records {
            let node_idx = schema
                .nodes()
                .get_index_of(node)
                .with_context(|| format!("Local source given for unknown node '{node}'"))?;
            let tech_idx = schema
                .technologies()
                .get_index_of(technology)
                .with_context(|| {
                    format!("Local source technology '{technology}' is not a declared technology")
                })?;
            ensure!(
                (0.0..=1.0).contains(&share),
                "Local source share for {technology} at {node} must be between 0 and 1 \
                 (got {share})"
            );

            let pos = node_idx * num_technologies + tech_idx;
            ensure!(
                !specified[pos],
                "Local source share for {technology} at {node} given more than once"
            );
            specified[pos] = true;
            shares[pos] = share;
        }

        Ok(Self {
            num_technologies,
            shares,
        })
    }

    /// The local fractions of all technologies at a node, in schema order
    pub fn node_shares(&self, node_idx: usize) -> &[f64] {
        &self.shares[node_idx * self.num_technologies..(node_idx + 1) * self.num_technologies]
    }

    /// Whether no technology at the node is consumed locally
    pub fn is_node_empty(&self, node_idx: usize) -> bool {
        self.node_shares(node_idx).iter().all(|&share| share == 0.0)
    }
}
