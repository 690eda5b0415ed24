//! The static layout shared by every time step of a tracking run.
//!
//! The schema fixes the order of nodes, mix nodes and technologies once, at setup time. Every
//! per-step computation receives it immutably, so the meaning of a matrix index or an output
//! column never shifts between time steps.
use crate::id::{NodeID, TechnologyID};
use anyhow::{Context, Result, ensure};
use derive_more::Display;
use indexmap::IndexSet;
use std::collections::HashMap;
use std::ops::Range;

/// Prefix of the columns holding import quantities in the wide input table
pub const IMPORT_PREFIX: &str = "Mix";

/// Separator between the parts of a column name
pub const COLUMN_SEPARATOR: char = '_';

/// The origin (or destination) represented by one index of the technology matrix
#[derive(Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum OriginLabel {
    /// The consumption mix of a node
    #[display("Mix_{_0}")]
    Mix(NodeID),
    /// A production technology located at a node
    #[display("{_0}_{_1}")]
    Technology(TechnologyID, NodeID),
}

/// Ordered node, mix node and technology enumerations plus the index layout derived from them
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSchema {
    nodes: IndexSet<NodeID>,
    pseudo_nodes: IndexSet<NodeID>,
    mix_nodes: IndexSet<NodeID>,
    technologies: IndexSet<TechnologyID>,
    labels: Vec<OriginLabel>,
}

/// Check that a node name can be embedded in a column name
fn check_node_name(name: &str) -> Result<()> {
    ensure!(!name.trim().is_empty(), "Node names cannot be empty");
    ensure!(
        !name.contains(COLUMN_SEPARATOR),
        "Node name '{name}' cannot contain '{COLUMN_SEPARATOR}'"
    );
    Ok(())
}

/// Check that a technology name can be embedded in a column name
fn check_technology_name(name: &str) -> Result<()> {
    ensure!(!name.trim().is_empty(), "Technology names cannot be empty");
    ensure!(
        !name.starts_with(&format!("{IMPORT_PREFIX}{COLUMN_SEPARATOR}")),
        "Technology name '{name}' uses the reserved prefix '{IMPORT_PREFIX}{COLUMN_SEPARATOR}'"
    );
    Ok(())
}

/// Collect IDs into an ordered set, failing on duplicates
fn collect_unique<T, I>(ids: I, kind: &str) -> Result<IndexSet<T>>
where
    T: std::hash::Hash + Eq + std::fmt::Display,
    I: IntoIterator<Item = T>,
{
    let mut set = IndexSet::new();
    for id in ids {
        let msg = format!("Duplicate {kind} '{id}'");
        ensure!(set.insert(id), msg);
    }
    Ok(set)
}

impl FlowSchema {
    /// Build and validate a schema from the declared enumerations.
    ///
    /// # Arguments
    ///
    /// * `nodes` - The tracked nodes, each with its own technology block
    /// * `pseudo_nodes` - Neighbour-only mix nodes (e.g. "Other") which nodes may import from
    /// * `technologies` - The production technologies exposed by every node
    pub fn new<N, P, T>(nodes: N, pseudo_nodes: P, technologies: T) -> Result<Self>
    where
        N: IntoIterator<Item = NodeID>,
        P: IntoIterator<Item = NodeID>,
        T: IntoIterator<Item = TechnologyID>,
    {
        let nodes = collect_unique(nodes, "node")?;
        let pseudo_nodes = collect_unique(pseudo_nodes, "pseudo-node")?;
        let technologies = collect_unique(technologies, "technology")?;
        ensure!(!nodes.is_empty(), "At least one node must be declared");
        ensure!(
            !technologies.is_empty(),
            "At least one technology must be declared"
        );

        for node in nodes.iter().chain(pseudo_nodes.iter()) {
            check_node_name(node)?;
        }
        for technology in &technologies {
            check_technology_name(technology)?;
        }
        if let Some(node) = pseudo_nodes.intersection(&nodes).next() {
            anyhow::bail!("'{node}' is declared both as a node and as a pseudo-node");
        }

        let mix_nodes: IndexSet<_> = nodes.iter().chain(pseudo_nodes.iter()).cloned().collect();
        let labels = mix_nodes
            .iter()
            .map(|node| OriginLabel::Mix(node.clone()))
            .chain(nodes.iter().flat_map(|node| {
                technologies
                    .iter()
                    .map(move |tech| OriginLabel::Technology(tech.clone(), node.clone()))
            }))
            .collect();

        Ok(Self {
            nodes,
            pseudo_nodes,
            mix_nodes,
            technologies,
            labels,
        })
    }

    /// The tracked nodes
    pub fn nodes(&self) -> &IndexSet<NodeID> {
        &self.nodes
    }

    /// Mix nodes which only appear as import origins
    pub fn pseudo_nodes(&self) -> &IndexSet<NodeID> {
        &self.pseudo_nodes
    }

    /// All mix nodes: the tracked nodes followed by the pseudo-nodes
    pub fn mix_nodes(&self) -> &IndexSet<NodeID> {
        &self.mix_nodes
    }

    /// The technologies exposed by every node
    pub fn technologies(&self) -> &IndexSet<TechnologyID> {
        &self.technologies
    }

    /// The dimension of the technology matrix
    pub fn size(&self) -> usize {
        self.labels.len()
    }

    /// The label for every index of the technology matrix
    pub fn labels(&self) -> &[OriginLabel] {
        &self.labels
    }

    /// Matrix indices which represent ultimate origins (pseudo-nodes and technologies).
    ///
    /// A node's decomposition sums to one over these indices.
    pub fn origin_indices(&self) -> Range<usize> {
        self.nodes.len()..self.size()
    }

    /// Matrix index of a mix node
    pub fn mix_index(&self, node: &str) -> Option<usize> {
        self.mix_nodes.get_index_of(node)
    }

    /// Matrix index of a technology at a node, both given by position
    pub fn technology_index(&self, node_idx: usize, tech_idx: usize) -> usize {
        self.mix_nodes.len() + node_idx * self.technologies.len() + tech_idx
    }

    /// Matrix index of the technology at the given node, looked up by name
    pub fn find_technology_index(&self, node: &str, technology: &str) -> Result<usize> {
        let node_idx = self
            .nodes
            .get_index_of(node)
            .with_context(|| format!("Unknown node '{node}'"))?;
        let tech_idx = self
            .technologies
            .get_index_of(technology)
            .with_context(|| format!("Unknown technology '{technology}'"))?;
        Ok(self.technology_index(node_idx, tech_idx))
    }

    /// Number of values per node in a table row
    pub fn node_block_width(&self) -> usize {
        self.technologies.len() + self.mix_nodes.len()
    }

    /// Number of values in a table row
    pub fn row_width(&self) -> usize {
        self.nodes.len() * self.node_block_width()
    }

    /// Split a table row into a node's technology values and import values
    pub fn node_values<'a>(&self, row: &'a [f64], node_idx: usize) -> (&'a [f64], &'a [f64]) {
        let start = node_idx * self.node_block_width();
        let block = &row[start..start + self.node_block_width()];
        block.split_at(self.technologies.len())
    }

    /// Position of a node's technology value within a table row
    pub fn technology_position(&self, node_idx: usize, tech_idx: usize) -> usize {
        node_idx * self.node_block_width() + tech_idx
    }

    /// Position of a node's import value from a mix node within a table row
    pub fn import_position(&self, node_idx: usize, mix_idx: usize) -> usize {
        node_idx * self.node_block_width() + self.technologies.len() + mix_idx
    }

    /// Column names of a table row, in row order
    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.row_width());
        for node in &self.nodes {
            names.extend(self.technologies.iter().map(|tech| format!("{tech}_{node}")));
            names.extend(
                self.mix_nodes
                    .iter()
                    .map(|origin| format!("{IMPORT_PREFIX}_{origin}_{node}")),
            );
        }
        names
    }

    /// Map the headers of a wide table onto row positions.
    ///
    /// Returns the row position for every header, or `None` for headers which the schema doesn't
    /// know about. Every row position must be covered by exactly one header.
    pub fn resolve_columns<'a, I>(&self, headers: I) -> Result<Vec<Option<usize>>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let positions: HashMap<String, usize> = self
            .column_names()
            .into_iter()
            .enumerate()
            .map(|(pos, name)| (name, pos))
            .collect();

        let mut seen = vec![false; self.row_width()];
        let mut resolved = Vec::new();
        for header in headers {
            let pos = positions.get(header.trim()).copied();
            if let Some(pos) = pos {
                ensure!(!seen[pos], "Duplicate column '{header}'");
                seen[pos] = true;
            }
            resolved.push(pos);
        }

        let names = self.column_names();
        let missing = seen
            .iter()
            .zip(&names)
            .filter(|(seen, _)| !**seen)
            .map(|(_, name)| name.as_str())
            .collect::<Vec<_>>();
        ensure!(
            missing.is_empty(),
            "Missing required columns: {}",
            missing.join(", ")
        );

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, schema};
    use rstest::rstest;

    #[rstest]
    fn test_layout(schema: FlowSchema) {
        // Mix nodes A, B, Other followed by Plant/Solar blocks for A and B
        assert_eq!(schema.size(), 7);
        assert_eq!(schema.mix_index("Other"), Some(2));
        assert_eq!(schema.technology_index(0, 0), 3);
        assert_eq!(schema.technology_index(1, 1), 6);
        assert_eq!(schema.origin_indices(), 2..7);
        assert_eq!(
            schema
                .labels()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            ["Mix_A", "Mix_B", "Mix_Other", "Plant_A", "Solar_A", "Plant_B", "Solar_B"]
        );
    }

    #[rstest]
    fn test_row_layout(schema: FlowSchema) {
        assert_eq!(schema.row_width(), 10);
        assert_eq!(schema.technology_position(1, 1), 6);
        assert_eq!(schema.import_position(1, 2), 9);
        assert_eq!(
            schema.column_names(),
            [
                "Plant_A",
                "Solar_A",
                "Mix_A_A",
                "Mix_B_A",
                "Mix_Other_A",
                "Plant_B",
                "Solar_B",
                "Mix_A_B",
                "Mix_B_B",
                "Mix_Other_B"
            ]
        );

        let row: Vec<f64> = (0..10).map(f64::from).collect();
        let (techs, imports) = schema.node_values(&row, 1);
        assert_eq!(techs, [5.0, 6.0]);
        assert_eq!(imports, [7.0, 8.0, 9.0]);
    }

    #[rstest]
    fn test_find_technology_index(schema: FlowSchema) {
        assert_eq!(schema.find_technology_index("B", "Plant").unwrap(), 5);
        assert_error!(
            schema.find_technology_index("Other", "Plant"),
            "Unknown node 'Other'"
        );
        assert_error!(
            schema.find_technology_index("A", "Wind"),
            "Unknown technology 'Wind'"
        );
    }

    #[rstest]
    fn test_resolve_columns_any_order(schema: FlowSchema) {
        let mut headers = schema.column_names();
        headers.reverse();
        headers.push("Comment".into());
        let resolved = schema
            .resolve_columns(headers.iter().map(String::as_str))
            .unwrap();
        assert_eq!(resolved[0], Some(9));
        assert_eq!(resolved[9], Some(0));
        assert_eq!(resolved[10], None);
    }

    #[rstest]
    fn test_resolve_columns_missing(schema: FlowSchema) {
        let headers = schema.column_names();
        assert_error!(
            schema.resolve_columns(headers.iter().skip(1).map(String::as_str)),
            "Missing required columns: Plant_A"
        );
    }

    #[rstest]
    #[case(&["A", "A"], &[], &["Plant"], "Duplicate node 'A'")]
    #[case(&["A"], &["A"], &["Plant"], "'A' is declared both as a node and as a pseudo-node")]
    #[case(&["A_1"], &[], &["Plant"], "Node name 'A_1' cannot contain '_'")]
    #[case(&["A"], &[], &["Mix_Plant"], "Technology name 'Mix_Plant' uses the reserved prefix 'Mix_'")]
    #[case(&["A"], &[], &[], "At least one technology must be declared")]
    #[case(&[], &[], &["Plant"], "At least one node must be declared")]
    fn test_new_invalid(
        #[case] nodes: &[&str],
        #[case] pseudo_nodes: &[&str],
        #[case] technologies: &[&str],
        #[case] msg: &str,
    ) {
        assert_error!(
            FlowSchema::new(
                nodes.iter().map(|&n| n.into()),
                pseudo_nodes.iter().map(|&n| n.into()),
                technologies.iter().map(|&t| t.into()),
            ),
            msg
        );
    }

    #[test]
    fn test_technology_with_separator_allowed() {
        let schema = FlowSchema::new(
            ["CH".into()],
            [],
            ["Hydro_Run-of-river".into()],
        )
        .unwrap();
        assert_eq!(schema.column_names()[0], "Hydro_Run-of-river_CH");
    }
}
