/// Stats from an ingestion run.
#[derive(Debug, Default)]
pub struct IngestStats {
    pub influencers_processed: u32,
    pub pages_fetched: u32,
    pub profiles_fetched: u32,
    pub outliers_skipped: u32,
    pub vertices_inserted: u32,
    pub vertices_updated: u32,
    pub new_collections: u32,
    pub edges_added: u32,
    pub vertex_failures: u32,
    pub edge_failures: u32,
    /// Collections in the whole graph at the end of the run.
    pub total_collections: Option<u64>,
}

impl std::fmt::Display for IngestStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Ingestion Run Complete ===")?;
        writeln!(f, "Influencers done:   {}", self.influencers_processed)?;
        writeln!(f, "Pages fetched:      {}", self.pages_fetched)?;
        writeln!(f, "Profiles fetched:   {}", self.profiles_fetched)?;
        writeln!(f, "Outliers skipped:   {}", self.outliers_skipped)?;
        writeln!(f, "Inserted accounts:  {}", self.vertices_inserted)?;
        writeln!(f, "Updated accounts:   {}", self.vertices_updated)?;
        writeln!(f, "New collections:    {}", self.new_collections)?;
        writeln!(f, "Edges added:        {}", self.edges_added)?;
        if self.vertex_failures + self.edge_failures > 0 {
            writeln!(f, "Vertex failures:    {}", self.vertex_failures)?;
            writeln!(f, "Edge failures:      {}", self.edge_failures)?;
        }
        match self.total_collections {
            Some(total) => writeln!(f, "Total collections:  {total}")?,
            None => writeln!(f, "Total collections:  unknown")?,
        }
        Ok(())
    }
}
